use crate::errors::{CinderError, CinderResult, ErrorKind};
use chrono::{DateTime, Utc};
use std::fmt::{Display, Formatter};

const NANOS_PER_SECOND: u32 = 1_000_000_000;

/// A fixed-point point in time: whole seconds since the Unix epoch plus a
/// nanosecond fraction.
///
/// `Timestamp` is the stored form of a date/time. It is kept distinct from
/// plain numbers so the data codec can round-trip it against
/// [`chrono::DateTime<Utc>`] without losing precision. The derived ordering
/// compares seconds first and then nanoseconds, which is chronological order
/// because `nanos` is always normalized into `0..1_000_000_000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Timestamp {
    seconds: i64,
    nanos: u32,
}

impl Timestamp {
    /// Creates a timestamp, rejecting a nanosecond fraction of a second or more.
    pub fn new(seconds: i64, nanos: u32) -> CinderResult<Self> {
        if nanos >= NANOS_PER_SECOND {
            log::error!("Timestamp nanos {} out of range", nanos);
            return Err(CinderError::new(
                &format!("Timestamp nanoseconds must be below {}, got {}", NANOS_PER_SECOND, nanos),
                ErrorKind::CodecError,
            ));
        }
        Ok(Timestamp { seconds, nanos })
    }

    pub fn now() -> Self {
        Timestamp::from_datetime(&Utc::now())
    }

    /// Converts a native date/time into its fixed-point form.
    ///
    /// A leap-second instant (which chrono encodes as a nanosecond fraction
    /// above one second) is clamped to the last representable nanosecond of
    /// that second.
    pub fn from_datetime(datetime: &DateTime<Utc>) -> Self {
        Timestamp {
            seconds: datetime.timestamp(),
            nanos: datetime.timestamp_subsec_nanos().min(NANOS_PER_SECOND - 1),
        }
    }

    pub fn to_datetime(&self) -> CinderResult<DateTime<Utc>> {
        DateTime::from_timestamp(self.seconds, self.nanos).ok_or_else(|| {
            log::error!("Timestamp {} cannot be represented as a date/time", self);
            CinderError::new(
                &format!("Timestamp {} is outside the supported date/time range", self),
                ErrorKind::CodecError,
            )
        })
    }

    pub fn from_millis(millis: i64) -> Self {
        Timestamp {
            seconds: millis.div_euclid(1000),
            nanos: (millis.rem_euclid(1000) as u32) * 1_000_000,
        }
    }

    /// Milliseconds since the epoch, truncating sub-millisecond precision.
    pub fn to_millis(&self) -> i64 {
        self.seconds * 1000 + (self.nanos / 1_000_000) as i64
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn nanos(&self) -> u32 {
        self.nanos
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Timestamp(seconds={}, nanos={})", self.seconds, self.nanos)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Timestamp::from_datetime(&value)
    }
}
