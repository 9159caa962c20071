use std::fmt::{Display, Formatter};
use std::time::Duration;

/// The classes of request the rate governor accounts for.
///
/// `General` is a single store-wide window. The other classes keep one
/// window per distinct path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    General,
    DocumentRead,
    CollectionScan,
    Subscription,
}

impl OperationClass {
    pub fn is_per_path(&self) -> bool {
        !matches!(self, OperationClass::General)
    }
}

impl Display for OperationClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationClass::General => write!(f, "general"),
            OperationClass::DocumentRead => write!(f, "document-read"),
            OperationClass::CollectionScan => write!(f, "collection-scan"),
            OperationClass::Subscription => write!(f, "subscription"),
        }
    }
}

/// Request ceilings per operation class within one sliding window.
///
/// `None` disables the ceiling for that class. Defaults: 500 general
/// requests, and per path 30 document reads, 20 collection scans and
/// 30 subscriptions, all per 60 seconds.
///
/// ```rust
/// use cinder::governor::{OperationClass, RateLimits};
///
/// let limits = RateLimits::default().with_collection_scan(Some(100));
/// assert_eq!(limits.ceiling(OperationClass::CollectionScan), Some(100));
/// assert_eq!(RateLimits::unlimited().ceiling(OperationClass::General), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimits {
    general: Option<usize>,
    document_read: Option<usize>,
    collection_scan: Option<usize>,
    subscription: Option<usize>,
    window: Duration,
}

impl Default for RateLimits {
    fn default() -> Self {
        RateLimits {
            general: Some(500),
            document_read: Some(30),
            collection_scan: Some(20),
            subscription: Some(30),
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimits {
    /// Limits with every ceiling disabled.
    pub fn unlimited() -> Self {
        RateLimits {
            general: None,
            document_read: None,
            collection_scan: None,
            subscription: None,
            window: Duration::from_secs(60),
        }
    }

    pub fn with_general(mut self, ceiling: Option<usize>) -> Self {
        self.general = ceiling;
        self
    }

    pub fn with_document_read(mut self, ceiling: Option<usize>) -> Self {
        self.document_read = ceiling;
        self
    }

    pub fn with_collection_scan(mut self, ceiling: Option<usize>) -> Self {
        self.collection_scan = ceiling;
        self
    }

    pub fn with_subscription(mut self, ceiling: Option<usize>) -> Self {
        self.subscription = ceiling;
        self
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn ceiling(&self, class: OperationClass) -> Option<usize> {
        match class {
            OperationClass::General => self.general,
            OperationClass::DocumentRead => self.document_read,
            OperationClass::CollectionScan => self.collection_scan,
            OperationClass::Subscription => self.subscription,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
