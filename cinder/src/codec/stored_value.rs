use crate::common::{Timestamp, FIELD_SEPARATOR};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// The stored fields of one document.
pub type StoredFields = BTreeMap<String, StoredValue>;

/// A value in its stored (wire) representation.
///
/// Only JSON-compatible scalars, fixed-point timestamps, lists and string-keyed
/// mappings exist at this level. Native date/times have already become
/// [Timestamp]s and absent values have been dropped.
///
/// # Ordering
///
/// Values of different types order by type first:
/// null < bool < number < timestamp < string < array < map.
/// Integers and floats share the number rank and compare numerically, so
/// `Integer(1)` and `Float(1.0)` are equal. Arrays and maps compare
/// element-wise. Equality is defined by this ordering.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum StoredValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Timestamp(Timestamp),
    String(String),
    Array(Vec<StoredValue>),
    Map(BTreeMap<String, StoredValue>),
}

impl StoredValue {
    fn type_rank(&self) -> u8 {
        match self {
            StoredValue::Null => 0,
            StoredValue::Bool(_) => 1,
            StoredValue::Integer(_) | StoredValue::Float(_) => 2,
            StoredValue::Timestamp(_) => 3,
            StoredValue::String(_) => 4,
            StoredValue::Array(_) => 5,
            StoredValue::Map(_) => 6,
        }
    }

    /// True when both values have the same type rank and can be range-compared.
    pub fn is_comparable_with(&self, other: &StoredValue) -> bool {
        self.type_rank() == other.type_rank()
    }

    pub fn as_array(&self) -> Option<&Vec<StoredValue>> {
        match self {
            StoredValue::Array(values) => Some(values),
            _ => None,
        }
    }
}

fn compare_numbers(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// 2^63, the first float above every `i64`.
const I64_UPPER_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Compares an integer with a float without rounding the integer, so the
/// ordering stays transitive beyond 2^53.
fn compare_integer_float(integer: i64, float: f64) -> Ordering {
    if float.is_nan() {
        return Ordering::Equal;
    }
    if float >= I64_UPPER_BOUND {
        return Ordering::Less;
    }
    if float < -I64_UPPER_BOUND {
        return Ordering::Greater;
    }
    // the truncated float lies within i64 range and converts exactly
    let whole = float.trunc();
    match integer.cmp(&(whole as i64)) {
        Ordering::Equal => whole.partial_cmp(&float).unwrap_or(Ordering::Equal),
        unequal => unequal,
    }
}

impl Ord for StoredValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (StoredValue::Null, StoredValue::Null) => Ordering::Equal,
            (StoredValue::Bool(a), StoredValue::Bool(b)) => a.cmp(b),
            (StoredValue::Integer(a), StoredValue::Integer(b)) => a.cmp(b),
            (StoredValue::Integer(a), StoredValue::Float(b)) => compare_integer_float(*a, *b),
            (StoredValue::Float(a), StoredValue::Integer(b)) => compare_integer_float(*b, *a).reverse(),
            (StoredValue::Float(a), StoredValue::Float(b)) => compare_numbers(*a, *b),
            (StoredValue::Timestamp(a), StoredValue::Timestamp(b)) => a.cmp(b),
            (StoredValue::String(a), StoredValue::String(b)) => a.cmp(b),
            (StoredValue::Array(a), StoredValue::Array(b)) => a.cmp(b),
            (StoredValue::Map(a), StoredValue::Map(b)) => a.iter().cmp(b.iter()),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl PartialOrd for StoredValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for StoredValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for StoredValue {}

impl Display for StoredValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StoredValue::Null => write!(f, "null"),
            StoredValue::Bool(b) => write!(f, "{}", b),
            StoredValue::Integer(i) => write!(f, "{}", i),
            StoredValue::Float(v) => write!(f, "{}", v),
            StoredValue::Timestamp(ts) => write!(f, "{}", ts),
            StoredValue::String(s) => write!(f, "\"{}\"", s),
            StoredValue::Array(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, "]")
            }
            StoredValue::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{}\": {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Resolves a possibly dotted field path (`address.city`) against stored fields.
///
/// Returns `None` when any step is missing or is not a map.
pub fn lookup<'a>(fields: &'a StoredFields, field_path: &str) -> Option<&'a StoredValue> {
    let mut parts = field_path.split(FIELD_SEPARATOR);
    let mut current = fields.get(parts.next()?)?;
    for part in parts {
        match current {
            StoredValue::Map(map) => current = map.get(part)?,
            _ => return None,
        }
    }
    Some(current)
}
