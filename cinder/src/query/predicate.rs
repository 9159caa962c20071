use crate::codec::{lookup, to_storage_value, StoredFields, StoredValue};
use crate::common::Value;
use crate::errors::{CinderError, CinderResult, ErrorKind};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Comparison operators a [QueryPredicate] can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    In,
    NotIn,
    ArrayContains,
    ArrayContainsAny,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
            Operator::In => "in",
            Operator::NotIn => "not-in",
            Operator::ArrayContains => "array-contains",
            Operator::ArrayContainsAny => "array-contains-any",
        }
    }

    /// Operators whose operand must be a non-empty list.
    fn takes_list(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn | Operator::ArrayContainsAny)
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for Operator {
    type Err = CinderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "==" => Ok(Operator::Equal),
            "!=" => Ok(Operator::NotEqual),
            "<" => Ok(Operator::LessThan),
            "<=" => Ok(Operator::LessThanOrEqual),
            ">" => Ok(Operator::GreaterThan),
            ">=" => Ok(Operator::GreaterThanOrEqual),
            "in" => Ok(Operator::In),
            "not-in" => Ok(Operator::NotIn),
            "array-contains" => Ok(Operator::ArrayContains),
            "array-contains-any" => Ok(Operator::ArrayContainsAny),
            other => {
                log::error!("Unknown query operator '{}'", other);
                Err(CinderError::new(
                    &format!("Unknown query operator '{}'", other),
                    ErrorKind::InvalidQuery,
                ))
            }
        }
    }
}

/// A `(field, operator, value)` condition on documents.
///
/// The field may be a dotted path into nested documents (`address.city`).
/// A document that lacks the field never matches, whatever the operator.
///
/// ```rust
/// use cinder::query::{Operator, QueryPredicate};
///
/// let parsed = QueryPredicate::parse("age", ">=", 18).unwrap();
/// assert_eq!(parsed.operator(), Operator::GreaterThanOrEqual);
/// assert!(QueryPredicate::parse("age", "~=", 18).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPredicate {
    field: String,
    operator: Operator,
    value: Value,
}

impl QueryPredicate {
    pub fn new<T: Into<Value>>(field: &str, operator: Operator, value: T) -> Self {
        QueryPredicate {
            field: field.to_string(),
            operator,
            value: value.into(),
        }
    }

    /// Builds a predicate from a textual operator such as `"array-contains"`.
    ///
    /// # Errors
    ///
    /// Unknown operators fail with [`ErrorKind::InvalidQuery`].
    pub fn parse<T: Into<Value>>(field: &str, operator: &str, value: T) -> CinderResult<Self> {
        Ok(QueryPredicate::new(field, operator.parse()?, value))
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Validates the predicate and converts its operand to stored form.
    pub(crate) fn compile(&self) -> CinderResult<CompiledPredicate> {
        if self.field.is_empty() {
            return Err(invalid_query("Query predicates need a non-empty field"));
        }

        let operand = match to_storage_value(&self.value) {
            Ok(Some(operand)) => operand,
            Ok(None) => {
                return Err(invalid_query(&format!(
                    "Predicate on '{}' has an absent operand",
                    self.field
                )))
            }
            Err(err) => {
                log::error!("Predicate operand for '{}' cannot be stored: {}", self.field, err);
                return Err(CinderError::new_with_cause(
                    &format!("Predicate on '{}' has an invalid operand", self.field),
                    ErrorKind::InvalidQuery,
                    err,
                ));
            }
        };

        if self.operator.takes_list() {
            match operand.as_array() {
                Some(values) if !values.is_empty() => {}
                _ => {
                    return Err(invalid_query(&format!(
                        "Operator '{}' on '{}' needs a non-empty list operand",
                        self.operator, self.field
                    )))
                }
            }
        }

        Ok(CompiledPredicate {
            field: self.field.clone(),
            operator: self.operator,
            operand,
        })
    }
}

impl Display for QueryPredicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.field, self.operator, self.value)
    }
}

pub(crate) fn invalid_query(message: &str) -> CinderError {
    log::error!("{}", message);
    CinderError::new(message, ErrorKind::InvalidQuery)
}

#[derive(Debug, Clone)]
pub(crate) struct CompiledPredicate {
    field: String,
    operator: Operator,
    operand: StoredValue,
}

impl CompiledPredicate {
    pub(crate) fn matches(&self, fields: &StoredFields) -> bool {
        let Some(actual) = lookup(fields, &self.field) else {
            return false;
        };

        match self.operator {
            Operator::Equal => *actual == self.operand,
            Operator::NotEqual => *actual != self.operand,
            Operator::LessThan => self.compare(actual, |o| o.is_lt()),
            Operator::LessThanOrEqual => self.compare(actual, |o| o.is_le()),
            Operator::GreaterThan => self.compare(actual, |o| o.is_gt()),
            Operator::GreaterThanOrEqual => self.compare(actual, |o| o.is_ge()),
            Operator::In => self.operand_list().contains(actual),
            Operator::NotIn => !self.operand_list().contains(actual),
            Operator::ArrayContains => actual
                .as_array()
                .is_some_and(|values| values.contains(&self.operand)),
            Operator::ArrayContainsAny => actual.as_array().is_some_and(|values| {
                values.iter().any(|value| self.operand_list().contains(value))
            }),
        }
    }

    // range operators only compare values of the same type
    fn compare<F: Fn(std::cmp::Ordering) -> bool>(&self, actual: &StoredValue, accept: F) -> bool {
        actual.is_comparable_with(&self.operand) && accept(actual.cmp(&self.operand))
    }

    fn operand_list(&self) -> &[StoredValue] {
        self.operand.as_array().map(Vec::as_slice).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::to_storage;
    use crate::doc;

    fn stored(document: crate::collection::Document) -> StoredFields {
        to_storage(Some(&document)).unwrap()
    }

    fn matches(predicate: QueryPredicate, fields: &StoredFields) -> bool {
        predicate.compile().unwrap().matches(fields)
    }

    #[test]
    fn test_operator_parsing() {
        for symbol in [
            "==", "!=", "<", "<=", ">", ">=", "in", "not-in", "array-contains",
            "array-contains-any",
        ] {
            let operator: Operator = symbol.parse().unwrap();
            assert_eq!(operator.symbol(), symbol);
        }
        let err = "contains".parse::<Operator>().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidQuery);
    }

    #[test]
    fn test_comparisons() {
        let fields = stored(doc! { age: 30, name: "Ann" });
        assert!(matches(QueryPredicate::new("age", Operator::Equal, 30), &fields));
        assert!(matches(QueryPredicate::new("age", Operator::Equal, 30.0), &fields));
        assert!(matches(QueryPredicate::new("age", Operator::NotEqual, 31), &fields));
        assert!(matches(QueryPredicate::new("age", Operator::GreaterThan, 29), &fields));
        assert!(matches(QueryPredicate::new("age", Operator::LessThanOrEqual, 30), &fields));
        assert!(!matches(QueryPredicate::new("age", Operator::LessThan, 30), &fields));
    }

    #[test]
    fn test_range_comparison_requires_same_type() {
        let fields = stored(doc! { age: 30 });
        assert!(!matches(QueryPredicate::new("age", Operator::LessThan, "abc"), &fields));
        assert!(!matches(QueryPredicate::new("age", Operator::GreaterThan, false), &fields));
    }

    #[test]
    fn test_missing_field_never_matches() {
        let fields = stored(doc! { name: "Ann" });
        assert!(!matches(QueryPredicate::new("age", Operator::NotEqual, 1), &fields));
        assert!(!matches(QueryPredicate::new("age", Operator::NotIn, vec![1]), &fields));
    }

    #[test]
    fn test_membership() {
        let fields = stored(doc! { role: "ops", tags: ["a", "b"] });
        assert!(matches(QueryPredicate::new("role", Operator::In, vec!["dev", "ops"]), &fields));
        assert!(!matches(QueryPredicate::new("role", Operator::NotIn, vec!["ops"]), &fields));
        assert!(matches(QueryPredicate::new("tags", Operator::ArrayContains, "b"), &fields));
        assert!(!matches(QueryPredicate::new("role", Operator::ArrayContains, "ops"), &fields));
        assert!(matches(
            QueryPredicate::new("tags", Operator::ArrayContainsAny, vec!["x", "a"]),
            &fields
        ));
        assert!(!matches(
            QueryPredicate::new("tags", Operator::ArrayContainsAny, vec!["x", "y"]),
            &fields
        ));
    }

    #[test]
    fn test_nested_field_paths() {
        let fields = stored(doc! { address: { city: "Paris" } });
        assert!(matches(QueryPredicate::new("address.city", Operator::Equal, "Paris"), &fields));
        assert!(!matches(QueryPredicate::new("address.zip", Operator::Equal, "75"), &fields));
    }

    #[test]
    fn test_invalid_operands() {
        let empty: Vec<i64> = vec![];
        let err = QueryPredicate::new("role", Operator::In, empty).compile().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidQuery);

        let err = QueryPredicate::new("role", Operator::In, "ops").compile().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidQuery);

        let err = QueryPredicate::new("score", Operator::Equal, f64::NAN).compile().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidQuery);

        let err = QueryPredicate::new("", Operator::Equal, 1).compile().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidQuery);
    }
}
