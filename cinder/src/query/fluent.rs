use crate::common::Value;
use crate::query::{Operator, QueryPredicate};

/// Starts a fluent predicate on `field_name`.
///
/// ```rust
/// use cinder::query::{field, Operator};
///
/// let adults = field("age").gte(18);
/// assert_eq!(adults.operator(), Operator::GreaterThanOrEqual);
/// let tagged = field("tags").array_contains_any(vec!["admin", "ops"]);
/// assert_eq!(tagged.field(), "tags");
/// ```
pub fn field(field_name: &str) -> FluentPredicate {
    FluentPredicate {
        field_name: field_name.to_string(),
    }
}

/// Builder returned by [field].
pub struct FluentPredicate {
    field_name: String,
}

impl FluentPredicate {
    fn with<T: Into<Value>>(self, operator: Operator, value: T) -> QueryPredicate {
        QueryPredicate::new(&self.field_name, operator, value)
    }

    pub fn eq<T: Into<Value>>(self, value: T) -> QueryPredicate {
        self.with(Operator::Equal, value)
    }

    pub fn ne<T: Into<Value>>(self, value: T) -> QueryPredicate {
        self.with(Operator::NotEqual, value)
    }

    pub fn lt<T: Into<Value>>(self, value: T) -> QueryPredicate {
        self.with(Operator::LessThan, value)
    }

    pub fn lte<T: Into<Value>>(self, value: T) -> QueryPredicate {
        self.with(Operator::LessThanOrEqual, value)
    }

    pub fn gt<T: Into<Value>>(self, value: T) -> QueryPredicate {
        self.with(Operator::GreaterThan, value)
    }

    pub fn gte<T: Into<Value>>(self, value: T) -> QueryPredicate {
        self.with(Operator::GreaterThanOrEqual, value)
    }

    /// Matches when the field equals one of `values`.
    pub fn in_array<T: Into<Value>>(self, values: Vec<T>) -> QueryPredicate {
        self.with(Operator::In, values)
    }

    pub fn not_in_array<T: Into<Value>>(self, values: Vec<T>) -> QueryPredicate {
        self.with(Operator::NotIn, values)
    }

    /// Matches when the field is a list holding `value`.
    pub fn array_contains<T: Into<Value>>(self, value: T) -> QueryPredicate {
        self.with(Operator::ArrayContains, value)
    }

    pub fn array_contains_any<T: Into<Value>>(self, values: Vec<T>) -> QueryPredicate {
        self.with(Operator::ArrayContainsAny, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fluent_operators() {
        assert_eq!(field("a").eq(1).operator(), Operator::Equal);
        assert_eq!(field("a").ne(1).operator(), Operator::NotEqual);
        assert_eq!(field("a").lt(1).operator(), Operator::LessThan);
        assert_eq!(field("a").lte(1).operator(), Operator::LessThanOrEqual);
        assert_eq!(field("a").gt(1).operator(), Operator::GreaterThan);
        assert_eq!(field("a").gte(1).operator(), Operator::GreaterThanOrEqual);
        assert_eq!(field("a").in_array(vec![1]).operator(), Operator::In);
        assert_eq!(field("a").not_in_array(vec![1]).operator(), Operator::NotIn);
        assert_eq!(field("a").array_contains(1).operator(), Operator::ArrayContains);
        assert_eq!(
            field("a").array_contains_any(vec![1, 2]).value(),
            &Value::from(vec![1, 2])
        );
    }
}
