//! Struct diff helpers
//!
//! `is_zero_struct` decides whether an optional nested block was left empty
//! so it can be dropped from a request; `is_same_struct` decides whether a
//! block changed between prior state and plan.
//!
//! Collection equality follows the model types: list attributes
//! (`Vec<String>`) and list blocks (`Vec<B>`) are order-sensitive, set
//! attributes (`BTreeSet<String>`) are not.

use crate::value::Value;

/// Per-type "every field is null" predicate
pub trait IsZero {
    fn is_zero(&self) -> bool;
}

impl<T> IsZero for Value<T> {
    fn is_zero(&self) -> bool {
        self.is_null()
    }
}

impl<B: IsZero> IsZero for Option<B> {
    fn is_zero(&self) -> bool {
        self.as_ref().map_or(true, IsZero::is_zero)
    }
}

impl<B> IsZero for Vec<B> {
    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

/// True when every field of `x` is unset
pub fn is_zero_struct<T: IsZero + ?Sized>(x: &T) -> bool {
    x.is_zero()
}

/// Deep equality over all fields, nested blocks included
pub fn is_same_struct<T: PartialEq + ?Sized>(a: &T, b: &T) -> bool {
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Override {
        pop: Value<String>,
        port: Value<i64>,
        domains: Value<BTreeSet<String>>,
        servers: Value<Vec<String>>,
    }

    impl IsZero for Override {
        fn is_zero(&self) -> bool {
            self.pop.is_zero() && self.port.is_zero() && self.domains.is_zero() && self.servers.is_zero()
        }
    }

    fn set(items: &[&str]) -> Value<BTreeSet<String>> {
        Value::Known(items.iter().map(|s| s.to_string()).collect())
    }

    fn list(items: &[&str]) -> Value<Vec<String>> {
        Value::Known(items.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_all_null_is_zero() {
        assert!(is_zero_struct(&Override::default()));
        assert!(is_zero_struct(&None::<Override>));
        assert!(is_zero_struct(&Some(Override::default())));
        assert!(is_zero_struct(&Vec::<Override>::new()));
    }

    #[test]
    fn test_any_field_set_is_not_zero() {
        let with_pop = Override {
            pop: Value::from("fra1"),
            ..Default::default()
        };
        assert!(!is_zero_struct(&with_pop));

        let with_empty_set = Override {
            domains: Value::Known(BTreeSet::new()),
            ..Default::default()
        };
        assert!(!is_zero_struct(&with_empty_set));

        let with_unknown = Override {
            port: Value::Unknown,
            ..Default::default()
        };
        assert!(!is_zero_struct(&with_unknown));
    }

    #[test]
    fn test_same_struct_is_reflexive() {
        let a = Override {
            pop: Value::from("fra1"),
            port: Value::Known(53),
            domains: set(&["a.example.com"]),
            servers: list(&["10.0.0.1", "10.0.0.2"]),
        };
        assert!(is_same_struct(&a, &a.clone()));
    }

    #[test]
    fn test_single_scalar_difference() {
        let a = Override {
            pop: Value::from("fra1"),
            port: Value::Known(53),
            ..Default::default()
        };
        let b = Override {
            port: Value::Known(5353),
            ..a.clone()
        };
        assert!(!is_same_struct(&a, &b));

        let c = Override {
            pop: Value::Null,
            ..a.clone()
        };
        assert!(!is_same_struct(&a, &c));
    }

    #[test]
    fn test_set_order_insensitive_list_order_sensitive() {
        let a = Override {
            domains: set(&["a", "b"]),
            servers: list(&["1", "2"]),
            ..Default::default()
        };
        let reordered_set = Override {
            domains: set(&["b", "a"]),
            ..a.clone()
        };
        assert!(is_same_struct(&a, &reordered_set));

        let reordered_list = Override {
            servers: list(&["2", "1"]),
            ..a.clone()
        };
        assert!(!is_same_struct(&a, &reordered_list));
    }

    #[test]
    fn test_block_lists_are_ordered() {
        let x = Override {
            pop: Value::from("x"),
            ..Default::default()
        };
        let y = Override {
            pop: Value::from("y"),
            ..Default::default()
        };
        assert!(is_same_struct(&vec![x.clone(), y.clone()], &vec![x.clone(), y.clone()]));
        assert!(!is_same_struct(&vec![x.clone(), y.clone()], &vec![y, x]));
    }
}
