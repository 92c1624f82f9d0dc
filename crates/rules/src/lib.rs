pub mod integer_arithmetic;
pub mod missing_access_control;
mod patterns;
pub mod reentrancy;
pub mod timestamp_dependence;
pub mod tx_origin;
pub mod unchecked_call;
pub mod unprotected_selfdestruct;

use solguard::rule::{Rule, RuleRegistry};

/// Returns all built-in rules in detection order
pub fn all_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(reentrancy::Reentrancy),
        Box::new(missing_access_control::MissingAccessControl),
        Box::new(unchecked_call::UncheckedCall),
        Box::new(integer_arithmetic::IntegerArithmetic),
        Box::new(tx_origin::TxOrigin),
        Box::new(unprotected_selfdestruct::UnprotectedSelfdestruct),
        Box::new(timestamp_dependence::TimestampDependence),
    ]
}

/// Registry pre-loaded with every built-in rule
pub fn default_registry() -> RuleRegistry {
    let mut registry = RuleRegistry::new();
    registry.register_all(all_rules());
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_names_are_unique() {
        let registry = default_registry();
        let mut names = registry.list_rules();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
        assert_eq!(total, 7);
    }
}
