//! Property-based tests for fragment merging using proptest.

use indexmap::IndexMap;
use lineage::{merge, FieldSpec, Fragment, Schema};
use proptest::prelude::*;
use serde_yaml::Value;

// ============================================================================
// Test helpers
// ============================================================================

#[derive(Debug, Clone)]
struct Declared {
    description: Option<String>,
    stylesheets: Option<Vec<String>>,
    javascripts: Option<Vec<String>>,
}

fn assets() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{1,8}\\.(css|js)", 0..4)
}

fn declared_strategy() -> impl Strategy<Value = Declared> {
    (
        prop::option::of("[A-Za-z ]{1,20}"),
        prop::option::of(assets()),
        prop::option::of(assets()),
    )
        .prop_map(|(description, stylesheets, javascripts)| Declared {
            description,
            stylesheets,
            javascripts,
        })
}

fn sequence(items: &[String]) -> Value {
    Value::Sequence(items.iter().cloned().map(Value::String).collect())
}

fn fragments(chain: &[Declared]) -> Vec<Fragment> {
    chain
        .iter()
        .enumerate()
        .map(|(i, declared)| {
            let mut values = IndexMap::new();
            values.insert("name".to_string(), Value::String(format!("t{}", i)));
            if let Some(description) = &declared.description {
                values.insert("description".to_string(), Value::String(description.clone()));
            }
            if let Some(stylesheets) = &declared.stylesheets {
                values.insert("stylesheets".to_string(), sequence(stylesheets));
            }
            if let Some(javascripts) = &declared.javascripts {
                values.insert("javascripts".to_string(), sequence(javascripts));
            }
            Fragment::new(format!("themes/t{}/theme.yml", i), values)
        })
        .collect()
}

fn last_declared<T: Clone>(chain: &[Declared], field: impl Fn(&Declared) -> Option<T>) -> Option<T> {
    chain.iter().rev().find_map(field)
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    /// Every key takes the value of the most specific fragment that sets it.
    #[test]
    fn most_specific_value_wins(chain in prop::collection::vec(declared_strategy(), 1..6)) {
        let merged = merge(&fragments(&chain), &Schema::theme()).unwrap();

        let expected_name = format!("t{}", chain.len() - 1);
        prop_assert_eq!(merged.scalar("name"), Some(expected_name.as_str()));

        let description = last_declared(&chain, |d| d.description.clone());
        prop_assert_eq!(merged.scalar("description"), description.as_deref());

        let stylesheets = last_declared(&chain, |d| d.stylesheets.clone()).unwrap_or_default();
        prop_assert_eq!(merged.list("stylesheets"), stylesheets.as_slice());

        let javascripts = last_declared(&chain, |d| d.javascripts.clone()).unwrap_or_default();
        prop_assert_eq!(merged.list("javascripts"), javascripts.as_slice());
    }

    /// Appendable lists concatenate every declaration, root first.
    #[test]
    fn appendable_lists_concatenate(chain in prop::collection::vec(declared_strategy(), 1..6)) {
        let schema = Schema::new()
            .field(FieldSpec::string("name").required())
            .field(FieldSpec::string("description"))
            .field(FieldSpec::list("stylesheets").appendable())
            .field(FieldSpec::list("javascripts"));
        let merged = merge(&fragments(&chain), &schema).unwrap();

        let expected: Vec<String> = chain
            .iter()
            .filter_map(|d| d.stylesheets.clone())
            .flatten()
            .collect();
        prop_assert_eq!(merged.list("stylesheets"), expected.as_slice());
    }

    /// Merging the same fragments twice gives the same result.
    #[test]
    fn merge_is_deterministic(chain in prop::collection::vec(declared_strategy(), 1..6)) {
        let fragments = fragments(&chain);
        let first = merge(&fragments, &Schema::theme()).unwrap();
        let second = merge(&fragments, &Schema::theme()).unwrap();
        prop_assert_eq!(first, second);
    }
}
