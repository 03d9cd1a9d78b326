//! Declarative schema and the fragment merger.
//!
//! A [`Schema`] lists the keys a declaration may contain, their shape, whether
//! they are required and what they default to. [`merge`] folds an ordered list
//! of [`Fragment`]s (root-most ancestor first) into one validated
//! [`MergedConfig`].
//!
//! ## How Merging Works
//!
//! Fragments are applied left to right, so the most specific theme wins:
//!
//! 1. Scalar values from later fragments replace earlier ones
//! 2. List values are replaced as a whole, unless the field is
//!    [`ListMerge::Append`], in which case they are concatenated root first
//! 3. An explicit `null` leaves the key as it was
//! 4. Defaults fill keys that no fragment set
//!
//! Every problem found across all fragments is collected before failing, so a
//! single [`SchemaValidationError`] names all offending keys at once.

use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::loader::{describe_value, scalar_to_string, Fragment};

/// Shape of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A scalar; numbers and booleans are converted to their string form.
    String,
    /// A list of scalars.
    StringList,
}

impl FieldKind {
    fn expected(self) -> &'static str {
        match self {
            FieldKind::String => "a string",
            FieldKind::StringList => "a list of strings",
        }
    }
}

/// How list values from successive fragments combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListMerge {
    /// Later lists replace earlier ones.
    #[default]
    Replace,
    /// Later lists are appended to earlier ones.
    Append,
}

/// A normalized configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scalar(String),
    List(Vec<String>),
}

/// Declaration of one permitted key.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    name: String,
    kind: FieldKind,
    required: bool,
    default: Option<FieldValue>,
    list_merge: ListMerge,
}

impl FieldSpec {
    /// A scalar field.
    pub fn string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::String,
            required: false,
            default: None,
            list_merge: ListMerge::Replace,
        }
    }

    /// A list field.
    pub fn list(name: impl Into<String>) -> Self {
        Self {
            kind: FieldKind::StringList,
            ..Self::string(name)
        }
    }

    /// Marks the field as required. A default still satisfies the requirement.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the value used when no fragment provides the key.
    pub fn default_value(mut self, value: FieldValue) -> Self {
        self.default = Some(value);
        self
    }

    /// Makes list values from later fragments append rather than replace.
    pub fn appendable(mut self) -> Self {
        self.list_merge = ListMerge::Append;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn list_merge(&self) -> ListMerge {
        self.list_merge
    }
}

/// An ordered set of field declarations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: IndexMap<String, FieldSpec>,
}

impl Schema {
    /// Creates an empty schema that accepts no keys.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, replacing any previous declaration with the same name.
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.insert(spec.name.clone(), spec);
        self
    }

    /// The schema for theme declarations.
    ///
    /// ```yaml
    /// name: child          # required
    /// description: ...     # optional
    /// stylesheets: [...]   # default []
    /// javascripts: [...]   # default []
    /// parent: base         # optional
    /// ```
    pub fn theme() -> Self {
        Self::new()
            .field(FieldSpec::string("name").required())
            .field(FieldSpec::string("description"))
            .field(FieldSpec::list("stylesheets").default_value(FieldValue::List(Vec::new())))
            .field(FieldSpec::list("javascripts").default_value(FieldValue::List(Vec::new())))
            .field(FieldSpec::string("parent"))
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.values()
    }
}

/// The validated result of merging a chain of fragments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedConfig {
    values: IndexMap<String, FieldValue>,
}

impl MergedConfig {
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.values.get(key)
    }

    /// Returns a scalar value, or `None` if unset or not a scalar.
    pub fn scalar(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(FieldValue::Scalar(s)) => Some(s),
            _ => None,
        }
    }

    /// Returns a list value, or an empty slice if unset or not a list.
    pub fn list(&self, key: &str) -> &[String] {
        match self.values.get(key) {
            Some(FieldValue::List(items)) => items,
            _ => &[],
        }
    }

    pub fn values(&self) -> &IndexMap<String, FieldValue> {
        &self.values
    }
}

/// What is wrong with a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    /// The key is not declared in the schema.
    UnknownKey,
    /// The value cannot be converted to the declared shape.
    WrongType {
        expected: &'static str,
        found: String,
    },
    /// No fragment provided the key and the schema has no default.
    MissingRequired,
}

/// One schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// The offending key (list items are reported as `key[index]`).
    pub key: String,
    /// The fragment the value came from; `None` for missing keys.
    pub source: Option<PathBuf>,
    pub problem: Problem,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.problem {
            Problem::UnknownKey => write!(f, "unknown key '{}'", self.key)?,
            Problem::WrongType { expected, found } => write!(
                f,
                "key '{}' expects {}, found {}",
                self.key, expected, found
            )?,
            Problem::MissingRequired => write!(f, "missing required key '{}'", self.key)?,
        }
        if let Some(source) = &self.source {
            write!(f, " in {}", source.display())?;
        }
        Ok(())
    }
}

/// Error returned when merged configuration violates the schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid theme configuration: {}", join_violations(.violations))]
pub struct SchemaValidationError {
    pub violations: Vec<SchemaViolation>,
}

impl SchemaValidationError {
    /// The offending keys, in the order they were found.
    pub fn keys(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.key.as_str()).collect()
    }

    pub(crate) fn missing(key: &str) -> Self {
        Self {
            violations: vec![SchemaViolation {
                key: key.to_string(),
                source: None,
                problem: Problem::MissingRequired,
            }],
        }
    }
}

fn join_violations(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Merges fragments (root-most first) into one validated configuration.
///
/// # Errors
///
/// Returns a [`SchemaValidationError`] listing every unknown key, every value
/// of the wrong shape and every required key left unset.
pub fn merge(fragments: &[Fragment], schema: &Schema) -> Result<MergedConfig, SchemaValidationError> {
    let mut merged: IndexMap<String, FieldValue> = IndexMap::new();
    let mut violations = Vec::new();

    for fragment in fragments {
        for (key, raw) in fragment.values() {
            let Some(spec) = schema.get(key) else {
                violations.push(SchemaViolation {
                    key: key.clone(),
                    source: Some(fragment.source().to_path_buf()),
                    problem: Problem::UnknownKey,
                });
                continue;
            };

            let value = match normalize(key, raw, spec.kind, fragment.source()) {
                Ok(Some(value)) => value,
                Ok(None) => continue,
                Err(violation) => {
                    violations.push(violation);
                    continue;
                }
            };

            if spec.list_merge == ListMerge::Append {
                if let (Some(FieldValue::List(existing)), FieldValue::List(more)) =
                    (merged.get_mut(key), &value)
                {
                    existing.extend(more.iter().cloned());
                    continue;
                }
            }
            merged.insert(key.clone(), value);
        }
    }

    // Emit in schema order so the result does not depend on declaration order.
    let mut values = IndexMap::with_capacity(merged.len());
    for spec in schema.fields() {
        match merged.swap_remove(spec.name()) {
            Some(value) => {
                values.insert(spec.name().to_string(), value);
            }
            None => match &spec.default {
                Some(default) => {
                    values.insert(spec.name().to_string(), default.clone());
                }
                None if spec.required => violations.push(SchemaViolation {
                    key: spec.name().to_string(),
                    source: None,
                    problem: Problem::MissingRequired,
                }),
                None => {}
            },
        }
    }

    if violations.is_empty() {
        Ok(MergedConfig { values })
    } else {
        Err(SchemaValidationError { violations })
    }
}

/// Converts a raw value to the declared shape. `Ok(None)` means explicit null.
fn normalize(
    key: &str,
    raw: &Value,
    kind: FieldKind,
    source: &Path,
) -> Result<Option<FieldValue>, SchemaViolation> {
    let wrong_type = |key: String, found: &Value| SchemaViolation {
        key,
        source: Some(source.to_path_buf()),
        problem: Problem::WrongType {
            expected: kind.expected(),
            found: describe_value(found),
        },
    };

    if raw.is_null() {
        return Ok(None);
    }

    match kind {
        FieldKind::String => scalar_to_string(raw)
            .map(|s| Some(FieldValue::Scalar(s)))
            .ok_or_else(|| wrong_type(key.to_string(), raw)),
        FieldKind::StringList => {
            let Value::Sequence(items) = raw else {
                return Err(wrong_type(key.to_string(), raw));
            };
            items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    scalar_to_string(item).ok_or_else(|| wrong_type(format!("{}[{}]", key, i), item))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(|items| Some(FieldValue::List(items)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(source: &str, yaml: &str) -> Fragment {
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        let mut values = IndexMap::new();
        if let Value::Mapping(mapping) = value {
            for (k, v) in mapping {
                values.insert(k.as_str().unwrap().to_string(), v);
            }
        }
        Fragment::new(source, values)
    }

    #[test]
    fn test_single_fragment_gets_defaults() {
        let merged = merge(&[fragment("a", "name: solo")], &Schema::theme()).unwrap();

        assert_eq!(merged.scalar("name"), Some("solo"));
        assert_eq!(merged.get("stylesheets"), Some(&FieldValue::List(vec![])));
        assert_eq!(merged.get("javascripts"), Some(&FieldValue::List(vec![])));
        assert_eq!(merged.get("description"), None);
        assert_eq!(merged.get("parent"), None);
    }

    #[test]
    fn test_later_fragments_override() {
        let merged = merge(
            &[
                fragment("c", "name: c\ndescription: from c\nstylesheets: [c.css]"),
                fragment("b", "name: b\nparent: c\njavascripts: [b.js]"),
                fragment("a", "name: a\nparent: b\nstylesheets: [a.css]"),
            ],
            &Schema::theme(),
        )
        .unwrap();

        assert_eq!(merged.scalar("name"), Some("a"));
        assert_eq!(merged.scalar("parent"), Some("b"));
        assert_eq!(merged.scalar("description"), Some("from c"));
        assert_eq!(merged.list("stylesheets"), &["a.css".to_string()]);
        assert_eq!(merged.list("javascripts"), &["b.js".to_string()]);
    }

    #[test]
    fn test_lists_replace_not_concatenate() {
        let merged = merge(
            &[
                fragment("base", "name: base\nstylesheets: [a.css]"),
                fragment("child", "name: child\nparent: base\nstylesheets: [b.css]"),
            ],
            &Schema::theme(),
        )
        .unwrap();

        assert_eq!(merged.list("stylesheets"), &["b.css".to_string()]);
    }

    #[test]
    fn test_appendable_lists_concatenate_root_first() {
        let schema = Schema::theme().field(FieldSpec::list("stylesheets").appendable());
        let merged = merge(
            &[
                fragment("base", "name: base\nstylesheets: [a.css]"),
                fragment("child", "name: child\nstylesheets: [b.css, c.css]"),
            ],
            &schema,
        )
        .unwrap();

        assert_eq!(
            merged.list("stylesheets"),
            &["a.css".to_string(), "b.css".to_string(), "c.css".to_string()]
        );
    }

    #[test]
    fn test_explicit_null_keeps_inherited_value() {
        let merged = merge(
            &[
                fragment("base", "name: base\ndescription: inherited"),
                fragment("child", "name: child\ndescription: ~"),
            ],
            &Schema::theme(),
        )
        .unwrap();

        assert_eq!(merged.scalar("description"), Some("inherited"));
    }

    #[test]
    fn test_scalars_are_converted_to_strings() {
        let merged = merge(
            &[fragment("a", "name: 2024\nstylesheets: [1, true, x.css]")],
            &Schema::theme(),
        )
        .unwrap();

        assert_eq!(merged.scalar("name"), Some("2024"));
        assert_eq!(
            merged.list("stylesheets"),
            &["1".to_string(), "true".to_string(), "x.css".to_string()]
        );
    }

    #[test]
    fn test_collects_every_violation() {
        let err = merge(
            &[fragment(
                "bad/theme.yml",
                "colour: red\nstylesheets: main.css\njavascripts: [ok.js, [nested]]",
            )],
            &Schema::theme(),
        )
        .unwrap_err();

        assert_eq!(err.keys(), vec!["colour", "stylesheets", "javascripts[1]", "name"]);
        assert_eq!(err.violations[0].problem, Problem::UnknownKey);
        assert!(matches!(
            err.violations[1].problem,
            Problem::WrongType { expected: "a list of strings", .. }
        ));
        assert_eq!(err.violations[3].problem, Problem::MissingRequired);
    }

    #[test]
    fn test_required_key_satisfied_by_ancestor() {
        let merged = merge(
            &[fragment("base", "name: base"), fragment("child", "stylesheets: [x.css]")],
            &Schema::theme(),
        )
        .unwrap();

        assert_eq!(merged.scalar("name"), Some("base"));
    }

    #[test]
    fn test_mapping_value_is_wrong_type() {
        let err = merge(&[fragment("a", "name: {nested: true}")], &Schema::theme()).unwrap_err();
        assert!(matches!(
            &err.violations[0].problem,
            Problem::WrongType { found, .. } if found == "a mapping"
        ));
    }

    #[test]
    fn test_merged_output_follows_schema_order() {
        let merged = merge(
            &[fragment("a", "parent: p\nstylesheets: [s.css]\nname: a")],
            &Schema::theme(),
        )
        .unwrap();

        let keys: Vec<&str> = merged.values().keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["name", "stylesheets", "javascripts", "parent"]);
    }

    #[test]
    fn test_violation_display_mentions_source() {
        let err = merge(&[fragment("themes/x/theme.yml", "name: x\nbogus: 1")], &Schema::theme())
            .unwrap_err();
        let display = err.to_string();
        assert!(display.contains("unknown key 'bogus'"));
        assert!(display.contains("themes/x/theme.yml"));
    }
}
