use crate::{Leaf, ObjectField, Schema, SchemaField};
use serde_json::Value;

/// What an object node does with keys it does not declare.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum UnknownKeys {
    /// Undeclared keys are ignored; only declared fields are checked.
    #[default]
    Ignore,
    /// Any undeclared key makes the object invalid.
    Reject,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ValidateOptions {
    pub(crate) unknown_keys: UnknownKeys,
}

impl ValidateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unknown_keys(mut self, unknown_keys: UnknownKeys) -> Self {
        self.unknown_keys = unknown_keys;
        self
    }

    pub fn unknown_keys(&self) -> UnknownKeys {
        self.unknown_keys
    }
}

/// Returns whether `instance` conforms to `schema`, walking the schema tree.
///
/// ```
/// use serde_json::json;
/// use shape_guard::{number, string, validate, Schema, ValidateOptions};
///
/// let schema = Schema::new(vec![("foo", string()), ("bar", number())]);
///
/// assert!(validate(&schema, &json!({ "foo": "abc", "bar": 9 }), ValidateOptions::new()));
/// assert!(!validate(&schema, &json!({ "bar": 9 }), ValidateOptions::new()));
/// ```
pub fn validate(schema: &Schema, instance: &Value, options: ValidateOptions) -> bool {
    validate_object(schema.object(), Some(instance), options)
}

/// Validates a single node. `None` stands for an absent value.
pub fn validate_field(
    field: &SchemaField,
    instance: Option<&Value>,
    options: ValidateOptions,
) -> bool {
    match field {
        SchemaField::String(leaf) => validate_leaf(leaf, instance, Value::is_string),
        SchemaField::Number(leaf) => validate_leaf(leaf, instance, Value::is_number),
        SchemaField::Object(object) => validate_object(object, instance, options),
    }
}

fn validate_leaf(leaf: &Leaf, instance: Option<&Value>, is_type: fn(&Value) -> bool) -> bool {
    match instance {
        Some(Value::Null) => leaf.nullable,
        None => leaf.optional,
        Some(value) => is_type(value),
    }
}

pub(crate) fn validate_object(
    object: &ObjectField,
    instance: Option<&Value>,
    options: ValidateOptions,
) -> bool {
    let obj = match instance {
        Some(Value::Null) => return object.nullable,
        None => return object.optional,
        Some(Value::Object(obj)) => obj,
        Some(_) => return false,
    };

    // A missing member is validated as absent, which yields its `optional` flag.
    let declared_ok = object
        .fields
        .iter()
        .all(|(name, sub_schema)| validate_field(sub_schema, obj.get(name), options));

    declared_ok
        && match options.unknown_keys {
            UnknownKeys::Ignore => true,
            UnknownKeys::Reject => obj.keys().all(|name| object.fields.contains_key(name)),
        }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{number, object, string};
    use serde_json::json;

    fn opts() -> ValidateOptions {
        ValidateOptions::new()
    }

    fn strict() -> ValidateOptions {
        ValidateOptions::new().with_unknown_keys(UnknownKeys::Reject)
    }

    #[test]
    fn ignores_unknown_keys_by_default() {
        assert_eq!(UnknownKeys::Ignore, UnknownKeys::default());
        assert_eq!(UnknownKeys::Ignore, opts().unknown_keys());

        let schema = Schema::new(vec![("foo", string())]);
        assert!(validate(&schema, &json!({"foo": "", "bar": 1}), opts()));
    }

    #[test]
    fn basic_object() {
        let schema = Schema::new(vec![("foo", string()), ("bar", number())]);

        assert!(validate(&schema, &json!({"foo": "abc", "bar": 9}), opts()));
        assert!(!validate(&schema, &json!({"bar": 9}), opts()));
        assert!(!validate(&schema, &json!(null), opts()));
        assert!(!validate(&schema, &json!({"foo": 1, "bar": 9}), opts()));
        assert!(!validate(&schema, &json!({"foo": "abc", "bar": "9"}), opts()));
        assert!(validate(&schema, &json!({"foo": "abc", "bar": 9.5}), opts()));
    }

    #[test]
    fn non_objects_are_rejected() {
        let schema = Schema::new(Vec::<(String, SchemaField)>::new());

        for instance in &[json!(true), json!(1), json!("foo"), json!([]), json!([{}])] {
            assert!(!validate(&schema, instance, opts()), "{}", instance);
        }
    }

    #[test]
    fn nested_and_nullable() {
        let schema = Schema::new(vec![
            ("string", string()),
            ("stringNullable", string().nullable()),
            ("obj", object(vec![("foo", string())])),
        ]);

        assert!(validate(
            &schema,
            &json!({"string": "", "stringNullable": null, "obj": {"foo": ""}}),
            opts()
        ));
        assert!(!validate(
            &schema,
            &json!({"string": "", "stringNullable": null, "obj": {}}),
            opts()
        ));
        assert!(!validate(
            &schema,
            &json!({"string": "", "stringNullable": null, "obj": {"foo": null}}),
            opts()
        ));
        assert!(!validate(
            &schema,
            &json!({"string": "", "obj": {"foo": ""}}),
            opts()
        ));
    }

    #[test]
    fn optional_member() {
        let schema = Schema::new(vec![("foo", string()), ("opt", number().optional())]);

        assert!(validate(&schema, &json!({"foo": ""}), opts()));
        assert!(validate(&schema, &json!({"foo": "", "opt": 1}), opts()));
        assert!(!validate(&schema, &json!({"foo": "", "opt": "1"}), opts()));
        assert!(!validate(&schema, &json!({"foo": "", "opt": null}), opts()));
    }

    #[test]
    fn empty_object_accepts_any_object() {
        let schema = Schema::new(Vec::<(String, SchemaField)>::new());

        assert!(validate(&schema, &json!({}), opts()));
        assert!(validate(&schema, &json!({"extra": [1, 2]}), opts()));
        assert!(!validate(&schema, &json!(null), opts()));
        assert!(validate(&schema.nullable(), &json!(null), opts()));
    }

    #[test]
    fn absent_root_follows_optional() {
        let schema = Schema::new(vec![("foo", string())]);

        assert!(!validate_object(schema.object(), None, opts()));
        assert!(validate_object(schema.optional().object(), None, opts()));
    }

    #[test]
    fn extra_keys_ignored_by_default() {
        let schema = Schema::new(vec![("foo", string())]);
        let instance = json!({"foo": "", "bar": 1});

        assert!(validate(&schema, &instance, opts()));
        assert!(!validate(&schema, &instance, strict()));
        assert!(validate(&schema, &json!({"foo": ""}), strict()));
    }

    #[test]
    fn strict_mode_applies_to_nested_objects() {
        let schema = Schema::new(vec![
            ("obj", object(vec![("foo", string())])),
            ("opt", string().optional()),
        ]);

        assert!(validate(&schema, &json!({"obj": {"foo": ""}}), strict()));
        assert!(!validate(
            &schema,
            &json!({"obj": {"foo": "", "bar": ""}}),
            strict()
        ));
        assert!(validate(
            &schema,
            &json!({"obj": {"foo": ""}, "opt": ""}),
            strict()
        ));
    }

    #[test]
    fn leaf_fields() {
        assert!(validate_field(&string(), Some(&json!("")), opts()));
        assert!(!validate_field(&string(), Some(&json!(null)), opts()));
        assert!(!validate_field(&string(), None, opts()));
        assert!(validate_field(&string().nullable(), Some(&json!(null)), opts()));
        assert!(validate_field(&number().optional(), None, opts()));
        assert!(!validate_field(&number(), Some(&json!(false)), opts()));
    }
}
