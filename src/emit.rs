//! Renders a schema tree as a boolean check expression.
//!
//! The expression refers to the value under test as [`ROOT`]. Each nested
//! member is bound to a local name once (`let v1 = value["name"] in (...)`),
//! so the text grows linearly with schema depth. Only flags of the schema and
//! its field names are written into the text; field names always go through
//! JSON string escaping, so a name cannot break out of its literal.

use crate::{ObjectField, Schema, SchemaField, UnknownKeys, ValidateOptions};
use serde_json::Value;

/// Name the emitted expression uses for the value being validated.
pub const ROOT: &str = "value";

/// Emits the check expression for a whole schema, rooted at [`ROOT`].
pub fn emit_schema(schema: &Schema, options: ValidateOptions) -> String {
    let mut emitter = Emitter::new(options);
    emitter.object(schema.object(), ROOT, 0);
    emitter.out
}

/// Emits the check expression for `field`, applied to `access_path`.
///
/// ```
/// use shape_guard::{emit, string, ValidateOptions};
///
/// assert_eq!(
///     r#"(value === null ? false : (value === undefined ? false : (typeof value === "string")))"#,
///     emit(&string(), "value", ValidateOptions::new()),
/// );
/// ```
pub fn emit(field: &SchemaField, access_path: &str, options: ValidateOptions) -> String {
    let mut emitter = Emitter::new(options);
    emitter.field(field, access_path, 0);
    emitter.out
}

struct Emitter {
    options: ValidateOptions,
    out: String,
}

impl Emitter {
    fn new(options: ValidateOptions) -> Self {
        Self {
            options,
            out: String::new(),
        }
    }

    fn field(&mut self, field: &SchemaField, path: &str, depth: usize) {
        match field {
            SchemaField::String(leaf) => self.guarded(path, leaf.nullable, leaf.optional, |e| {
                e.type_check(path, "string")
            }),
            SchemaField::Number(leaf) => self.guarded(path, leaf.nullable, leaf.optional, |e| {
                e.type_check(path, "number")
            }),
            SchemaField::Object(object) => self.object(object, path, depth),
        }
    }

    fn object(&mut self, object: &ObjectField, path: &str, depth: usize) {
        self.guarded(path, object.nullable, object.optional, |e| {
            e.type_check(path, "object");

            let member = format!("v{}", depth + 1);
            for (name, sub_schema) in object.fields.iter() {
                let key = quote(name);
                e.out.push_str(&format!(
                    " && (!({} in {}) ? {} : (let {} = {}[{}] in (",
                    key,
                    path,
                    sub_schema.is_optional(),
                    member,
                    path,
                    key
                ));
                e.field(sub_schema, &member, depth + 1);
                e.out.push_str(")))");
            }

            if e.options.unknown_keys == UnknownKeys::Reject {
                e.out.push_str(&format!(" && onlyKeys({}", path));
                for name in object.fields.keys() {
                    e.out.push_str(", ");
                    e.out.push_str(&quote(name));
                }
                e.out.push(')');
            }
        });
    }

    fn guarded(
        &mut self,
        path: &str,
        nullable: bool,
        optional: bool,
        body: impl FnOnce(&mut Self),
    ) {
        self.out.push_str(&format!(
            "({} === null ? {} : ({} === undefined ? {} : (",
            path, nullable, path, optional
        ));
        body(self);
        self.out.push_str(")))");
    }

    fn type_check(&mut self, path: &str, type_name: &str) {
        self.out
            .push_str(&format!("typeof {} === {}", path, quote(type_name)));
    }
}

fn quote(s: &str) -> String {
    Value::from(s).to_string()
}
