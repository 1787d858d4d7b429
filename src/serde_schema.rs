use crate::{Leaf, ObjectField, Schema, SchemaField};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// A JSON representation of schemas, compatible with `serde_json`.
///
/// To convert this into a [`Schema`][`crate::Schema`], see
/// [`Schema::from_serde_schema`][`crate::Schema::from_serde_schema`].
///
/// ```
/// use shape_guard::SerdeSchema;
/// use serde_json::json;
///
/// let expected = SerdeSchema {
///     type_: "string".to_owned(),
///     is_nullable: Some(true),
///     ..Default::default()
/// };
/// let parsed: SerdeSchema =
///     serde_json::from_value(json!({ "type": "string", "isNullable": true })).unwrap();
///
/// assert_eq!(expected, parsed);
/// ```
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
#[cfg_attr(feature = "fuzz", derive(arbitrary::Arbitrary))]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
pub struct SerdeSchema {
    pub type_: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, SerdeSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_nullable: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_optional: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FromSerdeSchemaError {
    #[error("invalid type: {0:?}")]
    InvalidType(String),

    #[error("fields given on a {0} schema")]
    FieldsOnLeaf(&'static str),

    #[error("object schema has no fields")]
    MissingFields,

    #[error("root schema must be an object, got {0:?}")]
    RootNotObject(String),
}

impl SchemaField {
    pub fn from_serde_schema(serde_schema: SerdeSchema) -> Result<Self, FromSerdeSchemaError> {
        let nullable = serde_schema.is_nullable.unwrap_or(false);
        let optional = serde_schema.is_optional.unwrap_or(false);

        let leaf = Leaf { nullable, optional };
        let field = match serde_schema.type_.as_str() {
            "string" => SchemaField::String(leaf),
            "number" => SchemaField::Number(leaf),
            "object" => {
                let fields = serde_schema
                    .fields
                    .ok_or(FromSerdeSchemaError::MissingFields)?
                    .into_iter()
                    .map(|(name, sub_schema)| {
                        Ok::<_, FromSerdeSchemaError>((name, Self::from_serde_schema(sub_schema)?))
                    })
                    .collect::<Result<_, _>>()?;

                return Ok(SchemaField::Object(ObjectField {
                    fields: Arc::new(fields),
                    nullable,
                    optional,
                }));
            }
            other => return Err(FromSerdeSchemaError::InvalidType(other.to_owned())),
        };

        if serde_schema.fields.is_some() {
            return Err(FromSerdeSchemaError::FieldsOnLeaf(field.type_name()));
        }

        Ok(field)
    }
}

impl Schema {
    /// Converts a [`SerdeSchema`] into a root schema.
    ///
    /// ```
    /// use shape_guard::{Schema, SerdeSchema};
    /// use serde_json::json;
    ///
    /// let schema = Schema::from_serde_schema(serde_json::from_value(json!({
    ///     "type": "object",
    ///     "fields": { "foo": { "type": "string" } },
    /// })).unwrap()).unwrap();
    ///
    /// assert_eq!(Schema::new(vec![("foo", shape_guard::string())]), schema);
    /// ```
    pub fn from_serde_schema(serde_schema: SerdeSchema) -> Result<Self, FromSerdeSchemaError> {
        match SchemaField::from_serde_schema(serde_schema)? {
            SchemaField::Object(object) => Ok(object.into()),
            other => Err(FromSerdeSchemaError::RootNotObject(
                other.type_name().to_owned(),
            )),
        }
    }
}

impl From<&SchemaField> for SerdeSchema {
    fn from(field: &SchemaField) -> Self {
        let mut out = SerdeSchema {
            type_: field.type_name().to_owned(),
            ..Default::default()
        };

        if field.is_nullable() {
            out.is_nullable = Some(true);
        }

        if field.is_optional() {
            out.is_optional = Some(true);
        }

        if let SchemaField::Object(object) = field {
            out.fields = Some(
                object
                    .fields
                    .iter()
                    .map(|(name, sub_schema)| (name.clone(), sub_schema.into()))
                    .collect(),
            );
        }

        out
    }
}

impl From<&Schema> for SerdeSchema {
    fn from(schema: &Schema) -> Self {
        (&SchemaField::from(schema)).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{number, object, string};
    use serde_json::json;

    #[test]
    fn serialize_object_shape() {
        let schema = Schema::new(vec![("foo", string()), ("bar", number().nullable())]);

        assert_eq!(
            json!({
                "type": "object",
                "fields": {
                    "foo": { "type": "string" },
                    "bar": { "type": "number", "isNullable": true },
                },
            }),
            serde_json::to_value(SerdeSchema::from(&schema)).unwrap()
        );
    }

    #[test]
    fn parse_nested() {
        let serde_schema: SerdeSchema = serde_json::from_value(json!({
            "type": "object",
            "fields": {
                "obj": {
                    "type": "object",
                    "fields": { "foo": { "type": "number", "isOptional": true } },
                    "isNullable": true,
                },
            },
        }))
        .unwrap();

        assert_eq!(
            Schema::new(vec![(
                "obj",
                object(vec![("foo", number().optional())]).nullable()
            )]),
            Schema::from_serde_schema(serde_schema).unwrap()
        );
    }

    #[test]
    fn parse_rejects_unknown_keys() {
        assert!(serde_json::from_value::<SerdeSchema>(json!({
            "type": "string",
            "nullable": true,
        }))
        .is_err());
    }

    #[test]
    fn convert_errors() {
        let convert = |value| {
            Schema::from_serde_schema(serde_json::from_value(value).unwrap()).map(|_| ())
        };

        assert_eq!(
            Err(FromSerdeSchemaError::InvalidType("boolean".to_owned())),
            convert(json!({ "type": "object", "fields": { "foo": { "type": "boolean" } } }))
        );
        assert_eq!(
            Err(FromSerdeSchemaError::FieldsOnLeaf("string")),
            convert(json!({
                "type": "object",
                "fields": { "foo": { "type": "string", "fields": {} } }
            }))
        );
        assert_eq!(
            Err(FromSerdeSchemaError::MissingFields),
            convert(json!({ "type": "object" }))
        );
        assert_eq!(
            Err(FromSerdeSchemaError::RootNotObject("number".to_owned())),
            convert(json!({ "type": "number" }))
        );
    }

    #[test]
    fn convert_back() {
        let json = json!({
            "type": "object",
            "fields": {
                "a": { "type": "string", "isNullable": true, "isOptional": true },
                "b": { "type": "object", "fields": {}, "isOptional": true },
            },
            "isNullable": true,
        });

        let schema =
            Schema::from_serde_schema(serde_json::from_value(json.clone()).unwrap()).unwrap();
        assert_eq!(json, serde_json::to_value(SerdeSchema::from(&schema)).unwrap());
    }
}
