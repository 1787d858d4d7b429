use crate::validate::validate_object;
use crate::{Schema, ValidateOptions};
use serde_json::Value;

/// A `validate`/`parse` pair bound to one schema.
pub trait Validator {
    /// Returns whether `instance` conforms. `None` stands for an absent value.
    fn validate_member(&self, instance: Option<&Value>) -> bool;

    /// Returns whether `instance` conforms.
    fn validate(&self, instance: &Value) -> bool {
        self.validate_member(Some(instance))
    }

    /// Returns `instance` unchanged.
    ///
    /// This performs no checks at all. Only call it on a value that
    /// [`validate`][`Validator::validate`] has already accepted.
    fn parse(&self, instance: Value) -> Value {
        instance
    }
}

/// Validators that walk the schema tree on every call.
#[derive(Clone, Debug)]
pub struct Validators {
    schema: Schema,
    options: ValidateOptions,
}

impl Validator for Validators {
    fn validate_member(&self, instance: Option<&Value>) -> bool {
        validate_object(self.schema.object(), instance, self.options)
    }
}

pub fn get_validators(schema: &Schema) -> Validators {
    get_validators_with(schema, ValidateOptions::new())
}

pub fn get_validators_with(schema: &Schema, options: ValidateOptions) -> Validators {
    Validators {
        schema: schema.clone(),
        options,
    }
}
