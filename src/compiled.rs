use crate::validator::Validator;
use crate::{compile, emit_schema, Program, Schema, UnknownKeys, ValidateOptions};
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace};

/// Compiled programs of one schema instance, one slot per [`UnknownKeys`] mode.
#[derive(Debug, Default)]
pub(crate) struct ProgramCache {
    ignore: OnceCell<Arc<Program>>,
    reject: OnceCell<Arc<Program>>,
}

impl ProgramCache {
    fn cell(&self, unknown_keys: UnknownKeys) -> &OnceCell<Arc<Program>> {
        match unknown_keys {
            UnknownKeys::Ignore => &self.ignore,
            UnknownKeys::Reject => &self.reject,
        }
    }
}

/// Validators backed by a bytecode program compiled once per schema.
#[derive(Clone, Debug)]
pub struct CompiledValidators {
    program: Arc<Program>,
}

impl CompiledValidators {
    pub fn program(&self) -> &Program {
        &self.program
    }
}

impl Validator for CompiledValidators {
    fn validate_member(&self, instance: Option<&Value>) -> bool {
        self.program.evaluate(instance)
    }
}

pub fn get_compiled_validators(schema: &Schema) -> CompiledValidators {
    get_compiled_validators_with(schema, ValidateOptions::new())
}

/// Returns validators for `schema`, compiling it on first use.
///
/// The program is kept with `schema` (and its clones) and reused by every
/// later call with the same options. Concurrent first calls compile once; the
/// others wait for that result.
///
/// ```
/// use serde_json::json;
/// use shape_guard::{get_compiled_validators, number, string, Schema, Validator};
///
/// let schema = Schema::new(vec![("foo", string()), ("bar", number())]);
/// let validators = get_compiled_validators(&schema);
///
/// assert!(validators.validate(&json!({ "foo": "abc", "bar": 9 })));
/// assert!(!validators.validate(&json!(null)));
/// ```
pub fn get_compiled_validators_with(
    schema: &Schema,
    options: ValidateOptions,
) -> CompiledValidators {
    let cell = schema.programs().cell(options.unknown_keys);

    if let Some(program) = cell.get() {
        trace!(ops = program.len(), "reusing compiled schema");
        return CompiledValidators {
            program: Arc::clone(program),
        };
    }

    let program = cell.get_or_init(|| {
        let source = emit_schema(schema, options);
        let program = match compile(&source) {
            Ok(program) => program,
            Err(err) => unreachable!("emitted schema source does not compile: {}", err),
        };

        debug!(
            fields = schema.fields().len(),
            source_len = source.len(),
            slots = program.slots.len(),
            ops = program.len(),
            unknown_keys = ?options.unknown_keys,
            "compiled schema"
        );

        Arc::new(program)
    });

    CompiledValidators {
        program: Arc::clone(program),
    }
}
