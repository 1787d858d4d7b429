#![no_main]
use libfuzzer_sys::fuzz_target;
use shape_guard::{get_compiled_validators, get_validators, Schema, SerdeSchema, Validator};

fuzz_target!(|schema_and_instance: (SerdeSchema, Vec<u8>)| {
    // We're only interested in fuzzing against valid schemas.
    let schema = match Schema::from_serde_schema(schema_and_instance.0) {
        Ok(schema) => schema,
        Err(_) => return,
    };

    if let Ok(instance) = serde_json::from_slice(&schema_and_instance.1) {
        let compiled = get_compiled_validators(&schema);
        assert_eq!(
            get_validators(&schema).validate(&instance),
            compiled.validate(&instance)
        );
    }
});
