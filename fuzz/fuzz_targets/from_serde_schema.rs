#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|serde_schema: shape_guard::SerdeSchema| {
    let _ = shape_guard::Schema::from_serde_schema(serde_schema);
});
