//! Structural schemas for `serde_json` values.
//!
//! A [`Schema`] is a tree of object nodes with string and number leaves. Any
//! node may be marked nullable or optional. A schema can be checked in two
//! ways that always agree:
//!
//! - [`get_validators`] walks the schema tree on every call.
//! - [`get_compiled_validators`] emits a check expression for the schema once
//!   (see [`emit`]), compiles it to bytecode, and keeps the program with the
//!   schema for later calls.
//!
//! # Accepted shapes
//!
//! When `validate` returns `true`, the value has this shape:
//!
//! - a string leaf is a JSON string, a number leaf a JSON number;
//! - an object node is a JSON object whose declared members each satisfy
//!   their own schema. Members not declared are allowed unless
//!   [`UnknownKeys::Reject`] is selected. Arrays are never objects;
//! - a nullable node also accepts `null`;
//! - an optional node may be missing from its parent object.
//!
//! ```
//! use serde_json::json;
//! use shape_guard::{
//!     get_compiled_validators, get_validators, number, object, string, Schema, Validator,
//! };
//!
//! let schema = Schema::new(vec![
//!     ("name", string()),
//!     ("age", number().nullable()),
//!     ("address", object(vec![("city", string())]).optional()),
//! ]);
//!
//! let instance = json!({ "name": "Ada", "age": null });
//!
//! assert!(get_validators(&schema).validate(&instance));
//! assert!(get_compiled_validators(&schema).validate(&instance));
//! ```

mod compile;
mod compiled;
mod emit;
mod schema;
mod serde_schema;
mod validate;
mod validator;
mod vm;

pub use compile::{compile, CompileError};
pub use compiled::{get_compiled_validators, get_compiled_validators_with, CompiledValidators};
pub use emit::{emit, emit_schema, ROOT};
pub use schema::*;
pub use serde_schema::*;
pub use validate::*;
pub use validator::*;
pub use vm::Program;
