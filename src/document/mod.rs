//! Documents are plain `serde_json` trees; this module holds the navigation
//! helpers shared by decomposition and assembly.

pub mod assemble;
pub mod decompose;

use serde_json::{Map, Value};

use crate::error::Error;

/// One table row (or one nested object) as a JSON object.
pub type Entry = Map<String, Value>;

/// The value at `path`, if present.
pub fn nested_value<'a>(document: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = document;
    for segment in path {
        current = current.get(segment)?;
    }
    Some(current)
}

/// The string at `path`; an error when absent or not a string.
pub fn nested_string<'a>(document: &'a Value, path: &[String]) -> Result<&'a str, Error> {
    nested_value(document, path)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::decomposition(path, "expected a string"))
}
