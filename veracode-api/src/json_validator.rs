//! JSON decoding with a nesting-depth guard.
//!
//! Every resource client decodes through [`decode_json`]. A body that is not
//! JSON, is nested deeper than [`MAX_JSON_DEPTH`], or does not match the
//! target type becomes a [`VeracodeError::Decode`] carrying the raw body.
//! Nothing is ever defaulted on a failed decode.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::VeracodeError;

/// Maximum allowed JSON nesting depth.
///
/// Real responses from the applications and findings APIs stay below 10.
pub const MAX_JSON_DEPTH: usize = 32;

/// Validate the nesting depth of an already parsed document.
///
/// # Errors
///
/// Returns a message naming the actual depth when it exceeds `max_depth`.
pub fn validate_json_depth(value: &Value, max_depth: usize) -> Result<(), String> {
    let depth = calculate_depth(value);
    if depth > max_depth {
        return Err(format!(
            "JSON nesting depth {depth} exceeds maximum allowed depth of {max_depth}"
        ));
    }
    Ok(())
}

/// Maximum nesting depth: 0 for scalars, 1 per enclosing array or object.
///
/// Walks with an explicit stack so hostile input cannot exhaust the call stack.
fn calculate_depth(value: &Value) -> usize {
    let mut max_depth = 0_usize;
    let mut stack: Vec<(&Value, usize)> = vec![(value, 0)];

    while let Some((current, depth)) = stack.pop() {
        match current {
            Value::Array(items) => {
                let here = depth.saturating_add(1);
                max_depth = max_depth.max(here);
                stack.extend(items.iter().map(|v| (v, here)));
            }
            Value::Object(map) => {
                let here = depth.saturating_add(1);
                max_depth = max_depth.max(here);
                stack.extend(map.values().map(|v| (v, here)));
            }
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
        }
    }

    max_depth
}

/// Decode a response body into `T`.
///
/// `context` names the endpoint for the error message, e.g. `"applications"`.
///
/// # Errors
///
/// `VeracodeError::Decode` with the raw body when the bytes are not JSON, are
/// nested too deeply, or do not match `T`.
pub fn decode_json<T: DeserializeOwned>(
    context: &'static str,
    body: &[u8],
) -> Result<T, VeracodeError> {
    let decode_error = |message: String| VeracodeError::Decode {
        context,
        message,
        body: String::from_utf8_lossy(body).into_owned(),
    };

    let value: Value =
        serde_json::from_slice(body).map_err(|e| decode_error(format!("Invalid JSON: {e}")))?;
    validate_json_depth(&value, MAX_JSON_DEPTH).map_err(decode_error)?;

    serde_json::from_value(value).map_err(|e| {
        log::debug!("{context} response did not match the expected shape: {e}");
        decode_error(e.to_string())
    })
}
