//! Input validation for untrusted request fields.
//! Pure functions; nothing here touches the network or the identity layer.

use crate::error::{BridgeError, BridgeResult, Field};
use crate::request::ExecutionRequest;

/// Longest server/database/application name accepted, in characters.
pub const MAX_NAME_CHARS: usize = 128;

/// Characters that would inject extra key/value pairs into a generated connection string.
const CONNECTION_STRING_DELIMITERS: &[char] = &['=', ';'];

/// A naming field must be present, non-blank, free of connection-string delimiters and
/// within the length limit.
pub fn is_valid_name(value: Option<&str>) -> bool {
    let Some(v) = value else { return false };
    if v.trim().is_empty() { return false; }
    if v.contains(CONNECTION_STRING_DELIMITERS) { return false; }
    v.chars().count() <= MAX_NAME_CHARS
}

pub fn is_valid_command(value: Option<&str>) -> bool {
    value.map(|v| !v.trim().is_empty()).unwrap_or(false)
}

/// Check the request in a fixed order; the first failing field wins.
pub fn validate(request: &ExecutionRequest) -> BridgeResult<()> {
    let names = [
        (Field::Application, request.application_name.as_deref()),
        (Field::Server, request.server_name.as_deref()),
        (Field::Database, request.database_name.as_deref()),
    ];
    for (field, value) in names {
        if !is_valid_name(value) { return Err(BridgeError::invalid(field)); }
    }
    if !is_valid_command(request.command_text.as_deref()) {
        return Err(BridgeError::invalid(Field::Command));
    }
    Ok(())
}
