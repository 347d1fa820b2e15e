use crate::error::{Result, SawitError};

/// Longest identifier that fits a catalog slot's 32-byte name field.
pub const MAX_NAME_LEN: usize = 32;

/// Names users may not create or address directly.
const RESERVED: &[&str] = &["_indexes", "_system", "_schema", "null", "true", "false"];

/// Tables whose name starts with `_` are internal bookkeeping tables and are
/// hidden from user-facing listings.
pub fn is_internal(name: &str) -> bool {
    name.starts_with('_')
}

/// Check an identifier against `[A-Za-z_][A-Za-z0-9_]{0,31}`.
fn matches_identifier(name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() > MAX_NAME_LEN {
        return false;
    }
    if !(bytes[0].is_ascii_alphabetic() || bytes[0] == b'_') {
        return false;
    }
    bytes[1..]
        .iter()
        .all(|&b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Validate a user-supplied table name.
pub fn validate_table_name(name: &str) -> Result<()> {
    if !matches_identifier(name) || RESERVED.contains(&name) {
        return Err(SawitError::NameInvalid(name.to_string()));
    }
    Ok(())
}

/// Validate a field identifier (same charset, no reserved set).
pub fn validate_field_name(name: &str) -> Result<()> {
    if !matches_identifier(name) {
        return Err(SawitError::NameInvalid(name.to_string()));
    }
    Ok(())
}

/// Internal tables bypass the reserved set but still obey the charset rule.
pub fn validate_internal_name(name: &str) -> Result<()> {
    if !matches_identifier(name) {
        return Err(SawitError::NameInvalid(name.to_string()));
    }
    Ok(())
}
