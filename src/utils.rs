use crate::constants::MAX_IDENTIFIER_BYTES;
use std::path::PathBuf;

/// Get config file path from environment variable, if set
pub fn get_config_path() -> Option<PathBuf> {
    env_opt("COIN_SERIES_CONFIG").map(PathBuf::from)
}

/// Read a trimmed, non-empty environment variable
pub fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse a boolean flag the way shell users write them
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Whether a name can be spliced into SQL as a bare identifier
///
/// Names longer than [`MAX_IDENTIFIER_BYTES`] are rejected: PostgreSQL would
/// truncate them on create but not on catalog lookups.
pub fn is_sql_identifier(name: &str) -> bool {
    if name.len() > MAX_IDENTIFIER_BYTES {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
