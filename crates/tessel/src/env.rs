use std::env;

/// Reads a `u32` environment knob, falling back to `default` for unset,
/// blank, or unparseable values.
pub(crate) fn env_u32(name: &str, default: u32) -> u32 {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value.trim().parse().unwrap_or(default),
        _ => default,
    }
}

/// Reads a path-valued environment knob, treating blank values as unset.
pub(crate) fn env_path(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => None,
    }
}
