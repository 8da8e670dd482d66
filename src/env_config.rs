/// Centralized environment-variable parsing helpers.
///
/// Every configuration knob read from the environment goes through these
/// helpers so trimming and empty-value handling live in one place.
use std::path::PathBuf;

pub(crate) const STORAGE_ROOT_VAR: &str = "VIEW_CAPTURE_STORAGE_ROOT";
pub(crate) const WORKERS_VAR: &str = "VIEW_CAPTURE_WORKERS";
pub(crate) const PNG_QUALITY_VAR: &str = "VIEW_CAPTURE_PNG_QUALITY";

/// Returns the trimmed value of the variable, or `None` when it is unset
/// or blank.
#[inline]
pub(crate) fn env_var_nonempty(var_name: &str) -> Option<String> {
    std::env::var(var_name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Parses the environment variable as a `usize`, returning `Some` only when
/// the value is a valid positive (> 0) integer.
#[inline]
pub(crate) fn env_var_positive_usize(var_name: &str) -> Option<usize> {
    env_var_nonempty(var_name)
        .and_then(|raw| raw.parse::<usize>().ok())
        .filter(|value| *value > 0)
}

/// Parses the environment variable as a `u8` no greater than `max`.
#[inline]
pub(crate) fn env_var_bounded_u8(var_name: &str, max: u8) -> Option<u8> {
    env_var_nonempty(var_name)
        .and_then(|raw| raw.parse::<u8>().ok())
        .filter(|value| *value <= max)
}

#[inline]
pub(crate) fn env_var_path(var_name: &str) -> Option<PathBuf> {
    env_var_nonempty(var_name).map(PathBuf::from)
}
