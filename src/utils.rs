//! Utility functions for DN handling and timestamps

use chrono::{DateTime, Utc};

/// Normalizes a distinguished name for comparison.
///
/// Directory servers treat DNs case-insensitively and tolerate blanks around
/// the RDN separators, so `CN=Admins, DC=Example,DC=com` and
/// `cn=admins,dc=example,dc=com` must match the same local record.
pub fn normalize_dn(dn: &str) -> String {
    dn.split(',')
        .map(|rdn| rdn.trim().to_lowercase())
        .collect::<Vec<_>>()
        .join(",")
}

/// Returns true if `dn` equals `base` or lies below it
pub fn dn_is_within(dn: &str, base: &str) -> bool {
    let dn = normalize_dn(dn);
    let base = normalize_dn(base);
    if base.is_empty() {
        return true;
    }
    dn == base || dn.ends_with(&format!(",{}", base))
}

/// Value of the first RDN, e.g. `jdoe` for `uid=jdoe,ou=people,dc=example,dc=com`
pub fn first_rdn_value(dn: &str) -> Option<String> {
    let rdn = dn.split(',').next()?.trim();
    let (_, value) = rdn.split_once('=')?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Formats a timestamp as seconds since the Unix epoch
///
/// Example output: "1749891834"
pub fn format_epoch_seconds(dt: DateTime<Utc>) -> String {
    dt.timestamp().to_string()
}

/// Current time in seconds since the Unix epoch
pub fn current_epoch_seconds() -> String {
    format_epoch_seconds(Utc::now())
}

/// Serializes an id list to the comma-separated column format
pub fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Parses a comma-separated id list, preserving order and dropping duplicates
/// and blanks
pub fn split_ids(value: &str) -> Vec<i64> {
    let mut ids = Vec::new();
    for part in value.split(',') {
        if let Ok(id) = part.trim().parse::<i64>() {
            if id > 0 && !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}
