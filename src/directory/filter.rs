//! LDAP filter helpers

/// Markers replaced before a filter is sent to the directory
pub const USERNAME_MARKER: &str = "{USERNAME}";
pub const USERDN_MARKER: &str = "{USERDN}";
pub const USERUID_MARKER: &str = "{USERUID}";

/// Replace every marker with a wildcard, as used when listing entries for import
pub fn replace_filter_markers(filter: &str) -> String {
    filter
        .replace(USERNAME_MARKER, "*")
        .replace(USERDN_MARKER, "*")
        .replace(USERUID_MARKER, "*")
}

/// Replace `{USERDN}` with the escaped DN of a user; remaining markers become wildcards
pub fn replace_user_dn_marker(filter: &str, user_dn: &str) -> String {
    replace_filter_markers(&filter.replace(USERDN_MARKER, &escape_filter_value(user_dn)))
}

pub fn has_user_dn_marker(filter: &str) -> bool {
    filter.contains(USERDN_MARKER)
}

/// Escape a value for use inside a filter (RFC 4515)
pub fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '*' => escaped.push_str("\\2a"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\\' => escaped.push_str("\\5c"),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Make sure a filter is wrapped in parentheses; an empty filter matches everything
pub fn normalize_filter(filter: &str) -> String {
    let trimmed = filter.trim();
    if trimmed.is_empty() {
        "(objectClass=*)".to_string()
    } else if trimmed.starts_with('(') {
        trimmed.to_string()
    } else {
        format!("({})", trimmed)
    }
}
