use uuid::Uuid;

/// Parses an id in the hyphenated form (`8-4-4-4-12` hex digits).
///
/// Surrounding whitespace is ignored. The simple, braced and URN forms are
/// rejected.
pub fn parse_uuid(raw: &str) -> Option<Uuid> {
    let raw = raw.trim();
    Uuid::parse_str(raw)
        .ok()
        .filter(|id| id.hyphenated().to_string().eq_ignore_ascii_case(raw))
}
