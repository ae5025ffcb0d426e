//! Table and column names.
//!
//! Names are interpolated into SQL text, so they are restricted to plain
//! identifiers and always double-quoted. Values never go through here; they
//! are bound as parameters.

use crate::DbError;
use regex::Regex;
use std::sync::LazyLock;

/// PostgreSQL truncates identifiers longer than NAMEDATALEN - 1 bytes.
const MAX_IDENTIFIER_LEN: usize = 63;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

pub fn validate(name: &str) -> Result<&str, DbError> {
    if name.len() > MAX_IDENTIFIER_LEN || !IDENTIFIER.is_match(name) {
        return Err(DbError::InvalidIdentifier(name.to_string()));
    }
    Ok(name)
}

/// Renders a validated name as a quoted identifier.
pub fn quote(name: &str) -> String {
    format!("\"{name}\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_identifiers() {
        let longest = "x".repeat(63);
        for name in ["beans", "_id", "Beans2", "a_b_c", longest.as_str()] {
            assert!(validate(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn test_rejects_injection_and_odd_names() {
        let too_long = "x".repeat(64);
        for name in [
            "",
            "1beans",
            "beans; DROP TABLE users",
            "be\"ans",
            "bean-counter",
            "naïve",
            "with space",
            too_long.as_str(),
        ] {
            assert!(
                matches!(validate(name), Err(DbError::InvalidIdentifier(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("Beans"), "\"Beans\"");
    }
}
