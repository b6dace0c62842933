//! Deterministic variable idents.
//!
//! Every theme variable is re-published at runtime under a custom-property
//! name derived from its original spelling. The derivation must be stable
//! across runs and files, since build caches key on it:
//!
//! ```text
//! short_hash(s) = first 8 hex chars of sha256(s)
//! debug         = "--" + sanitize(name) + "-" + short_hash(name)
//! production    = "--" + short_hash(debug)
//! ```
//!
//! If the first character after `--` would be a digit `d`, it is replaced by
//! the letter `'g' + d` (outside the hex alphabet, so no collisions are
//! introduced).

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of the hex digest slice used in idents.
pub const HASH_LEN: usize = 8;

/// Whether idents stay human-readable or are compacted into opaque tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentMode {
    #[default]
    Debug,
    Production,
}

/// A syntax-legal custom-property name standing in for an original variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableIdent(String);

impl VariableIdent {
    /// Derives the ident for `original_name` (sigil included, e.g. `$primary`).
    pub fn new(original_name: &str, mode: IdentMode) -> Self {
        let readable = format!(
            "--{}-{}",
            sanitize(original_name),
            short_hash(original_name)
        );
        let ident = match mode {
            IdentMode::Debug => readable,
            IdentMode::Production => format!("--{}", short_hash(&readable)),
        };
        VariableIdent(fix_leading_digit(ident))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VariableIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for VariableIdent {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for VariableIdent {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// First [`HASH_LEN`] lowercase hex characters of the SHA-256 of `input`.
pub fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut encoded = hex::encode(digest);
    encoded.truncate(HASH_LEN);
    encoded
}

/// Strips leading sigils and replaces anything outside `[A-Za-z0-9_-]` with `-`.
pub fn sanitize(name: &str) -> String {
    name.trim_start_matches(['$', '@', '-'])
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

fn fix_leading_digit(ident: String) -> String {
    let body = &ident[2..];
    match body.as_bytes().first() {
        Some(d) if d.is_ascii_digit() => {
            let letter = (b'g' + (d - b'0')) as char;
            format!("--{}{}", letter, &body[1..])
        }
        _ => ident,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_hash_is_hex_prefix_of_sha256() {
        // sha256("") = e3b0c442...
        assert_eq!(short_hash(""), "e3b0c442");
        assert_eq!(short_hash("abc"), "ba7816bf");
    }

    #[test]
    fn test_debug_ident_is_readable() {
        let ident = VariableIdent::new("$primary-color", IdentMode::Debug);
        let expected = format!("--primary-color-{}", short_hash("$primary-color"));
        assert_eq!(ident.as_str(), expected);
    }

    #[test]
    fn test_sigils_produce_distinct_idents() {
        let scss = VariableIdent::new("$primary", IdentMode::Debug);
        let css = VariableIdent::new("--primary", IdentMode::Debug);
        let less = VariableIdent::new("@primary", IdentMode::Debug);
        assert_ne!(scss, css);
        assert_ne!(css, less);
        assert!(scss.as_str().starts_with("--primary-"));
        assert!(less.as_str().starts_with("--primary-"));
    }

    #[test]
    fn test_production_ident_is_compact() {
        let ident = VariableIdent::new("$a-rather-long-variable-name", IdentMode::Production);
        assert_eq!(ident.as_str().len(), 2 + HASH_LEN);
        assert!(ident.as_str().starts_with("--"));
        assert!(!ident.as_str()[2..3].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_sanitize_replaces_illegal_chars() {
        assert_eq!(sanitize("$a.b/c"), "a-b-c");
        assert_eq!(sanitize("--x_y"), "x_y");
        assert_eq!(sanitize("@font size"), "font-size");
    }

    #[test]
    fn test_leading_digit_rewritten_to_letter() {
        let ident = VariableIdent::new("$1x", IdentMode::Debug);
        assert!(ident.as_str().starts_with("--hx-"));
        assert_eq!(fix_leading_digit("--0abc".to_string()), "--gabc");
        assert_eq!(fix_leading_digit("--9abc".to_string()), "--pabc");
        assert_eq!(fix_leading_digit("--abc".to_string()), "--abc");
    }

    #[test]
    fn test_ident_is_deterministic() {
        for mode in [IdentMode::Debug, IdentMode::Production] {
            let a = VariableIdent::new("$brand", mode);
            let b = VariableIdent::new("$brand", mode);
            assert_eq!(a, b);
        }
    }
}
