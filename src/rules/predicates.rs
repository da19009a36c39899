//! Predicate library - yes/no questions about a single string value

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Characters an integer-shaped value may contain
static INT_SHAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9-]+$").unwrap());

/// Characters a float-shaped value may contain
static FLOAT_SHAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9.-]+$").unwrap());

/// Leading integer, parsed the way a lenient parseInt reads it
static INT_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*([+-]?[0-9]+)").unwrap());

/// Leading decimal number, parsed the way a lenient parseFloat reads it
static FLOAT_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([+-]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)(?:[eE][+-]?[0-9]+)?)").unwrap()
});

static ALPHA: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z]+$").unwrap());

static UPPER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]+$").unwrap());

static LOWER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z]+$").unwrap());

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9-]+(?:\.[a-zA-Z0-9-]+)*$").unwrap()
});

/// Loose URL shape: optional http(s) scheme, dotted host, path characters
static URL_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:https?://)?[\w.-]+(?:\.[\w.-]+)+[\w\-._~:/?#\[\]@!$&'()*+,;=]+$").unwrap()
});

static IPV4: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)$",
    )
    .unwrap()
});

/// Parse the leading integer of a string ("12px" -> 12, "abc" -> None)
pub fn parse_int(s: &str) -> Option<i64> {
    INT_PREFIX
        .captures(s)
        .and_then(|cap| cap.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Parse the leading decimal number of a string ("1.5kb" -> 1.5, "." -> None)
pub fn parse_float(s: &str) -> Option<f64> {
    FLOAT_PREFIX
        .captures(s)
        .and_then(|cap| cap.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Check if a value is an integer number
pub fn is_int(s: &str) -> bool {
    INT_SHAPE.is_match(s) && parse_int(s).is_some()
}

/// Check if a value is a decimal number
pub fn is_float(s: &str) -> bool {
    FLOAT_SHAPE.is_match(s) && parse_float(s).is_some()
}

/// Check if a value is plain ASCII letters
pub fn is_text(s: &str) -> bool {
    ALPHA.is_match(s)
}

/// Check if a value is non-empty and entirely uppercase ASCII letters
pub fn is_uppercase(s: &str) -> bool {
    UPPER.is_match(s)
}

/// Check if a value is non-empty and entirely lowercase ASCII letters
pub fn is_lowercase(s: &str) -> bool {
    LOWER.is_match(s)
}

/// Check if a value is shaped like an email address
pub fn is_email(s: &str) -> bool {
    EMAIL.is_match(s)
}

/// Check if a value is shaped like a URL (scheme optional)
pub fn is_url(s: &str) -> bool {
    URL_SHAPE.is_match(s)
}

/// Check if a value parses as an absolute http or https URL
pub fn is_http_url(s: &str) -> bool {
    url::Url::parse(s).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

/// Check if a value is a dotted-quad IPv4 address
pub fn is_ipv4(s: &str) -> bool {
    IPV4.is_match(s)
}

/// Password requirements, each independently toggleable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PasswordPolicy {
    /// Minimum length in characters
    pub length: usize,
    /// Require at least one lowercase letter
    pub lowercase: bool,
    /// Require at least one uppercase letter
    pub uppercase: bool,
    /// Require at least one digit
    pub digits: bool,
    /// Require at least one character outside [A-Za-z0-9]
    pub special_chars: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            length: 8,
            lowercase: true,
            uppercase: true,
            digits: true,
            special_chars: true,
        }
    }
}

/// First requirement a password fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordViolation {
    Lowercase,
    Uppercase,
    Digit,
    SpecialChar,
    TooShort(usize),
}

impl PasswordViolation {
    /// Message template key for this violation
    pub fn rule_id(&self) -> &'static str {
        match self {
            PasswordViolation::Lowercase => "password-lowercase",
            PasswordViolation::Uppercase => "password-uppercase",
            PasswordViolation::Digit => "password-digits",
            PasswordViolation::SpecialChar => "password-special-chars",
            PasswordViolation::TooShort(_) => "password-length",
        }
    }
}

impl PasswordPolicy {
    /// Check a password in fixed order: lowercase, uppercase, digit, special, length
    pub fn check(&self, password: &str) -> Result<(), PasswordViolation> {
        if self.lowercase && !password.chars().any(|c| c.is_ascii_lowercase()) {
            return Err(PasswordViolation::Lowercase);
        }

        if self.uppercase && !password.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(PasswordViolation::Uppercase);
        }

        if self.digits && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(PasswordViolation::Digit);
        }

        if self.special_chars && !password.chars().any(|c| !c.is_ascii_alphanumeric()) {
            return Err(PasswordViolation::SpecialChar);
        }

        if password.chars().count() < self.length {
            return Err(PasswordViolation::TooShort(self.length));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_prefix() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("  -7"), Some(-7));
        assert_eq!(parse_int("12px"), Some(12));
        assert_eq!(parse_int("3.9"), Some(3));
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_int("abc"), None);
        assert_eq!(parse_int("-"), None);
        assert_eq!(parse_int("99999999999999999999999"), None);
    }

    #[test]
    fn test_parse_float_prefix() {
        assert_eq!(parse_float("1.5"), Some(1.5));
        assert_eq!(parse_float("1.5kb"), Some(1.5));
        assert_eq!(parse_float(".5"), Some(0.5));
        assert_eq!(parse_float("2e3"), Some(2000.0));
        assert_eq!(parse_float("."), None);
        assert_eq!(parse_float("x1"), None);
    }

    #[test]
    fn test_is_int() {
        assert!(is_int("123"));
        assert!(is_int("-5"));
        assert!(!is_int(""));
        assert!(!is_int("-"));
        assert!(!is_int("1.5"));
        assert!(!is_int("12a"));
    }

    #[test]
    fn test_is_float() {
        assert!(is_float("1.5"));
        assert!(is_float("10"));
        assert!(is_float("-0.25"));
        assert!(!is_float(""));
        assert!(!is_float("."));
        assert!(!is_float("1,5"));
    }

    #[test]
    fn test_case_and_text() {
        assert!(is_text("Hello"));
        assert!(!is_text("Hello world"));
        assert!(is_uppercase("ABC"));
        assert!(!is_uppercase("AbC"));
        assert!(!is_uppercase(""));
        assert!(is_lowercase("abc"));
        assert!(!is_lowercase("abc1"));
    }

    #[test]
    fn test_is_email() {
        assert!(is_email("a@b.co"));
        assert!(is_email("first.last+tag@example.org"));
        assert!(!is_email("abc"));
        assert!(!is_email("a@"));
        assert!(!is_email("@b.co"));
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("example.com"));
        assert!(is_url("https://example.com/path?q=1"));
        assert!(is_url("www.example.co.uk"));
        assert!(!is_url("localhost"));
        assert!(!is_url("not a url"));
    }

    #[test]
    fn test_is_http_url() {
        assert!(is_http_url("http://example.com"));
        assert!(is_http_url("https://example.com/a"));
        assert!(!is_http_url("ftp://example.com"));
        assert!(!is_http_url("example.com"));
        assert!(!is_http_url(""));
    }

    #[test]
    fn test_is_ipv4() {
        assert!(is_ipv4("192.168.0.1"));
        assert!(is_ipv4("0.0.0.0"));
        assert!(!is_ipv4("256.1.1.1"));
        assert!(!is_ipv4("1.2.3"));
        assert!(!is_ipv4("1.2.3.4.5"));
    }

    #[test]
    fn test_password_policy_order() {
        let policy = PasswordPolicy::default();

        assert_eq!(policy.check("ABC123!x"), Ok(()));
        assert_eq!(policy.check("ABC"), Err(PasswordViolation::Lowercase));
        assert_eq!(policy.check("abc"), Err(PasswordViolation::Uppercase));
        assert_eq!(policy.check("abcD"), Err(PasswordViolation::Digit));
        assert_eq!(policy.check("abcD1"), Err(PasswordViolation::SpecialChar));
        assert_eq!(policy.check("aD1!"), Err(PasswordViolation::TooShort(8)));
    }

    #[test]
    fn test_password_policy_toggles() {
        let policy = PasswordPolicy {
            length: 3,
            lowercase: true,
            uppercase: false,
            digits: false,
            special_chars: false,
        };

        assert_eq!(policy.check("abc"), Ok(()));
        assert_eq!(policy.check("ab"), Err(PasswordViolation::TooShort(3)));
        assert_eq!(policy.check("ABC"), Err(PasswordViolation::Lowercase));
    }

    #[test]
    fn test_password_violation_rule_ids() {
        assert_eq!(PasswordViolation::Lowercase.rule_id(), "password-lowercase");
        assert_eq!(PasswordViolation::TooShort(8).rule_id(), "password-length");
    }
}
