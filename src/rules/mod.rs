//! Rule definitions and the attribute view they read from

pub mod messages;
pub mod predicates;
pub mod table;
pub mod transform;

pub use messages::MessageCatalog;
pub use predicates::{PasswordPolicy, PasswordViolation};
pub use table::{Check, RuleEntry, RuleInput, Scope, RULE_TABLE};

use crate::document::{ElementId, HtmlElement};

/// Read-only view of an input's marker attributes
#[derive(Debug, Clone, Copy)]
pub struct Declaration<'a> {
    element: &'a HtmlElement,
    prefix: &'a str,
}

impl<'a> Declaration<'a> {
    pub fn new(element: &'a HtmlElement, prefix: &'a str) -> Self {
        Self { element, prefix }
    }

    /// Value of a prefixed marker attribute ("min" reads `fv-min`)
    pub fn get(&self, rule: &str) -> Option<&'a str> {
        self.element.attr(&format!("{}{}", self.prefix, rule))
    }

    /// Whether a prefixed marker attribute is present
    pub fn has(&self, rule: &str) -> bool {
        self.element.has_attr(&format!("{}{}", self.prefix, rule))
    }

    /// Value of an unprefixed attribute ("name", "accept", ...)
    pub fn raw(&self, attr: &str) -> Option<&'a str> {
        self.element.attr(attr)
    }

    pub fn element(&self) -> &'a HtmlElement {
        self.element
    }

    /// Boolean marker: "true" or "false", anything else counts as true
    pub fn flag(&self, rule: &str) -> Option<bool> {
        self.get(rule).map(|value| value != "false")
    }

    /// Name shown in feedback: display marker, then name, then id, then the fallback
    ///
    /// Empty candidates are skipped.
    pub fn display_name(&self, fallback: &str) -> String {
        let non_empty = |name: &&str| !name.is_empty();

        self.get("display")
            .filter(non_empty)
            .or_else(|| self.raw("name").filter(non_empty))
            .or_else(|| self.raw("id").filter(non_empty))
            .unwrap_or(fallback)
            .to_string()
    }

    /// Password policy with per-input overrides applied over `defaults`
    pub fn password_policy(&self, defaults: &PasswordPolicy) -> PasswordPolicy {
        let mut policy = defaults.clone();

        if let Some(length) = self
            .get("password-length")
            .and_then(predicates::parse_int)
            .and_then(|length| usize::try_from(length).ok())
        {
            policy.length = length;
        }

        if let Some(lowercase) = self.flag("password-lowercase") {
            policy.lowercase = lowercase;
        }

        if let Some(uppercase) = self.flag("password-uppercase") {
            policy.uppercase = uppercase;
        }

        if let Some(digits) = self.flag("password-digits") {
            policy.digits = digits;
        }

        if let Some(special_chars) = self.flag("password-special-chars") {
            policy.special_chars = special_chars;
        }

        policy
    }
}

/// The field an `equal` rule compares against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub id: ElementId,
    /// Display name of the peer
    pub name: String,
    /// Current value of the peer
    pub value: String,
}
