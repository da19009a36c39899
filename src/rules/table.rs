//! The ordered rule table
//!
//! Each entry pairs a rule id (the attribute name without prefix) with a check.
//! The engine walks the table top to bottom and stops at the first failure, so
//! position in [`RULE_TABLE`] is precedence.

use super::predicates::{self, parse_float, parse_int, PasswordPolicy, PasswordViolation};
use super::{Declaration, Peer};
use crate::file::SelectedFile;
use regex::Regex;
use std::fmt;

/// What a check reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The transformed text value
    Value,
    /// The file selection; skipped for inputs that cannot hold files
    Files,
    /// The value of the field named by the rule's selector; skipped when unresolved
    Peer,
}

/// Result of a single check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    Pass,
    /// Failed; render the rule's own template with the attribute value
    Fail,
    /// Failed; render another template with the given value
    FailAs {
        rule: &'static str,
        value: Option<String>,
    },
}

/// Everything a check may look at
#[derive(Debug, Clone, Copy)]
pub struct RuleInput<'a> {
    pub declaration: &'a Declaration<'a>,
    pub value: &'a str,
    pub files: &'a [SelectedFile],
    pub peer: Option<&'a Peer>,
    /// Password policy before per-input overrides
    pub password: &'a PasswordPolicy,
}

/// One row of the rule table
#[derive(Clone, Copy)]
pub struct RuleEntry {
    pub id: &'static str,
    pub scope: Scope,
    /// Called with the rule's attribute value
    pub check: fn(&RuleInput<'_>, &str) -> Check,
}

impl fmt::Debug for RuleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleEntry")
            .field("id", &self.id)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

const fn entry(id: &'static str, scope: Scope, check: fn(&RuleInput<'_>, &str) -> Check) -> RuleEntry {
    RuleEntry { id, scope, check }
}

/// Synchronous rules in precedence order
pub const RULE_TABLE: &[RuleEntry] = &[
    entry("required", Scope::Value, required),
    entry("min-length", Scope::Value, min_length),
    entry("max-length", Scope::Value, max_length),
    entry("min", Scope::Value, min),
    entry("max", Scope::Value, max),
    entry("include", Scope::Value, |input, arg| fail_if(!input.value.contains(arg))),
    entry("exclude", Scope::Value, |input, arg| fail_if(input.value.contains(arg))),
    entry("start", Scope::Value, |input, arg| fail_if(!input.value.starts_with(arg))),
    entry("no-start", Scope::Value, |input, arg| fail_if(input.value.starts_with(arg))),
    entry("end", Scope::Value, |input, arg| fail_if(!input.value.ends_with(arg))),
    entry("no-end", Scope::Value, |input, arg| fail_if(input.value.ends_with(arg))),
    entry("upper", Scope::Value, |input, _| fail_if(!predicates::is_uppercase(input.value))),
    entry("lower", Scope::Value, |input, _| fail_if(!predicates::is_lowercase(input.value))),
    entry("trim", Scope::Value, |input, _| fail_if(input.value.contains(' '))),
    entry("regex", Scope::Value, pattern),
    entry("int", Scope::Value, |input, _| fail_if(!predicates::is_int(input.value))),
    entry("float", Scope::Value, |input, _| fail_if(!predicates::is_float(input.value))),
    entry("string", Scope::Value, |input, _| fail_if(!predicates::is_text(input.value))),
    entry("email", Scope::Value, |input, _| fail_if(!predicates::is_email(input.value))),
    entry("password", Scope::Value, password),
    entry("url", Scope::Value, |input, _| fail_if(!predicates::is_url(input.value))),
    entry("http-url", Scope::Value, |input, _| fail_if(!predicates::is_http_url(input.value))),
    entry("ip", Scope::Value, |input, _| fail_if(!predicates::is_ipv4(input.value))),
    entry("equal", Scope::Peer, equal),
    entry("image", Scope::Files, |input, _| any_file(input, |f| !f.is_kind("image"))),
    entry("audio", Scope::Files, |input, _| any_file(input, |f| !f.is_kind("audio"))),
    entry("video", Scope::Files, |input, _| any_file(input, |f| !f.is_kind("video"))),
    entry("min-size", Scope::Files, min_size),
    entry("max-size", Scope::Files, max_size),
    entry("file-include", Scope::Files, |input, arg| any_file(input, |f| !f.name().contains(arg))),
    entry("file-exclude", Scope::Files, |input, arg| any_file(input, |f| f.name().contains(arg))),
    entry("file-start", Scope::Files, |input, arg| any_file(input, |f| !f.name().starts_with(arg))),
    entry("file-no-start", Scope::Files, |input, arg| any_file(input, |f| f.name().starts_with(arg))),
    entry("file-end", Scope::Files, |input, arg| any_file(input, |f| !f.name().ends_with(arg))),
    entry("file-no-end", Scope::Files, |input, arg| any_file(input, |f| f.name().ends_with(arg))),
    entry("files", Scope::Files, |input, arg| file_count(input, arg, |len, n| len != n)),
    entry("min-files", Scope::Files, |input, arg| file_count(input, arg, |len, n| len < n)),
    entry("max-files", Scope::Files, |input, arg| file_count(input, arg, |len, n| len > n)),
];

/// Look up a table entry by rule id
pub fn rule(id: &str) -> Option<&'static RuleEntry> {
    RULE_TABLE.iter().find(|entry| entry.id == id)
}

fn fail_if(failed: bool) -> Check {
    if failed {
        Check::Fail
    } else {
        Check::Pass
    }
}

/// A file input is filled once anything is selected, whatever its text value
fn required(input: &RuleInput<'_>, _: &str) -> Check {
    fail_if(input.value.is_empty() && input.files.is_empty())
}

fn min_length(input: &RuleInput<'_>, arg: &str) -> Check {
    match parse_int(arg) {
        Some(bound) => fail_if((input.value.chars().count() as i64) < bound),
        None => Check::Fail,
    }
}

fn max_length(input: &RuleInput<'_>, arg: &str) -> Check {
    match parse_int(arg) {
        Some(bound) => fail_if((input.value.chars().count() as i64) > bound),
        None => Check::Fail,
    }
}

/// Numeric bound check; an empty or unparsable value or bound fails
fn numeric_bound(value: &str, arg: &str, violates: fn(i64, i64) -> bool) -> Check {
    match (parse_int(value), parse_int(arg)) {
        (Some(value), Some(bound)) => fail_if(violates(value, bound)),
        _ => Check::Fail,
    }
}

fn min(input: &RuleInput<'_>, arg: &str) -> Check {
    numeric_bound(input.value, arg, |value, bound| value < bound)
}

fn max(input: &RuleInput<'_>, arg: &str) -> Check {
    numeric_bound(input.value, arg, |value, bound| value > bound)
}

/// Patterns use the `regex` crate dialect; lookaround and backreferences do not
/// compile and the rule fails
fn pattern(input: &RuleInput<'_>, arg: &str) -> Check {
    match Regex::new(arg) {
        Ok(re) => fail_if(!re.is_match(input.value)),
        Err(e) => {
            log::debug!("regex rule has an unparsable pattern {arg:?}: {e}");
            Check::Fail
        }
    }
}

fn password(input: &RuleInput<'_>, _: &str) -> Check {
    let policy = input.declaration.password_policy(input.password);
    match policy.check(input.value) {
        Ok(()) => Check::Pass,
        Err(violation) => Check::FailAs {
            rule: violation.rule_id(),
            value: match violation {
                PasswordViolation::TooShort(length) => Some(length.to_string()),
                _ => None,
            },
        },
    }
}

fn equal(input: &RuleInput<'_>, _: &str) -> Check {
    match input.peer {
        Some(peer) if peer.value != input.value => Check::FailAs {
            rule: "equal",
            value: Some(peer.name.clone()),
        },
        _ => Check::Pass,
    }
}

fn any_file(input: &RuleInput<'_>, violates: impl Fn(&SelectedFile) -> bool) -> Check {
    fail_if(input.files.iter().any(violates))
}

fn min_size(input: &RuleInput<'_>, arg: &str) -> Check {
    match parse_float(arg) {
        Some(bound) => any_file(input, |f| (f.size() as f64) < bound),
        None => Check::Fail,
    }
}

fn max_size(input: &RuleInput<'_>, arg: &str) -> Check {
    match parse_float(arg) {
        Some(bound) => any_file(input, |f| (f.size() as f64) > bound),
        None => Check::Fail,
    }
}

fn file_count(input: &RuleInput<'_>, arg: &str, violates: fn(i64, i64) -> bool) -> Check {
    match parse_int(arg) {
        Some(expected) => fail_if(violates(input.files.len() as i64, expected)),
        None => Check::Fail,
    }
}
