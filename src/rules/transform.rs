//! Value transforms applied before validation

use super::predicates::parse_int;
use super::Declaration;

/// A transform: (current value, attribute value) -> replacement, or None to keep the value
type TransformFn = fn(&str, &str) -> Option<String>;

/// Transforms in application order
const TRANSFORMS: &[(&str, TransformFn)] = &[
    ("to-max-length", to_max_length),
    ("to-max", to_max),
    ("to-min", to_min),
    ("to-min-strict", to_min_strict),
    ("to-upper", to_upper),
    ("to-lower", to_lower),
    ("to-trim", to_trim),
    ("to-prevent", to_prevent),
    ("to-prevents", to_prevents),
];

/// Run every declared transform over a value, each seeing the previous one's output
pub fn apply(declaration: &Declaration<'_>, value: &str) -> String {
    let mut current = value.to_string();

    for (rule, transform) in TRANSFORMS {
        let Some(arg) = declaration.get(rule) else {
            continue;
        };

        if let Some(next) = transform(&current, arg) {
            if next != current {
                log::trace!("{rule} rewrote {current:?} to {next:?}");
                current = next;
            }
        }
    }

    current
}

fn to_max_length(value: &str, arg: &str) -> Option<String> {
    let limit = usize::try_from(parse_int(arg)?).ok()?;
    if value.chars().count() > limit {
        Some(value.chars().take(limit).collect())
    } else {
        None
    }
}

fn to_max(value: &str, arg: &str) -> Option<String> {
    (parse_int(value)? > parse_int(arg)?).then(|| arg.to_string())
}

fn to_min(value: &str, arg: &str) -> Option<String> {
    (parse_int(value)? < parse_int(arg)?).then(|| arg.to_string())
}

fn to_min_strict(value: &str, arg: &str) -> Option<String> {
    if value.is_empty() {
        return Some(arg.to_string());
    }
    to_min(value, arg)
}

fn to_upper(value: &str, _: &str) -> Option<String> {
    Some(value.to_uppercase())
}

fn to_lower(value: &str, _: &str) -> Option<String> {
    Some(value.to_lowercase())
}

fn to_trim(value: &str, _: &str) -> Option<String> {
    Some(value.trim().to_string())
}

fn to_prevent(value: &str, arg: &str) -> Option<String> {
    (!arg.is_empty() && value.contains(arg)).then(|| value.replace(arg, ""))
}

fn to_prevents(value: &str, arg: &str) -> Option<String> {
    let mut out = value.to_string();
    for piece in arg.split(',').filter(|piece| !piece.is_empty()) {
        out = out.replace(piece, "");
    }
    (out != value).then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FormDocument;

    fn transformed(attrs: &str, value: &str) -> String {
        let doc = FormDocument::parse_str(&format!("<input {attrs}>"));
        let id = doc.select_first("input").unwrap();
        let declaration = Declaration::new(doc.get(id).unwrap(), "fv-");
        apply(&declaration, value)
    }

    #[test]
    fn test_no_transforms() {
        assert_eq!(transformed("", " Mixed "), " Mixed ");
    }

    #[test]
    fn test_to_max_length_counts_chars() {
        assert_eq!(transformed(r#"fv-to-max-length="3""#, "abcdef"), "abc");
        assert_eq!(transformed(r#"fv-to-max-length="3""#, "ab"), "ab");
        assert_eq!(transformed(r#"fv-to-max-length="2""#, "éèà"), "éè");
        assert_eq!(transformed(r#"fv-to-max-length="x""#, "abcdef"), "abcdef");
    }

    #[test]
    fn test_numeric_clamps() {
        assert_eq!(transformed(r#"fv-to-max="10""#, "25"), "10");
        assert_eq!(transformed(r#"fv-to-max="10""#, "7"), "7");
        assert_eq!(transformed(r#"fv-to-min="5""#, "2"), "5");
        assert_eq!(transformed(r#"fv-to-min="5""#, ""), "");
        assert_eq!(transformed(r#"fv-to-min="5""#, "abc"), "abc");
    }

    #[test]
    fn test_to_min_strict_fills_empty() {
        assert_eq!(transformed(r#"fv-to-min-strict="1""#, ""), "1");
        assert_eq!(transformed(r#"fv-to-min-strict="1""#, "0"), "1");
        assert_eq!(transformed(r#"fv-to-min-strict="1""#, "4"), "4");
    }

    #[test]
    fn test_case_and_trim() {
        assert_eq!(transformed("fv-to-upper", "abc"), "ABC");
        assert_eq!(transformed("fv-to-lower", "ABC"), "abc");
        assert_eq!(transformed("fv-to-trim", "  a b  "), "a b");
    }

    #[test]
    fn test_transforms_chain_in_order() {
        // trim runs after upper-casing, the max-length cut runs first
        assert_eq!(
            transformed(r#"fv-to-max-length="4" fv-to-upper fv-to-trim"#, " abcdef"),
            "ABC"
        );
    }

    #[test]
    fn test_prevent_strips_substrings() {
        assert_eq!(transformed(r#"fv-to-prevent=" ""#, "a b c"), "abc");
        assert_eq!(transformed(r#"fv-to-prevents="-,_""#, "a-b_c-d"), "abcd");
        assert_eq!(transformed(r#"fv-to-prevents=",,""#, "a,b"), "a,b");
    }
}
