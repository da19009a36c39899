//! Render sink: attribute, text and disabled-state writes produced by the validator

use crate::document::ElementId;
use std::collections::{BTreeMap, HashMap};

/// Output written to the page, keyed by element
///
/// The parsed document is never mutated; everything the validator would
/// write into the page lands here instead.
#[derive(Debug, Default)]
pub struct RenderSink {
    attributes: HashMap<ElementId, BTreeMap<String, String>>,
    text: HashMap<ElementId, String>,
    disabled: HashMap<ElementId, bool>,
}

impl RenderSink {
    pub fn set_attr(&mut self, element: ElementId, name: impl Into<String>, value: impl Into<String>) {
        self.attributes
            .entry(element)
            .or_default()
            .insert(name.into(), value.into());
    }

    pub fn remove_attr(&mut self, element: ElementId, name: &str) {
        if let Some(attrs) = self.attributes.get_mut(&element) {
            attrs.remove(name);
        }
    }

    /// Attribute written by the validator, if any
    pub fn attr(&self, element: ElementId, name: &str) -> Option<&str> {
        self.attributes
            .get(&element)
            .and_then(|attrs| attrs.get(name))
            .map(String::as_str)
    }

    pub fn has_attr(&self, element: ElementId, name: &str) -> bool {
        self.attr(element, name).is_some()
    }

    /// All attributes written to an element, sorted by name
    pub fn attributes(&self, element: ElementId) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .get(&element)
            .into_iter()
            .flatten()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn set_text(&mut self, element: ElementId, text: impl Into<String>) {
        self.text.insert(element, text.into());
    }

    /// Text content written to an element
    pub fn text(&self, element: ElementId) -> Option<&str> {
        self.text.get(&element).map(String::as_str)
    }

    pub fn set_disabled(&mut self, element: ElementId, disabled: bool) {
        self.disabled.insert(element, disabled);
    }

    /// Disabled state written to a control; false when never written
    pub fn is_disabled(&self, element: ElementId) -> bool {
        self.disabled.get(&element).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FormDocument;

    #[test]
    fn test_attributes_roundtrip() {
        let doc = FormDocument::parse_str("<input>");
        let input = doc.select_first("input").unwrap();
        let mut sink = RenderSink::default();

        sink.set_attr(input, "fv-valid", "false");
        sink.set_attr(input, "fv-used", "");
        assert_eq!(sink.attr(input, "fv-valid"), Some("false"));
        assert!(sink.has_attr(input, "fv-used"));

        sink.remove_attr(input, "fv-valid");
        assert!(!sink.has_attr(input, "fv-valid"));

        let names: Vec<&str> = sink.attributes(input).map(|(name, _)| name).collect();
        assert_eq!(names, vec!["fv-used"]);
    }

    #[test]
    fn test_text_and_disabled() {
        let doc = FormDocument::parse_str("<span></span><button></button>");
        let span = doc.select_first("span").unwrap();
        let button = doc.select_first("button").unwrap();
        let mut sink = RenderSink::default();

        assert_eq!(sink.text(span), None);
        sink.set_text(span, "email is required");
        assert_eq!(sink.text(span), Some("email is required"));

        assert!(!sink.is_disabled(button));
        sink.set_disabled(button, true);
        assert!(sink.is_disabled(button));
    }
}
