//! HTML document model - parses markup into an element arena for declaration lookup

use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Failed to read file: {0}")]
    ReadFile(#[from] std::io::Error),
}

/// Handle to an element, ordered by document position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(usize);

impl ElementId {
    /// Position of the element in document order
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A parsed HTML document
pub struct FormDocument {
    /// Parsed tree, kept for selector matching
    html: Html,
    /// All elements in document order
    elements: Vec<HtmlElement>,
}

/// An HTML element as declared in the markup
#[derive(Debug, Clone)]
pub struct HtmlElement {
    /// Lowercase tag name (e.g., "form", "input")
    pub name: String,
    /// Declared attributes
    pub attributes: HashMap<String, String>,
    /// Child element handles
    pub children: Vec<ElementId>,
    /// Parent element handle (None for the root)
    pub parent: Option<ElementId>,
}

impl fmt::Debug for FormDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormDocument")
            .field("elements", &self.elements.len())
            .finish()
    }
}

impl FormDocument {
    /// Parse an HTML file
    pub fn parse_file(path: &Path) -> Result<Self, DocumentError> {
        let source = fs::read_to_string(path)?;
        Ok(Self::parse_str(&source))
    }

    /// Parse HTML from a string
    ///
    /// HTML parsing is error tolerant; malformed markup is repaired the way a
    /// browser would repair it.
    pub fn parse_str(source: &str) -> Self {
        let html = Html::parse_document(source);
        let mut elements = Vec::new();

        fn parse_node(
            node: ElementRef,
            elements: &mut Vec<HtmlElement>,
            parent: Option<ElementId>,
        ) -> ElementId {
            let id = ElementId(elements.len());

            let attributes: HashMap<String, String> = node
                .value()
                .attrs()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect();

            elements.push(HtmlElement {
                name: node.value().name().to_ascii_lowercase(),
                attributes,
                children: Vec::new(),
                parent,
            });

            let children: Vec<ElementId> = node
                .children()
                .filter_map(ElementRef::wrap)
                .map(|child| parse_node(child, elements, Some(id)))
                .collect();

            elements[id.0].children = children;

            id
        }

        parse_node(html.root_element(), &mut elements, None);

        Self { html, elements }
    }

    /// Get element by handle
    pub fn get(&self, id: ElementId) -> Option<&HtmlElement> {
        self.elements.get(id.0)
    }

    /// Number of elements in the document
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the document has no elements
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Iterate over all elements in document order
    pub fn iter(&self) -> impl Iterator<Item = (ElementId, &HtmlElement)> {
        self.elements
            .iter()
            .enumerate()
            .map(|(idx, el)| (ElementId(idx), el))
    }

    /// Nearest ancestor (excluding the element itself) with the given tag name
    pub fn closest(&self, id: ElementId, tag: &str) -> Option<ElementId> {
        let mut current = self.get(id)?.parent;
        while let Some(parent) = current {
            let element = self.get(parent)?;
            if element.name == tag {
                return Some(parent);
            }
            current = element.parent;
        }
        None
    }

    /// Owning form of an element
    pub fn owning_form(&self, id: ElementId) -> Option<ElementId> {
        self.closest(id, "form")
    }

    /// Parent of an element
    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.get(id)?.parent
    }

    /// All descendants of an element, in document order
    pub fn descendants(&self, id: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut stack: Vec<ElementId> = match self.get(id) {
            Some(el) => el.children.iter().rev().copied().collect(),
            None => return out,
        };

        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(el) = self.get(next) {
                stack.extend(el.children.iter().rev().copied());
            }
        }

        out
    }

    /// First descendant of `scope` matching a predicate
    pub fn find_in<F>(&self, scope: ElementId, mut predicate: F) -> Option<ElementId>
    where
        F: FnMut(&HtmlElement) -> bool,
    {
        self.descendants(scope)
            .into_iter()
            .find(|id| self.get(*id).is_some_and(&mut predicate))
    }

    /// First element in the whole document matching a predicate
    pub fn find<F>(&self, mut predicate: F) -> Option<ElementId>
    where
        F: FnMut(&HtmlElement) -> bool,
    {
        self.iter().find(|(_, el)| predicate(el)).map(|(id, _)| id)
    }

    /// All elements carrying an attribute
    pub fn with_attr(&self, attr: &str) -> Vec<ElementId> {
        self.iter()
            .filter(|(_, el)| el.has_attr(attr))
            .map(|(id, _)| id)
            .collect()
    }

    /// Input elements inside a form, in document order
    pub fn inputs_of(&self, form: ElementId) -> Vec<ElementId> {
        self.descendants(form)
            .into_iter()
            .filter(|id| self.get(*id).is_some_and(HtmlElement::is_input))
            .collect()
    }

    /// Resolve a CSS selector within the descendants of `scope`
    ///
    /// Returns `None` when the selector does not parse or nothing matches.
    pub fn select_in(&self, scope: ElementId, selector: &str) -> Option<ElementId> {
        let selector = match Selector::parse(selector) {
            Ok(selector) => selector,
            Err(e) => {
                log::debug!("ignoring unparsable selector {selector:?}: {e:?}");
                return None;
            }
        };

        let scope_ref = self.element_refs().nth(scope.0)?;
        let matched = scope_ref
            .select(&selector)
            .find(|candidate| *candidate != scope_ref)?;

        self.element_refs()
            .position(|candidate| candidate == matched)
            .map(ElementId)
    }

    /// Resolve a CSS selector against the whole document
    pub fn select_first(&self, selector: &str) -> Option<ElementId> {
        let selector = Selector::parse(selector).ok()?;
        let matched = self.html.select(&selector).next()?;

        self.element_refs()
            .position(|candidate| candidate == matched)
            .map(ElementId)
    }

    /// Element references in the same order as the arena
    fn element_refs(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
    }
}

impl HtmlElement {
    /// Get an attribute value
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    /// Check if element has an attribute
    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Whether this is an `<input>` element
    pub fn is_input(&self) -> bool {
        self.name == "input"
    }

    /// Whether this is a file-selection input
    pub fn is_file_input(&self) -> bool {
        self.is_input()
            && self
                .attr("type")
                .is_some_and(|t| t.eq_ignore_ascii_case("file"))
    }

    /// Whether this is a form
    pub fn is_form(&self) -> bool {
        self.name == "form"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNUP: &str = r#"<!DOCTYPE html>
<html>
  <body>
    <form id="signup" fv-form>
      <label>Email <input name="email" fv-required></label>
      <input name="password1" type="password">
      <input name="password2" type="password" fv-equal="[name=password1]">
      <span fv-for="email"></span>
      <button type="submit">Go</button>
    </form>
    <input name="standalone" fv-input>
  </body>
</html>"#;

    #[test]
    fn test_parse_document() {
        let doc = FormDocument::parse_str(SIGNUP);
        assert!(!doc.is_empty());
        let (_, root) = doc.iter().next().unwrap();
        assert_eq!(root.name, "html");
        assert!(root.parent.is_none());
    }

    #[test]
    fn test_element_attributes() {
        let doc = FormDocument::parse_str(SIGNUP);
        let email = doc.select_first("[name=email]").unwrap();
        let element = doc.get(email).unwrap();

        assert_eq!(element.attr("name"), Some("email"));
        assert!(element.has_attr("fv-required"));
        assert_eq!(element.attr("fv-required"), Some(""));
        assert!(!element.has_attr("fv-email"));
        assert!(element.is_input());
        assert!(!element.is_file_input());
    }

    #[test]
    fn test_owning_form() {
        let doc = FormDocument::parse_str(SIGNUP);
        let form = doc.select_first("#signup").unwrap();
        let email = doc.select_first("[name=email]").unwrap();
        let standalone = doc.select_first("[name=standalone]").unwrap();

        assert_eq!(doc.owning_form(email), Some(form));
        assert_eq!(doc.owning_form(standalone), None);
        assert!(doc.get(form).unwrap().is_form());
    }

    #[test]
    fn test_inputs_of_form_in_document_order() {
        let doc = FormDocument::parse_str(SIGNUP);
        let form = doc.select_first("form").unwrap();
        let names: Vec<&str> = doc
            .inputs_of(form)
            .into_iter()
            .filter_map(|id| doc.get(id).and_then(|el| el.attr("name")))
            .collect();

        assert_eq!(names, vec!["email", "password1", "password2"]);
    }

    #[test]
    fn test_select_in_scope() {
        let doc = FormDocument::parse_str(SIGNUP);
        let form = doc.select_first("form").unwrap();
        let password1 = doc.select_first("[name=password1]").unwrap();

        assert_eq!(doc.select_in(form, "[name=password1]"), Some(password1));
        assert_eq!(doc.select_in(form, "[name=standalone]"), None);
    }

    #[test]
    fn test_select_in_bad_selector() {
        let doc = FormDocument::parse_str(SIGNUP);
        let form = doc.select_first("form").unwrap();
        assert_eq!(doc.select_in(form, "[[nope"), None);
    }

    #[test]
    fn test_find_in_and_find() {
        let doc = FormDocument::parse_str(SIGNUP);
        let form = doc.select_first("form").unwrap();

        let feedback = doc.find_in(form, |el| el.attr("fv-for") == Some("email"));
        assert!(feedback.is_some());
        assert_eq!(doc.find(|el| el.attr("fv-for") == Some("missing")), None);
    }

    #[test]
    fn test_descendants_order() {
        let doc = FormDocument::parse_str(SIGNUP);
        let form = doc.select_first("form").unwrap();
        let descendants = doc.descendants(form);

        assert!(descendants.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(doc.get(descendants[0]).unwrap().name, "label");
    }

    #[test]
    fn test_with_attr() {
        let doc = FormDocument::parse_str(SIGNUP);
        assert_eq!(doc.with_attr("fv-form").len(), 1);
        assert_eq!(doc.with_attr("fv-input").len(), 1);
    }

    #[test]
    fn test_file_input() {
        let doc = FormDocument::parse_str(r#"<input type="FILE" name="avatar">"#);
        let avatar = doc.select_first("input").unwrap();
        assert!(doc.get(avatar).unwrap().is_file_input());
    }

    #[test]
    fn test_get_out_of_range() {
        let doc = FormDocument::parse_str("<p></p>");
        assert!(doc.get(ElementId(10_000)).is_none());
        assert!(doc.descendants(ElementId(10_000)).is_empty());
    }
}
