//! Feedback message templates

use std::collections::HashMap;

/// Template used for rule ids without a registered message
const FALLBACK_TEMPLATE: &str = "{{name}} is invalid";

/// Built-in templates keyed by rule id
const DEFAULT_TEMPLATES: &[(&str, &str)] = &[
    ("required", "{{name}} is required"),
    ("min-length", "{{name}} must be at least {{value}} characters long"),
    ("max-length", "{{name}} must be at most {{value}} characters long"),
    ("min", "{{name}} must be at least {{value}}"),
    ("max", "{{name}} must be at most {{value}}"),
    ("include", "{{name}} must include \"{{value}}\""),
    ("exclude", "{{name}} must not include \"{{value}}\""),
    ("start", "{{name}} must start with \"{{value}}\""),
    ("no-start", "{{name}} must not start with \"{{value}}\""),
    ("end", "{{name}} must end with \"{{value}}\""),
    ("no-end", "{{name}} must not end with \"{{value}}\""),
    ("upper", "{{name}} must be uppercase"),
    ("lower", "{{name}} must be lowercase"),
    ("trim", "{{name}} must not contain spaces"),
    ("regex", "{{name}} must match with \"{{value}}\""),
    ("int", "{{name}} must be an integer number"),
    ("float", "{{name}} must be a float number"),
    ("string", "{{name}} must be a text"),
    ("email", "{{name}} must be an email"),
    ("password-lowercase", "{{name}} must contain at least one lowercase letter"),
    ("password-uppercase", "{{name}} must contain at least one uppercase letter"),
    ("password-digits", "{{name}} must contain at least one digit"),
    ("password-special-chars", "{{name}} must contain at least one special character"),
    ("password-length", "{{name}} must be at least {{value}} characters long"),
    ("url", "{{name}} must be a url"),
    ("http-url", "{{name}} must be an http url"),
    ("ip", "{{name}} must be an ipv4"),
    ("equal", "{{name}} must be equal to \"{{value}}\""),
    ("image", "{{name}} must be an image"),
    ("audio", "{{name}} must be an audio"),
    ("video", "{{name}} must be a video"),
    ("min-size", "{{name}} must be at least {{value}} bytes"),
    ("max-size", "{{name}} must be less than {{value}} bytes"),
    ("file-include", "{{name}} must include \"{{value}}\""),
    ("file-exclude", "{{name}} must not include \"{{value}}\""),
    ("file-start", "{{name}} must start with \"{{value}}\""),
    ("file-no-start", "{{name}} must not start with \"{{value}}\""),
    ("file-end", "{{name}} must be \"{{value}}\""),
    ("file-no-end", "{{name}} must not be \"{{value}}\""),
    ("files", "{{name}} must be {{value}} files"),
    ("min-files", "{{name}} must be at least {{value}} files"),
    ("max-files", "{{name}} must be less than {{value}} files"),
    ("image-min-width", "{{name}} width must be at least {{value}}px"),
    ("image-max-width", "{{name}} width must be less than {{value}}px"),
    ("image-min-height", "{{name}} height must be at least {{value}}px"),
    ("image-max-height", "{{name}} height must be less than {{value}}px"),
    ("image-aspect-ratio", "{{name}} must have aspect ratio {{value}}"),
];

/// Rule id -> template lookup with configured overrides applied
#[derive(Debug, Clone)]
pub struct MessageCatalog {
    templates: HashMap<String, String>,
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::new(&HashMap::new())
    }
}

impl MessageCatalog {
    /// Build the catalog from the built-in templates plus overrides
    pub fn new(overrides: &HashMap<String, String>) -> Self {
        let mut templates: HashMap<String, String> = DEFAULT_TEMPLATES
            .iter()
            .map(|(id, template)| (id.to_string(), template.to_string()))
            .collect();

        for (id, template) in overrides {
            templates.insert(id.clone(), template.clone());
        }

        Self { templates }
    }

    /// Template registered for a rule id
    pub fn template(&self, rule: &str) -> Option<&str> {
        self.templates.get(rule).map(String::as_str)
    }

    /// Render the message for a failed rule
    pub fn render(&self, rule: &str, name: &str, value: Option<&str>) -> String {
        let template = self.template(rule).unwrap_or(FALLBACK_TEMPLATE);
        render_template(template, name, value)
    }
}

/// Substitute `{{name}}` and `{{value}}` in a template
pub fn render_template(template: &str, name: &str, value: Option<&str>) -> String {
    let message = template.replace("{{name}}", name);
    match value {
        Some(value) => message.replace("{{value}}", value),
        None => message,
    }
}
