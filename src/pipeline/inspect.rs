//! Image dimension and aspect-ratio inspection

use super::PipelineError;
use crate::rules::predicates::parse_float;
use crate::rules::{Declaration, MessageCatalog};
use image::ImageReader;
use std::io::Cursor;

/// A deferred rule that needs decoded pixel dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectionRule {
    MinWidth,
    MaxWidth,
    MinHeight,
    MaxHeight,
    AspectRatio,
}

impl InspectionRule {
    /// Inspection rules in precedence order
    pub const ALL: [InspectionRule; 5] = [
        InspectionRule::MinWidth,
        InspectionRule::MaxWidth,
        InspectionRule::MinHeight,
        InspectionRule::MaxHeight,
        InspectionRule::AspectRatio,
    ];

    /// Attribute name without prefix
    pub fn id(self) -> &'static str {
        match self {
            InspectionRule::MinWidth => "image-min-width",
            InspectionRule::MaxWidth => "image-max-width",
            InspectionRule::MinHeight => "image-min-height",
            InspectionRule::MaxHeight => "image-max-height",
            InspectionRule::AspectRatio => "image-aspect-ratio",
        }
    }
}

/// A declared inspection rule with its bound and pre-rendered feedback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectionCheck {
    pub rule: InspectionRule,
    /// Attribute value as declared ("800", "16:9")
    pub bound: String,
    /// Feedback delivered when the check is violated
    pub message: String,
}

impl InspectionCheck {
    /// Collect the inspection rules an input declares, in precedence order
    pub fn from_declaration(
        declaration: &Declaration<'_>,
        catalog: &MessageCatalog,
        name: &str,
    ) -> Vec<InspectionCheck> {
        InspectionRule::ALL
            .into_iter()
            .filter_map(|rule| {
                let bound = declaration.get(rule.id())?;
                Some(InspectionCheck {
                    rule,
                    bound: bound.to_string(),
                    message: catalog.render(rule.id(), name, Some(bound)),
                })
            })
            .collect()
    }

    /// Whether an image of the given natural size violates this check
    ///
    /// An unparsable numeric bound is always violated.
    pub fn is_violated(&self, width: u32, height: u32) -> bool {
        if self.rule == InspectionRule::AspectRatio {
            return aspect_ratio(width, height) != self.bound;
        }

        let Some(bound) = parse_float(&self.bound) else {
            return true;
        };

        match self.rule {
            InspectionRule::MinWidth => f64::from(width) < bound,
            InspectionRule::MaxWidth => f64::from(width) > bound,
            InspectionRule::MinHeight => f64::from(height) < bound,
            InspectionRule::MaxHeight => f64::from(height) > bound,
            InspectionRule::AspectRatio => false,
        }
    }
}

/// Natural pixel dimensions of an encoded image, read from its header
pub fn dimensions(bytes: &[u8]) -> Result<(u32, u32), PipelineError> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    Ok(reader.into_dimensions()?)
}

/// Width:height reduced by their greatest common divisor ("16:9")
pub fn aspect_ratio(width: u32, height: u32) -> String {
    let divisor = gcd(width, height);
    if divisor == 0 {
        return "0:0".to_string();
    }
    format!("{}:{}", width / divisor, height / divisor)
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}
