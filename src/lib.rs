//! formvalid: declarative, attribute-driven validation for HTML forms
//!
//! Inputs are annotated with marker attributes (`fv-required`, `fv-min-length`,
//! `fv-image-to-webp`, ...). The [`Validator`] derives per-input validity,
//! feedback text, cross-field dependencies and submit-button enablement from
//! those attributes, and runs image inspection and conversion off the
//! interaction path.

pub mod config;
pub mod document;
pub mod engine;
pub mod file;
pub mod pipeline;
pub mod render;
pub mod rules;
pub mod state;
pub mod validator;

pub use config::{Config, ConfigError, ConfigOverrides};
pub use document::{DocumentError, ElementId, FormDocument, HtmlElement};
pub use engine::{Evaluation, RuleEngine};
pub use file::SelectedFile;
pub use pipeline::{ConversionTarget, TaskId};
pub use render::RenderSink;
pub use rules::{Declaration, PasswordPolicy};
pub use state::{Phase, ValidityRecord};
pub use validator::{FormAggregate, Interaction, Message, SubmitOutcome, Validator, ValidatorError};
