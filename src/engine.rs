//! Rule evaluation engine
//!
//! Evaluating an input runs its transforms, walks the rule table in order and
//! stops at the first failing rule. When every synchronous rule passes, the
//! image inspections and conversions the input declares are returned as
//! deferred work.

use crate::config::Config;
use crate::document::{ElementId, HtmlElement};
use crate::file::SelectedFile;
use crate::pipeline::{ConversionTarget, InspectionCheck, SizingHints, TaskWork};
use crate::rules::{
    transform, Check, Declaration, MessageCatalog, Peer, RuleInput, Scope, RULE_TABLE,
};
use crate::state::ConversionMemo;

/// Media families that backfill `accept`, first declared wins
const ACCEPT_BACKFILL: &[(&str, &str)] = &[
    ("image", "image/*"),
    ("audio", "audio/*"),
    ("video", "video/*"),
];

/// File-count rules that backfill `multiple`
const MULTIPLE_BACKFILL: &[&str] = &["files", "min-files", "max-files"];

/// What one evaluation looks at
pub struct Subject<'a> {
    pub declaration: Declaration<'a>,
    /// Current value before transforms
    pub value: &'a str,
    /// File selection; `None` for inputs that cannot hold files
    pub files: Option<&'a [SelectedFile]>,
    /// Resolved target of the `equal` rule
    pub peer: Option<Peer>,
    /// Conversions already queued for this input
    pub memo: &'a mut ConversionMemo,
}

/// Outcome of evaluating one input
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Value after transforms
    pub value: String,
    /// First failing rule's message, `None` when valid
    pub feedback: Option<String>,
    /// Field this input depends on through `equal`
    pub link: Option<ElementId>,
    /// Deferred image work, empty unless every synchronous rule passed
    pub tasks: Vec<TaskWork>,
}

impl Evaluation {
    pub fn is_valid(&self) -> bool {
        self.feedback.is_none()
    }
}

/// Evaluates declarations against values
#[derive(Debug, Clone)]
pub struct RuleEngine {
    config: Config,
    messages: MessageCatalog,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl RuleEngine {
    pub fn new(config: Config) -> Self {
        let messages = MessageCatalog::new(&config.messages);
        Self { config, messages }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn messages(&self) -> &MessageCatalog {
        &self.messages
    }

    /// Attribute view of an element under the configured prefix
    pub fn declaration<'a>(&'a self, element: &'a HtmlElement) -> Declaration<'a> {
        Declaration::new(element, &self.config.prefix)
    }

    /// Evaluate one input
    pub fn evaluate(&self, subject: Subject<'_>) -> Evaluation {
        let Subject {
            declaration,
            value,
            files,
            peer,
            memo,
        } = subject;

        let name = declaration.display_name(&self.config.fallback_name);
        let value = transform::apply(&declaration, value);
        let link = peer.as_ref().map(|peer| peer.id);

        let feedback = self.first_failure(&declaration, &value, files, peer.as_ref(), &name);

        let tasks = match (&feedback, files) {
            (None, Some(files)) => self.schedule(&declaration, files, memo, &name),
            _ => Vec::new(),
        };

        match &feedback {
            Some(message) => log::trace!("{name}: {message}"),
            None => log::trace!("{name}: valid, {} deferred task(s)", tasks.len()),
        }

        Evaluation {
            value,
            feedback,
            link,
            tasks,
        }
    }

    /// Attributes to backfill on a file input before its first evaluation
    ///
    /// `accept` is derived from the first media-family rule and `multiple` from
    /// any file-count rule, unless the element already declares them.
    pub fn normalize(&self, declaration: &Declaration<'_>) -> Vec<(&'static str, &'static str)> {
        let mut backfill = Vec::new();

        if !declaration.element().is_file_input() {
            return backfill;
        }

        if declaration.raw("accept").is_none() {
            if let Some((_, accept)) = ACCEPT_BACKFILL
                .iter()
                .find(|(rule, _)| declaration.has(rule))
            {
                backfill.push(("accept", *accept));
            }
        }

        if declaration.raw("multiple").is_none()
            && MULTIPLE_BACKFILL.iter().any(|rule| declaration.has(rule))
        {
            backfill.push(("multiple", ""));
        }

        backfill
    }

    fn first_failure(
        &self,
        declaration: &Declaration<'_>,
        value: &str,
        files: Option<&[SelectedFile]>,
        peer: Option<&Peer>,
        name: &str,
    ) -> Option<String> {
        let input = RuleInput {
            declaration,
            value,
            files: files.unwrap_or(&[]),
            peer,
            password: &self.config.password,
        };

        for entry in RULE_TABLE {
            let Some(arg) = declaration.get(entry.id) else {
                continue;
            };

            match entry.scope {
                Scope::Files if files.is_none() => continue,
                Scope::Peer if peer.is_none() => continue,
                _ => {}
            }

            let message = match (entry.check)(&input, arg) {
                Check::Pass => continue,
                Check::Fail => self.messages.render(entry.id, name, Some(arg)),
                Check::FailAs { rule, value } => self.messages.render(rule, name, value.as_deref()),
            };

            return Some(message);
        }

        None
    }

    fn schedule(
        &self,
        declaration: &Declaration<'_>,
        files: &[SelectedFile],
        memo: &mut ConversionMemo,
        name: &str,
    ) -> Vec<TaskWork> {
        let mut tasks = Vec::new();

        let checks = InspectionCheck::from_declaration(declaration, &self.messages, name);
        if !checks.is_empty() {
            tasks.extend(
                files
                    .iter()
                    .filter(|file| file.is_image())
                    .map(|file| TaskWork::Inspect {
                        file: file.clone(),
                        checks: checks.clone(),
                    }),
            );
        }

        for target in ConversionTarget::ALL {
            if !declaration.has(target.rule_id()) {
                continue;
            }

            let sizing = SizingHints::from_declaration(declaration);
            for file in files {
                if !file.is_image() || target.matches_name(file.name()) {
                    continue;
                }

                if !memo.claim(target, file.stem()) {
                    log::trace!("{name}: {} already queued for {}", file.stem(), target.extension());
                    continue;
                }

                tasks.push(TaskWork::Convert {
                    file: file.clone(),
                    target,
                    sizing: sizing.clone(),
                    jpeg_quality: self.config.jpeg_quality,
                });
            }
        }

        tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigOverrides;
    use crate::document::FormDocument;
    use std::collections::HashMap;

    struct Harness {
        doc: FormDocument,
        engine: RuleEngine,
        memo: ConversionMemo,
    }

    impl Harness {
        fn new(markup: &str) -> Self {
            Self::with_engine(markup, RuleEngine::default())
        }

        fn with_engine(markup: &str, engine: RuleEngine) -> Self {
            Self {
                doc: FormDocument::parse_str(markup),
                engine,
                memo: ConversionMemo::default(),
            }
        }

        fn run(&mut self, value: &str, files: Option<&[SelectedFile]>, peer: Option<Peer>) -> Evaluation {
            let id = self.doc.select_first("input").unwrap();
            let declaration = self.engine.declaration(self.doc.get(id).unwrap());
            self.engine.evaluate(Subject {
                declaration,
                value,
                files,
                peer,
                memo: &mut self.memo,
            })
        }

        fn feedback(&mut self, value: &str) -> Option<String> {
            self.run(value, None, None).feedback
        }
    }

    fn image(name: &str) -> SelectedFile {
        SelectedFile::new(name, "image/png", vec![0u8; 16])
    }

    #[test]
    fn test_required_then_email() {
        let mut h = Harness::new(r#"<input name="email" fv-required fv-email>"#);
        assert_eq!(h.feedback("").as_deref(), Some("email is required"));
        assert_eq!(h.feedback("abc").as_deref(), Some("email must be an email"));
        assert_eq!(h.feedback("a@b.co"), None);
    }

    #[test]
    fn test_min_max_bounds() {
        let mut h = Harness::new(r#"<input name="age" fv-min="5" fv-max="10">"#);
        assert_eq!(h.feedback("").as_deref(), Some("age must be at least 5"));
        assert_eq!(h.feedback("3").as_deref(), Some("age must be at least 5"));
        assert_eq!(h.feedback("20").as_deref(), Some("age must be at most 10"));
        assert_eq!(h.feedback("7"), None);
    }

    #[test]
    fn test_transform_runs_before_rules() {
        let mut h = Harness::new(r#"<input name="code" fv-to-upper fv-upper>"#);
        let evaluation = h.run("abc", None, None);
        assert_eq!(evaluation.value, "ABC");
        assert!(evaluation.is_valid());
    }

    #[test]
    fn test_display_name_fallback() {
        let mut h = Harness::new("<input fv-required>");
        assert_eq!(h.feedback("").as_deref(), Some("input is required"));

        let mut config = Config::default();
        config
            .merge(ConfigOverrides {
                fallback_name: Some("field".to_string()),
                ..Default::default()
            })
            .unwrap();
        let mut h = Harness::with_engine("<input fv-required>", RuleEngine::new(config));
        assert_eq!(h.feedback("").as_deref(), Some("field is required"));
    }

    #[test]
    fn test_message_override() {
        let config = Config {
            messages: HashMap::from([("required".to_string(), "Fill in {{name}}".to_string())]),
            ..Default::default()
        };
        let mut h = Harness::with_engine(r#"<input name="city" fv-required>"#, RuleEngine::new(config));
        assert_eq!(h.feedback("").as_deref(), Some("Fill in city"));
    }

    #[test]
    fn test_idempotent() {
        let mut h = Harness::new(r#"<input name="x" fv-min-length="3" fv-to-trim>"#);
        let first = h.run(" ab ", None, None);
        let second = h.run(" ab ", None, None);
        assert_eq!(first, second);
    }

    #[test]
    fn test_password_feedback() {
        let mut h = Harness::new(r#"<input name="pw" fv-password fv-password-length="10">"#);
        assert_eq!(
            h.feedback("abcdefG1!").as_deref(),
            Some("pw must be at least 10 characters long")
        );
        assert_eq!(
            h.feedback("ABC").as_deref(),
            Some("pw must contain at least one lowercase letter")
        );
    }

    #[test]
    fn test_equal_uses_peer_name() {
        let mut h = Harness::new(r#"<input name="password2" fv-equal="[name=password1]">"#);
        let id = h.doc.select_first("input").unwrap();
        let peer = Peer {
            id,
            name: "password1".to_string(),
            value: "secret".to_string(),
        };

        let evaluation = h.run("other", None, Some(peer.clone()));
        assert_eq!(
            evaluation.feedback.as_deref(),
            Some("password2 must be equal to \"password1\"")
        );
        assert_eq!(evaluation.link, Some(id));

        assert!(h.run("secret", None, Some(peer)).is_valid());
        assert!(h.run("other", None, None).is_valid());
    }

    #[test]
    fn test_file_rules_skipped_without_selection() {
        let mut h = Harness::new(r#"<input name="doc" fv-min-files="1">"#);
        assert_eq!(h.feedback(""), None);
        assert_eq!(
            h.run("", Some(&[]), None).feedback.as_deref(),
            Some("doc must be at least 1 files")
        );
    }

    #[test]
    fn test_media_type_rule() {
        let mut h = Harness::new(r#"<input type="file" name="avatar" fv-image>"#);
        let text = SelectedFile::new("a.txt", "text/plain", b"hi".to_vec());
        assert_eq!(
            h.run("", Some(&[text]), None).feedback.as_deref(),
            Some("avatar must be an image")
        );
    }

    #[test]
    fn test_conversion_memoized() {
        let mut h = Harness::new(r#"<input type="file" name="photo" fv-image-to-webp>"#);
        let files = vec![image("a.png")];

        let first = h.run("", Some(&files), None);
        let second = h.run("", Some(&files), None);

        assert_eq!(first.tasks.len(), 1);
        assert!(second.tasks.is_empty());
        assert!(h.memo.contains(ConversionTarget::WebP, "a"));
    }

    #[test]
    fn test_conversion_skips_target_extension_and_non_images() {
        let mut h = Harness::new(r#"<input type="file" fv-image-to-png>"#);
        let files = vec![
            image("done.png"),
            SelectedFile::new("notes.txt", "text/plain", Vec::new()),
        ];
        assert!(h.run("", Some(&files), None).tasks.is_empty());
    }

    #[test]
    fn test_no_tasks_when_sync_rule_fails() {
        let mut h = Harness::new(
            r#"<input type="file" fv-max-files="1" fv-image-min-width="10" fv-image-to-jpg>"#,
        );
        let files = vec![image("a.png"), image("b.png")];

        let evaluation = h.run("", Some(&files), None);
        assert!(!evaluation.is_valid());
        assert!(evaluation.tasks.is_empty());
        assert!(h.memo.is_empty());
    }

    #[test]
    fn test_inspection_tasks_per_image() {
        let mut h = Harness::new(r#"<input type="file" name="p" fv-image-max-height="50">"#);
        let files = vec![
            image("a.png"),
            image("b.png"),
            SelectedFile::new("c.pdf", "application/pdf", Vec::new()),
        ];

        let tasks = h.run("", Some(&files), None).tasks;
        assert_eq!(tasks.len(), 2);
        assert!(matches!(&tasks[0], TaskWork::Inspect { checks, .. }
            if checks[0].message == "p height must be less than 50px"));
    }

    #[test]
    fn test_normalize_backfills_file_inputs() {
        let h = Harness::new(r#"<input type="file" fv-audio fv-image fv-max-files="3">"#);
        let id = h.doc.select_first("input").unwrap();
        let declaration = h.engine.declaration(h.doc.get(id).unwrap());

        assert_eq!(
            h.engine.normalize(&declaration),
            vec![("accept", "image/*"), ("multiple", "")]
        );
    }

    #[test]
    fn test_normalize_respects_existing_attributes() {
        let h = Harness::new(r#"<input type="file" accept=".png" multiple fv-image fv-files="2">"#);
        let id = h.doc.select_first("input").unwrap();
        let declaration = h.engine.declaration(h.doc.get(id).unwrap());
        assert!(h.engine.normalize(&declaration).is_empty());

        let text = Harness::new(r#"<input fv-image>"#);
        let id = text.doc.select_first("input").unwrap();
        let declaration = text.engine.declaration(text.doc.get(id).unwrap());
        assert!(text.engine.normalize(&declaration).is_empty());
    }
}
