//! Propagation engine
//!
//! The [`Validator`] owns per-input state and applies every change through
//! [`Validator::dispatch`]: user interactions, forced re-checks from linked
//! fields, and results delivered by the image pipeline. Each dispatch
//! re-evaluates the affected input, writes its validity into the render sink,
//! re-checks inputs that depend on it and recomputes the owning form.

use crate::config::Config;
use crate::document::{DocumentError, ElementId, FormDocument, HtmlElement};
use crate::engine::{RuleEngine, Subject};
use crate::file::SelectedFile;
use crate::pipeline::{self, TaskId, TaskQueue};
use crate::render::RenderSink;
use crate::rules::Peer;
use crate::state::{InputState, LinkGraph, StateStore, ValidityRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidatorError {
    #[error("Unknown element {0}")]
    UnknownElement(ElementId),
    #[error("Element {0} is not an input")]
    NotAnInput(ElementId),
    #[error("Element {0} is not a file input")]
    NotAFileInput(ElementId),
    #[error("Element {0} is not a form")]
    NotAForm(ElementId),
}

/// User interactions that may trigger re-validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interaction {
    Input,
    Change,
    KeyUp,
    Paste,
    Cut,
    CompositionEnd,
}

impl Interaction {
    pub const ALL: [Interaction; 6] = [
        Interaction::Input,
        Interaction::Change,
        Interaction::KeyUp,
        Interaction::Paste,
        Interaction::Cut,
        Interaction::CompositionEnd,
    ];
}

/// A change delivered to [`Validator::dispatch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// The user interacted with an input
    Interaction { input: ElementId, kind: Interaction },
    /// Re-evaluate an input as if a field it depends on changed
    Recheck { input: ElementId },
    /// Mark an input invalid with the given feedback, without re-evaluating
    ForcedFeedback { input: ElementId, feedback: String },
    /// Substitute a converted file for the one named `original`
    FileConverted {
        input: ElementId,
        original: String,
        replacement: SelectedFile,
    },
}

/// Whether a submission may go ahead
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Proceed,
    Blocked,
}

/// Validity of a form derived from its inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormAggregate {
    /// No input in the form holds an invalid record
    pub valid: bool,
    /// Feedback of the last invalid, used input in document order
    pub feedback: Option<String>,
}

/// Validates the forms of one document
#[derive(Debug)]
pub struct Validator {
    document: FormDocument,
    engine: RuleEngine,
    store: StateStore,
    links: LinkGraph,
    queue: TaskQueue,
    sink: RenderSink,
    forms: HashSet<ElementId>,
    listened: HashSet<ElementId>,
}

impl Validator {
    pub fn new(document: FormDocument, config: Config) -> Self {
        Self {
            document,
            engine: RuleEngine::new(config),
            store: StateStore::default(),
            links: LinkGraph::default(),
            queue: TaskQueue::default(),
            sink: RenderSink::default(),
            forms: HashSet::new(),
            listened: HashSet::new(),
        }
    }

    /// Parse markup and build a validator for it
    pub fn from_html(source: &str, config: Config) -> Self {
        Self::new(FormDocument::parse_str(source), config)
    }

    /// Read an HTML file and build a validator for it
    pub fn from_file(path: &Path, config: Config) -> Result<Self, DocumentError> {
        Ok(Self::new(FormDocument::parse_file(path)?, config))
    }

    pub fn document(&self) -> &FormDocument {
        &self.document
    }

    pub fn config(&self) -> &Config {
        self.engine.config()
    }

    /// First element matching a CSS selector
    pub fn element(&self, selector: &str) -> Option<ElementId> {
        self.document.select_first(selector)
    }

    /// Everything written to the page so far
    pub fn rendered(&self) -> &RenderSink {
        &self.sink
    }

    /// Attach every form carrying the form marker and every input carrying the input marker
    pub fn load_annotated(&mut self) {
        let form_marker = self.config().attr("form");
        let input_marker = self.config().attr("input");

        for form in self.document.with_attr(&form_marker) {
            if self.document.get(form).is_some_and(HtmlElement::is_form) {
                self.load_form(form);
            }
        }

        for input in self.document.with_attr(&input_marker) {
            if self.document.get(input).is_some_and(HtmlElement::is_input) {
                self.load_input(input);
            }
        }
    }

    /// Attach a form: evaluate every input silently and disable submit if invalid
    pub fn attach_form(&mut self, form: ElementId) -> Result<(), ValidatorError> {
        self.require_form(form)?;
        self.load_form(form);
        Ok(())
    }

    /// Attach a single input, or its owning form when it has one
    pub fn attach_input(&mut self, input: ElementId) -> Result<(), ValidatorError> {
        self.require_input(input)?;
        self.load_input(input);
        Ok(())
    }

    /// Record an interaction with an input
    pub fn interact(&mut self, input: ElementId, kind: Interaction) -> Result<(), ValidatorError> {
        self.dispatch(Message::Interaction { input, kind })
    }

    /// Replace an input's value and deliver an `input` interaction
    pub fn set_value(&mut self, input: ElementId, value: &str) -> Result<(), ValidatorError> {
        self.require_input(input)?;
        self.load_input(input);
        if let Some(state) = self.store.get_mut(input) {
            state.value = value.to_string();
        }
        self.interact(input, Interaction::Input)
    }

    /// Replace a file input's selection and deliver a `change` interaction
    pub fn select_files(
        &mut self,
        input: ElementId,
        files: Vec<SelectedFile>,
    ) -> Result<(), ValidatorError> {
        let element = self.require_input(input)?;
        if !element.is_file_input() {
            return Err(ValidatorError::NotAFileInput(input));
        }

        self.load_input(input);
        if let Some(state) = self.store.get_mut(input) {
            state.files = Some(files);
        }
        self.interact(input, Interaction::Change)
    }

    /// Handle a form submission
    ///
    /// Forms that opt in with `prevent-default="true"` mark every input used,
    /// re-evaluate them and block the submission when any is invalid. Other
    /// forms always proceed.
    pub fn submit(&mut self, form: ElementId) -> Result<SubmitOutcome, ValidatorError> {
        let element = self.require_form(form)?;
        let intercept = element.attr(&self.config().attr("prevent-default")) == Some("true");

        self.load_form(form);
        if !intercept {
            return Ok(SubmitOutcome::Proceed);
        }

        for input in self.document.inputs_of(form) {
            self.mark_used(input);
            self.process_input(input, None);
        }

        if self.refresh_form(form) {
            Ok(SubmitOutcome::Proceed)
        } else {
            log::debug!("submission of {form} blocked");
            Ok(SubmitOutcome::Blocked)
        }
    }

    /// Apply one change; the single entry point for every state mutation
    pub fn dispatch(&mut self, message: Message) -> Result<(), ValidatorError> {
        match message {
            Message::Interaction { input, kind } => {
                self.require_input(input)?;
                self.load_input(input);

                if !self.config().is_listened(kind) {
                    log::trace!("{input}: ignoring {kind:?}");
                    return Ok(());
                }

                self.propagate_change(input)?;
            }
            Message::Recheck { input } => {
                self.require_input(input)?;
                self.load_input(input);
                self.recheck(input);
                self.refresh_owning_form(input);
            }
            Message::ForcedFeedback { input, feedback } => {
                self.require_input(input)?;
                self.load_input(input);
                self.mark_used(input);
                self.process_input(input, Some(feedback));
                self.refresh_owning_form(input);
            }
            Message::FileConverted {
                input,
                original,
                replacement,
            } => {
                self.require_input(input)?;
                self.load_input(input);

                let substituted = self
                    .store
                    .get_mut(input)
                    .and_then(|state| state.files.as_mut())
                    .and_then(|files| files.iter_mut().find(|file| file.name() == original))
                    .map(|slot| *slot = replacement)
                    .is_some();

                if !substituted {
                    log::debug!("{input}: {original} is no longer selected, dropping conversion");
                    return Ok(());
                }

                // selection changed; re-enter regardless of listened interactions
                self.propagate_change(input)?;
            }
        }

        Ok(())
    }

    /// Run every queued task and deliver the results
    ///
    /// Returns the number of messages delivered. Tasks scheduled while
    /// delivering stay queued.
    pub fn run_pending(&mut self) -> Result<usize, ValidatorError> {
        let tasks = self.queue.drain();
        if tasks.is_empty() {
            return Ok(0);
        }

        log::debug!("running {} pending task(s)", tasks.len());
        let messages = pipeline::run_batch(&tasks, self.config().parallel_decode);
        let delivered = messages.len();

        for message in messages {
            self.dispatch(message)?;
        }

        Ok(delivered)
    }

    /// Run tasks until none remain, including tasks scheduled by their results
    pub fn run_until_settled(&mut self) -> Result<usize, ValidatorError> {
        let mut delivered = 0;
        while !self.queue.is_empty() {
            delivered += self.run_pending()?;
        }
        Ok(delivered)
    }

    /// Run one queued task and deliver its result; false if no such task is queued
    pub fn complete_task(&mut self, id: TaskId) -> Result<bool, ValidatorError> {
        let Some(task) = self.queue.take(id) else {
            return Ok(false);
        };

        if let Some(message) = task.run() {
            self.dispatch(message)?;
        }

        Ok(true)
    }

    /// Ids of queued tasks, oldest first
    pub fn pending_tasks(&self) -> Vec<TaskId> {
        self.queue.ids()
    }

    /// Whether an input has no outstanding image work
    pub fn is_settled(&self, input: ElementId) -> bool {
        self.queue.pending_for(input) == 0
    }

    pub fn record(&self, input: ElementId) -> Option<&ValidityRecord> {
        self.store.get(input).map(|state| &state.record)
    }

    /// Current value of an input, after transforms
    pub fn value(&self, input: ElementId) -> Option<&str> {
        self.store.get(input).map(|state| state.value.as_str())
    }

    /// Current file selection of a file input
    pub fn files(&self, input: ElementId) -> Option<&[SelectedFile]> {
        self.store.get(input).and_then(|state| state.files.as_deref())
    }

    /// Inputs re-checked when `target` changes
    pub fn dependents(&self, target: ElementId) -> &[ElementId] {
        self.links.dependents(target)
    }

    /// Aggregate validity and feedback of a form
    pub fn form_state(&self, form: ElementId) -> Result<FormAggregate, ValidatorError> {
        self.require_form(form)?;
        Ok(self.aggregate(form))
    }

    fn require_element(&self, id: ElementId) -> Result<&HtmlElement, ValidatorError> {
        self.document
            .get(id)
            .ok_or(ValidatorError::UnknownElement(id))
    }

    fn require_input(&self, id: ElementId) -> Result<&HtmlElement, ValidatorError> {
        let element = self.require_element(id)?;
        if element.is_input() {
            Ok(element)
        } else {
            Err(ValidatorError::NotAnInput(id))
        }
    }

    fn require_form(&self, id: ElementId) -> Result<&HtmlElement, ValidatorError> {
        let element = self.require_element(id)?;
        if element.is_form() {
            Ok(element)
        } else {
            Err(ValidatorError::NotAForm(id))
        }
    }

    fn load_form(&mut self, form: ElementId) {
        if !self.forms.insert(form) {
            return;
        }

        log::debug!("attaching form {form}");
        let inputs = self.document.inputs_of(form);
        for &input in &inputs {
            self.track(input);
            self.listened.insert(input);
        }
        for input in inputs {
            self.process_input(input, None);
        }

        if self.submit_disabling(form) && !self.aggregate(form).valid {
            if let Some(submit) = self.submit_control(form) {
                self.sink.set_disabled(submit, true);
            }
        }
    }

    fn load_input(&mut self, input: ElementId) {
        if self.listened.contains(&input) {
            return;
        }

        if let Some(form) = self.document.owning_form(input) {
            self.load_form(form);
            return;
        }

        log::debug!("attaching input {input}");
        self.track(input);
        self.listened.insert(input);
        self.process_input(input, None);
    }

    /// Start tracking an input, backfilling implicit attributes once
    fn track(&mut self, input: ElementId) {
        let Some(element) = self.document.get(input) else {
            return;
        };

        let state = InputState::new(element.attr("value").unwrap_or(""), element.is_file_input());
        if !self.store.insert_if_absent(input, state) {
            return;
        }

        let declaration = self.engine.declaration(element);
        for (attr, value) in self.engine.normalize(&declaration) {
            self.sink.set_attr(input, attr, value);
        }
    }

    fn mark_used(&mut self, input: ElementId) {
        if let Some(state) = self.store.get_mut(input) {
            state.record.used = true;
        }
        let used = self.config().attr("used");
        self.sink.set_attr(input, used, "");
    }

    /// Interaction path: re-check the input and its form, then deliver a
    /// [`Message::Recheck`] to every dependent
    fn propagate_change(&mut self, input: ElementId) -> Result<(), ValidatorError> {
        self.recheck(input);
        self.refresh_owning_form(input);

        for dependent in self.links.dependents(input).to_vec() {
            log::trace!("{input} changed, re-checking {dependent}");
            self.dispatch(Message::Recheck { input: dependent })?;
        }

        Ok(())
    }

    fn recheck(&mut self, input: ElementId) {
        self.mark_used(input);
        self.process_input(input, None);
    }

    fn refresh_owning_form(&mut self, input: ElementId) {
        if let Some(form) = self.document.owning_form(input) {
            self.refresh_form(form);
        }
    }

    /// Evaluate (or take forced feedback), store the record and render it
    fn process_input(&mut self, input: ElementId, forced: Option<String>) {
        let feedback = match forced {
            Some(feedback) => Some(feedback),
            None => self.evaluate(input),
        };

        let Some(state) = self.store.get_mut(input) else {
            return;
        };
        state.record.apply(feedback);

        let record = state.record.clone();
        self.render_input(input, &record);
    }

    fn evaluate(&mut self, input: ElementId) -> Option<String> {
        let element = self.document.get(input)?;
        let declaration = self.engine.declaration(element);
        let peer = self.resolve_peer(input, element);
        let state = self.store.get_mut(input)?;

        let evaluation = self.engine.evaluate(Subject {
            declaration,
            value: &state.value,
            files: state.files.as_deref(),
            peer,
            memo: &mut state.memo,
        });

        state.value = evaluation.value;

        if let Some(target) = evaluation.link {
            if self.links.register(target, input) {
                log::trace!("{input} now follows {target}");
            }
        }

        for work in evaluation.tasks {
            self.queue.enqueue(input, work);
        }

        evaluation.feedback
    }

    /// Resolve the field an input's `equal` rule points at, within its form
    fn resolve_peer(&self, input: ElementId, element: &HtmlElement) -> Option<Peer> {
        let declaration = self.engine.declaration(element);
        let selector = declaration.get("equal")?;

        let Some(form) = self.document.owning_form(input) else {
            log::debug!("{input}: equal rule outside a form is ignored");
            return None;
        };

        let Some(target) = self.document.select_in(form, selector) else {
            log::debug!("{input}: equal target {selector:?} not found");
            return None;
        };

        let target_element = self.document.get(target)?;
        let name = self
            .engine
            .declaration(target_element)
            .display_name(&self.config().fallback_name);
        let value = match self.store.get(target) {
            Some(state) => state.value.clone(),
            None => target_element.attr("value").unwrap_or_default().to_string(),
        };

        Some(Peer {
            id: target,
            name,
            value,
        })
    }

    fn render_input(&mut self, input: ElementId, record: &ValidityRecord) {
        let config = self.engine.config();
        let valid = config.attr("valid");
        let input_feedback = config.attr("input-feedback");
        let for_feedback = config.attr("for-feedback");

        self.sink
            .set_attr(input, valid, if record.valid { "true" } else { "false" });

        match &record.feedback {
            Some(feedback) => self.sink.set_attr(input, input_feedback, feedback.as_str()),
            None => self.sink.remove_attr(input, &input_feedback),
        }

        if let Some(node) = self.feedback_node(input) {
            if record.used {
                self.sink
                    .set_text(node, record.feedback.clone().unwrap_or_default());
            }
            let flag = if record.feedback.is_some() { "true" } else { "false" };
            self.sink.set_attr(node, for_feedback, flag);
        }
    }

    /// Feedback node for an input: form-scoped, then parent-scoped, then document-wide
    fn feedback_node(&self, input: ElementId) -> Option<ElementId> {
        let name = self.document.get(input)?.attr("name")?;
        let for_attr = self.config().attr("for");
        let matches = |element: &HtmlElement| element.attr(&for_attr) == Some(name);

        self.document
            .owning_form(input)
            .and_then(|form| self.document.find_in(form, &matches))
            .or_else(|| {
                self.document
                    .parent(input)
                    .and_then(|parent| self.document.find_in(parent, &matches))
            })
            .or_else(|| self.document.find(&matches))
    }

    fn submit_control(&self, form: ElementId) -> Option<ElementId> {
        let marker = self.config().attr("submit");
        self.document
            .find_in(form, |element| element.has_attr(&marker))
            .or_else(|| {
                self.document.find_in(form, |element| {
                    element
                        .attr("type")
                        .is_some_and(|kind| kind.eq_ignore_ascii_case("submit"))
                })
            })
    }

    fn submit_disabling(&self, form: ElementId) -> bool {
        let attr = self.config().attr("disable-submit");
        self.document
            .get(form)
            .is_some_and(|element| element.attr(&attr) != Some("false"))
    }

    fn aggregate(&self, form: ElementId) -> FormAggregate {
        let records: Vec<&ValidityRecord> = self
            .document
            .inputs_of(form)
            .into_iter()
            .filter_map(|input| self.record(input))
            .collect();

        FormAggregate {
            valid: records.iter().all(|record| record.valid),
            feedback: records
                .iter()
                .rev()
                .find(|record| !record.valid && record.used)
                .and_then(|record| record.feedback.clone()),
        }
    }

    /// Recompute a form's submit state and feedback container; returns aggregate validity
    fn refresh_form(&mut self, form: ElementId) -> bool {
        let aggregate = self.aggregate(form);

        if self.submit_disabling(form) {
            if let Some(submit) = self.submit_control(form) {
                self.sink.set_disabled(submit, !aggregate.valid);
            }
        }

        let marker = self.config().attr("form-feedback");
        if let Some(container) = self.document.find_in(form, |element| element.has_attr(&marker)) {
            let flag = if aggregate.feedback.is_some() { "true" } else { "false" };
            self.sink
                .set_text(container, aggregate.feedback.clone().unwrap_or_default());
            self.sink.set_attr(container, marker, flag);
        }

        aggregate.valid
    }
}
