//! Per-input validity state, conversion memo and cross-field links

use crate::document::ElementId;
use crate::file::SelectedFile;
use crate::pipeline::ConversionTarget;
use std::collections::{HashMap, HashSet};

/// Lifecycle phase of an input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not yet interacted with; feedback is computed but not shown
    Unused,
    UsedValid,
    UsedInvalid,
}

/// Derived validity of one input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidityRecord {
    pub valid: bool,
    /// Set on first interaction or forced re-check, never cleared
    pub used: bool,
    /// Message of the first failing rule, `None` when valid
    pub feedback: Option<String>,
}

impl Default for ValidityRecord {
    fn default() -> Self {
        Self {
            valid: true,
            used: false,
            feedback: None,
        }
    }
}

impl ValidityRecord {
    pub fn phase(&self) -> Phase {
        match (self.used, self.valid) {
            (false, _) => Phase::Unused,
            (true, true) => Phase::UsedValid,
            (true, false) => Phase::UsedInvalid,
        }
    }

    /// Record a new evaluation outcome
    pub fn apply(&mut self, feedback: Option<String>) {
        self.valid = feedback.is_none();
        self.feedback = feedback;
    }
}

/// File stems already queued for conversion, per target format
///
/// Entries are never removed.
#[derive(Debug, Clone, Default)]
pub struct ConversionMemo {
    queued: HashMap<ConversionTarget, HashSet<String>>,
}

impl ConversionMemo {
    /// Record a stem for a target; false when it was already recorded
    pub fn claim(&mut self, target: ConversionTarget, stem: &str) -> bool {
        self.queued
            .entry(target)
            .or_default()
            .insert(stem.to_string())
    }

    pub fn contains(&self, target: ConversionTarget, stem: &str) -> bool {
        self.queued
            .get(&target)
            .is_some_and(|stems| stems.contains(stem))
    }

    /// Number of (target, stem) pairs recorded
    pub fn len(&self) -> usize {
        self.queued.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything the validator tracks for one attached input
#[derive(Debug, Clone, Default)]
pub struct InputState {
    /// Current (post-transform) value
    pub value: String,
    /// Selected files; `Some` only for file inputs
    pub files: Option<Vec<SelectedFile>>,
    pub record: ValidityRecord,
    pub memo: ConversionMemo,
}

impl InputState {
    /// Initial state for an input, seeded from its `value` attribute
    pub fn new(value: impl Into<String>, is_file: bool) -> Self {
        Self {
            value: value.into(),
            files: is_file.then(Vec::new),
            ..Default::default()
        }
    }
}

/// Map from input handle to its state
#[derive(Debug, Default)]
pub struct StateStore {
    inputs: HashMap<ElementId, InputState>,
}

impl StateStore {
    pub fn get(&self, input: ElementId) -> Option<&InputState> {
        self.inputs.get(&input)
    }

    pub fn get_mut(&mut self, input: ElementId) -> Option<&mut InputState> {
        self.inputs.get_mut(&input)
    }

    pub fn contains(&self, input: ElementId) -> bool {
        self.inputs.contains_key(&input)
    }

    /// Insert state for an input unless it is already tracked
    pub fn insert_if_absent(&mut self, input: ElementId, state: InputState) -> bool {
        if self.inputs.contains_key(&input) {
            return false;
        }
        self.inputs.insert(input, state);
        true
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// One-way dependencies: when a target changes, its dependents are re-checked
#[derive(Debug, Default)]
pub struct LinkGraph {
    dependents: HashMap<ElementId, Vec<ElementId>>,
}

impl LinkGraph {
    /// Register that `dependent` must be re-checked when `target` changes
    ///
    /// Returns false if the pair was already registered.
    pub fn register(&mut self, target: ElementId, dependent: ElementId) -> bool {
        let dependents = self.dependents.entry(target).or_default();
        if dependents.contains(&dependent) {
            return false;
        }
        dependents.push(dependent);
        true
    }

    /// Dependents of a target, in registration order
    pub fn dependents(&self, target: ElementId) -> &[ElementId] {
        self.dependents
            .get(&target)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total number of registered links
    pub fn len(&self) -> usize {
        self.dependents.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
