//! Deferred image work: dimension inspection and format conversion
//!
//! Tasks are queued by the validator when an evaluation of a file input passes
//! every synchronous rule. They run off the interaction path and report back as
//! [`Message`]s, which the validator feeds through its single dispatch entry
//! point.

pub mod convert;
pub mod inspect;

pub use convert::{ConversionTarget, SizingHints};
pub use inspect::{aspect_ratio, InspectionCheck, InspectionRule};

use crate::document::ElementId;
use crate::file::SelectedFile;
use crate::validator::Message;
use rayon::prelude::*;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Target raster {width}x{height} is empty")]
    EmptyRaster { width: u32, height: u32 },
}

/// Handle to a queued task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// The work a task performs on one file
#[derive(Debug, Clone, PartialEq)]
pub enum TaskWork {
    /// Decode the header and run every declared inspection check
    Inspect {
        file: SelectedFile,
        checks: Vec<InspectionCheck>,
    },
    /// Decode, resize and re-encode
    Convert {
        file: SelectedFile,
        target: ConversionTarget,
        sizing: SizingHints,
        jpeg_quality: u8,
    },
}

impl TaskWork {
    /// The file this task reads
    pub fn file(&self) -> &SelectedFile {
        match self {
            TaskWork::Inspect { file, .. } | TaskWork::Convert { file, .. } => file,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            TaskWork::Inspect { .. } => "inspect",
            TaskWork::Convert { target, .. } => target.rule_id(),
        }
    }
}

/// A queued task bound to the input that scheduled it
#[derive(Debug, Clone)]
pub struct PendingTask {
    pub id: TaskId,
    pub input: ElementId,
    pub work: TaskWork,
}

impl PendingTask {
    /// Perform the work; `None` when nothing needs to be reported
    ///
    /// Decode and encode failures are logged and produce no message.
    pub fn run(&self) -> Option<Message> {
        match &self.work {
            TaskWork::Inspect { file, checks } => {
                let (width, height) = match inspect::dimensions(file.bytes()) {
                    Ok(dimensions) => dimensions,
                    Err(e) => {
                        log::debug!("{}: cannot read {}: {e}", self.id, file.name());
                        return None;
                    }
                };

                let violated = checks.iter().find(|check| check.is_violated(width, height))?;
                log::trace!(
                    "{}: {} is {width}x{height}, violates {}",
                    self.id,
                    file.name(),
                    violated.rule.id()
                );

                Some(Message::ForcedFeedback {
                    input: self.input,
                    feedback: violated.message.clone(),
                })
            }
            TaskWork::Convert {
                file,
                target,
                sizing,
                jpeg_quality,
            } => match convert::convert(file, *target, sizing, *jpeg_quality) {
                Ok(replacement) => Some(Message::FileConverted {
                    input: self.input,
                    original: file.name().to_string(),
                    replacement,
                }),
                Err(e) => {
                    log::debug!("{}: cannot convert {}: {e}", self.id, file.name());
                    None
                }
            },
        }
    }
}

/// FIFO of tasks awaiting execution
#[derive(Debug, Default)]
pub struct TaskQueue {
    next_id: u64,
    pending: Vec<PendingTask>,
}

impl TaskQueue {
    /// Queue work for an input
    ///
    /// An inspection identical to one already pending for the same input is
    /// dropped, and `None` is returned.
    pub fn enqueue(&mut self, input: ElementId, work: TaskWork) -> Option<TaskId> {
        if matches!(work, TaskWork::Inspect { .. })
            && self
                .pending
                .iter()
                .any(|task| task.input == input && task.work == work)
        {
            log::trace!("{input}: identical inspection already pending");
            return None;
        }

        let id = TaskId(self.next_id);
        self.next_id += 1;
        log::trace!("{id}: queued {} of {} for {input}", work.label(), work.file().name());
        self.pending.push(PendingTask { id, input, work });
        Some(id)
    }

    /// Remove one task from the queue
    pub fn take(&mut self, id: TaskId) -> Option<PendingTask> {
        let index = self.pending.iter().position(|task| task.id == id)?;
        Some(self.pending.remove(index))
    }

    /// Remove every queued task, oldest first
    pub fn drain(&mut self) -> Vec<PendingTask> {
        std::mem::take(&mut self.pending)
    }

    /// Ids of queued tasks, oldest first
    pub fn ids(&self) -> Vec<TaskId> {
        self.pending.iter().map(|task| task.id).collect()
    }

    /// Number of queued tasks scheduled by an input
    pub fn pending_for(&self, input: ElementId) -> usize {
        self.pending.iter().filter(|task| task.input == input).count()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Run a batch of tasks, on the rayon pool when `parallel` is set
///
/// Messages come back in task order regardless of which worker finished first.
pub fn run_batch(tasks: &[PendingTask], parallel: bool) -> Vec<Message> {
    if parallel {
        tasks.par_iter().filter_map(PendingTask::run).collect()
    } else {
        tasks.iter().filter_map(PendingTask::run).collect()
    }
}
