//! Progress events emitted during a research run

use crate::error::{FailureKind, RunError};
use std::sync::Mutex;
use tracing::debug;

/// One observable step of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Percentage milestone with its status label
    Milestone { percent: u8, label: String },
    /// Label-only status update; the percentage is unchanged
    Status { label: String },
    /// Terminal failure signal
    Failed { kind: FailureKind, message: String },
}

impl ProgressEvent {
    pub fn percent(&self) -> Option<u8> {
        match self {
            Self::Milestone { percent, .. } => Some(*percent),
            _ => None,
        }
    }

    /// True for the final event of a run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Milestone { percent: 100, .. } | Self::Failed { .. })
    }
}

/// Receiver of progress events
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        self(event);
    }
}

/// Sink that drops every event
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&self, _event: ProgressEvent) {}
}

#[derive(Default)]
struct TrackerState {
    percent: u8,
    finished: bool,
}

/// Guards the event stream of one run
///
/// Percentages never go backwards and nothing is emitted after the
/// terminal event.
pub struct ProgressTracker<'a> {
    sink: &'a dyn ProgressSink,
    state: Mutex<TrackerState>,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            sink,
            state: Mutex::new(TrackerState::default()),
        }
    }

    fn send(&self, event: ProgressEvent) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if state.finished {
            debug!(?event, "Dropping progress event after terminal event");
            return;
        }
        let event = match event {
            ProgressEvent::Milestone { percent, label } => {
                let percent = percent.clamp(state.percent, 100);
                state.percent = percent;
                ProgressEvent::Milestone { percent, label }
            }
            other => other,
        };
        state.finished = event.is_terminal();
        drop(state);
        self.sink.emit(event);
    }

    pub fn milestone(&self, percent: u8, label: impl Into<String>) {
        self.send(ProgressEvent::Milestone {
            percent,
            label: label.into(),
        });
    }

    pub fn status(&self, label: impl Into<String>) {
        self.send(ProgressEvent::Status { label: label.into() });
    }

    /// 100% with the status label cleared
    pub fn complete(&self) {
        self.milestone(100, "");
    }

    pub fn fail(&self, err: &RunError) {
        self.send(ProgressEvent::Failed {
            kind: err.kind,
            message: err.message.clone(),
        });
    }

    pub fn is_finished(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .finished
    }
}
