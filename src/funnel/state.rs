//! Step controller and display state.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use crate::analytics::{AnalyticsSink, props};

use super::submission::SubmissionSuccess;

/// What the funnel is showing, layered over the step index.
///
/// `Submitted` carries the redirect link; nothing else holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DisplayState {
    Step { step: usize },
    Submitting,
    Submitted(SubmissionSuccess),
}

impl DisplayState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Submitted(_))
    }
}

impl std::fmt::Display for DisplayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Step { step } => write!(f, "step {step}"),
            Self::Submitting => write!(f, "submitting"),
            Self::Submitted(_) => write!(f, "submitted"),
        }
    }
}

/// Holds the current step in `[0, total_steps]`.
///
/// Step 0 is the landing screen, `total_steps` the last input. Every
/// transition, including one that is clamped, emits exactly one event.
pub struct StepController {
    step: usize,
    total_steps: usize,
    analytics: Arc<dyn AnalyticsSink>,
}

impl StepController {
    pub fn new(total_steps: usize, analytics: Arc<dyn AnalyticsSink>) -> Self {
        Self {
            step: 0,
            total_steps,
            analytics,
        }
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn is_last(&self) -> bool {
        self.step == self.total_steps
    }

    /// Move forward one step, capped at `total_steps`.
    pub fn advance(&mut self) -> usize {
        let from = self.step;
        self.step = (self.step + 1).min(self.total_steps);
        self.analytics.track(
            "Step Viewed",
            props(json!({
                "from_step": from,
                "to_step": self.step,
                "step": self.step,
                "total_steps": self.total_steps,
            })),
        );
        self.step
    }

    /// Move back one step, floored at 0.
    pub fn retreat(&mut self) -> usize {
        let from = self.step;
        self.step = self.step.saturating_sub(1);
        self.analytics.button_click(
            "Back Button",
            props(json!({
                "from_step": from,
                "to_step": self.step,
            })),
        );
        self.step
    }

    /// Back to the landing screen without emitting anything. Used when a new
    /// session starts.
    pub fn reset(&mut self) {
        self.step = 0;
    }
}
