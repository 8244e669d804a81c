//! The shared resolution vocabulary
//!
//! Tasks carry an [`Outcome`] directly; steps and the process aggregate
//! their children's outcomes into the same vocabulary.

use serde::{Deserialize, Serialize};

/// Resolution state of a task, a step, or the whole process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// Not yet activated
    #[default]
    Pending,
    /// Activation logic is running
    Active,
    /// Suspended until a matching inbound answer arrives
    AwaitingAnswer,
    /// Resolved successfully; terminal
    Ok,
    /// Resolved with a failure; terminal
    Failed,
}

impl Outcome {
    /// Terminal outcomes are immutable once set.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Outcome::Ok | Outcome::Failed)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Outcome::Pending => "PENDING",
            Outcome::Active => "ACTIVE",
            Outcome::AwaitingAnswer => "AWAITING_ANSWER",
            Outcome::Ok => "OK",
            Outcome::Failed => "FAILED",
        };
        write!(f, "{label}")
    }
}
