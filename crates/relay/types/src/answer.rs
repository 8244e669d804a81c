//! Expected answers and the inbound answer message
//!
//! An [`ExpectedAnswer`] is the record of which ticket/callback a task is
//! currently suspended on. A task expects at most one answer at any time;
//! setting a new one overwrites, and thereby invalidates, the previous
//! one. Continuation args are captured at suspension, replayed to the
//! callback on resumption, and never exposed to the external answerer.

use crate::ids::{CallbackId, InteractionId};
use crate::path::Path;
use crate::ticket::Ticket;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Expected Answer ──────────────────────────────────────────────────

/// What a suspended task is waiting for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExpectedAnswer {
    /// The callback an inbound answer must name
    pub callback: CallbackId,
    /// The single-use ticket the answer must carry
    pub ticket: Ticket,
    /// The human interaction requested, if the answer comes from a form
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction: Option<InteractionId>,
    /// Opaque data replayed to the callback on resumption
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub continuation: Vec<Value>,
}

impl ExpectedAnswer {
    /// The `(callback, ticket)` pair safe to hand to the outside world.
    pub fn callback_ticket(&self) -> CallbackTicket {
        CallbackTicket {
            callback: self.callback.clone(),
            ticket: self.ticket.clone(),
        }
    }
}

/// The pair a caller embeds in an outbound command so the answerer can
/// echo it back verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackTicket {
    pub callback: CallbackId,
    pub ticket: Ticket,
}

// ── Inbound Answer ───────────────────────────────────────────────────

/// Who is answering: a human form submitter or a worker identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub handle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

impl Requester {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            session: None,
        }
    }

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }
}

impl std::fmt::Display for Requester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.handle)
    }
}

/// Payload of an inbound answer: a structured document (human form
/// values, worker report) or a typed binary message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    Document(Value),
    Binary { kind: String, data: Vec<u8> },
}

impl Payload {
    pub fn document(&self) -> Option<&Value> {
        match self {
            Payload::Document(value) => Some(value),
            Payload::Binary { .. } => None,
        }
    }
}

/// An inbound message answering a suspended task.
///
/// Rejected outright if `callback`/`ticket` do not match the addressed
/// task's current expected answer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnswerMessage {
    /// Where the answer is going, echoed from the outbound command
    pub target: Path,
    pub callback: CallbackId,
    pub ticket: Ticket,
    pub requester: Requester,
    pub payload: Payload,
}

impl AnswerMessage {
    pub fn new(
        target: Path,
        callback: CallbackId,
        ticket: Ticket,
        requester: Requester,
        payload: Payload,
    ) -> Self {
        Self {
            target,
            callback,
            ticket,
            requester,
            payload,
        }
    }
}
