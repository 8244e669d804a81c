//! Outbound commands sent across the collaborator boundary

use crate::answer::CallbackTicket;
use crate::ids::{CallbackId, JobId, QueueName, StorageKey};
use crate::path::Path;
use crate::ticket::Ticket;
use serde::{Deserialize, Serialize};

/// Command embedded in work sent to a remote worker or another service.
///
/// Opaque outside the engine except for `ticket` and `callback`, which
/// must be echoed back verbatim in the answer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessCommand {
    pub target: Path,
    pub callback: CallbackId,
    pub ticket: Ticket,
    pub response_queue: QueueName,
}

impl ProcessCommand {
    pub fn new(target: Path, callback_ticket: CallbackTicket, response_queue: QueueName) -> Self {
        Self {
            target,
            callback: callback_ticket.callback,
            ticket: callback_ticket.ticket,
            response_queue,
        }
    }
}

/// Descriptor handed to the pull-request collaborator.
///
/// The embedded command routes the dispatch report back to the task that
/// requested the pull request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PullRequestDescriptor {
    /// Session of the human who authorized the dispatch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    /// Where the content to publish is stored
    pub storage_key: StorageKey,
    /// Directory the content replaces in the target repository
    pub target_directory: String,
    pub title: String,
    pub body: String,
    pub commit_message: String,
    pub command: ProcessCommand,
}

/// Handle returned when a worker job was enqueued.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: JobId,
    pub job_type: String,
}
