//! Paths: addressable positions in the process/step/task hierarchy
//!
//! A [`Path`] names the exact task an inbound answer is meant for. It is
//! embedded in every outbound command and stays stable across
//! serialize/restore cycles, so a reply can be routed back regardless of
//! how much time passed in between.

use crate::error::EngineError;
use crate::ids::{ProcessId, TaskName};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ── Step Locator ─────────────────────────────────────────────────────

/// Which step of a process a path points into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepLocator {
    /// A step of the normal sequence, by declared position
    Index(usize),
    /// The designated fail step
    Fail,
    /// The optional finally step
    Finally,
}

impl std::fmt::Display for StepLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepLocator::Index(i) => write!(f, "{i}"),
            StepLocator::Fail => write!(f, "fail"),
            StepLocator::Finally => write!(f, "finally"),
        }
    }
}

impl FromStr for StepLocator {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail" => Ok(StepLocator::Fail),
            "finally" => Ok(StepLocator::Finally),
            index => index
                .parse::<usize>()
                .map(StepLocator::Index)
                .map_err(|_| EngineError::InvalidPath(s.to_string())),
        }
    }
}

// ── Path ─────────────────────────────────────────────────────────────

/// Address of one task: process id, step locator, task name.
///
/// A path resolves to exactly one live task or fails explicitly.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path {
    pub process: ProcessId,
    pub step: StepLocator,
    pub task: TaskName,
}

impl Path {
    pub fn new(process: ProcessId, step: StepLocator, task: TaskName) -> Self {
        Self {
            process,
            step,
            task,
        }
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.process, self.step, self.task)
    }
}

impl FromStr for Path {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '/');
        let (Some(process), Some(step), Some(task)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(EngineError::InvalidPath(s.to_string()));
        };
        if process.is_empty() || task.is_empty() {
            return Err(EngineError::InvalidPath(s.to_string()));
        }
        Ok(Path {
            process: ProcessId::new(process),
            step: step.parse()?,
            task: TaskName::new(task),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_roundtrip() {
        let path = Path::new(
            ProcessId::new("proc-1"),
            StepLocator::Index(2),
            TaskName::new("Qa"),
        );
        assert_eq!(path.to_string(), "proc-1/2/Qa");
        assert_eq!("proc-1/2/Qa".parse::<Path>().unwrap(), path);

        let fail = Path::new(
            ProcessId::new("proc-1"),
            StepLocator::Fail,
            TaskName::new("Fail"),
        );
        assert_eq!(fail.to_string(), "proc-1/fail/Fail");
        assert_eq!("proc-1/fail/Fail".parse::<Path>().unwrap(), fail);
    }

    #[test]
    fn parse_rejects_malformed_paths() {
        assert!("".parse::<Path>().is_err());
        assert!("proc-1".parse::<Path>().is_err());
        assert!("proc-1/2".parse::<Path>().is_err());
        assert!("proc-1/nonsense/Task".parse::<Path>().is_err());
        assert!("/0/Task".parse::<Path>().is_err());
        assert!("proc-1/0/".parse::<Path>().is_err());
    }

    #[test]
    fn task_names_may_contain_slashes_free_text() {
        let path = "proc-1/finally/Wrap Up".parse::<Path>().unwrap();
        assert_eq!(path.step, StepLocator::Finally);
        assert_eq!(path.task, TaskName::new("Wrap Up"));
    }
}
