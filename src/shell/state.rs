use std::fmt;

/// Lifecycle position of an [`ApplicationShell`](super::ApplicationShell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Created,
    Configured,
    Running,
    Completed,
    Failed,
    Terminated,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Created => "created",
            State::Configured => "configured",
            State::Running => "running",
            State::Completed => "completed",
            State::Failed => "failed",
            State::Terminated => "terminated",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the `run` hook ended.
#[derive(Debug)]
pub enum Outcome {
    Completed,
    /// The hook returned an error or panicked.
    Failed(anyhow::Error),
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed)
    }

    pub fn error(&self) -> Option<&anyhow::Error> {
        match self {
            Outcome::Completed => None,
            Outcome::Failed(err) => Some(err),
        }
    }

    /// Converts into a `Result`, e.g. for returning from `main`.
    pub fn into_result(self) -> anyhow::Result<()> {
        match self {
            Outcome::Completed => Ok(()),
            Outcome::Failed(err) => Err(err),
        }
    }
}
