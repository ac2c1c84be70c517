//! Generation session: the accumulated document and its status.
//!
//! A session is owned by the caller and mutated only through [`Session::apply`].
//! Each [`Session::start`] mints a fresh [`SessionId`]; fragments tagged with
//! an older id are dropped, so a restarted generation never sees leftovers
//! from the previous stream.

use std::fmt;

use tracing::debug;
use uuid::Uuid;

use crate::stream::Fragment;

/// Identifies one generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Idle,
    Generating,
    Completed,
    Error,
}

impl Status {
    /// Localized status label.
    pub fn label(self) -> &'static str {
        match self {
            Status::Idle => "就绪",
            Status::Generating => "生成中",
            Status::Completed => "已完成",
            Status::Error => "错误",
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(self, Status::Completed | Status::Error)
    }
}

/// Outcome of applying one fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The fragment changed the session (content and/or status).
    Accepted,
    /// Stale id or session no longer generating; nothing changed.
    Ignored,
}

/// State for one generation request, from submit to completion or error.
#[derive(Debug, Default)]
pub struct Session {
    id: Option<SessionId>,
    status: Status,
    buffer: String,
    last_error: Option<String>,
    streaming: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins a new generation, discarding any previous buffer and error.
    pub fn start(&mut self) -> SessionId {
        let id = SessionId::new();
        debug!(session = %id, "session started");
        self.id = Some(id);
        self.status = Status::Generating;
        self.buffer.clear();
        self.last_error = None;
        self.streaming = true;
        id
    }

    /// Returns the session to `Idle` with an empty buffer.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Applies one fragment from the stream tagged with `id`.
    ///
    /// An error wins over content and completion. Content is appended
    /// verbatim before a completion on the same fragment takes effect.
    pub fn apply(&mut self, id: SessionId, fragment: Fragment) -> Applied {
        if self.id != Some(id) || self.status != Status::Generating {
            debug!(session = %id, "ignoring fragment for inactive session");
            return Applied::Ignored;
        }

        if let Some(message) = fragment.error_message() {
            self.status = Status::Error;
            self.streaming = false;
            self.last_error = Some(message.to_string());
            return Applied::Accepted;
        }

        if !fragment.content.is_empty() {
            self.buffer.push_str(&fragment.content);
        }

        if fragment.is_complete {
            self.status = Status::Completed;
            self.streaming = false;
        }

        Applied::Accepted
    }

    pub fn id(&self) -> Option<SessionId> {
        self.id
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }
}
