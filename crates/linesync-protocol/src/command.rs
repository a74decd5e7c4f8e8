//! Protocol command types

use linesync_core::Patch;

/// A parsed command
#[derive(Debug, Clone)]
pub struct Command {
    pub kind: CommandKind,
    pub document_id: Option<String>,
}

/// All supported commands
#[derive(Debug, Clone)]
pub enum CommandKind {
    /// AUTH <password>
    Auth { password: String },

    /// CREATE <id>
    Create,

    /// PATCH <id> <patch-json>
    Patch { patch: Patch },

    /// CONTENT <id>
    Content,

    /// DIFF <id> <revision>
    Diff { revision: usize },

    /// KEYS [pattern]
    Keys { pattern: Option<String> },

    /// INFO
    Info,

    /// PING
    Ping,

    /// QUIT
    Quit,
}

impl Command {
    pub fn auth(password: String) -> Self {
        Command {
            kind: CommandKind::Auth { password },
            document_id: None,
        }
    }

    pub fn create(id: String) -> Self {
        Command {
            kind: CommandKind::Create,
            document_id: Some(id),
        }
    }

    pub fn patch(id: String, patch: Patch) -> Self {
        Command {
            kind: CommandKind::Patch { patch },
            document_id: Some(id),
        }
    }

    pub fn content(id: String) -> Self {
        Command {
            kind: CommandKind::Content,
            document_id: Some(id),
        }
    }

    pub fn diff(id: String, revision: usize) -> Self {
        Command {
            kind: CommandKind::Diff { revision },
            document_id: Some(id),
        }
    }

    pub fn keys(pattern: Option<String>) -> Self {
        Command {
            kind: CommandKind::Keys { pattern },
            document_id: None,
        }
    }

    pub fn info() -> Self {
        Command {
            kind: CommandKind::Info,
            document_id: None,
        }
    }

    pub fn ping() -> Self {
        Command {
            kind: CommandKind::Ping,
            document_id: None,
        }
    }

    pub fn quit() -> Self {
        Command {
            kind: CommandKind::Quit,
            document_id: None,
        }
    }
}
