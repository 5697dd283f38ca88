use crate::hex::HexError;
use crate::types::{ContactId, GroupId};

/// Failures reported by a session backend.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The saved state was rejected by the backend's own deserialization.
    #[error("saved state rejected: {0}")]
    CorruptState(String),

    #[error("session creation failed: {0}")]
    Create(String),

    #[error("bootstrap failed: {0}")]
    Bootstrap(String),

    #[error("add contact failed: {0}")]
    AddContact(String),

    #[error("join group failed: {0}")]
    Join(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("group invite failed: {0}")]
    Invite(String),

    #[error("set profile failed: {0}")]
    SetInfo(String),
}

/// Top-level errors of the relay agent.
///
/// Every variant is fatal: the agent cannot do its job once one of these
/// is returned, so the binary logs it and exits non-zero.
#[derive(Debug, thiserror::Error)]
pub enum NgbError {
    #[error("invalid {what}")]
    Config {
        what: &'static str,
        #[source]
        source: HexError,
    },

    #[error("failed to create session")]
    CreateSession(#[source] TransportError),

    #[error("adding relay contact failed")]
    AddRelay(#[source] TransportError),

    #[error("bootstrapping from {host}:{port} failed")]
    Bootstrap {
        host: String,
        port: u16,
        #[source]
        source: TransportError,
    },

    #[error("failed to set {field}")]
    SetProfile {
        field: &'static str,
        #[source]
        source: TransportError,
    },

    #[error("failed to join group invited by {inviter}")]
    JoinGroup {
        inviter: ContactId,
        #[source]
        source: TransportError,
    },

    #[error("couldn't invite {contact} into {group}")]
    InviteContact {
        contact: ContactId,
        group: GroupId,
        #[source]
        source: TransportError,
    },

    #[error("failed to send message to {to}")]
    SendMessage {
        to: ContactId,
        #[source]
        source: TransportError,
    },

    #[error("failed to send message to {group}")]
    SendGroupMessage {
        group: GroupId,
        #[source]
        source: TransportError,
    },

    #[error("no session backend compiled in (rebuild with --features toxcore)")]
    NoBackend,
}
