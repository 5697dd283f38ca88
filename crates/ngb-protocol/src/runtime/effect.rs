use crate::types::{ContactId, GroupHandle, GroupId, PublicKey};

/// Intent produced by the pure logic of [`BotState`](super::BotState).
///
/// Every `handle*` / `tick_*` method returns `Vec<BotEffect>`; the main
/// loop then carries them out against the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotEffect {
    /// Join the group behind an invite from the relay.
    JoinGroup {
        inviter: ContactId,
        handle: GroupHandle,
    },

    /// Invite a contact into our group.
    InviteToGroup { contact: ContactId, group: GroupId },

    /// Send a direct message.
    SendMessage { to: ContactId, payload: Vec<u8> },

    /// Post a message in a group.
    SendGroupMessage { group: GroupId, payload: Vec<u8> },

    /// Accept an inbound contact request.
    AcceptContact { public_key: PublicKey },

    /// Report a decision that needs no transport action.
    Notice(Notice),
}

/// Decisions surfaced to the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The relay changed its status message; an invite request is queued.
    RelayReady,
    /// A group invite was ignored.
    InviteIgnored { from: ContactId, reason: IgnoreReason },
    /// A contact asked for an invite but we are not in exactly one group.
    NoGroup { requester: ContactId, groups: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// We already belong to a group.
    AlreadyMember,
    /// Only the relay's invites are honored.
    Untrusted,
}
