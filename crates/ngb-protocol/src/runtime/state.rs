use crate::hex::encode_hex;
use crate::types::{
    Address, ContactId, GroupHandle, GroupId, PublicKey, INVITE_REQUEST, TRIGGER_DELIMITER,
    TRIGGER_TOKEN,
};

use super::effect::{BotEffect, IgnoreReason, Notice};
use super::transport::TransportEvent;

/// True when `payload` holds the delimiter immediately followed by the
/// trigger token, anywhere in the payload.
pub fn contains_trigger(payload: &[u8]) -> bool {
    let needle_len = TRIGGER_TOKEN.len() + 1;
    payload
        .windows(needle_len)
        .any(|w| w[0] == TRIGGER_DELIMITER && &w[1..] == TRIGGER_TOKEN)
}

/// Invitation automaton: pure logic, no I/O.
///
/// Tracks the relay contact and whether an invite request is owed to it.
/// Group membership is never stored here: callers pass the live group
/// list from the transport into [`handle`](Self::handle).
#[derive(Debug, Clone)]
pub struct BotState {
    relay_contact: ContactId,
    own_address: Address,
    pending_invite_request: bool,
}

impl BotState {
    pub fn new(relay_contact: ContactId, own_address: Address) -> Self {
        Self {
            relay_contact,
            own_address,
            pending_invite_request: false,
        }
    }

    pub fn relay_contact(&self) -> ContactId {
        self.relay_contact
    }

    pub fn invite_request_pending(&self) -> bool {
        self.pending_invite_request
    }

    /// React to one inbound event. `groups` is the current membership as
    /// reported by the transport.
    pub fn handle(&mut self, event: TransportEvent, groups: &[GroupId]) -> Vec<BotEffect> {
        match event {
            TransportEvent::StatusMessage { contact, .. } => self.handle_status_message(contact),
            TransportEvent::GroupInvite { from, handle } => {
                self.handle_group_invite(from, handle, groups)
            }
            TransportEvent::DirectMessage { from, .. } => self.handle_direct_message(from, groups),
            TransportEvent::GroupMessage { group, message, .. } => {
                self.handle_group_message(group, &message)
            }
            TransportEvent::ContactRequest { public_key, .. } => {
                self.handle_contact_request(public_key)
            }
        }
    }

    // ── Relay status: latch an invite request ───────────────────────────

    fn handle_status_message(&mut self, contact: ContactId) -> Vec<BotEffect> {
        if contact != self.relay_contact {
            return Vec::new();
        }
        self.pending_invite_request = true;
        vec![BotEffect::Notice(Notice::RelayReady)]
    }

    // ── Group invite: only from the relay, only while groupless ─────────

    fn handle_group_invite(
        &self,
        from: ContactId,
        handle: GroupHandle,
        groups: &[GroupId],
    ) -> Vec<BotEffect> {
        let reason = if !groups.is_empty() {
            IgnoreReason::AlreadyMember
        } else if from != self.relay_contact {
            IgnoreReason::Untrusted
        } else {
            return vec![BotEffect::JoinGroup {
                inviter: from,
                handle,
            }];
        };
        vec![BotEffect::Notice(Notice::InviteIgnored { from, reason })]
    }

    // ── Direct message: invite the sender into our group ────────────────

    fn handle_direct_message(&self, from: ContactId, groups: &[GroupId]) -> Vec<BotEffect> {
        match groups {
            [group] => vec![BotEffect::InviteToGroup {
                contact: from,
                group: *group,
            }],
            _ => vec![BotEffect::Notice(Notice::NoGroup {
                requester: from,
                groups: groups.len(),
            })],
        }
    }

    // ── Group message: answer the trigger with our address ──────────────

    fn handle_group_message(&self, group: GroupId, message: &[u8]) -> Vec<BotEffect> {
        if !contains_trigger(message) {
            return Vec::new();
        }
        vec![BotEffect::SendGroupMessage {
            group,
            payload: encode_hex(self.own_address.as_bytes()).into_bytes(),
        }]
    }

    // ── Contact request: open door ──────────────────────────────────────

    fn handle_contact_request(&self, public_key: PublicKey) -> Vec<BotEffect> {
        vec![BotEffect::AcceptContact { public_key }]
    }

    // ── Tick: deferred invite request ───────────────────────────────────

    /// Once per loop iteration: ask the relay for an invite if its status
    /// changed since the last tick.
    pub fn tick_invite_request(&mut self) -> Vec<BotEffect> {
        if !self.pending_invite_request {
            return Vec::new();
        }
        self.pending_invite_request = false;
        vec![BotEffect::SendMessage {
            to: self.relay_contact,
            payload: INVITE_REQUEST.to_vec(),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ADDRESS_SIZE;

    const RELAY: ContactId = ContactId(0);
    const STRANGER: ContactId = ContactId(7);

    fn own_address() -> Address {
        let mut bytes = [0u8; ADDRESS_SIZE];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(7);
        }
        Address::from_bytes(bytes)
    }

    fn default_state() -> BotState {
        BotState::new(RELAY, own_address())
    }

    fn invite(from: ContactId) -> TransportEvent {
        TransportEvent::GroupInvite {
            from,
            handle: GroupHandle(vec![1, 2, 3]),
        }
    }

    fn group_message(text: &[u8]) -> TransportEvent {
        TransportEvent::GroupMessage {
            group: GroupId(0),
            peer: 3,
            message: text.to_vec(),
        }
    }

    fn count_broadcasts(effects: &[BotEffect]) -> usize {
        effects
            .iter()
            .filter(|e| matches!(e, BotEffect::SendGroupMessage { .. }))
            .count()
    }

    // ── Trigger detection ────────────────────────────────────────────────

    #[test]
    fn trigger_matches_anywhere() {
        assert!(contains_trigger(b"%ngb"));
        assert!(contains_trigger(b"hello %ngb please"));
        assert!(contains_trigger(b"ends with %ngb"));
    }

    #[test]
    fn trigger_needs_delimiter() {
        assert!(!contains_trigger(b"ngb"));
        assert!(!contains_trigger(b"what is ngb?"));
        assert!(!contains_trigger(b"% ngb"));
        assert!(!contains_trigger(b"%ng"));
        assert!(!contains_trigger(b"%NGB"));
        assert!(!contains_trigger(b""));
    }

    #[test]
    fn trigger_checks_every_delimiter() {
        assert!(contains_trigger(b"100% sure: %ngb"));
        assert!(contains_trigger(b"%%ngb"));
    }

    // ── Status message ───────────────────────────────────────────────────

    #[test]
    fn relay_status_latches_invite_request() {
        let mut state = default_state();
        let effects = state.handle(
            TransportEvent::StatusMessage {
                contact: RELAY,
                message: b"ready".to_vec(),
            },
            &[],
        );
        assert!(state.invite_request_pending());
        assert_eq!(effects, vec![BotEffect::Notice(Notice::RelayReady)]);
    }

    #[test]
    fn other_status_is_ignored() {
        let mut state = default_state();
        let effects = state.handle(
            TransportEvent::StatusMessage {
                contact: STRANGER,
                message: Vec::new(),
            },
            &[],
        );
        assert!(effects.is_empty());
        assert!(!state.invite_request_pending());
    }

    #[test]
    fn tick_sends_invite_once() {
        let mut state = default_state();
        state.handle(
            TransportEvent::StatusMessage {
                contact: RELAY,
                message: Vec::new(),
            },
            &[],
        );

        let effects = state.tick_invite_request();
        assert_eq!(
            effects,
            vec![BotEffect::SendMessage {
                to: RELAY,
                payload: b"invite".to_vec()
            }]
        );
        assert!(!state.invite_request_pending());
        assert!(state.tick_invite_request().is_empty());
    }

    #[test]
    fn repeated_status_changes_collapse_into_one_request() {
        let mut state = default_state();
        for _ in 0..3 {
            state.handle(
                TransportEvent::StatusMessage {
                    contact: RELAY,
                    message: Vec::new(),
                },
                &[],
            );
        }
        assert_eq!(state.tick_invite_request().len(), 1);
        assert!(state.tick_invite_request().is_empty());
    }

    // ── Group invite ─────────────────────────────────────────────────────

    #[test]
    fn relay_invite_joins_when_groupless() {
        let mut state = default_state();
        let effects = state.handle(invite(RELAY), &[]);
        assert_eq!(
            effects,
            vec![BotEffect::JoinGroup {
                inviter: RELAY,
                handle: GroupHandle(vec![1, 2, 3]),
            }]
        );
    }

    #[test]
    fn untrusted_invites_never_join() {
        let mut state = default_state();
        for _ in 0..2 {
            let effects = state.handle(invite(STRANGER), &[]);
            assert!(
                !effects
                    .iter()
                    .any(|e| matches!(e, BotEffect::JoinGroup { .. })),
                "unexpected join: {effects:?}"
            );
            assert_eq!(
                effects,
                vec![BotEffect::Notice(Notice::InviteIgnored {
                    from: STRANGER,
                    reason: IgnoreReason::Untrusted,
                })]
            );
        }
    }

    #[test]
    fn relay_invite_ignored_when_already_member() {
        let mut state = default_state();
        let effects = state.handle(invite(RELAY), &[GroupId(0)]);
        assert_eq!(
            effects,
            vec![BotEffect::Notice(Notice::InviteIgnored {
                from: RELAY,
                reason: IgnoreReason::AlreadyMember,
            })]
        );
    }

    // ── Direct message ───────────────────────────────────────────────────

    #[test]
    fn direct_message_invites_sender() {
        let mut state = default_state();
        let effects = state.handle(
            TransportEvent::DirectMessage {
                from: STRANGER,
                message: b"anything at all".to_vec(),
            },
            &[GroupId(4)],
        );
        assert_eq!(
            effects,
            vec![BotEffect::InviteToGroup {
                contact: STRANGER,
                group: GroupId(4),
            }]
        );
    }

    #[test]
    fn direct_message_without_group_is_noticed() {
        let mut state = default_state();
        let effects = state.handle(
            TransportEvent::DirectMessage {
                from: STRANGER,
                message: b"invite".to_vec(),
            },
            &[],
        );
        assert_eq!(
            effects,
            vec![BotEffect::Notice(Notice::NoGroup {
                requester: STRANGER,
                groups: 0,
            })]
        );
    }

    #[test]
    fn direct_message_with_several_groups_is_noticed() {
        let mut state = default_state();
        let effects = state.handle(
            TransportEvent::DirectMessage {
                from: STRANGER,
                message: Vec::new(),
            },
            &[GroupId(0), GroupId(1)],
        );
        assert!(matches!(
            effects.as_slice(),
            [BotEffect::Notice(Notice::NoGroup { groups: 2, .. })]
        ));
    }

    // ── Group message ────────────────────────────────────────────────────

    #[test]
    fn trigger_broadcasts_own_address() {
        let mut state = default_state();
        let effects = state.handle(group_message(b"hey %ngb"), &[GroupId(0)]);
        assert_eq!(count_broadcasts(&effects), 1);

        let BotEffect::SendGroupMessage { group, payload } = &effects[0] else {
            panic!("expected SendGroupMessage, got {effects:?}");
        };
        assert_eq!(*group, GroupId(0));
        assert_eq!(payload.len(), 2 * ADDRESS_SIZE);
        assert_eq!(
            String::from_utf8(payload.clone()).unwrap(),
            own_address().to_string()
        );
    }

    #[test]
    fn several_triggers_broadcast_once() {
        let mut state = default_state();
        let effects = state.handle(group_message(b"%ngb %ngb %ngb"), &[GroupId(0)]);
        assert_eq!(count_broadcasts(&effects), 1);
    }

    #[test]
    fn bare_token_does_not_broadcast() {
        let mut state = default_state();
        let effects = state.handle(group_message(b"ngb ngb"), &[GroupId(0)]);
        assert!(effects.is_empty());
    }

    // ── Contact request ──────────────────────────────────────────────────

    #[test]
    fn contact_request_is_accepted() {
        let mut state = default_state();
        let key = own_address().public_key();
        let effects = state.handle(
            TransportEvent::ContactRequest {
                public_key: key,
                message: b"let me in".to_vec(),
            },
            &[],
        );
        assert_eq!(effects, vec![BotEffect::AcceptContact { public_key: key }]);
    }
}
