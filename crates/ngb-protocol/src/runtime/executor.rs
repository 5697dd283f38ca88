//! Effect executor, the only place that performs outbound actions.
//!
//! Takes a list of BotEffect and carries them out in order:
//! - JoinGroup / InviteToGroup / SendMessage / SendGroupMessage -> transport,
//!   any failure is fatal and stops execution
//! - AcceptContact -> transport, failure is logged
//! - Notice -> log line

use crate::error::NgbError;
use crate::hex::encode_hex;

use super::effect::{BotEffect, IgnoreReason, Notice};
use super::transport::Transport;

/// Execute effects against `transport`, stopping at the first fatal failure.
pub(crate) fn execute_effects<T: Transport>(
    effects: Vec<BotEffect>,
    transport: &mut T,
) -> Result<(), NgbError> {
    for effect in effects {
        match effect {
            BotEffect::JoinGroup { inviter, handle } => {
                tracing::info!("invited by relay {inviter}, joining group");
                let group = transport
                    .join_group(inviter, &handle)
                    .map_err(|source| NgbError::JoinGroup { inviter, source })?;
                tracing::info!("joined {group}");
            }
            BotEffect::InviteToGroup { contact, group } => {
                tracing::info!("inviting {contact} into {group}");
                transport
                    .invite_to_group(contact, group)
                    .map_err(|source| NgbError::InviteContact {
                        contact,
                        group,
                        source,
                    })?;
            }
            BotEffect::SendMessage { to, payload } => {
                tracing::info!("sending {:?} to {to}", String::from_utf8_lossy(&payload));
                transport
                    .send_message(to, &payload)
                    .map_err(|source| NgbError::SendMessage { to, source })?;
            }
            BotEffect::SendGroupMessage { group, payload } => {
                tracing::info!("sending address to {group}");
                transport
                    .send_group_message(group, &payload)
                    .map_err(|source| NgbError::SendGroupMessage { group, source })?;
            }
            BotEffect::AcceptContact { public_key } => {
                tracing::info!("contact request from {}", encode_hex(public_key.as_bytes()));
                match transport.accept_contact_request(&public_key) {
                    Ok(contact) => tracing::debug!("accepted as {contact}"),
                    Err(e) => tracing::warn!("accepting contact request failed: {e}"),
                }
            }
            BotEffect::Notice(notice) => log_notice(&notice),
        }
    }
    Ok(())
}

fn log_notice(notice: &Notice) {
    match notice {
        Notice::RelayReady => tracing::info!("relay status message changed"),
        Notice::InviteIgnored {
            from,
            reason: IgnoreReason::AlreadyMember,
        } => tracing::debug!("ignoring invite from {from}: already in a group"),
        Notice::InviteIgnored {
            from,
            reason: IgnoreReason::Untrusted,
        } => tracing::debug!("ignoring invite from untrusted {from}"),
        Notice::NoGroup { requester, groups } => {
            tracing::warn!("group not found for {requester} ({groups} groups)")
        }
    }
}
