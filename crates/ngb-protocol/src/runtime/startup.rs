//! Bring-up sequence: restore or create the session, make sure the relay
//! is a contact, bootstrap, publish the profile.

use crate::config::BotConfig;
use crate::error::{NgbError, TransportError};
use crate::store::StateStore;
use crate::types::ContactId;

use super::r#loop::BotRuntime;
use super::state::BotState;
use super::transport::{SessionFactory, Transport};

/// Open the session and return a runtime ready to loop.
///
/// The saved state is used when it loads; otherwise a fresh identity is
/// created and the relay is sent a contact request. Every failure past
/// that point is fatal.
pub fn start<F: SessionFactory>(
    factory: &F,
    config: &BotConfig,
) -> Result<BotRuntime<F::Session>, NgbError> {
    let store = StateStore::new(&config.state_path);
    let (mut session, relay) = open_session(factory, &store, config)?;

    session
        .bootstrap(&config.bootstrap)
        .map_err(|source| NgbError::Bootstrap {
            host: config.bootstrap.host.clone(),
            port: config.bootstrap.port,
            source,
        })?;
    tracing::info!(
        "bootstrapping from {}:{}",
        config.bootstrap.host,
        config.bootstrap.port
    );

    let address = session.address();
    tracing::info!("{address}");

    session
        .set_nickname(&config.nickname)
        .map_err(|source| NgbError::SetProfile {
            field: "nickname",
            source,
        })?;
    session
        .set_status_message(&config.status_message)
        .map_err(|source| NgbError::SetProfile {
            field: "status message",
            source,
        })?;

    Ok(BotRuntime::new(
        session,
        BotState::new(relay, address),
        store,
        config.save_interval,
    ))
}

fn open_session<F: SessionFactory>(
    factory: &F,
    store: &StateStore,
    config: &BotConfig,
) -> Result<(F::Session, ContactId), NgbError> {
    if let Some(mut session) = restore_session(factory, store) {
        tracing::info!("session loaded from {}", store.path().display());
        let relay = match session.contact_by_public_key(&config.relay_address.public_key()) {
            Some(relay) => relay,
            None => {
                tracing::warn!("saved state has no relay contact, adding it again");
                add_relay(&mut session, config)?
            }
        };
        return Ok((session, relay));
    }

    let mut session = factory.create(None).map_err(NgbError::CreateSession)?;
    tracing::info!("session created");
    let relay = add_relay(&mut session, config)?;
    Ok((session, relay))
}

/// Load the saved state. Any problem means "start fresh".
fn restore_session<F: SessionFactory>(factory: &F, store: &StateStore) -> Option<F::Session> {
    let blob = match store.load() {
        Ok(Some(blob)) => blob,
        Ok(None) => {
            tracing::warn!("can't open {}, starting fresh", store.path().display());
            return None;
        }
        Err(e) => {
            tracing::warn!("{}: {e}, starting fresh", store.path().display());
            return None;
        }
    };

    match factory.create(Some(&blob)) {
        Ok(session) => Some(session),
        Err(TransportError::CorruptState(reason)) => {
            tracing::warn!("{} corrupted ({reason}), starting fresh", store.path().display());
            None
        }
        Err(e) => {
            tracing::warn!("loading {} failed: {e}", store.path().display());
            None
        }
    }
}

fn add_relay<T: Transport>(session: &mut T, config: &BotConfig) -> Result<ContactId, NgbError> {
    let relay = session
        .add_contact(&config.relay_address, config.relay_greeting.as_bytes())
        .map_err(NgbError::AddRelay)?;
    tracing::info!("relay added as {relay}");
    Ok(relay)
}
