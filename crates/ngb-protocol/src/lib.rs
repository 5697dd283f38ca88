//! NGB relay agent core.
//!
//! A bot that sits in one group conversation on a peer-to-peer messaging
//! network: it asks its upstream relay for a group invite, invites anyone
//! who messages it, accepts every contact request, and posts its own
//! address when a group message contains `%ngb`.
//!
//! The messaging session is reached through the [`Transport`] trait;
//! session state is persisted as an opaque blob by [`StateStore`].

pub mod config;
pub mod error;
pub mod hex;
pub mod runtime;
pub mod store;
pub mod types;

#[cfg(feature = "toxcore")]
pub mod toxcore;

#[cfg(any(test, feature = "test-utils"))]
pub use runtime::mock;

pub use config::BotConfig;
pub use error::{NgbError, TransportError};
pub use hex::{decode_hex, decode_hex_exact, encode_hex, HexError};
pub use runtime::{
    contains_trigger, start, BotEffect, BotRuntime, BotState, IgnoreReason, Notice,
    SessionFactory, Transport, TransportEvent,
};
pub use store::{SaveSchedule, StateStore, StoreError};
pub use types::{
    Address, BootstrapNode, ContactId, GroupHandle, GroupId, PublicKey, ADDRESS_SIZE,
    PUBLIC_KEY_SIZE,
};
