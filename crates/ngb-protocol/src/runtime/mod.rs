/// Relay agent runtime: the automaton, its effect executor and the main loop.
///
/// `state` decides, `executor` acts, `loop` drives both at the pace the
/// transport asks for, and `startup` brings a session up before the loop.
mod effect;
mod executor;
mod r#loop;
mod startup;
mod state;
mod transport;

pub use effect::{BotEffect, IgnoreReason, Notice};
pub use r#loop::BotRuntime;
pub use startup::start;
pub use state::{contains_trigger, BotState};
pub use transport::{SessionFactory, Transport, TransportEvent};

#[cfg(any(test, feature = "test-utils"))]
pub use transport::mock;
