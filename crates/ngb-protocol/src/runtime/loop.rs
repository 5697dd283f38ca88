//! The relay agent main loop.
//!
//! Owns the session, the automaton and the state store. One iteration
//! polls the transport, dispatches each event, runs the deferred invite
//! request, saves when due, and reports how long to sleep.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::error::NgbError;
use crate::store::{SaveSchedule, StateStore};

use super::executor::execute_effects;
use super::state::BotState;
use super::transport::Transport;

/// A started relay agent, ready to [`run`](BotRuntime::run).
pub struct BotRuntime<T: Transport> {
    transport: T,
    state: BotState,
    store: StateStore,
    schedule: SaveSchedule,
}

impl<T: Transport> BotRuntime<T> {
    pub fn new(transport: T, state: BotState, store: StateStore, save_interval: Duration) -> Self {
        Self {
            transport,
            state,
            store,
            schedule: SaveSchedule::new(save_interval),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn state(&self) -> &BotState {
        &self.state
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Run one loop iteration and return the transport's recommended
    /// delay before the next one.
    ///
    /// Effects of each event are executed before the next event is
    /// handled, so a join triggered by one invite is visible to the group
    /// check of any later invite in the same batch.
    pub fn step(&mut self, now: Instant) -> Result<Duration, NgbError> {
        for event in self.transport.poll() {
            let groups = self.transport.groups();
            let effects = self.state.handle(event, &groups);
            execute_effects(effects, &mut self.transport)?;
        }

        let effects = self.state.tick_invite_request();
        execute_effects(effects, &mut self.transport)?;

        if self.schedule.is_due(now) {
            self.save();
            self.schedule.mark_attempted(now);
        }

        Ok(self.transport.poll_interval())
    }

    /// Snapshot the session to disk. Failures are logged, never fatal.
    pub fn save(&self) -> bool {
        tracing::info!("saving");
        match self.store.save(&self.transport.save_state()) {
            Ok(true) => true,
            Ok(false) => {
                tracing::debug!("session state empty, nothing saved");
                false
            }
            Err(e) => {
                tracing::warn!("save failed: {e}");
                false
            }
        }
    }

    /// Loop until `shutdown` resolves or a fatal error occurs.
    ///
    /// On shutdown a last save is attempted before returning.
    pub async fn run<F>(mut self, shutdown: F) -> Result<(), NgbError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            let interval = self.step(tokio::time::Instant::now().into_std())?;
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutting down");
                    self.save();
                    return Ok(());
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::transport::mock::{MockAction, MockOp, MockTransport};
    use crate::runtime::transport::TransportEvent;
    use crate::types::{Address, ContactId, GroupHandle, GroupId, ADDRESS_SIZE};

    const RELAY: ContactId = ContactId(0);

    struct Fixture {
        _dir: tempfile::TempDir,
        mock: MockTransport,
        runtime: BotRuntime<MockTransport>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let address = Address::from_bytes([0x42; ADDRESS_SIZE]);
        let mock = MockTransport::new(address);
        let store = StateStore::new(dir.path().join("groupbot.data"));
        let runtime = BotRuntime::new(
            mock.clone(),
            BotState::new(RELAY, address),
            store,
            Duration::from_secs(10),
        );
        Fixture {
            _dir: dir,
            mock,
            runtime,
        }
    }

    fn sent_messages(mock: &MockTransport) -> Vec<MockAction> {
        mock.actions()
            .into_iter()
            .filter(|a| matches!(a, MockAction::SendMessage { .. }))
            .collect()
    }

    #[test]
    fn relay_status_then_one_iteration_sends_one_invite_request() {
        let mut f = fixture();
        let now = Instant::now();
        f.mock.push_event(TransportEvent::StatusMessage {
            contact: RELAY,
            message: b"ready".to_vec(),
        });

        f.runtime.step(now).unwrap();
        assert_eq!(
            sent_messages(&f.mock),
            vec![MockAction::SendMessage {
                to: RELAY,
                message: b"invite".to_vec(),
            }]
        );
        assert!(!f.runtime.state().invite_request_pending());

        f.runtime.step(now).unwrap();
        assert_eq!(sent_messages(&f.mock).len(), 1);
    }

    #[test]
    fn second_invite_in_same_batch_sees_the_join() {
        let mut f = fixture();
        for cookie in [1u8, 2] {
            f.mock.push_event(TransportEvent::GroupInvite {
                from: RELAY,
                handle: GroupHandle(vec![cookie]),
            });
        }

        f.runtime.step(Instant::now()).unwrap();
        let joins = f
            .mock
            .actions()
            .into_iter()
            .filter(|a| matches!(a, MockAction::JoinGroup { .. }))
            .count();
        assert_eq!(joins, 1);
        assert_eq!(f.mock.groups(), vec![GroupId(0)]);
    }

    #[test]
    fn direct_message_after_join_invites_sender() {
        let mut f = fixture();
        f.mock.push_event(TransportEvent::GroupInvite {
            from: RELAY,
            handle: GroupHandle(vec![9]),
        });
        f.mock.push_event(TransportEvent::DirectMessage {
            from: ContactId(5),
            message: b"invite".to_vec(),
        });

        f.runtime.step(Instant::now()).unwrap();
        assert!(f.mock.actions().contains(&MockAction::InviteToGroup {
            contact: ContactId(5),
            group: GroupId(0),
        }));
    }

    #[test]
    fn fatal_send_ends_step() {
        let mut f = fixture();
        f.mock.add_group(GroupId(0));
        f.mock.fail(MockOp::SendGroupMessage);
        f.mock.push_event(TransportEvent::GroupMessage {
            group: GroupId(0),
            peer: 1,
            message: b"%ngb".to_vec(),
        });

        let err = f.runtime.step(Instant::now()).unwrap_err();
        assert!(matches!(err, NgbError::SendGroupMessage { .. }), "{err}");
    }

    #[test]
    fn saves_on_first_iteration_then_waits_for_interval() {
        let mut f = fixture();
        let start = Instant::now();
        let path = f.runtime.store().path().to_path_buf();

        f.runtime.step(start).unwrap();
        assert!(path.exists());

        std::fs::remove_file(&path).unwrap();
        f.runtime.step(start + Duration::from_secs(5)).unwrap();
        assert!(!path.exists());

        f.runtime.step(start + Duration::from_secs(11)).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn empty_state_is_not_written() {
        let mut f = fixture();
        f.mock.set_empty_state(true);
        f.runtime.step(Instant::now()).unwrap();
        assert!(!f.runtime.store().path().exists());
    }

    #[test]
    fn failed_save_is_not_retried_before_interval() {
        let dir = tempfile::tempdir().unwrap();
        let address = Address::from_bytes([1; ADDRESS_SIZE]);
        let mock = MockTransport::new(address);
        let store = StateStore::new(dir.path().join("missing").join("groupbot.data"));
        let mut runtime = BotRuntime::new(
            mock,
            BotState::new(RELAY, address),
            store,
            Duration::from_secs(10),
        );

        let start = Instant::now();
        runtime.step(start).unwrap();

        // Directory appears, but the schedule counts the failed attempt.
        std::fs::create_dir(dir.path().join("missing")).unwrap();
        runtime.step(start + Duration::from_secs(1)).unwrap();
        assert!(!runtime.store().path().exists());

        runtime.step(start + Duration::from_secs(11)).unwrap();
        assert!(runtime.store().path().exists());
    }

    #[test]
    fn step_returns_transport_interval() {
        let mut f = fixture();
        f.mock.set_poll_interval(Duration::from_millis(35));
        assert_eq!(
            f.runtime.step(Instant::now()).unwrap(),
            Duration::from_millis(35)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn run_polls_until_shutdown_and_saves() {
        let f = fixture();
        let path = f.runtime.store().path().to_path_buf();
        f.mock.set_poll_interval(Duration::from_millis(100));

        let shutdown = tokio::time::sleep(Duration::from_millis(1050));
        f.runtime.run(shutdown).await.unwrap();

        assert!(f.mock.polls() >= 10, "polls: {}", f.mock.polls());
        assert!(path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_fatal_error() {
        let f = fixture();
        f.mock.fail(MockOp::SendMessage);
        f.mock.push_event(TransportEvent::StatusMessage {
            contact: RELAY,
            message: Vec::new(),
        });

        let err = f
            .runtime
            .run(std::future::pending::<()>())
            .await
            .unwrap_err();
        assert!(matches!(err, NgbError::SendMessage { to: RELAY, .. }), "{err}");
    }
}
