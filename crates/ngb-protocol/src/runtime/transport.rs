use std::time::Duration;

use crate::error::TransportError;
use crate::types::{Address, BootstrapNode, ContactId, GroupHandle, GroupId, PublicKey};

/// Inbound protocol event produced by one [`Transport::poll`] step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A contact changed its status message.
    StatusMessage { contact: ContactId, message: Vec<u8> },
    /// A contact invited us into a group.
    GroupInvite { from: ContactId, handle: GroupHandle },
    /// A contact sent us a direct message.
    DirectMessage { from: ContactId, message: Vec<u8> },
    /// A message was posted in a group we belong to.
    GroupMessage {
        group: GroupId,
        peer: u32,
        message: Vec<u8>,
    },
    /// An unknown peer asked to become a contact.
    ContactRequest {
        public_key: PublicKey,
        message: Vec<u8>,
    },
}

/// Capabilities the relay agent needs from a messaging session.
///
/// In production: implemented over libtoxcore (feature `toxcore`).
/// In tests: [`mock::MockTransport`] records every call.
///
/// All calls are synchronous and non-blocking; the main loop is the only
/// caller, so implementations need no interior locking.
pub trait Transport {
    /// Our own full contact address.
    fn address(&self) -> Address;

    /// Serialize the whole session state. Empty when there is nothing to keep.
    fn save_state(&self) -> Vec<u8>;

    /// Connect to a bootstrap node.
    fn bootstrap(&mut self, node: &BootstrapNode) -> Result<(), TransportError>;

    /// Send a contact request to `address`.
    fn add_contact(&mut self, address: &Address, greeting: &[u8])
        -> Result<ContactId, TransportError>;

    /// Accept an inbound contact request without sending one back.
    fn accept_contact_request(&mut self, public_key: &PublicKey)
        -> Result<ContactId, TransportError>;

    /// Look up an existing contact by public key.
    fn contact_by_public_key(&self, public_key: &PublicKey) -> Option<ContactId>;

    /// Groups we currently belong to.
    fn groups(&self) -> Vec<GroupId>;

    /// Join the group behind an invite handle.
    fn join_group(&mut self, inviter: ContactId, handle: &GroupHandle)
        -> Result<GroupId, TransportError>;

    /// Send a direct text message.
    fn send_message(&mut self, to: ContactId, message: &[u8]) -> Result<(), TransportError>;

    /// Invite a contact into one of our groups.
    fn invite_to_group(&mut self, contact: ContactId, group: GroupId)
        -> Result<(), TransportError>;

    /// Post a text message in a group.
    fn send_group_message(&mut self, group: GroupId, message: &[u8])
        -> Result<(), TransportError>;

    fn set_nickname(&mut self, nickname: &str) -> Result<(), TransportError>;

    fn set_status_message(&mut self, status: &str) -> Result<(), TransportError>;

    /// Run one step of protocol processing and return the events it produced,
    /// in delivery order.
    fn poll(&mut self) -> Vec<TransportEvent>;

    /// How long to wait before the next [`poll`](Transport::poll).
    fn poll_interval(&self) -> Duration;
}

/// Creates sessions, either fresh or from a saved state blob.
pub trait SessionFactory {
    type Session: Transport;

    /// Create a session. With `saved`, the blob must be rejected with
    /// [`TransportError::CorruptState`] if the backend can't load it.
    fn create(&self, saved: Option<&[u8]>) -> Result<Self::Session, TransportError>;
}

// ── MockTransport (tests) ───────────────────────────────────────────

#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

    const STATE_MAGIC: &[u8; 4] = b"MOCK";

    /// Operations that can be scripted to fail.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum MockOp {
        Bootstrap,
        AddContact,
        AcceptContact,
        JoinGroup,
        SendMessage,
        InviteToGroup,
        SendGroupMessage,
        SetNickname,
        SetStatusMessage,
    }

    /// One recorded call. Failed calls are recorded too.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum MockAction {
        Bootstrap { host: String, port: u16 },
        AddContact { address: Address, greeting: Vec<u8> },
        AcceptContact { public_key: PublicKey },
        JoinGroup { inviter: ContactId, handle: GroupHandle },
        SendMessage { to: ContactId, message: Vec<u8> },
        InviteToGroup { contact: ContactId, group: GroupId },
        SendGroupMessage { group: GroupId, message: Vec<u8> },
        SetNickname(String),
        SetStatusMessage(String),
    }

    struct Inner {
        address: Address,
        contacts: Vec<PublicKey>,
        groups: Vec<GroupId>,
        queued: Vec<TransportEvent>,
        actions: Vec<MockAction>,
        failing: HashSet<MockOp>,
        empty_state: bool,
        poll_interval: Duration,
        polls: usize,
    }

    /// Fake session that records every call for verification.
    ///
    /// Clones share state, so a test can keep a handle after moving the
    /// transport into the runtime.
    #[derive(Clone)]
    pub struct MockTransport {
        inner: Arc<Mutex<Inner>>,
    }

    impl MockTransport {
        pub fn new(address: Address) -> Self {
            Self::with_contacts(address, Vec::new())
        }

        fn with_contacts(address: Address, contacts: Vec<PublicKey>) -> Self {
            Self {
                inner: Arc::new(Mutex::new(Inner {
                    address,
                    contacts,
                    groups: Vec::new(),
                    queued: Vec::new(),
                    actions: Vec::new(),
                    failing: HashSet::new(),
                    empty_state: false,
                    poll_interval: Duration::from_millis(50),
                    polls: 0,
                })),
            }
        }

        fn lock(&self) -> MutexGuard<'_, Inner> {
            self.inner.lock().unwrap_or_else(PoisonError::into_inner)
        }

        /// Queue an event for the next poll.
        pub fn push_event(&self, event: TransportEvent) {
            self.lock().queued.push(event);
        }

        pub fn fail(&self, op: MockOp) {
            self.lock().failing.insert(op);
        }

        pub fn recover(&self, op: MockOp) {
            self.lock().failing.remove(&op);
        }

        /// Make `save_state` return an empty blob.
        pub fn set_empty_state(&self, empty: bool) {
            self.lock().empty_state = empty;
        }

        pub fn set_poll_interval(&self, interval: Duration) {
            self.lock().poll_interval = interval;
        }

        /// Pretend we already belong to `group`.
        pub fn add_group(&self, group: GroupId) {
            self.lock().groups.push(group);
        }

        pub fn actions(&self) -> Vec<MockAction> {
            self.lock().actions.clone()
        }

        pub fn clear_actions(&self) {
            self.lock().actions.clear();
        }

        pub fn polls(&self) -> usize {
            self.lock().polls
        }

        pub fn contacts(&self) -> Vec<PublicKey> {
            self.lock().contacts.clone()
        }

        fn record(&self, action: MockAction, op: MockOp) -> Result<(), String> {
            let mut inner = self.lock();
            inner.actions.push(action);
            if inner.failing.contains(&op) {
                Err(format!("mock: {op:?} failed"))
            } else {
                Ok(())
            }
        }

        fn add_key(&self, key: PublicKey) -> ContactId {
            let mut inner = self.lock();
            if let Some(pos) = inner.contacts.iter().position(|k| *k == key) {
                return ContactId(pos as u32);
            }
            inner.contacts.push(key);
            ContactId(inner.contacts.len() as u32 - 1)
        }

        /// Decode a blob produced by [`Transport::save_state`].
        fn restore(blob: &[u8]) -> Result<Self, TransportError> {
            let body = blob
                .strip_prefix(STATE_MAGIC.as_slice())
                .ok_or_else(|| TransportError::CorruptState("bad magic".into()))?;
            if body.len() < crate::ADDRESS_SIZE
                || (body.len() - crate::ADDRESS_SIZE) % crate::PUBLIC_KEY_SIZE != 0
            {
                return Err(TransportError::CorruptState(format!(
                    "bad length {}",
                    blob.len()
                )));
            }
            let (addr, rest) = body.split_at(crate::ADDRESS_SIZE);
            let mut address = [0u8; crate::ADDRESS_SIZE];
            address.copy_from_slice(addr);
            let contacts = rest
                .chunks_exact(crate::PUBLIC_KEY_SIZE)
                .map(|chunk| {
                    let mut key = [0u8; crate::PUBLIC_KEY_SIZE];
                    key.copy_from_slice(chunk);
                    PublicKey::from_bytes(key)
                })
                .collect();
            Ok(Self::with_contacts(Address::from_bytes(address), contacts))
        }
    }

    impl Transport for MockTransport {
        fn address(&self) -> Address {
            self.lock().address
        }

        fn save_state(&self) -> Vec<u8> {
            let inner = self.lock();
            if inner.empty_state {
                return Vec::new();
            }
            let mut blob = STATE_MAGIC.to_vec();
            blob.extend_from_slice(inner.address.as_bytes());
            for key in &inner.contacts {
                blob.extend_from_slice(key.as_bytes());
            }
            blob
        }

        fn bootstrap(&mut self, node: &BootstrapNode) -> Result<(), TransportError> {
            self.record(
                MockAction::Bootstrap {
                    host: node.host.clone(),
                    port: node.port,
                },
                MockOp::Bootstrap,
            )
            .map_err(TransportError::Bootstrap)
        }

        fn add_contact(
            &mut self,
            address: &Address,
            greeting: &[u8],
        ) -> Result<ContactId, TransportError> {
            self.record(
                MockAction::AddContact {
                    address: *address,
                    greeting: greeting.to_vec(),
                },
                MockOp::AddContact,
            )
            .map_err(TransportError::AddContact)?;
            Ok(self.add_key(address.public_key()))
        }

        fn accept_contact_request(
            &mut self,
            public_key: &PublicKey,
        ) -> Result<ContactId, TransportError> {
            self.record(
                MockAction::AcceptContact {
                    public_key: *public_key,
                },
                MockOp::AcceptContact,
            )
            .map_err(TransportError::AddContact)?;
            Ok(self.add_key(*public_key))
        }

        fn contact_by_public_key(&self, public_key: &PublicKey) -> Option<ContactId> {
            self.lock()
                .contacts
                .iter()
                .position(|k| k == public_key)
                .map(|pos| ContactId(pos as u32))
        }

        fn groups(&self) -> Vec<GroupId> {
            self.lock().groups.clone()
        }

        fn join_group(
            &mut self,
            inviter: ContactId,
            handle: &GroupHandle,
        ) -> Result<GroupId, TransportError> {
            self.record(
                MockAction::JoinGroup {
                    inviter,
                    handle: handle.clone(),
                },
                MockOp::JoinGroup,
            )
            .map_err(TransportError::Join)?;
            let mut inner = self.lock();
            let group = GroupId(inner.groups.len() as u32);
            inner.groups.push(group);
            Ok(group)
        }

        fn send_message(&mut self, to: ContactId, message: &[u8]) -> Result<(), TransportError> {
            self.record(
                MockAction::SendMessage {
                    to,
                    message: message.to_vec(),
                },
                MockOp::SendMessage,
            )
            .map_err(TransportError::Send)
        }

        fn invite_to_group(
            &mut self,
            contact: ContactId,
            group: GroupId,
        ) -> Result<(), TransportError> {
            self.record(
                MockAction::InviteToGroup { contact, group },
                MockOp::InviteToGroup,
            )
            .map_err(TransportError::Invite)
        }

        fn send_group_message(
            &mut self,
            group: GroupId,
            message: &[u8],
        ) -> Result<(), TransportError> {
            self.record(
                MockAction::SendGroupMessage {
                    group,
                    message: message.to_vec(),
                },
                MockOp::SendGroupMessage,
            )
            .map_err(TransportError::Send)
        }

        fn set_nickname(&mut self, nickname: &str) -> Result<(), TransportError> {
            self.record(
                MockAction::SetNickname(nickname.to_string()),
                MockOp::SetNickname,
            )
            .map_err(TransportError::SetInfo)
        }

        fn set_status_message(&mut self, status: &str) -> Result<(), TransportError> {
            self.record(
                MockAction::SetStatusMessage(status.to_string()),
                MockOp::SetStatusMessage,
            )
            .map_err(TransportError::SetInfo)
        }

        fn poll(&mut self) -> Vec<TransportEvent> {
            let mut inner = self.lock();
            inner.polls += 1;
            std::mem::take(&mut inner.queued)
        }

        fn poll_interval(&self) -> Duration {
            self.lock().poll_interval
        }
    }

    /// Factory handing out [`MockTransport`] sessions.
    #[derive(Clone)]
    pub struct MockFactory {
        address: Address,
        fail_create: Arc<Mutex<bool>>,
        last: Arc<Mutex<Option<MockTransport>>>,
    }

    impl MockFactory {
        /// Fresh sessions get `address` as their identity.
        pub fn new(address: Address) -> Self {
            Self {
                address,
                fail_create: Arc::new(Mutex::new(false)),
                last: Arc::new(Mutex::new(None)),
            }
        }

        pub fn set_fail_create(&self, fail: bool) {
            *self.fail_create.lock().unwrap_or_else(PoisonError::into_inner) = fail;
        }

        /// The most recently created session.
        pub fn last_session(&self) -> Option<MockTransport> {
            self.last.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }
    }

    impl SessionFactory for MockFactory {
        type Session = MockTransport;

        fn create(&self, saved: Option<&[u8]>) -> Result<MockTransport, TransportError> {
            if *self.fail_create.lock().unwrap_or_else(PoisonError::into_inner) {
                return Err(TransportError::Create("mock: create failed".into()));
            }
            let session = match saved {
                Some(blob) => MockTransport::restore(blob)?,
                None => MockTransport::new(self.address),
            };
            *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
            Ok(session)
        }
    }
}
