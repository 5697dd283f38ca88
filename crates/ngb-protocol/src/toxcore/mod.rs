//! Session backend over the system `libtoxcore`.
//!
//! Callbacks never act: they append to an event buffer handed to
//! `tox_iterate` as `user_data`, and [`Transport::poll`] returns the
//! buffer once the iteration is over.

mod ffi;

use std::ffi::CString;
use std::os::raw::c_void;
use std::ptr::NonNull;
use std::time::Duration;

use crate::error::TransportError;
use crate::runtime::{SessionFactory, Transport, TransportEvent};
use crate::types::{
    Address, BootstrapNode, ContactId, GroupHandle, GroupId, PublicKey, ADDRESS_SIZE,
    PUBLIC_KEY_SIZE,
};

const _: () = assert!(ffi::TOX_ADDRESS_SIZE == ADDRESS_SIZE);
const _: () = assert!(ffi::TOX_PUBLIC_KEY_SIZE == PUBLIC_KEY_SIZE);

/// Creates toxcore sessions.
#[derive(Debug, Clone)]
pub struct ToxFactory {
    pub ipv6: bool,
    pub udp: bool,
}

impl Default for ToxFactory {
    fn default() -> Self {
        Self {
            ipv6: true,
            udp: true,
        }
    }
}

impl SessionFactory for ToxFactory {
    type Session = ToxSession;

    fn create(&self, saved: Option<&[u8]>) -> Result<ToxSession, TransportError> {
        let mut err = ffi::TOX_ERR_OK;
        // SAFETY: options are created, configured and freed here; tox_new
        // copies the savedata before returning.
        let tox = unsafe {
            let options = ffi::tox_options_new(&mut err);
            if options.is_null() {
                return Err(TransportError::Create(format!("tox_options_new error {err}")));
            }
            ffi::tox_options_set_ipv6_enabled(options, self.ipv6);
            ffi::tox_options_set_udp_enabled(options, self.udp);
            if let Some(blob) = saved {
                ffi::tox_options_set_savedata_type(options, ffi::TOX_SAVEDATA_TYPE_TOX_SAVE);
                ffi::tox_options_set_savedata_data(options, blob.as_ptr(), blob.len());
            }
            let tox = ffi::tox_new(options, &mut err);
            ffi::tox_options_free(options);
            tox
        };

        let Some(tox) = NonNull::new(tox) else {
            return Err(match err {
                ffi::TOX_ERR_NEW_LOAD_ENCRYPTED | ffi::TOX_ERR_NEW_LOAD_BAD_FORMAT => {
                    TransportError::CorruptState(format!("tox_new error {err}"))
                }
                _ => TransportError::Create(format!("tox_new error {err}")),
            });
        };

        // SAFETY: tox is a live instance; callbacks are plain functions.
        unsafe {
            ffi::tox_callback_friend_status_message(tox.as_ptr(), Some(on_status_message));
            ffi::tox_callback_conference_invite(tox.as_ptr(), Some(on_group_invite));
            ffi::tox_callback_friend_message(tox.as_ptr(), Some(on_friend_message));
            ffi::tox_callback_conference_message(tox.as_ptr(), Some(on_group_message));
            ffi::tox_callback_friend_request(tox.as_ptr(), Some(on_friend_request));
        }

        Ok(ToxSession {
            tox,
            events: Vec::new(),
        })
    }
}

/// A live toxcore instance.
pub struct ToxSession {
    tox: NonNull<ffi::Tox>,
    events: Vec<TransportEvent>,
}

impl Drop for ToxSession {
    fn drop(&mut self) {
        // SAFETY: we own the instance and never hand the pointer out.
        unsafe { ffi::tox_kill(self.tox.as_ptr()) }
    }
}

fn check(ok: bool, err: ffi::Tox_Err) -> Result<(), String> {
    if ok && err == ffi::TOX_ERR_OK {
        Ok(())
    } else {
        Err(format!("error code {err}"))
    }
}

fn check_number(n: u32, err: ffi::Tox_Err) -> Result<u32, String> {
    check(n != ffi::TOX_INVALID_NUMBER, err).map(|()| n)
}

impl Transport for ToxSession {
    fn address(&self) -> Address {
        let mut buf = [0u8; ADDRESS_SIZE];
        // SAFETY: buf holds TOX_ADDRESS_SIZE bytes.
        unsafe { ffi::tox_self_get_address(self.tox.as_ptr(), buf.as_mut_ptr()) };
        Address::from_bytes(buf)
    }

    fn save_state(&self) -> Vec<u8> {
        // SAFETY: the buffer is sized by tox_get_savedata_size.
        unsafe {
            let size = ffi::tox_get_savedata_size(self.tox.as_ptr());
            let mut buf = vec![0u8; size];
            if size > 0 {
                ffi::tox_get_savedata(self.tox.as_ptr(), buf.as_mut_ptr());
            }
            buf
        }
    }

    fn bootstrap(&mut self, node: &BootstrapNode) -> Result<(), TransportError> {
        let host = CString::new(node.host.as_str())
            .map_err(|e| TransportError::Bootstrap(e.to_string()))?;
        let mut err = ffi::TOX_ERR_OK;
        // SAFETY: host is NUL-terminated, key holds TOX_PUBLIC_KEY_SIZE bytes.
        let ok = unsafe {
            ffi::tox_bootstrap(
                self.tox.as_ptr(),
                host.as_ptr(),
                node.port,
                node.public_key.as_bytes().as_ptr(),
                &mut err,
            )
        };
        check(ok, err).map_err(TransportError::Bootstrap)
    }

    fn add_contact(
        &mut self,
        address: &Address,
        greeting: &[u8],
    ) -> Result<ContactId, TransportError> {
        let mut err = ffi::TOX_ERR_OK;
        // SAFETY: address holds TOX_ADDRESS_SIZE bytes; greeting is a valid slice.
        let n = unsafe {
            ffi::tox_friend_add(
                self.tox.as_ptr(),
                address.as_bytes().as_ptr(),
                greeting.as_ptr(),
                greeting.len(),
                &mut err,
            )
        };
        check_number(n, err)
            .map(ContactId)
            .map_err(TransportError::AddContact)
    }

    fn accept_contact_request(
        &mut self,
        public_key: &PublicKey,
    ) -> Result<ContactId, TransportError> {
        let mut err = ffi::TOX_ERR_OK;
        // SAFETY: key holds TOX_PUBLIC_KEY_SIZE bytes.
        let n = unsafe {
            ffi::tox_friend_add_norequest(self.tox.as_ptr(), public_key.as_bytes().as_ptr(), &mut err)
        };
        check_number(n, err)
            .map(ContactId)
            .map_err(TransportError::AddContact)
    }

    fn contact_by_public_key(&self, public_key: &PublicKey) -> Option<ContactId> {
        let mut err = ffi::TOX_ERR_OK;
        // SAFETY: key holds TOX_PUBLIC_KEY_SIZE bytes.
        let n = unsafe {
            ffi::tox_friend_by_public_key(self.tox.as_ptr(), public_key.as_bytes().as_ptr(), &mut err)
        };
        check_number(n, err).ok().map(ContactId)
    }

    fn groups(&self) -> Vec<GroupId> {
        // SAFETY: the buffer is sized by tox_conference_get_chatlist_size.
        let list = unsafe {
            let size = ffi::tox_conference_get_chatlist_size(self.tox.as_ptr());
            let mut list = vec![0u32; size];
            if size > 0 {
                ffi::tox_conference_get_chatlist(self.tox.as_ptr(), list.as_mut_ptr());
            }
            list
        };
        list.into_iter().map(GroupId).collect()
    }

    fn join_group(
        &mut self,
        inviter: ContactId,
        handle: &GroupHandle,
    ) -> Result<GroupId, TransportError> {
        let cookie = handle.as_bytes();
        let mut err = ffi::TOX_ERR_OK;
        // SAFETY: cookie is a valid slice.
        let n = unsafe {
            ffi::tox_conference_join(
                self.tox.as_ptr(),
                inviter.0,
                cookie.as_ptr(),
                cookie.len(),
                &mut err,
            )
        };
        check_number(n, err)
            .map(GroupId)
            .map_err(TransportError::Join)
    }

    fn send_message(&mut self, to: ContactId, message: &[u8]) -> Result<(), TransportError> {
        let mut err = ffi::TOX_ERR_OK;
        // SAFETY: message is a valid slice.
        unsafe {
            ffi::tox_friend_send_message(
                self.tox.as_ptr(),
                to.0,
                ffi::TOX_MESSAGE_TYPE_NORMAL,
                message.as_ptr(),
                message.len(),
                &mut err,
            )
        };
        check(true, err).map_err(TransportError::Send)
    }

    fn invite_to_group(
        &mut self,
        contact: ContactId,
        group: GroupId,
    ) -> Result<(), TransportError> {
        let mut err = ffi::TOX_ERR_OK;
        // SAFETY: plain numbers only.
        let ok = unsafe { ffi::tox_conference_invite(self.tox.as_ptr(), contact.0, group.0, &mut err) };
        check(ok, err).map_err(TransportError::Invite)
    }

    fn send_group_message(
        &mut self,
        group: GroupId,
        message: &[u8],
    ) -> Result<(), TransportError> {
        let mut err = ffi::TOX_ERR_OK;
        // SAFETY: message is a valid slice.
        let ok = unsafe {
            ffi::tox_conference_send_message(
                self.tox.as_ptr(),
                group.0,
                ffi::TOX_MESSAGE_TYPE_NORMAL,
                message.as_ptr(),
                message.len(),
                &mut err,
            )
        };
        check(ok, err).map_err(TransportError::Send)
    }

    fn set_nickname(&mut self, nickname: &str) -> Result<(), TransportError> {
        let mut err = ffi::TOX_ERR_OK;
        // SAFETY: nickname is a valid slice.
        let ok = unsafe {
            ffi::tox_self_set_name(self.tox.as_ptr(), nickname.as_ptr(), nickname.len(), &mut err)
        };
        check(ok, err).map_err(TransportError::SetInfo)
    }

    fn set_status_message(&mut self, status: &str) -> Result<(), TransportError> {
        let mut err = ffi::TOX_ERR_OK;
        // SAFETY: status is a valid slice.
        let ok = unsafe {
            ffi::tox_self_set_status_message(self.tox.as_ptr(), status.as_ptr(), status.len(), &mut err)
        };
        check(ok, err).map_err(TransportError::SetInfo)
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        let events: *mut Vec<TransportEvent> = &mut self.events;
        // SAFETY: the callbacks only dereference user_data during this
        // call, while `self.events` is exclusively borrowed.
        unsafe { ffi::tox_iterate(self.tox.as_ptr(), events.cast::<c_void>()) };
        std::mem::take(&mut self.events)
    }

    fn poll_interval(&self) -> Duration {
        // SAFETY: read-only query.
        let ms = unsafe { ffi::tox_iteration_interval(self.tox.as_ptr()) };
        Duration::from_millis(u64::from(ms))
    }
}

// ── Callbacks: record, never act ─────────────────────────────────────

/// Copy a C buffer; null or empty gives an empty vec.
///
/// # Safety
/// `ptr` must be valid for `len` bytes when non-null.
unsafe fn copy_bytes(ptr: *const u8, len: usize) -> Vec<u8> {
    if ptr.is_null() || len == 0 {
        return Vec::new();
    }
    std::slice::from_raw_parts(ptr, len).to_vec()
}

fn push(user_data: *mut c_void, event: TransportEvent) {
    if user_data.is_null() {
        return;
    }
    // SAFETY: user_data is the event buffer passed by `poll`.
    let events = unsafe { &mut *user_data.cast::<Vec<TransportEvent>>() };
    events.push(event);
}

extern "C" fn on_status_message(
    _tox: *mut ffi::Tox,
    friend_number: u32,
    message: *const u8,
    length: usize,
    user_data: *mut c_void,
) {
    // SAFETY: toxcore passes a buffer of `length` bytes.
    let message = unsafe { copy_bytes(message, length) };
    push(
        user_data,
        TransportEvent::StatusMessage {
            contact: ContactId(friend_number),
            message,
        },
    );
}

extern "C" fn on_group_invite(
    _tox: *mut ffi::Tox,
    friend_number: u32,
    _kind: ffi::Tox_Conference_Type,
    cookie: *const u8,
    length: usize,
    user_data: *mut c_void,
) {
    // SAFETY: toxcore passes a cookie of `length` bytes.
    let cookie = unsafe { copy_bytes(cookie, length) };
    push(
        user_data,
        TransportEvent::GroupInvite {
            from: ContactId(friend_number),
            handle: GroupHandle(cookie),
        },
    );
}

extern "C" fn on_friend_message(
    _tox: *mut ffi::Tox,
    friend_number: u32,
    _kind: ffi::Tox_Message_Type,
    message: *const u8,
    length: usize,
    user_data: *mut c_void,
) {
    // SAFETY: toxcore passes a buffer of `length` bytes.
    let message = unsafe { copy_bytes(message, length) };
    push(
        user_data,
        TransportEvent::DirectMessage {
            from: ContactId(friend_number),
            message,
        },
    );
}

extern "C" fn on_group_message(
    _tox: *mut ffi::Tox,
    conference_number: u32,
    peer_number: u32,
    _kind: ffi::Tox_Message_Type,
    message: *const u8,
    length: usize,
    user_data: *mut c_void,
) {
    // SAFETY: toxcore passes a buffer of `length` bytes.
    let message = unsafe { copy_bytes(message, length) };
    push(
        user_data,
        TransportEvent::GroupMessage {
            group: GroupId(conference_number),
            peer: peer_number,
            message,
        },
    );
}

extern "C" fn on_friend_request(
    _tox: *mut ffi::Tox,
    public_key: *const u8,
    message: *const u8,
    length: usize,
    user_data: *mut c_void,
) {
    if public_key.is_null() {
        return;
    }
    let mut key = [0u8; PUBLIC_KEY_SIZE];
    // SAFETY: toxcore passes TOX_PUBLIC_KEY_SIZE key bytes and `length`
    // message bytes.
    let message = unsafe {
        key.copy_from_slice(std::slice::from_raw_parts(public_key, PUBLIC_KEY_SIZE));
        copy_bytes(message, length)
    };
    push(
        user_data,
        TransportEvent::ContactRequest {
            public_key: PublicKey::from_bytes(key),
            message,
        },
    );
}
