//! Raw declarations for the subset of the c-toxcore 0.2 API we call.
#![allow(non_camel_case_types)]

use std::os::raw::{c_char, c_int, c_void};

/// Opaque `Tox` instance.
#[repr(C)]
pub struct Tox {
    _private: [u8; 0],
}

/// Opaque `Tox_Options`.
#[repr(C)]
pub struct Tox_Options {
    _private: [u8; 0],
}

// C enums are passed as `int`.
pub type Tox_Err = c_int;
pub type Tox_Message_Type = c_int;
pub type Tox_Savedata_Type = c_int;
pub type Tox_Conference_Type = c_int;

pub const TOX_ERR_OK: Tox_Err = 0;
pub const TOX_ERR_NEW_LOAD_ENCRYPTED: Tox_Err = 8;
pub const TOX_ERR_NEW_LOAD_BAD_FORMAT: Tox_Err = 9;

pub const TOX_SAVEDATA_TYPE_TOX_SAVE: Tox_Savedata_Type = 1;
pub const TOX_MESSAGE_TYPE_NORMAL: Tox_Message_Type = 0;

pub const TOX_PUBLIC_KEY_SIZE: usize = 32;
pub const TOX_ADDRESS_SIZE: usize = 38;

/// Returned by number-producing calls on failure.
pub const TOX_INVALID_NUMBER: u32 = u32::MAX;

pub type tox_friend_status_message_cb =
    extern "C" fn(tox: *mut Tox, friend_number: u32, message: *const u8, length: usize, user_data: *mut c_void);

pub type tox_friend_request_cb =
    extern "C" fn(tox: *mut Tox, public_key: *const u8, message: *const u8, length: usize, user_data: *mut c_void);

pub type tox_friend_message_cb = extern "C" fn(
    tox: *mut Tox,
    friend_number: u32,
    kind: Tox_Message_Type,
    message: *const u8,
    length: usize,
    user_data: *mut c_void,
);

pub type tox_conference_invite_cb = extern "C" fn(
    tox: *mut Tox,
    friend_number: u32,
    kind: Tox_Conference_Type,
    cookie: *const u8,
    length: usize,
    user_data: *mut c_void,
);

pub type tox_conference_message_cb = extern "C" fn(
    tox: *mut Tox,
    conference_number: u32,
    peer_number: u32,
    kind: Tox_Message_Type,
    message: *const u8,
    length: usize,
    user_data: *mut c_void,
);

#[link(name = "toxcore")]
extern "C" {
    pub fn tox_options_new(error: *mut Tox_Err) -> *mut Tox_Options;
    pub fn tox_options_free(options: *mut Tox_Options);
    pub fn tox_options_set_ipv6_enabled(options: *mut Tox_Options, enabled: bool);
    pub fn tox_options_set_udp_enabled(options: *mut Tox_Options, enabled: bool);
    pub fn tox_options_set_savedata_type(options: *mut Tox_Options, kind: Tox_Savedata_Type);
    pub fn tox_options_set_savedata_data(options: *mut Tox_Options, data: *const u8, length: usize);

    pub fn tox_new(options: *const Tox_Options, error: *mut Tox_Err) -> *mut Tox;
    pub fn tox_kill(tox: *mut Tox);

    pub fn tox_get_savedata_size(tox: *const Tox) -> usize;
    pub fn tox_get_savedata(tox: *const Tox, savedata: *mut u8);

    pub fn tox_bootstrap(
        tox: *mut Tox,
        host: *const c_char,
        port: u16,
        public_key: *const u8,
        error: *mut Tox_Err,
    ) -> bool;

    pub fn tox_iteration_interval(tox: *const Tox) -> u32;
    pub fn tox_iterate(tox: *mut Tox, user_data: *mut c_void);

    pub fn tox_self_get_address(tox: *const Tox, address: *mut u8);
    pub fn tox_self_set_name(tox: *mut Tox, name: *const u8, length: usize, error: *mut Tox_Err) -> bool;
    pub fn tox_self_set_status_message(
        tox: *mut Tox,
        status_message: *const u8,
        length: usize,
        error: *mut Tox_Err,
    ) -> bool;

    pub fn tox_friend_add(
        tox: *mut Tox,
        address: *const u8,
        message: *const u8,
        length: usize,
        error: *mut Tox_Err,
    ) -> u32;
    pub fn tox_friend_add_norequest(tox: *mut Tox, public_key: *const u8, error: *mut Tox_Err) -> u32;
    pub fn tox_friend_by_public_key(tox: *const Tox, public_key: *const u8, error: *mut Tox_Err) -> u32;
    pub fn tox_friend_send_message(
        tox: *mut Tox,
        friend_number: u32,
        kind: Tox_Message_Type,
        message: *const u8,
        length: usize,
        error: *mut Tox_Err,
    ) -> u32;

    pub fn tox_conference_get_chatlist_size(tox: *const Tox) -> usize;
    pub fn tox_conference_get_chatlist(tox: *const Tox, chatlist: *mut u32);
    pub fn tox_conference_join(
        tox: *mut Tox,
        friend_number: u32,
        cookie: *const u8,
        length: usize,
        error: *mut Tox_Err,
    ) -> u32;
    pub fn tox_conference_invite(
        tox: *mut Tox,
        friend_number: u32,
        conference_number: u32,
        error: *mut Tox_Err,
    ) -> bool;
    pub fn tox_conference_send_message(
        tox: *mut Tox,
        conference_number: u32,
        kind: Tox_Message_Type,
        message: *const u8,
        length: usize,
        error: *mut Tox_Err,
    ) -> bool;

    pub fn tox_callback_friend_status_message(tox: *mut Tox, callback: Option<tox_friend_status_message_cb>);
    pub fn tox_callback_friend_request(tox: *mut Tox, callback: Option<tox_friend_request_cb>);
    pub fn tox_callback_friend_message(tox: *mut Tox, callback: Option<tox_friend_message_cb>);
    pub fn tox_callback_conference_invite(tox: *mut Tox, callback: Option<tox_conference_invite_cb>);
    pub fn tox_callback_conference_message(tox: *mut Tox, callback: Option<tox_conference_message_cb>);
}
