use std::path::PathBuf;
use std::time::Duration;

use crate::error::NgbError;
use crate::store::DEFAULT_SAVE_INTERVAL;
use crate::types::{Address, BootstrapNode, PublicKey};

/// Default bootstrap node.
pub const DEFAULT_BOOTSTRAP_HOST: &str = "192.254.75.98";
pub const DEFAULT_BOOTSTRAP_PORT: u16 = 33445;
pub const DEFAULT_BOOTSTRAP_KEY: &str =
    "951C88B7E75C867418ACDB5D273821372BB5BD652740BCDF623A4FA293E75D2F";

/// Address of the upstream relay that issues our group invite.
pub const DEFAULT_RELAY_ADDRESS: &str =
    "56A1ADE4B65B86BCD51CC73E2CD4E542179F47959FE3E0E21B4B0ACDADE51855D34D34D37CB5";

pub const DEFAULT_NICKNAME: &str = "NGB";
pub const DEFAULT_STATUS_MESSAGE: &str = "Send me a message with the word \"invite\"";
pub const DEFAULT_RELAY_GREETING: &str = "Hello";
pub const DEFAULT_STATE_FILE: &str = "groupbot.data";

/// Environment variable overriding the default state file path.
pub const STATE_FILE_ENV: &str = "NGB_STATE_FILE";

/// Configuration for the relay agent.
///
/// Start from [`BotConfig::new`] and adjust with the builder methods:
///
/// ```rust
/// use ngb_protocol::BotConfig;
///
/// let config = BotConfig::new()
///     .unwrap()
///     .nickname("NGB-test")
///     .state_path("/tmp/ngb.data");
/// assert_eq!(config.nickname, "NGB-test");
/// ```
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Canonical state file; the temp file sits next to it.
    pub state_path: PathBuf,
    pub nickname: String,
    pub status_message: String,
    /// The one contact whose invites we accept.
    pub relay_address: Address,
    /// Message attached to the contact request sent to the relay.
    pub relay_greeting: String,
    pub bootstrap: BootstrapNode,
    /// Time between state saves, measured from the last attempt.
    pub save_interval: Duration,
}

impl BotConfig {
    /// Defaults built from the embedded constants.
    ///
    /// If `NGB_STATE_FILE` is set, it replaces the default state path.
    /// Fails only if an embedded hex constant is malformed.
    pub fn new() -> Result<Self, NgbError> {
        let state_path = std::env::var_os(STATE_FILE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE));

        Ok(Self {
            state_path,
            nickname: DEFAULT_NICKNAME.to_string(),
            status_message: DEFAULT_STATUS_MESSAGE.to_string(),
            relay_address: parse_relay_address(DEFAULT_RELAY_ADDRESS)?,
            relay_greeting: DEFAULT_RELAY_GREETING.to_string(),
            bootstrap: BootstrapNode {
                host: DEFAULT_BOOTSTRAP_HOST.to_string(),
                port: DEFAULT_BOOTSTRAP_PORT,
                public_key: parse_bootstrap_key(DEFAULT_BOOTSTRAP_KEY)?,
            },
            save_interval: DEFAULT_SAVE_INTERVAL,
        })
    }

    pub fn state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = path.into();
        self
    }

    pub fn nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = nickname.into();
        self
    }

    pub fn status_message(mut self, status: impl Into<String>) -> Self {
        self.status_message = status.into();
        self
    }

    pub fn relay_address(mut self, address: Address) -> Self {
        self.relay_address = address;
        self
    }

    pub fn relay_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.relay_greeting = greeting.into();
        self
    }

    pub fn bootstrap(mut self, node: BootstrapNode) -> Self {
        self.bootstrap = node;
        self
    }

    pub fn save_interval(mut self, interval: Duration) -> Self {
        self.save_interval = interval;
        self
    }
}

/// Parse a relay address, tagging errors for the startup log.
pub fn parse_relay_address(text: &str) -> Result<Address, NgbError> {
    text.parse().map_err(|source| NgbError::Config {
        what: "relay address",
        source,
    })
}

/// Parse a bootstrap node key, tagging errors for the startup log.
pub fn parse_bootstrap_key(text: &str) -> Result<PublicKey, NgbError> {
    text.parse().map_err(|source| NgbError::Config {
        what: "bootstrap key",
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_constants_decode() {
        let config = BotConfig::new().unwrap();
        assert_eq!(config.relay_address.to_string(), DEFAULT_RELAY_ADDRESS);
        assert_eq!(config.bootstrap.public_key.to_string(), DEFAULT_BOOTSTRAP_KEY);
        assert_eq!(config.bootstrap.port, 33445);
        assert_eq!(config.nickname, "NGB");
        assert_eq!(config.save_interval, Duration::from_secs(10));
    }

    #[test]
    fn malformed_relay_address_is_config_error() {
        let err = parse_relay_address("56A1ADE4ZZ").unwrap_err();
        assert!(matches!(err, NgbError::Config { what: "relay address", .. }));
    }

    #[test]
    fn malformed_bootstrap_key_is_config_error() {
        let bad = DEFAULT_BOOTSTRAP_KEY.replace('9', "x");
        let err = parse_bootstrap_key(&bad).unwrap_err();
        assert!(matches!(err, NgbError::Config { what: "bootstrap key", .. }));
    }

    #[test]
    fn builder_overrides() {
        let config = BotConfig::new()
            .unwrap()
            .state_path("/tmp/x.data")
            .status_message("hi")
            .save_interval(Duration::from_secs(1));
        assert_eq!(config.state_path, PathBuf::from("/tmp/x.data"));
        assert_eq!(config.status_message, "hi");
        assert_eq!(config.save_interval, Duration::from_secs(1));
    }
}
