use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use ngb_protocol::config::{parse_bootstrap_key, parse_relay_address};
use ngb_protocol::{BotConfig, NgbError};

#[derive(Parser, Debug)]
#[command(
    name = "ngb-bot",
    version,
    about = "Group relay agent: invites anyone who asks into its group"
)]
pub struct Cli {
    /// State file (default: $NGB_STATE_FILE, else ./groupbot.data).
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    /// Display name.
    #[arg(long)]
    pub nickname: Option<String>,

    /// Status message shown to contacts.
    #[arg(long)]
    pub status_message: Option<String>,

    /// Address of the upstream relay (76 hex chars).
    #[arg(long)]
    pub relay: Option<String>,

    /// Message sent with the contact request to the relay.
    #[arg(long)]
    pub greeting: Option<String>,

    /// Bootstrap node host.
    #[arg(long)]
    pub bootstrap_host: Option<String>,

    /// Bootstrap node port.
    #[arg(long)]
    pub bootstrap_port: Option<u16>,

    /// Bootstrap node public key (64 hex chars).
    #[arg(long)]
    pub bootstrap_key: Option<String>,

    /// Seconds between state saves.
    #[arg(long)]
    pub save_interval: Option<u64>,
}

impl Cli {
    /// Apply the flags on top of [`BotConfig::new`].
    pub fn into_config(self) -> Result<BotConfig, NgbError> {
        let mut config = BotConfig::new()?;

        if let Some(path) = self.state_file {
            config = config.state_path(path);
        }
        if let Some(nickname) = self.nickname {
            config = config.nickname(nickname);
        }
        if let Some(status) = self.status_message {
            config = config.status_message(status);
        }
        if let Some(relay) = self.relay {
            config = config.relay_address(parse_relay_address(&relay)?);
        }
        if let Some(greeting) = self.greeting {
            config = config.relay_greeting(greeting);
        }
        if let Some(secs) = self.save_interval {
            config = config.save_interval(Duration::from_secs(secs));
        }

        let mut bootstrap = config.bootstrap.clone();
        if let Some(host) = self.bootstrap_host {
            bootstrap.host = host;
        }
        if let Some(port) = self.bootstrap_port {
            bootstrap.port = port;
        }
        if let Some(key) = self.bootstrap_key {
            bootstrap.public_key = parse_bootstrap_key(&key)?;
        }

        Ok(config.bootstrap(bootstrap))
    }
}
