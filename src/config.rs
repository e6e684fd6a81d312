//! Run configuration, read from a TOML file
//!
//! ```toml
//! [relay]
//! host = "smtp.example.org"
//! security = "upgrade"
//! sender = "noreply@example.org"
//! sender_name = "Example Reminders"
//! secret_env = "SMTP_SECRET"
//!
//! [pacing]
//! message_delay_ms = 250
//! batch_size = 10
//! batch_pause_secs = 2
//!
//! [message]
//! subject = "Reminder"
//! text_file = "reminder.txt"
//! html_file = "reminder.html"
//!
//! [recipients]
//! file = "recipients.txt"
//! ```
//!
//! Relative paths are resolved against the directory of the configuration
//! file. Everything is checked up front: any problem is a configuration
//! error, raised before a single recipient is attempted.

use std::{
    env, fs,
    net::Ipv4Addr,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use serde::Deserialize;

use crate::{
    dispatch::PacingPolicy,
    error::{self, Error},
    message::MessageContent,
    recipients::FileRecipients,
    transport::smtp::{
        extension::ClientId, RelayCredentials, SmtpTransport, TransportSecurity,
    },
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    relay: RawRelay,
    #[serde(default)]
    pacing: RawPacing,
    message: RawMessage,
    recipients: RawRecipients,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRelay {
    #[serde(default)]
    host: String,
    port: Option<u16>,
    #[serde(default)]
    security: TransportSecurity,
    #[serde(default)]
    sender: String,
    sender_name: Option<String>,
    username: Option<String>,
    secret: Option<String>,
    secret_env: Option<String>,
    hello_name: Option<String>,
    #[serde(default = "defaults::connect_timeout_secs")]
    connect_timeout_secs: u64,
    #[serde(default = "defaults::command_timeout_secs")]
    command_timeout_secs: u64,
    #[serde(default)]
    accept_invalid_certs: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPacing {
    #[serde(default)]
    message_delay_ms: u64,
    #[serde(default = "defaults::batch_size")]
    batch_size: usize,
    #[serde(default)]
    batch_pause_secs: u64,
}

impl Default for RawPacing {
    fn default() -> Self {
        Self {
            message_delay_ms: 0,
            batch_size: defaults::batch_size(),
            batch_pause_secs: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMessage {
    subject: String,
    text: Option<String>,
    text_file: Option<PathBuf>,
    html: Option<String>,
    html_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRecipients {
    file: PathBuf,
}

mod defaults {
    pub(super) const fn connect_timeout_secs() -> u64 {
        10
    }

    pub(super) const fn command_timeout_secs() -> u64 {
        60
    }

    pub(super) const fn batch_size() -> usize {
        10
    }
}

/// Everything a run needs, resolved and checked
#[derive(Debug, Clone)]
pub struct Config {
    relay: RelayCredentials,
    hello_name: Option<ClientId>,
    connect_timeout: Option<Duration>,
    command_timeout: Option<Duration>,
    accept_invalid_certs: bool,
    pacing: PacingPolicy,
    content: MessageContent,
    recipients: FileRecipients,
}

impl Config {
    /// Reads the configuration file at `path`
    pub fn from_path(path: impl AsRef<Path>) -> Result<Config, Error> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            error::configuration(format!("cannot read {}: {e}", path.display()))
        })?;

        Config::parse(&text, path.parent().unwrap_or_else(|| Path::new("")))
    }

    /// Parses a configuration, resolving relative paths against `base`
    pub fn parse(text: &str, base: &Path) -> Result<Config, Error> {
        let raw: RawConfig = toml::from_str(text).map_err(error::configuration)?;

        let secret = match (raw.relay.secret, raw.relay.secret_env) {
            (Some(secret), _) if !secret.is_empty() => secret,
            (_, Some(var)) => env::var(&var).map_err(|e| {
                error::configuration(format!("cannot read secret from ${var}: {e}"))
            })?,
            _ => String::new(),
        };

        let security = raw.relay.security;
        let mut relay = RelayCredentials::new(
            raw.relay.host,
            raw.relay.port.unwrap_or_else(|| security.default_port()),
            security,
            raw.relay.sender,
            secret,
        );
        if let Some(name) = raw.relay.sender_name {
            relay = relay.sender_name(name);
        }
        if let Some(username) = raw.relay.username {
            relay = relay.username(username);
        }
        relay.validate()?;

        let pacing = PacingPolicy::new(
            Duration::from_millis(raw.pacing.message_delay_ms),
            raw.pacing.batch_size,
            Duration::from_secs(raw.pacing.batch_pause_secs),
        )?;

        let text = body(raw.message.text, raw.message.text_file, base, "text")?;
        let html = body(raw.message.html, raw.message.html_file, base, "html")?;
        let content = MessageContent::new(raw.message.subject, &text, &html);

        Ok(Config {
            relay,
            hello_name: raw.relay.hello_name.map(|name| match name.parse::<Ipv4Addr>() {
                Ok(addr) => ClientId::Ipv4(addr),
                Err(_) => ClientId::Domain(name),
            }),
            connect_timeout: timeout(raw.relay.connect_timeout_secs),
            command_timeout: timeout(raw.relay.command_timeout_secs),
            accept_invalid_certs: raw.relay.accept_invalid_certs,
            pacing,
            content,
            recipients: FileRecipients::new(base.join(raw.recipients.file)),
        })
    }

    /// The relay and the identity used with it
    pub fn relay(&self) -> &RelayCredentials {
        &self.relay
    }

    /// Pacing of the run
    pub fn pacing(&self) -> &PacingPolicy {
        &self.pacing
    }

    /// Subject and bodies
    pub fn content(&self) -> &MessageContent {
        &self.content
    }

    /// Where recipients are read from
    pub fn recipients(&self) -> &FileRecipients {
        &self.recipients
    }

    /// Builds the SMTP transport from the relay settings
    pub fn transport(&self) -> Result<SmtpTransport, Error> {
        let mut builder = SmtpTransport::builder()
            .connect_timeout(self.connect_timeout)
            .command_timeout(self.command_timeout)
            .dangerous_accept_invalid_certs(self.accept_invalid_certs);
        if let Some(ref name) = self.hello_name {
            builder = builder.hello_name(name.clone());
        }

        builder.build()
    }
}

impl FromStr for Config {
    type Err = Error;

    /// Parses a configuration, relative paths staying relative to the
    /// working directory
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Config::parse(s, Path::new(""))
    }
}

/// Zero disables the timeout
fn timeout(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn body(
    inline: Option<String>,
    file: Option<PathBuf>,
    base: &Path,
    kind: &str,
) -> Result<String, Error> {
    match (inline, file) {
        (Some(text), None) => Ok(text),
        (None, Some(file)) => {
            let path = base.join(file);
            fs::read_to_string(&path).map_err(|e| {
                error::configuration(format!(
                    "cannot read {kind} body from {}: {e}",
                    path.display()
                ))
            })
        }
        (Some(_), Some(_)) => Err(error::configuration(format!(
            "set either `{kind}` or `{kind}_file`, not both"
        ))),
        (None, None) => Err(error::configuration(format!(
            "`{kind}` or `{kind}_file` is required"
        ))),
    }
}
