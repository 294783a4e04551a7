use crate::logger::MessageLogMode;
use crate::{Error, Result};

/// Gateway EUID tokens are always 16 characters.
pub const TOKEN_LENGTH: usize = 16;

pub const DEFAULT_GATEWAY_NAME: &str = "Salus iT600 Gateway";

/// Setup-time configuration: where the gateway lives and how to talk to it.
/// Validated before any connection attempt.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub token: String,
    pub name: String,
    pub message_log: Option<(MessageLogMode, String)>,
}

impl GatewayConfig {
    pub fn new(host: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            token: token.into(),
            name: DEFAULT_GATEWAY_NAME.to_string(),
            message_log: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.message_log = Some((mode, path.into()));
        self
    }

    pub fn validate(&self) -> Result<()> {
        let len = self.token.chars().count();
        if len != TOKEN_LENGTH {
            return Err(Error::InvalidToken(len));
        }
        Ok(())
    }
}
