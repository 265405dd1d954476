use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct AccountId(pub String);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ContractAddress(pub String);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ChainId(pub String);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// How a contract method is executed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    /// State-mutating transaction, signed by the active account.
    Send,
    /// Read-only query, no authorization needed.
    Call,
}

/// The three user actions and the contract call each one maps to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Feed,
    Play,
    CheckHealth,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Feed, Action::Play, Action::CheckHealth];

    pub fn method(self) -> &'static str {
        match self {
            Action::Feed => "feed",
            Action::Play => "play",
            Action::CheckHealth => "checkHealth",
        }
    }

    pub fn kind(self) -> CallKind {
        match self {
            Action::Feed | Action::Play => CallKind::Send,
            Action::CheckHealth => CallKind::Call,
        }
    }

    /// Text shown after the call resolves. Read-only calls show the value as-is.
    pub fn success_text(self, value: &str) -> String {
        match self {
            Action::Feed => "You fed your Tamagotchi!".to_owned(),
            Action::Play => "You played with your Tamagotchi!".to_owned(),
            Action::CheckHealth => value.to_owned(),
        }
    }
}

/// Notifications pushed by the wallet provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<AccountId>),
    ChainChanged(ChainId),
}
