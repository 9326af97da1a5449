//! Transaction flow types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a keyed transaction flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxnStatus {
    #[default]
    Initial,
    Pending,
    Issued,
    Rejected,
    Error,
    Expired,
    Success,
}

impl TxnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxnStatus::Initial => "initial",
            TxnStatus::Pending => "pending",
            TxnStatus::Issued => "issued",
            TxnStatus::Rejected => "rejected",
            TxnStatus::Error => "error",
            TxnStatus::Expired => "expired",
            TxnStatus::Success => "success",
        }
    }

    /// Terminal states only leave through an explicit clear.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TxnStatus::Success | TxnStatus::Rejected | TxnStatus::Expired | TxnStatus::Error
        )
    }
}

impl fmt::Display for TxnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message handed to the wallet signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub destination: String,
    /// Value in nano units
    pub amount: u128,
    pub payload: Option<Vec<u8>>,
    pub state_init: Option<Vec<u8>>,
}

impl OutgoingMessage {
    pub fn new(destination: impl Into<String>, amount: u128) -> Self {
        Self {
            destination: destination.into(),
            amount,
            payload: None,
            state_init: None,
        }
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_state_init(mut self, state_init: Vec<u8>) -> Self {
        self.state_init = Some(state_init);
        self
    }
}

/// What the wallet did with a send request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerOutcome {
    Issued,
    Rejected,
}

/// Account lifecycle state as reported by the chain reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountState {
    Active,
    Uninitialized,
    Frozen,
}

/// Contract state snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractState {
    pub code: Option<Vec<u8>>,
    pub data: Option<Vec<u8>>,
    pub state: AccountState,
}

impl ContractState {
    pub fn is_deployed(&self) -> bool {
        self.state == AccountState::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!TxnStatus::Initial.is_terminal());
        assert!(!TxnStatus::Pending.is_terminal());
        assert!(!TxnStatus::Issued.is_terminal());
        for status in [
            TxnStatus::Success,
            TxnStatus::Rejected,
            TxnStatus::Expired,
            TxnStatus::Error,
        ] {
            assert!(status.is_terminal(), "{status}");
        }
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(serde_json::to_string(&TxnStatus::Issued).unwrap(), "\"issued\"");
        assert_eq!(TxnStatus::default(), TxnStatus::Initial);
    }
}
