// Re-export the raw log type for convenience
pub use crate::clients::evm_rpc::RawLog;

use alloy_primitives::U256;
use std::fmt;
use uuid::Uuid;

/// Decoded ERC-20 `Transfer`. Addresses are canonical lower-case hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Erc20Transfer {
    pub from: String,
    pub to: String,
    pub value: U256,
}

/// Decoded ERC-721 `Transfer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NftTransfer {
    pub from: String,
    pub to: String,
    pub token_id: U256,
}

/// Decoded claimer `Claimed` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedEvent {
    pub quest_id: Uuid,
    pub user: String,
    pub token: String,
    pub amount: U256,
    pub timestamp: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    UnknownContract,
    Undecodable,
    UserNotFound,
    QuestNotInClaim,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::UnknownContract => "unknown_contract",
            SkipReason::Undecodable => "undecodable",
            SkipReason::UserNotFound => "user_not_found",
            SkipReason::QuestNotInClaim => "quest_not_in_claim",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a handler did with one log. Errors are reported separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Advanced,
    Mismatch,
    Skipped(SkipReason),
}
