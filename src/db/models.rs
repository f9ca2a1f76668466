use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Chains the indexer keeps a cursor for, matching the `blockchain_network` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "blockchain_network", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Arbitrum,
    Zetachain,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Arbitrum => "arbitrum",
            Network::Zetachain => "zetachain",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "arbitrum" => Ok(Network::Arbitrum),
            "zetachain" => Ok(Network::Zetachain),
            other => Err(format!("unknown network: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "quest_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestType {
    SendErc20,
    ReceiveErc20,
    SendNft,
    ReceiveNft,
}

impl QuestType {
    pub fn is_erc20(&self) -> bool {
        matches!(self, QuestType::SendErc20 | QuestType::ReceiveErc20)
    }

    /// SEND quests credit the sender, RECEIVE quests the recipient.
    pub fn is_send(&self) -> bool {
        matches!(self, QuestType::SendErc20 | QuestType::SendNft)
    }
}

/// Per-user quest progress, matching the `quest_status` enum.
///
/// Legal transitions are `InProgress -> Claim -> Completed`; everything else
/// is rejected before touching the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "quest_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    InProgress,
    Claim,
    Completed,
}

impl QuestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestStatus::InProgress => "in_progress",
            QuestStatus::Claim => "claim",
            QuestStatus::Completed => "completed",
        }
    }

    pub fn next(&self) -> Option<QuestStatus> {
        match self {
            QuestStatus::InProgress => Some(QuestStatus::Claim),
            QuestStatus::Claim => Some(QuestStatus::Completed),
            QuestStatus::Completed => None,
        }
    }

    pub fn can_advance_to(&self, to: QuestStatus) -> bool {
        self.next() == Some(to)
    }
}

impl fmt::Display for QuestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub wallet_address: String,
}

/// Quest definition as read from the registry. Soft-deleted quests never
/// leave the store.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuestDefinition {
    pub id: Uuid,
    pub quest_type: QuestType,
    pub contract_address: String,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    /// Decimal string, exact match against the transferred value.
    pub amount: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserQuest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub quest_id: Uuid,
    pub status: QuestStatus,
}

/// Append-only audit row written once per reconciled claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClaimRecord {
    pub user_id: Uuid,
    pub quest_id: Uuid,
    pub amount: String,
    pub token: String,
    pub timestamp: i64,
    pub tx_hash: String,
}

/// One user row of the balance ranking, highest balance first.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct RankedBalance {
    pub user_id: Uuid,
    pub wallet_address: String,
    pub balance: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceStats {
    pub total_users: i64,
    pub total_balance: String,
    pub average_balance: String,
}
