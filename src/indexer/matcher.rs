use std::collections::HashMap;

use alloy_primitives::U256;
use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use super::validator::TransferExpectation;
use crate::db::models::{QuestDefinition, QuestType};
use crate::store::canonical_address;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedQuest {
    pub quest_id: Uuid,
    pub quest_type: QuestType,
    pub expectation: TransferExpectation,
    pub created_at: DateTime<Utc>,
}

/// Contract address to active quest, rebuilt once per cycle.
#[derive(Debug, Clone, Default)]
pub struct QuestIndex {
    by_contract: HashMap<String, IndexedQuest>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(canonical_address)
}

/// SEND quests pin the recipient, RECEIVE quests pin the sender.
pub fn expectation_for(quest: &QuestDefinition) -> Result<TransferExpectation, String> {
    let value = match (quest.quest_type.is_erc20(), non_empty(&quest.amount)) {
        (true, Some(amount)) => Some(
            U256::from_str_radix(&amount, 10)
                .map_err(|e| format!("invalid amount {:?}: {}", amount, e))?,
        ),
        _ => None,
    };

    let expectation = if quest.quest_type.is_send() {
        TransferExpectation {
            from: None,
            to: non_empty(&quest.to_address),
            value,
        }
    } else {
        TransferExpectation {
            from: non_empty(&quest.from_address),
            to: None,
            value,
        }
    };

    Ok(expectation)
}

impl QuestIndex {
    pub fn build(quests: &[QuestDefinition]) -> Self {
        let mut by_contract: HashMap<String, IndexedQuest> = HashMap::new();

        for quest in quests {
            let contract = canonical_address(&quest.contract_address);
            if contract.is_empty() {
                warn!(quest_id = %quest.id, "Quest has no contract address, skipping");
                continue;
            }

            let expectation = match expectation_for(quest) {
                Ok(e) => e,
                Err(e) => {
                    warn!(quest_id = %quest.id, "Quest left out of index: {}", e);
                    continue;
                }
            };

            let entry = IndexedQuest {
                quest_id: quest.id,
                quest_type: quest.quest_type,
                expectation,
                created_at: quest.created_at,
            };

            match by_contract.get(&contract) {
                Some(existing) if existing.created_at > entry.created_at => {
                    warn!(
                        contract = %contract,
                        kept = %existing.quest_id,
                        ignored = %entry.quest_id,
                        "Multiple active quests on one contract, keeping the newest"
                    );
                }
                Some(existing) => {
                    warn!(
                        contract = %contract,
                        kept = %entry.quest_id,
                        ignored = %existing.quest_id,
                        "Multiple active quests on one contract, keeping the newest"
                    );
                    by_contract.insert(contract, entry);
                }
                None => {
                    by_contract.insert(contract, entry);
                }
            }
        }

        Self { by_contract }
    }

    pub fn lookup(&self, contract: &str) -> Option<&IndexedQuest> {
        self.by_contract.get(&canonical_address(contract))
    }

    /// Indexed contract addresses, sorted.
    pub fn addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.by_contract.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    pub fn len(&self) -> usize {
        self.by_contract.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_contract.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn quest(
        quest_type: QuestType,
        contract: &str,
        from: Option<&str>,
        to: Option<&str>,
        amount: Option<&str>,
    ) -> QuestDefinition {
        QuestDefinition {
            id: Uuid::new_v4(),
            quest_type,
            contract_address: contract.to_string(),
            from_address: from.map(str::to_string),
            to_address: to.map(str::to_string),
            amount: amount.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let q = quest(QuestType::SendErc20, "0xAbCd", None, Some("0xShop"), Some("1000"));
        let index = QuestIndex::build(&[q.clone()]);

        assert_eq!(index.lookup("0xABCD").map(|e| e.quest_id), Some(q.id));
        assert_eq!(index.addresses(), vec!["0xabcd".to_string()]);
        assert!(index.lookup("0xother").is_none());
    }

    #[test]
    fn test_send_and_receive_expectations() {
        let send = quest(
            QuestType::SendErc20,
            "0x1",
            Some("0xIgnored"),
            Some("0xShop"),
            Some("1000"),
        );
        let expectation = expectation_for(&send).unwrap();
        assert_eq!(expectation.from, None);
        assert_eq!(expectation.to.as_deref(), Some("0xshop"));
        assert_eq!(expectation.value, Some(U256::from(1000)));

        let receive = quest(QuestType::ReceiveNft, "0x2", Some("0xMinter"), None, Some("1"));
        let expectation = expectation_for(&receive).unwrap();
        assert_eq!(expectation.from.as_deref(), Some("0xminter"));
        assert_eq!(expectation.to, None);
        assert_eq!(expectation.value, None);
    }

    #[test]
    fn test_bad_amount_is_left_out() {
        let bad = quest(QuestType::SendErc20, "0x1", None, Some("0x2"), Some("1.5"));
        let index = QuestIndex::build(&[bad]);
        assert!(index.is_empty());
    }

    #[test]
    fn test_newest_quest_wins_shared_contract() {
        let mut older = quest(QuestType::SendErc20, "0xtoken", None, Some("0xa"), None);
        older.created_at = Utc::now() - Duration::hours(1);
        let newer = quest(QuestType::ReceiveErc20, "0xTOKEN", Some("0xb"), None, None);

        let index = QuestIndex::build(&[newer.clone(), older]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.lookup("0xtoken").map(|e| e.quest_id), Some(newer.id));
    }
}
