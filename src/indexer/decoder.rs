//! Typed decoding of raw EVM logs.
//!
//! ERC-20 and ERC-721 `Transfer` share a signature hash; they are told apart
//! by topic count (three for ERC-20, four for ERC-721 where the token id is
//! indexed). A log that does not fit the expected shape decodes to `None`.

use alloy_primitives::{Address, B256};
use alloy_sol_types::{sol, SolEvent};
use uuid::Uuid;

use super::types::{ClaimedEvent, Erc20Transfer, NftTransfer, RawLog};

sol! {
    interface IERC20 {
        event Transfer(address indexed from, address indexed to, uint256 value);
    }

    interface IERC721 {
        event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);
    }

    interface IQuestClaimer {
        event Claimed(
            string questId,
            address indexed user,
            address indexed token,
            uint256 amount,
            uint256 timestamp
        );
    }
}

const ERC20_TRANSFER_TOPICS: usize = 3;
const ERC721_TRANSFER_TOPICS: usize = 4;
const CLAIMED_TOPICS: usize = 3;

/// Signature hash shared by both `Transfer` shapes.
pub fn transfer_topic() -> B256 {
    IERC20::Transfer::SIGNATURE_HASH
}

pub fn claimed_topic() -> B256 {
    IQuestClaimer::Claimed::SIGNATURE_HASH
}

fn format_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

fn has_shape(log: &RawLog, signature: B256, topics: usize) -> bool {
    log.topics.len() == topics && log.topics.first() == Some(&signature)
}

pub fn decode_erc20_transfer(log: &RawLog) -> Option<Erc20Transfer> {
    if !has_shape(log, IERC20::Transfer::SIGNATURE_HASH, ERC20_TRANSFER_TOPICS) {
        return None;
    }

    let event =
        IERC20::Transfer::decode_raw_log(log.topics.iter().copied(), &log.data, true).ok()?;

    Some(Erc20Transfer {
        from: format_address(&event.from),
        to: format_address(&event.to),
        value: event.value,
    })
}

pub fn decode_nft_transfer(log: &RawLog) -> Option<NftTransfer> {
    if !has_shape(log, IERC721::Transfer::SIGNATURE_HASH, ERC721_TRANSFER_TOPICS) {
        return None;
    }

    let event =
        IERC721::Transfer::decode_raw_log(log.topics.iter().copied(), &log.data, true).ok()?;

    Some(NftTransfer {
        from: format_address(&event.from),
        to: format_address(&event.to),
        token_id: event.tokenId,
    })
}

pub fn decode_claimed(log: &RawLog) -> Option<ClaimedEvent> {
    if !has_shape(log, IQuestClaimer::Claimed::SIGNATURE_HASH, CLAIMED_TOPICS) {
        return None;
    }

    let event =
        IQuestClaimer::Claimed::decode_raw_log(log.topics.iter().copied(), &log.data, true)
            .ok()?;
    let quest_id = Uuid::parse_str(event.questId.trim()).ok()?;

    Some(ClaimedEvent {
        quest_id,
        user: format_address(&event.user),
        token: format_address(&event.token),
        amount: event.amount,
        timestamp: event.timestamp,
    })
}
