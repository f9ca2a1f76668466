//! Side-effect free checks of a decoded transfer against a quest's
//! expected parameters. Unset expected fields match anything.

use alloy_primitives::U256;

use super::types::{Erc20Transfer, NftTransfer};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferExpectation {
    pub from: Option<String>,
    pub to: Option<String>,
    pub value: Option<U256>,
}

fn address_matches(expected: &Option<String>, actual: &str) -> bool {
    expected
        .as_deref()
        .map_or(true, |e| e.trim().eq_ignore_ascii_case(actual.trim()))
}

pub fn erc20_matches(expected: &TransferExpectation, actual: &Erc20Transfer) -> bool {
    address_matches(&expected.from, &actual.from)
        && address_matches(&expected.to, &actual.to)
        && expected.value.map_or(true, |v| v == actual.value)
}

/// Token ids and values are not compared for NFT quests.
pub fn nft_matches(expected: &TransferExpectation, actual: &NftTransfer) -> bool {
    address_matches(&expected.from, &actual.from) && address_matches(&expected.to, &actual.to)
}
