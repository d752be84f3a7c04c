//! Raw transaction input and the decoded history events built from it.

use std::fmt;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use primitive_types::{H160, H256};
use serde::{Deserialize, Serialize};
use tally_common::{AssetDescriptor, CodecError};

/// A receipt log exactly as emitted by a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLog {
    pub log_index: u32,
    pub address: H160,
    pub topics: Vec<H256>,
    #[serde(with = "tally_common::serde_hex")]
    pub data: Vec<u8>,
}

impl RawLog {
    /// Event signature (`topics[0]`), if the log is not anonymous.
    pub fn signature(&self) -> Option<&H256> {
        self.topics.first()
    }

    /// Borrow a topic word, failing when the log has fewer topics.
    pub fn topic(&self, index: usize) -> Result<&[u8], CodecError> {
        self.topics
            .get(index)
            .map(H256::as_bytes)
            .ok_or(CodecError::MalformedLogData {
                field: "topics",
                expected: index + 1,
                actual: self.topics.len(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmTransaction {
    pub tx_hash: H256,
    pub from_address: H160,
    pub to_address: Option<H160>,
    /// Milliseconds since epoch.
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryEventType {
    Trade,
    Staking,
    Deposit,
    Withdrawal,
    Transfer,
    Spend,
    Receive,
    Adjustment,
    Unknown,
    Informational,
    Migrate,
    Renew,
}

impl HistoryEventType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trade => "trade",
            Self::Staking => "staking",
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Transfer => "transfer",
            Self::Spend => "spend",
            Self::Receive => "receive",
            Self::Adjustment => "adjustment",
            Self::Unknown => "unknown",
            Self::Informational => "informational",
            Self::Migrate => "migrate",
            Self::Renew => "renew",
        }
    }
}

impl fmt::Display for HistoryEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryEventSubType {
    Reward,
    #[serde(rename = "deposit asset")]
    DepositAsset,
    #[serde(rename = "remove asset")]
    RemoveAsset,
    Fee,
    Spend,
    Receive,
    Approve,
    Deploy,
    Airdrop,
    Bridge,
    Governance,
    Generate,
    #[serde(rename = "return wrapped")]
    ReturnWrapped,
    #[serde(rename = "receive wrapped")]
    ReceiveWrapped,
    Donate,
    Nft,
    #[serde(rename = "place order")]
    PlaceOrder,
    None,
}

impl HistoryEventSubType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reward => "reward",
            Self::DepositAsset => "deposit asset",
            Self::RemoveAsset => "remove asset",
            Self::Fee => "fee",
            Self::Spend => "spend",
            Self::Receive => "receive",
            Self::Approve => "approve",
            Self::Deploy => "deploy",
            Self::Airdrop => "airdrop",
            Self::Bridge => "bridge",
            Self::Governance => "governance",
            Self::Generate => "generate",
            Self::ReturnWrapped => "return wrapped",
            Self::ReceiveWrapped => "receive wrapped",
            Self::Donate => "donate",
            Self::Nft => "nft",
            Self::PlaceOrder => "place order",
            Self::None => "none",
        }
    }
}

impl fmt::Display for HistoryEventSubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Balance {
    pub amount: BigDecimal,
    #[serde(default)]
    pub usd_value: BigDecimal,
}

impl Balance {
    pub fn new(amount: BigDecimal) -> Self {
        Self {
            amount,
            usd_value: BigDecimal::default(),
        }
    }
}

/// Accounting event decoded from a transaction.
///
/// Events arrive as generic `Spend`/`Receive` transfers and are reclassified
/// in place by protocol decoders. `sequence_index` is unique per transaction
/// and defines the final ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    /// Hash of the transaction the event belongs to.
    pub event_identifier: H256,
    pub sequence_index: u32,
    pub timestamp: u64,
    pub location_label: Option<H160>,
    pub asset: Arc<AssetDescriptor>,
    pub balance: Balance,
    #[serde(default)]
    pub notes: Option<String>,
    pub event_type: HistoryEventType,
    pub event_subtype: HistoryEventSubType,
    #[serde(default)]
    pub counterparty: Option<String>,
}

impl HistoryEvent {
    /// Generic transfer event, as produced before any protocol decoding.
    pub fn new(
        event_identifier: H256,
        sequence_index: u32,
        event_type: HistoryEventType,
        asset: Arc<AssetDescriptor>,
        amount: BigDecimal,
        location_label: Option<H160>,
    ) -> Self {
        Self {
            event_identifier,
            sequence_index,
            timestamp: 0,
            location_label,
            asset,
            balance: Balance::new(amount),
            notes: None,
            event_type,
            event_subtype: HistoryEventSubType::None,
            counterparty: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// True while no protocol decoder has stamped a counterparty on the event.
    pub fn is_unclaimed(&self) -> bool {
        self.counterparty.is_none()
    }

    /// Exact-party, exact-asset, exact-amount predicate used for matching
    /// transfers against protocol logs.
    pub fn is_transfer_of(
        &self,
        event_type: HistoryEventType,
        party: &H160,
        asset: &AssetDescriptor,
        amount: &BigDecimal,
    ) -> bool {
        self.event_type == event_type
            && self.location_label.as_ref() == Some(party)
            && self.asset.address == asset.address
            && &self.balance.amount == amount
    }

    /// Reclassify the event in place.
    pub fn reclassify(
        &mut self,
        event_type: HistoryEventType,
        event_subtype: HistoryEventSubType,
        counterparty: &str,
        notes: String,
    ) {
        self.event_type = event_type;
        self.event_subtype = event_subtype;
        self.counterparty = Some(counterparty.to_string());
        self.notes = Some(notes);
    }
}
