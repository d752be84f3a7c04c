pub mod registry;

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use primitive_types::H160;

use super::action::ActionItem;
use super::event::{EvmTransaction, HistoryEvent, RawLog};
use super::settings::{AccountingContext, SettingsKey, TxEventSettings};
use crate::error::DecodeError;

pub use registry::DecoderRegistry;

/// Everything a decoder may read about the log it is asked to decode.
#[derive(Debug, Clone, Copy)]
pub struct LogContext<'a> {
    pub log: &'a RawLog,
    pub transaction: &'a EvmTransaction,
    /// Every log of the transaction, in emission order.
    pub all_logs: &'a [RawLog],
}

/// What a decoder hands back to the pipeline for one log.
///
/// Reclassification of existing events happens through the mutable event
/// list and is not reported here.
#[derive(Debug, Clone, Default)]
pub struct DecodingOutput {
    /// Newly synthesized event (not backed by a transfer).
    pub event: Option<HistoryEvent>,
    /// Deferred match for an event that has not been seen yet.
    pub action_item: Option<ActionItem>,
}

impl DecodingOutput {
    /// The decoder abstained or only mutated existing events.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_event(event: HistoryEvent) -> Self {
        Self {
            event: Some(event),
            action_item: None,
        }
    }

    pub fn with_action_item(action_item: ActionItem) -> Self {
        Self {
            event: None,
            action_item: Some(action_item),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.event.is_none() && self.action_item.is_none()
    }
}

/// Protocol decoder: recognizes logs emitted at its contracts and
/// reclassifies the transfer events they explain.
///
/// # Design
/// Decoders are responsible for:
/// - Declaring the contract addresses whose logs they handle.
/// - Dispatching on `topics[0]` (the event signature), returning
///   [`DecodingOutput::none`] for signatures they don't know.
/// - Mutating matching events of `decoded_events` in place. An event that
///   already carries a counterparty was claimed by another decoder and must
///   not be touched again, which also makes decoding the same log twice a
///   no-op.
/// - Declaring accounting settings for every classification they can emit.
///
/// Decoding is synchronous and must not perform I/O: asset lookups go
/// through a resolver that was filled before decoding started.
///
/// # Example
///
/// ```rust,ignore
/// impl Decoder for MyDecoder {
///     fn decoder_name(&self) -> &str {
///         "my_protocol"
///     }
///
///     fn relevant_addresses(&self) -> Vec<H160> {
///         vec![MY_POOL]
///     }
///
///     fn counterparties(&self) -> Vec<String> {
///         vec!["my-protocol".to_string()]
///     }
///
///     fn decode_log(
///         &self,
///         ctx: &LogContext<'_>,
///         decoded_events: &mut Vec<HistoryEvent>,
///         _action_items: &[ActionItem],
///     ) -> Result<DecodingOutput, DecodeError> {
///         match MyEvent::from_signature(ctx.log.signature()) {
///             Some(MyEvent::Deposit) => self.decode_deposit(ctx, decoded_events),
///             None => Ok(DecodingOutput::none()),
///         }
///     }
///
///     fn accounting_settings(
///         &self,
///         _context: &AccountingContext,
///     ) -> HashMap<SettingsKey, TxEventSettings> {
///         HashMap::new()
///     }
/// }
/// ```
pub trait Decoder: Send + Sync {
    /// Unique, stable name of this decoder (used in logs and as `DecoderId`).
    fn decoder_name(&self) -> &str;

    /// Contracts whose logs this decoder handles. Must not change while the
    /// decoder is registered.
    fn relevant_addresses(&self) -> Vec<H160>;

    /// Protocol identifiers this decoder may stamp as counterparty.
    fn counterparties(&self) -> Vec<String>;

    /// Decode one log against the events decoded so far for the transaction.
    fn decode_log(
        &self,
        ctx: &LogContext<'_>,
        decoded_events: &mut Vec<HistoryEvent>,
        action_items: &[ActionItem],
    ) -> Result<DecodingOutput, DecodeError>;

    /// Accounting treatment of everything this decoder can emit.
    fn accounting_settings(
        &self,
        context: &AccountingContext,
    ) -> HashMap<SettingsKey, TxEventSettings>;
}

/// Decoder identifier based on decoder name hash
///
/// Deterministic across restarts and independent of registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DecoderId(u64);

impl DecoderId {
    /// Creates a DecoderId from a decoder name (deterministic)
    pub fn new(name: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        DecoderId(hasher.finish())
    }

    /// Returns the DecoderId as a u64
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}
