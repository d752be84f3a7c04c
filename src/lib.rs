//! Tally - EVM transaction history decoding.
//!
//! Turns the generic transfer events of a transaction into protocol-aware
//! accounting events. Protocol decoders register for the contracts they know,
//! reclassify transfers in place and declare how the resulting events are
//! accounted. The [`DecodingPipeline`] drives them log by log.

pub mod decoding;
pub mod error;

pub use decoding::{
    maybe_reshuffle_events, AccountingContext, AccountingMethod, AccountingSettings, ActionItem,
    AnnotatedEvent, Balance, DecodedTransaction, Decoder, DecoderId, DecoderRegistry,
    DecodingDiagnostics, DecodingOutput, DecodingPipeline, EvmTransaction, HistoryEvent,
    HistoryEventSubType, HistoryEventType, LogContext, MultitakeTreatment, RawLog, SettingsKey,
    TakeMismatch, TransactionInput, TxEventSettings,
};
pub use error::DecodeError;

// Re-export the codec layer for decoder authors
pub use tally_common;
pub use tally_common::{AssetDescriptor, AssetResolver, CodecError, InMemoryAssetResolver};
