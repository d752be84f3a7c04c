pub mod action;
pub mod decoder;
pub mod diagnostics;
pub mod event;
pub mod pipeline;
pub mod reshuffle;
pub mod settings;

pub use action::{ActionItem, ActionQueue};
pub use decoder::{Decoder, DecoderId, DecoderRegistry, DecodingOutput, LogContext};
pub use diagnostics::{DecodingDiagnostics, TakeMismatch};
pub use event::{
    Balance, EvmTransaction, HistoryEvent, HistoryEventSubType, HistoryEventType, RawLog,
};
pub use pipeline::{AnnotatedEvent, DecodedTransaction, DecodingPipeline, TransactionInput};
pub use reshuffle::maybe_reshuffle_events;
pub use settings::{
    AccountingContext, AccountingMethod, AccountingSettings, MultitakeTreatment, SettingsKey,
    TxEventSettings,
};
