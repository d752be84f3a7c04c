//! Decoding pipeline: routes each log of a transaction to its decoders,
//! settles deferred matches, orders the result and attaches accounting
//! settings.
//!
//! # Design
//!
//! - The pipeline owns the transaction's event list and lends it mutably to
//!   one decoder at a time; decoders never keep references past their call.
//! - Logs are processed in emission order; decoders for one address run in
//!   registration order.
//! - Nothing aborts a transaction: malformed logs are skipped, unmatched
//!   action items are dropped and missing settings leave events unannotated.
//!   All of these are reported through [`DecodingDiagnostics`].
//! - Transactions are independent. [`DecodingPipeline::decode_batch`] fans
//!   them out over the blocking pool while the registry and settings are
//!   shared read-only.

use std::sync::Arc;

use anyhow::Context;
use primitive_types::H256;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use super::action::ActionQueue;
use super::decoder::{Decoder, DecoderRegistry, LogContext};
use super::diagnostics::{DecodingDiagnostics, TakeMismatch};
use super::event::{EvmTransaction, HistoryEvent, RawLog};
use super::settings::{AccountingContext, AccountingSettings, SettingsKey, TxEventSettings};
use crate::error::DecodeError;

/// One transaction as handed over by the transfer extraction stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionInput {
    pub transaction: EvmTransaction,
    #[serde(default)]
    pub logs: Vec<RawLog>,
    /// Generic spend/receive events derived from the transaction's transfers.
    #[serde(default)]
    pub events: Vec<HistoryEvent>,
}

/// Final event with its accounting treatment, when one was resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedEvent {
    #[serde(flatten)]
    pub event: HistoryEvent,
    pub settings: Option<TxEventSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedTransaction {
    pub tx_hash: H256,
    /// Events sorted by sequence index.
    pub events: Vec<AnnotatedEvent>,
    pub diagnostics: DecodingDiagnostics,
}

pub struct DecodingPipeline {
    registry: Arc<DecoderRegistry>,
    settings: Arc<AccountingSettings>,
}

impl DecodingPipeline {
    pub fn new(registry: Arc<DecoderRegistry>, settings: Arc<AccountingSettings>) -> Self {
        Self { registry, settings }
    }

    /// Build the registry and the settings table for one session.
    pub fn build(
        decoders: Vec<Arc<dyn Decoder>>,
        context: &AccountingContext,
    ) -> Result<Self, DecodeError> {
        let registry = DecoderRegistry::with_decoders(decoders)?;
        let settings = AccountingSettings::build(&registry, context)?;

        for counterparty in settings.uncovered_counterparties(&registry) {
            tracing::warn!(
                target: "tally::pipeline",
                counterparty = %counterparty,
                "Counterparty has no accounting settings"
            );
        }

        Ok(Self::new(Arc::new(registry), Arc::new(settings)))
    }

    pub fn registry(&self) -> &DecoderRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &AccountingSettings {
        &self.settings
    }

    /// Decode a single transaction.
    pub fn decode_transaction(&self, input: TransactionInput) -> DecodedTransaction {
        let TransactionInput {
            transaction,
            logs,
            mut events,
        } = input;
        let tx_hash = transaction.tx_hash;
        let mut diagnostics = DecodingDiagnostics::default();
        let mut queue = ActionQueue::new();

        for (position, log) in logs.iter().enumerate() {
            queue.apply_eligible(&mut events, position);
            diagnostics.logs_processed += 1;

            let ctx = LogContext {
                log,
                transaction: &transaction,
                all_logs: &logs,
            };

            for decoder in self.registry.decoders_for(&log.address) {
                match decoder.decode_log(&ctx, &mut events, queue.pending()) {
                    Ok(output) => {
                        if let Some(event) = output.event {
                            push_synthesized(&mut events, event);
                        }
                        if let Some(item) = output.action_item {
                            queue.push(item, position);
                        }
                    }
                    Err(e) if e.is_malformed() => {
                        tracing::warn!(
                            target: "tally::pipeline",
                            tx_hash = %format!("{:#x}", tx_hash),
                            log_index = log.log_index,
                            decoder = decoder.decoder_name(),
                            error = %e,
                            "Skipping malformed log"
                        );
                        diagnostics.malformed_logs += 1;
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(
                            target: "tally::pipeline",
                            tx_hash = %format!("{:#x}", tx_hash),
                            log_index = log.log_index,
                            decoder = decoder.decoder_name(),
                            error = %e,
                            "Decoder failed"
                        );
                        diagnostics.decoder_failures += 1;
                    }
                }
            }
        }

        // Last chance for items emitted by the final log
        queue.apply_eligible(&mut events, logs.len());
        for item in queue.drain() {
            tracing::warn!(
                target: "tally::pipeline",
                tx_hash = %format!("{:#x}", tx_hash),
                emitted_by = item.sequence_index,
                asset = %format!("{:#x}", item.asset),
                amount = %item.amount,
                "Dropping unmatched action item"
            );
            diagnostics.dropped_action_items += 1;
        }

        events.sort_by_key(|event| event.sequence_index);
        let events = self.annotate(events, &mut diagnostics);

        diagnostics.record_metrics();
        tracing::debug!(
            target: "tally::pipeline",
            tx_hash = %format!("{:#x}", tx_hash),
            logs = logs.len(),
            events = events.len(),
            clean = diagnostics.is_clean(),
            "Decoded transaction"
        );

        DecodedTransaction {
            tx_hash,
            events,
            diagnostics,
        }
    }

    /// Decode independent transactions concurrently, keeping input order.
    ///
    /// At most `workers` transactions are decoded at the same time.
    pub async fn decode_batch(
        self: Arc<Self>,
        inputs: Vec<TransactionInput>,
        workers: usize,
    ) -> anyhow::Result<Vec<DecodedTransaction>> {
        let semaphore = Arc::new(Semaphore::new(workers.max(1)));
        let mut handles = Vec::with_capacity(inputs.len());

        for input in inputs {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .context("decoding semaphore closed")?;
            let pipeline = self.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                pipeline.decode_transaction(input)
            }));
        }

        let mut decoded = Vec::with_capacity(handles.len());
        for handle in handles {
            decoded.push(handle.await.context("decoding task failed")?);
        }
        Ok(decoded)
    }

    /// Attach settings to the ordered events and check take groups.
    ///
    /// An event whose settings have `take = N` heads a group: the next `N-1`
    /// events must carry the same counterparty and are consumed by the group
    /// (they get no settings of their own). An event that heads a group of
    /// its own never joins the open one; the open group is closed short.
    fn annotate(
        &self,
        events: Vec<HistoryEvent>,
        diagnostics: &mut DecodingDiagnostics,
    ) -> Vec<AnnotatedEvent> {
        let mut annotated = Vec::with_capacity(events.len());
        let mut group: Option<OpenGroup> = None;

        for event in events {
            let key = SettingsKey::for_event(&event);
            let resolved = self.settings.settings_for(&key);
            let heads_group = matches!(&resolved, Ok(settings) if settings.take > 1);

            if let Some(open) = group.as_mut() {
                if !heads_group
                    && event.counterparty.is_some()
                    && event.counterparty == open.counterparty
                {
                    open.remaining -= 1;
                    if open.remaining == 0 {
                        group = None;
                    }
                    annotated.push(AnnotatedEvent {
                        event,
                        settings: None,
                    });
                    continue;
                }
                if let Some(open) = group.take() {
                    record_take_mismatch(open, diagnostics);
                }
            }

            let settings = match resolved {
                Ok(settings) => Some(settings.clone()),
                Err(e) => {
                    // Generic transfers fall back to the downstream default
                    if event.counterparty.is_some() {
                        tracing::warn!(
                            target: "tally::pipeline",
                            sequence_index = event.sequence_index,
                            error = %e,
                            "Leaving event unannotated"
                        );
                        diagnostics.unresolved_settings_keys.push(key.clone());
                    }
                    None
                }
            };

            if let Some(settings) = &settings {
                if settings.take > 1 {
                    group = Some(OpenGroup {
                        head: event.sequence_index,
                        key,
                        counterparty: event.counterparty.clone(),
                        expected: settings.take,
                        remaining: settings.take - 1,
                    });
                }
            }

            annotated.push(AnnotatedEvent { event, settings });
        }

        if let Some(open) = group {
            record_take_mismatch(open, diagnostics);
        }
        annotated
    }
}

/// Take group still waiting for members.
struct OpenGroup {
    head: u32,
    key: SettingsKey,
    counterparty: Option<String>,
    expected: u32,
    remaining: u32,
}

fn record_take_mismatch(open: OpenGroup, diagnostics: &mut DecodingDiagnostics) {
    let mismatch = TakeMismatch {
        sequence_index: open.head,
        key: open.key,
        expected: open.expected,
        found: open.expected - open.remaining,
    };
    tracing::warn!(
        target: "tally::pipeline",
        sequence_index = mismatch.sequence_index,
        key = %mismatch.key,
        expected = mismatch.expected,
        found = mismatch.found,
        "Take group is incomplete"
    );
    diagnostics.take_mismatches.push(mismatch);
}

/// Append a decoder-synthesized event, moving it past the end of the
/// sequence when its index is already taken.
fn push_synthesized(events: &mut Vec<HistoryEvent>, mut event: HistoryEvent) {
    if events
        .iter()
        .any(|existing| existing.sequence_index == event.sequence_index)
    {
        let next = events
            .iter()
            .map(|existing| existing.sequence_index)
            .max()
            .map_or(0, |max| max + 1);
        tracing::debug!(
            target: "tally::pipeline",
            requested = event.sequence_index,
            assigned = next,
            "Sequence index taken, appending synthesized event"
        );
        event.sequence_index = next;
    }
    events.push(event);
}
