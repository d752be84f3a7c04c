//! Structured, non-fatal findings collected while decoding a transaction.

use serde::{Deserialize, Serialize};

use super::settings::SettingsKey;

/// An event whose settings expect `expected` grouped events, but fewer
/// correlated events follow it in the final order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakeMismatch {
    pub sequence_index: u32,
    pub key: SettingsKey,
    pub expected: u32,
    pub found: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodingDiagnostics {
    pub logs_processed: usize,
    pub malformed_logs: usize,
    pub decoder_failures: usize,
    pub dropped_action_items: usize,
    pub unresolved_settings_keys: Vec<SettingsKey>,
    pub take_mismatches: Vec<TakeMismatch>,
}

impl DecodingDiagnostics {
    /// Nothing worth an offline review happened.
    pub fn is_clean(&self) -> bool {
        self.malformed_logs == 0
            && self.decoder_failures == 0
            && self.dropped_action_items == 0
            && self.unresolved_settings_keys.is_empty()
            && self.take_mismatches.is_empty()
    }

    /// Fold another transaction's diagnostics into this one.
    pub fn merge(&mut self, other: &DecodingDiagnostics) {
        self.logs_processed += other.logs_processed;
        self.malformed_logs += other.malformed_logs;
        self.decoder_failures += other.decoder_failures;
        self.dropped_action_items += other.dropped_action_items;
        self.unresolved_settings_keys
            .extend(other.unresolved_settings_keys.iter().cloned());
        self.take_mismatches
            .extend(other.take_mismatches.iter().cloned());
    }

    /// Publish the counters through the `metrics` facade.
    pub fn record_metrics(&self) {
        metrics::counter!("tally_logs_decoded_total").increment(self.logs_processed as u64);
        metrics::counter!("tally_logs_malformed_total").increment(self.malformed_logs as u64);
        metrics::counter!("tally_decoder_failures_total").increment(self.decoder_failures as u64);
        metrics::counter!("tally_action_items_dropped_total")
            .increment(self.dropped_action_items as u64);
        metrics::counter!("tally_settings_unresolved_total")
            .increment(self.unresolved_settings_keys.len() as u64);
        metrics::counter!("tally_take_mismatch_total")
            .increment(self.take_mismatches.len() as u64);
    }
}
