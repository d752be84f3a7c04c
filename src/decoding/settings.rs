//! Accounting treatment per (event type, event subtype, counterparty).
//!
//! Every decoder declares the treatment of each combination it can produce.
//! The table is rebuilt once per accounting session from those declarations
//! and is read-only afterwards.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::decoder::DecoderRegistry;
use super::event::{HistoryEvent, HistoryEventSubType, HistoryEventType};
use crate::error::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountingMethod {
    Spend,
    Acquisition,
}

/// How a group of `take` correlated events is accounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MultitakeTreatment {
    None,
    Swap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxEventSettings {
    pub taxable: bool,
    pub count_entire_amount_spend: bool,
    pub count_cost_basis_pnl: bool,
    pub method: AccountingMethod,
    /// Number of consecutive events consumed as one unit.
    pub take: u32,
    pub multitake_treatment: MultitakeTreatment,
}

impl TxEventSettings {
    /// Non-taxable pair of events accounted as one swap (wrap/unwrap style).
    pub fn non_taxable_swap_pair() -> Self {
        Self {
            taxable: false,
            count_entire_amount_spend: false,
            count_cost_basis_pnl: false,
            method: AccountingMethod::Spend,
            take: 2,
            multitake_treatment: MultitakeTreatment::Swap,
        }
    }
}

/// Composite lookup key of the settings table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SettingsKey {
    pub event_type: HistoryEventType,
    pub event_subtype: HistoryEventSubType,
    pub counterparty: Option<String>,
}

impl SettingsKey {
    pub fn new(
        event_type: HistoryEventType,
        event_subtype: HistoryEventSubType,
        counterparty: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            event_subtype,
            counterparty: Some(counterparty.into()),
        }
    }

    pub fn for_event(event: &HistoryEvent) -> Self {
        Self {
            event_type: event.event_type,
            event_subtype: event.event_subtype,
            counterparty: event.counterparty.clone(),
        }
    }
}

impl fmt::Display for SettingsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.event_type,
            self.event_subtype,
            self.counterparty.as_deref().unwrap_or("-")
        )
    }
}

/// Session-scoped inputs decoders may consult when declaring settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountingContext {
    pub include_crypto2crypto: bool,
    pub include_gas_costs: bool,
}

impl Default for AccountingContext {
    fn default() -> Self {
        Self {
            include_crypto2crypto: true,
            include_gas_costs: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AccountingSettings {
    table: HashMap<SettingsKey, TxEventSettings>,
}

impl AccountingSettings {
    /// Collect the declarations of every registered decoder.
    ///
    /// Two decoders claiming the same key, or a take of zero, fail the build.
    pub fn build(
        registry: &DecoderRegistry,
        context: &AccountingContext,
    ) -> Result<Self, DecodeError> {
        let mut table = HashMap::new();

        for decoder in registry.decoders() {
            for (key, settings) in decoder.accounting_settings(context) {
                if settings.take == 0 {
                    return Err(DecodeError::InvalidTake(key));
                }
                if table.contains_key(&key) {
                    return Err(DecodeError::DuplicateSettingsKey {
                        key,
                        decoder: decoder.decoder_name().to_string(),
                    });
                }
                table.insert(key, settings);
            }
        }

        tracing::info!(
            target: "tally::settings",
            entries = table.len(),
            decoders = registry.decoders().len(),
            "built accounting settings"
        );

        Ok(Self { table })
    }

    pub fn settings_for(&self, key: &SettingsKey) -> Result<&TxEventSettings, DecodeError> {
        self.table
            .get(key)
            .ok_or_else(|| DecodeError::UnknownSettingsKey(key.clone()))
    }

    /// Counterparties some decoder may stamp but no settings key covers.
    pub fn uncovered_counterparties(&self, registry: &DecoderRegistry) -> Vec<String> {
        let covered: BTreeSet<&str> = self
            .table
            .keys()
            .filter_map(|key| key.counterparty.as_deref())
            .collect();

        registry
            .counterparties()
            .into_iter()
            .filter(|counterparty| !covered.contains(counterparty.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
