//! Deferred matching directives.
//!
//! A decoder that recognizes a protocol action before the transfer it explains
//! has been seen returns an [`ActionItem`]. The pipeline keeps those in a
//! per-transaction [`ActionQueue`] and applies them to later events; whatever
//! is still pending when the transaction ends is dropped.

use bigdecimal::BigDecimal;
use primitive_types::H160;
use serde::{Deserialize, Serialize};

use super::event::{HistoryEvent, HistoryEventSubType, HistoryEventType};
use super::reshuffle::maybe_reshuffle_events;

/// Reclassify the first unclaimed event matching `from_*` into `to_*`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
    /// Log index of the log that produced the directive.
    pub sequence_index: u32,
    pub from_event_type: HistoryEventType,
    pub from_event_subtype: HistoryEventSubType,
    /// Contract address of the expected asset.
    pub asset: H160,
    pub amount: BigDecimal,
    /// Restrict the match to one acting party.
    pub location_label: Option<H160>,
    pub to_event_type: Option<HistoryEventType>,
    pub to_event_subtype: Option<HistoryEventSubType>,
    pub to_notes: Option<String>,
    pub to_counterparty: Option<String>,
    /// Sequence index of an already decoded outflow to correlate the matched
    /// event with.
    pub paired_event_index: Option<u32>,
}

impl ActionItem {
    pub fn matches(&self, event: &HistoryEvent) -> bool {
        event.is_unclaimed()
            && event.event_type == self.from_event_type
            && event.event_subtype == self.from_event_subtype
            && event.asset.address == self.asset
            && event.balance.amount == self.amount
            && self
                .location_label
                .as_ref()
                .map_or(true, |label| event.location_label.as_ref() == Some(label))
    }

    fn apply(&self, event: &mut HistoryEvent) {
        if let Some(event_type) = self.to_event_type {
            event.event_type = event_type;
        }
        if let Some(event_subtype) = self.to_event_subtype {
            event.event_subtype = event_subtype;
        }
        if let Some(notes) = &self.to_notes {
            event.notes = Some(notes.clone());
        }
        if let Some(counterparty) = &self.to_counterparty {
            event.counterparty = Some(counterparty.clone());
        }
    }
}

/// Pending action items of one transaction.
#[derive(Debug, Default)]
pub struct ActionQueue {
    items: Vec<ActionItem>,
    /// Position of the log that emitted each item.
    emitted_at: Vec<usize>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: ActionItem, log_position: usize) {
        self.items.push(item);
        self.emitted_at.push(log_position);
    }

    /// Items not consumed yet, in emission order.
    pub fn pending(&self) -> &[ActionItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Apply every item emitted before `log_position` that finds a match.
    ///
    /// Candidates are scanned in sequence order and the first match wins.
    /// Returns the number of consumed items.
    pub fn apply_eligible(&mut self, events: &mut [HistoryEvent], log_position: usize) -> usize {
        let mut consumed = 0;
        let mut index = 0;

        while index < self.items.len() {
            if self.emitted_at[index] >= log_position {
                index += 1;
                continue;
            }

            let item = &self.items[index];
            let matched = (0..events.len())
                .filter(|&position| item.matches(&events[position]))
                .min_by_key(|&position| events[position].sequence_index);

            let Some(matched) = matched else {
                index += 1;
                continue;
            };

            item.apply(&mut events[matched]);
            if let Some(paired) = item.paired_event_index {
                let outflow = events
                    .iter()
                    .position(|event| event.sequence_index == paired);
                maybe_reshuffle_events(events, outflow, Some(matched));
            }

            tracing::trace!(
                target: "tally::action",
                emitted_by = item.sequence_index,
                matched = events[matched].sequence_index,
                "consumed action item"
            );

            self.items.remove(index);
            self.emitted_at.remove(index);
            consumed += 1;
        }

        consumed
    }

    /// Take the unconsumed items, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<ActionItem> {
        self.emitted_at.clear();
        std::mem::take(&mut self.items)
    }
}
