//! Forces a correlated outflow/inflow pair to be adjacent in the final order.
//!
//! Downstream accounting reads "spend immediately followed by receive" as one
//! exchange, so the two halves of a protocol action must not be separated by
//! unrelated transfers.

use super::event::HistoryEvent;

/// Move `inflow` right after `outflow` in sequence order.
///
/// Both arguments are positions in `events`. The existing set of sequence
/// indices is kept and reassigned to the new order, so events outside the
/// spliced range keep their index and every other event keeps its relative
/// order. A missing side, an out-of-range position or `outflow == inflow`
/// leaves the list untouched.
///
/// Returns whether any sequence index changed.
pub fn maybe_reshuffle_events(
    events: &mut [HistoryEvent],
    outflow: Option<usize>,
    inflow: Option<usize>,
) -> bool {
    let (Some(outflow), Some(inflow)) = (outflow, inflow) else {
        return false;
    };
    if outflow == inflow || outflow >= events.len() || inflow >= events.len() {
        tracing::trace!(
            target: "tally::reshuffle",
            outflow,
            inflow,
            len = events.len(),
            "skipping reshuffle"
        );
        return false;
    }

    let mut order: Vec<usize> = (0..events.len()).collect();
    order.sort_by_key(|&position| events[position].sequence_index);
    let slots: Vec<u32> = order
        .iter()
        .map(|&position| events[position].sequence_index)
        .collect();

    // Unlink the inflow, then splice it back after the outflow
    order.retain(|&position| position != inflow);
    let Some(anchor) = order.iter().position(|&position| position == outflow) else {
        return false;
    };
    order.insert(anchor + 1, inflow);

    let mut changed = false;
    for (position, slot) in order.into_iter().zip(slots) {
        if events[position].sequence_index != slot {
            events[position].sequence_index = slot;
            changed = true;
        }
    }

    if changed {
        tracing::trace!(
            target: "tally::reshuffle",
            outflow_index = events[outflow].sequence_index,
            inflow_index = events[inflow].sequence_index,
            "reshuffled correlated events"
        );
    }
    changed
}
