//! Registry routing contract addresses to the decoders responsible for them.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use primitive_types::H160;

use super::{Decoder, DecoderId};
use crate::error::DecodeError;

/// Address → ordered decoders index, built once per decoding session.
///
/// Several decoders may claim the same address; they run in registration
/// order. Once built the registry is only read, so it can be shared behind
/// an `Arc` by concurrent transaction decodings.
#[derive(Default)]
pub struct DecoderRegistry {
    /// Registered decoders, in registration order.
    decoders: Vec<Arc<dyn Decoder>>,
    /// Decoders indexed by the contract addresses they declared.
    by_address: HashMap<H160, Vec<Arc<dyn Decoder>>>,
    /// Names indexed by id, used to detect duplicate registrations.
    names: HashMap<DecoderId, String>,
}

impl DecoderRegistry {
    /// Create an empty decoder registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialise the registry with a predefined list of decoders.
    pub fn with_decoders(decoders: Vec<Arc<dyn Decoder>>) -> Result<Self, DecodeError> {
        let mut registry = Self::new();
        for decoder in decoders {
            registry.register(decoder)?;
        }
        Ok(registry)
    }

    /// Register a decoder under every address it declares.
    pub fn register(&mut self, decoder: Arc<dyn Decoder>) -> Result<(), DecodeError> {
        let name = decoder.decoder_name().to_string();
        let id = DecoderId::new(&name);
        if self.names.contains_key(&id) {
            return Err(DecodeError::DuplicateDecoder(name));
        }

        let addresses: BTreeSet<H160> = decoder.relevant_addresses().into_iter().collect();
        for address in &addresses {
            self.by_address
                .entry(*address)
                .or_default()
                .push(decoder.clone());
        }

        tracing::info!(
            target: "tally::registry",
            decoder = %name,
            addresses = addresses.len(),
            "registered decoder"
        );

        self.names.insert(id, name);
        self.decoders.push(decoder);
        Ok(())
    }

    /// Decoders responsible for logs emitted at `address` (empty if none).
    pub fn decoders_for(&self, address: &H160) -> &[Arc<dyn Decoder>] {
        self.by_address
            .get(address)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Borrow the registered decoders.
    pub fn decoders(&self) -> &[Arc<dyn Decoder>] {
        &self.decoders
    }

    /// Every counterparty any registered decoder may stamp.
    pub fn counterparties(&self) -> BTreeSet<String> {
        self.decoders
            .iter()
            .flat_map(|decoder| decoder.counterparties())
            .collect()
    }

    /// Contracts with at least one decoder.
    pub fn addresses(&self) -> impl Iterator<Item = &H160> {
        self.by_address.keys()
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field(
                "decoders",
                &self
                    .decoders
                    .iter()
                    .map(|d| d.decoder_name())
                    .collect::<Vec<_>>(),
            )
            .field("addresses", &self.by_address.len())
            .finish()
    }
}
