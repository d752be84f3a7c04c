//! Aave v1 lending pool decoder (Deposit + RedeemUnderlying)

use std::collections::HashMap;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use primitive_types::{H160, H256};
use tally::{
    maybe_reshuffle_events, AccountingContext, ActionItem, DecodeError, Decoder, DecodingOutput,
    HistoryEvent, HistoryEventSubType, HistoryEventType, LogContext, RawLog, SettingsKey,
    TxEventSettings,
};
use tally_common::{
    address_from_word, checksum_address, data_word, format_amount, integer_from_bytes,
    AssetDescriptor, AssetResolver,
};

use crate::{
    AAVE_V1_LENDING_POOL, AAVE_V1_VERSION, CPT_AAVE_V1, DEPOSIT_TOPIC, REDEEM_UNDERLYING_TOPIC,
};

/// Lending pool events this decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PoolEvent {
    Deposit,
    RedeemUnderlying,
}

impl PoolEvent {
    fn from_signature(signature: Option<&H256>) -> Option<Self> {
        match signature? {
            s if *s == DEPOSIT_TOPIC => Some(Self::Deposit),
            s if *s == REDEEM_UNDERLYING_TOPIC => Some(Self::RedeemUnderlying),
            _ => None,
        }
    }
}

/// Fields shared by both pool events, with the assets already resolved.
#[derive(Debug)]
struct PoolAction {
    reserve: Arc<AssetDescriptor>,
    atoken: Arc<AssetDescriptor>,
    user: H160,
    amount: BigDecimal,
}

/// Aave v1 lending pool decoder
///
/// Both pool events share the same layout:
/// - topics[0]: event signature
/// - topics[1]: reserve address
/// - topics[2]: user address
/// - data[0..32]: raw amount (reserve decimals)
///
/// A deposit pairs the user's reserve `Spend` with the aToken `Receive`; a
/// redeem pairs the aToken `Spend` with the reserve `Receive`. Either side may
/// be missing, in which case the found side is still reclassified and no
/// correlation happens.
pub struct AaveV1Decoder {
    resolver: Arc<dyn AssetResolver>,
}

impl AaveV1Decoder {
    pub fn new(resolver: Arc<dyn AssetResolver>) -> Self {
        Self { resolver }
    }

    /// Read the log and resolve both assets.
    ///
    /// Returns `None` (abstain) when the reserve or its aToken is unknown.
    /// The reserve is resolved before the rest of the log is read.
    fn parse_pool_action(&self, log: &RawLog) -> Result<Option<PoolAction>, DecodeError> {
        let reserve_address = address_from_word(log.topic(1)?)?;
        let Some(reserve) = self.resolver.resolve_asset(&reserve_address) else {
            tracing::trace!(
                target: "tally_aave::decoder",
                reserve = %format!("{:#x}", reserve_address),
                log_index = log.log_index,
                "Unknown reserve, skipping pool event"
            );
            return Ok(None);
        };

        let user = address_from_word(log.topic(2)?)?;
        let raw_amount = integer_from_bytes(data_word(&log.data, 0)?)?;
        let amount = reserve.normalize(raw_amount);

        let Some(atoken) = self
            .resolver
            .derivative_token_for(&reserve, AAVE_V1_VERSION)
        else {
            tracing::trace!(
                target: "tally_aave::decoder",
                reserve = %reserve,
                log_index = log.log_index,
                "No aToken for reserve, skipping pool event"
            );
            return Ok(None);
        };

        Ok(Some(PoolAction {
            reserve,
            atoken,
            user,
            amount,
        }))
    }

    /// First unclaimed transfer of `asset` by the acting user, in list order.
    fn find_transfer(
        events: &[HistoryEvent],
        event_type: HistoryEventType,
        action: &PoolAction,
        asset: &AssetDescriptor,
    ) -> Option<usize> {
        events.iter().position(|event| {
            event.is_unclaimed()
                && event.is_transfer_of(event_type, &action.user, asset, &action.amount)
        })
    }

    fn decode_deposit(&self, action: &PoolAction, events: &mut [HistoryEvent]) -> DecodingOutput {
        let amount = format_amount(&action.amount);
        let user = checksum_address(&action.user);
        let deposit = Self::find_transfer(events, HistoryEventType::Spend, action, &action.reserve);
        let receive = Self::find_transfer(events, HistoryEventType::Receive, action, &action.atoken);

        if let Some(position) = deposit {
            events[position].reclassify(
                HistoryEventType::Deposit,
                HistoryEventSubType::DepositAsset,
                CPT_AAVE_V1,
                format!(
                    "Deposit {} {} to aave-v1 from {}",
                    amount, action.reserve.symbol, user
                ),
            );
        }
        if let Some(position) = receive {
            events[position].reclassify(
                HistoryEventType::Receive,
                HistoryEventSubType::ReceiveWrapped,
                CPT_AAVE_V1,
                format!(
                    "Receive {} {} from aave-v1 for {}",
                    amount, action.atoken.symbol, user
                ),
            );
        }

        maybe_reshuffle_events(events, deposit, receive);

        tracing::debug!(
            target: "tally_aave::decoder",
            user = %format!("{:#x}", action.user),
            reserve = %action.reserve.symbol,
            amount = %amount,
            deposit_found = deposit.is_some(),
            receive_found = receive.is_some(),
            "Decoded deposit"
        );
        DecodingOutput::none()
    }

    fn decode_redeem_underlying(
        &self,
        action: &PoolAction,
        events: &mut [HistoryEvent],
    ) -> DecodingOutput {
        let amount = format_amount(&action.amount);
        let withdrawal =
            Self::find_transfer(events, HistoryEventType::Receive, action, &action.reserve);
        let returned = Self::find_transfer(events, HistoryEventType::Spend, action, &action.atoken);

        if let Some(position) = withdrawal {
            events[position].reclassify(
                HistoryEventType::Withdrawal,
                HistoryEventSubType::RemoveAsset,
                CPT_AAVE_V1,
                format!("Withdraw {} {} from aave-v1", amount, action.reserve.symbol),
            );
        }
        if let Some(position) = returned {
            events[position].reclassify(
                HistoryEventType::Spend,
                HistoryEventSubType::ReturnWrapped,
                CPT_AAVE_V1,
                format!("Return {} {} to aave-v1", amount, action.atoken.symbol),
            );
        }

        maybe_reshuffle_events(events, returned, withdrawal);

        tracing::debug!(
            target: "tally_aave::decoder",
            user = %format!("{:#x}", action.user),
            reserve = %action.reserve.symbol,
            amount = %amount,
            withdrawal_found = withdrawal.is_some(),
            return_found = returned.is_some(),
            "Decoded redeem underlying"
        );
        DecodingOutput::none()
    }
}

impl Decoder for AaveV1Decoder {
    fn decoder_name(&self) -> &str {
        "aave_v1"
    }

    fn relevant_addresses(&self) -> Vec<H160> {
        vec![AAVE_V1_LENDING_POOL]
    }

    fn counterparties(&self) -> Vec<String> {
        vec![CPT_AAVE_V1.to_string()]
    }

    fn decode_log(
        &self,
        ctx: &LogContext<'_>,
        decoded_events: &mut Vec<HistoryEvent>,
        _action_items: &[ActionItem],
    ) -> Result<DecodingOutput, DecodeError> {
        let Some(pool_event) = PoolEvent::from_signature(ctx.log.signature()) else {
            return Ok(DecodingOutput::none());
        };

        let Some(action) = self.parse_pool_action(ctx.log)? else {
            return Ok(DecodingOutput::none());
        };

        Ok(match pool_event {
            PoolEvent::Deposit => self.decode_deposit(&action, decoded_events),
            PoolEvent::RedeemUnderlying => self.decode_redeem_underlying(&action, decoded_events),
        })
    }

    fn accounting_settings(
        &self,
        _context: &AccountingContext,
    ) -> HashMap<SettingsKey, TxEventSettings> {
        HashMap::from([
            (
                SettingsKey::new(
                    HistoryEventType::Deposit,
                    HistoryEventSubType::DepositAsset,
                    CPT_AAVE_V1,
                ),
                TxEventSettings::non_taxable_swap_pair(),
            ),
            (
                SettingsKey::new(
                    HistoryEventType::Spend,
                    HistoryEventSubType::ReturnWrapped,
                    CPT_AAVE_V1,
                ),
                TxEventSettings::non_taxable_swap_pair(),
            ),
        ])
    }
}
