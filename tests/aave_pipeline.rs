//! End-to-end decoding of Aave v1 lending pool transactions.

use std::sync::Arc;

use primitive_types::{H160, H256, U256};
use tally::{
    AccountingContext, AnnotatedEvent, AssetDescriptor, DecodedTransaction, Decoder,
    DecodingPipeline, EvmTransaction, HistoryEvent, HistoryEventSubType, HistoryEventType,
    InMemoryAssetResolver, MultitakeTreatment, RawLog, SettingsKey, TakeMismatch, TransactionInput,
};
use tally_aave::{
    AaveV1Decoder, AaveV1Token, AaveV1Tokens, AAVE_V1_LENDING_POOL, CPT_AAVE_V1, DEPOSIT_TOPIC,
    REDEEM_UNDERLYING_TOPIC,
};
use tally_common::{parse_amount, word_from_integer};

const USER: H160 = H160::repeat_byte(0x0a);
const TX_HASH: H256 = H256::repeat_byte(0xab);

fn token(symbol: &str) -> &'static AaveV1Token {
    AaveV1Tokens::all()
        .iter()
        .find(|token| token.symbol == symbol)
        .unwrap()
}

fn pipeline() -> DecodingPipeline {
    let mut resolver = InMemoryAssetResolver::new();
    AaveV1Tokens::seed(&mut resolver);
    let decoders: Vec<Arc<dyn Decoder>> = vec![Arc::new(AaveV1Decoder::new(Arc::new(resolver)))];
    DecodingPipeline::build(decoders, &AccountingContext::default()).unwrap()
}

fn pool_log(log_index: u32, signature: H256, reserve: H160, raw_amount: &str) -> RawLog {
    RawLog {
        log_index,
        address: AAVE_V1_LENDING_POOL,
        topics: vec![signature, H256::from(reserve), H256::from(USER)],
        data: word_from_integer(U256::from_dec_str(raw_amount).unwrap()).to_vec(),
    }
}

fn transfer(
    index: u32,
    event_type: HistoryEventType,
    asset: AssetDescriptor,
    amount: &str,
) -> HistoryEvent {
    HistoryEvent::new(
        TX_HASH,
        index,
        event_type,
        Arc::new(asset),
        parse_amount(amount).unwrap(),
        Some(USER),
    )
    .with_timestamp(1_600_000_000_000)
}

fn input(logs: Vec<RawLog>, events: Vec<HistoryEvent>) -> TransactionInput {
    TransactionInput {
        transaction: EvmTransaction {
            tx_hash: TX_HASH,
            from_address: USER,
            to_address: Some(AAVE_V1_LENDING_POOL),
            timestamp: 1_600_000_000_000,
        },
        logs,
        events,
    }
}

fn classification(event: &AnnotatedEvent) -> (HistoryEventType, HistoryEventSubType) {
    (event.event.event_type, event.event.event_subtype)
}

fn assert_sorted(decoded: &DecodedTransaction) {
    let indices: Vec<u32> = decoded
        .events
        .iter()
        .map(|e| e.event.sequence_index)
        .collect();
    let mut sorted = indices.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(indices, sorted, "events must be sorted with unique indices");
}

#[test]
fn deposit_pair_is_adjacent_and_annotated() {
    let dai = token("DAI");
    let eth = token("ETH");
    let decoded = pipeline().decode_transaction(input(
        vec![pool_log(4, DEPOSIT_TOPIC, dai.reserve, "1000000000000000000000")],
        vec![
            transfer(0, HistoryEventType::Spend, eth.reserve_descriptor(), "0.01"),
            transfer(1, HistoryEventType::Spend, dai.reserve_descriptor(), "1000"),
            transfer(2, HistoryEventType::Receive, eth.reserve_descriptor(), "0.5"),
            transfer(3, HistoryEventType::Receive, dai.atoken_descriptor(), "1000"),
        ],
    ));

    assert_sorted(&decoded);
    assert!(decoded.diagnostics.is_clean());
    assert_eq!(decoded.diagnostics.logs_processed, 1);

    let deposit = decoded
        .events
        .iter()
        .position(|e| e.event.event_type == HistoryEventType::Deposit)
        .unwrap();
    let receive = &decoded.events[deposit + 1];
    assert_eq!(
        classification(&decoded.events[deposit]),
        (HistoryEventType::Deposit, HistoryEventSubType::DepositAsset)
    );
    assert_eq!(
        classification(receive),
        (HistoryEventType::Receive, HistoryEventSubType::ReceiveWrapped)
    );
    assert_eq!(
        receive.event.sequence_index,
        decoded.events[deposit].event.sequence_index + 1
    );

    assert_eq!(
        decoded.events[deposit].event.notes.as_deref(),
        Some("Deposit 1000.0 DAI to aave-v1 from 0x0A0A0a0a0a0a0a0A0a0a0A0a0A0A0A0a0a0a0a0a")
    );
    assert_eq!(
        receive.event.notes.as_deref(),
        Some("Receive 1000.0 aDAI from aave-v1 for 0x0A0A0a0a0a0a0a0A0a0a0A0a0A0A0A0a0a0a0a0a")
    );

    let settings = decoded.events[deposit].settings.as_ref().unwrap();
    assert_eq!(settings.take, 2);
    assert_eq!(settings.multitake_treatment, MultitakeTreatment::Swap);
    assert!(!settings.taxable);

    // The unrelated ETH receive now follows the pair
    let last = decoded.events.last().unwrap();
    assert_eq!(last.event.asset.symbol, "ETH");
    assert!(last.event.is_unclaimed());
}

#[test]
fn redeem_pair_returns_before_withdrawing() {
    let usdc = token("USDC");
    let decoded = pipeline().decode_transaction(input(
        vec![pool_log(9, REDEEM_UNDERLYING_TOPIC, usdc.reserve, "2500000")],
        vec![
            transfer(0, HistoryEventType::Receive, usdc.reserve_descriptor(), "2.5"),
            transfer(1, HistoryEventType::Spend, usdc.atoken_descriptor(), "2.5"),
        ],
    ));

    assert_sorted(&decoded);
    assert!(decoded.diagnostics.is_clean());
    assert_eq!(
        classification(&decoded.events[0]),
        (HistoryEventType::Spend, HistoryEventSubType::ReturnWrapped)
    );
    assert_eq!(
        decoded.events[0].event.notes.as_deref(),
        Some("Return 2.5 aUSDC to aave-v1")
    );
    assert_eq!(
        classification(&decoded.events[1]),
        (HistoryEventType::Withdrawal, HistoryEventSubType::RemoveAsset)
    );
    assert_eq!(
        decoded.events[1].event.notes.as_deref(),
        Some("Withdraw 2.5 USDC from aave-v1")
    );
    assert_eq!(decoded.events[0].settings.as_ref().map(|s| s.take), Some(2));
}

#[test]
fn lone_withdrawal_is_reported_not_dropped() {
    let dai = token("DAI");
    let decoded = pipeline().decode_transaction(input(
        vec![pool_log(
            0,
            REDEEM_UNDERLYING_TOPIC,
            dai.reserve,
            "1000000000000000000000",
        )],
        vec![transfer(
            0,
            HistoryEventType::Receive,
            dai.reserve_descriptor(),
            "1000",
        )],
    ));

    assert_eq!(
        classification(&decoded.events[0]),
        (HistoryEventType::Withdrawal, HistoryEventSubType::RemoveAsset)
    );
    assert!(decoded.events[0].settings.is_none());
    assert_eq!(
        decoded.diagnostics.unresolved_settings_keys,
        vec![SettingsKey::new(
            HistoryEventType::Withdrawal,
            HistoryEventSubType::RemoveAsset,
            CPT_AAVE_V1,
        )]
    );
}

#[test]
fn deposit_without_receive_does_not_swallow_next_deposit() {
    let dai = token("DAI");
    let decoded = pipeline().decode_transaction(input(
        vec![
            pool_log(0, DEPOSIT_TOPIC, dai.reserve, "1000000000000000000000"),
            pool_log(1, DEPOSIT_TOPIC, dai.reserve, "5000000000000000000"),
        ],
        vec![
            transfer(0, HistoryEventType::Spend, dai.reserve_descriptor(), "1000"),
            transfer(1, HistoryEventType::Spend, dai.reserve_descriptor(), "5"),
            transfer(2, HistoryEventType::Receive, dai.atoken_descriptor(), "5"),
        ],
    ));

    assert_sorted(&decoded);
    let kinds: Vec<_> = decoded.events.iter().map(classification).collect();
    assert_eq!(
        kinds,
        vec![
            (HistoryEventType::Deposit, HistoryEventSubType::DepositAsset),
            (HistoryEventType::Deposit, HistoryEventSubType::DepositAsset),
            (HistoryEventType::Receive, HistoryEventSubType::ReceiveWrapped),
        ]
    );

    // Both deposits head their own group
    let takes: Vec<_> = decoded
        .events
        .iter()
        .map(|e| e.settings.as_ref().map(|s| s.take))
        .collect();
    assert_eq!(takes, vec![Some(2), Some(2), None]);

    let deposit_key = SettingsKey::new(
        HistoryEventType::Deposit,
        HistoryEventSubType::DepositAsset,
        CPT_AAVE_V1,
    );
    assert_eq!(
        decoded.diagnostics.take_mismatches,
        vec![TakeMismatch {
            sequence_index: 0,
            key: deposit_key,
            expected: 2,
            found: 1,
        }]
    );
    assert!(decoded.diagnostics.unresolved_settings_keys.is_empty());
}

#[test]
fn malformed_log_does_not_stop_the_transaction() {
    let dai = token("DAI");
    let mut broken = pool_log(0, DEPOSIT_TOPIC, dai.reserve, "1");
    broken.topics.truncate(2);

    let decoded = pipeline().decode_transaction(input(
        vec![
            broken,
            pool_log(1, REDEEM_UNDERLYING_TOPIC, dai.reserve, "5000000000000000000"),
        ],
        vec![
            transfer(0, HistoryEventType::Spend, dai.atoken_descriptor(), "5"),
            transfer(1, HistoryEventType::Receive, dai.reserve_descriptor(), "5"),
        ],
    ));

    assert_eq!(decoded.diagnostics.malformed_logs, 1);
    assert_eq!(decoded.diagnostics.logs_processed, 2);
    assert!(decoded
        .events
        .iter()
        .all(|e| e.event.counterparty.as_deref() == Some(CPT_AAVE_V1)));
}

#[test]
fn logs_from_other_contracts_are_ignored() {
    let dai = token("DAI");
    let mut foreign = pool_log(0, DEPOSIT_TOPIC, dai.reserve, "1000000000000000000000");
    foreign.address = H160::repeat_byte(0x77);

    let decoded = pipeline().decode_transaction(input(
        vec![foreign],
        vec![
            transfer(0, HistoryEventType::Spend, dai.reserve_descriptor(), "1000"),
            transfer(1, HistoryEventType::Receive, dai.atoken_descriptor(), "1000"),
        ],
    ));

    assert!(decoded.events.iter().all(|e| e.event.is_unclaimed()));
    assert!(decoded.diagnostics.is_clean());
}

#[test]
fn decoded_transaction_serializes_flat_events() {
    let dai = token("DAI");
    let decoded = pipeline().decode_transaction(input(
        vec![pool_log(0, DEPOSIT_TOPIC, dai.reserve, "1000000000000000000000")],
        vec![
            transfer(0, HistoryEventType::Spend, dai.reserve_descriptor(), "1000"),
            transfer(1, HistoryEventType::Receive, dai.atoken_descriptor(), "1000"),
        ],
    ));

    let json = serde_json::to_value(&decoded).unwrap();
    let first = &json["events"][0];
    assert_eq!(first["event_type"], "deposit");
    assert_eq!(first["event_subtype"], "deposit asset");
    assert_eq!(first["counterparty"], "aave-v1");
    assert_eq!(first["settings"]["take"], 2);
    assert_eq!(first["settings"]["multitake_treatment"], "swap");
    assert!(json["events"][1]["settings"].is_null());
}

#[tokio::test]
async fn batch_decoding_matches_sequential_decoding() {
    let dai = token("DAI");
    let inputs: Vec<TransactionInput> = (0..16u32)
        .map(|i| {
            let raw = format!("{}000000000000000000", i + 1);
            let amount = (i + 1).to_string();
            input(
                vec![pool_log(0, DEPOSIT_TOPIC, dai.reserve, &raw)],
                vec![
                    transfer(0, HistoryEventType::Receive, dai.atoken_descriptor(), &amount),
                    transfer(1, HistoryEventType::Spend, dai.reserve_descriptor(), &amount),
                ],
            )
        })
        .collect();

    let shared = Arc::new(pipeline());
    let sequential: Vec<_> = inputs
        .iter()
        .cloned()
        .map(|tx| shared.decode_transaction(tx).events)
        .collect();
    let batched = shared.clone().decode_batch(inputs, 4).await.unwrap();

    assert_eq!(batched.len(), sequential.len());
    for (batch, expected) in batched.iter().zip(&sequential) {
        assert_eq!(&batch.events, expected);
        assert_eq!(
            classification(&batch.events[0]),
            (HistoryEventType::Deposit, HistoryEventSubType::DepositAsset)
        );
    }
}
