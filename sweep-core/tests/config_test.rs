use ethers::types::{Address, U256};
use std::sync::Arc;
use sweep_core::{
    Asset, BatchProcessor, ConfigError, EngineConfig, FixedRateExchange, InMemoryLedger,
    JsonPlanFile, Ledger, PlanLoader, Rate, MAX_BATCH_ENTRIES,
};

fn addr(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

#[test]
fn test_engine_config_defaults_batch_limit() {
    let json = r#"{
        "engine_address": "0x00000000000000000000000000000000000000e0",
        "target_asset": "0x0000000000000000000000000000000000000009",
        "wrapped_native": "0x00000000000000000000000000000000000000ee"
    }"#;

    let config: EngineConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.max_batch_entries, MAX_BATCH_ENTRIES);
    assert_eq!(config.engine_address, addr(0xE0));
    assert!(config.validate().is_ok());
}

#[test]
fn test_engine_config_rejects_zero_addresses() {
    let config = EngineConfig::new(addr(0xE0), Address::zero(), addr(0xEE));
    assert_eq!(
        config.validate().unwrap_err(),
        ConfigError::MissingField {
            field: "target_asset".to_string()
        }
    );
}

#[test]
fn test_engine_config_batch_limit_bounds() {
    let base = EngineConfig::new(addr(0xE0), addr(0x09), addr(0xEE));

    assert!(base.clone().with_max_batch_entries(1).validate().is_ok());
    assert!(base
        .clone()
        .with_max_batch_entries(MAX_BATCH_ENTRIES)
        .validate()
        .is_ok());

    for invalid in [0, MAX_BATCH_ENTRIES + 1] {
        let err = base
            .clone()
            .with_max_batch_entries(invalid)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref field, .. } if field == "max_batch_entries"
        ));
    }
}

#[tokio::test]
async fn test_plan_file_runs_through_processor() {
    let plan = r#"{
        "requester": "0x00000000000000000000000000000000000000a1",
        "supplied_native": "10",
        "entries": [
            {
                "kind": "native",
                "amount": "4",
                "path": [
                    "0x00000000000000000000000000000000000000ee",
                    "0x0000000000000000000000000000000000000009"
                ]
            },
            {
                "kind": "native",
                "path": [
                    "0x00000000000000000000000000000000000000ee",
                    "0x0000000000000000000000000000000000000009"
                ],
                "min_output": "12"
            }
        ]
    }"#;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plan.json");
    tokio::fs::write(&path, plan).await.unwrap();

    let resolved = JsonPlanFile::new(&path)
        .load_plan()
        .await
        .unwrap()
        .resolve()
        .unwrap();

    let config = EngineConfig::new(addr(0xE0), addr(0x09), addr(0xEE));
    let exchange = FixedRateExchange::new(addr(0xD0), addr(0x09), addr(0xEE))
        .with_rate(addr(0xEE), addr(0x09), Rate::new(2, 1));
    let processor = BatchProcessor::new(config, Arc::new(exchange));

    let mut ledger = InMemoryLedger::new();
    ledger
        .mint(resolved.requester, Asset::Native, U256::from(10))
        .unwrap();
    ledger
        .mint(addr(0xD0), Asset::Token(addr(0x09)), U256::from(100))
        .unwrap();

    let receipt = processor
        .process(
            &mut ledger,
            resolved.requester,
            &resolved.request,
            resolved.supplied_native,
        )
        .unwrap();

    assert_eq!(receipt.total_output, U256::from(20));
    assert_eq!(
        ledger.balance_of(resolved.requester, Asset::Token(addr(0x09))),
        U256::from(20)
    );
}
