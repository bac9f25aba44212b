use anyhow::Result;
use config::{Config, Environment, File};
use ethers::types::{Address, U256};
use serde::Deserialize;
use sweep_core::config::plan::parse_amount;
use sweep_core::{Asset, EngineConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorityKind {
    Direct,
    Permit2,
}

fn default_authority_kind() -> AuthorityKind {
    AuthorityKind::Direct
}

fn default_ttl_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorityConfig {
    #[serde(default = "default_authority_kind")]
    pub kind: AuthorityKind,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            kind: default_authority_kind(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateConfig {
    pub from: Address,
    pub to: Address,
    pub numerator: String,
    pub denominator: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    pub address: Address,
    /// Target-asset balance the exchange pays out of.
    pub liquidity: String,
    #[serde(default)]
    pub rates: Vec<RateConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    pub address: Address,
    pub min_fee: String,
    pub destinations: Vec<u16>,
}

/// Starting balance; no `token` means native.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceSeed {
    pub account: Address,
    #[serde(default)]
    pub token: Option<Address>,
    pub amount: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllowanceSeed {
    pub owner: Address,
    pub spender: Address,
    pub token: Address,
    pub amount: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SweeperConfig {
    pub engine: EngineConfig,
    #[serde(default)]
    pub authority: AuthorityConfig,
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub bridge: Option<BridgeConfig>,
    #[serde(default)]
    pub clock: u64,
    #[serde(default)]
    pub balances: Vec<BalanceSeed>,
    #[serde(default)]
    pub allowances: Vec<AllowanceSeed>,
}

impl SweeperConfig {
    /// TOML file first, then `SWEEPER_*` overrides (`SWEEPER_ENGINE__MAX_BATCH_ENTRIES`).
    pub fn load(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("SWEEPER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: SweeperConfig = settings.try_deserialize().map_err(|e| anyhow::anyhow!(e))?;
        config.engine.validate()?;
        Ok(config)
    }
}

impl BalanceSeed {
    pub fn asset(&self) -> Asset {
        self.token.map(Asset::Token).unwrap_or(Asset::Native)
    }

    pub fn amount(&self) -> Result<U256> {
        Ok(parse_amount("balances.amount", &self.amount)?)
    }
}

impl AllowanceSeed {
    pub fn amount(&self) -> Result<U256> {
        Ok(parse_amount("allowances.amount", &self.amount)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONFIG: &str = r#"
clock = 1700000000

[engine]
engine_address = "0x00000000000000000000000000000000000000e0"
target_asset = "0x0000000000000000000000000000000000000009"
wrapped_native = "0x00000000000000000000000000000000000000ee"

[authority]
kind = "permit2"
ttl_secs = 120

[exchange]
address = "0x00000000000000000000000000000000000000d0"
liquidity = "1000000"

[[exchange.rates]]
from = "0x00000000000000000000000000000000000000ee"
to = "0x0000000000000000000000000000000000000009"
numerator = "2"
denominator = "1"

[bridge]
address = "0x00000000000000000000000000000000000000b0"
min_fee = "1"
destinations = [2, 30]

[[balances]]
account = "0x00000000000000000000000000000000000000a1"
amount = "1000"

[[balances]]
account = "0x00000000000000000000000000000000000000a1"
token = "0x0000000000000000000000000000000000000005"
amount = "40"
"#;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_full_config() {
        let file = write_config(CONFIG);
        let config = SweeperConfig::load(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.engine.max_batch_entries, sweep_core::MAX_BATCH_ENTRIES);
        assert_eq!(config.authority.kind, AuthorityKind::Permit2);
        assert_eq!(config.authority.ttl_secs, 120);
        assert_eq!(config.exchange.rates.len(), 1);
        assert_eq!(config.bridge.as_ref().unwrap().destinations, vec![2, 30]);
        assert_eq!(config.clock, 1_700_000_000);

        assert_eq!(config.balances[0].asset(), Asset::Native);
        assert_eq!(config.balances[0].amount().unwrap(), U256::from(1000));
        assert_eq!(
            config.balances[1].asset(),
            Asset::Token(Address::from_low_u64_be(5))
        );
    }

    #[test]
    fn test_invalid_engine_config_rejected() {
        let file = write_config(
            r#"
[engine]
engine_address = "0x00000000000000000000000000000000000000e0"
target_asset = "0x0000000000000000000000000000000000000009"
wrapped_native = "0x00000000000000000000000000000000000000ee"
max_batch_entries = 64

[exchange]
address = "0x00000000000000000000000000000000000000d0"
liquidity = "0"
"#,
        );

        let err = SweeperConfig::load(file.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("max_batch_entries"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(SweeperConfig::load("does/not/exist.toml").is_err());
    }
}
