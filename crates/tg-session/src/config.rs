use anyhow::{Context, Result};
use tg_api_types::ContractAddress;

pub const CONTRACT_ADDRESS_VAR: &str = "TAMAGOTCHI_CONTRACT_ADDRESS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub contract_address: ContractAddress,
}

impl AppConfig {
    pub fn new(contract_address: &str) -> Result<Self> {
        let contract_address = tg_contract::parse_address(contract_address)
            .context("contract address must be a 20-byte hex string")?;
        Ok(Self { contract_address })
    }

    /// Reads `TAMAGOTCHI_CONTRACT_ADDRESS` from the process environment.
    pub fn from_env() -> Result<Self> {
        let raw = std::env::var(CONTRACT_ADDRESS_VAR)
            .with_context(|| format!("{CONTRACT_ADDRESS_VAR} is not set"))?;
        Self::new(&raw)
    }
}
