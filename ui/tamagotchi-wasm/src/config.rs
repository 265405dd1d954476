//! Contract address lookup.
//!
//! Priority: `<meta name="tamagotchi-contract">` → `TAMAGOTCHI_CONTRACT_ADDRESS`
//! at build time.

use crate::dom;
use tg_session::{AppConfig, CONTRACT_ADDRESS_VAR};

const BUILD_CONTRACT_ADDRESS: Option<&str> = option_env!("TAMAGOTCHI_CONTRACT_ADDRESS");

pub fn load() -> Result<AppConfig, String> {
    let from_meta = dom::query(r#"meta[name="tamagotchi-contract"]"#)
        .and_then(|meta| meta.get_attribute("content"))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let raw = from_meta
        .or_else(|| BUILD_CONTRACT_ADDRESS.map(str::to_string))
        .ok_or_else(|| format!("contract address not configured; build with {CONTRACT_ADDRESS_VAR} set"))?;

    AppConfig::new(&raw).map_err(|e| format!("{e:#}"))
}
