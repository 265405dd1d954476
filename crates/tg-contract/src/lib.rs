//! Interface descriptor for the Tamagotchi contract.
//!
//! Calls are looked up by method name so the provider layer can stay
//! generic over which button was pressed.

use alloy_primitives::{Address, Bytes};
use alloy_sol_types::{SolCall, sol};
use std::str::FromStr;
use tg_api_types::ContractAddress;
use thiserror::Error;

sol! {
    interface ITamagotchi {
        function feed() external;
        function play() external;
        function checkHealth() external view returns (string memory);
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContractError {
    #[error("unknown contract method: {0}")]
    UnknownMethod(String),
    #[error("could not decode {method} output: {reason}")]
    Decode { method: String, reason: String },
    #[error("invalid contract address '{0}'")]
    InvalidAddress(String),
}

/// ABI-encode a zero-argument call to `method`.
pub fn encode_call(method: &str) -> Result<Bytes, ContractError> {
    let data = match method {
        "feed" => ITamagotchi::feedCall {}.abi_encode(),
        "play" => ITamagotchi::playCall {}.abi_encode(),
        "checkHealth" => ITamagotchi::checkHealthCall {}.abi_encode(),
        other => return Err(ContractError::UnknownMethod(other.to_owned())),
    };
    Ok(Bytes::from(data))
}

/// Decode the return data of `method` into display text.
///
/// Methods without outputs decode to an empty string.
pub fn decode_output(method: &str, data: &[u8]) -> Result<String, ContractError> {
    match method {
        "feed" | "play" => Ok(String::new()),
        "checkHealth" => ITamagotchi::checkHealthCall::abi_decode_returns(data).map_err(|e| {
            ContractError::Decode {
                method: method.to_owned(),
                reason: e.to_string(),
            }
        }),
        other => Err(ContractError::UnknownMethod(other.to_owned())),
    }
}

/// Validate a 20-byte hex address and normalise it to EIP-55 checksum form.
pub fn parse_address(raw: &str) -> Result<ContractAddress, ContractError> {
    let trimmed = raw.trim();
    let address =
        Address::from_str(trimmed).map_err(|_| ContractError::InvalidAddress(trimmed.to_owned()))?;
    Ok(ContractAddress(address.to_checksum(None)))
}
