//! Runtime configuration of the detector: solver limits, witness shaping and the
//! addresses of the symbolic actors.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use ethnum::U256;
use serde::Deserialize;

pub const DEFAULT_CREATOR: &str = "0xAFFEAFFEAFFEAFFEAFFEAFFEAFFEAFFEAFFEAFFE";
pub const DEFAULT_ATTACKER: &str = "0xDEADBEEFDEADBEEFDEADBEEFDEADBEEFDEADBEEF";
pub const DEFAULT_SOMEGUY: &str = "0xAAAAAAAABBBBBBBBCCCCCCCCDDDDDDDDEEEEEEEE";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Per-query solver timeout, forwarded to z3 as the `timeout` parameter.
    pub solver_timeout_ms: u32,
    pub random_seed: u32,
    /// Upper bound on the calldata size of every witness transaction, in bytes.
    pub max_calldata_size: u64,
    /// Prefer the shortest calldata the path admits in witnesses.
    pub minimise_calldata_size: bool,
    pub minimise_call_value: bool,
    /// Mirrors the plugin's default-enabled flag; a disabled module reports nothing.
    pub enabled: bool,
    pub actors: ActorAddresses,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            solver_timeout_ms: 25_000,
            random_seed: 42,
            max_calldata_size: 5_000,
            minimise_calldata_size: true,
            minimise_call_value: true,
            enabled: true,
            actors: ActorAddresses::default(),
        }
    }
}

impl DetectorConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: DetectorConfig =
            serde_json::from_str(json).context("Failed to parse detector configuration")?;
        // Fail at load time rather than on the first analysed state.
        config.actors.resolve()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read detector configuration at {:?}", path))?;
        Self::from_json_str(&json)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ActorAddresses {
    pub creator: String,
    pub attacker: String,
    pub someguy: String,
}

impl Default for ActorAddresses {
    fn default() -> Self {
        ActorAddresses {
            creator: DEFAULT_CREATOR.to_string(),
            attacker: DEFAULT_ATTACKER.to_string(),
            someguy: DEFAULT_SOMEGUY.to_string(),
        }
    }
}

/// Actor addresses once parsed and range-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedActors {
    pub creator: U256,
    pub attacker: U256,
    pub someguy: U256,
}

impl ActorAddresses {
    pub fn resolve(&self) -> Result<ResolvedActors> {
        Ok(ResolvedActors {
            creator: parse_address(&self.creator).context("Invalid creator address")?,
            attacker: parse_address(&self.attacker).context("Invalid attacker address")?,
            someguy: parse_address(&self.someguy).context("Invalid someguy address")?,
        })
    }
}

/// Parses a `0x`-prefixed (or bare) hexadecimal address of at most 160 bits.
pub fn parse_address(text: &str) -> Result<U256> {
    let digits = text.trim();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(digits);
    if digits.is_empty() || digits.len() > 40 {
        return Err(anyhow!("'{}' is not a 160-bit hexadecimal address", text));
    }
    U256::from_str_radix(digits, 16)
        .map_err(|e| anyhow!("Failed to parse '{}' as a hexadecimal address: {}", text, e))
}
