use std::{collections::HashMap, fs, path::Path, time::Duration};

use alloy_primitives::Address;
use anyhow::Context;
use serde::Deserialize;
use shared::domain::parse_address;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "ballot.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub rpc_url: String,
    pub contract_address: String,
    pub receipt_poll_interval_ms: u64,
    pub account_poll_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".into(),
            contract_address: "0x38f906D6ae2d7913b6219fe179cc5A3f4c2Eb6Fc".into(),
            receipt_poll_interval_ms: 1000,
            account_poll_interval_ms: 2000,
        }
    }
}

impl Settings {
    pub fn rpc_url(&self) -> anyhow::Result<Url> {
        Url::parse(self.rpc_url.trim())
            .with_context(|| format!("invalid rpc url '{}'", self.rpc_url))
    }

    pub fn contract_address(&self) -> anyhow::Result<Address> {
        parse_address(&self.contract_address)
            .with_context(|| format!("invalid contract address '{}'", self.contract_address))
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms.max(1))
    }

    pub fn account_poll_interval(&self) -> Duration {
        Duration::from_millis(self.account_poll_interval_ms.max(1))
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(DEFAULT_CONFIG_FILE))
}

/// Defaults, then the flat key/value file at `path` if it parses, then
/// environment overrides.
pub fn load_settings_from(path: &Path) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            apply_file(&mut settings, &file_cfg);
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file(settings: &mut Settings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("rpc_url") {
        settings.rpc_url = v.clone();
    }
    if let Some(v) = file_cfg.get("contract_address") {
        settings.contract_address = v.clone();
    }
    if let Some(v) = file_cfg.get("receipt_poll_interval_ms") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.receipt_poll_interval_ms = parsed;
        }
    }
    if let Some(v) = file_cfg.get("account_poll_interval_ms") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.account_poll_interval_ms = parsed;
        }
    }
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("BALLOT_RPC_URL") {
        settings.rpc_url = v;
    }
    if let Some(v) = var("APP__RPC_URL") {
        settings.rpc_url = v;
    }

    if let Some(v) = var("BALLOT_CONTRACT_ADDRESS") {
        settings.contract_address = v;
    }
    if let Some(v) = var("APP__CONTRACT_ADDRESS") {
        settings.contract_address = v;
    }

    if let Some(v) = var("APP__RECEIPT_POLL_INTERVAL_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.receipt_poll_interval_ms = parsed;
        }
    }
    if let Some(v) = var("APP__ACCOUNT_POLL_INTERVAL_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.account_poll_interval_ms = parsed;
        }
    }
}
