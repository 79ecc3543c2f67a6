//! Loads the read-only configuration files under `config_dir` (§6.5):
//! `org.json`, `people.json`, `platforms.json`, `secrets.json`. Parsing
//! these is explicitly out of scope for `cae_core` (its own doc
//! comments say so); this binary owns it since it's the one piece of
//! the system that actually reads credentials off disk.

use std::path::Path;

use anyhow::{Context, Result};
use cae_core::{ConfigBundle, SecretRecord};
use cae_protocol::config::{OrgRecord, PersonRecord, PlatformRecord};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SecretFileEntry {
    platform_key: cae_ids::PlatformKey,
    username: String,
    password: String,
}

fn read_json<T: serde::de::DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

pub fn load(config_dir: &Path) -> Result<ConfigBundle> {
    let orgs: Vec<OrgRecord> = read_json(&config_dir.join("org.json"))?;
    let people: Vec<PersonRecord> = read_json(&config_dir.join("people.json"))?;
    let platforms: Vec<PlatformRecord> = read_json(&config_dir.join("platforms.json"))?;
    let secret_entries: Vec<SecretFileEntry> = read_json(&config_dir.join("secrets.json"))?;
    let secrets = secret_entries
        .into_iter()
        .map(|s| SecretRecord {
            platform_key: s.platform_key,
            username: s.username,
            password: s.password,
        })
        .collect();

    Ok(ConfigBundle { orgs, people, platforms, secrets })
}
