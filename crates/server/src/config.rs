use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub data_dir: String,
    pub seed_sample_data: bool,
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:5000".into(),
            data_dir: "./Data".into(),
            seed_sample_data: false,
            max_body_bytes: 64 * 1024,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("server.toml") {
        apply_file_settings(&mut settings, &raw);
    }

    if let Ok(v) = std::env::var("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Ok(v) = std::env::var("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Ok(v) = std::env::var("DATA_DIR") {
        settings.data_dir = v;
    }
    if let Ok(v) = std::env::var("APP__DATA_DIR") {
        settings.data_dir = v;
    }

    if let Ok(v) = std::env::var("APP__SEED_SAMPLE_DATA") {
        if let Some(parsed) = parse_flag(&v) {
            settings.seed_sample_data = parsed;
        }
    }

    if let Ok(v) = std::env::var("APP__MAX_BODY_BYTES") {
        if let Ok(parsed) = v.parse::<usize>() {
            settings.max_body_bytes = parsed;
        }
    }

    settings
}

fn apply_file_settings(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, toml::Value>>(raw) else {
        return;
    };

    if let Some(v) = file_cfg.get("bind_addr").and_then(toml::Value::as_str) {
        settings.server_bind = v.to_string();
    }
    if let Some(v) = file_cfg.get("data_dir").and_then(toml::Value::as_str) {
        settings.data_dir = v.to_string();
    }
    if let Some(v) = file_cfg.get("seed_sample_data").and_then(toml::Value::as_bool) {
        settings.seed_sample_data = v;
    }
    if let Some(v) = file_cfg
        .get("max_body_bytes")
        .and_then(toml::Value::as_integer)
        .and_then(|v| usize::try_from(v).ok())
    {
        settings.max_body_bytes = v;
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn prepare_data_dir(raw_data_dir: &str) -> anyhow::Result<PathBuf> {
    let data_dir = normalize_data_dir(raw_data_dir);
    fs::create_dir_all(&data_dir).with_context(|| {
        format!("failed to create data directory '{}'", data_dir.display())
    })?;
    Ok(data_dir)
}

fn normalize_data_dir(raw_data_dir: &str) -> PathBuf {
    let raw_data_dir = raw_data_dir.trim();

    if raw_data_dir.is_empty() {
        return PathBuf::from(Settings::default().data_dir);
    }

    let raw_data_dir = raw_data_dir
        .strip_prefix("file://")
        .unwrap_or(raw_data_dir)
        .replace('\\', "/");
    Path::new(&raw_data_dir).to_path_buf()
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
