//! Runtime settings, read from settings.json next to the binary.
//!
//! Every field has a dev-friendly default so the server (and the tests)
//! boot without a settings file. A present-but-broken file is a hard error.

use serde::Deserialize;
use std::fs;

const SETTINGS_FILENAME: &str = "settings.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind_address: String,
    pub port: u16,
    pub database_path: String,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            bind_address: "0.0.0.0".to_string(),
            port: 3003,
            database_path: "planning.redb".to_string(),
            jwt_secret: "dev-secret-change-in-production".to_string(),
            jwt_expiry_hours: 24,
        }
    }
}

impl Settings {
    pub fn load() -> Settings {
        match fs::read_to_string(SETTINGS_FILENAME) {
            Ok(content) => serde_json::from_str(&content)
                .unwrap_or_else(|e| panic!("Cannot parse {SETTINGS_FILENAME}: {e}")),
            Err(_) => Settings::default(),
        }
    }
}
