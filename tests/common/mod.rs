use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

use wk_ingest::config::HeartBeatLimits;
use wk_ingest::db::memory::MemoryDb;
use wk_ingest::model::User;
use wk_ingest::pipeline::Pipeline;

pub const USER_ID: &str = "alice";
pub const API_KEY: &str = "4f8a2c1e-0b1d-4d2a-9f7e-3c5b6a7d8e9f";

pub const VSCODE_UA: &str =
    "wakatime/v1.73.0 (linux-6.1.0-generic-x86_64) go1.20.3 vscode/1.80.0 vscode-wakatime/24.2.0";
#[allow(dead_code)]
pub const VIM_MAC_UA: &str =
    "wakatime/v1.73.0 (darwin-22.5.0-arm64) go1.20.3 vim/9.0 vim-wakatime/11.1.0";

#[allow(dead_code)]
pub fn test_user() -> User {
    User {
        id: USER_ID.to_string(),
        api_key: API_KEY.to_string(),
        has_data: false,
    }
}

/// In-memory store with one user who has not sent anything yet.
pub fn test_db() -> MemoryDb {
    let db = MemoryDb::new();
    db.add_user(User {
        id: USER_ID.to_string(),
        api_key: API_KEY.to_string(),
        has_data: false,
    });
    db
}

pub fn test_limits() -> HeartBeatLimits {
    HeartBeatLimits {
        max_age: Duration::days(30),
        max_future: Duration::minutes(10),
    }
}

pub fn test_pipeline(db: &MemoryDb) -> Arc<Pipeline<MemoryDb, MemoryDb>> {
    Arc::new(Pipeline::new(db.clone(), db.clone(), test_limits()))
}

#[allow(dead_code)]
pub fn auth_header() -> String {
    format!("Basic {}", base64::encode(API_KEY))
}

/// A heartbeat as a client would send it, a minute old.
#[allow(dead_code)]
pub fn heartbeat_json(entity: &str) -> Value {
    let time = (Utc::now() - Duration::minutes(1)).timestamp_millis() as f64 / 1000.0;
    json!({
        "entity": entity,
        "type": "file",
        "category": "coding",
        "project": "wk",
        "branch": "main",
        "language": "Rust",
        "is_write": true,
        "lines": 120,
        "lineno": 12,
        "cursorpos": 4,
        "time": time,
    })
}
