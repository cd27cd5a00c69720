use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Branch value meaning "whatever branch I last reported for this project".
pub const LAST_BRANCH_MARKER: &str = "<<LAST_BRANCH>>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    #[default]
    File,
    App,
    Domain,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::File => "file",
            EntityType::App => "app",
            EntityType::Domain => "domain",
        }
    }
}

/// One observation of coding activity, as it flows through the ingestion
/// pipeline and into storage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HeartBeat {
    pub user_id: String,
    pub entity: String,
    pub entity_type: EntityType,
    pub category: Option<String>,
    pub project: String,
    pub branch: String,
    pub language: String,
    pub is_write: bool,
    pub lines: Option<i32>,
    pub line_number: Option<i32>,
    pub cursor_position: Option<i32>,
    /// Client-side event time, not receipt time.
    pub time: Option<DateTime<Utc>>,
    pub user_agent: String,
    pub machine: String,
    pub operating_system: String,
    pub editor: String,
    /// Assigned during admission.
    pub hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub api_key: String,
    #[serde(default)]
    pub has_data: bool,
}

/// Heartbeat as sent by WakaTime-compatible clients.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HeartBeatJson {
    pub entity: Option<String>,
    #[serde(rename = "type")]
    pub entity_type: Option<EntityType>,
    pub category: Option<String>,
    pub project: Option<String>,
    pub branch: Option<String>,
    pub language: Option<String>,
    pub is_write: Option<bool>,
    pub lines: Option<i32>,
    pub lineno: Option<i32>,
    pub cursorpos: Option<i32>,
    /// Seconds since the epoch, fractional part carries milliseconds.
    pub time: Option<f64>,
    pub user_agent: Option<String>,
    pub machine: Option<String>,
}

impl From<HeartBeatJson> for HeartBeat {
    fn from(h: HeartBeatJson) -> Self {
        HeartBeat {
            user_id: String::new(),
            entity: h.entity.unwrap_or_default(),
            entity_type: h.entity_type.unwrap_or_default(),
            category: h.category,
            project: h.project.unwrap_or_default(),
            branch: h.branch.unwrap_or_default(),
            language: h.language.unwrap_or_default(),
            is_write: h.is_write.unwrap_or(false),
            lines: h.lines,
            line_number: h.lineno,
            cursor_position: h.cursorpos,
            time: h.time.and_then(epoch_seconds),
            user_agent: h.user_agent.unwrap_or_default(),
            machine: h.machine.unwrap_or_default(),
            operating_system: String::new(),
            editor: String::new(),
            hash: None,
        }
    }
}

fn epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    Utc.timestamp_millis_opt((secs * 1000.0).round() as i64).single()
}
