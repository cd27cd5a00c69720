//! Parsing of WakaTime client user agents.
//!
//! A typical value looks like
//! `wakatime/v1.73.0 (linux-6.1.0-generic-x86_64) go1.20.3 vscode/1.80.0 vscode-wakatime/24.2.0`.

use regex::Regex;
use std::sync::LazyLock;

static USER_AGENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:wakatime|chrome|firefox|edge)/(?:v?[\d+.]+|unset|<local-build>)\s\((\w+)-.*?\)\s.+\s([^/\s]+)-wakatime/(\S+)$",
    )
    .expect("invalid user agent pattern")
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAgentInfo {
    pub operating_system: String,
    pub editor: String,
    /// Version of the editor plugin.
    pub version: String,
}

/// Never fails; fields that cannot be resolved are left empty.
pub fn parse(user_agent: &str) -> UserAgentInfo {
    let caps = match USER_AGENT.captures(user_agent.trim()) {
        Some(c) => c,
        None => return UserAgentInfo::default(),
    };

    UserAgentInfo {
        operating_system: capitalize(&caps[1]),
        editor: caps[2].to_string(),
        version: caps[3].to_string(),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
