use core::fmt;

use serde::{Deserialize, Serialize};

const URL: &str = "sqlite://mutes.db?mode=rwc";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DbConfig {
    pub url: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self { url: default_url() }
    }
}

impl fmt::Display for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Database Configuration: Url = {}", self.url)
    }
}

fn default_url() -> String {
    URL.to_string()
}
