use std::path::PathBuf;
use std::time::Duration;

use crate::game::EngineConfig;

/// Server configuration, read from the environment with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub stats_path: PathBuf,
    pub engine: EngineConfig,
}

impl Config {
    pub fn from_env() -> Self {
        let bind_addr =
            std::env::var("MAFIA_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let stats_path = std::env::var("MAFIA_STATS_FILE")
            .unwrap_or_else(|_| "data/stats.json".to_string())
            .into();

        let mut engine = EngineConfig::default();
        if let Some(secs) = env_secs("MAFIA_NIGHT_WINDOW_SECS") {
            engine.night_window = Duration::from_secs(secs);
        }
        if let Some(secs) = env_secs("MAFIA_DAY_WINDOW_SECS") {
            engine.day_window = Duration::from_secs(secs);
        }

        Self {
            bind_addr,
            stats_path,
            engine,
        }
    }
}

fn env_secs(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        // Not driven through real env vars to keep tests independent of the
        // process environment.
        let engine = EngineConfig::default();
        assert_eq!(engine.night_window, Duration::from_secs(30));
        assert_eq!(engine.day_window, Duration::from_secs(60));
    }

    #[test]
    fn env_secs_ignores_garbage() {
        assert_eq!(env_secs("MAFIA_TEST_UNSET_VARIABLE"), None);
    }
}
