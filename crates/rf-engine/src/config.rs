// SPDX-License-Identifier: MIT

//! Engine configuration. Built once at startup from environment variables
//! with explicit defaults, then passed down to every component — never a
//! global/lazy-static (see the design note on ambient state in SPEC_FULL.md).

use std::collections::HashMap;
use std::time::Duration;

/// Run-level knobs recognized via environment variables (§6).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_parallel_sessions: usize,
    pub max_acu_per_session: u32,
    pub poll_interval: Duration,
    pub session_timeout: Duration,
    pub min_success_rate: f64,
    pub wave_size: usize,
    pub state_file_path: std::path::PathBuf,
    pub hybrid_mode: bool,
    pub connected_repos: Vec<String>,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_cooldown: Duration,
    pub max_retries: u32,
    pub retry_jitter_max: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parallel_sessions: 10,
            max_acu_per_session: 5,
            poll_interval: Duration::from_secs(20),
            session_timeout: Duration::from_secs(90 * 60),
            min_success_rate: 0.7,
            wave_size: 10,
            state_file_path: std::path::PathBuf::from("./state.json"),
            hybrid_mode: false,
            connected_repos: Vec::new(),
            circuit_breaker_threshold: 5,
            circuit_breaker_cooldown: Duration::from_secs(30),
            max_retries: 2,
            retry_jitter_max: Duration::from_secs(1),
        }
    }
}

impl EngineConfig {
    /// Load from the process environment, falling back to the documented
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        Self::from_map(&std::env::vars().collect())
    }

    /// Testable variant that reads from an explicit map instead of the
    /// process environment.
    pub fn from_map(vars: &HashMap<String, String>) -> Self {
        let defaults = Self::default();
        Self {
            max_parallel_sessions: parse_usize(vars, "MAX_PARALLEL_SESSIONS")
                .unwrap_or(defaults.max_parallel_sessions),
            max_acu_per_session: parse_u32(vars, "MAX_ACU_PER_SESSION")
                .unwrap_or(defaults.max_acu_per_session),
            poll_interval: parse_secs(vars, "POLL_INTERVAL_SECONDS").unwrap_or(defaults.poll_interval),
            session_timeout: parse_minutes(vars, "SESSION_TIMEOUT_MINUTES")
                .unwrap_or(defaults.session_timeout),
            min_success_rate: parse_f64(vars, "MIN_SUCCESS_RATE").unwrap_or(defaults.min_success_rate),
            wave_size: parse_usize(vars, "WAVE_SIZE").unwrap_or(defaults.wave_size),
            state_file_path: vars
                .get("STATE_FILE_PATH")
                .map(std::path::PathBuf::from)
                .unwrap_or(defaults.state_file_path),
            hybrid_mode: vars
                .get("HYBRID_MODE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.hybrid_mode),
            connected_repos: vars
                .get("CONNECTED_REPOS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or(defaults.connected_repos),
            circuit_breaker_threshold: parse_u32(vars, "CIRCUIT_BREAKER_THRESHOLD")
                .unwrap_or(defaults.circuit_breaker_threshold),
            circuit_breaker_cooldown: parse_secs(vars, "CIRCUIT_BREAKER_COOLDOWN_SECONDS")
                .unwrap_or(defaults.circuit_breaker_cooldown),
            max_retries: parse_u32(vars, "MAX_RETRIES").unwrap_or(defaults.max_retries),
            retry_jitter_max: parse_secs(vars, "RETRY_JITTER_MAX_SECONDS")
                .unwrap_or(defaults.retry_jitter_max),
        }
    }
}

fn parse_usize(vars: &HashMap<String, String>, key: &str) -> Option<usize> {
    vars.get(key)?.parse().ok()
}

fn parse_u32(vars: &HashMap<String, String>, key: &str) -> Option<u32> {
    vars.get(key)?.parse().ok()
}

fn parse_f64(vars: &HashMap<String, String>, key: &str) -> Option<f64> {
    vars.get(key)?.parse().ok()
}

fn parse_secs(vars: &HashMap<String, String>, key: &str) -> Option<Duration> {
    vars.get(key)?.parse::<u64>().ok().map(Duration::from_secs)
}

fn parse_minutes(vars: &HashMap<String, String>, key: &str) -> Option<Duration> {
    vars.get(key)?.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_vars_use_documented_defaults() {
        let config = EngineConfig::from_map(&HashMap::new());
        assert_eq!(config.wave_size, 10);
        assert_eq!(config.max_parallel_sessions, 10);
        assert_eq!(config.min_success_rate, 0.7);
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn overrides_are_applied() {
        let mut vars = HashMap::new();
        vars.insert("WAVE_SIZE".to_string(), "25".to_string());
        vars.insert("HYBRID_MODE".to_string(), "true".to_string());
        vars.insert("CONNECTED_REPOS".to_string(), "svc-a, svc-b".to_string());
        let config = EngineConfig::from_map(&vars);
        assert_eq!(config.wave_size, 25);
        assert!(config.hybrid_mode);
        assert_eq!(config.connected_repos, vec!["svc-a", "svc-b"]);
    }
}
