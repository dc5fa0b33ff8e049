//! Server configuration
//!
//! All knobs are read from the environment once at startup. Missing or
//! malformed values fall back to defaults, so a bare `cargo run` works.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port the HTTP/WebSocket server binds to
    pub port: u16,
    /// Hard wall-clock limit for a single grading subprocess
    pub grading_timeout: Duration,
    /// Interpreter used to run submitted solutions
    pub python_bin: String,
    /// Starting time on every player's clock when a game begins
    pub round_seconds: u64,
    /// Number of cards dealt to each player at game start
    pub hand_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            grading_timeout: Duration::from_secs(10),
            python_bin: "python3".to_string(),
            round_seconds: 300,
            hand_size: 5,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);
        let grading_timeout = std::env::var("GRADING_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.grading_timeout);
        let python_bin = std::env::var("PYTHON_BIN")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.python_bin);
        let round_seconds = std::env::var("ROUND_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.round_seconds);
        let hand_size = std::env::var("HAND_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.hand_size);

        Self {
            port,
            grading_timeout,
            python_bin,
            round_seconds,
            hand_size,
        }
    }
}
