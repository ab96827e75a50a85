use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::capture::{InjectionRetry, PollSchedule};
use crate::recording::{DEFAULT_FIELD_KEYWORDS, DEFAULT_SUBMIT_KEYWORDS};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub recorder: RecorderConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", 8765),
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            recorder: RecorderConfig::from_env(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8765,
            host: "127.0.0.1".to_string(),
            recorder: RecorderConfig::default(),
        }
    }
}

/// Per-session engine settings. Requests may override `headless`,
/// `continue_on_error` and the output path.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub headless: bool,
    pub output_dir: PathBuf,
    pub poll: PollSchedule,
    pub injection: InjectionRetry,
    pub submit_keywords: Vec<String>,
    pub field_keywords: Vec<String>,
    pub continue_on_error: bool,
    pub step_timeout: Duration,
    pub ready_timeout: Duration,
    pub step_delay: Duration,
    pub cursor_travel: Duration,
    /// A navigation this soon after a recorded click/press is its consequence
    pub navigation_follow: Duration,
    /// Idle gaps at least this long are recorded as `wait` actions
    pub wait_threshold: Option<Duration>,
    pub autosave: bool,
    pub screenshots: bool,
}

impl RecorderConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let wait_threshold_ms: u64 = env_parse("DOM_REPLAY_WAIT_THRESHOLD_MS", 0);

        Self {
            headless: env_parse("DOM_REPLAY_HEADLESS", defaults.headless),
            output_dir: env::var("DOM_REPLAY_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            poll: PollSchedule {
                burst_interval: env_millis("DOM_REPLAY_POLL_BURST_MS", defaults.poll.burst_interval),
                steady_interval: env_millis("DOM_REPLAY_POLL_STEADY_MS", defaults.poll.steady_interval),
                burst_polls: env_parse("DOM_REPLAY_POLL_BURST_COUNT", defaults.poll.burst_polls),
            },
            injection: InjectionRetry {
                max_attempts: env_parse("DOM_REPLAY_INJECT_ATTEMPTS", defaults.injection.max_attempts).max(1),
                backoff: env_millis("DOM_REPLAY_INJECT_BACKOFF_MS", defaults.injection.backoff),
            },
            submit_keywords: env_list("DOM_REPLAY_SUBMIT_KEYWORDS").unwrap_or(defaults.submit_keywords),
            field_keywords: env_list("DOM_REPLAY_FIELD_KEYWORDS").unwrap_or(defaults.field_keywords),
            continue_on_error: env_parse("DOM_REPLAY_CONTINUE_ON_ERROR", defaults.continue_on_error),
            step_timeout: env_millis("DOM_REPLAY_STEP_TIMEOUT_MS", defaults.step_timeout),
            ready_timeout: env_millis("DOM_REPLAY_READY_TIMEOUT_MS", defaults.ready_timeout),
            step_delay: env_millis("DOM_REPLAY_STEP_DELAY_MS", defaults.step_delay),
            cursor_travel: env_millis("DOM_REPLAY_CURSOR_TRAVEL_MS", defaults.cursor_travel),
            navigation_follow: env_millis("DOM_REPLAY_NAVIGATION_FOLLOW_MS", defaults.navigation_follow),
            wait_threshold: (wait_threshold_ms > 0).then(|| Duration::from_millis(wait_threshold_ms)),
            autosave: env_parse("DOM_REPLAY_AUTOSAVE", defaults.autosave),
            screenshots: env_parse("DOM_REPLAY_SCREENSHOTS", defaults.screenshots),
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            headless: false,
            output_dir: default_output_dir(),
            poll: PollSchedule::default(),
            injection: InjectionRetry::default(),
            submit_keywords: DEFAULT_SUBMIT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            field_keywords: DEFAULT_FIELD_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            continue_on_error: false,
            step_timeout: Duration::from_secs(30),
            ready_timeout: Duration::from_secs(10),
            step_delay: Duration::from_millis(500),
            cursor_travel: Duration::from_millis(300),
            navigation_follow: Duration::from_secs(3),
            wait_threshold: None,
            autosave: true,
            screenshots: false,
        }
    }
}

fn default_output_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("dom-replay").join("recordings"))
        .unwrap_or_else(|| PathBuf::from("recordings"))
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!("Ignoring {}={:?}: not a valid value", name, raw);
                default
            }
        },
        Err(_) => default,
    }
}

fn env_millis(name: &str, default: Duration) -> Duration {
    Duration::from_millis(env_parse(name, default.as_millis() as u64))
}

fn env_list(name: &str) -> Option<Vec<String>> {
    env::var(name).ok().map(|raw| parse_list(&raw))
}

/// Comma-separated list, blanks dropped
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RecorderConfig::default();
        assert_eq!(config.poll.burst_interval, Duration::from_millis(50));
        assert_eq!(config.poll.steady_interval, Duration::from_millis(250));
        assert_eq!(config.injection.max_attempts, 5);
        assert!(config.submit_keywords.contains(&"entrar".to_string()));
        assert!(config.wait_threshold.is_none());
        assert!(!config.continue_on_error);
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list(" ok, go ,,Absenden "), vec!["ok", "go", "Absenden"]);
        assert!(parse_list("").is_empty());
    }
}
