//! Application-level configuration loading, including the quiz rule set.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_ARENA_BACK_CONFIG_PATH";

/// Points awarded for a correct answer when no config overrides them.
pub const DEFAULT_POINTS_CORRECT: i64 = 50;
/// Points deducted for a wrong answer when no config overrides them.
pub const DEFAULT_POINTS_WRONG: i64 = -200;
/// Number of questions reserved for a set.
pub const DEFAULT_QUESTIONS_PER_SET: usize = 20;
/// Time the buzz winner has to submit an answer.
pub const DEFAULT_ANSWER_TIMEOUT_MS: u64 = 4_000;
/// Ceiling applied to client-reported latency before compensation.
pub const DEFAULT_MAX_LATENCY_COMPENSATION_MS: u64 = 300;
/// Maximum number of entries kept in a leaderboard record.
pub const DEFAULT_LEADERBOARD_SIZE: usize = 100;
/// How long a question stays on screen before buzzing closes.
pub const DEFAULT_QUESTION_DURATION_MS: u64 = 5_000;
/// Pause between the reveal of one question and the start of the next.
pub const DEFAULT_NEXT_QUESTION_DELAY_MS: u64 = 3_000;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Points awarded on a correct answer.
    pub points_correct: i64,
    /// Points (negative) applied on a wrong answer.
    pub points_wrong: i64,
    /// Fixed number of questions per set.
    pub questions_per_set: usize,
    /// Answer window duration in milliseconds.
    pub answer_timeout_ms: u64,
    /// Clamp bound for client-reported latency in milliseconds.
    pub max_latency_compensation_ms: u64,
    /// Bounded size of every leaderboard record.
    pub leaderboard_size: usize,
    /// Question display duration advertised in the question payload.
    pub question_duration_ms: u64,
    /// Delay advertised before the next question starts.
    pub next_question_delay_ms: u64,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the baked-in rule set.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(path = %path.display(), "loaded quiz rule set from config");
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            points_correct: DEFAULT_POINTS_CORRECT,
            points_wrong: DEFAULT_POINTS_WRONG,
            questions_per_set: DEFAULT_QUESTIONS_PER_SET,
            answer_timeout_ms: DEFAULT_ANSWER_TIMEOUT_MS,
            max_latency_compensation_ms: DEFAULT_MAX_LATENCY_COMPENSATION_MS,
            leaderboard_size: DEFAULT_LEADERBOARD_SIZE,
            question_duration_ms: DEFAULT_QUESTION_DURATION_MS,
            next_question_delay_ms: DEFAULT_NEXT_QUESTION_DELAY_MS,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    points_correct: Option<i64>,
    points_wrong: Option<i64>,
    questions_per_set: Option<usize>,
    answer_timeout_ms: Option<u64>,
    max_latency_compensation_ms: Option<u64>,
    leaderboard_size: Option<usize>,
    question_duration_ms: Option<u64>,
    next_question_delay_ms: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            points_correct: value.points_correct.unwrap_or(defaults.points_correct),
            points_wrong: value.points_wrong.unwrap_or(defaults.points_wrong),
            questions_per_set: value
                .questions_per_set
                .unwrap_or(defaults.questions_per_set),
            answer_timeout_ms: value
                .answer_timeout_ms
                .unwrap_or(defaults.answer_timeout_ms),
            max_latency_compensation_ms: value
                .max_latency_compensation_ms
                .unwrap_or(defaults.max_latency_compensation_ms),
            leaderboard_size: value.leaderboard_size.unwrap_or(defaults.leaderboard_size),
            question_duration_ms: value
                .question_duration_ms
                .unwrap_or(defaults.question_duration_ms),
            next_question_delay_ms: value
                .next_question_delay_ms
                .unwrap_or(defaults.next_question_delay_ms),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
