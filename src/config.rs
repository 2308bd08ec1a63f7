//! Application-level configuration loading: content categories, sample pools and timings.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::dao::models::SampleRef;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "FLIP_BATTLE_BACK_CONFIG_PATH";

const DEFAULT_SESSION_SECS: u64 = 600;
const DEFAULT_SCAN_INTERVAL_MS: u64 = 2_000;
const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;

/// A content category and the samples a match in it may be built around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryConfig {
    /// Category key, as sent by clients (e.g. `soul`).
    pub name: String,
    /// Sample pool; one entry is drawn per match.
    pub samples: Vec<SampleRef>,
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    categories: Vec<CategoryConfig>,
    session_duration: Duration,
    scan_interval: Duration,
    tick_interval: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        categories = app_config.categories.len(),
                        session_secs = app_config.session_duration.as_secs(),
                        "loaded configuration"
                    );
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

    /// Override the timings, keeping the categories.
    pub fn with_timings(
        mut self,
        session_duration: Duration,
        scan_interval: Duration,
        tick_interval: Duration,
    ) -> Self {
        self.session_duration = session_duration;
        self.scan_interval = scan_interval;
        self.tick_interval = tick_interval;
        self
    }

    /// Replace the category set.
    pub fn with_categories(mut self, categories: Vec<CategoryConfig>) -> Self {
        self.categories = categories;
        self
    }

    /// Configured categories, in scan order.
    pub fn categories(&self) -> &[CategoryConfig] {
        &self.categories
    }

    /// Whether `name` is a configured category.
    pub fn has_category(&self, name: &str) -> bool {
        self.categories.iter().any(|category| category.name == name)
    }

    /// Sample pool of a category.
    pub fn samples(&self, name: &str) -> Option<&[SampleRef]> {
        self.categories
            .iter()
            .find(|category| category.name == name)
            .map(|category| category.samples.as_slice())
    }

    /// Length of a production session.
    pub fn session_duration(&self) -> Duration {
        self.session_duration
    }

    /// Period of the matchmaking scan.
    pub fn scan_interval(&self) -> Duration {
        self.scan_interval
    }

    /// Period of the per-match countdown tick.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            session_duration: Duration::from_secs(DEFAULT_SESSION_SECS),
            scan_interval: Duration::from_millis(DEFAULT_SCAN_INTERVAL_MS),
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    categories: Option<Vec<RawCategory>>,
    session_duration_secs: Option<u64>,
    scan_interval_ms: Option<u64>,
    tick_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
/// JSON representation of a single category inside the configuration file.
struct RawCategory {
    name: String,
    samples: Vec<SampleRef>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let categories = value
            .categories
            .map(|categories| {
                categories
                    .into_iter()
                    .map(|raw| CategoryConfig {
                        name: raw.name,
                        samples: raw.samples,
                    })
                    .collect::<Vec<_>>()
            })
            .filter(|categories| !categories.is_empty())
            .unwrap_or_else(default_categories);

        Self {
            categories,
            session_duration: Duration::from_secs(
                value.session_duration_secs.unwrap_or(DEFAULT_SESSION_SECS),
            ),
            scan_interval: Duration::from_millis(
                value
                    .scan_interval_ms
                    .filter(|ms| *ms > 0)
                    .unwrap_or(DEFAULT_SCAN_INTERVAL_MS),
            ),
            tick_interval: Duration::from_millis(
                value
                    .tick_interval_ms
                    .filter(|ms| *ms > 0)
                    .unwrap_or(DEFAULT_TICK_INTERVAL_MS),
            ),
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

fn sample(name: &str, url: &str) -> SampleRef {
    SampleRef {
        name: name.to_owned(),
        url: url.to_owned(),
    }
}

/// Built-in categories shipped with the binary.
fn default_categories() -> Vec<CategoryConfig> {
    vec![
        CategoryConfig {
            name: "soul".into(),
            samples: vec![
                sample("Ideals", "/samples/soul/ramon_tavernier_ideals.mp3"),
                sample(
                    "My Funny Valentine",
                    "/samples/soul/gary_bartz_my_funny_valentine.mp3",
                ),
                sample("Gypsy Woman", "/samples/soul/gypsy_woman.wav"),
            ],
        },
        CategoryConfig {
            name: "funk".into(),
            samples: vec![
                sample(
                    "Quarto de Hotel",
                    "/samples/soul/hareton_salvanini_quarto_de_hotel.mp3",
                ),
                sample(
                    "Today Dream",
                    "/samples/soul/holiday_mood_orchestra_today_dream.mp3",
                ),
                sample("Hot Pants", "/samples/soul/james_brown_hot_pants.mp3"),
            ],
        },
        CategoryConfig {
            name: "jazz".into(),
            samples: vec![
                sample(
                    "It Is Well With My Soul",
                    "/samples/soul/cathedral_quartet_it_is_well.mp3",
                ),
                sample("Study", "/samples/soul/new_jazz_orchestra_study.mp3"),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_three_categories() {
        let config = AppConfig::default();
        let names = config
            .categories()
            .iter()
            .map(|category| category.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["soul", "funk", "jazz"]);
        assert_eq!(config.samples("jazz").map(<[SampleRef]>::len), Some(2));
        assert!(config.samples("rock").is_none());
        assert_eq!(config.session_duration(), Duration::from_secs(600));
        assert_eq!(config.scan_interval(), Duration::from_secs(2));
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn partial_file_keeps_missing_defaults() {
        let raw: RawConfig = serde_json::from_str(
            r#"{
                "categories": [
                    {"name": "house", "samples": [{"name": "Loop", "url": "/samples/house/loop.mp3"}]}
                ],
                "sessionDurationSecs": 300
            }"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);
        assert!(config.has_category("house"));
        assert!(!config.has_category("soul"));
        assert_eq!(config.session_duration(), Duration::from_secs(300));
        assert_eq!(config.scan_interval(), Duration::from_secs(2));
    }

    #[test]
    fn empty_category_list_falls_back_to_defaults() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"categories": [], "tickIntervalMs": 0}"#).unwrap();
        let config = AppConfig::from(raw);
        assert!(config.has_category("soul"));
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
    }
}
