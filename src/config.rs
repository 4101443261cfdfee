use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::reddit;

const DEFAULT_ENV_PREFIX: &str = "RIC";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub comments: CommentsConfig,
    #[serde(default)]
    pub reddit: RedditConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommentsConfig {
    #[serde(default = "default_max_root_comments")]
    pub max_root_comments: usize,
    #[serde(default = "default_max_reply_depth")]
    pub max_reply_depth: usize,
    #[serde(default = "default_max_replies_per_level")]
    pub max_replies_per_level: usize,
    #[serde(default = "default_start_collapsed")]
    pub start_collapsed: bool,
}

impl Default for CommentsConfig {
    fn default() -> Self {
        Self {
            max_root_comments: default_max_root_comments(),
            max_reply_depth: default_max_reply_depth(),
            max_replies_per_level: default_max_replies_per_level(),
            start_collapsed: default_start_collapsed(),
        }
    }
}

fn default_max_root_comments() -> usize {
    5
}

fn default_max_reply_depth() -> usize {
    2
}

fn default_max_replies_per_level() -> usize {
    3
}

fn default_start_collapsed() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RedditConfig {
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_graphql_path")]
    pub graphql_path: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Raw `Cookie` header of a signed-in browser session; voting needs its
    /// `csrf_token`.
    #[serde(default)]
    pub cookie: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            graphql_path: default_graphql_path(),
            user_agent: default_user_agent(),
            cookie: String::new(),
            timeout: default_timeout(),
        }
    }
}

fn default_origin() -> String {
    reddit::DEFAULT_ORIGIN.into()
}

fn default_graphql_path() -> String {
    reddit::GRAPHQL_PATH.into()
}

fn default_user_agent() -> String {
    format!("reddit-inline/{}", crate::VERSION)
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if other.comments.max_root_comments != 0 {
        base.comments.max_root_comments = other.comments.max_root_comments;
    }
    base.comments.max_reply_depth = other.comments.max_reply_depth;
    if other.comments.max_replies_per_level != 0 {
        base.comments.max_replies_per_level = other.comments.max_replies_per_level;
    }
    base.comments.start_collapsed = other.comments.start_collapsed;

    if !other.reddit.origin.is_empty() {
        base.reddit.origin = other.reddit.origin;
    }
    if !other.reddit.graphql_path.is_empty() {
        base.reddit.graphql_path = other.reddit.graphql_path;
    }
    if !other.reddit.user_agent.is_empty() {
        base.reddit.user_agent = other.reddit.user_agent;
    }
    if !other.reddit.cookie.is_empty() {
        base.reddit.cookie = other.reddit.cookie;
    }
    if !other.reddit.timeout.is_zero() {
        base.reddit.timeout = other.reddit.timeout;
    }

    base
}

/// Applies `PREFIX_SECTION__KEY=value` variables on top of `cfg`. Unparseable values
/// are ignored.
fn apply_env(cfg: &mut Config, prefix: &str) {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    for (key, value) in map {
        apply_env_value(cfg, &key, value);
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "comments.max_root_comments" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.comments.max_root_comments = parsed;
            }
        }
        "comments.max_reply_depth" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.comments.max_reply_depth = parsed;
            }
        }
        "comments.max_replies_per_level" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.comments.max_replies_per_level = parsed;
            }
        }
        "comments.start_collapsed" => {
            cfg.comments.start_collapsed = matches!(value.as_str(), "1" | "true" | "TRUE" | "True");
        }
        "reddit.origin" => cfg.reddit.origin = value,
        "reddit.graphql_path" => cfg.reddit.graphql_path = value,
        "reddit.user_agent" => cfg.reddit.user_agent = value,
        "reddit.cookie" => cfg.reddit.cookie = value,
        "reddit.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.reddit.timeout = duration;
            }
        }
        _ => {}
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("reddit-inline").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::tempdir;

    fn isolated() -> LoadOptions {
        LoadOptions {
            config_file: Some(PathBuf::from("/nonexistent/reddit-inline.yaml")),
            env_prefix: Some("RIC_TEST_UNUSED".into()),
        }
    }

    #[test]
    fn load_defaults_without_files() {
        let cfg = load(isolated()).unwrap();
        assert_eq!(cfg.comments.max_root_comments, 5);
        assert_eq!(cfg.comments.max_reply_depth, 2);
        assert_eq!(cfg.comments.max_replies_per_level, 3);
        assert!(cfg.comments.start_collapsed);
        assert_eq!(cfg.reddit.origin, "https://www.reddit.com");
        assert_eq!(cfg.reddit.timeout, Duration::from_secs(20));
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "comments:\n  max_root_comments: 8\n  start_collapsed: false\nreddit:\n  cookie: \"csrf_token=abc\"\n  timeout: 5s\n",
        )
        .unwrap();
        let cfg = load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("RIC_TEST_UNUSED".into()),
        })
        .unwrap();
        assert_eq!(cfg.comments.max_root_comments, 8);
        assert_eq!(cfg.comments.max_reply_depth, 2);
        assert!(!cfg.comments.start_collapsed);
        assert_eq!(cfg.reddit.cookie, "csrf_token=abc");
        assert_eq!(cfg.reddit.timeout, Duration::from_secs(5));
        assert_eq!(cfg.reddit.origin, "https://www.reddit.com");
    }

    #[test]
    fn env_overrides() {
        env::set_var("RICENV_COMMENTS__MAX_REPLY_DEPTH", "4");
        env::set_var("RICENV_REDDIT__TIMEOUT", "2s");
        env::set_var("RICENV_COMMENTS__MAX_ROOT_COMMENTS", "lots");
        let cfg = load(LoadOptions {
            config_file: Some(PathBuf::from("/nonexistent/reddit-inline.yaml")),
            env_prefix: Some("RICENV".into()),
        })
        .unwrap();
        assert_eq!(cfg.comments.max_reply_depth, 4);
        assert_eq!(cfg.comments.max_root_comments, 5);
        assert_eq!(cfg.reddit.timeout, Duration::from_secs(2));
        env::remove_var("RICENV_COMMENTS__MAX_REPLY_DEPTH");
        env::remove_var("RICENV_REDDIT__TIMEOUT");
        env::remove_var("RICENV_COMMENTS__MAX_ROOT_COMMENTS");
    }
}
