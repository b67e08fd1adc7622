//! Key/value configuration: defaults, rc file, environment overlay.

use std::{
    collections::HashMap,
    env, fs,
    io::{BufRead, BufReader},
    path::PathBuf,
    time::Duration,
};

use directories::BaseDirs;

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        let mut map = default_map();
        let config_path = default_config_path();

        // Read .tabgptrc if exists
        if config_path.exists() {
            if let Ok(file) = fs::File::open(&config_path) {
                let reader = BufReader::new(file);
                for line in reader.lines().map_while(Result::ok) {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    if let Some((k, v)) = line.split_once('=') {
                        map.insert(k.trim().to_string(), v.trim().to_string());
                    }
                }
            }
        }

        // Overlay environment variables (take precedence)
        for (k, v) in env::vars() {
            if is_config_key(&k) {
                map.insert(k, v);
            }
        }

        Self {
            inner: map,
            config_path,
        }
    }

    /// Build a config from explicit pairs, ignoring the rc file and the
    /// process environment. Intended for tests and embedders.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = default_map();
        for (k, v) in pairs {
            map.insert(k.into(), v.into());
        }
        Self {
            inner: map,
            config_path: default_config_path(),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).cloned()
    }

    pub fn get_f32(&self, key: &str) -> Option<f32> {
        self.get(key).and_then(|v| v.parse::<f32>().ok())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.parse::<u64>().ok())
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.inner.insert(key.to_string(), value.to_string());
    }

    pub fn model(&self) -> String {
        self.get("DEFAULT_MODEL")
            .unwrap_or_else(|| "gpt-4o-mini".to_string())
    }

    pub fn temperature(&self) -> f32 {
        self.get_f32("DEFAULT_TEMPERATURE").unwrap_or(0.1)
    }

    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(self.get("OUTPUT_PATH").unwrap_or_else(|| "outputs".into()))
    }

    pub fn pipeline_timeout(&self) -> Duration {
        Duration::from_secs(self.get_u64("PIPELINE_TIMEOUT").unwrap_or(300))
    }
}

fn is_config_key(k: &str) -> bool {
    const KEYS: &[&str] = &[
        "OPENAI_API_KEY",
        "API_BASE_URL",
        "REQUEST_TIMEOUT",
        "DEFAULT_MODEL",
        "DEFAULT_TEMPERATURE",
        "PIPELINE_TIMEOUT",
        "OUTPUT_PATH",
        "OUTPUT_BASE_URL",
    ];

    KEYS.contains(&k) || k.starts_with("TABGPT_")
}

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    base.join("tabgpt").join(".tabgptrc")
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();

    m.insert("API_BASE_URL".into(), "default".into());
    m.insert("DEFAULT_MODEL".into(), "gpt-4o-mini".into());
    m.insert("DEFAULT_TEMPERATURE".into(), "0.1".into());
    m.insert("REQUEST_TIMEOUT".into(), "60".into());
    m.insert("PIPELINE_TIMEOUT".into(), "300".into());
    m.insert("OUTPUT_PATH".into(), "outputs".into());

    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_present() {
        let cfg = Config::from_pairs::<_, String, String>([]);
        assert_eq!(cfg.model(), "gpt-4o-mini");
        assert_eq!(cfg.pipeline_timeout(), Duration::from_secs(300));
        assert!((cfg.temperature() - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn explicit_pairs_override_defaults() {
        let cfg = Config::from_pairs([("PIPELINE_TIMEOUT", "5"), ("DEFAULT_MODEL", "gpt-4o")]);
        assert_eq!(cfg.pipeline_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.model(), "gpt-4o");
    }
}
