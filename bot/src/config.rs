use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use sg_gateway::GatewayConfig;
use sg_signals::EngineConfig;
use sg_storage::{CatalogConfig, StorageConfig};

use crate::timeframe::Timeframe;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub schedules: Vec<ScheduleConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub timeframe: String,
    /// Wait after the candle boundary so the closed candle is published
    #[serde(default = "default_settle_delay_sec")]
    pub settle_delay_sec: u64,
}

fn default_settle_delay_sec() -> u64 {
    5
}

impl ScheduleConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_sec)
    }
}

impl BotConfig {
    /// Load from a YAML file and apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut config = Self::from_yaml(&contents)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: BotConfig = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Override secrets from `RABBITMQ_URL`, `NOTIFY_TOKEN` and `DATABASE_PASSWORD`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("RABBITMQ_URL").filter(|v| !v.is_empty()) {
            self.gateway.queue.url = Some(url);
        }
        if let Some(token) = lookup("NOTIFY_TOKEN").filter(|v| !v.is_empty()) {
            self.gateway.notify.token = Some(token);
        }
        if let CatalogConfig::Postgres(db) = &mut self.storage.catalog {
            if let Some(password) = lookup("DATABASE_PASSWORD") {
                db.password = password;
            }
        }
    }

    /// Check what the scheduler needs: at least one valid schedule per timeframe
    pub fn validate(&self) -> Result<()> {
        if self.schedules.is_empty() {
            bail!("at least one schedule is required");
        }
        let mut seen = HashSet::new();
        for schedule in &self.schedules {
            schedule.timeframe.parse::<Timeframe>().context("invalid schedule")?;
            // Two schedulers on one timeframe would run overlapping batches
            if !seen.insert(schedule.timeframe.as_str()) {
                bail!("timeframe {} is scheduled more than once", schedule.timeframe);
            }
        }
        self.engine.validate()?;
        self.gateway.validate()?;
        Ok(())
    }

    /// Parsed timeframes of all schedules, in configuration order
    pub fn timeframes(&self) -> Result<Vec<(Timeframe, Duration)>> {
        self.schedules
            .iter()
            .map(|s| -> Result<(Timeframe, Duration)> {
                Ok((s.timeframe.parse::<Timeframe>()?, s.settle_delay()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sg_storage::PositionBackend;
    use std::collections::HashMap;
    use std::io::Write;

    const YAML: &str = r#"
storage:
  positions:
    backend: sqlite
    path: ./data/positions.db
  catalog:
    kind: postgres
    host: db.internal
gateway:
  notify:
    token: from-file
engine:
  max_concurrent_units: 2
schedules:
  - timeframe: 5m
  - timeframe: 4h
    settle_delay_sec: 30
"#;

    #[test]
    fn test_parse_full_config() {
        let config = BotConfig::from_yaml(YAML).unwrap();
        assert_eq!(config.storage.positions.backend, PositionBackend::Sqlite);
        assert_eq!(config.storage.positions.path, "./data/positions.db");
        assert_eq!(config.engine.max_concurrent_units, 2);
        assert_eq!(config.gateway.queue.open_queue, "order_future_queue");

        let timeframes = config.timeframes().unwrap();
        assert_eq!(timeframes[0].0.label(), "5m");
        assert_eq!(timeframes[0].1, Duration::from_secs(5));
        assert_eq!(timeframes[1].1, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("RABBITMQ_URL", "amqp://broker:5672"),
            ("NOTIFY_TOKEN", "from-env"),
            ("DATABASE_PASSWORD", "s3cret"),
        ]
        .into_iter()
        .collect();

        let mut config = BotConfig::from_yaml(YAML).unwrap();
        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.gateway.queue.url.as_deref(), Some("amqp://broker:5672"));
        assert_eq!(config.gateway.notify.token.as_deref(), Some("from-env"));
        let CatalogConfig::Postgres(db) = &config.storage.catalog else {
            panic!("expected postgres catalog");
        };
        assert_eq!(db.password, "s3cret");
        assert_eq!(db.host, "db.internal");
    }

    #[test]
    fn test_empty_override_keeps_file_value() {
        let mut config = BotConfig::from_yaml(YAML).unwrap();
        config.apply_overrides(|name| (name == "NOTIFY_TOKEN").then(String::new));
        assert_eq!(config.gateway.notify.token.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_validation() {
        let config = BotConfig::from_yaml("engine: {max_concurrent_units: 1}").unwrap();
        assert!(config.validate().is_err());

        let config = BotConfig::from_yaml("schedules: [{timeframe: 7m}]").unwrap();
        assert!(config.validate().is_err());

        let config = BotConfig::from_yaml(
            "engine: {max_concurrent_units: 0}\nschedules: [{timeframe: 1h}]",
        )
        .unwrap();
        assert!(config.validate().is_err());

        let config = BotConfig::from_yaml(
            "schedules: [{timeframe: 1h}]\ngateway: {notify: {timeout_sec: 0}}",
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_timeframe_is_rejected() {
        let config = BotConfig::from_yaml(
            "schedules: [{timeframe: 5m}, {timeframe: 5m, settle_delay_sec: 0}]",
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("5m is scheduled more than once"));

        let config = BotConfig::from_yaml("schedules: [{timeframe: 5m}, {timeframe: 15m}]").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"schedules:\n  - timeframe: 1d\n").unwrap();

        let config = BotConfig::load(file.path()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.schedules.len(), 1);
        assert_eq!(config.schedules[0].settle_delay_sec, 5);

        assert!(BotConfig::load(Path::new("/nonexistent/config.yaml")).is_err());
    }
}
