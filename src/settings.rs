use anyhow::{Context, Result};
use chrono::FixedOffset;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::knowledge::{KnowledgeBase, Variant};

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub assistant: AssistantSettings,
    #[serde(default)]
    pub export: ExportSettings,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Sessions without a request for this long are closed and dropped.
    pub session_idle_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            session_idle_secs: 1800,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AssistantSettings {
    pub variant: Variant,
    /// Overrides `variant` when set.
    pub knowledge_file: Option<PathBuf>,
    pub latency_min_ms: u64,
    pub latency_max_ms: u64,
    pub seed: Option<u64>,
    pub utc_offset_hours: i32,
}

impl ServerSettings {
    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    /// How often idle sessions are swept; never zero.
    pub fn sweep_interval(&self) -> Duration {
        (self.session_idle_timeout() / 4).clamp(Duration::from_secs(1), Duration::from_secs(60))
    }
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            variant: Variant::Advanced,
            knowledge_file: None,
            latency_min_ms: 1000,
            latency_max_ms: 2000,
            seed: None,
            utc_offset_hours: 5,
        }
    }
}

impl AssistantSettings {
    pub fn latency(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.latency_min_ms),
            Duration::from_millis(self.latency_max_ms),
        )
    }

    pub fn utc_offset(&self) -> Result<FixedOffset> {
        self.utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .with_context(|| format!("utc_offset_hours {} is out of range", self.utc_offset_hours))
    }

    pub fn load_knowledge(&self) -> Result<Arc<KnowledgeBase>> {
        match &self.knowledge_file {
            Some(path) => {
                let kb = KnowledgeBase::load(path)
                    .with_context(|| format!("Failed to load knowledge base from {:?}", path))?;
                Ok(Arc::new(kb))
            }
            None => KnowledgeBase::shared(self.variant)
                .with_context(|| format!("Built-in '{:?}' knowledge base is invalid", self.variant)),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ExportSettings {
    pub path: PathBuf,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("knowledge.json"),
        }
    }
}

impl Settings {
    /// Reads `Config.toml` (optional) and `MULOQOT__SECTION__KEY` overrides.
    pub fn load() -> Result<Self> {
        Self::load_from("Config")
    }

    pub fn load_from(name: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(name).required(false))
            .add_source(config::Environment::with_prefix("MULOQOT").separator("__"))
            .build()?
            .try_deserialize::<Settings>()
            .context("Invalid configuration")?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_a_file() {
        let settings = Settings::load_from("does-not-exist").unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.session_idle_timeout(), Duration::from_secs(1800));
        assert_eq!(settings.server.sweep_interval(), Duration::from_secs(60));
        assert_eq!(settings.assistant.variant, Variant::Advanced);
        assert_eq!(
            settings.assistant.latency(),
            (Duration::from_millis(1000), Duration::from_millis(2000))
        );
        assert_eq!(settings.assistant.utc_offset().unwrap().local_minus_utc(), 5 * 3600);
    }

    #[test]
    fn reads_a_toml_file() {
        let dir = std::env::temp_dir().join(format!("muloqot-settings-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("Config.toml");
        std::fs::write(
            &file,
            "[server]\nhost = \"0.0.0.0\"\nport = 9000\nsession_idle_secs = 2\n\n[assistant]\nvariant = \"basic\"\nseed = 42\n",
        )
        .unwrap();

        let settings = Settings::load_from(dir.join("Config").to_str().unwrap()).unwrap();
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.session_idle_timeout(), Duration::from_secs(2));
        assert_eq!(settings.server.sweep_interval(), Duration::from_secs(1));
        assert_eq!(settings.assistant.variant, Variant::Basic);
        assert_eq!(settings.assistant.seed, Some(42));
        assert_eq!(settings.assistant.latency_min_ms, 1000);
        assert_eq!(settings.assistant.load_knowledge().unwrap().name(), "basic");

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn rejects_an_impossible_offset() {
        let assistant = AssistantSettings {
            utc_offset_hours: 30,
            ..AssistantSettings::default()
        };
        assert!(assistant.utc_offset().is_err());

        for hours in [1_000_000, i32::MIN] {
            let assistant = AssistantSettings {
                utc_offset_hours: hours,
                ..AssistantSettings::default()
            };
            assert!(assistant.utc_offset().is_err(), "hours: {hours}");
        }
    }

    #[test]
    fn missing_knowledge_file_is_reported() {
        let assistant = AssistantSettings {
            knowledge_file: Some(PathBuf::from("/nonexistent/kb.json")),
            ..AssistantSettings::default()
        };
        let err = assistant.load_knowledge().unwrap_err();
        assert!(format!("{err:#}").contains("Failed to load knowledge base"));
    }
}
