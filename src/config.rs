//! Configuration management for job alerts

use crate::error::{JobAlertError, Result};
use crate::notify::mailer::parse_sender;
use crate::output::formatter::DEFAULT_SUBJECT;
use crate::processing::cluster::Linkage;
use crate::processing::matcher::PreferenceMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub source: SourceConfig,
    pub storage: StorageConfig,
    pub mail: MailConfig,
    #[serde(default)]
    pub preferences: PreferenceMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub keyword: String,
    pub pages: usize,
    pub clusters: usize,
    pub linkage: Linkage,
    /// Only alert on postings that were not in the previous run's dataset
    pub only_new_postings: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub path: PathBuf,
    pub page_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub artifacts_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailConfig {
    pub sender: String,
    pub subject: String,
    /// Log alerts instead of delivering them
    pub dry_run: bool,
    #[serde(default)]
    pub transport: MailTransport,
    pub outbox_dir: PathBuf,
    #[serde(default)]
    pub smtp: SmtpConfig,
}

/// How non-dry-run alerts leave the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailTransport {
    /// `.eml` files in `outbox_dir`
    #[default]
    Outbox,
    Smtp,
}

/// SMTP relay settings. The password itself never lives in the file: only the
/// name of the environment variable holding it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password_env: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 465,
            username: String::new(),
            password_env: "JOB_ALERTS_SMTP_PASSWORD".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join("job-alerts");

        Self {
            pipeline: PipelineConfig {
                keyword: String::new(),
                pages: 2,
                clusters: 5,
                linkage: Linkage::Ward,
                only_new_postings: false,
            },
            source: SourceConfig {
                path: data_dir.join("postings.json"),
                page_size: 20,
            },
            storage: StorageConfig {
                artifacts_dir: data_dir.join("artifacts"),
            },
            mail: MailConfig {
                sender: "job-alerts@localhost.localdomain".to_string(),
                subject: DEFAULT_SUBJECT.to_string(),
                dry_run: true,
                transport: MailTransport::Outbox,
                outbox_dir: data_dir.join("outbox"),
                smtp: SmtpConfig::default(),
            },
            preferences: PreferenceMap::new(),
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    /// A missing file is created with defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config = Self::from_toml(&content)?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| JobAlertError::Configuration(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| JobAlertError::Configuration(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join("job-alerts")
            .join("config.toml")
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.clusters == 0 {
            return Err(JobAlertError::Configuration(
                "pipeline.clusters must be at least 1".to_string(),
            ));
        }
        if self.pipeline.pages == 0 {
            return Err(JobAlertError::Configuration(
                "pipeline.pages must be at least 1".to_string(),
            ));
        }
        if self.source.page_size == 0 {
            return Err(JobAlertError::Configuration(
                "source.page_size must be at least 1".to_string(),
            ));
        }
        parse_sender(&self.mail.sender)?;
        if self.mail.transport == MailTransport::Smtp {
            let smtp = &self.mail.smtp;
            if smtp.host.is_empty() || smtp.username.is_empty() || smtp.password_env.is_empty() {
                return Err(JobAlertError::Configuration(
                    "mail.smtp needs host, username and password_env".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_round_trips_through_toml() {
        let config = Config::default();
        let content = toml::to_string_pretty(&config).unwrap();
        assert_eq!(Config::from_toml(&content).unwrap(), config);
    }

    #[test]
    fn test_preferences_section() {
        let mut config = Config::default();
        config
            .preferences
            .insert("a@x.com".to_string(), vec!["python".to_string(), "machine learning".to_string()]);
        let content = toml::to_string_pretty(&config).unwrap();
        assert!(content.contains("[preferences]"));

        let parsed = Config::from_toml(&content).unwrap();
        assert_eq!(parsed.preferences["a@x.com"], vec!["python", "machine learning"]);
        assert_eq!(parsed.pipeline.linkage, Linkage::Ward);
    }

    #[test]
    fn test_zero_clusters_is_rejected() {
        let mut config = Config::default();
        config.pipeline.clusters = 0;
        let content = toml::to_string_pretty(&config).unwrap();

        let err = Config::from_toml(&content).unwrap_err();
        assert!(matches!(err, JobAlertError::Configuration(_)));
    }

    #[test]
    fn test_load_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load(Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(Config::load(Some(&path)).unwrap(), config);
    }

    #[test]
    fn test_smtp_section_holds_no_password() {
        let mut config = Config::default();
        config.mail.transport = MailTransport::Smtp;
        config.mail.smtp.username = "alerts@example.com".to_string();
        let content = toml::to_string_pretty(&config).unwrap();

        assert!(content.contains("password_env = \"JOB_ALERTS_SMTP_PASSWORD\""));
        let parsed = Config::from_toml(&content).unwrap();
        assert_eq!(parsed.mail.transport, MailTransport::Smtp);
        assert_eq!(parsed.mail.smtp.port, 465);
    }

    #[test]
    fn test_smtp_without_username_is_rejected() {
        let mut config = Config::default();
        config.mail.transport = MailTransport::Smtp;
        let content = toml::to_string_pretty(&config).unwrap();

        assert!(matches!(Config::from_toml(&content), Err(JobAlertError::Configuration(_))));
    }

    #[test]
    fn test_bad_sender_is_rejected() {
        let mut config = Config::default();
        config.mail.sender = "not an address".to_string();
        let content = toml::to_string_pretty(&config).unwrap();

        assert!(matches!(Config::from_toml(&content), Err(JobAlertError::Configuration(_))));
    }
}
