use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Text transform steps applied to every alert before it reaches a sink.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub alert_id_prefix: String,
    pub strip_parenthetical: bool,
    pub strip_annotations: bool,
    pub include_summary: bool,
    pub highlight_patterns: Vec<String>,
    /// Labels rendered from `commonLabels`, in this order.
    pub label_keys: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            alert_id_prefix: "alert".to_string(),
            strip_parenthetical: true,
            strip_annotations: true,
            include_summary: true,
            highlight_patterns: vec![
                r"value=-?\d+(?:\.\d+)?".to_string(),
                r"-?\d+(?:\.\d+)?%".to_string(),
            ],
            label_keys: vec![
                "alertname".to_string(),
                "severity".to_string(),
                "instance".to_string(),
                "job".to_string(),
                "grafana_folder".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyFormat {
    #[default]
    Html,
    Text,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub starttls: bool,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: Vec<String>,
    pub format: BodyFormat,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            starttls: true,
            username: String::new(),
            password: String::new(),
            from: String::new(),
            to: Vec::new(),
            format: BodyFormat::Html,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Post,
    Patch,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkItemConfig {
    pub base_url: String,
    pub organization: String,
    pub project: String,
    pub personal_access_token: String,
    pub work_item_type: String,
    pub api_version: String,
    pub method: HttpMethod,
    pub timeout_secs: u64,
    pub tag_with_alert_id: bool,
}

impl Default for WorkItemConfig {
    fn default() -> Self {
        Self {
            base_url: "https://dev.azure.com".to_string(),
            organization: String::new(),
            project: String::new(),
            personal_access_token: String::new(),
            work_item_type: "Bug".to_string(),
            api_version: "6.0".to_string(),
            method: HttpMethod::Post,
            timeout_secs: 30,
            tag_with_alert_id: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
    pub email: Option<EmailConfig>,
    pub work_item: Option<WorkItemConfig>,
}

impl RelayConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// `Ok(None)` when the file does not exist. A file that exists but cannot
    /// be read or parsed is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))
                .map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Overlays credentials and addresses from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Sections that are absent from the file are created when the
    /// environment supplies their credentials.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let email_vars = ["SMTP_USER", "SMTP_PASS", "EMAIL_FROM", "EMAIL_TO"];
        if self.email.is_none() && email_vars.iter().any(|key| var(key).is_some()) {
            self.email = Some(EmailConfig::default());
        }
        if let Some(email) = self.email.as_mut() {
            if let Some(host) = var("SMTP_HOST") {
                email.smtp_host = host;
            }
            if let Some(port) = var("SMTP_PORT") {
                match port.parse() {
                    Ok(port) => email.smtp_port = port,
                    Err(e) => log::warn!("Ignoring SMTP_PORT={}: {}", port, e),
                }
            }
            if let Some(user) = var("SMTP_USER") {
                email.username = user;
            }
            if let Some(pass) = var("SMTP_PASS") {
                email.password = pass;
            }
            if let Some(from) = var("EMAIL_FROM") {
                email.from = from;
            }
            if let Some(to) = var("EMAIL_TO") {
                email.to = to
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect();
            }
        }

        let token = var("AZURE_PAT").or_else(|| var("PAT"));
        if self.work_item.is_none() && token.is_some() {
            self.work_item = Some(WorkItemConfig::default());
        }
        if let Some(work_item) = self.work_item.as_mut() {
            if let Some(token) = token {
                work_item.personal_access_token = token;
            }
            if let Some(org) = var("AZURE_ORG") {
                work_item.organization = org;
            }
            if let Some(project) = var("AZURE_PROJECT") {
                work_item.project = project;
            }
            if let Some(kind) = var("AZURE_WORK_ITEM_TYPE") {
                work_item.work_item_type = kind;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        for pattern in &self.pipeline.highlight_patterns {
            if let Err(e) = regex::Regex::new(pattern) {
                bail!("invalid highlight pattern {:?}: {}", pattern, e);
            }
        }

        if let Some(email) = &self.email {
            if email.smtp_host.trim().is_empty() {
                bail!("email.smtp_host must not be empty");
            }
            if email.from.trim().is_empty() {
                bail!("email.from must not be empty (set EMAIL_FROM)");
            }
            if email.to.is_empty() {
                bail!("email.to needs at least one recipient (set EMAIL_TO)");
            }
        }

        if let Some(work_item) = &self.work_item {
            if work_item.organization.trim().is_empty() || work_item.project.trim().is_empty() {
                bail!("work_item.organization and work_item.project must be set");
            }
            if work_item.personal_access_token.is_empty() {
                bail!("work_item.personal_access_token must be set (AZURE_PAT)");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_relay_config_default() {
        let config = RelayConfig::default();

        assert_eq!(config.server.bind, "0.0.0.0:3000");
        assert_eq!(config.pipeline.alert_id_prefix, "alert");
        assert!(config.pipeline.strip_parenthetical);
        assert!(config.pipeline.include_summary);
        assert_eq!(config.pipeline.highlight_patterns.len(), 2);
        assert!(config.email.is_none());
        assert!(config.work_item.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_relay_config_from_file() -> Result<()> {
        let toml_content = r#"
[server]
bind = "127.0.0.1:8080"

[pipeline]
alert_id_prefix = "grafana"
strip_parenthetical = false
label_keys = ["alertname"]

[email]
smtp_host = "mail.internal"
smtp_port = 25
starttls = false
from = "alerts@example.com"
to = ["ops@example.com", "oncall@example.com"]
format = "text"

[work_item]
organization = "acme"
project = "Platform"
personal_access_token = "secret"
work_item_type = "Task"
method = "PATCH"
"#;

        let temp_file = NamedTempFile::new()?;
        fs::write(temp_file.path(), toml_content)?;

        let config = RelayConfig::from_file(temp_file.path())?;

        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.pipeline.alert_id_prefix, "grafana");
        assert!(!config.pipeline.strip_parenthetical);
        assert!(config.pipeline.strip_annotations);
        assert_eq!(config.pipeline.label_keys, vec!["alertname"]);

        let email = config.email.as_ref().unwrap();
        assert_eq!(email.smtp_port, 25);
        assert!(!email.starttls);
        assert_eq!(email.to.len(), 2);
        assert_eq!(email.format, BodyFormat::Text);

        let work_item = config.work_item.as_ref().unwrap();
        assert_eq!(work_item.base_url, "https://dev.azure.com");
        assert_eq!(work_item.work_item_type, "Task");
        assert_eq!(work_item.api_version, "6.0");
        assert_eq!(work_item.method, HttpMethod::Patch);

        assert!(config.validate().is_ok());
        Ok(())
    }

    #[test]
    fn test_relay_config_file_not_found() {
        let result = RelayConfig::from_file("nonexistent_file.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_relay_config_invalid_toml() -> Result<()> {
        let temp_file = NamedTempFile::new()?;
        fs::write(temp_file.path(), "invalid toml content [[[")?;

        let result = RelayConfig::from_file(temp_file.path());
        assert!(result.is_err());

        Ok(())
    }

    #[test]
    fn test_load_missing_file_is_none() -> Result<()> {
        let dir = tempfile::tempdir()?;

        assert!(RelayConfig::load(dir.path().join("config.toml"))?.is_none());

        Ok(())
    }

    #[test]
    fn test_load_rejects_malformed_file() -> Result<()> {
        let temp_file = NamedTempFile::new()?;
        fs::write(temp_file.path(), "[email]\nsmtp_port = \"587\"\n")?;

        let err = RelayConfig::load(temp_file.path()).unwrap_err();
        assert!(err.to_string().starts_with("failed to parse"));

        Ok(())
    }

    #[test]
    fn test_load_existing_file() -> Result<()> {
        let temp_file = NamedTempFile::new()?;
        fs::write(temp_file.path(), "[server]\nbind = \"127.0.0.1:9000\"\n")?;

        let config = RelayConfig::load(temp_file.path())?.expect("file exists");
        assert_eq!(config.server.bind, "127.0.0.1:9000");

        Ok(())
    }

    #[test]
    fn test_env_creates_missing_sections() {
        let mut config = RelayConfig::default();
        config.apply_env_from(env(&[
            ("SMTP_USER", "relay@example.com"),
            ("SMTP_PASS", "app-password"),
            ("EMAIL_FROM", "relay@example.com"),
            ("EMAIL_TO", "a@example.com, b@example.com,"),
            ("PAT", "token"),
            ("AZURE_ORG", "acme"),
            ("AZURE_PROJECT", "Training"),
        ]));

        let email = config.email.as_ref().unwrap();
        assert_eq!(email.username, "relay@example.com");
        assert_eq!(email.password, "app-password");
        assert_eq!(email.to, vec!["a@example.com", "b@example.com"]);

        let work_item = config.work_item.as_ref().unwrap();
        assert_eq!(work_item.personal_access_token, "token");
        assert_eq!(work_item.organization, "acme");
        assert_eq!(work_item.project, "Training");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_without_credentials_leaves_sinks_disabled() {
        let mut config = RelayConfig::default();
        config.apply_env_from(env(&[("AZURE_ORG", "acme"), ("SMTP_HOST", "mail")]));

        assert!(config.email.is_none());
        assert!(config.work_item.is_none());
    }

    #[test]
    fn test_env_ignores_bad_port() {
        let mut config = RelayConfig {
            email: Some(EmailConfig::default()),
            ..RelayConfig::default()
        };
        config.apply_env_from(env(&[("SMTP_PORT", "not-a-port")]));

        assert_eq!(config.email.unwrap().smtp_port, 587);
    }

    #[test]
    fn test_validate_rejects_incomplete_sections() {
        let config = RelayConfig {
            email: Some(EmailConfig::default()),
            ..RelayConfig::default()
        };
        assert!(config.validate().is_err());

        let config = RelayConfig {
            work_item: Some(WorkItemConfig {
                organization: "acme".to_string(),
                project: "Platform".to_string(),
                ..WorkItemConfig::default()
            }),
            ..RelayConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_highlight_pattern() {
        let mut config = RelayConfig::default();
        config.pipeline.highlight_patterns.push("([".to_string());

        assert!(config.validate().is_err());
    }
}
