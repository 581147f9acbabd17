use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::categorizer::DEFAULT_TAG_LIMIT;
use crate::models::{Confidence, JobSource};
use crate::pipeline::BatchOptions;
use crate::tables::Tables;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImapSettings {
    pub server: String,
    pub port: u16,
    pub username: Option<String>,
    pub password_file: Option<PathBuf>,
}

impl Default for ImapSettings {
    fn default() -> Self {
        Self {
            server: "imap.gmail.com".to_string(),
            port: 993,
            username: None,
            password_file: None,
        }
    }
}

// Contents of `config.json`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub owner: String,
    // Overrides the per-command default (manual for `add`, gmail for `email`).
    pub default_source: Option<JobSource>,
    pub filter_related: bool,
    pub min_confidence: Confidence,
    pub tag_limit: usize,
    pub extra_job_boards: Vec<String>,
    pub extra_sender_domains: Vec<String>,
    // `[domain, company]` pairs, checked before the built-in map.
    pub extra_companies: Vec<(String, String)>,
    pub imap: Option<ImapSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            owner: "default".to_string(),
            default_source: None,
            filter_related: true,
            min_confidence: Confidence::Medium,
            tag_limit: DEFAULT_TAG_LIMIT,
            extra_job_boards: Vec::new(),
            extra_sender_domains: Vec::new(),
            extra_companies: Vec::new(),
            imap: None,
        }
    }
}

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "jobsift")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    // Loads settings from `path`, or from the default location when `path`
    // is `None`. A missing default file yields defaults; a missing explicit
    // file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_json(&contents).with_context(|| format!("Invalid config file: {:?}", path))
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).context("Failed to parse settings")
    }

    pub fn tables(&self) -> Tables {
        let mut tables = Tables::builtin();
        tables.add_job_boards(&self.extra_job_boards);
        tables.add_sender_domains(&self.extra_sender_domains);
        tables.add_companies(&self.extra_companies);
        tables
    }

    pub fn batch_options(&self, fallback_source: JobSource) -> BatchOptions {
        BatchOptions {
            default_source: self.default_source.unwrap_or(fallback_source),
            filter_related: self.filter_related,
            min_confidence: self.min_confidence,
            tag_limit: self.tag_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::Extractor;

    #[test]
    fn test_empty_object_gives_defaults() {
        let settings = Settings::from_json("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.owner, "default");
        assert!(settings.filter_related);
        assert_eq!(settings.min_confidence, Confidence::Medium);
        assert_eq!(settings.tag_limit, 5);
    }

    #[test]
    fn test_partial_settings() {
        let settings = Settings::from_json(
            r#"{
                "owner": "sam",
                "default_source": "gmail",
                "tag_limit": 3,
                "min_confidence": "high",
                "extra_companies": [["acme.io", "Acme Corporation"]],
                "imap": { "username": "sam@gmail.com" }
            }"#,
        )
        .unwrap();
        assert_eq!(settings.owner, "sam");
        assert_eq!(settings.default_source, Some(JobSource::Gmail));
        assert_eq!(settings.tag_limit, 3);
        assert!(settings.filter_related);
        assert_eq!(settings.batch_options(JobSource::Manual).min_confidence, Confidence::High);

        let imap = settings.imap.unwrap();
        assert_eq!(imap.server, "imap.gmail.com");
        assert_eq!(imap.port, 993);
        assert_eq!(imap.username.as_deref(), Some("sam@gmail.com"));
    }

    #[test]
    fn test_malformed_settings_error() {
        assert!(Settings::from_json("{ not json").is_err());
        assert!(Settings::from_json(r#"{"tag_limit": "many"}"#).is_err());
        assert!(Settings::from_json(r#"{"default_source": "fax"}"#).is_err());
        assert!(Settings::from_json(r#"{"min_confidence": "certain"}"#).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let path = std::env::temp_dir().join("jobsift-config-that-does-not-exist.json");
        assert!(Settings::load(Some(&path)).is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let path = std::env::temp_dir().join(format!("jobsift-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"owner": "robin", "filter_related": false}"#).unwrap();
        let settings = Settings::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(settings.owner, "robin");
        assert!(!settings.filter_related);
    }

    #[test]
    fn test_tables_apply_extensions() {
        let settings = Settings {
            extra_job_boards: vec!["jobs.acme.dev".to_string()],
            extra_sender_domains: vec!["acme.dev".to_string()],
            extra_companies: vec![("acme.io".to_string(), "Acme Corporation".to_string())],
            ..Default::default()
        };
        let tables = settings.tables();
        assert!(tables.job_boards.contains(&"jobs.acme.dev".to_string()));
        assert!(tables.sender_domains.contains(&"acme.dev".to_string()));

        let extractor = Extractor::new(&tables);
        assert_eq!(extractor.company_from_url("https://careers.acme.io/x"), "Acme Corporation");
    }

    #[test]
    fn test_batch_options_fallback_source() {
        let settings = Settings::default();
        assert_eq!(settings.batch_options(JobSource::Gmail).default_source, JobSource::Gmail);

        let settings = Settings {
            default_source: Some(JobSource::Other),
            tag_limit: 2,
            ..Default::default()
        };
        let options = settings.batch_options(JobSource::Manual);
        assert_eq!(options.default_source, JobSource::Other);
        assert_eq!(options.tag_limit, 2);
    }
}
