use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::LocationType;

/// Applicant identity used to fill the personal-info section of a form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub current_company: String,
    #[serde(default)]
    pub linkedin: String,
    #[serde(default)]
    pub github: String,
    #[serde(default)]
    pub website: String,
}

impl Profile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_bulk_size")]
    pub bulk_size: usize,
    #[serde(default = "default_location_type")]
    pub location_type: LocationType,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            bulk_size: default_bulk_size(),
            location_type: default_location_type(),
        }
    }
}

fn default_bulk_size() -> usize {
    10
}

fn default_location_type() -> LocationType {
    LocationType::Remote
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub profile: Profile,
    #[serde(default)]
    pub preferences: Preferences,
    /// Cover text typed into the additional-information box on every form.
    #[serde(default)]
    pub default_cover: String,
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    #[serde(default = "default_resumes_dir")]
    pub resumes_dir: PathBuf,
    #[serde(default = "default_knowledge_base")]
    pub knowledge_base: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: Profile::default(),
            preferences: Preferences::default(),
            default_cover: String::new(),
            webdriver_url: default_webdriver_url(),
            resumes_dir: default_resumes_dir(),
            knowledge_base: default_knowledge_base(),
        }
    }
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}

fn default_resumes_dir() -> PathBuf {
    PathBuf::from("resumes")
}

fn default_knowledge_base() -> PathBuf {
    PathBuf::from("data/knowledge.txt")
}

impl Config {
    pub fn default_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "autoapply") {
            proj_dirs.config_dir().join("config.json")
        } else {
            PathBuf::from("config.json")
        }
    }

    pub fn load() -> Result<Self> {
        // A config.json in the working directory wins over the user-level one.
        let local = PathBuf::from("config.json");
        let path = if local.exists() {
            local
        } else {
            Self::default_path()
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Write a starter config the user can fill in.
    pub fn write_template(path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&Config::default())?)
            .with_context(|| format!("Failed to write config template: {}", path.display()))?;
        Ok(())
    }
}
