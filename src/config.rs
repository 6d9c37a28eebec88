use codemax::domain::TargetLanguage;
use codemax::llm::OllamaConfig;
use codemax::runner::RepairLoopConfig;
use codemax::sandbox::SandboxConfig;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub llm: LlmConfig,
    pub sandbox: SandboxSection,
    pub repair: RepairConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_ms: u64,
    pub temperature: Option<f32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let ollama = OllamaConfig::default();
        Self {
            base_url: ollama.base_url,
            model: ollama.model,
            timeout_ms: ollama.timeout.as_millis() as u64,
            temperature: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSection {
    pub timeout_ms: u64,
    pub max_output_bytes: usize,
    pub passthrough_env: Vec<String>,
    /// Interpreter or compiler per language name, e.g. `python: python3.12`
    pub programs: HashMap<String, String>,
}

impl Default for SandboxSection {
    fn default() -> Self {
        let sandbox = SandboxConfig::default();
        Self {
            timeout_ms: 10000,
            max_output_bytes: sandbox.max_output_bytes,
            passthrough_env: sandbox.passthrough_env,
            programs: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    pub max_rounds: u32,
    pub language: String,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            language: "python".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub store_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("codemax")
                .join("session"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            llm: LlmConfig::default(),
            sandbox: SandboxSection::default(),
            repair: RepairConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    pub fn ollama_config(&self) -> OllamaConfig {
        OllamaConfig {
            base_url: self.llm.base_url.clone(),
            model: self.llm.model.clone(),
            timeout: Duration::from_millis(self.llm.timeout_ms),
            temperature: self.llm.temperature,
        }
    }

    /// Sandbox settings with `programs` keys resolved to languages
    pub fn sandbox_config(&self) -> Result<SandboxConfig> {
        let mut programs = HashMap::new();
        for (name, program) in &self.sandbox.programs {
            let language: TargetLanguage = name
                .parse()
                .context(format!("Unknown language '{}' in sandbox.programs", name))?;
            programs.insert(language, program.clone());
        }
        Ok(SandboxConfig {
            max_output_bytes: self.sandbox.max_output_bytes,
            passthrough_env: self.sandbox.passthrough_env.clone(),
            programs,
        })
    }

    /// Execution timeout per round; completion timeout matches the HTTP timeout
    pub fn repair_loop_config(&self) -> RepairLoopConfig {
        RepairLoopConfig {
            execution_timeout: Duration::from_millis(self.sandbox.timeout_ms),
            completion_timeout: Duration::from_millis(self.llm.timeout_ms),
        }
    }
}
