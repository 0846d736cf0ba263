//! Project configuration, loaded once from `.strata/strata.toml`.
//!
//! Every section has defaults, so a project without a config file behaves
//! exactly like one with an empty file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{StrataError, StrataResult};
use crate::naming::NamingEngine;
use crate::recovery::RecoveryDecisionKind;

/// Directory holding strata's project-local files.
pub const CONFIG_DIR: &str = ".strata";

/// Config file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "strata.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrataConfig {
    pub naming: NamingConfig,
    pub spec: SpecConfig,
    /// Recognized feature options and their value kinds.
    pub options: OptionSchema,
    pub catalog: CatalogConfig,
    pub quality: QualityConfig,
    pub recovery: RecoveryConfig,
}

impl StrataConfig {
    /// Load `<project_dir>/.strata/strata.toml`, falling back to defaults
    /// when the file does not exist.
    pub fn load(project_dir: &Path) -> StrataResult<Self> {
        let path = project_dir.join(CONFIG_DIR).join(CONFIG_FILE);
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_file(&path)
    }

    /// Load and validate a specific config file.
    pub fn load_file(path: &Path) -> StrataResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StrataError::config(format!("cannot read {}: {}", path.display(), e)))?;
        let config = Self::from_toml(&raw)?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(raw: &str) -> StrataResult<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> StrataResult<()> {
        if !(0.0..=100.0).contains(&self.quality.threshold) {
            return Err(StrataError::config(format!(
                "quality.threshold must be within 0..=100, got {}",
                self.quality.threshold
            )));
        }
        if self.quality.max_iterations == 0 {
            return Err(StrataError::config("quality.max_iterations must be at least 1"));
        }
        if self.quality.timeout_secs == 0 {
            return Err(StrataError::config("quality.timeout_secs must be at least 1"));
        }
        for (key, kind) in &self.options.0 {
            if let OptionKind::Choice(choices) = kind {
                if choices.is_empty() {
                    return Err(StrataError::config(format!("option '{key}' has no choices")));
                }
            }
        }
        Ok(())
    }

    /// Naming engine with configured overrides applied.
    pub fn naming_engine(&self) -> NamingEngine {
        NamingEngine::with_overrides(&self.naming.irregular, &self.naming.uncountable)
    }
}

/// Pluralization overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NamingConfig {
    /// Extra irregular plurals, singular → plural.
    pub irregular: BTreeMap<String, String>,
    /// Extra words that are their own plural.
    pub uncountable: Vec<String>,
}

/// Feature-request validation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpecConfig {
    /// Framework-owned fields a property may not be named after (snake_case).
    pub reserved_properties: Vec<String>,
}

impl Default for SpecConfig {
    fn default() -> Self {
        Self {
            reserved_properties: [
                "id",
                "created_at",
                "created_by",
                "updated_at",
                "updated_by",
                "deleted_at",
                "is_deleted",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Kind of value a feature option accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawOptionKind", into = "RawOptionKind")]
pub enum OptionKind {
    Bool,
    Choice(Vec<String>),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawOptionKind {
    Named(String),
    Choices(Vec<String>),
}

impl TryFrom<RawOptionKind> for OptionKind {
    type Error = String;

    fn try_from(raw: RawOptionKind) -> Result<Self, Self::Error> {
        match raw {
            RawOptionKind::Named(name) if name == "bool" => Ok(Self::Bool),
            RawOptionKind::Named(name) => Err(format!(
                "unknown option kind '{name}' (expected \"bool\" or a list of choices)"
            )),
            RawOptionKind::Choices(choices) => Ok(Self::Choice(
                choices.into_iter().map(|c| c.to_lowercase()).collect(),
            )),
        }
    }
}

impl From<OptionKind> for RawOptionKind {
    fn from(kind: OptionKind) -> Self {
        match kind {
            OptionKind::Bool => Self::Named("bool".to_string()),
            OptionKind::Choice(choices) => Self::Choices(choices),
        }
    }
}

/// Recognized feature options keyed by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionSchema(pub BTreeMap<String, OptionKind>);

impl Default for OptionSchema {
    fn default() -> Self {
        let mut options = BTreeMap::new();
        options.insert("realtimeUpdates".to_string(), OptionKind::Bool);
        options.insert("authEnabled".to_string(), OptionKind::Bool);
        options.insert("softDelete".to_string(), OptionKind::Bool);
        options.insert(
            "databaseProvider".to_string(),
            OptionKind::Choice(vec!["sqlserver".to_string(), "postgresql".to_string()]),
        );
        options.insert("includeDocker".to_string(), OptionKind::Bool);
        Self(options)
    }
}

impl OptionSchema {
    pub fn get(&self, key: &str) -> Option<&OptionKind> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// How to resolve a merge-guarded file holding several extension-point markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerTieBreak {
    First,
    Last,
    #[default]
    Skip,
}

/// Template catalog location and merge behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    /// Directory holding `catalog.toml`; relative paths resolve against the
    /// project directory. The built-in catalog is used when unset.
    pub path: Option<PathBuf>,
    pub multiple_markers: MarkerTieBreak,
}

/// Build-runner collaborator selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum RunnerConfig {
    /// `dotnet test` with coverlet emitting LCOV.
    Dotnet {
        #[serde(default)]
        project: Option<String>,
    },
    /// `cargo llvm-cov` emitting LCOV.
    Cargo {
        #[serde(default)]
        package: Option<String>,
    },
    /// Arbitrary command producing a report on stdout or in a file.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        format: ReportFormat,
        #[serde(default)]
        report_path: Option<PathBuf>,
    },
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::Dotnet { project: None }
    }
}

/// On-the-wire coverage report formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Lcov,
}

/// One static review rule applied to target files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChecklistRule {
    pub id: String,
    pub description: String,
    /// File-name suffixes the rule applies to; empty means every file.
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Pattern that must not appear.
    #[serde(default)]
    pub forbid: Option<String>,
    /// Pattern that must appear at least once.
    #[serde(default)]
    pub require: Option<String>,
}

/// Quality-loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityConfig {
    pub threshold: f64,
    /// Maximum Generate→Audit cycles before reporting a residual gap.
    pub max_iterations: u32,
    /// Timeout for each build-runner / VCS invocation.
    pub timeout_secs: u64,
    /// Stripped from component file stems when mapping to feature names.
    pub component_prefixes: Vec<String>,
    pub component_suffixes: Vec<String>,
    pub runner: RunnerConfig,
    pub checklist: Vec<ChecklistRule>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            threshold: 85.0,
            max_iterations: 2,
            timeout_secs: 600,
            component_prefixes: ["Create", "Update", "Delete", "Get", "Search", "List"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            component_suffixes: [
                "CommandHandler",
                "QueryHandler",
                "Command",
                "Query",
                "Handler",
                "Controller",
                "Repository",
                "Configuration",
                "Validator",
                "Service",
                "Response",
                "Mapping",
                "Hub",
                "Tests",
                "Dto",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            runner: RunnerConfig::default(),
            checklist: default_checklist(),
        }
    }
}

fn default_checklist() -> Vec<ChecklistRule> {
    vec![
        ChecklistRule {
            id: "no-todo".to_string(),
            description: "Unresolved TODO/FIXME left in source".to_string(),
            extensions: Vec::new(),
            forbid: Some(r"\b(TODO|FIXME)\b".to_string()),
            require: None,
        },
        ChecklistRule {
            id: "no-console-write".to_string(),
            description: "Console output in library code".to_string(),
            extensions: vec![".cs".to_string()],
            forbid: Some(r"Console\.Write(Line)?\(".to_string()),
            require: None,
        },
        ChecklistRule {
            id: "no-sync-over-async".to_string(),
            description: "Blocking on a task with .Result or .Wait()".to_string(),
            extensions: vec![".cs".to_string()],
            forbid: Some(r"\.Result\b|\.Wait\(\)".to_string()),
            require: None,
        },
    ]
}

/// Non-interactive recovery behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecoveryConfig {
    /// Decision taken at every failure point when no prompt is available.
    pub default: RecoveryDecisionKind,
    /// Retries allowed per failure point before Retry degrades to Abort.
    pub max_retries: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            default: RecoveryDecisionKind::Abort,
            max_retries: 2,
        }
    }
}
