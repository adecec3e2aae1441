//! Configuration module
//!
//! Reporter settings come from a config file, then `RUN_TRACKER_*`
//! environment variables, then command-line flags.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig};
pub use file::CONFIG_LOCATIONS;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::{RunPlan, VersionedComponent};
use crate::reporter::ReporterOptions;
use crate::store::DocumentId;
use crate::tracker::CountingMode;

/// Which document store backs the reporter
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// JSON files under `store.path`
    #[default]
    File,
    /// Process memory, lost on exit
    Memory,
    /// Reporting disabled
    Disabled,
}

impl StoreBackend {
    pub fn name(&self) -> &'static str {
        match self {
            StoreBackend::File => "file",
            StoreBackend::Memory => "memory",
            StoreBackend::Disabled => "disabled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "file" | "json" => Some(StoreBackend::File),
            "memory" | "mem" => Some(StoreBackend::Memory),
            "disabled" | "none" | "off" => Some(StoreBackend::Disabled),
            _ => None,
        }
    }
}

/// Document store settings
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Root directory of the file store
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// Store directory, defaulting to `<data dir>/run-tracker/store`
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("run-tracker")
                .join("store")
        })
    }
}

/// Reporter configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReporterConfig {
    /// Version of config file format
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub store: StoreConfig,

    /// Environment under test
    #[serde(default)]
    pub environment: Option<String>,

    #[serde(default)]
    pub environment_version: Option<String>,

    /// Suite name recorded on the run
    #[serde(default)]
    pub suite: Option<String>,

    #[serde(default)]
    pub release: Option<String>,

    /// Components deployed on the platform under test
    #[serde(default)]
    pub platform_components: Vec<VersionedComponent>,

    /// Existing run to report into
    #[serde(default)]
    pub test_run_id: Option<DocumentId>,

    /// Where the re-run list is written at run end
    #[serde(default)]
    pub failed_tests_file_path: Option<PathBuf>,

    #[serde(default)]
    pub counting: CountingMode,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            store: StoreConfig::default(),
            environment: None,
            environment_version: None,
            suite: None,
            release: None,
            platform_components: Vec::new(),
            test_run_id: None,
            failed_tests_file_path: None,
            counting: CountingMode::default(),
            log_level: default_log_level(),
        }
    }
}

impl ReporterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill plan fields the harness left empty
    pub fn fill_plan(&self, plan: &mut RunPlan) {
        fill(&mut plan.environment, &self.environment);
        fill(&mut plan.environment_version, &self.environment_version);
        fill(&mut plan.suite_name, &self.suite);
        fill(&mut plan.release, &self.release);
        fill(&mut plan.external_run_id, &self.test_run_id);
        if plan.platform_components.is_empty() {
            plan.platform_components = self.platform_components.clone();
        }
    }

    /// A plan built from configuration alone
    pub fn run_plan(&self) -> RunPlan {
        let mut plan = RunPlan::default();
        self.fill_plan(&mut plan);
        plan
    }

    pub fn reporter_options(&self) -> ReporterOptions {
        ReporterOptions {
            counting: self.counting,
            failed_tests_file: self.failed_tests_file_path.clone(),
        }
    }
}

fn fill<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if slot.is_none() {
        slot.clone_from(value);
    }
}
