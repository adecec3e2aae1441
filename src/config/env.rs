//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use anyhow::Result;
use std::env;
use std::path::PathBuf;

use super::{ReporterConfig, StoreBackend};
use crate::store::DocumentId;
use crate::tracker::CountingMode;

/// Environment variable prefix
const ENV_PREFIX: &str = "RUN_TRACKER";

/// Configuration from environment variables
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvConfig {
    /// Store directory from RUN_TRACKER_STORE_PATH
    pub store_path: Option<String>,
    /// Store backend from RUN_TRACKER_STORE_BACKEND
    pub store_backend: Option<String>,
    /// Environment from RUN_TRACKER_ENVIRONMENT
    pub environment: Option<String>,
    /// Environment version from RUN_TRACKER_ENVIRONMENT_VERSION
    pub environment_version: Option<String>,
    /// Suite from RUN_TRACKER_SUITE
    pub suite: Option<String>,
    /// Release from RUN_TRACKER_RELEASE
    pub release: Option<String>,
    /// External run id from RUN_TRACKER_RUN_ID
    pub run_id: Option<String>,
    /// Failed-test list path from RUN_TRACKER_FAILED_TESTS_FILE
    pub failed_tests_file: Option<String>,
    /// Counting mode from RUN_TRACKER_COUNTING
    pub counting: Option<String>,
    /// Log level from RUN_TRACKER_LOG_LEVEL
    pub log_level: Option<String>,
    /// Config file from RUN_TRACKER_CONFIG
    pub config_file: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self::load_with(|key| env::var(key).ok())
    }

    /// Load using `lookup` in place of the process environment
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}_{name}")).filter(|value| !value.trim().is_empty())
        };
        Self {
            store_path: get("STORE_PATH"),
            store_backend: get("STORE_BACKEND"),
            environment: get("ENVIRONMENT"),
            environment_version: get("ENVIRONMENT_VERSION"),
            suite: get("SUITE"),
            release: get("RELEASE"),
            run_id: get("RUN_ID"),
            failed_tests_file: get("FAILED_TESTS_FILE"),
            counting: get("COUNTING"),
            log_level: get("LOG_LEVEL"),
            config_file: get("CONFIG"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        *self != Self::default()
    }

    /// Override `config` with every variable that is set
    pub fn apply(&self, config: &mut ReporterConfig) -> Result<()> {
        if let Some(backend) = &self.store_backend {
            config.store.backend = StoreBackend::from_str(backend).ok_or_else(|| {
                anyhow::anyhow!("Invalid {ENV_PREFIX}_STORE_BACKEND '{backend}' (file, memory, disabled)")
            })?;
        }
        if let Some(path) = &self.store_path {
            config.store.path = Some(PathBuf::from(path));
        }
        if let Some(counting) = &self.counting {
            config.counting = CountingMode::from_str(counting).ok_or_else(|| {
                anyhow::anyhow!("Invalid {ENV_PREFIX}_COUNTING '{counting}' (per_test, sub_test_groups)")
            })?;
        }

        set(&mut config.environment, &self.environment);
        set(&mut config.environment_version, &self.environment_version);
        set(&mut config.suite, &self.suite);
        set(&mut config.release, &self.release);
        if let Some(id) = &self.run_id {
            config.test_run_id = Some(DocumentId::new(id.as_str()));
        }
        if let Some(path) = &self.failed_tests_file {
            config.failed_tests_file_path = Some(PathBuf::from(path));
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        Ok(())
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {ENV_PREFIX}_STORE_PATH:          {:?}", self.store_path);
        println!("  {ENV_PREFIX}_STORE_BACKEND:       {:?}", self.store_backend);
        println!("  {ENV_PREFIX}_ENVIRONMENT:         {:?}", self.environment);
        println!("  {ENV_PREFIX}_ENVIRONMENT_VERSION: {:?}", self.environment_version);
        println!("  {ENV_PREFIX}_SUITE:               {:?}", self.suite);
        println!("  {ENV_PREFIX}_RELEASE:             {:?}", self.release);
        println!("  {ENV_PREFIX}_RUN_ID:              {:?}", self.run_id);
        println!("  {ENV_PREFIX}_FAILED_TESTS_FILE:   {:?}", self.failed_tests_file);
        println!("  {ENV_PREFIX}_COUNTING:            {:?}", self.counting);
        println!("  {ENV_PREFIX}_LOG_LEVEL:           {:?}", self.log_level);
        println!("  {ENV_PREFIX}_CONFIG:              {:?}", self.config_file);
    }
}

fn set(slot: &mut Option<String>, value: &Option<String>) {
    if value.is_some() {
        slot.clone_from(value);
    }
}

/// Print all RUN_TRACKER environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_STORE_PATH           Root directory of the file store");
    println!("  {ENV_PREFIX}_STORE_BACKEND        Store backend (file, memory, disabled)");
    println!("  {ENV_PREFIX}_ENVIRONMENT          Environment under test");
    println!("  {ENV_PREFIX}_ENVIRONMENT_VERSION  Version of the environment under test");
    println!("  {ENV_PREFIX}_SUITE                Suite name recorded on the run");
    println!("  {ENV_PREFIX}_RELEASE              Release under test");
    println!("  {ENV_PREFIX}_RUN_ID               Existing run id to report into");
    println!("  {ENV_PREFIX}_FAILED_TESTS_FILE    Where to write the failed-test list");
    println!("  {ENV_PREFIX}_COUNTING             Test counting (per_test, sub_test_groups)");
    println!("  {ENV_PREFIX}_LOG_LEVEL            Log level (trace, debug, info, warn, error)");
    println!("  {ENV_PREFIX}_CONFIG               Path to configuration file");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_STORE_PATH=/var/lib/run-tracker");
    println!("  export {ENV_PREFIX}_SUITE=api");
    println!("  run-tracker replay events.jsonl");
}
