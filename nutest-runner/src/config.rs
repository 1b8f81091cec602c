// Copyright (c) The nutest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for nutest.

use crate::{errors::ConfigParseError, reporter::TestOutputDisplay};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::time::Duration;

/// Overall configuration for nutest.
///
/// This is the root data structure for nutest configuration. It is read from an optional file
/// layered on top of the defaults, and is scoped to a single test root.
#[derive(Clone, Debug)]
pub struct NutestConfig {
    root: Utf8PathBuf,
    inner: NutestConfigImpl,
}

impl NutestConfig {
    /// The default location of the config within the test root: `.config/nutest.toml`.
    pub const CONFIG_PATH: &'static str = ".config/nutest.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the nutest config from the given file, or if not specified from
    /// `.config/nutest.toml` in the test root.
    ///
    /// If the file isn't specified and the root doesn't have `.config/nutest.toml`, uses the
    /// default config options.
    pub fn from_sources(
        root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let root = root.into();
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let inner = Self::make_default_config()
            .add_source(source)
            .build()
            .and_then(|config| config.try_deserialize::<NutestConfigImpl>())
            .map_err(|err| ConfigParseError::new(&config_file, err))?;

        tracing::debug!("read config from `{config_file}`");

        Ok(Self { root, inner })
    }

    /// Returns the default configuration, scoped to the given root.
    pub fn default_config(root: impl Into<Utf8PathBuf>) -> Self {
        let inner = Self::make_default_config()
            .build()
            .and_then(|config| config.try_deserialize())
            .expect("default config is always valid");
        Self {
            root: root.into(),
            inner,
        }
    }

    /// Returns the test root this config is scoped to.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Returns the configuration for test runs.
    pub fn run(&self) -> &RunConfig {
        &self.inner.run
    }

    /// Returns the configuration for the driver.
    pub fn driver(&self) -> &DriverConfig {
        &self.inner.driver
    }

    /// Returns the configuration for JUnit reports.
    pub fn junit(&self) -> &JunitConfig {
        &self.inner.junit
    }

    /// Returns the path to the skip list.
    pub fn skip_list_path(&self) -> Utf8PathBuf {
        self.root.join(&self.inner.run.skip_list)
    }

    /// Returns the path to the required list.
    pub fn required_list_path(&self) -> Utf8PathBuf {
        self.root.join(&self.inner.run.required_list)
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct NutestConfigImpl {
    run: RunConfig,
    driver: DriverConfig,
    junit: JunitConfig,
}

/// Configuration for how tests are run.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunConfig {
    #[serde(with = "humantime_serde")]
    timeout: Duration,
    #[serde(with = "humantime_serde")]
    leak_timeout: Duration,
    script_extension: String,
    skip_list: Utf8PathBuf,
    required_list: Utf8PathBuf,
    show_output: TestOutputDisplay,
}

impl RunConfig {
    /// Returns how long a single test may run before it is killed.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns how long output is drained after the driver exits.
    pub fn leak_timeout(&self) -> Duration {
        self.leak_timeout
    }

    /// Returns the extension of test scripts, without the leading dot.
    pub fn script_extension(&self) -> &str {
        &self.script_extension
    }

    /// Returns when captured output is shown on the console.
    pub fn show_output(&self) -> TestOutputDisplay {
        self.show_output
    }
}

/// Configuration for the component manager driver.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DriverConfig {
    manifest: Utf8PathBuf,
    descriptor_prefix: String,
}

impl DriverConfig {
    /// Returns the manifest path, relative to the server data directory.
    pub fn manifest(&self) -> &Utf8Path {
        &self.manifest
    }

    /// Returns the prefix used for invocation descriptor files.
    pub fn descriptor_prefix(&self) -> &str {
        &self.descriptor_prefix
    }
}

/// Configuration for JUnit reports.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct JunitConfig {
    report_name: String,
    store_success_output: bool,
    store_failure_output: bool,
}

impl JunitConfig {
    /// Returns the name of the report.
    pub fn report_name(&self) -> &str {
        &self.report_name
    }

    /// Returns true if output from passing tests is stored in the report.
    pub fn store_success_output(&self) -> bool {
        self.store_success_output
    }

    /// Returns true if output from failing tests is stored in the report.
    pub fn store_failure_output(&self) -> bool {
        self.store_failure_output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn temp_root() -> Utf8TempDir {
        camino_tempfile::Builder::new()
            .prefix("nutest-config-")
            .tempdir()
            .expect("temp dir created")
    }

    #[test]
    fn default_config_values() {
        let config = NutestConfig::default_config("/srv/tests");

        assert_eq!(config.run().timeout(), Duration::from_secs(60));
        assert_eq!(config.run().leak_timeout(), Duration::from_millis(100));
        assert_eq!(config.run().script_extension(), "nut");
        assert_eq!(config.run().show_output(), TestOutputDisplay::Always);
        assert_eq!(config.driver().manifest(), "programs.xml");
        assert_eq!(config.driver().descriptor_prefix(), "comp_manager_programs_");
        assert_eq!(config.junit().report_name(), "nutest-run");
        assert_eq!(config.skip_list_path(), "/srv/tests/skip.lst");
        assert_eq!(config.required_list_path(), "/srv/tests/required.lst");
    }

    #[test]
    fn missing_default_file_uses_defaults() {
        let root = temp_root();
        let config = NutestConfig::from_sources(root.path(), None).expect("defaults parse");
        assert_eq!(config.run().timeout(), Duration::from_secs(60));
        assert_eq!(config.root(), root.path());
    }

    #[test]
    fn config_in_root_is_layered() {
        let root = temp_root();
        let config_dir = root.path().join(".config");
        fs_err::create_dir_all(&config_dir).unwrap();
        fs_err::write(
            config_dir.join("nutest.toml"),
            indoc! {r#"
                [run]
                timeout = "2s"
                show-output = "failure"

                [junit]
                store-success-output = false
            "#},
        )
        .unwrap();

        let config = NutestConfig::from_sources(root.path(), None).expect("config parses");
        assert_eq!(config.run().timeout(), Duration::from_secs(2));
        assert_eq!(config.run().show_output(), TestOutputDisplay::Failure);
        // Unspecified keys keep their defaults.
        assert_eq!(config.run().leak_timeout(), Duration::from_millis(100));
        assert!(!config.junit().store_success_output());
        assert!(config.junit().store_failure_output());
    }

    #[test]
    fn explicit_file_must_exist() {
        let root = temp_root();
        let missing = root.path().join("missing.toml");
        let error = NutestConfig::from_sources(root.path(), Some(&missing))
            .expect_err("missing explicit config file is an error");
        assert_eq!(error.config_file(), &missing);
    }

    #[test]
    fn invalid_duration_is_an_error() {
        let root = temp_root();
        let file = root.path().join("custom.toml");
        fs_err::write(&file, "[run]\ntimeout = \"soon\"\n").unwrap();

        let error = NutestConfig::from_sources(root.path(), Some(&file))
            .expect_err("invalid duration is an error");
        assert_eq!(error.config_file(), &file);
    }
}
