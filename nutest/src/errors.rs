// Copyright (c) The nutest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::Utf8PathBuf;
use nutest_metadata::NutestExitCode;
use nutest_runner::errors::*;
use owo_colors::OwoColorize;
use std::error::Error;
use thiserror::Error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// Which external program a path refers to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[doc(hidden)]
pub enum ProgramKind {
    Driver,
    Client,
}

impl ProgramKind {
    fn as_str(self) -> &'static str {
        match self {
            ProgramKind::Driver => "driver",
            ProgramKind::Client => "client",
        }
    }
}

// Note that the #[error()] strings are mostly placeholder messages -- the expected way to print out
// errors is with the display_to_stderr method, which colorizes errors.

/// An error that nutest expects and reports cleanly, rather than a bug.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine the default test root")]
    RootDirUnknown {
        #[source]
        err: std::io::Error,
    },
    #[error("test root is not a directory")]
    RootDirInvalid { path: Utf8PathBuf },
    #[error("missing required argument")]
    MissingArgument { arg: &'static str },
    #[error("program not found")]
    ProgramNotFound {
        kind: ProgramKind,
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("program is not an executable file")]
    ProgramNotExecutable { kind: ProgramKind, path: Utf8PathBuf },
    #[error("server data directory is invalid")]
    ServerDataInvalid { path: Utf8PathBuf },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("filter list read error")]
    FilterListError {
        #[from]
        err: FilterListError,
    },
    #[error("manifest read error")]
    ManifestReadError {
        #[from]
        err: ManifestReadError,
    },
    #[error("test runner build error")]
    TestRunnerBuildError {
        #[from]
        err: TestRunnerBuildError,
    },
    #[error("test discovery failed")]
    DiscoveryFailed {
        #[from]
        errors: DiscoveryErrors,
    },
    #[error("error writing test list")]
    WriteTestListError {
        #[from]
        err: WriteTestListError,
    },
    #[error("error writing event")]
    WriteEventError {
        #[from]
        err: WriteEventError,
    },
    #[error("error writing JUnit report")]
    WriteReportError {
        #[from]
        err: WriteReportError,
    },
    #[error("test run failed")]
    TestRunFailed { required_failures: Vec<String> },
}

impl ExpectedError {
    pub(crate) fn program_not_found(
        kind: ProgramKind,
        path: impl Into<Utf8PathBuf>,
        err: std::io::Error,
    ) -> Self {
        Self::ProgramNotFound {
            kind,
            path: path.into(),
            err,
        }
    }

    pub(crate) fn test_run_failed(required_failures: Vec<String>) -> Self {
        Self::TestRunFailed { required_failures }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::RootDirUnknown { .. }
            | Self::RootDirInvalid { .. }
            | Self::MissingArgument { .. }
            | Self::ProgramNotFound { .. }
            | Self::ProgramNotExecutable { .. }
            | Self::ServerDataInvalid { .. }
            | Self::ConfigParseError { .. }
            | Self::FilterListError { .. }
            | Self::ManifestReadError { .. }
            | Self::TestRunnerBuildError { .. } => NutestExitCode::SETUP_ERROR,
            Self::DiscoveryFailed { .. } => NutestExitCode::DISCOVERY_FAILED,
            Self::WriteTestListError { .. }
            | Self::WriteEventError { .. }
            | Self::WriteReportError { .. } => NutestExitCode::WRITE_OUTPUT_ERROR,
            Self::TestRunFailed { .. } => NutestExitCode::TEST_RUN_FAILED,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::RootDirUnknown { err } => {
                tracing::error!(
                    "could not determine the directory of the nutest executable \
                     (pass in {} explicitly)",
                    "--root-dir".style(styles.bold),
                );
                Some(err as &dyn Error)
            }
            Self::RootDirInvalid { path } => {
                tracing::error!(
                    "test root `{}` is not a directory",
                    path.style(styles.bold),
                );
                None
            }
            Self::MissingArgument { arg } => {
                tracing::error!("{} is required to run tests", arg.style(styles.bold));
                None
            }
            Self::ProgramNotFound { kind, path, err } => {
                tracing::error!("{} `{}` not found", kind.as_str(), path.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::ProgramNotExecutable { kind, path } => {
                tracing::error!(
                    "{} `{}` is not an executable file",
                    kind.as_str(),
                    path.style(styles.bold),
                );
                None
            }
            Self::ServerDataInvalid { path } => {
                tracing::error!(
                    "server data directory `{}` is not a directory",
                    path.style(styles.bold),
                );
                None
            }
            Self::ConfigParseError { err } => {
                tracing::error!(
                    "failed to parse nutest config at `{}`",
                    err.config_file().style(styles.bold),
                );
                err.source()
            }
            Self::FilterListError { err } => {
                tracing::error!("failed to read `{}`", err.path().style(styles.bold));
                err.source()
            }
            Self::ManifestReadError { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::TestRunnerBuildError { err } => {
                tracing::error!("failed to build test runner");
                Some(err as &dyn Error)
            }
            Self::DiscoveryFailed { errors } => {
                for error in errors.iter() {
                    tracing::error!("{error}");
                }
                tracing::error!(
                    "test discovery failed with {} {}",
                    errors.len().style(styles.bold),
                    if errors.len() == 1 { "error" } else { "errors" },
                );
                None
            }
            Self::WriteTestListError { err } => {
                tracing::error!("failed to write test list to output");
                Some(err as &dyn Error)
            }
            Self::WriteEventError { err } => {
                tracing::error!("failed to write event to output");
                Some(err as &dyn Error)
            }
            Self::WriteReportError { err } => {
                tracing::error!("failed to write JUnit report");
                Some(err as &dyn Error)
            }
            Self::TestRunFailed { required_failures } => {
                tracing::error!(
                    "test run failed: {} required {} failed",
                    required_failures.len().style(styles.bold),
                    if required_failures.len() == 1 {
                        "test"
                    } else {
                        "tests"
                    },
                );
                None
            }
        };

        while let Some(err) = next_error {
            tracing::error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
