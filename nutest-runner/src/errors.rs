// Copyright (c) The nutest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by nutest.

use camino::Utf8PathBuf;
use config::ConfigError;
use itertools::Itertools;
use std::{fmt, io};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse nutest config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    err: ConfigError,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, err: ConfigError) -> Self {
        Self {
            config_file: config_file.into(),
            err,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }
}

/// An error that occurred while reading a skip or required list.
///
/// A missing list is not an error: it is treated as empty.
#[derive(Debug, Error)]
#[error("failed to read filter list at `{path}`")]
pub struct FilterListError {
    path: Utf8PathBuf,
    #[source]
    err: io::Error,
}

impl FilterListError {
    pub(crate) fn new(path: impl Into<Utf8PathBuf>, err: io::Error) -> Self {
        Self {
            path: path.into(),
            err,
        }
    }

    /// Returns the path to the list that couldn't be read.
    pub fn path(&self) -> &Utf8PathBuf {
        &self.path
    }
}

/// A single problem with one of the test arguments passed to discovery.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    /// The test root could not be resolved.
    #[error("test root `{root}` could not be resolved")]
    RootInvalid {
        /// The root directory.
        root: Utf8PathBuf,
        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// The argument does not exist.
    #[error("file or directory does not exist: {path}")]
    DoesNotExist {
        /// The argument as passed in.
        path: Utf8PathBuf,
    },

    /// The argument exists, but is neither a file nor a directory.
    #[error("argument is not a file or directory: {path}")]
    NotFileOrDirectory {
        /// The argument as passed in.
        path: Utf8PathBuf,
    },

    /// A file argument is not contained in the test root.
    #[error("file is not contained in the test directory: {path}")]
    FileOutsideRoot {
        /// The resolved path to the file.
        path: Utf8PathBuf,
    },

    /// A directory argument is not contained in the test root.
    #[error("directory is not contained in the test directory: {path}")]
    DirectoryOutsideRoot {
        /// The resolved path to the directory.
        path: Utf8PathBuf,
    },

    /// A file argument doesn't have the expected test script extension.
    #[error("file is not a .{extension} script: {path}")]
    WrongExtension {
        /// The resolved path to the file.
        path: Utf8PathBuf,
        /// The expected extension.
        extension: String,
    },

    /// A path involved in discovery is not valid UTF-8.
    #[error("path is not valid UTF-8: {}", path.display())]
    NonUtf8Path {
        /// The offending path.
        path: std::path::PathBuf,
    },

    /// An error occurred while resolving an argument.
    #[error("failed to resolve `{path}`")]
    Resolve {
        /// The argument as passed in.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// An error occurred while walking a directory.
    #[error("error walking directory `{path}`")]
    Walk {
        /// The directory being walked.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        err: walkdir::Error,
    },
}

/// All the errors that occurred during discovery.
///
/// Discovery is all-or-nothing: if this is returned, no tests are run.
#[derive(Debug)]
pub struct DiscoveryErrors {
    errors: Vec<DiscoveryError>,
}

impl DiscoveryErrors {
    pub(crate) fn new(errors: Vec<DiscoveryError>) -> Self {
        debug_assert!(!errors.is_empty(), "at least one discovery error");
        Self { errors }
    }

    /// Iterates over the individual errors, in the order they were found.
    pub fn iter(&self) -> impl Iterator<Item = &DiscoveryError> + '_ {
        self.errors.iter()
    }

    /// Returns the number of errors.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Always false, since at least one error is stored.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for DiscoveryErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.len() == 1 {
            write!(f, "{}", self.errors[0])
        } else {
            writeln!(f, "{} errors occurred during test discovery:", self.errors.len())?;
            write!(f, "{}", self.errors.iter().map(|e| format!("  * {e}")).join("\n"))
        }
    }
}

impl std::error::Error for DiscoveryErrors {}

/// An error that occurred while reading the driver manifest.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ManifestReadError {
    /// The manifest file could not be read.
    #[error("failed to read driver manifest `{path}`")]
    Read {
        /// The manifest path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// The manifest is not well-formed XML.
    #[error("driver manifest `{path}` is not valid XML")]
    Parse {
        /// The manifest path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        err: quick_xml::Error,
    },

    /// The manifest has no root element to add programs to.
    #[error("driver manifest `{path}` has no root element")]
    NoRootElement {
        /// The manifest path.
        path: Utf8PathBuf,
    },
}

/// An error that occurred while writing the invocation descriptor for a single test.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DescriptorWriteError {
    /// Creating the temporary descriptor file failed.
    #[error("failed to create temporary invocation descriptor")]
    Create(#[source] io::Error),

    /// Writing to the temporary descriptor file failed.
    #[error("failed to write invocation descriptor to `{path}`")]
    Write {
        /// The path to the temporary file.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        err: io::Error,
    },
}

/// An error that occurred while starting the driver for a test.
///
/// These errors never abort a run: the test is recorded as an execution failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChildStartError {
    /// The invocation descriptor couldn't be written.
    #[error("error writing invocation descriptor")]
    Descriptor(#[from] DescriptorWriteError),

    /// Setting up the output pipe failed.
    #[error("error creating output pipe")]
    Pipe(#[source] io::Error),

    /// The driver process couldn't be spawned.
    #[error("error spawning driver process")]
    Spawn(#[source] io::Error),
}

/// An error that occurred while building the driver executor.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TestRunnerBuildError {
    /// An error occurred while creating the Tokio runtime.
    #[error("error creating Tokio runtime")]
    TokioRuntimeCreate(#[source] io::Error),
}

/// An error that occurred while writing a list of tests.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteTestListError {
    /// An error occurred while writing the list to the provided output.
    #[error("error writing to output")]
    Io(#[source] io::Error),

    /// An error occurred while serializing JSON, or while writing it to the provided output.
    #[error("error serializing to JSON")]
    Json(#[source] serde_json::Error),
}

/// An error that occurred while writing the JUnit report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteReportError {
    /// An error occurred while creating the report directory or file.
    #[error("error writing to path `{file}`")]
    Fs {
        /// The file being written.
        file: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// An error occurred while serializing the JUnit report.
    #[error("error serializing JUnit report to `{file}`")]
    Junit {
        /// The file being written.
        file: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: quick_junit::SerializeError,
    },
}

/// An error that occurred while writing a console event.
#[derive(Debug, Error)]
#[error("error writing event to output")]
pub struct WriteEventError(#[from] pub io::Error);

/// Displays an error along with its chain of sources, one per line.
///
/// Used by the console reporter and the JUnit writer for execution failures.
pub struct DisplayErrorChain<E>(E);

impl<E: std::error::Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self(error)
    }
}

impl<E: std::error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(err) = source {
            write!(f, "\n  caused by:\n  - {err}")?;
            source = err.source();
        }
        Ok(())
    }
}
