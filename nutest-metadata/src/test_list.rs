// Copyright (c) The nutest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root element for a serializable list of discovered test scripts.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct TestListSummary {
    /// The root directory all test scripts were discovered under.
    pub root: Utf8PathBuf,

    /// The file extension test scripts are expected to have, without the leading dot.
    pub script_extension: String,

    /// Number of tests across all groups.
    pub test_count: usize,

    /// Groups of tests, in discovery order.
    pub groups: Vec<TestGroupSummary>,
}

impl TestListSummary {
    /// Creates a new `TestListSummary` with no groups.
    pub fn new(root: impl Into<Utf8PathBuf>, script_extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            script_extension: script_extension.into(),
            test_count: 0,
            groups: Vec::new(),
        }
    }

    /// Parses JSON output from `nutest --list --message-format json`.
    pub fn parse_json(json: impl AsRef<str>) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json.as_ref())
    }
}

/// A single group of tests: the tests found in one directory under the root.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct TestGroupSummary {
    /// The directory of the group relative to the root, with `/` separators.
    ///
    /// Tests directly under the root have an empty group.
    pub group: String,

    /// The tests in this group, keyed by name, along with filter information.
    pub tests: BTreeMap<String, TestCaseSummary>,
}

impl TestGroupSummary {
    /// Creates a new, empty group.
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            tests: BTreeMap::new(),
        }
    }
}

/// Serializable information about a single discovered test.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct TestCaseSummary {
    /// The absolute path to the test script.
    pub script_path: Utf8PathBuf,

    /// True if the test matches the skip list and will not be run.
    pub skipped: bool,

    /// True if the test matches the required list: its failure fails the whole run.
    pub required: bool,
}

impl TestCaseSummary {
    /// Creates a new summary for a test script.
    pub fn new(script_path: impl Into<Utf8PathBuf>, skipped: bool, required: bool) -> Self {
        Self {
            script_path: script_path.into(),
            skipped,
            required,
        }
    }
}
