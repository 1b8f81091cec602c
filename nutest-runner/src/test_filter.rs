// Copyright (c) The nutest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filtering tests based on skip and required lists.
//!
//! The main structure in this module is [`TestFilter`], which is built from a pair of
//! [`FilterList`]s.

use crate::{config::NutestConfig, errors::FilterListError, list::TestInstance};
use camino::Utf8Path;
use std::{collections::BTreeSet, io};

/// A set of groups and tests read from a list file.
///
/// Each non-empty line that doesn't start with `#` is one entry. Lines ending in `/` name a group,
/// and other lines name a test by its qualified name (the extension is ignored).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FilterList {
    groups: BTreeSet<String>,
    tests: BTreeSet<String>,
}

impl FilterList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a list from a file.
    ///
    /// A missing file produces an empty list.
    pub fn load(path: impl AsRef<Utf8Path>) -> Result<Self, FilterListError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let list = Self::parse(&contents);
                tracing::debug!(
                    "loaded {} groups and {} tests from `{path}`",
                    list.groups.len(),
                    list.tests.len(),
                );
                Ok(list)
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("filter list `{path}` not found, treating as empty");
                Ok(Self::new())
            }
            Err(error) => Err(FilterListError::new(path, error)),
        }
    }

    /// Parses the contents of a list file.
    pub fn parse(contents: &str) -> Self {
        let mut list = Self::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.ends_with('/') {
                list.groups.insert(line.trim_end_matches('/').to_owned());
            } else {
                list.tests
                    .insert(Utf8Path::new(line).with_extension("").into_string());
            }
        }
        list
    }

    /// Returns true if the group is listed.
    pub fn contains_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }

    /// Returns true if the test, identified by its qualified name, is listed.
    pub fn contains_test(&self, qualified_name: &str) -> bool {
        self.tests.contains(qualified_name)
    }

    /// Returns true if the test is matched by this list, either through its group or by name.
    pub fn matches(&self, test: &TestInstance<'_>) -> bool {
        self.contains_group(test.group) || self.contains_test(&test.qualified_name())
    }

    /// Iterates over the listed groups.
    pub fn groups(&self) -> impl Iterator<Item = &str> + '_ {
        self.groups.iter().map(String::as_str)
    }

    /// Iterates over the listed tests.
    pub fn tests(&self) -> impl Iterator<Item = &str> + '_ {
        self.tests.iter().map(String::as_str)
    }

    /// Returns true if the list has no entries.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.tests.is_empty()
    }
}

/// Why a test was skipped.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SkipReason {
    /// The test's group is in the skip list.
    Group,

    /// The test itself is in the skip list.
    Test,
}

/// Skip and required lists for a test root.
#[derive(Clone, Debug, Default)]
pub struct TestFilter {
    skip: FilterList,
    required: FilterList,
}

impl TestFilter {
    /// Creates a new filter from skip and required lists.
    pub fn new(skip: FilterList, required: FilterList) -> Self {
        Self { skip, required }
    }

    /// Loads the skip and required lists named by the config, relative to its test root.
    pub fn load(config: &NutestConfig) -> Result<Self, FilterListError> {
        let skip = FilterList::load(config.skip_list_path())?;
        let required = FilterList::load(config.required_list_path())?;
        Ok(Self::new(skip, required))
    }

    /// Returns the reason the test should be skipped, or `None` if it should run.
    ///
    /// A group match is reported in preference to a test match.
    pub fn skip_reason(&self, test: &TestInstance<'_>) -> Option<SkipReason> {
        if self.skip.contains_group(test.group) {
            Some(SkipReason::Group)
        } else if self.skip.contains_test(&test.qualified_name()) {
            Some(SkipReason::Test)
        } else {
            None
        }
    }

    /// Returns true if the failure of this test fails the whole run.
    pub fn is_required(&self, test: &TestInstance<'_>) -> bool {
        self.required.matches(test)
    }
}
