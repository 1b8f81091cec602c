// Copyright (c) The nutest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for nutest, a runner for directories of test scripts driven by an external
//! component manager.
//!
//! The basic flow of operations is:
//!
//! 1. Read a [`NutestConfig`](config::NutestConfig).
//! 2. Load skip and required lists into a [`TestFilter`](test_filter::TestFilter).
//! 3. Discover tests into a [`TestList`](list::TestList).
//! 4. Run them one at a time through a [`TestRunner`](runner::TestRunner), feeding events to a
//!    [`TestReporter`](reporter::TestReporter).
//! 5. Write the results out with a [`JunitWriter`](reporter::JunitWriter).

cfg_if::cfg_if! {
    if #[cfg(not(unix))] {
        compile_error!("nutest relies on Unix process groups and only supports Unix platforms");
    }
}

pub mod config;
pub mod descriptor;
pub mod errors;
pub mod list;
pub mod reporter;
pub mod runner;
mod test_command;
pub mod test_filter;
mod time;
