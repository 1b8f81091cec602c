// Copyright (c) The nutest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `nutest` failures.
///
/// `nutest` runs may fail for a variety of reasons. This structure documents the exit codes that
/// may occur in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum NutestExitCode {}

impl NutestExitCode {
    /// No errors occurred and nutest exited normally.
    pub const OK: i32 = 0;

    /// At least one required test failed.
    ///
    /// Failures of tests that are not listed in `required.lst` never produce this exit code.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// One or more test arguments could not be turned into tests.
    pub const DISCOVERY_FAILED: i32 = 104;

    /// Writing data to stdout, stderr or the JUnit report produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;

    /// A user issue happened while setting up a nutest invocation: a missing driver or client
    /// binary, a bad server data directory, or an invalid configuration file.
    pub const SETUP_ERROR: i32 = 96;
}
