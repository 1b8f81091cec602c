// Copyright (c) The nutest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events and results produced by a test run.
//!
//! The scheduler emits [`TestEvent`]s as the run progresses, and collects [`SuiteReport`]s and
//! [`RunStats`] as it goes.

use crate::{list::TestInstance, runner::TestOrder, test_filter::SkipReason};
use chrono::{DateTime, Local};
use std::time::Duration;

/// A test event.
///
/// Events are produced by a [`TestRunner`](crate::runner::TestRunner) and consumed by a
/// [`TestReporter`](crate::reporter::TestReporter).
#[derive(Clone, Debug)]
pub struct TestEvent<'a> {
    /// The time at which the event was generated.
    pub timestamp: DateTime<Local>,

    /// The amount of time elapsed since the start of the test run.
    pub elapsed: Duration,

    /// The kind of test event this is.
    pub kind: TestEventKind<'a>,
}

/// The kind of test event this is.
///
/// Forms part of [`TestEvent`].
#[derive(Clone, Debug)]
pub enum TestEventKind<'a> {
    /// The test run started.
    RunStarted {
        /// The number of tests that will be run or skipped.
        test_count: usize,

        /// The number of groups.
        group_count: usize,

        /// The order tests are run in within each group.
        order: TestOrder,
    },

    /// A group of tests started.
    GroupStarted {
        /// The group, possibly empty.
        group: &'a str,

        /// The index of this group, starting from 1.
        index: usize,

        /// The total number of groups.
        group_count: usize,

        /// The number of tests in this group.
        test_count: usize,
    },

    /// A test started running.
    TestStarted {
        /// The test that was started.
        test_instance: TestInstance<'a>,

        /// The path to the test script.
        script_path: &'a str,

        /// The index of this test within its group, starting from 1.
        index: usize,

        /// The number of tests in the group.
        group_test_count: usize,
    },

    /// A test finished running.
    TestFinished {
        /// The test that finished.
        test_instance: TestInstance<'a>,

        /// The result of running the test.
        status: &'a ExecuteStatus,

        /// True if the test is in the required list.
        required: bool,

        /// Statistics for the run so far.
        current_stats: RunStats,
    },

    /// A test was skipped.
    TestSkipped {
        /// The test that was skipped.
        test_instance: TestInstance<'a>,

        /// Why the test was skipped.
        reason: SkipReason,
    },

    /// The test run finished.
    RunFinished {
        /// The time at which the run was started.
        start_time: DateTime<Local>,

        /// The amount of time it took for the tests to run.
        elapsed: Duration,

        /// Statistics for the run.
        run_stats: RunStats,

        /// Qualified names of required tests that failed.
        required_failures: &'a [String],
    },
}

/// Information about a single execution of a test.
#[derive(Clone, Debug)]
pub struct ExecuteStatus {
    /// The result of executing this test: pass, fail, timeout or execution error.
    pub result: ExecutionResult,

    /// Combined standard output and standard error.
    ///
    /// For execution failures this is a description of the error instead.
    pub output: String,

    /// The time at which the test started.
    pub start_time: DateTime<Local>,

    /// The time it took for the test to run.
    pub time_taken: Duration,

    /// True if a process started by the test held the output open after the driver exited.
    pub leaked: bool,
}

/// Whether a test passed, failed, timed out or couldn't be executed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ExecutionResult {
    /// The driver exited with code 0.
    Pass,

    /// The driver exited with a non-zero code or was killed by a signal.
    Fail {
        /// How the driver failed.
        failure: FailureStatus,
    },

    /// The test exceeded its timeout and was killed, along with its whole process group.
    Timeout,

    /// The descriptor couldn't be written or the driver couldn't be started.
    ExecFail,
}

impl ExecutionResult {
    /// Returns true if the test was successful.
    pub fn is_success(self) -> bool {
        matches!(self, ExecutionResult::Pass)
    }

    /// Returns true if the test timed out.
    pub fn timed_out(self) -> bool {
        matches!(self, ExecutionResult::Timeout)
    }
}

/// How a driver failed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FailureStatus {
    /// The driver exited with this non-zero code.
    ExitCode(i32),

    /// The driver was terminated by this signal.
    Signal(i32),
}

/// The outcome of a single test, as recorded in reports.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TestOutcome {
    /// The test was run and passed.
    Passed,

    /// The test was run and did not pass.
    Failed(ExecutionResult),

    /// The test was not run.
    Skipped(SkipReason),
}

impl TestOutcome {
    /// Converts the result of an execution to an outcome.
    pub fn from_result(result: ExecutionResult) -> Self {
        if result.is_success() {
            TestOutcome::Passed
        } else {
            TestOutcome::Failed(result)
        }
    }
}

/// The record of a single test within a [`SuiteReport`].
#[derive(Clone, Debug)]
pub struct TestCaseRecord {
    /// The name of the test.
    pub name: String,

    /// The qualified name (`group/name`) of the test.
    pub qualified_name: String,

    /// The qualified name with `.` separators.
    pub classname: String,

    /// The time at which the test was started or skipped.
    pub start_time: DateTime<Local>,

    /// The time the test took. Zero for skipped tests.
    pub time_taken: Duration,

    /// Captured output. Empty for skipped tests.
    pub output: String,

    /// The outcome of the test.
    pub outcome: TestOutcome,

    /// True if the test is in the required list.
    pub required: bool,
}

impl TestCaseRecord {
    pub(crate) fn executed(
        test: &TestInstance<'_>,
        status: &ExecuteStatus,
        required: bool,
    ) -> Self {
        Self {
            name: test.name.to_owned(),
            qualified_name: test.qualified_name(),
            classname: test.classname(),
            start_time: status.start_time,
            time_taken: status.time_taken,
            output: status.output.clone(),
            outcome: TestOutcome::from_result(status.result),
            required,
        }
    }

    pub(crate) fn skipped(
        test: &TestInstance<'_>,
        reason: SkipReason,
        start_time: DateTime<Local>,
        required: bool,
    ) -> Self {
        Self {
            name: test.name.to_owned(),
            qualified_name: test.qualified_name(),
            classname: test.classname(),
            start_time,
            time_taken: Duration::ZERO,
            output: String::new(),
            outcome: TestOutcome::Skipped(reason),
            required,
        }
    }
}

/// The results for a group of tests.
#[derive(Clone, Debug)]
pub struct SuiteReport {
    /// The group, possibly empty.
    pub group: String,

    /// The time at which the group started.
    pub timestamp: DateTime<Local>,

    /// The time the group took to run.
    pub time_taken: Duration,

    /// One record per test, in the order the tests were run.
    pub records: Vec<TestCaseRecord>,
}

/// Statistics for a test run.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
pub struct RunStats {
    /// The total number of tests discovered at the beginning of the run.
    pub initial_run_count: usize,

    /// The number of tests that have a final outcome, including skipped tests.
    pub finished_count: usize,

    /// The number of tests that passed.
    pub passed: usize,

    /// The number of tests that did not pass. Includes `timed_out` and `exec_failed`.
    pub failed: usize,

    /// The number of tests that timed out.
    pub timed_out: usize,

    /// The number of tests that couldn't be executed.
    pub exec_failed: usize,

    /// The number of tests that were skipped.
    pub skipped: usize,

    /// The number of failed tests that were in the required list.
    pub required_failed: usize,

    /// The number of groups.
    pub total_groups: usize,
}

impl RunStats {
    /// Returns true if this run is considered a success.
    ///
    /// Only failures of required tests fail a run.
    pub fn is_success(&self) -> bool {
        self.required_failed == 0
    }

    /// Returns true if any tests failed, required or not.
    pub fn any_failed(&self) -> bool {
        self.failed > 0
    }

    pub(crate) fn on_test_finished(&mut self, status: &ExecuteStatus, required: bool) {
        self.finished_count += 1;
        match status.result {
            ExecutionResult::Pass => {
                self.passed += 1;
                return;
            }
            ExecutionResult::Fail { .. } => {}
            ExecutionResult::Timeout => self.timed_out += 1,
            ExecutionResult::ExecFail => self.exec_failed += 1,
        }
        self.failed += 1;
        if required {
            self.required_failed += 1;
        }
    }

    pub(crate) fn on_test_skipped(&mut self) {
        self.finished_count += 1;
        self.skipped += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn status(result: ExecutionResult) -> ExecuteStatus {
        ExecuteStatus {
            result,
            output: String::new(),
            start_time: Local::now(),
            time_taken: Duration::from_millis(5),
            leaked: false,
        }
    }

    #[test_case(ExecutionResult::Pass, false, RunStats { finished_count: 1, passed: 1, ..RunStats::default() } ; "pass")]
    #[test_case(ExecutionResult::Pass, true, RunStats { finished_count: 1, passed: 1, ..RunStats::default() } ; "required pass")]
    #[test_case(
        ExecutionResult::Fail { failure: FailureStatus::ExitCode(1) }, false,
        RunStats { finished_count: 1, failed: 1, ..RunStats::default() } ; "fail"
    )]
    #[test_case(
        ExecutionResult::Fail { failure: FailureStatus::Signal(9) }, true,
        RunStats { finished_count: 1, failed: 1, required_failed: 1, ..RunStats::default() } ; "required fail"
    )]
    #[test_case(
        ExecutionResult::Timeout, true,
        RunStats { finished_count: 1, failed: 1, timed_out: 1, required_failed: 1, ..RunStats::default() } ; "required timeout"
    )]
    #[test_case(
        ExecutionResult::ExecFail, false,
        RunStats { finished_count: 1, failed: 1, exec_failed: 1, ..RunStats::default() } ; "exec fail"
    )]
    fn stats_on_test_finished(result: ExecutionResult, required: bool, expected: RunStats) {
        let mut stats = RunStats::default();
        stats.on_test_finished(&status(result), required);
        assert_eq!(stats, expected);
        assert_eq!(stats.is_success(), expected.required_failed == 0);
    }

    #[test]
    fn skipped_tests_count_as_finished() {
        let mut stats = RunStats {
            initial_run_count: 2,
            ..RunStats::default()
        };
        stats.on_test_skipped();
        stats.on_test_finished(&status(ExecutionResult::Timeout), false);

        assert_eq!(stats.finished_count, stats.initial_run_count);
        assert_eq!(stats.skipped, 1);
        assert!(stats.any_failed());
        assert!(stats.is_success(), "non-required failures don't fail the run");
    }

    #[test]
    fn outcome_from_result() {
        assert_eq!(
            TestOutcome::from_result(ExecutionResult::Pass),
            TestOutcome::Passed
        );
        assert_eq!(
            TestOutcome::from_result(ExecutionResult::Timeout),
            TestOutcome::Failed(ExecutionResult::Timeout)
        );
        assert!(ExecutionResult::Timeout.timed_out());
        assert!(!ExecutionResult::ExecFail.is_success());
    }

    #[test]
    fn records() {
        let test = TestInstance::new("net/tcp", "connect");
        let record = TestCaseRecord::executed(&test, &status(ExecutionResult::Pass), true);
        assert_eq!(record.name, "connect");
        assert_eq!(record.qualified_name, "net/tcp/connect");
        assert_eq!(record.classname, "net.tcp.connect");
        assert_eq!(record.outcome, TestOutcome::Passed);
        assert!(record.required);

        let skipped = TestCaseRecord::skipped(&test, SkipReason::Group, Local::now(), false);
        assert_eq!(skipped.outcome, TestOutcome::Skipped(SkipReason::Group));
        assert_eq!(skipped.time_taken, Duration::ZERO);
    }
}
