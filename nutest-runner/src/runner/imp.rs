// Copyright (c) The nutest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{TestOrder, UnitExecutor};
use crate::{
    list::{TestInstance, TestList},
    reporter::{
        ExecuteStatus, RunStats, SuiteReport, TestCaseRecord, TestEvent, TestEventKind,
    },
    test_filter::TestFilter,
    time::{StopwatchStart, stopwatch},
};
use camino::Utf8Path;
use chrono::{DateTime, Local};
use std::{convert::Infallible, time::Duration};

impl<E: UnitExecutor + ?Sized> UnitExecutor for &mut E {
    fn execute(&mut self, test: &TestInstance<'_>, script_path: &Utf8Path) -> ExecuteStatus {
        (**self).execute(test, script_path)
    }
}

/// Test runner options.
#[derive(Debug, Default)]
pub struct TestRunnerBuilder {
    order: Option<TestOrder>,
}

impl TestRunnerBuilder {
    /// Sets the order tests are run in within each group.
    ///
    /// Defaults to a random shuffle.
    pub fn set_order(&mut self, order: TestOrder) -> &mut Self {
        self.order = Some(order);
        self
    }

    /// Creates a new test runner.
    pub fn build<'a, E: UnitExecutor>(
        self,
        test_list: &'a TestList,
        filter: &'a TestFilter,
        executor: E,
    ) -> TestRunner<'a, E> {
        let order = self.order.unwrap_or_else(TestOrder::random);
        TestRunner {
            test_list,
            filter,
            executor,
            order,
        }
    }
}

/// Context for running tests.
///
/// Created using [`TestRunnerBuilder::build`].
#[derive(Debug)]
pub struct TestRunner<'a, E> {
    test_list: &'a TestList,
    filter: &'a TestFilter,
    executor: E,
    order: TestOrder,
}

impl<'a, E: UnitExecutor> TestRunner<'a, E> {
    /// Returns the order tests will be run in within each group.
    pub fn order(&self) -> TestOrder {
        self.order
    }

    /// Executes the listed tests, each one in turn.
    ///
    /// The callback is called with the results of each test.
    pub fn execute<F>(&mut self, mut callback: F) -> RunOutcome
    where
        F: FnMut(TestEvent<'_>),
    {
        let res: Result<RunOutcome, Infallible> = self.try_execute(|event| {
            callback(event);
            Ok(())
        });
        match res {
            Ok(outcome) => outcome,
        }
    }

    /// Executes the listed tests, each one in turn.
    ///
    /// Accepts a callback that is called with the results of each test. If the callback returns an
    /// error, the run is stopped and the error is returned. The test that was running when the
    /// error occurred is allowed to finish first.
    pub fn try_execute<F, Err>(&mut self, callback: F) -> Result<RunOutcome, Err>
    where
        F: FnMut(TestEvent<'_>) -> Result<(), Err>,
    {
        let test_list = self.test_list;
        let filter = self.filter;
        let group_count = test_list.group_count();

        let mut cx = CallbackContext::new(callback);
        let mut run_stats = RunStats {
            initial_run_count: test_list.test_count(),
            total_groups: group_count,
            ..RunStats::default()
        };
        let mut suites = Vec::with_capacity(group_count);
        let mut required_failures = Vec::new();
        let mut orderer = self.order.orderer();

        tracing::info!("test order within groups: {}", self.order);
        cx.emit(TestEventKind::RunStarted {
            test_count: test_list.test_count(),
            group_count,
            order: self.order,
        })?;

        for (group_index, (group, names)) in test_list.iter_groups().enumerate() {
            let group_stopwatch = stopwatch();
            cx.emit(TestEventKind::GroupStarted {
                group,
                index: group_index + 1,
                group_count,
                test_count: names.len(),
            })?;

            let mut names: Vec<&str> = names.iter().map(String::as_str).collect();
            orderer.order(&mut names);

            let mut records = Vec::with_capacity(names.len());
            for (test_index, &name) in names.iter().enumerate() {
                let test_instance = TestInstance::new(group, name);
                let required = filter.is_required(&test_instance);

                // Skipping takes precedence over everything else: skipped tests are never run.
                if let Some(reason) = filter.skip_reason(&test_instance) {
                    run_stats.on_test_skipped();
                    records.push(TestCaseRecord::skipped(
                        &test_instance,
                        reason,
                        Local::now(),
                        required,
                    ));
                    cx.emit(TestEventKind::TestSkipped {
                        test_instance,
                        reason,
                    })?;
                    continue;
                }

                let script_path = test_list.script_path(&test_instance);
                cx.emit(TestEventKind::TestStarted {
                    test_instance,
                    script_path: script_path.as_str(),
                    index: test_index + 1,
                    group_test_count: names.len(),
                })?;

                let status = self.executor.execute(&test_instance, &script_path);
                run_stats.on_test_finished(&status, required);
                if required && !status.result.is_success() {
                    required_failures.push(test_instance.qualified_name());
                }
                records.push(TestCaseRecord::executed(&test_instance, &status, required));

                cx.emit(TestEventKind::TestFinished {
                    test_instance,
                    status: &status,
                    required,
                    current_stats: run_stats,
                })?;
            }

            let snapshot = group_stopwatch.snapshot();
            suites.push(SuiteReport {
                group: group.to_owned(),
                timestamp: snapshot.start_time,
                time_taken: snapshot.duration,
                records,
            });
        }

        let snapshot = cx.stopwatch.snapshot();
        cx.emit(TestEventKind::RunFinished {
            start_time: snapshot.start_time,
            elapsed: snapshot.duration,
            run_stats,
            required_failures: &required_failures,
        })?;

        Ok(RunOutcome {
            start_time: snapshot.start_time,
            elapsed: snapshot.duration,
            stats: run_stats,
            suites,
            required_failures,
        })
    }
}

/// The results of a test run.
#[derive(Clone, Debug)]
pub struct RunOutcome {
    /// The time at which the run was started.
    pub start_time: DateTime<Local>,

    /// The amount of time the run took.
    pub elapsed: Duration,

    /// Statistics for the run.
    pub stats: RunStats,

    /// One report per group, in discovery order.
    pub suites: Vec<SuiteReport>,

    /// Qualified names of required tests that failed, in the order they ran.
    pub required_failures: Vec<String>,
}

impl RunOutcome {
    /// Returns true if no required test failed.
    pub fn is_success(&self) -> bool {
        self.stats.is_success()
    }
}

struct CallbackContext<F> {
    callback: F,
    stopwatch: StopwatchStart,
}

impl<F, Err> CallbackContext<F>
where
    F: FnMut(TestEvent<'_>) -> Result<(), Err>,
{
    fn new(callback: F) -> Self {
        Self {
            callback,
            stopwatch: stopwatch(),
        }
    }

    fn emit(&mut self, kind: TestEventKind<'_>) -> Result<(), Err> {
        let event = TestEvent {
            timestamp: Local::now(),
            elapsed: self.stopwatch.snapshot().duration,
            kind,
        };
        (self.callback)(event)
    }
}
