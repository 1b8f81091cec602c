// Copyright (c) The nutest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Code to generate JUnit XML reports from a finished run.

use super::events::{ExecutionResult, FailureStatus, SuiteReport, TestCaseRecord, TestOutcome};
use crate::{config::JunitConfig, errors::WriteReportError, runner::RunOutcome};
use camino::{Utf8Path, Utf8PathBuf};
use quick_junit::{NonSuccessKind, Report, TestCase, TestCaseStatus, TestSuite};
use std::io::Write;

static SKIPPED_MESSAGE: &str = "Test case has been skipped.";
static FAILED_MESSAGE: &str = "Test case has failed. See log for details.";

/// Writes the results of a run to a JUnit XML file.
#[derive(Clone, Debug)]
pub struct JunitWriter<'cfg> {
    config: &'cfg JunitConfig,
    path: Utf8PathBuf,
}

impl<'cfg> JunitWriter<'cfg> {
    /// Creates a new writer for the given output path.
    pub fn new(config: &'cfg JunitConfig, path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            config,
            path: path.into(),
        }
    }

    /// Returns the path the report is written to.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Builds the report for a finished run.
    pub fn to_report(&self, outcome: &RunOutcome) -> Report {
        let mut report = Report::new(self.config.report_name());
        report
            .set_timestamp(outcome.start_time)
            .set_time(outcome.elapsed)
            .add_test_suites(outcome.suites.iter().map(|suite| self.to_suite(suite)));
        report
    }

    /// Serializes the report and writes it to the output path.
    ///
    /// The report is written to a temporary file in the same directory and renamed into place, so
    /// the output path either has the complete report or is left untouched.
    pub fn write(&self, outcome: &RunOutcome) -> Result<(), WriteReportError> {
        let report = self.to_report(outcome);
        let mut buf = Vec::new();
        report
            .serialize(&mut buf)
            .map_err(|error| WriteReportError::Junit {
                file: self.path.clone(),
                error,
            })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|error| WriteReportError::Fs {
                file: parent.to_owned(),
                error,
            })?;
        }

        atomicwrites::AtomicFile::new(&self.path, atomicwrites::AllowOverwrite)
            .write(|file| file.write_all(&buf))
            .map_err(|error| WriteReportError::Fs {
                file: self.path.clone(),
                error: match error {
                    atomicwrites::Error::Internal(error) | atomicwrites::Error::User(error) => error,
                },
            })?;

        tracing::debug!("wrote JUnit report to `{}`", self.path);
        Ok(())
    }

    fn to_suite(&self, suite: &SuiteReport) -> TestSuite {
        let mut testsuite = TestSuite::new(suite.group.as_str());
        testsuite
            .set_timestamp(suite.timestamp)
            .set_time(suite.time_taken)
            .add_test_cases(suite.records.iter().map(|record| self.to_testcase(record)));
        testsuite
    }

    fn to_testcase(&self, record: &TestCaseRecord) -> TestCase {
        let (status, store_output) = match record.outcome {
            TestOutcome::Passed => (
                TestCaseStatus::success(),
                self.config.store_success_output(),
            ),
            TestOutcome::Failed(result) => {
                let (kind, ty) = kind_ty(result);
                let mut status = TestCaseStatus::non_success(kind);
                status.set_message(FAILED_MESSAGE).set_type(ty);
                (status, self.config.store_failure_output())
            }
            TestOutcome::Skipped(_) => {
                let mut status = TestCaseStatus::skipped();
                status.set_message(SKIPPED_MESSAGE);
                (status, false)
            }
        };

        let mut testcase = TestCase::new(record.name.as_str(), status);
        testcase
            .set_classname(record.classname.as_str())
            .set_timestamp(record.start_time)
            .set_time(record.time_taken);
        if store_output && !record.output.is_empty() {
            testcase.set_system_out(record.output.as_str());
        }
        testcase
    }
}

fn kind_ty(result: ExecutionResult) -> (NonSuccessKind, String) {
    match result {
        ExecutionResult::Fail {
            failure: FailureStatus::ExitCode(code),
        } => (
            NonSuccessKind::Failure,
            format!("test failure with exit code {code}"),
        ),
        ExecutionResult::Fail {
            failure: FailureStatus::Signal(signal),
        } => (
            NonSuccessKind::Failure,
            format!("test killed by signal {signal}"),
        ),
        ExecutionResult::Timeout => (NonSuccessKind::Failure, "test timeout".to_owned()),
        ExecutionResult::ExecFail => (NonSuccessKind::Error, "execution failure".to_owned()),
        // Passing tests don't reach here, but map them to something sensible anyway.
        ExecutionResult::Pass => (NonSuccessKind::Failure, "test failure".to_owned()),
    }
}
