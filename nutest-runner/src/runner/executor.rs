// Copyright (c) The nutest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running a single test through the component manager driver.
//!
//! Tests run one at a time: the executor owns a current-thread Tokio runtime and blocks on each
//! test in turn.

use super::os;
use crate::{
    config::NutestConfig,
    descriptor::ManifestTemplate,
    errors::{ChildStartError, DisplayErrorChain, TestRunnerBuildError},
    list::TestInstance,
    reporter::{ExecuteStatus, ExecutionResult, FailureStatus},
    test_command::{Child, DriverCommand},
    time::{StopwatchSnapshot, stopwatch},
};
use camino::{Utf8Path, Utf8PathBuf};
use debug_ignore::DebugIgnore;
use std::{process::ExitStatus, time::Duration};
use tokio::runtime::Runtime;

/// Executes a single test and reports how it went.
///
/// Implementations must always produce a status: errors starting the test are reported as
/// [`ExecutionResult::ExecFail`].
pub trait UnitExecutor {
    /// Runs the test whose script is at `script_path`.
    fn execute(&mut self, test: &TestInstance<'_>, script_path: &Utf8Path) -> ExecuteStatus;
}

/// The state of a single test execution.
///
/// Transitions are `Starting -> Running -> Completed | Killed`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UnitState {
    /// The descriptor is being written and the driver spawned.
    Starting,

    /// The driver is running.
    Running,

    /// The driver exited on its own.
    Completed,

    /// The driver hit its timeout and its process group was killed.
    Killed,
}

impl UnitState {
    /// Returns true if moving from this state to `next` is allowed.
    pub fn can_transition_to(self, next: UnitState) -> bool {
        matches!(
            (self, next),
            (UnitState::Starting, UnitState::Running)
                | (UnitState::Running, UnitState::Completed)
                | (UnitState::Running, UnitState::Killed)
        )
    }

    /// Returns true if the execution is over.
    pub fn is_terminal(self) -> bool {
        matches!(self, UnitState::Completed | UnitState::Killed)
    }
}

/// Paths to the external programs and data used to run tests.
#[derive(Clone, Debug)]
pub struct DriverPaths {
    /// The component manager driver.
    pub driver: Utf8PathBuf,

    /// The client program the driver runs against each test script.
    pub client: Utf8PathBuf,

    /// The server data directory, used as the driver's working directory.
    pub server_data: Utf8PathBuf,
}

/// Runs tests by invoking the component manager driver with a per-test descriptor.
#[derive(Debug)]
pub struct DriverExecutor {
    paths: DriverPaths,
    template: ManifestTemplate,
    descriptor_prefix: String,
    timeout: Duration,
    leak_timeout: Duration,
    runtime: DebugIgnore<Runtime>,
}

impl DriverExecutor {
    /// Creates a new executor.
    pub fn new(
        paths: DriverPaths,
        template: ManifestTemplate,
        config: &NutestConfig,
    ) -> Result<Self, TestRunnerBuildError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .thread_name("nutest-runner-worker")
            .build()
            .map_err(TestRunnerBuildError::TokioRuntimeCreate)?;

        Ok(Self {
            paths,
            template,
            descriptor_prefix: config.driver().descriptor_prefix().to_owned(),
            timeout: config.run().timeout(),
            leak_timeout: config.run().leak_timeout(),
            runtime: DebugIgnore(runtime),
        })
    }

    async fn run_driver(&self, descriptor: &Utf8Path) -> Result<UnitRun, ChildStartError> {
        let mut state = UnitTracker::new();

        let stopwatch = stopwatch();
        let Child {
            mut child,
            mut output,
        } = DriverCommand::new(&self.paths.driver, descriptor, &self.paths.server_data).spawn()?;
        let pid = child.id();
        state.transition(UnitState::Running);

        let mut timeout = std::pin::pin!(tokio::time::sleep(self.timeout));
        let wait_res = loop {
            tokio::select! {
                () = output.fill_buf(), if !output.is_done() => {}
                res = child.wait() => {
                    state.transition(UnitState::Completed);
                    break res;
                }
                () = &mut timeout => {
                    state.transition(UnitState::Killed);
                    tracing::debug!(
                        "driver exceeded timeout of {:?}, killing process group",
                        self.timeout,
                    );
                    if let Some(pid) = pid {
                        os::kill_process_group(pid);
                    }
                    // SIGKILL can't be caught, so this returns promptly.
                    break child.wait().await;
                }
            }
        };

        // The driver has exited, but processes it started may still hold the output pipe open.
        let drained = tokio::time::timeout(self.leak_timeout, output.drain()).await;
        let leaked = drained.is_err();
        if leaked {
            if let Some(pid) = pid {
                os::kill_process_group(pid);
            }
        }

        let (output, errors) = output.finish();
        for error in errors {
            tracing::warn!("error reading driver output: {error}");
        }

        Ok(UnitRun {
            snapshot: stopwatch.snapshot(),
            state: state.finish(),
            exit_status: wait_res,
            output,
            leaked,
        })
    }
}

impl UnitExecutor for DriverExecutor {
    fn execute(&mut self, test: &TestInstance<'_>, script_path: &Utf8Path) -> ExecuteStatus {
        // Only used if the driver never starts; runs are timed from just before the spawn.
        let attempt = stopwatch();

        let res = self
            .template
            .write_descriptor(&self.paths.client, script_path, &self.descriptor_prefix)
            .map_err(ChildStartError::from)
            .and_then(|descriptor| {
                let run = self.runtime.block_on(self.run_driver(descriptor.path()));
                // The descriptor is removed here, once the driver is done with it.
                drop(descriptor);
                run
            });

        match res {
            Ok(run) => {
                if run.leaked {
                    tracing::warn!(
                        "test {test} leaked processes holding its output open; \
                         killed its process group",
                    );
                }
                let result = match (run.state, run.exit_status) {
                    (UnitState::Killed, _) => ExecutionResult::Timeout,
                    (_, Ok(exit_status)) => classify_exit(exit_status),
                    (_, Err(error)) => {
                        tracing::warn!("error waiting for driver for test {test}: {error}");
                        ExecutionResult::ExecFail
                    }
                };
                ExecuteStatus {
                    result,
                    output: run.output,
                    start_time: run.snapshot.start_time,
                    time_taken: run.snapshot.duration,
                    leaked: run.leaked,
                }
            }
            Err(error) => {
                tracing::debug!("failed to start test {test}: {error}");
                let snapshot = attempt.snapshot();
                ExecuteStatus {
                    result: ExecutionResult::ExecFail,
                    output: DisplayErrorChain::new(&error).to_string(),
                    start_time: snapshot.start_time,
                    time_taken: snapshot.duration,
                    leaked: false,
                }
            }
        }
    }
}

struct UnitRun {
    snapshot: StopwatchSnapshot,
    state: UnitState,
    exit_status: std::io::Result<ExitStatus>,
    output: String,
    leaked: bool,
}

/// Tracks the state of an execution, checking each transition.
#[derive(Debug)]
struct UnitTracker {
    state: UnitState,
}

impl UnitTracker {
    fn new() -> Self {
        Self {
            state: UnitState::Starting,
        }
    }

    fn transition(&mut self, next: UnitState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid unit state transition {:?} -> {:?}",
            self.state,
            next,
        );
        tracing::trace!("unit state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn finish(self) -> UnitState {
        debug_assert!(self.state.is_terminal(), "unit finished in state {:?}", self.state);
        self.state
    }
}

fn classify_exit(exit_status: ExitStatus) -> ExecutionResult {
    match exit_status.code() {
        Some(0) => ExecutionResult::Pass,
        Some(code) => ExecutionResult::Fail {
            failure: FailureStatus::ExitCode(code),
        },
        None => match os::exit_signal(&exit_status) {
            Some(signal) => ExecutionResult::Fail {
                failure: FailureStatus::Signal(signal),
            },
            // Neither an exit code nor a signal: treat it like an unknown failure.
            None => ExecutionResult::Fail {
                failure: FailureStatus::ExitCode(-1),
            },
        },
    }
}
