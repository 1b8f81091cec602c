// Copyright (c) The nutest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use nix::{
    errno::Errno,
    sys::signal::{Signal, killpg},
    unistd::Pid,
};
use std::process::ExitStatus;

/// Sends SIGKILL to every process in the group led by `pid`.
///
/// A group that no longer exists is not an error.
pub(super) fn kill_process_group(pid: u32) {
    let Ok(raw) = i32::try_from(pid) else {
        tracing::warn!("process ID {pid} out of range, not killing");
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) => {
            tracing::debug!("sent SIGKILL to process group {pid}");
        }
        Err(Errno::ESRCH) => {
            tracing::debug!("process group {pid} already exited");
        }
        Err(errno) => {
            tracing::warn!("failed to kill process group {pid}: {errno}");
        }
    }
}

/// Returns the signal that terminated the process, if any.
pub(super) fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}
