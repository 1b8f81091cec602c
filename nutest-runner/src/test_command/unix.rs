// Copyright (c) The nutest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{fs::File, io::PipeReader, os::fd::OwnedFd, os::unix::process::CommandExt};

pub(super) fn pipe_reader_to_file(rx: PipeReader) -> File {
    File::from(OwnedFd::from(rx))
}

/// Puts the child in a new process group, so that it and everything it starts can be killed
/// together.
pub(super) fn set_process_group(cmd: &mut std::process::Command) {
    cmd.process_group(0);
}
