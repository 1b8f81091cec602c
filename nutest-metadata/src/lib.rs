// Copyright (c) The nutest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Structured access to nutest machine-readable output.
//!
//! This crate contains the exit codes returned by `nutest`, and the serializable form of the
//! test list printed by `nutest --list --message-format json`.

mod exit_codes;
mod test_list;

pub use exit_codes::*;
pub use test_list::*;
