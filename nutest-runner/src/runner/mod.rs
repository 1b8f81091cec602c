// Copyright (c) The nutest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test runner.
//!
//! The main structure in this module is [`TestRunner`], which runs every test in a
//! [`TestList`](crate::list::TestList) through a [`UnitExecutor`].

mod executor;
mod imp;
mod order;

#[cfg(unix)]
#[path = "unix.rs"]
mod os;

pub use executor::*;
pub use imp::*;
pub use order::*;
