// Copyright (c) The nutest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reporting of test results.
//!
//! Events are streamed to the console by a [`TestReporter`], and the finished run is written out
//! by a [`JunitWriter`].

mod displayer;
mod events;
mod junit;

pub use displayer::*;
pub use events::*;
pub use junit::*;
