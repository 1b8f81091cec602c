// Copyright (c) The nutest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Support for discovering and querying lists of test scripts.
//!
//! The main data structure in this module is [`TestList`].

mod output_format;
mod test_list;

pub use output_format::*;
pub use test_list::*;
