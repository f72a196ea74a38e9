//! Command-line frontend for the hub voter.

#![deny(missing_docs)]

pub mod cli;
