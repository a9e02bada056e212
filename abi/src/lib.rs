//! System V AMD64 argument classification.
//!
//! This crate provides the canonical answer to one question: for an ordered
//! parameter list, how many arguments does the calling convention hand over
//! in general-purpose registers and how many in XMM registers? The thunk
//! generator sizes its register shifts and stack slides from these two totals.
//!
//! Only the subset of the classification algorithm that the thunk generator
//! supports is modelled: scalars that occupy exactly one register. Aggregates,
//! 128-bit integers and the x87 `long double` class are deliberately absent.

pub mod class;

pub use class::*;
