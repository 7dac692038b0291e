//! Runtime module: process lifecycle: boot, per-file parsing, summary.

pub mod boot;
pub mod run;
