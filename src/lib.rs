//! Resumable supervisor for `badblocks` surface scans.
//!
//! Scanner stderr flows through [`lines`] (backspace-aware line
//! reconstruction) into [`classify`] (grammar-driven state fold); the
//! [`pipeline`] module runs the scanner and [`checkpoint`] keeps per-device
//! state so an interrupted check resumes where it stopped.

pub mod checkpoint;
pub mod classify;
pub mod cli;
pub mod config;
pub mod grammar;
pub mod lines;
pub mod logging;
pub mod pipeline;
pub mod state;
