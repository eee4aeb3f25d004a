//! The metric computation engine.
//!
//! Portable logic (`ticks`, `cpu`, `memory`, `resolver`, `procfs`) never
//! reaches into `platform`; only `platform` knows which OS it runs on.

pub mod collector;
pub mod cpu;
pub mod memory;
pub mod platform;
pub mod procfs;
pub mod resolver;
pub mod snapshot;
pub mod source;
pub mod ticks;
