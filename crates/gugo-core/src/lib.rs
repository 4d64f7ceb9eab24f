//! Concurrent mirroring of every repository owned by a set of code-forge
//! accounts into local bare clones.

pub mod config;
pub mod daemon;
pub mod error;
pub mod git;
pub mod lockfile;
pub mod model;
pub mod orchestrator;
pub mod pool;
pub mod source;

#[cfg(test)]
mod test_support;

pub use error::{MirrorError, Result};
pub use orchestrator::Orchestrator;
