//! CLI command implementations.

pub mod decode;
pub mod run;
pub mod simulate;
