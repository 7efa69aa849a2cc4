// Quality search and encode engine - independent of the CLI layer

pub mod core;
pub mod encoder;
pub mod error;
pub mod passes;
pub mod planner;
pub mod probe;
pub mod search;

pub use self::core::*;
