//! Type definitions for xtmreport

mod error;
mod health;
mod stats;
mod table;

pub use error::*;
pub use health::*;
pub use stats::*;
pub use table::*;
