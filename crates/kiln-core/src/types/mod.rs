//! Type definitions for blueprints, configuration values and generation output

mod generation;
mod manifest;
mod options;
mod value;

pub use generation::*;
pub use manifest::*;
pub use options::*;
pub use value::*;
