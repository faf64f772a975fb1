//! Helper functions for templates and generated documents

mod date;
mod url;

pub use date::*;
pub use url::*;
