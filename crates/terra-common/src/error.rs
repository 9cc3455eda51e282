//! Error types shared across Terra crates.

use thiserror::Error;

/// Invalid world layout configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    /// A size is zero
    #[error("Layout field `{0}` must be non-zero")]
    Empty(&'static str),

    /// A size cannot be represented in the region file format or the grid
    #[error("Layout field `{0}` is too large")]
    TooLarge(&'static str),
}
