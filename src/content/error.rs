//! Errors raised by the post repository

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using `ContentError`.
pub type Result<T> = std::result::Result<T, ContentError>;

/// Errors raised while reading posts.
#[derive(Error, Debug)]
pub enum ContentError {
    /// No post file exists for the requested id.
    #[error("Post not found: {0}")]
    NotFound(String),

    /// Front-matter block is missing, unterminated, or invalid.
    #[error("Front-matter error in {path}: {message}")]
    FrontMatter { path: PathBuf, message: String },

    /// File system I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory walk error.
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

impl ContentError {
    /// Create a new front-matter error.
    pub fn front_matter(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::FrontMatter {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this error means the post does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
