//! Content module - post model, front-matter, markdown and the post repository

mod error;
mod frontmatter;
mod markdown;
mod post;
pub mod repository;

pub use error::{ContentError, Result};
pub use frontmatter::FrontMatter;
pub use markdown::MarkdownRenderer;
pub use post::{Post, TagCount};
pub use repository::{FsPostRepository, PostRepository};
