//! inkpost: a small markdown-backed blog server
//!
//! Posts are `*.md` files with YAML front-matter in a single directory.
//! They are re-read on every request and rendered through embedded Tera
//! templates.

pub mod commands;
pub mod config;
pub mod content;
pub mod helpers;
pub mod server;
pub mod sitemap;
pub mod templates;
pub mod views;

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use config::ViewStoreKind;
use content::{FsPostRepository, MarkdownRenderer};
use views::{FileViewStore, MemoryViewStore, ViewStore};

/// The blog application
#[derive(Clone)]
pub struct Blog {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: std::path::PathBuf,
    /// Directory holding the `*.md` posts
    pub posts_dir: std::path::PathBuf,
    /// Static files served as-is
    pub public_dir: std::path::PathBuf,
}

impl Blog {
    /// Create a new blog instance from a directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = base_dir.join("_config.yml");

        let config = if config_path.exists() {
            tracing::debug!("Loading config from {:?}", config_path);
            config::SiteConfig::load(&config_path)?
        } else {
            config::SiteConfig::default()
        };

        let posts_dir = base_dir.join(&config.posts_dir);
        let public_dir = base_dir.join(&config.public_dir);

        Ok(Self {
            config,
            base_dir,
            posts_dir,
            public_dir,
        })
    }

    /// Filesystem post repository over the posts directory
    pub fn repository(&self) -> FsPostRepository {
        let renderer = MarkdownRenderer::with_options(&self.config.markdown);
        FsPostRepository::new(&self.posts_dir, renderer)
    }

    /// The view store selected in the configuration
    pub fn view_store(&self) -> Result<Arc<dyn ViewStore>> {
        let store: Arc<dyn ViewStore> = match self.config.views.store {
            ViewStoreKind::Memory => Arc::new(MemoryViewStore::new()),
            ViewStoreKind::File => {
                let path = self.base_dir.join(&self.config.views.path);
                Arc::new(FileViewStore::open(path)?)
            }
        };
        Ok(store)
    }

    /// Create a new post
    pub fn new_post(&self, title: &str, tags: &[String], slug: Option<&str>) -> Result<()> {
        commands::new::create_post(self, title, tags, slug).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::PostRepository;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_blog_defaults_without_config() {
        let tmp = TempDir::new().unwrap();
        let blog = Blog::new(tmp.path()).unwrap();
        assert_eq!(blog.posts_dir, tmp.path().join("posts"));
        assert_eq!(blog.public_dir, tmp.path().join("public"));
        assert!(blog.repository().list_posts().unwrap().is_empty());
    }

    #[test]
    fn test_blog_reads_config() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("_config.yml"),
            "title: Notes\nposts_dir: content\nviews:\n  store: file\n  path: state/views.json\n",
        )
        .unwrap();

        let blog = Blog::new(tmp.path()).unwrap();
        assert_eq!(blog.config.title, "Notes");
        assert_eq!(blog.posts_dir, tmp.path().join("content"));

        let store = blog.view_store().unwrap();
        assert_eq!(store.increment("a").unwrap(), 1);
        assert!(tmp.path().join("state/views.json").exists());
    }

    #[test]
    fn test_blog_rejects_invalid_config() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("_config.yml"), "recent_posts: many\n").unwrap();
        assert!(Blog::new(tmp.path()).is_err());
    }
}
