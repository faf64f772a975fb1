//! Site configuration (_config.yml)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub description: String,
    pub author: String,
    pub language: String,

    // URL
    /// Absolute base URL, used for sitemap entries
    pub url: String,

    // Directory
    pub posts_dir: String,
    pub public_dir: String,

    // Home page
    pub recent_posts: usize,

    /// Markdown body of the about page
    pub about: String,

    #[serde(default)]
    pub markdown: MarkdownConfig,
    #[serde(default)]
    pub views: ViewsConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "技术博客".to_string(),
            description: "分享技术见解和编程经验".to_string(),
            author: String::new(),
            language: "zh-CN".to_string(),

            url: "http://localhost:3000".to_string(),

            posts_dir: "posts".to_string(),
            public_dir: "public".to_string(),

            recent_posts: 5,

            about: "欢迎来到我的技术博客！这是一个分享技术见解、编程经验和学习心得的地方。"
                .to_string(),

            markdown: MarkdownConfig::default(),
            views: ViewsConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: SiteConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Join a site-relative path onto the configured base URL
    pub fn absolute_url(&self, path: &str) -> String {
        let base = self.url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, path)
        }
    }
}

/// Markdown rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownConfig {
    /// Pass raw HTML in post bodies through to the output
    pub raw_html: bool,
    pub highlight_theme: String,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            raw_html: false,
            highlight_theme: "base16-ocean.dark".to_string(),
        }
    }
}

/// Backing store for the view counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewStoreKind {
    Memory,
    File,
}

/// View counter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewsConfig {
    pub store: ViewStoreKind,
    /// JSON file used by the file store, relative to the base directory
    pub path: String,
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            store: ViewStoreKind::Memory,
            path: "views.json".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SiteConfig::default();
        assert_eq!(config.posts_dir, "posts");
        assert_eq!(config.recent_posts, 5);
        assert!(!config.markdown.raw_html);
        assert_eq!(config.views.store, ViewStoreKind::Memory);
    }

    #[test]
    fn test_parse_config() {
        let yaml = r#"
title: My Blog
author: Test User
url: https://blog.example.com/
recent_posts: 3
markdown:
  raw_html: true
views:
  store: file
  path: data/views.json
"#;
        let config: SiteConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.title, "My Blog");
        assert_eq!(config.author, "Test User");
        assert_eq!(config.recent_posts, 3);
        assert!(config.markdown.raw_html);
        assert_eq!(config.markdown.highlight_theme, "base16-ocean.dark");
        assert_eq!(config.views.store, ViewStoreKind::File);
        assert_eq!(config.views.path, "data/views.json");
        assert_eq!(config.posts_dir, "posts");
    }

    #[test]
    fn test_absolute_url() {
        let config = SiteConfig {
            url: "https://blog.example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.absolute_url("/"), "https://blog.example.com");
        assert_eq!(
            config.absolute_url("/posts/hello"),
            "https://blog.example.com/posts/hello"
        );
        assert_eq!(config.absolute_url("tags"), "https://blog.example.com/tags");
    }
}
