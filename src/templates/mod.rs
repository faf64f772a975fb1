//! Built-in blog templates using the Tera template engine
//!
//! All templates are embedded directly in the binary.

use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera};

use crate::config::SiteConfig;
use crate::content::Post;
use crate::helpers;

/// Template renderer with the embedded blog theme
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Create a new renderer with all templates loaded
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();

        // Autoescaping stays on for *.html; rendered post bodies are marked `safe`
        tera.add_raw_templates(vec![
            ("layout.html", include_str!("blog/layout.html")),
            ("home.html", include_str!("blog/home.html")),
            ("posts.html", include_str!("blog/posts.html")),
            ("post.html", include_str!("blog/post.html")),
            ("tags.html", include_str!("blog/tags.html")),
            ("tag.html", include_str!("blog/tag.html")),
            ("about.html", include_str!("blog/about.html")),
            ("not_found.html", include_str!("blog/not_found.html")),
            ("error.html", include_str!("blog/error.html")),
            // Partials
            (
                "partials/macros.html",
                include_str!("blog/partials/macros.html"),
            ),
        ])?;

        // Register custom filters
        tera.register_filter("format_date", format_date_filter);
        tera.register_filter("format_date_short", format_date_short_filter);
        tera.register_filter("segment", segment_filter);

        Ok(Self { tera })
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(template_name, context)?)
    }

    /// Context shared by every page: site config and current year
    pub fn base_context(config: &SiteConfig) -> Context {
        let mut context = Context::new();
        context.insert("config", &ConfigData::from(config));
        context.insert("year", &chrono::Local::now().format("%Y").to_string());
        context
    }
}

/// Tera filter: `2024-01-15` -> `2024年01月15日`
fn format_date_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("format_date", "value", String, value);
    Ok(tera::Value::String(helpers::format_date(&s)))
}

/// Tera filter: `2024-01-15` -> `01-15`
fn format_date_short_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("format_date_short", "value", String, value);
    Ok(tera::Value::String(helpers::format_date_short(&s)))
}

/// Tera filter: percent-encode one URL path segment
fn segment_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("segment", "value", String, value);
    Ok(tera::Value::String(helpers::encode_segment(&s)))
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct PostData {
    pub id: String,
    pub title: String,
    pub date: String,
    pub excerpt: Option<String>,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub content_html: String,
}

impl From<&Post> for PostData {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id.clone(),
            title: post.title.clone(),
            date: post.date.clone(),
            excerpt: post.excerpt.clone(),
            author: post.author.clone(),
            tags: post.tags.clone(),
            content_html: post.content_html.clone().unwrap_or_default(),
        }
    }
}

impl PostData {
    pub fn list(posts: &[Post]) -> Vec<Self> {
        posts.iter().map(Self::from).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigData {
    pub title: String,
    pub description: String,
    pub author: String,
    pub language: String,
}

impl From<&SiteConfig> for ConfigData {
    fn from(config: &SiteConfig) -> Self {
        Self {
            title: config.title.clone(),
            description: config.description.clone(),
            author: config.author.clone(),
            language: config.language.clone(),
        }
    }
}
