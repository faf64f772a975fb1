//! Post model

use serde::{Deserialize, Serialize};

use super::FrontMatter;

/// A blog post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// File name without `.md`, used as the URL segment
    pub id: String,

    /// Post title
    pub title: String,

    /// Publication date as written in the front-matter
    pub date: String,

    /// Short summary shown in lists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Post tags, in front-matter order
    #[serde(default)]
    pub tags: Vec<String>,

    /// Rendered HTML body, only filled when a single post is loaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_html: Option<String>,
}

impl Post {
    /// Build a summary post (no rendered body) from parsed front-matter
    pub fn from_front_matter(id: impl Into<String>, fm: FrontMatter) -> Self {
        Self {
            id: id.into(),
            title: fm.title,
            date: fm.date,
            excerpt: fm.excerpt,
            author: fm.author,
            tags: fm.tags,
            content_html: None,
        }
    }

    /// Whether the post carries `tag`
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Site-relative URL of the post page
    pub fn path(&self) -> String {
        format!("/posts/{}", self.id)
    }
}

/// A tag with the number of posts carrying it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub name: String,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Post {
        Post::from_front_matter(
            "hello",
            FrontMatter {
                title: "Hello".to_string(),
                date: "2024-01-01".to_string(),
                excerpt: None,
                author: Some("nayuta".to_string()),
                tags: vec!["rust".to_string()],
            },
        )
    }

    #[test]
    fn test_has_tag() {
        let post = sample();
        assert!(post.has_tag("rust"));
        assert!(!post.has_tag("Rust"));
        assert_eq!(post.path(), "/posts/hello");
    }

    #[test]
    fn test_summary_json_omits_content() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["id"], "hello");
        assert_eq!(json["author"], "nayuta");
        assert!(json.get("contentHtml").is_none());
        assert!(json.get("excerpt").is_none());

        let mut full = sample();
        full.content_html = Some("<p>hi</p>".to_string());
        let json = serde_json::to_value(full).unwrap();
        assert_eq!(json["contentHtml"], "<p>hi</p>");
    }
}
