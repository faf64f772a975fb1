//! Sitemap generation.
//!
//! Lists the fixed site sections followed by every post.

use chrono::{DateTime, Utc};

use crate::config::SiteConfig;
use crate::content::Post;
use crate::helpers::{encode_segment, parse_date};

/// Change frequency for sitemap entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFreq {
    Daily,
    Weekly,
    Monthly,
}

impl ChangeFreq {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

/// A sitemap URL entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapUrl {
    /// Absolute URL.
    pub loc: String,

    /// Last modification date, `YYYY-MM-DD`.
    pub lastmod: Option<String>,

    pub changefreq: ChangeFreq,

    /// Priority (0.0 to 1.0).
    pub priority: f32,
}

/// Fixed sections: (path, change frequency, priority)
const SECTIONS: [(&str, ChangeFreq, f32); 4] = [
    ("/", ChangeFreq::Daily, 1.0),
    ("/posts", ChangeFreq::Daily, 0.9),
    ("/tags", ChangeFreq::Weekly, 0.7),
    ("/about", ChangeFreq::Monthly, 0.5),
];

/// Build the sitemap entries for `posts`, given in listing order
pub fn entries(config: &SiteConfig, posts: &[Post], now: DateTime<Utc>) -> Vec<SitemapUrl> {
    let today = now.format("%Y-%m-%d").to_string();

    let sections = SECTIONS.iter().map(|(path, changefreq, priority)| SitemapUrl {
        loc: config.absolute_url(path),
        lastmod: Some(today.clone()),
        changefreq: *changefreq,
        priority: *priority,
    });

    let posts = posts.iter().map(|post| SitemapUrl {
        loc: config.absolute_url(&format!("/posts/{}", encode_segment(&post.id))),
        lastmod: parse_date(&post.date).map(|d| d.format("%Y-%m-%d").to_string()),
        changefreq: ChangeFreq::Monthly,
        priority: 0.8,
    });

    sections.chain(posts).collect()
}

/// Render sitemap XML
pub fn generate(config: &SiteConfig, posts: &[Post], now: DateTime<Utc>) -> String {
    let urls = entries(config, posts, now);
    tracing::debug!("Generating sitemap with {} urls", urls.len());

    let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#);
    xml.push('\n');

    for url in &urls {
        xml.push_str("  <url>\n");
        xml.push_str(&format!("    <loc>{}</loc>\n", xml_escape(&url.loc)));
        if let Some(lastmod) = &url.lastmod {
            xml.push_str(&format!("    <lastmod>{}</lastmod>\n", lastmod));
        }
        xml.push_str(&format!(
            "    <changefreq>{}</changefreq>\n",
            url.changefreq.as_str()
        ));
        xml.push_str(&format!("    <priority>{:.1}</priority>\n", url.priority));
        xml.push_str("  </url>\n");
    }

    xml.push_str("</urlset>\n");
    xml
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn post(id: &str, date: &str) -> Post {
        Post {
            id: id.to_string(),
            title: id.to_string(),
            date: date.to_string(),
            excerpt: None,
            author: None,
            tags: Vec::new(),
            content_html: None,
        }
    }

    fn config() -> SiteConfig {
        SiteConfig {
            url: "https://blog.example.com/".to_string(),
            ..Default::default()
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_entries_order_and_priorities() {
        let posts = vec![post("b", "2024-02-01"), post("a", "someday")];
        let urls = entries(&config(), &posts, now());

        let locs: Vec<_> = urls.iter().map(|u| u.loc.as_str()).collect();
        assert_eq!(
            locs,
            vec![
                "https://blog.example.com",
                "https://blog.example.com/posts",
                "https://blog.example.com/tags",
                "https://blog.example.com/about",
                "https://blog.example.com/posts/b",
                "https://blog.example.com/posts/a",
            ]
        );
        assert_eq!(urls[0].priority, 1.0);
        assert_eq!(urls[0].lastmod.as_deref(), Some("2024-05-01"));
        assert_eq!(urls[4].lastmod.as_deref(), Some("2024-02-01"));
        assert_eq!(urls[4].changefreq, ChangeFreq::Monthly);
        assert_eq!(urls[5].lastmod, None);
    }

    #[test]
    fn test_generate_xml() {
        let posts = vec![post("rust & me", "2024-02-01")];
        let xml = generate(&config(), &posts, now());

        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains("<loc>https://blog.example.com/posts/rust%20&amp;%20me</loc>"));
        assert!(xml.contains("<priority>0.8</priority>"));
        assert!(xml.contains("<changefreq>weekly</changefreq>"));
        assert_eq!(xml.matches("<url>").count(), 5);
        assert!(xml.trim_end().ends_with("</urlset>"));
    }
}
