//! List site content

use anyhow::Result;

use crate::content::PostRepository;
use crate::Blog;

/// List site content by type
pub fn run(blog: &Blog, content_type: &str) -> Result<()> {
    let repo = blog.repository();

    match content_type {
        "post" | "posts" => {
            let posts = repo.list_posts()?;
            println!("Posts ({}):", posts.len());
            for post in posts {
                if post.tags.is_empty() {
                    println!("  {} - {} [{}]", post.date, post.title, post.id);
                } else {
                    println!(
                        "  {} - {} [{}] #{}",
                        post.date,
                        post.title,
                        post.id,
                        post.tags.join(" #")
                    );
                }
            }
        }
        "tag" | "tags" => {
            let tags = repo.tag_counts()?;
            println!("Tags ({}):", tags.len());
            for tag in tags {
                println!("  {} ({})", tag.name, tag.count);
            }
        }
        _ => {
            anyhow::bail!("Unknown type: {}. Available: post, tag", content_type);
        }
    }

    Ok(())
}
