//! Create a new post

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use crate::Blog;

/// Front-matter written for a fresh post
#[derive(Serialize)]
struct Scaffold<'a> {
    title: &'a str,
    date: String,
    tags: &'a [String],
}

/// Create `<posts_dir>/<slug>.md` with front-matter and return its path
pub fn create_post(
    blog: &Blog,
    title: &str,
    tags: &[String],
    slug: Option<&str>,
) -> Result<PathBuf> {
    let slug = match slug {
        Some(s) => s.to_string(),
        None => slug::slugify(title),
    };
    if slug.is_empty() || slug.contains(['/', '\\']) || slug == "." || slug == ".." {
        anyhow::bail!("Cannot derive a file name from {:?}, pass --slug", title);
    }

    fs::create_dir_all(&blog.posts_dir)?;
    let file_path = blog.posts_dir.join(format!("{}.md", slug));

    let scaffold = Scaffold {
        title,
        date: chrono::Local::now().format("%Y-%m-%d").to_string(),
        tags,
    };
    let content = format!("---\n{}---\n\n", serde_yaml::to_string(&scaffold)?);

    // create_new refuses to replace an existing post
    let mut file = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&file_path)
    {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            anyhow::bail!("File already exists: {:?}", file_path);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to create {:?}", file_path));
        }
    };
    file.write_all(content.as_bytes())?;
    tracing::info!("Created post {:?}", file_path);
    println!("Created: {:?}", file_path);

    Ok(file_path)
}
