//! Post repository - reads posts from a directory of markdown files

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{ContentError, FrontMatter, MarkdownRenderer, Post, Result, TagCount};

/// Read access to the post set.
///
/// Only listing, lookup and ids are storage specific; tag queries are
/// derived from the sorted listing.
pub trait PostRepository: Send + Sync {
    /// All posts without rendered bodies, newest first
    fn list_posts(&self) -> Result<Vec<Post>>;

    /// A single post with its body rendered to HTML
    fn get_post(&self, id: &str) -> Result<Post>;

    /// Ids of every post, ascending
    fn post_ids(&self) -> Result<Vec<String>>;

    /// Posts carrying `tag`, in listing order
    fn posts_by_tag(&self, tag: &str) -> Result<Vec<Post>> {
        Ok(self
            .list_posts()?
            .into_iter()
            .filter(|post| post.has_tag(tag))
            .collect())
    }

    /// Every tag in use, deduplicated and sorted ascending
    fn all_tags(&self) -> Result<Vec<String>> {
        let tags: BTreeSet<String> = self
            .list_posts()?
            .into_iter()
            .flat_map(|post| post.tags)
            .collect();
        Ok(tags.into_iter().collect())
    }

    /// Every tag with the number of posts carrying it, ordered like `all_tags`
    fn tag_counts(&self) -> Result<Vec<TagCount>> {
        let posts = self.list_posts()?;
        let tags: BTreeSet<&str> = posts
            .iter()
            .flat_map(|post| post.tags.iter().map(String::as_str))
            .collect();

        Ok(tags
            .into_iter()
            .map(|name| TagCount {
                name: name.to_string(),
                count: posts.iter().filter(|post| post.has_tag(name)).count(),
            })
            .collect())
    }
}

/// Posts stored as `<id>.md` files in a single directory
pub struct FsPostRepository {
    posts_dir: PathBuf,
    renderer: MarkdownRenderer,
}

impl FsPostRepository {
    /// Create a repository over `posts_dir`
    pub fn new<P: Into<PathBuf>>(posts_dir: P, renderer: MarkdownRenderer) -> Self {
        Self {
            posts_dir: posts_dir.into(),
            renderer,
        }
    }

    /// Directory the posts are read from
    pub fn posts_dir(&self) -> &Path {
        &self.posts_dir
    }

    /// Markdown files directly inside the posts directory, with their ids
    fn markdown_files(&self) -> Result<Vec<(String, PathBuf)>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.posts_dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
        {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            match post_id(path) {
                Some(id) => files.push((id, path.to_path_buf())),
                None => tracing::trace!("Skipping non-post file {:?}", path),
            }
        }

        Ok(files)
    }

    /// Read a post's front-matter and body
    fn read_post(&self, id: &str, path: &Path) -> Result<(Post, String)> {
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ContentError::NotFound(id.to_string()),
            _ => ContentError::Io(e),
        })?;
        let (fm, body) = FrontMatter::parse(path, &content)?;
        Ok((Post::from_front_matter(id, fm), body.to_string()))
    }
}

impl PostRepository for FsPostRepository {
    fn list_posts(&self) -> Result<Vec<Post>> {
        if !self.posts_dir.exists() {
            fs::create_dir_all(&self.posts_dir)?;
            tracing::info!("Created posts directory {:?}", self.posts_dir);
            return Ok(Vec::new());
        }

        let mut posts = Vec::new();
        for (id, path) in self.markdown_files()? {
            let (post, _) = self.read_post(&id, &path)?;
            posts.push(post);
        }

        // Newest first by plain string order; equal dates fall back to id
        posts.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));

        tracing::debug!("Loaded {} posts from {:?}", posts.len(), self.posts_dir);
        Ok(posts)
    }

    fn get_post(&self, id: &str) -> Result<Post> {
        if !is_valid_id(id) {
            return Err(ContentError::NotFound(id.to_string()));
        }

        let path = self.posts_dir.join(format!("{}.md", id));
        if !path.is_file() {
            return Err(ContentError::NotFound(id.to_string()));
        }

        let (mut post, body) = self.read_post(id, &path)?;
        post.content_html = Some(self.renderer.render(&body));
        Ok(post)
    }

    fn post_ids(&self) -> Result<Vec<String>> {
        if !self.posts_dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids: Vec<String> = self
            .markdown_files()?
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        ids.sort();
        Ok(ids)
    }
}

/// Id of a post file: its name without the `.md` suffix
fn post_id(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let id = name.strip_suffix(".md")?;
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Ids must name a file directly inside the posts directory
fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\', '\0'])
}
