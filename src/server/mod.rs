//! Blog server: page routes, sitemap, view counter API and live reload

use anyhow::Result;
use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::{header, HeaderValue, Request, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tera::Context;
use tokio::sync::broadcast;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::SiteConfig;
use crate::content::{ContentError, MarkdownRenderer, PostRepository};
use crate::templates::{PostData, TemplateRenderer};
use crate::views::ViewStore;
use crate::{sitemap, Blog};

/// Live reload script injected into HTML pages
const LIVE_RELOAD_SCRIPT: &str = r#"
<script>
(function() {
    var ws = new WebSocket('ws://' + location.host + '/__livereload');
    ws.onmessage = function(msg) {
        if (msg.data === 'reload') {
            location.reload();
        }
    };
    ws.onclose = function() {
        console.log('Live reload disconnected. Attempting to reconnect...');
        setTimeout(function() { location.reload(); }, 1000);
    };
})();
</script>
</body>
"#;

/// Sent with every view counter response
const NO_STORE: &str = "no-store, max-age=0";

/// Server state
pub struct AppState {
    config: SiteConfig,
    repo: Arc<dyn PostRepository>,
    views: Arc<dyn ViewStore>,
    templates: TemplateRenderer,
    about_html: String,
    public_dir: PathBuf,
    reload_tx: broadcast::Sender<()>,
    live_reload: bool,
}

impl AppState {
    /// Build state for `blog` with its filesystem repository and configured view store
    pub fn new(blog: &Blog, live_reload: bool) -> Result<Self> {
        Self::with_parts(
            blog.config.clone(),
            Arc::new(blog.repository()),
            blog.view_store()?,
            blog.public_dir.clone(),
            live_reload,
        )
    }

    /// Build state from explicit parts
    pub fn with_parts(
        config: SiteConfig,
        repo: Arc<dyn PostRepository>,
        views: Arc<dyn ViewStore>,
        public_dir: PathBuf,
        live_reload: bool,
    ) -> Result<Self> {
        let templates = TemplateRenderer::new()?;
        let about_html = MarkdownRenderer::with_options(&config.markdown).render(&config.about);
        let (reload_tx, _) = broadcast::channel::<()>(16);

        Ok(Self {
            config,
            repo,
            views,
            templates,
            about_html,
            public_dir,
            reload_tx,
            live_reload,
        })
    }

    /// Notify connected live reload clients
    pub fn notify_reload(&self) {
        let _ = self.reload_tx.send(());
    }

    fn context(&self) -> Context {
        TemplateRenderer::base_context(&self.config)
    }

    /// Render a page template into a response
    fn page(&self, template: &str, context: &Context, status: StatusCode) -> Response {
        match self.templates.render(template, context) {
            Ok(html) => {
                let html = if self.live_reload {
                    inject_live_reload(&html)
                } else {
                    html
                };
                (status, Html(html)).into_response()
            }
            Err(e) => {
                tracing::error!("Failed to render {}: {:?}", template, e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }

    fn not_found(&self, message: &str) -> Response {
        let mut context = self.context();
        context.insert("message", message);
        self.page("not_found.html", &context, StatusCode::NOT_FOUND)
    }

    /// Map a repository error onto a 404 or 500 page
    fn content_error(&self, err: ContentError) -> Response {
        if err.is_not_found() {
            tracing::debug!("{}", err);
            return self.not_found("文章未找到");
        }

        tracing::error!("Failed to load posts: {}", err);
        let mut context = self.context();
        context.insert("message", &err.to_string());
        self.page("error.html", &context, StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Create the router for `state`
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/", get(home_handler))
        .route("/posts", get(posts_handler))
        .route("/posts/:slug", get(post_handler))
        .route("/tags", get(tags_handler))
        .route("/tags/:tag", get(tag_handler))
        .route("/about", get(about_handler))
        .route("/sitemap.xml", get(sitemap_handler))
        .route(
            "/api/views/:slug",
            get(views_get_handler).post(views_post_handler),
        );

    if state.live_reload {
        app = app.route("/__livereload", get(livereload_handler));
    }

    app.fallback(fallback_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the blog server
pub async fn start(blog: &Blog, ip: &str, port: u16, watch: bool, open: bool) -> Result<()> {
    let state = Arc::new(AppState::new(blog, watch)?);
    let app = router(Arc::clone(&state));

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    let url = format!("http://{}:{}", ip, port);
    println!("Server running at {}", url);
    if watch {
        println!("Live reload enabled. Watching {:?}...", blog.posts_dir);
    }
    println!("Press Ctrl+C to stop.");

    // Open browser if requested
    if open {
        if let Err(e) = open_browser(&url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }

    if watch {
        let posts_dir = blog.posts_dir.clone();
        let state = Arc::clone(&state);
        tokio::task::spawn_blocking(move || {
            if let Err(e) = watch_posts(posts_dir, state) {
                tracing::error!("File watcher error: {}", e);
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Watch the posts directory and tell clients to reload on change
fn watch_posts(posts_dir: PathBuf, state: Arc<AppState>) -> Result<()> {
    std::fs::create_dir_all(&posts_dir)?;

    let (tx, rx) = std::sync::mpsc::channel();

    // Create debouncer to avoid multiple rapid reloads
    let mut debouncer = new_debouncer(Duration::from_millis(500), tx)?;
    debouncer
        .watcher()
        .watch(&posts_dir, RecursiveMode::NonRecursive)?;
    tracing::debug!("Watching: {:?}", posts_dir);

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let changed: Vec<_> = events
                    .iter()
                    .filter(|e| {
                        e.path
                            .extension()
                            .map(|ext| ext == "md")
                            .unwrap_or(false)
                    })
                    .collect();

                if changed.is_empty() {
                    continue;
                }

                for event in &changed {
                    tracing::info!("Post changed: {}", event.path.display());
                }
                state.notify_reload();
            }
            Ok(Err(e)) => {
                tracing::error!("Watch error: {:?}", e);
            }
            Err(e) => {
                tracing::error!("Channel error: {:?}", e);
                break;
            }
        }
    }

    Ok(())
}

async fn home_handler(State(state): State<Arc<AppState>>) -> Response {
    let posts = match state.repo.list_posts() {
        Ok(posts) => posts,
        Err(e) => return state.content_error(e),
    };

    let recent = &posts[..posts.len().min(state.config.recent_posts)];
    let mut context = state.context();
    context.insert("posts", &PostData::list(recent));
    context.insert("total", &posts.len());
    context.insert("has_more", &(posts.len() > recent.len()));
    state.page("home.html", &context, StatusCode::OK)
}

async fn posts_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.repo.list_posts() {
        Ok(posts) => {
            let mut context = state.context();
            context.insert("posts", &PostData::list(&posts));
            state.page("posts.html", &context, StatusCode::OK)
        }
        Err(e) => state.content_error(e),
    }
}

async fn post_handler(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Response {
    match state.repo.get_post(&slug) {
        Ok(post) => {
            let mut context = state.context();
            context.insert("post", &PostData::from(&post));
            state.page("post.html", &context, StatusCode::OK)
        }
        Err(e) => state.content_error(e),
    }
}

async fn tags_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.repo.tag_counts() {
        Ok(tags) => {
            let mut context = state.context();
            context.insert("tags", &tags);
            state.page("tags.html", &context, StatusCode::OK)
        }
        Err(e) => state.content_error(e),
    }
}

async fn tag_handler(State(state): State<Arc<AppState>>, Path(tag): Path<String>) -> Response {
    match state.repo.posts_by_tag(&tag) {
        Ok(posts) => {
            let mut context = state.context();
            context.insert("tag", &tag);
            context.insert("posts", &PostData::list(&posts));
            state.page("tag.html", &context, StatusCode::OK)
        }
        Err(e) => state.content_error(e),
    }
}

async fn about_handler(State(state): State<Arc<AppState>>) -> Response {
    let mut context = state.context();
    context.insert("about_html", &state.about_html);
    state.page("about.html", &context, StatusCode::OK)
}

async fn sitemap_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.repo.list_posts() {
        Ok(posts) => {
            let xml = sitemap::generate(&state.config, &posts, chrono::Utc::now());
            ([(header::CONTENT_TYPE, "application/xml")], xml).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to build sitemap: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// View counter response body
#[derive(Debug, Serialize)]
struct ViewsBody {
    views: u64,
}

/// Count a view of `slug` and answer with the new total
fn count_view(state: &AppState, slug: &str) -> Response {
    match state.views.increment(slug) {
        Ok(views) => (
            [(header::CACHE_CONTROL, HeaderValue::from_static(NO_STORE))],
            Json(ViewsBody { views }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to count view of {}: {}", slug, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET counts the view as well: the page script fetches once per visit
async fn views_get_handler(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Response {
    count_view(&state, &slug)
}

async fn views_post_handler(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Response {
    count_view(&state, &slug)
}

/// WebSocket handler for live reload
async fn livereload_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let reload_rx = state.reload_tx.subscribe();
    ws.on_upgrade(move |socket| handle_livereload_socket(socket, reload_rx))
}

/// Handle WebSocket connection for live reload
async fn handle_livereload_socket(mut socket: WebSocket, mut reload_rx: broadcast::Receiver<()>) {
    tracing::debug!("Live reload client connected");

    loop {
        tokio::select! {
            // Wait for reload signal
            result = reload_rx.recv() => {
                match result {
                    Ok(_) => {
                        if socket.send(Message::Text("reload".to_string())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
            // Handle incoming messages (ping/pong)
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }

    tracing::debug!("Live reload client disconnected");
}

/// Fallback handler: static files from the public directory, else a 404 page
async fn fallback_handler(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
) -> Response {
    if !state.public_dir.is_dir() {
        return state.not_found("页面未找到");
    }

    let mut service = ServeDir::new(&state.public_dir);
    match service.try_call(request).await {
        Ok(response) if response.status() == StatusCode::NOT_FOUND => state.not_found("页面未找到"),
        Ok(response) => response.into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
    }
}

/// Inject live reload script into HTML content
fn inject_live_reload(html: &str) -> String {
    if html.contains("</body>") {
        html.replace("</body>", LIVE_RELOAD_SCRIPT)
    } else {
        // If no </body> tag, append to end
        format!("{}{}", html, LIVE_RELOAD_SCRIPT)
    }
}

/// Open a URL in the default browser
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/c", "start", url])
            .spawn()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::FsPostRepository;
    use crate::views::MemoryViewStore;
    use axum::body::to_bytes;
    use std::fs;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn write_post(dir: &std::path::Path, id: &str, date: &str, tags: &[&str]) {
        let content = format!(
            "---\ntitle: Title {}\ndate: {}\ntags: [{}]\n---\n\nHello from **{}**.\n",
            id,
            date,
            tags.join(", "),
            id
        );
        fs::write(dir.join(format!("{}.md", id)), content).unwrap();
    }

    fn app(tmp: &TempDir, live_reload: bool) -> Router {
        let posts_dir = tmp.path().join("posts");
        let config = SiteConfig {
            url: "https://blog.example.com".to_string(),
            recent_posts: 1,
            ..Default::default()
        };
        let repo = FsPostRepository::new(&posts_dir, MarkdownRenderer::new());
        let state = AppState::with_parts(
            config,
            Arc::new(repo),
            Arc::new(MemoryViewStore::new()),
            tmp.path().join("public"),
            live_reload,
        )
        .unwrap();
        router(Arc::new(state))
    }

    fn fixture() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let posts = tmp.path().join("posts");
        fs::create_dir(&posts).unwrap();
        write_post(&posts, "a", "2024-01-01", &["x"]);
        write_post(&posts, "b", "2024-02-01", &["x", "y"]);
        tmp
    }

    async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Response) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        (response.status(), response)
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_posts_page_lists_newest_first() {
        let tmp = fixture();
        let app = app(&tmp, false);

        let (status, response) = send(&app, "GET", "/posts").await;
        assert_eq!(status, StatusCode::OK);
        let html = body_text(response).await;
        let b = html.find("Title b").unwrap();
        let a = html.find("Title a").unwrap();
        assert!(b < a);
    }

    #[tokio::test]
    async fn test_home_shows_recent_posts() {
        let tmp = fixture();
        let app = app(&tmp, false);

        let (status, response) = send(&app, "GET", "/").await;
        assert_eq!(status, StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Title b"));
        assert!(!html.contains("Title a"));
        assert!(html.contains("查看全部 2 篇文章"));
    }

    #[tokio::test]
    async fn test_post_page_and_not_found() {
        let tmp = fixture();
        let app = app(&tmp, false);

        let (status, response) = send(&app, "GET", "/posts/a").await;
        assert_eq!(status, StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("<strong>a</strong>"));
        assert!(html.contains("2024年01月01日"));

        let (status, response) = send(&app, "GET", "/posts/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("文章未找到"));
    }

    #[tokio::test]
    async fn test_tag_pages() {
        let tmp = fixture();
        let app = app(&tmp, false);

        let (status, response) = send(&app, "GET", "/tags").await;
        assert_eq!(status, StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("#x"));
        assert!(html.contains("#y"));

        let (_, response) = send(&app, "GET", "/tags/y").await;
        let html = body_text(response).await;
        assert!(html.contains("Title b"));
        assert!(!html.contains("Title a"));

        let (status, response) = send(&app, "GET", "/tags/none").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body_text(response).await.contains("该标签下暂无文章"));
    }

    #[tokio::test]
    async fn test_missing_posts_directory_renders_empty_list() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp, false);

        let (status, response) = send(&app, "GET", "/posts").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body_text(response).await.contains("还没有文章"));
        assert!(tmp.path().join("posts").is_dir());
    }

    #[tokio::test]
    async fn test_malformed_post_is_server_error() {
        let tmp = fixture();
        fs::write(tmp.path().join("posts/bad.md"), "no front-matter here").unwrap();
        let app = app(&tmp, false);

        let (status, _) = send(&app, "GET", "/posts").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_view_counter() {
        let tmp = fixture();
        let app = app(&tmp, false);

        let (status, response) = send(&app, "GET", "/api/views/a").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            NO_STORE
        );
        assert_eq!(body_text(response).await, r#"{"views":1}"#);

        let (_, response) = send(&app, "GET", "/api/views/a").await;
        assert_eq!(body_text(response).await, r#"{"views":2}"#);

        let (_, response) = send(&app, "POST", "/api/views/a").await;
        assert_eq!(body_text(response).await, r#"{"views":3}"#);

        let (_, response) = send(&app, "POST", "/api/views/b").await;
        assert_eq!(body_text(response).await, r#"{"views":1}"#);

        // Counted per slug whether or not a post file backs it
        let (status, response) = send(&app, "GET", "/api/views/missing").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body_text(response).await, r#"{"views":1}"#);
    }

    #[tokio::test]
    async fn test_sitemap() {
        let tmp = fixture();
        let app = app(&tmp, false);

        let (status, response) = send(&app, "GET", "/sitemap.xml").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/xml"
        );
        let xml = body_text(response).await;
        assert!(xml.contains("<loc>https://blog.example.com/posts/a</loc>"));
        assert!(xml.contains("<loc>https://blog.example.com/posts/b</loc>"));
    }

    #[tokio::test]
    async fn test_about_and_static_fallback() {
        let tmp = fixture();
        let public = tmp.path().join("public");
        fs::create_dir(&public).unwrap();
        fs::write(public.join("robots.txt"), "User-agent: *\n").unwrap();
        let app = app(&tmp, false);

        let (status, response) = send(&app, "GET", "/about").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body_text(response).await.contains("关于本博客"));

        let (status, response) = send(&app, "GET", "/robots.txt").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body_text(response).await, "User-agent: *\n");

        let (status, _) = send(&app, "GET", "/nothing-here").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_live_reload_script_injected() {
        let tmp = fixture();

        let (_, response) = send(&app(&tmp, true), "GET", "/posts").await;
        assert!(body_text(response).await.contains("/__livereload"));

        let (_, response) = send(&app(&tmp, false), "GET", "/posts").await;
        assert!(!body_text(response).await.contains("/__livereload"));
    }

    #[test]
    fn test_inject_live_reload() {
        let html = "<html><body><p>hi</p></body></html>";
        let injected = inject_live_reload(html);
        assert!(injected.contains("__livereload"));
        assert!(injected.ends_with("</body>\n</html>"));

        let bare = inject_live_reload("<p>hi</p>");
        assert!(bare.starts_with("<p>hi</p>"));
    }
}
