//! Preview server with live reload, revalidation and on-demand post rendering

use anyhow::Result;
use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::{Request, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use notify_debouncer_mini::{new_debouncer, notify::RecursiveMode, DebounceEventResult};
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;

use crate::cms::{Direction, PrismicClient};
use crate::content::Navigation;
use crate::generator::{GenerateReport, Generator};
use crate::helpers;
use crate::SpaceTraveling;

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

/// Everything derived from the current `_config.yml`
struct Runtime {
    site: SpaceTraveling,
    client: PrismicClient,
    generator: Arc<Generator>,
}

impl Runtime {
    fn new(site: SpaceTraveling) -> Result<Self> {
        let client = PrismicClient::new(&site.config.cms)?;
        let generator = Arc::new(Generator::new(&site)?);
        Ok(Self {
            site,
            client,
            generator,
        })
    }
}

/// Server state
struct ServerState {
    /// Fixed at startup; moving it needs a restart
    public_dir: PathBuf,
    runtime: RwLock<Arc<Runtime>>,
    /// Serializes full rebuilds
    rebuild_lock: Mutex<()>,
    reload_tx: broadcast::Sender<()>,
    live_reload: bool,
}

impl ServerState {
    fn new(site: &SpaceTraveling, live_reload: bool) -> Result<Self> {
        let (reload_tx, _) = broadcast::channel::<()>(16);
        Ok(Self {
            public_dir: site.public_dir.clone(),
            runtime: RwLock::new(Arc::new(Runtime::new(site.clone())?)),
            rebuild_lock: Mutex::new(()),
            reload_tx,
            live_reload,
        })
    }

    async fn runtime(&self) -> Arc<Runtime> {
        self.runtime.read().await.clone()
    }

    /// Fetch every post and regenerate the whole site
    async fn rebuild(&self) -> Result<GenerateReport> {
        let _guard = self.rebuild_lock.lock().await;
        let runtime = self.runtime().await;

        let posts = runtime.client.fetch_all().await?;
        let generator = runtime.generator.clone();
        let report = tokio::task::spawn_blocking(move || generator.generate(&posts)).await??;

        // Nobody listening is fine
        let _ = self.reload_tx.send(());
        Ok(report)
    }

    /// Re-read `_config.yml` and swap in a fresh client and generator
    async fn reload_config(&self) -> Result<()> {
        let base_dir = self.runtime().await.site.base_dir.clone();
        let site = SpaceTraveling::new(&base_dir)?;
        if site.public_dir != self.public_dir {
            tracing::warn!(
                "public_dir changed to {:?}; restart the server to serve it",
                site.public_dir
            );
        }
        let runtime = Runtime::new(site)?;
        *self.runtime.write().await = Arc::new(runtime);
        Ok(())
    }
}

/// Start the preview server
///
/// With `watch` set the server revalidates every `revalidate` seconds,
/// reloads on `_config.yml` changes and pushes live reload to browsers.
pub async fn start(
    site: &SpaceTraveling,
    ip: &str,
    port: u16,
    watch: bool,
    open: bool,
) -> Result<()> {
    let state = Arc::new(ServerState::new(site, watch)?);

    tracing::info!("Generating static files...");
    let report = state.rebuild().await?;
    tracing::info!(
        "Prerendered {} of {} posts",
        report.prerendered,
        report.posts
    );

    let app = router(state.clone());

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    let url = format!("http://{}:{}", ip, port);
    println!("Server running at {}", url);
    if watch {
        println!("Live reload enabled. Watching for changes...");
    }
    println!("Press Ctrl+C to stop.");

    if open {
        if let Err(e) = open_browser(&url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }

    if watch {
        spawn_revalidation(state.clone(), site.config.revalidate);

        let config_path = site.config_path();
        let watcher_state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = watch_config(config_path, watcher_state).await {
                tracing::error!("Config watcher error: {}", e);
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/__livereload", get(livereload_handler))
        .fallback(fallback_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Regenerate the site every `every` seconds; failures keep the previous output
fn spawn_revalidation(state: Arc<ServerState>, every: u64) {
    if every == 0 {
        tracing::info!("Revalidation disabled");
        return;
    }

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(every));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            tracing::info!("Revalidating...");
            match state.rebuild().await {
                Ok(report) => tracing::info!("Revalidated {} posts", report.posts),
                Err(e) => {
                    tracing::error!("Revalidation failed, serving previous output: {:#}", e)
                }
            }
        }
    });
}

/// Watch `_config.yml` and rebuild when it changes
async fn watch_config(config_path: PathBuf, state: Arc<ServerState>) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<DebounceEventResult>();

    let mut debouncer =
        new_debouncer(Duration::from_millis(500), move |res: DebounceEventResult| {
            let _ = tx.send(res);
        })?;

    // Editors often replace the file, so watch its directory
    let watch_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    debouncer
        .watcher()
        .watch(&watch_dir, RecursiveMode::NonRecursive)?;
    tracing::debug!("Watching: {:?}", config_path);

    while let Some(result) = rx.recv().await {
        match result {
            Ok(events) => {
                if !events.iter().any(|e| e.path.ends_with(crate::CONFIG_FILE)) {
                    continue;
                }

                println!("\n📝 Config changed, regenerating...");
                if let Err(e) = state.reload_config().await {
                    println!("❌ Invalid config, keeping the previous one: {:#}", e);
                    continue;
                }
                match state.rebuild().await {
                    Ok(_) => println!("✅ Regenerated successfully!"),
                    Err(e) => println!("❌ Generation failed: {:#}", e),
                }
            }
            Err(e) => tracing::error!("Watch error: {:?}", e),
        }
    }

    Ok(())
}

/// WebSocket handler for live reload
async fn livereload_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    let reload_rx = state.reload_tx.subscribe();
    ws.on_upgrade(move |socket| handle_livereload_socket(socket, reload_rx))
}

/// Handle WebSocket connection for live reload
async fn handle_livereload_socket(mut socket: WebSocket, mut reload_rx: broadcast::Receiver<()>) {
    tracing::debug!("Live reload client connected");

    loop {
        tokio::select! {
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

/// Serve generated files, rendering missing post pages on demand
async fn fallback_handler(
    State(state): State<Arc<ServerState>>,
    request: Request<Body>,
) -> Response {
    let runtime = state.runtime().await;
    let path = request.uri().path().to_string();

    let Some(file_path) = resolve_path(&state.public_dir, &runtime.site.config.root, &path) else {
        return not_found(&state, &runtime).await;
    };

    if !file_path.is_file() {
        let Some(uid) = helpers::uid_from_path(&runtime.site.config, &path) else {
            return not_found(&state, &runtime).await;
        };
        return match render_on_demand(&runtime, &uid).await {
            Ok(Some(html)) => html_response(&state, html, StatusCode::OK),
            Ok(None) => not_found(&state, &runtime).await,
            Err(e) => {
                tracing::error!("On-demand render of {} failed: {:#}", uid, e);
                (StatusCode::BAD_GATEWAY, "Content source unavailable").into_response()
            }
        };
    }

    let is_html = file_path
        .extension()
        .map(|ext| ext == "html" || ext == "htm")
        .unwrap_or(false);

    if is_html {
        match tokio::fs::read_to_string(&file_path).await {
            Ok(content) => html_response(&state, content, StatusCode::OK),
            Err(_) => not_found(&state, &runtime).await,
        }
    } else {
        match ServeFile::new(&file_path).try_call(request).await {
            Ok(response) => response.into_response(),
            Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response(),
        }
    }
}

/// Fetch a post that was not prerendered, write its page and return the HTML.
///
/// `Ok(None)` means the CMS has no such post.
async fn render_on_demand(runtime: &Runtime, uid: &str) -> Result<Option<String>> {
    let post = match runtime.client.get_by_uid(uid).await {
        Ok(post) => post,
        Err(e) if e.is_not_found() => {
            tracing::debug!("No post with uid {}", uid);
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    let (previous, next) = tokio::join!(
        runtime.client.neighbor(&post.id, Direction::Previous),
        runtime.client.neighbor(&post.id, Direction::Next),
    );
    let navigation = Navigation {
        previous: previous.unwrap_or_else(|e| {
            tracing::warn!("Previous post lookup failed: {}", e);
            None
        }),
        next: next.unwrap_or_else(|e| {
            tracing::warn!("Next post lookup failed: {}", e);
            None
        }),
    };

    let path = runtime.generator.write_post(&post, &navigation)?;
    tracing::info!("Rendered on demand: {:?}", path);
    Ok(Some(tokio::fs::read_to_string(&path).await?))
}

async fn not_found(state: &ServerState, runtime: &Runtime) -> Response {
    let page = match tokio::fs::read_to_string(state.public_dir.join("404.html")).await {
        Ok(page) => page,
        Err(_) => match runtime.generator.render_not_found() {
            Ok(page) => page,
            Err(e) => {
                tracing::error!("Failed to render 404 page: {}", e);
                return (StatusCode::NOT_FOUND, "Not found").into_response();
            }
        },
    };
    html_response(state, page, StatusCode::NOT_FOUND)
}

fn html_response(state: &ServerState, html: String, status: StatusCode) -> Response {
    let html = if state.live_reload {
        inject_live_reload(&html)
    } else {
        html
    };
    (status, Html(html)).into_response()
}

/// Map a request path to a file under `public_dir`, honouring the site root
fn resolve_path(public_dir: &Path, root: &str, path: &str) -> Option<PathBuf> {
    let root = root.trim_end_matches('/');
    let relative = path.strip_prefix(root).unwrap_or(path);
    let relative = Path::new(relative.trim_start_matches('/'));

    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }

    let candidate = public_dir.join(relative);
    if relative.as_os_str().is_empty() || candidate.is_dir() {
        return Some(candidate.join("index.html"));
    }
    if !candidate.exists() {
        let with_html = candidate.with_extension("html");
        if with_html.is_file() {
            return Some(with_html);
        }
    }
    Some(candidate)
}

/// Inject live reload script into HTML content
fn inject_live_reload(html: &str) -> String {
    if html.contains("</body>") {
        html.replace("</body>", LIVE_RELOAD_SCRIPT)
    } else {
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
