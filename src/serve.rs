//! Development HTTP server with live reload.
//!
//! Serves the dist tree and keeps every open page on a WebSocket at
//! `/__livereload`. When the watcher finishes rebuilding a stage it sends
//! on the shared broadcast channel and every connected page reloads
//! itself. The client side is a small script served at `/__livereload.js`
//! and injected into HTML responses just before `</body>`; non-HTML
//! requests are handed straight to a static file service. Nothing of this
//! exists in production output: injection happens at response time, the
//! files on disk are untouched.

use crate::config::Config;
use axum::{
    Router,
    body::Body,
    extract::ws::{Message, WebSocket},
    extract::{Request, State, WebSocketUpgrade},
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tower::util::ServiceExt;
use tower_http::services::ServeDir;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared state for the request handlers.
struct AppState {
    dist: PathBuf,
    start_path: Option<String>,
    reload_tx: broadcast::Sender<()>,
}

const LIVERELOAD_JS: &str = r#"(function () {
  var proto = location.protocol === "https:" ? "wss://" : "ws://";
  var socket = new WebSocket(proto + location.host + "/__livereload");
  socket.onmessage = function (event) {
    if (event.data === "reload") {
      location.reload();
    }
  };
})();
"#;

const INJECT_TAG: &str = "<script src=\"/__livereload.js\"></script>";

/// Serve the dist tree until the task is aborted or the process exits.
pub async fn serve(
    root: &Path,
    config: &Config,
    reload_tx: broadcast::Sender<()>,
) -> Result<(), ServeError> {
    let state = Arc::new(AppState {
        dist: root.join(&config.paths.dist),
        start_path: config.server.start_path.clone(),
        reload_tx,
    });

    let app = Router::new()
        .route("/__livereload", get(livereload_handler))
        .route("/__livereload.js", get(livereload_script))
        .fallback(serve_site)
        .with_state(state);

    let addr = format!("127.0.0.1:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "dev server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn livereload_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let rx = state.reload_tx.subscribe();
    ws.on_upgrade(move |socket| handle_websocket(socket, rx))
}

async fn livereload_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        LIVERELOAD_JS,
    )
}

/// What a frame from the page asks of us.
enum FrameAction {
    Reply(Message),
    Ignore,
    Disconnect,
}

fn frame_action(inbound: Option<Result<Message, axum::Error>>) -> FrameAction {
    match inbound {
        Some(Ok(Message::Ping(data))) => FrameAction::Reply(Message::Pong(data)),
        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => FrameAction::Disconnect,
        Some(Ok(_)) => FrameAction::Ignore,
    }
}

/// One connected page. Forwards reload signals until either side closes.
async fn handle_websocket(mut socket: WebSocket, mut rx: broadcast::Receiver<()>) {
    use broadcast::error::RecvError;
    loop {
        tokio::select! {
            signal = rx.recv() => {
                if matches!(signal, Err(RecvError::Closed)) {
                    break;
                }
                // A lagged receiver only missed reload signals; the one
                // reload we send now covers all of them.
                if socket.send(Message::Text("reload".into())).await.is_err() {
                    break;
                }
            }
            inbound = socket.recv() => match frame_action(inbound) {
                FrameAction::Reply(frame) => {
                    if socket.send(frame).await.is_err() {
                        break;
                    }
                }
                FrameAction::Ignore => {}
                FrameAction::Disconnect => break,
            },
        }
    }
}

/// Fallback handler: redirect `/`, inject into HTML pages, hand everything
/// else to the static file service.
async fn serve_site(State(state): State<Arc<AppState>>, request: Request<Body>) -> Response {
    let path = request.uri().path().to_string();

    if path == "/" {
        if let Some(start) = &state.start_path {
            return Redirect::temporary(start).into_response();
        }
    }

    if let Some(file) = html_file_for(&state.dist, &path) {
        match tokio::fs::read_to_string(&file).await {
            Ok(html) => {
                debug!(page = %path, "serving with reload script");
                return (
                    [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                    inject_livereload(&html),
                )
                    .into_response();
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return (StatusCode::NOT_FOUND, "not found").into_response();
            }
            Err(_) => {
                return (StatusCode::INTERNAL_SERVER_ERROR, "read error").into_response();
            }
        }
    }

    match ServeDir::new(&state.dist).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(infallible) => match infallible {},
    }
}

/// The dist file an HTML-looking request path maps to: `.html` requests
/// directly, directory requests via `index.html`. Other paths are not
/// ours to inject into.
fn html_file_for(dist: &Path, request_path: &str) -> Option<PathBuf> {
    let rel = request_path.trim_start_matches('/');
    if rel.contains("..") {
        return None;
    }
    if rel.is_empty() || request_path.ends_with('/') {
        Some(dist.join(rel).join("index.html"))
    } else if rel.ends_with(".html") {
        Some(dist.join(rel))
    } else {
        None
    }
}

/// Insert the live reload script tag before `</body>`, or append it when
/// the page has no body close tag.
pub fn inject_livereload(html: &str) -> String {
    match html.rfind("</body>") {
        Some(idx) => {
            let mut out = String::with_capacity(html.len() + INJECT_TAG.len());
            out.push_str(&html[..idx]);
            out.push_str(INJECT_TAG);
            out.push_str(&html[idx..]);
            out
        }
        None => format!("{html}{INJECT_TAG}"),
    }
}
