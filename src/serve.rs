//! Development server with live reload.
//!
//! Built on `tiny_http`:
//!
//! - Static files from the output directory, `index.html` for directories
//! - Directory listing when there is no index
//! - `Cache-Control: no-store` on everything
//! - Live reload: HTML pages get a small script that connects a websocket
//!   to `/.rulesite/reload`; after each rebuild the watcher tells every
//!   socket to either swap stylesheets (`css`) or reload (`page`)
//!
//! ```text
//! ┌─────────────────┐           ┌──────────────────┐
//! │   Main Thread   │           │  Watcher Thread  │
//! │  (HTTP Server)  │◀─sockets──│ rebuild + notify │
//! └─────────────────┘  Reloader └──────────────────┘
//! ```

use crate::{config::ServeOptions, log};
use anyhow::{Context, Result, anyhow};
use parking_lot::Mutex;
use std::{
    fs,
    io::{Read, Write},
    net::{IpAddr, SocketAddr},
    path::{Component, Path, PathBuf},
    sync::Arc,
};
use tiny_http::{Header, Request, Response, Server, StatusCode};
use tungstenite::{Message, WebSocket, handshake::derive_accept_key, protocol::Role};

/// Directory listing HTML template (embedded at compile time)
const DIRECTORY_TEMPLATE: &str = include_str!("embed/serve/directory.html");

/// Client side of live reload
const RELOAD_SCRIPT: &str = include_str!("embed/serve/reload.js");

const RELOAD_SOCKET: &str = "/.rulesite/reload";
const RELOAD_SCRIPT_PATH: &str = "/.rulesite/reload.js";
const RELOAD_TAG: &str = r#"<script src="/.rulesite/reload.js"></script>"#;

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

// ============================================================================
// Live reload
// ============================================================================

/// What the browser should do after a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadKind {
    /// Only stylesheets changed: swap them in place
    Css,
    Page,
}

impl ReloadKind {
    pub fn for_paths(paths: &[PathBuf]) -> Self {
        let css_only = !paths.is_empty()
            && paths
                .iter()
                .all(|p| p.extension().is_some_and(|ext| ext == "css"));
        if css_only { Self::Css } else { Self::Page }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::Page => "page",
        }
    }
}

/// A connected live-reload socket.
trait Client: Send {
    /// False once the connection is gone.
    fn push(&mut self, message: &str) -> bool;
}

impl<S: Read + Write + Send> Client for WebSocket<S> {
    fn push(&mut self, message: &str) -> bool {
        self.send(Message::text(message.to_owned())).is_ok()
    }
}

/// Shared between the server, which adds sockets, and the rebuild loop,
/// which notifies them.
#[derive(Clone, Default)]
pub struct Reloader {
    clients: Arc<Mutex<Vec<Box<dyn Client>>>>,
}

impl Reloader {
    fn add(&self, client: Box<dyn Client>) {
        self.clients.lock().push(client);
    }

    /// Tell every browser to reload; closed sockets are dropped.
    pub fn notify(&self, kind: ReloadKind) {
        let mut clients = self.clients.lock();
        clients.retain_mut(|client| client.push(kind.as_str()));
        if !clients.is_empty() {
            log!("reload"; "{} ({} clients)", kind.as_str(), clients.len());
        }
    }
}

// ============================================================================
// Server Entry Point
// ============================================================================

/// Serve `root` until Ctrl+C.
pub fn serve_site(root: &Path, options: &ServeOptions, reloader: Reloader) -> Result<()> {
    let interface: IpAddr = options
        .interface
        .parse()
        .with_context(|| format!("Invalid interface '{}'", options.interface))?;

    let (server, addr) = try_bind_port(interface, options.port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "http://{addr}");

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, root, &reloader) {
            log!("serve"; "request error: {e}");
        }
    }
    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(
    interface: IpAddr,
    base_port: u16,
    max_retries: u16,
) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {base_port} in use, using {port} instead");
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(anyhow!(
        "Failed to bind after {max_retries} attempts (ports {base_port}-{}): {}",
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

// ============================================================================
// Request Handling
// ============================================================================

#[derive(Debug, PartialEq, Eq)]
enum Resolved {
    File(PathBuf),
    Listing(PathBuf),
    NotFound,
}

/// Map a decoded request path to something under `root`.
///
/// Order: file, then `index.html`, then a listing. `..` is never followed.
fn resolve(root: &Path, request_path: &str) -> Resolved {
    let relative = Path::new(request_path.trim_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Resolved::NotFound;
    }

    let local = root.join(relative);
    if local.is_file() {
        return Resolved::File(local);
    }
    if local.is_dir() {
        let index = local.join("index.html");
        if index.is_file() {
            return Resolved::File(index);
        }
        return Resolved::Listing(local);
    }
    Resolved::NotFound
}

fn handle_request(request: Request, root: &Path, reloader: &Reloader) -> Result<()> {
    // Decode URL-encoded characters (e.g., %20 → space)
    let url = urlencoding::decode(request.url())
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default();
    // Strip query string (e.g., ?t=123456) before resolving path
    let path = url.split('?').next().unwrap_or(&url).to_owned();

    match path.as_str() {
        RELOAD_SOCKET => return accept_socket(request, reloader),
        RELOAD_SCRIPT_PATH => {
            return respond(request, RELOAD_SCRIPT.as_bytes().to_vec(), "application/javascript; charset=utf-8");
        }
        _ => {}
    }

    match resolve(root, &path) {
        Resolved::File(file) => serve_file(request, &file),
        Resolved::Listing(dir) => {
            let listing = generate_directory_listing(&dir, path.trim_matches('/'))
                .with_context(|| format!("Failed to list {}", dir.display()))?;
            respond(request, inject_reload_script(&listing).into_bytes(), "text/html; charset=utf-8")
        }
        Resolved::NotFound => serve_not_found(request),
    }
}

/// Complete the websocket handshake and hand the socket to the reloader.
fn accept_socket(request: Request, reloader: &Reloader) -> Result<()> {
    let key = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Sec-WebSocket-Key"))
        .map(|h| h.value.as_str().to_owned());
    let Some(key) = key else {
        return serve_status(request, 400, "expected a websocket upgrade");
    };

    let response = Response::empty(StatusCode(101))
        .with_header(header("Sec-WebSocket-Accept", &derive_accept_key(key.as_bytes()))?);
    let stream = request.upgrade("websocket", response);
    reloader.add(Box::new(WebSocket::from_raw_socket(stream, Role::Server, None)));
    Ok(())
}

// ============================================================================
// Response Helpers
// ============================================================================

fn header(name: &str, value: &str) -> Result<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes())
        .map_err(|()| anyhow!("invalid header {name}: {value}"))
}

fn respond(request: Request, body: Vec<u8>, content_type: &str) -> Result<()> {
    let response = Response::from_data(body)
        .with_header(header("Content-Type", content_type)?)
        .with_header(header("Cache-Control", "no-store")?);
    request.respond(response)?;
    Ok(())
}

/// Serve a file with appropriate content type. HTML gets the reload script.
fn serve_file(request: Request, path: &Path) -> Result<()> {
    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let content_type = guess_content_type(path);

    let body = if content_type.starts_with("text/html") {
        match String::from_utf8(content) {
            Ok(html) => inject_reload_script(&html).into_bytes(),
            Err(e) => e.into_bytes(),
        }
    } else {
        content
    };
    respond(request, body, content_type)
}

fn serve_status(request: Request, code: u16, message: &str) -> Result<()> {
    let response = Response::from_string(message)
        .with_status_code(StatusCode(code))
        .with_header(header("Content-Type", "text/plain")?)
        .with_header(header("Cache-Control", "no-store")?);
    request.respond(response)?;
    Ok(())
}

fn serve_not_found(request: Request) -> Result<()> {
    serve_status(request, 404, "404 Not Found")
}

/// Put the reload script before `</head>`, or at the end without one.
fn inject_reload_script(html: &str) -> String {
    match html.find("</head>") {
        Some(at) => format!("{}{RELOAD_TAG}{}", &html[..at], &html[at..]),
        None => format!("{html}{RELOAD_TAG}"),
    }
}

// ============================================================================
// Content Type Detection
// ============================================================================

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        // Web content
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",
        Some("atom") => "application/atom+xml; charset=utf-8",
        Some("rss") => "application/rss+xml; charset=utf-8",

        // Images
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",

        // Documents
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",
        Some("md") => "text/markdown; charset=utf-8",

        _ => "application/octet-stream",
    }
}

// ============================================================================
// Directory Listing
// ============================================================================

/// HTML listing of `dir`, hidden entries left out, directories first.
// `{path}` and friends are template placeholders, not format args
#[allow(clippy::literal_string_with_formatting_args)]
fn generate_directory_listing(dir: &Path, request_path: &str) -> std::io::Result<String> {
    let mut entries: Vec<(bool, String)> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| {
            let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
            (is_dir, entry.file_name().to_string_lossy().into_owned())
        })
        .filter(|(_, name)| !name.starts_with('.'))
        .collect();
    entries.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    let items: Vec<String> = entries
        .iter()
        .map(|(is_dir, name)| {
            let icon = if *is_dir { "📁" } else { "📄" };
            let href = if request_path.is_empty() {
                format!("/{name}")
            } else {
                format!("/{request_path}/{name}")
            };
            format!(r#"<li><span class="icon">{icon}</span><a href="{href}">{name}</a></li>"#)
        })
        .collect();

    let parent_link = if request_path.is_empty() {
        String::new()
    } else {
        let parent = Path::new(request_path)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!(r#"<li class="parent"><span class="icon">📂</span><a href="/{parent}">..</a></li>"#)
    };

    Ok(DIRECTORY_TEMPLATE
        .replace("{path}", request_path)
        .replace("{parent_link}", &parent_link)
        .replace("{entries}", &items.join("\n        ")))
}
