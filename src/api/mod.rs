//! HTTP control surface.
//!
//! Minimal HTTP/1.1 server on a background thread:
//! - `GET /health` — liveness probe
//! - `GET /detections?skip=&limit=` — stored records, paged, insertion order
//! - `POST /start_detection` — validate paths, dispatch a pipeline run, and
//!   return immediately; run outcomes are logged, never surfaced
//!
//! Run dispatch is fire-and-forget by design: two overlapping runs are not
//! coordinated, each owns its own source and tracker.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::pipeline::{run_from_paths, PipelineConfig};
use crate::storage::{SharedStore, StoreHandle};
use crate::transport::{PublisherHandle, SharedPublisher};

const MAX_REQUEST_BYTES: usize = 8192;
const DEFAULT_PAGE_LIMIT: usize = 100;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8799".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("api server thread panicked"))?;
        }
        Ok(())
    }
}

pub struct ApiServer {
    cfg: ApiConfig,
    store: SharedStore,
    publisher: SharedPublisher,
    pipeline_cfg: PipelineConfig,
}

impl ApiServer {
    pub fn new(
        cfg: ApiConfig,
        store: SharedStore,
        publisher: SharedPublisher,
        pipeline_cfg: PipelineConfig,
    ) -> Self {
        Self {
            cfg,
            store,
            publisher,
            pipeline_cfg,
        }
    }

    pub fn spawn(self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let join = std::thread::spawn(move || {
            if let Err(err) = run_api(listener, self, shutdown_thread) {
                log::error!("detection api stopped: {}", err);
            }
        });

        Ok(ApiHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_api(listener: TcpListener, server: ApiServer, shutdown: Arc<AtomicBool>) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, _)) => {
                if let Err(err) = handle_connection(stream, &server) {
                    log::warn!("detection api request rejected: {}", err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn handle_connection(mut stream: TcpStream, server: &ApiServer) -> Result<()> {
    let peer = stream.peer_addr()?;
    let local = stream.local_addr()?;
    if local.ip().is_loopback() && !peer.ip().is_loopback() {
        write_json_response(&mut stream, 403, r#"{"error":"forbidden"}"#)?;
        return Ok(());
    }

    let request = read_request(&mut stream)?;
    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/health") => write_json_response(&mut stream, 200, r#"{"status":"ok"}"#),
        ("GET", "/detections") => handle_get_detections(&mut stream, server, &request),
        ("POST", "/start_detection") => handle_start_detection(&mut stream, server, &request),
        ("GET", "/start_detection") | ("POST", "/detections") => {
            write_json_response(&mut stream, 405, r#"{"error":"method_not_allowed"}"#)
        }
        _ => write_json_response(&mut stream, 404, r#"{"error":"not_found"}"#),
    }
}

fn handle_get_detections(
    stream: &mut TcpStream,
    server: &ApiServer,
    request: &HttpRequest,
) -> Result<()> {
    let (skip, limit) = match parse_paging(request) {
        Ok(paging) => paging,
        Err(_) => {
            return write_json_response(stream, 400, r#"{"error":"invalid_paging"}"#);
        }
    };

    let records = {
        let mut store = server
            .store
            .lock()
            .map_err(|_| anyhow!("store lock poisoned"))?;
        store.read_records(skip, limit)
    };
    match records {
        Ok(records) => {
            let payload = serde_json::to_vec(&records)?;
            write_response(stream, 200, "application/json", &payload)
        }
        Err(err) => {
            log::error!("failed to read detections: {}", err);
            write_json_response(stream, 500, r#"{"error":"storage"}"#)
        }
    }
}

#[derive(Debug, Deserialize)]
struct StartDetectionRequest {
    video_path: String,
    model_path: String,
}

fn handle_start_detection(
    stream: &mut TcpStream,
    server: &ApiServer,
    request: &HttpRequest,
) -> Result<()> {
    let body: StartDetectionRequest = match serde_json::from_slice(&request.body) {
        Ok(body) => body,
        Err(_) => {
            return write_json_response(stream, 400, r#"{"error":"invalid_request"}"#);
        }
    };

    // Both paths are validated before anything is dispatched; a bad path is
    // a synchronous client error, not a failed run.
    if !path_is_available(&body.video_path) {
        let payload = serde_json::to_vec(&serde_json::json!({
            "error": format!("video file not found: {}", body.video_path),
        }))?;
        return write_response(stream, 400, "application/json", &payload);
    }
    if !path_is_available(&body.model_path) {
        let payload = serde_json::to_vec(&serde_json::json!({
            "error": format!("model file not found: {}", body.model_path),
        }))?;
        return write_response(stream, 400, "application/json", &payload);
    }

    let mut store = StoreHandle(server.store.clone());
    let mut publisher = PublisherHandle(server.publisher.clone());
    let pipeline_cfg = server.pipeline_cfg.clone();
    let video_path = body.video_path.clone();
    let model_path = body.model_path.clone();
    std::thread::spawn(move || {
        log::info!("detection run starting: video={}", video_path);
        match run_from_paths(
            &video_path,
            &model_path,
            &mut store,
            &mut publisher,
            &pipeline_cfg,
        ) {
            Ok(summary) => log::info!(
                "detection run finished: {} frames, {} vehicles seen",
                summary.frames_processed,
                summary.vehicles_seen
            ),
            Err(err) => log::error!("detection run failed: {}", err),
        }
    });

    let payload = serde_json::to_vec(&serde_json::json!({
        "message": "detection started",
        "video_path": body.video_path,
        "model_path": body.model_path,
    }))?;
    write_response(stream, 200, "application/json", &payload)
}

/// A path is usable when it names an existing local file or a `stub://`
/// synthetic source/backend.
fn path_is_available(path: &str) -> bool {
    path.starts_with("stub://") || Path::new(path).exists()
}

fn parse_paging(request: &HttpRequest) -> Result<(usize, usize)> {
    let mut skip = 0usize;
    let mut limit = DEFAULT_PAGE_LIMIT;
    if let Some(query) = request.raw_path.split('?').nth(1) {
        for pair in query.split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            match key {
                "skip" => skip = value.parse()?,
                "limit" => limit = value.parse()?,
                _ => {}
            }
        }
    }
    Ok((skip, limit))
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    let mut buf = [0u8; 1024];
    let mut data = Vec::new();
    let header_end = loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break data
                .windows(4)
                .position(|w| w == b"\r\n\r\n")
                .ok_or_else(|| anyhow!("truncated request"))?;
        }
        data.extend_from_slice(&buf[..n]);
        if data.len() > MAX_REQUEST_BYTES {
            return Err(anyhow!("request too large"));
        }
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let header_text = String::from_utf8_lossy(&data[..header_end]).to_string();
    let mut lines = header_text.split("\r\n");
    let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;
    let mut headers = HashMap::new();
    for line in lines {
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }

    let content_length: usize = headers
        .get("content-length")
        .map(|v| v.parse())
        .transpose()
        .map_err(|_| anyhow!("invalid content-length"))?
        .unwrap_or(0);
    if content_length > MAX_REQUEST_BYTES {
        return Err(anyhow!("request body too large"));
    }

    let mut body = data[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!("truncated request body"));
        }
        body.extend_from_slice(&buf[..n]);
    }
    body.truncate(content_length);

    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
    Ok(HttpRequest {
        method: method.to_string(),
        path,
        raw_path: raw_path.to_string(),
        body,
    })
}

fn write_json_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    write_response(stream, status, "application/json", body.as_bytes())
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        403 => "HTTP/1.1 403 Forbidden",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    Ok(())
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    raw_path: String,
    body: Vec<u8>,
}
