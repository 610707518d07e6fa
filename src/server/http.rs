//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Bodies are read in
//! full (bounded) before routing, so handlers work on plain bytes.

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auction::AuctionService;
use crate::config::Args;
use crate::routes;

/// Largest request body accepted by any route
pub const MAX_BODY_BYTES: usize = 16 * 1024;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub service: Arc<AuctionService>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(args: Args, service: Arc<AuctionService>) -> Self {
        Self {
            args,
            service,
            started_at: Instant::now(),
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> std::io::Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Network auction listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - fixture seeding allowed");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Read the body and hand the request to the router
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let (parts, body) = req.into_parts();
    let path = parts.uri.path().to_string();

    debug!("[{}] {} {}", addr, parts.method, path);

    let body = match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("[{}] Rejected body for {} {}: {}", addr, parts.method, path, e);
            return Ok(routes::bad_request_response(&format!(
                "Unreadable or oversized body (limit {} bytes)",
                MAX_BODY_BYTES
            )));
        }
    };

    let response = routes::dispatch(&state, &parts.method, &path, body).await;

    if response.status() == StatusCode::NOT_FOUND {
        debug!("[{}] {} {} -> 404", addr, parts.method, path);
    } else {
        info!("[{}] {} {} -> {}", addr, parts.method, path, response.status().as_u16());
    }

    Ok(response)
}
