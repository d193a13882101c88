// Copyright 2026 danecert contributors
// SPDX-License-Identifier: Apache-2.0

//! Single-endpoint HTTP service wrapping the issuance pipeline.
//!
//! `POST /api` with `{"domain": "...", "ip": "..."}` issues a certificate and
//! returns the TLSA record; everything else is a redirect or a hint.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Bytes;
use hyper::header::{CONTENT_TYPE, LOCATION};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Paths;
use crate::error::{Error, Result};
use crate::issue::{issue, DomainLocks};
use crate::keys::AlgorithmProfile;

/// Graceful shutdown timeout for draining in-flight connections.
const GRACEFUL_SHUTDOWN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

const MAX_CONNECTIONS: usize = 1024;

/// Issuance requests are tiny; anything bigger than this is not a valid body.
const MAX_BODY_SIZE: usize = 64 * 1024;

const GREETING: &str = "Send your POST request to this URL to generate a certificate.";

/// Shared state for the request handlers.
pub struct ServerState {
    pub paths: Paths,
    pub profile: AlgorithmProfile,
    pub locks: DomainLocks,
}

impl ServerState {
    pub fn new(paths: Paths) -> Self {
        Self {
            paths,
            profile: AlgorithmProfile::default(),
            locks: DomainLocks::default(),
        }
    }
}

/// Run the issuance service until ctrl-c.
pub async fn run_server(addr: SocketAddr, state: Arc<ServerState>) -> Result<()> {
    let listener = TcpListener::bind(addr).await.map_err(|e| Error::BindFailed {
        addr: addr.to_string(),
        reason: e.to_string(),
    })?;
    info!("listening on http://{addr}");

    let semaphore = Arc::new(Semaphore::new(MAX_CONNECTIONS));
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut tasks: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("accept failed: {e}");
                        continue;
                    }
                };
                let permit = match semaphore.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => {
                        warn!("connection limit reached, dropping {peer}");
                        continue;
                    }
                };

                let state = state.clone();
                let mut shutdown_rx = shutdown_tx.subscribe();
                tasks.spawn(async move {
                    let _permit = permit;
                    let io = TokioIo::new(stream);
                    let service = service_fn(move |req| {
                        let state = state.clone();
                        async move { Ok::<_, Infallible>(handle(req, state).await) }
                    });
                    let conn = http1::Builder::new().serve_connection(io, service);
                    tokio::pin!(conn);
                    tokio::select! {
                        result = &mut conn => {
                            if let Err(e) = result {
                                debug!("connection from {peer} ended with error: {e}");
                            }
                        }
                        _ = shutdown_rx.recv() => {
                            conn.as_mut().graceful_shutdown();
                            let _ = conn.await;
                        }
                    }
                });
            }
        }
    }

    let _ = shutdown_tx.send(());
    let drain = async {
        while tasks.join_next().await.is_some() {}
    };
    if tokio::time::timeout(GRACEFUL_SHUTDOWN_TIMEOUT, drain).await.is_err() {
        warn!("graceful shutdown timed out, aborting in-flight connections");
        tasks.shutdown().await;
    }

    Ok(())
}

async fn handle<B>(req: Request<B>, state: Arc<ServerState>) -> Response<Full<Bytes>>
where
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/") => redirect_to_api(),
        (&Method::GET, "/api") => {
            json_response(StatusCode::OK, &json!({ "message": GREETING }))
        }
        (&Method::POST, "/api") => handle_issue(req, state).await,
        _ => json_response(
            StatusCode::NOT_FOUND,
            &json!({ "message": "Not found." }),
        ),
    }
}

async fn handle_issue<B>(req: Request<B>, state: Arc<ServerState>) -> Response<Full<Bytes>>
where
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let body = match Limited::new(req.into_body(), MAX_BODY_SIZE).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => {
            return json_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                &json!({ "message": "Body too large!" }),
            );
        }
    };

    let (domain, ip) = match parse_issue_request(&body) {
        Ok(fields) => fields,
        Err(response) => return response,
    };

    // Serialize concurrent issuance for the same domain; interleaved writes
    // would corrupt the artifact files.
    let lock = state.locks.handle(&domain);
    let _guard = lock.lock().await;

    let result = {
        let state = state.clone();
        let domain = domain.clone();
        let ip = ip.clone();
        tokio::task::spawn_blocking(move || issue(&state.paths, &state.profile, &domain, &ip))
            .await
    };

    match result {
        Ok(Ok(issuance)) => json_response(
            StatusCode::CREATED,
            &json!({
                "message": format!("Created cert for {domain}!"),
                "tlsa": issuance.tlsa,
            }),
        ),
        Ok(Err(e @ (Error::InvalidDomain { .. } | Error::InvalidIp { .. }))) => {
            warn!("rejected issuance for {domain}: {e}");
            json_response(StatusCode::BAD_REQUEST, &json!({ "message": e.to_string() }))
        }
        Ok(Err(e)) => {
            error!("issuance for {domain} failed: {e}");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({ "message": e.to_string() }),
            )
        }
        Err(e) => {
            error!("issuance task for {domain} panicked: {e}");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({ "message": "Internal server error." }),
            )
        }
    }
}

/// Validate the JSON body shape: both fields present and non-empty strings.
/// Format validation of the values themselves is out of scope here.
fn parse_issue_request(
    body: &[u8],
) -> std::result::Result<(String, String), Response<Full<Bytes>>> {
    let value: HashMap<String, serde_json::Value> = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) => {
            return Err(json_response(
                StatusCode::BAD_REQUEST,
                &json!({ "message": "Invalid JSON!" }),
            ));
        }
    };

    // Absent covers every falsy value, not just null and "": a client sending
    // `false` or `0` forgot the field, it did not mistype it.
    let missing = |field: &str| match value.get(field) {
        None | Some(serde_json::Value::Null) => true,
        Some(serde_json::Value::Bool(b)) => !b,
        Some(serde_json::Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(serde_json::Value::String(s)) => s.is_empty(),
        Some(_) => false,
    };
    if missing("domain") || missing("ip") {
        return Err(json_response(
            StatusCode::BAD_REQUEST,
            &json!({ "message": "Missing data!" }),
        ));
    }

    match (value.get("domain"), value.get("ip")) {
        (Some(serde_json::Value::String(domain)), Some(serde_json::Value::String(ip))) => {
            Ok((domain.clone(), ip.clone()))
        }
        _ => Err(json_response(
            StatusCode::BAD_REQUEST,
            &json!({ "message": "Weird data!" }),
        )),
    }
}

fn redirect_to_api() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::FOUND)
        .header(LOCATION, "/api")
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

fn json_response(status: StatusCode, body: &serde_json::Value) -> Response<Full<Bytes>> {
    let bytes = serde_json::to_vec(body).unwrap_or_default();
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(bytes)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from_static(b"{}"))))
}
