//! HTTP/1.1 server
//!
//! One endpoint: `GET` answers liveness, `POST` carries an action. Envelopes
//! produced by the action path are always sent with status 200; only a wrong
//! path (404) or method (405) changes the status line.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{body::Incoming, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use relay_core::{Envelope, ProxyError, Redactor, DEFAULT_ACTION};
use relay_storage::{DriveBackend, GoogleDriveBackend, GoogleDriveConfig, LocalBackend};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{debug, error, info, instrument};

use crate::config::{DriveConfig, ProxyConfig};
use crate::handler::ActionHandler;
use crate::logging::{LogSink, TracingSink};

/// Server state
pub struct ProxyState {
    /// Configuration
    pub config: ProxyConfig,
    /// Action handler
    pub handler: ActionHandler,
}

impl ProxyState {
    /// Build the drive backend and handler from config
    pub async fn from_config(config: ProxyConfig) -> anyhow::Result<Self> {
        let backend: Arc<dyn DriveBackend> = match &config.drive {
            DriveConfig::Local { path } => Arc::new(LocalBackend::new(path).await?),
            DriveConfig::GoogleDrive {
                access_token,
                api_url,
                upload_url,
                permanent_delete,
                timeout_secs,
            } => {
                let mut drive = GoogleDriveConfig::new(access_token.expose())
                    .with_permanent_delete(*permanent_delete)
                    .with_timeout(std::time::Duration::from_secs(*timeout_secs));
                if let Some(url) = api_url {
                    drive = drive.with_api_url(url);
                }
                if let Some(url) = upload_url {
                    drive = drive.with_upload_url(url);
                }
                Arc::new(GoogleDriveBackend::new(drive)?)
            }
        };

        let redactor = config
            .secrets()
            .into_iter()
            .fold(Redactor::new(), |r, secret| r.with_secret(secret));

        Ok(Self::new(
            config,
            backend,
            Arc::new(TracingSink),
            redactor,
        ))
    }

    /// Assemble state from parts
    pub fn new(
        config: ProxyConfig,
        backend: Arc<dyn DriveBackend>,
        sink: Arc<dyn LogSink>,
        redactor: Redactor,
    ) -> Self {
        Self {
            config,
            handler: ActionHandler::new(backend, sink, redactor),
        }
    }
}

/// Bind the configured address and serve until the task is dropped
#[instrument(skip(state))]
pub async fn run_server(state: Arc<ProxyState>) -> anyhow::Result<()> {
    let addr: SocketAddr = state.config.listen_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;

    info!(
        "Backup relay listening on http://{}{} (drive: {})",
        addr,
        state.config.endpoint_path,
        state.handler.backend_name()
    );

    serve(listener, state).await
}

/// Accept connections on an already bound listener
pub async fn serve(listener: TcpListener, state: Arc<ProxyState>) -> anyhow::Result<()> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let result = http1::Builder::new()
                .serve_connection(
                    io,
                    service_fn(move |req| {
                        let state = state.clone();
                        handle_request(state, peer_addr, req)
                    }),
                )
                .await;

            if let Err(err) = result {
                error!("Error serving connection: {:?}", err);
            }
        });
    }
}

/// Handle an HTTP request
async fn handle_request(
    state: Arc<ProxyState>,
    peer_addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("{} {} from {}", method, path, peer_addr);

    if path != state.config.endpoint_path {
        let envelope = Envelope::failure(
            format!("No endpoint at {path}"),
            json!({"kind": "NOT_FOUND", "path": path}),
        );
        return Ok(json_response(StatusCode::NOT_FOUND, &envelope));
    }

    let envelope = match method {
        Method::GET => state.handler.liveness(method.as_str()),
        Method::POST => {
            let limited = Limited::new(req.into_body(), state.config.max_body_bytes);
            match limited.collect().await {
                Ok(collected) => {
                    let body = collected.to_bytes();
                    state.handler.handle(method.as_str(), &body).await
                }
                Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                    let err = ProxyError::InvalidRequest(format!(
                        "request body exceeds {} bytes",
                        state.config.max_body_bytes
                    ));
                    Envelope::from_error(&err, DEFAULT_ACTION, &Redactor::new())
                }
                Err(e) => {
                    debug!("Failed to read request body from {}: {}", peer_addr, e);
                    let err = ProxyError::InvalidRequest("failed to read request body".into());
                    Envelope::from_error(&err, DEFAULT_ACTION, &Redactor::new())
                }
            }
        }
        _ => {
            let envelope = Envelope::failure(
                format!("Method {method} not allowed"),
                json!({"kind": "INVALID_REQUEST", "method": method.as_str()}),
            );
            let mut response = json_response(StatusCode::METHOD_NOT_ALLOWED, &envelope);
            response
                .headers_mut()
                .insert("allow", HeaderValue::from_static("GET, POST"));
            return Ok(response);
        }
    };

    Ok(json_response(StatusCode::OK, &envelope))
}

// === Response helpers ===

fn json_response<T: serde::Serialize>(status: StatusCode, data: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(data).unwrap_or_else(|_| "{}".to_string());
    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
