// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Minimal HTTP/1.1 client over a unix domain socket

use crate::error::{DevclusterError, Result};
use bytes::Bytes;
use http::{header, Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use std::path::PathBuf;
use tracing::debug;

/// An HTTP endpoint reachable through a local socket file
#[derive(Debug, Clone)]
pub struct SocketEndpoint {
    path: PathBuf,
}

impl SocketEndpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn get_json<T: serde::de::DeserializeOwned>(&self, uri: &str) -> Result<T> {
        let body = self.request(Method::GET, uri, None).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn post_json(&self, uri: &str, payload: &serde_json::Value) -> Result<Bytes> {
        let body = serde_json::to_vec(payload)?;
        self.request(Method::POST, uri, Some(body)).await
    }

    /// Send one request on a fresh connection; non-2xx answers are errors.
    #[cfg(unix)]
    pub async fn request(&self, method: Method, uri: &str, body: Option<Vec<u8>>) -> Result<Bytes> {
        use hyper_util::rt::TokioIo;
        use tokio::net::UnixStream;

        let stream = UnixStream::connect(&self.path).await.map_err(|e| {
            DevclusterError::Engine(format!("connecting to {}: {}", self.path.display(), e))
        })?;

        let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(engine_error)?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!("socket connection closed: {}", e);
            }
        });

        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::HOST, "localhost")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body.unwrap_or_default())))
            .map_err(|e| DevclusterError::Engine(e.to_string()))?;

        let response = sender.send_request(request).await.map_err(engine_error)?;
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(engine_error)?
            .to_bytes();

        check_status(uri, status, &bytes)?;
        Ok(bytes)
    }

    #[cfg(not(unix))]
    pub async fn request(
        &self,
        _method: Method,
        _uri: &str,
        _body: Option<Vec<u8>>,
    ) -> Result<Bytes> {
        Err(DevclusterError::Engine(format!(
            "unix sockets are not available on this platform ({})",
            self.path.display()
        )))
    }
}

fn engine_error(e: hyper::Error) -> DevclusterError {
    DevclusterError::Engine(e.to_string())
}

fn check_status(uri: &str, status: StatusCode, body: &[u8]) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    Err(DevclusterError::Engine(format!(
        "{} returned {}: {}",
        uri,
        status,
        String::from_utf8_lossy(body).trim()
    )))
}
