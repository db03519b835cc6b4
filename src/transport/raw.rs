// File: raw.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use futures::future::BoxFuture;
use log::trace;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::{rustls, TlsConnector};

use super::{parse_response_head, Transport, TransportResponse};
use crate::config::TransportOptions;
use crate::errors::TransportError;
use crate::template::ConcreteRequest;

/// Writes the template bytes verbatim on a fresh connection per attempt,
/// so every sample pays the same connection setup cost.
pub struct RawTransport {
    options: TransportOptions,
    connector: TlsConnector,
}

impl RawTransport {
    pub fn new(options: TransportOptions) -> Self {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| {
            rustls::OwnedTrustAnchor::from_subject_spki_name_constraints(
                ta.subject,
                ta.spki,
                ta.name_constraints,
            )
        }));

        let mut config = rustls::ClientConfig::builder()
            .with_safe_defaults()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        if options.insecure() {
            config
                .dangerous()
                .set_certificate_verifier(Arc::new(NoCertificateVerification));
        }

        RawTransport {
            options,
            connector: TlsConnector::from(Arc::new(config)),
        }
    }

    async fn send_raw(&self, request: &ConcreteRequest) -> Result<TransportResponse, TransportError> {
        let address = if request.host().contains(':') {
            format!("[{}]:{}", request.host(), request.port())
        } else {
            format!("{}:{}", request.host(), request.port())
        };

        let stream = match tokio::time::timeout(
            self.options.connect_timeout(),
            TcpStream::connect(&address),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(TransportError::Connect(format!("{}: {}", address, e))),
            Err(_) => return Err(TransportError::Timeout(format!("connecting to {}", address))),
        };
        let _ = stream.set_nodelay(true);

        let head_only = request.raw().starts_with("HEAD ");

        if request.use_tls() {
            let domain = rustls::ServerName::try_from(request.host())
                .map_err(|e| TransportError::Tls(format!("{}: {}", request.host(), e)))?;
            let mut tls_stream = self
                .connector
                .connect(domain, stream)
                .await
                .map_err(|e| TransportError::Tls(e.to_string()))?;
            self.exchange(&mut tls_stream, request.as_bytes(), head_only).await
        } else {
            let mut stream = stream;
            self.exchange(&mut stream, request.as_bytes(), head_only).await
        }
    }

    async fn exchange<S>(
        &self,
        stream: &mut S,
        payload: &[u8],
        head_only: bool,
    ) -> Result<TransportResponse, TransportError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        stream.write_all(payload).await?;
        stream.flush().await?;

        let deadline = Instant::now() + self.options.read_timeout();
        let max_size = self.options.max_response_size();
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 4096];

        loop {
            if let Some(expected) = expected_length(&buffer, head_only) {
                if buffer.len() >= expected {
                    break;
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                if header_end(&buffer).is_some() {
                    break;
                }
                return Err(TransportError::Timeout("reading response".to_string()));
            }

            match tokio::time::timeout(remaining, stream.read(&mut chunk)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    buffer.extend_from_slice(&chunk[..n]);
                    if buffer.len() >= max_size {
                        break;
                    }
                }
                // Servers closing TLS without close_notify surface as errors.
                Ok(Err(_)) if header_end(&buffer).is_some() => break,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) if header_end(&buffer).is_some() => break,
                Err(_) => return Err(TransportError::Timeout("reading response".to_string())),
            }
        }

        if buffer.is_empty() {
            return Err(TransportError::InvalidResponse("Empty response".to_string()));
        }

        let raw_response = String::from_utf8_lossy(&buffer);
        let mut response = parse_response_head(&raw_response)?;
        response.body_len = header_end(&buffer).map_or(0, |end| buffer.len() - end);
        trace!("Received {} bytes, status {}", buffer.len(), response.status);
        Ok(response)
    }
}

impl Transport for RawTransport {
    fn send<'a>(
        &'a self,
        request: &'a ConcreteRequest,
    ) -> BoxFuture<'a, Result<TransportResponse, TransportError>> {
        Box::pin(self.send_raw(request))
    }

    fn name(&self) -> &'static str {
        "raw"
    }
}

fn header_end(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

/// Total response length once it can be known from the header block.
fn expected_length(buffer: &[u8], head_only: bool) -> Option<usize> {
    let end = header_end(buffer)?;
    let head = String::from_utf8_lossy(&buffer[..end]);
    let response = parse_response_head(&head).ok()?;

    if head_only || matches!(response.status, 100..=199 | 204 | 304) {
        return Some(end);
    }

    if let Some(length) = response.headers.get("content-length") {
        // An unrepresentable length falls back to reading until close.
        return length.parse::<usize>().ok().and_then(|len| end.checked_add(len));
    }

    let chunked = response
        .headers
        .get("transfer-encoding")
        .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"));
    if chunked && buffer.ends_with(b"0\r\n\r\n") {
        return Some(buffer.len());
    }

    None
}

struct NoCertificateVerification;

impl rustls::client::ServerCertVerifier for NoCertificateVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::Certificate,
        _intermediates: &[rustls::Certificate],
        _server_name: &rustls::ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> Result<rustls::client::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::ServerCertVerified::assertion())
    }
}
