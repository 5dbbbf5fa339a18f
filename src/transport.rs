// File: transport.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use crate::error::TransportError;
use crate::smuggle_test::SmuggleTest;
use async_trait::async_trait;
use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use log::trace;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};
use tokio_rustls::{rustls, TlsConnector};

/// Where one raw request is delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub ip: IpAddr,
    pub port: u16,
    pub tls: bool,
    pub server_name: String,
}

impl Endpoint {
    pub fn for_test(test: &SmuggleTest) -> Self {
        Self {
            ip: test.ip,
            port: test.port(),
            tls: test.is_https(),
            server_name: test
                .host()
                .trim_start_matches('[')
                .trim_end_matches(']')
                .to_string(),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

/// Delivers a raw request on a fresh connection and returns the raw bytes
/// the peer answered with before closing.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        endpoint: &Endpoint,
        request: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError>;
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
        _now: SystemTime,
    ) -> Result<rustls::client::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::ServerCertVerified::assertion())
    }
}

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Socket transport: plain TCP for `http`, TLS without certificate
/// verification for `https`. No connection is ever reused.
pub struct RawTransport {
    connector: TlsConnector,
    max_response_bytes: usize,
    rate_limiter: Option<Arc<DirectLimiter>>,
}

impl RawTransport {
    pub fn new(max_response_bytes: usize, rate_limit: Option<NonZeroU32>) -> Self {
        let config = rustls::ClientConfig::builder()
            .with_safe_defaults()
            .with_custom_certificate_verifier(Arc::new(NoCertificateVerification))
            .with_no_client_auth();

        Self {
            connector: TlsConnector::from(Arc::new(config)),
            max_response_bytes,
            rate_limiter: rate_limit.map(|r| Arc::new(RateLimiter::direct(Quota::per_second(r)))),
        }
    }

    async fn exchange<S>(
        &self,
        mut stream: S,
        request: &[u8],
        deadline: Instant,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let write = async {
            stream.write_all(request).await?;
            stream.flush().await
        };
        match timeout_at(deadline, write).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(TransportError::Write(e)),
            Err(_) => return Err(TransportError::Timeout(timeout.as_millis())),
        }

        let mut response = Vec::new();
        let limit = self.max_response_bytes as u64;
        let read = async {
            let mut limited = (&mut stream).take(limit);
            limited.read_to_end(&mut response).await
        };

        // Dropping the read future and the stream on expiry closes the socket.
        let outcome = timeout_at(deadline, read).await;
        match outcome {
            Ok(Ok(_)) => Ok(response),
            // TLS peers routinely close without close_notify.
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof && !response.is_empty() => {
                Ok(response)
            }
            Ok(Err(e)) => Err(TransportError::Read(e)),
            Err(_) => Err(TransportError::Timeout(timeout.as_millis())),
        }
    }
}

#[async_trait]
impl Transport for RawTransport {
    async fn send(
        &self,
        endpoint: &Endpoint,
        request: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        let addr = endpoint.addr();
        let deadline = Instant::now() + timeout;
        trace!("Connecting to {} (tls={})", addr, endpoint.tls);

        let stream = match timeout_at(deadline, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(TransportError::Connect(e.to_string())),
            Err(_) => {
                return Err(TransportError::Connect(format!(
                    "connect to {} timed out after {}ms",
                    addr,
                    timeout.as_millis()
                )))
            }
        };

        if !endpoint.tls {
            return self.exchange(stream, request, deadline, timeout).await;
        }

        let domain = rustls::ServerName::try_from(endpoint.server_name.as_str())
            .map_err(|e| TransportError::Tls(e.to_string()))?;
        let tls_stream = match timeout_at(deadline, self.connector.connect(domain, stream)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(TransportError::Tls(e.to_string())),
            Err(_) => {
                return Err(TransportError::Tls(format!(
                    "handshake with {} timed out after {}ms",
                    addr,
                    timeout.as_millis()
                )))
            }
        };

        self.exchange(tls_stream, request, deadline, timeout).await
    }
}
