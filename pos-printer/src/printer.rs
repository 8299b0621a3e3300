//! Printer adapters for sending print data
//!
//! Supports:
//! - Network printers speaking raw ESC/POS (TCP port 9100)
//! - ePOS printers accepting SOAP over HTTPS (port 8043)

use crate::epos::{EPOS_SERVICE_PATH, EposResponse};
use crate::error::{PrintError, PrintResult};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, instrument, warn};

/// Default raw ESC/POS port
pub const RAW_PORT: u16 = 9100;

/// Default ePOS HTTPS port
pub const EPOS_PORT: u16 = 8043;

const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Trait for printer adapters
#[allow(async_fn_in_trait)]
pub trait Printer {
    /// Send a rendered job to the printer
    async fn print(&self, data: &[u8]) -> PrintResult<()>;

    /// Check if the printer is online/reachable
    async fn is_online(&self) -> bool;
}

/// Format `host:port`, bracketing bare IPv6 literals
fn host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

fn classify_connect_error(addr: &str, e: std::io::Error) -> PrintError {
    match e.kind() {
        ErrorKind::TimedOut => PrintError::Timeout(format!("{}: {}", addr, e)),
        _ => PrintError::Connection(format!("{}: {}", addr, e)),
    }
}

async fn probe(host: &str, port: u16) -> bool {
    match tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect((host, port))).await {
        Ok(Ok(_)) => {
            info!("Printer online");
            true
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Printer offline");
            false
        }
        Err(_) => {
            warn!("Printer check timeout");
            false
        }
    }
}

/// Network printer (raw TCP, usually port 9100)
///
/// The protocol has no acknowledgement: the job is considered delivered once
/// every byte is written and the linger period has elapsed.
#[derive(Debug, Clone)]
pub struct NetworkPrinter {
    host: String,
    port: u16,
    connect_timeout: Duration,
    write_timeout: Duration,
    linger: Duration,
}

impl NetworkPrinter {
    /// Create a new network printer
    pub fn new(host: &str, port: u16) -> PrintResult<Self> {
        if host.trim().is_empty() {
            return Err(PrintError::InvalidConfig("Empty printer address".to_string()));
        }
        if port == 0 {
            return Err(PrintError::InvalidConfig(format!(
                "Invalid port for {}: 0",
                host
            )));
        }

        Ok(Self {
            host: host.trim().to_string(),
            port,
            connect_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            linger: Duration::from_secs(1),
        })
    }

    /// Set connection timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the deadline for writing the whole job
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set how long to wait after writing before closing the socket
    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }

    /// Get the printer address
    pub fn addr(&self) -> String {
        host_port(&self.host, self.port)
    }
}

impl Printer for NetworkPrinter {
    #[instrument(skip(self, data), fields(addr = %self.addr(), data_len = data.len()))]
    async fn print(&self, data: &[u8]) -> PrintResult<()> {
        let addr = self.addr();
        debug!("Connecting to printer");

        let mut stream = tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        .map_err(|_| PrintError::Timeout(format!("Connection timeout: {}", addr)))?
        .map_err(|e| classify_connect_error(&addr, e))?;

        debug!("Connected, sending {} bytes", data.len());

        tokio::time::timeout(self.write_timeout, async {
            stream.write_all(data).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| PrintError::Timeout(format!("Write timeout: {}", addr)))?
        .map_err(|e| {
            PrintError::Io(std::io::Error::new(
                e.kind(),
                format!("Write failed: {}", e),
            ))
        })?;

        // Give the device time to drain its buffer. Status bytes it sends back
        // are discarded; only the peer closing or the deadline ends the wait.
        let _ = tokio::time::timeout(self.linger, drain(&mut stream)).await;

        if let Err(e) = stream.shutdown().await {
            debug!(error = %e, "Shutdown after write failed");
        }

        info!("Print job sent successfully");
        Ok(())
    }

    #[instrument(skip(self), fields(addr = %self.addr()))]
    async fn is_online(&self) -> bool {
        probe(&self.host, self.port).await
    }
}

/// Read and discard until EOF or a read error
async fn drain(stream: &mut TcpStream) {
    let mut scratch = [0u8; 64];
    while let Ok(n) = stream.read(&mut scratch).await {
        if n == 0 {
            break;
        }
    }
}

/// Certificate handling for an ePOS endpoint
///
/// Devices on the local network usually present self-signed certificates;
/// relaxing validation has to be requested per printer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TlsPolicy {
    #[default]
    Verify,
    AcceptInvalidCerts,
}

/// URL scheme used to reach an ePOS endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Https,
    /// Plain HTTP, for devices behind a TLS-terminating bridge
    Http,
}

impl Scheme {
    fn as_str(self) -> &'static str {
        match self {
            Scheme::Https => "https",
            Scheme::Http => "http",
        }
    }
}

/// HTTP client shared by ePOS printers
pub type HttpClient = reqwest::Client;

/// Build the HTTP client used for ePOS delivery
pub fn epos_client(
    tls: TlsPolicy,
    connect_timeout: Duration,
    timeout: Duration,
) -> PrintResult<HttpClient> {
    let accept_invalid = tls == TlsPolicy::AcceptInvalidCerts;
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(timeout)
        .danger_accept_invalid_certs(accept_invalid)
        .build()
        .map_err(|e| PrintError::InvalidConfig(format!("HTTP client: {}", e)))
}

fn classify_http_error(endpoint: &str, e: reqwest::Error) -> PrintError {
    if e.is_timeout() {
        PrintError::Timeout(format!("{}: {}", endpoint, e))
    } else if e.is_connect() {
        PrintError::Connection(format!("{}: {}", endpoint, e))
    } else {
        PrintError::Http(format!("{}: {}", endpoint, e))
    }
}

fn snippet(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// ePOS printer (SOAP over HTTPS, usually port 8043)
#[derive(Debug, Clone)]
pub struct EposPrinter {
    client: HttpClient,
    host: String,
    port: u16,
    endpoint: String,
}

impl EposPrinter {
    /// Create a printer that shares an existing client
    pub fn new(
        client: HttpClient,
        host: &str,
        port: u16,
        scheme: Scheme,
    ) -> PrintResult<Self> {
        if host.trim().is_empty() {
            return Err(PrintError::InvalidConfig("Empty printer address".to_string()));
        }
        let host = host.trim().to_string();
        let endpoint = format!(
            "{}://{}{}",
            scheme.as_str(),
            host_port(&host, port),
            EPOS_SERVICE_PATH
        );

        Ok(Self {
            client,
            host,
            port,
            endpoint,
        })
    }

    /// Full service URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Printer for EposPrinter {
    #[instrument(skip(self, data), fields(endpoint = %self.endpoint, data_len = data.len()))]
    async fn print(&self, data: &[u8]) -> PrintResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", "\"\"")
            .body(data.to_vec())
            .send()
            .await
            .map_err(|e| classify_http_error(&self.endpoint, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify_http_error(&self.endpoint, e))?;

        debug!(status = %status, "Printer responded");

        if !status.is_success() {
            return Err(PrintError::Rejected(format!(
                "HTTP {}: {}",
                status,
                snippet(&body)
            )));
        }

        let parsed = EposResponse::parse(&body);
        if !parsed.success {
            let reason = parsed
                .code
                .unwrap_or_else(|| "success marker missing".to_string());
            return Err(PrintError::Rejected(format!(
                "{} (status {})",
                reason,
                parsed.status.as_deref().unwrap_or("-")
            )));
        }

        info!("Print job accepted by device");
        Ok(())
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn is_online(&self) -> bool {
        probe(&self.host, self.port).await
    }
}
