//! Printer dispatcher
//!
//! Delivers one rendered payload to one resolved printer and classifies the
//! outcome. Retries are the coordinator's decision, never made here.

use std::time::Duration;

use pos_printer::{
    EposPrinter, HttpClient, NetworkPrinter, PrintError, PrintResult, Printer, Scheme, TlsPolicy,
    epos_client,
};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::renderer::TicketRenderer;
use crate::report::{FailureKind, PrintOutcome};
use crate::types::{PrinterTarget, Protocol, TicketPayload};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Printer unreachable: {0}")]
    Unreachable(String),

    #[error("Printer rejected job: {0}")]
    DeviceRejected(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

pub type DispatchResult<T> = Result<T, DispatchError>;

impl DispatchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            DispatchError::Unreachable(_) => FailureKind::Unreachable,
            DispatchError::DeviceRejected(_) => FailureKind::DeviceRejected,
            DispatchError::Transport(_) => FailureKind::TransportError,
        }
    }

    /// Worth another attempt (the device may come back)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DispatchError::Unreachable(_) | DispatchError::Transport(_)
        )
    }
}

impl From<PrintError> for DispatchError {
    fn from(err: PrintError) -> Self {
        match err {
            PrintError::Connection(_) | PrintError::Timeout(_) => {
                DispatchError::Unreachable(err.to_string())
            }
            PrintError::Rejected(_) => DispatchError::DeviceRejected(err.to_string()),
            PrintError::Io(_) | PrintError::InvalidConfig(_) | PrintError::Http(_) => {
                DispatchError::Transport(err.to_string())
            }
        }
    }
}

impl From<DispatchError> for PrintOutcome {
    fn from(err: DispatchError) -> Self {
        PrintOutcome::error(err.kind(), err.to_string())
    }
}

/// Transport timing and endpoint settings
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub connect_timeout: Duration,
    /// Deadline for writing a raw job
    pub write_timeout: Duration,
    /// Idle period after a raw write before closing
    pub linger: Duration,
    /// Overall deadline for an ePOS request
    pub epos_timeout: Duration,
    pub epos_scheme: Scheme,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            linger: Duration::from_secs(1),
            epos_timeout: Duration::from_secs(10),
            epos_scheme: Scheme::Https,
        }
    }
}

/// Sends payloads to printers
///
/// Holds one HTTP client per TLS policy so connection pools are shared
/// between tickets while certificate relaxation stays scoped to the targets
/// that ask for it.
pub struct PrinterDispatcher {
    config: DispatchConfig,
    verifying_client: HttpClient,
    relaxed_client: HttpClient,
}

impl PrinterDispatcher {
    pub fn new(config: DispatchConfig) -> PrintResult<Self> {
        let verifying_client =
            epos_client(TlsPolicy::Verify, config.connect_timeout, config.epos_timeout)?;
        let relaxed_client = epos_client(
            TlsPolicy::AcceptInvalidCerts,
            config.connect_timeout,
            config.epos_timeout,
        )?;

        Ok(Self {
            config,
            verifying_client,
            relaxed_client,
        })
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Deliver `payload` to `target`
    #[instrument(skip(self, payload), fields(target = %target, protocol = %target.protocol, bytes = payload.len()))]
    pub async fn dispatch(&self, target: &PrinterTarget, payload: &TicketPayload) -> DispatchResult<()> {
        if payload.protocol() != target.protocol {
            return Err(DispatchError::Transport(format!(
                "{} payload cannot be sent to {} printer {}",
                payload.protocol(),
                target.protocol,
                target
            )));
        }

        let result = match target.protocol {
            Protocol::RawEscpos => self.send_raw(target, payload.as_bytes()).await,
            Protocol::EposSoap => self.send_epos(target, payload.as_bytes()).await,
        };

        match &result {
            Ok(()) => info!("Ticket delivered"),
            Err(e) => warn!(error = %e, kind = %e.kind(), "Ticket delivery failed"),
        }
        result
    }

    /// Print the fixed test page on `target`
    pub async fn test_print(
        &self,
        renderer: &TicketRenderer,
        target: &PrinterTarget,
    ) -> DispatchResult<()> {
        let payload = renderer.render_test_page(target.protocol);
        self.dispatch(target, &payload).await
    }

    /// Short TCP probe of the target's port
    pub async fn is_online(&self, target: &PrinterTarget) -> bool {
        match target.protocol {
            Protocol::RawEscpos => match self.network_printer(target) {
                Ok(p) => p.is_online().await,
                Err(_) => false,
            },
            Protocol::EposSoap => match self.epos_printer(target) {
                Ok(p) => p.is_online().await,
                Err(_) => false,
            },
        }
    }

    fn network_printer(&self, target: &PrinterTarget) -> PrintResult<NetworkPrinter> {
        Ok(NetworkPrinter::new(&target.address, target.port)?
            .with_timeout(self.config.connect_timeout)
            .with_write_timeout(self.config.write_timeout)
            .with_linger(self.config.linger))
    }

    fn epos_printer(&self, target: &PrinterTarget) -> PrintResult<EposPrinter> {
        let client = match target.tls {
            TlsPolicy::Verify => self.verifying_client.clone(),
            TlsPolicy::AcceptInvalidCerts => self.relaxed_client.clone(),
        };
        EposPrinter::new(client, &target.address, target.port, self.config.epos_scheme)
    }

    /// Send to network printer (TCP 9100)
    async fn send_raw(&self, target: &PrinterTarget, data: &[u8]) -> DispatchResult<()> {
        let printer = self.network_printer(target)?;
        printer.print(data).await?;
        Ok(())
    }

    /// Send to ePOS printer (HTTPS 8043)
    async fn send_epos(&self, target: &PrinterTarget, data: &[u8]) -> DispatchResult<()> {
        let printer = self.epos_printer(target)?;
        printer.print(data).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn fast_config() -> DispatchConfig {
        DispatchConfig {
            connect_timeout: Duration::from_millis(300),
            write_timeout: Duration::from_millis(300),
            linger: Duration::from_millis(10),
            epos_timeout: Duration::from_millis(500),
            epos_scheme: Scheme::Http,
        }
    }

    #[test]
    fn test_classification() {
        let unreachable: DispatchError = PrintError::Connection("refused".into()).into();
        assert_eq!(unreachable.kind(), FailureKind::Unreachable);

        let timeout: DispatchError = PrintError::Timeout("connect".into()).into();
        assert_eq!(timeout.kind(), FailureKind::Unreachable);

        let rejected: DispatchError = PrintError::Rejected("HTTP 500".into()).into();
        assert_eq!(rejected.kind(), FailureKind::DeviceRejected);
        assert!(!rejected.is_retryable());

        let io: DispatchError =
            PrintError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe")).into();
        assert_eq!(io.kind(), FailureKind::TransportError);
        assert!(io.is_retryable());
    }

    #[tokio::test]
    async fn test_protocol_mismatch_is_transport_error() {
        let dispatcher = PrinterDispatcher::new(fast_config()).unwrap();
        let target = PrinterTarget::new("food", "127.0.0.1", 9100, Protocol::RawEscpos);
        let payload = TicketPayload::SoapXml("<x/>".to_string());

        let err = dispatcher.dispatch(&target, &payload).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::TransportError);
    }

    #[tokio::test]
    async fn test_refused_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let dispatcher = PrinterDispatcher::new(fast_config()).unwrap();
        for protocol in [Protocol::RawEscpos, Protocol::EposSoap] {
            let target = PrinterTarget::new("food", "127.0.0.1", port, protocol);
            let payload = TicketRenderer::default().render_test_page(protocol);
            let err = dispatcher.dispatch(&target, &payload).await.unwrap_err();
            assert_eq!(err.kind(), FailureKind::Unreachable, "{:?}: {}", protocol, err);
            assert!(!dispatcher.is_online(&target).await);
        }
    }

    #[tokio::test]
    async fn test_print_raw() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            use tokio::io::AsyncReadExt;
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            socket.read_to_end(&mut buf).await.unwrap();
            buf
        });

        let dispatcher = PrinterDispatcher::new(fast_config()).unwrap();
        let target = PrinterTarget::new("food", "127.0.0.1", port, Protocol::RawEscpos);
        dispatcher
            .test_print(&TicketRenderer::default(), &target)
            .await
            .unwrap();

        let received = server.await.unwrap();
        assert!(String::from_utf8_lossy(&received).contains("TEST PRINT"));
    }
}
