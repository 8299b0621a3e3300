//! Raw ESC/POS printer emulator
//!
//! Listens like a port-9100 printer, keeps every received job in memory and
//! optionally appends a readable dump of it to a log file. Used by the
//! `printer-sim` binary and by tests that need a working printer.

use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Connections idle longer than this are dropped
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// One print job as received on the wire
#[derive(Debug, Clone)]
pub struct ReceivedJob {
    pub peer: SocketAddr,
    pub received_at: DateTime<Utc>,
    pub data: Vec<u8>,
}

impl ReceivedJob {
    /// Job bytes with control bytes shown as `<1B>` and text kept as-is
    pub fn printable(&self) -> String {
        let mut out = String::with_capacity(self.data.len());
        for &b in &self.data {
            match b {
                b'\n' => out.push('\n'),
                0x20..=0x7E => out.push(b as char),
                _ => out.push_str(&format!("<{:02X}>", b)),
            }
        }
        out
    }

    /// Whether the job contains `needle` as raw bytes
    pub fn contains(&self, needle: &[u8]) -> bool {
        !needle.is_empty() && self.data.windows(needle.len()).any(|w| w == needle)
    }
}

#[derive(Default)]
struct Shared {
    jobs: Mutex<Vec<ReceivedJob>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

/// In-process TCP printer
pub struct PrinterEmulator {
    addr: SocketAddr,
    shared: Arc<Shared>,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl PrinterEmulator {
    /// Start listening on `addr` (use port 0 for an ephemeral port)
    pub async fn bind(addr: &str) -> io::Result<Self> {
        Self::start(addr, None).await
    }

    /// Start listening and append every job to `log_path`
    pub async fn bind_with_log(addr: &str, log_path: impl Into<PathBuf>) -> io::Result<Self> {
        Self::start(addr, Some(log_path.into())).await
    }

    async fn start(addr: &str, log_path: Option<PathBuf>) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let shared = Arc::new(Shared::default());
        let shutdown = CancellationToken::new();

        info!(%addr, "Printer emulator listening");

        let handle = tokio::spawn(accept_loop(
            listener,
            shared.clone(),
            shutdown.clone(),
            log_path.map(Arc::new),
        ));

        Ok(Self {
            addr,
            shared,
            shutdown,
            handle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Snapshot of the jobs received so far
    pub fn jobs(&self) -> Vec<ReceivedJob> {
        self.shared.jobs.lock().clone()
    }

    pub fn job_count(&self) -> usize {
        self.shared.jobs.lock().len()
    }

    /// Highest number of simultaneously open connections seen
    pub fn peak_connections(&self) -> usize {
        self.shared.peak.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` jobs arrived, or `timeout` passes
    pub async fn wait_for_jobs(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.job_count() >= count {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Stop accepting connections
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        let _ = (&mut self.handle).await;
    }
}

impl Drop for PrinterEmulator {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn accept_loop(
    listener: TcpListener,
    shared: Arc<Shared>,
    shutdown: CancellationToken,
    log_path: Option<Arc<PathBuf>>,
) {
    loop {
        let (socket, peer) = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    continue;
                }
            },
        };

        let shared = shared.clone();
        let log_path = log_path.clone();
        tokio::spawn(async move {
            let now = shared.active.fetch_add(1, Ordering::SeqCst) + 1;
            shared.peak.fetch_max(now, Ordering::SeqCst);

            match read_job(socket).await {
                Ok(data) if !data.is_empty() => {
                    let job = ReceivedJob {
                        peer,
                        received_at: Utc::now(),
                        data,
                    };
                    info!(%peer, bytes = job.data.len(), "Job received\n{}", job.printable());
                    if let Some(path) = log_path.as_deref()
                        && let Err(e) = append_log(path, &job).await
                    {
                        error!(error = %e, path = %path.display(), "Failed to write printer log");
                    }
                    shared.jobs.lock().push(job);
                }
                Ok(_) => info!(%peer, "Connection closed without data"),
                Err(e) => warn!(%peer, error = %e, "Socket error"),
            }

            shared.active.fetch_sub(1, Ordering::SeqCst);
        });
    }
}

async fn read_job(mut socket: TcpStream) -> io::Result<Vec<u8>> {
    let mut data = Vec::new();
    match tokio::time::timeout(READ_TIMEOUT, socket.read_to_end(&mut data)).await {
        Ok(result) => result.map(|_| data),
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "read timeout")),
    }
}

async fn append_log(path: &Path, job: &ReceivedJob) -> io::Result<()> {
    let entry = format!(
        "--- {} from {} ---\n{}\n\n",
        job.received_at.to_rfc3339(),
        job.peer,
        job.printable()
    );
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(entry.as_bytes()).await?;
    file.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pos_printer::{NetworkPrinter, Printer};

    #[tokio::test]
    async fn test_emulator_records_jobs() {
        let emulator = PrinterEmulator::bind("127.0.0.1:0").await.unwrap();
        let printer = NetworkPrinter::new("127.0.0.1", emulator.port())
            .unwrap()
            .with_linger(Duration::from_millis(10));

        printer.print(&[0x1B, 0x40, b'h', b'i', b'\n']).await.unwrap();
        assert!(emulator.wait_for_jobs(1, Duration::from_secs(2)).await);

        let jobs = emulator.jobs();
        assert_eq!(jobs[0].printable(), "<1B>@hi\n");
        assert!(jobs[0].contains(b"hi"));
        assert_eq!(emulator.peak_connections(), 1);
        emulator.shutdown().await;
    }

    #[tokio::test]
    async fn test_emulator_appends_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("printer.log");
        let emulator = PrinterEmulator::bind_with_log("127.0.0.1:0", &path).await.unwrap();
        let printer = NetworkPrinter::new("127.0.0.1", emulator.port())
            .unwrap()
            .with_linger(Duration::from_millis(10));

        printer.print(b"TEST PRINT\n").await.unwrap();
        printer.print(b"SECOND\n").await.unwrap();
        assert!(emulator.wait_for_jobs(2, Duration::from_secs(2)).await);
        // Log write happens before the job is published
        let log = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(log.contains("TEST PRINT"));
        assert!(log.contains("SECOND"));
        assert_eq!(log.matches("--- ").count(), 2);
    }
}
