//! Collector side of logship: accepts connections from transmitters and
//! appends the bytes they ship to per-source entries of an append store.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

mod error;
mod worker;

pub use error::{Error, Result};
pub use worker::ReceiverWorker;

use std::net::SocketAddr;
use std::time::Duration;

use logship_append_store::AppendStore;
use logship_protocol::DEFAULT_PORT;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpListener, lookup_host};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// Receiver configuration.
#[derive(Clone, Debug)]
pub struct ReceiverConfig {
    /// Host name or address to listen on.
    pub bind_host: String,

    /// Port to listen on. `0` picks an ephemeral port.
    pub port: u16,

    /// Length of the pending connection queue.
    pub backlog: u32,

    /// Whether stored file names are prefixed with the sending host's address.
    pub host_in_filename: bool,

    /// Size of each socket read while streaming.
    pub read_buffer_size: usize,

    /// Pause after a failed accept before trying again.
    pub accept_backoff: Duration,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            bind_host: "localhost".to_string(),
            port: DEFAULT_PORT,
            backlog: 5,
            host_in_filename: true,
            read_buffer_size: 4096,
            accept_backoff: Duration::from_millis(100),
        }
    }
}

/// Listens for transmitters and runs one isolated worker per connection.
pub struct Receiver<S>
where
    S: AppendStore,
{
    config: ReceiverConfig,
    store: S,
    shutdown_token: CancellationToken,
    task_tracker: TaskTracker,
}

impl<S> Receiver<S>
where
    S: AppendStore,
{
    /// Creates a new `Receiver` writing into `store`.
    pub fn new(config: ReceiverConfig, store: S) -> Self {
        Self {
            config,
            store,
            shutdown_token: CancellationToken::new(),
            task_tracker: TaskTracker::new(),
        }
    }

    /// Binds the listening socket and starts accepting connections.
    ///
    /// Returns the address actually bound.
    ///
    /// # Errors
    ///
    /// Returns an error if the receiver is already started or the listening
    /// socket cannot be resolved, bound or put into listening state.
    pub async fn start(&self) -> Result<SocketAddr> {
        if self.task_tracker.is_closed() {
            return Err(Error::AlreadyStarted);
        }

        let listener = bind(&self.config).await?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::Io("failed to read listener address", e))?;

        info!("receiver listening on {}", local_addr);

        let config = self.config.clone();
        let store = self.store.clone();
        let shutdown_token = self.shutdown_token.clone();
        let task_tracker = self.task_tracker.clone();

        self.task_tracker.spawn(accept_loop(
            listener,
            config,
            store,
            shutdown_token,
            task_tracker,
        ));

        self.task_tracker.close();

        Ok(local_addr)
    }

    /// Stops accepting, ends every open session and waits for all of them.
    pub async fn shutdown(&self) {
        info!("receiver shutting down...");

        self.shutdown_token.cancel();
        self.task_tracker.wait().await;

        info!("receiver shutdown complete.");
    }
}

async fn bind(config: &ReceiverConfig) -> Result<TcpListener> {
    let addr = lookup_host((config.bind_host.as_str(), config.port))
        .await
        .map_err(|e| Error::Io("failed to resolve bind host", e))?
        .next()
        .ok_or_else(|| Error::NoAddress(config.bind_host.clone()))?;

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(|e| Error::Io("failed to create socket", e))?;

    // Lets a restarted receiver rebind while old connections sit in TIME_WAIT
    socket
        .set_reuse_address(true)
        .map_err(|e| Error::Io("failed to set SO_REUSEADDR", e))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| Error::Io("failed to set non-blocking", e))?;
    socket
        .bind(&addr.into())
        .map_err(|e| Error::Io("failed to bind socket", e))?;
    socket
        .listen(i32::try_from(config.backlog).unwrap_or(i32::MAX))
        .map_err(|e| Error::Io("failed to listen on socket", e))?;

    TcpListener::from_std(socket.into()).map_err(|e| Error::Io("failed to register listener", e))
}

async fn accept_loop<S>(
    listener: TcpListener,
    config: ReceiverConfig,
    store: S,
    shutdown_token: CancellationToken,
    task_tracker: TaskTracker,
) where
    S: AppendStore,
{
    loop {
        tokio::select! {
            () = shutdown_token.cancelled() => {
                break;
            }
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer)) => {
                        info!("new connection from {}", peer);

                        let worker = ReceiverWorker::new(
                            stream,
                            peer,
                            store.clone(),
                            config.host_in_filename,
                            config.read_buffer_size,
                            shutdown_token.clone(),
                        );

                        task_tracker.spawn(async move {
                            if let Err(e) = worker.run().await {
                                warn!("connection from {} failed: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("failed to accept connection: {}", e);
                        tokio::time::sleep(config.accept_backoff).await;
                    }
                }
            }
        }
    }

    info!("receiver stopped accepting connections");
}

#[cfg(test)]
mod tests {
    use super::*;

    use bytes::Bytes;
    use logship_append_store::EntryKey;
    use logship_append_store_fs::FsAppendStore;
    use logship_append_store_memory::MemoryAppendStore;
    use logship_protocol::{LineReader, Offset};
    use tempfile::tempdir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn test_config(host_in_filename: bool) -> ReceiverConfig {
        ReceiverConfig {
            bind_host: "127.0.0.1".to_string(),
            port: 0,
            host_in_filename,
            ..ReceiverConfig::default()
        }
    }

    async fn start_receiver<S: AppendStore>(
        store: S,
        host_in_filename: bool,
    ) -> (Receiver<S>, SocketAddr) {
        let receiver = Receiver::new(test_config(host_in_filename), store);
        let addr = receiver.start().await.unwrap();
        (receiver, addr)
    }

    async fn read_offset(stream: &mut TcpStream) -> Offset {
        let mut lines = LineReader::new(stream);
        let line = timeout(WAIT, lines.read_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        Offset::decode(&line).unwrap()
    }

    async fn handshake(addr: SocketAddr, filename: &str) -> (TcpStream, Offset) {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(format!("{filename}\n").as_bytes())
            .await
            .unwrap();
        let offset = read_offset(&mut stream).await;
        (stream, offset)
    }

    async fn wait_for_contents(store: &MemoryAppendStore, key: &EntryKey, expected: &[u8]) {
        let result = timeout(WAIT, async {
            loop {
                if store.contents(key).await.as_deref() == Some(expected) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;

        assert!(
            result.is_ok(),
            "expected {:?}, found {:?}",
            Bytes::copy_from_slice(expected),
            store.contents(key).await
        );
    }

    #[tokio::test]
    async fn test_handshake_then_resume() {
        init_tracing();

        let store = MemoryAppendStore::new();
        let (receiver, addr) = start_receiver(store.clone(), false).await;
        let key = EntryKey::new("access.log");

        let (mut stream, offset) = handshake(addr, "access.log").await;
        assert_eq!(offset, Offset::new(0));
        stream.write_all(b"hello ").await.unwrap();
        drop(stream);
        wait_for_contents(&store, &key, b"hello ").await;

        let (mut stream, offset) = handshake(addr, "access.log").await;
        assert_eq!(offset, Offset::new(6));
        stream.write_all(b"world").await.unwrap();
        drop(stream);
        wait_for_contents(&store, &key, b"hello world").await;

        receiver.shutdown().await;
    }

    #[tokio::test]
    async fn test_header_split_across_writes() {
        init_tracing();

        let store = MemoryAppendStore::new();
        let (receiver, addr) = start_receiver(store.clone(), false).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.set_nodelay(true).unwrap();
        stream.write_all(b"acc").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        stream.write_all(b"ess.log\nhello").await.unwrap();

        assert_eq!(read_offset(&mut stream).await, Offset::new(0));
        stream.write_all(b" world").await.unwrap();
        drop(stream);

        wait_for_contents(&store, &EntryKey::new("access.log"), b"hello world").await;

        receiver.shutdown().await;
    }

    #[tokio::test]
    async fn test_host_in_filename() {
        init_tracing();

        let store = MemoryAppendStore::new();
        let (receiver, addr) = start_receiver(store.clone(), true).await;

        let (mut stream, offset) = handshake(addr, "sys.log").await;
        assert_eq!(offset, Offset::new(0));
        stream.write_all(b"boot\n").await.unwrap();
        drop(stream);

        let key = EntryKey::new("sys.log").with_source(addr.ip());
        wait_for_contents(&store, &key, b"boot\n").await;
        assert_eq!(store.keys().await, vec!["127.0.0.1_sys.log".to_string()]);

        receiver.shutdown().await;
    }

    #[tokio::test]
    async fn test_bad_header_is_isolated() {
        init_tracing();

        let store = MemoryAppendStore::new();
        let (receiver, addr) = start_receiver(store.clone(), false).await;

        let (mut healthy, _) = handshake(addr, "app.log").await;
        healthy.write_all(b"before ").await.unwrap();

        let mut broken = TcpStream::connect(addr).await.unwrap();
        broken.write_all(b"\xff\xfe\n").await.unwrap();
        let mut buf = [0; 16];
        let n = timeout(WAIT, broken.read(&mut buf)).await.unwrap().unwrap_or(0);
        assert_eq!(n, 0, "receiver should drop a connection with a bad header");

        healthy.write_all(b"after").await.unwrap();
        drop(healthy);
        wait_for_contents(&store, &EntryKey::new("app.log"), b"before after").await;

        let (_, offset) = handshake(addr, "app.log").await;
        assert_eq!(offset, Offset::new(12));

        receiver.shutdown().await;
    }

    #[tokio::test]
    async fn test_close_before_header() {
        init_tracing();

        let store = MemoryAppendStore::new();
        let (receiver, addr) = start_receiver(store.clone(), false).await;

        drop(TcpStream::connect(addr).await.unwrap());

        let (stream, offset) = handshake(addr, "access.log").await;
        assert_eq!(offset, Offset::new(0));
        drop(stream);

        assert_eq!(store.keys().await, vec!["access.log".to_string()]);

        receiver.shutdown().await;
    }

    #[tokio::test]
    async fn test_offset_matches_existing_file() {
        init_tracing();

        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("access.log"), b"0123456789").unwrap();

        let store = FsAppendStore::new(dir.path());
        let (receiver, addr) = start_receiver(store.clone(), false).await;

        let (mut stream, offset) = handshake(addr, "access.log").await;
        assert_eq!(offset, Offset::new(10));
        stream.write_all(b"abc").await.unwrap();
        drop(stream);

        let key = EntryKey::new("access.log");
        let grown = timeout(WAIT, async {
            while store.len(&key).await.unwrap() != Some(13) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(grown.is_ok());

        let contents = std::fs::read(dir.path().join("access.log")).unwrap();
        assert_eq!(contents, b"0123456789abc");

        receiver.shutdown().await;
    }

    #[tokio::test]
    async fn test_already_started() {
        let (receiver, _) = start_receiver(MemoryAppendStore::new(), false).await;

        assert!(matches!(
            receiver.start().await,
            Err(Error::AlreadyStarted)
        ));

        receiver.shutdown().await;
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let config = ReceiverConfig {
            port: occupied.local_addr().unwrap().port(),
            ..test_config(false)
        };

        let receiver = Receiver::new(config, MemoryAppendStore::new());

        assert!(matches!(receiver.start().await, Err(Error::Io(_, _))));
    }

    #[tokio::test]
    async fn test_shutdown_ends_open_sessions() {
        init_tracing();

        let (receiver, addr) = start_receiver(MemoryAppendStore::new(), false).await;
        let (_stream, _) = handshake(addr, "access.log").await;

        timeout(WAIT, receiver.shutdown()).await.unwrap();

        assert!(TcpStream::connect(addr).await.is_err());
    }
}
