use crate::error::{Error, Result};

use std::net::SocketAddr;

use bytes::BytesMut;
use logship_append_store::{AppendEntry, AppendStore, EntryKey};
use logship_protocol::{Header, LineReader, Offset};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedReadHalf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Owns one accepted connection for its whole session.
///
/// The session moves from awaiting the header, to streaming bytes into the
/// store entry the header names, to closed once the peer hangs up.
pub struct ReceiverWorker<S>
where
    S: AppendStore,
{
    stream: TcpStream,
    peer: SocketAddr,
    store: S,
    host_in_filename: bool,
    read_buffer_size: usize,
    shutdown_token: CancellationToken,
}

impl<S> ReceiverWorker<S>
where
    S: AppendStore,
{
    /// Creates a worker for a connection accepted from `peer`.
    pub const fn new(
        stream: TcpStream,
        peer: SocketAddr,
        store: S,
        host_in_filename: bool,
        read_buffer_size: usize,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            stream,
            peer,
            store,
            host_in_filename,
            read_buffer_size,
            shutdown_token,
        }
    }

    /// Runs the session to completion, returning the number of bytes appended.
    ///
    /// Returns `Ok` when the peer closes the connection (or closes it before
    /// sending a header) and when the receiver shuts down.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is malformed, the store entry cannot be
    /// opened or written, or the socket fails.
    pub async fn run(self) -> Result<u64> {
        let peer = self.peer;
        let shutdown_token = self.shutdown_token.clone();
        let read_buffer_size = self.read_buffer_size;

        let (read_half, mut write_half) = self.stream.into_split();
        let mut lines = LineReader::new(read_half);

        let line = tokio::select! {
            () = shutdown_token.cancelled() => return Ok(0),
            line = lines.read_line() => line?,
        };

        let Some(line) = line else {
            debug!("{} closed the connection before sending a header", peer);
            return Ok(0);
        };

        let header = Header::decode(&line)?;
        let mut key = EntryKey::new(header.into_filename());
        if self.host_in_filename {
            key = key.with_source(peer.ip().to_canonical());
        }

        let mut entry = self.store.open(&key).await.map_err(store_error)?;
        let offset = Offset::new(entry.len());

        write_half
            .write_all(&offset.encode())
            .await
            .map_err(|e| Error::Io("failed to send offset", e))?;

        info!("{} shipping {} from offset {}", peer, key, offset);

        let (read_half, early) = lines.into_parts();
        let appended = stream_into(
            read_half,
            early,
            &mut entry,
            read_buffer_size,
            &shutdown_token,
        )
        .await?;

        entry.close().await.map_err(store_error)?;

        info!(
            "{} closed {} after {} bytes, now at offset {}",
            peer,
            key,
            appended,
            offset.value() + appended
        );

        Ok(appended)
    }
}

/// Appends everything read from the socket to `entry`, in arrival order,
/// until the peer closes. `early` holds bytes that arrived with the header.
async fn stream_into<E>(
    mut read_half: OwnedReadHalf,
    early: BytesMut,
    entry: &mut E,
    read_buffer_size: usize,
    shutdown_token: &CancellationToken,
) -> Result<u64>
where
    E: AppendEntry,
{
    let mut appended = 0;

    if !early.is_empty() {
        entry.append(&early).await.map_err(store_error)?;
        appended += early.len() as u64;
    }

    let mut buf = vec![0; read_buffer_size];

    loop {
        let n = tokio::select! {
            () = shutdown_token.cancelled() => break,
            n = read_half.read(&mut buf) => n.map_err(|e| Error::Io("failed to read from peer", e))?,
        };

        if n == 0 {
            break;
        }

        entry.append(&buf[..n]).await.map_err(store_error)?;
        appended += n as u64;
    }

    Ok(appended)
}

fn store_error<E>(e: E) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    Error::Store(Box::new(e))
}
