use crate::TransmitterConfig;
use crate::error::{Error, Result};

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use logship_protocol::{Header, LineReader, Offset};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Ships one local file to a receiver, resuming where the receiver's copy ends.
///
/// After the handshake the worker tails the file forever: new bytes are sent
/// as soon as a read finds them, and reaching the end of the file waits one
/// poll interval before reading again. Rotation and truncation of the source
/// file are not detected.
#[derive(Debug)]
pub struct TransmitterWorker {
    host: String,
    port: u16,
    path: PathBuf,
    connect_timeout: Duration,
    chunk_size: usize,
    poll_interval: Duration,
    shutdown_token: CancellationToken,
}

impl TransmitterWorker {
    /// Creates a worker shipping `path` to the receiver named in `config`.
    #[must_use]
    pub fn new(config: &TransmitterConfig, path: PathBuf, shutdown_token: CancellationToken) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            path,
            connect_timeout: config.connect_timeout,
            chunk_size: config.chunk_size.max(1),
            poll_interval: config.poll_interval,
            shutdown_token,
        }
    }

    /// The file this worker ships.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Connects, performs the handshake and tails the file until cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established in time, the
    /// offset reply is malformed, the file cannot be read or the connection
    /// fails while streaming.
    pub async fn run(self) -> Result<()> {
        let shutdown_token = self.shutdown_token.clone();

        tokio::select! {
            () = shutdown_token.cancelled() => {
                debug!("stopped shipping {}", self.path.display());
                Ok(())
            }
            result = self.ship() => result,
        }
    }

    async fn ship(&self) -> Result<()> {
        let header = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::InvalidFileName(self.path.clone()))
            .and_then(|name| Header::new(name).map_err(Error::from))?;

        let mut stream = self.connect().await?;

        stream
            .write_all(&header.encode())
            .await
            .map_err(|e| Error::Io("failed to send header", e))?;

        let offset = read_offset(&mut stream).await?;

        let mut file = File::open(&self.path)
            .await
            .map_err(|e| Error::Io("failed to open file", e))?;

        let len = file
            .metadata()
            .await
            .map_err(|e| Error::Io("failed to read file metadata", e))?
            .len();

        if len < offset.value() {
            warn!(
                "{} is {} bytes but receiver already holds {}; waiting for it to grow",
                self.path.display(),
                len,
                offset
            );
        }

        file.seek(SeekFrom::Start(offset.value()))
            .await
            .map_err(|e| Error::Io("failed to seek file", e))?;

        info!(
            "shipping {} to {}:{} from offset {}",
            self.path.display(),
            self.host,
            self.port,
            offset
        );

        self.tail(file, stream).await
    }

    async fn connect(&self) -> Result<TcpStream> {
        match timeout(
            self.connect_timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(Error::Io("failed to connect to receiver", e)),
            Err(_) => Err(Error::ConnectTimeout(self.connect_timeout)),
        }
    }

    async fn tail(&self, mut file: File, mut stream: TcpStream) -> Result<()> {
        let mut buf = vec![0; self.chunk_size];

        loop {
            let n = file
                .read(&mut buf)
                .await
                .map_err(|e| Error::Io("failed to read file", e))?;

            if n == 0 {
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }

            stream
                .write_all(&buf[..n])
                .await
                .map_err(|e| Error::Io("failed to send file data", e))?;

            debug!("sent {} bytes of {}", n, self.path.display());
        }
    }
}

async fn read_offset(stream: &mut TcpStream) -> Result<Offset> {
    let mut lines = LineReader::new(stream);

    let line = lines
        .read_line()
        .await?
        .ok_or(Error::ClosedDuringHandshake)?;

    Ok(Offset::decode(&line)?)
}
