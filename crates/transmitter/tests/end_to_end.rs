//! Ships real files through a real receiver into a filesystem append store.

use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use logship_append_store_fs::FsAppendStore;
use logship_receiver::{Receiver, ReceiverConfig};
use logship_transmitter::{Transmitter, TransmitterConfig};
use tempfile::tempdir;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(10);

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

async fn start_receiver(storage: &Path, host_in_filename: bool) -> (Receiver<FsAppendStore>, SocketAddr) {
    let config = ReceiverConfig {
        bind_host: "127.0.0.1".to_string(),
        port: 0,
        host_in_filename,
        ..ReceiverConfig::default()
    };
    let receiver = Receiver::new(config, FsAppendStore::new(storage));
    let addr = receiver.start().await.unwrap();
    (receiver, addr)
}

fn start_transmitter(addr: SocketAddr, watch: &Path) -> Transmitter {
    let pattern = watch.join("*.log").to_string_lossy().into_owned();
    let config = TransmitterConfig {
        rescan_interval: Duration::from_millis(50),
        poll_interval: Duration::from_millis(20),
        connect_timeout: Duration::from_secs(2),
        ..TransmitterConfig::new(addr.ip().to_string(), addr.port(), pattern)
    };
    let transmitter = Transmitter::new(config);
    transmitter.start().unwrap();
    transmitter
}

fn append(path: &Path, bytes: &[u8]) {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    file.write_all(bytes).unwrap();
}

async fn wait_for_file(path: &Path, expected: &[u8]) {
    let result = timeout(WAIT, async {
        loop {
            if std::fs::read(path).ok().as_deref() == Some(expected) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;

    assert!(
        result.is_ok(),
        "{} never reached {:?}, found {:?}",
        path.display(),
        String::from_utf8_lossy(expected),
        std::fs::read(path).ok().map(|b| String::from_utf8_lossy(&b).into_owned())
    );
}

#[tokio::test]
async fn test_ships_and_tails_multiple_files() {
    init_tracing();

    let storage = tempdir().unwrap();
    let watch = tempdir().unwrap();

    append(&watch.path().join("access.log"), b"GET /\n");
    append(&watch.path().join("error.log"), b"oops\n");
    append(&watch.path().join("ignored.txt"), b"not shipped\n");

    let (receiver, addr) = start_receiver(storage.path(), false).await;
    let transmitter = start_transmitter(addr, watch.path());

    wait_for_file(&storage.path().join("access.log"), b"GET /\n").await;
    wait_for_file(&storage.path().join("error.log"), b"oops\n").await;

    append(&watch.path().join("access.log"), b"GET /favicon.ico\n");
    wait_for_file(&storage.path().join("access.log"), b"GET /\nGET /favicon.ico\n").await;

    // Files created after startup are picked up by a later rescan
    append(&watch.path().join("late.log"), b"hello\n");
    wait_for_file(&storage.path().join("late.log"), b"hello\n").await;

    assert!(!storage.path().join("ignored.txt").exists());

    transmitter.shutdown().await;
    receiver.shutdown().await;
}

#[tokio::test]
async fn test_restart_resumes_without_duplicates() {
    init_tracing();

    let storage = tempdir().unwrap();
    let watch = tempdir().unwrap();
    let source = watch.path().join("app.log");
    let stored = storage.path().join("app.log");

    append(&source, b"one\n");

    let (receiver, addr) = start_receiver(storage.path(), false).await;

    let transmitter = start_transmitter(addr, watch.path());
    wait_for_file(&stored, b"one\n").await;
    transmitter.shutdown().await;

    // Written while nothing is shipping
    append(&source, b"two\n");

    let transmitter = start_transmitter(addr, watch.path());
    wait_for_file(&stored, b"one\ntwo\n").await;

    append(&source, b"three\n");
    wait_for_file(&stored, b"one\ntwo\nthree\n").await;

    transmitter.shutdown().await;
    receiver.shutdown().await;
}

#[tokio::test]
async fn test_receiver_restart_is_survived() {
    init_tracing();

    let storage = tempdir().unwrap();
    let watch = tempdir().unwrap();
    let source = watch.path().join("app.log");
    let stored = storage.path().join("app.log");

    append(&source, b"before\n");

    let (receiver, addr) = start_receiver(storage.path(), false).await;
    let transmitter = start_transmitter(addr, watch.path());
    wait_for_file(&stored, b"before\n").await;

    receiver.shutdown().await;

    // Same port again, as a restarted collector would
    let config = ReceiverConfig {
        bind_host: "127.0.0.1".to_string(),
        port: addr.port(),
        host_in_filename: false,
        ..ReceiverConfig::default()
    };
    let receiver = Receiver::new(config, FsAppendStore::new(storage.path()));
    receiver.start().await.unwrap();

    // The old worker only notices the dead connection when it next writes,
    // after which the supervisor starts a fresh one that resumes at the
    // receiver's offset. Whatever the old worker wrote into the void is
    // resent, never duplicated.
    append(&source, b"after\n");
    tokio::time::sleep(Duration::from_millis(200)).await;
    append(&source, b"again\n");

    wait_for_file(&stored, b"before\nafter\nagain\n").await;

    transmitter.shutdown().await;
    receiver.shutdown().await;
}

#[tokio::test]
async fn test_host_in_filename_end_to_end() {
    init_tracing();

    let storage = tempdir().unwrap();
    let watch = tempdir().unwrap();

    append(&watch.path().join("sys.log"), b"kernel: ready\n");

    let (receiver, addr) = start_receiver(storage.path(), true).await;
    let transmitter = start_transmitter(addr, watch.path());

    wait_for_file(&storage.path().join("127.0.0.1_sys.log"), b"kernel: ready\n").await;

    transmitter.shutdown().await;
    receiver.shutdown().await;
}
