use super::shutdown_signal;
use crate::RxArgs;
use crate::error::Result;

use logship_append_store_fs::FsAppendStore;
use logship_receiver::{Receiver, ReceiverConfig};
use tracing::info;

pub async fn rx(args: RxArgs, port: u16) -> Result<()> {
    let store = FsAppendStore::new(&args.storage_path);

    let receiver = Receiver::new(
        ReceiverConfig {
            bind_host: args.bind_host,
            port,
            backlog: args.socket_queue_length,
            host_in_filename: args.host_in_filename,
            ..ReceiverConfig::default()
        },
        store,
    );

    // Nothing to recover to if the listener cannot be bound
    let addr = receiver.start().await?;

    info!(
        "storing shipped logs under {} (listening on {})",
        args.storage_path.display(),
        addr
    );

    let signal = shutdown_signal().await;

    receiver.shutdown().await;

    signal
}
