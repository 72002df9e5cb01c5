use super::shutdown_signal;
use crate::TxArgs;
use crate::error::{Error, Result};

use std::time::Duration;

use logship_transmitter::{Transmitter, TransmitterConfig};
use tracing::{error, info};

pub async fn tx(args: TxArgs, port: u16, timeout_secs: u64) -> Result<()> {
    let config = TransmitterConfig {
        rescan_interval: Duration::from_secs(args.rescan_interval),
        connect_timeout: Duration::from_secs(timeout_secs),
        ..TransmitterConfig::new(args.host, port, args.glob)
    };

    info!(
        "shipping files matching {} to {}:{}",
        config.pattern, config.host, config.port
    );

    let transmitter = Transmitter::new(config);
    let supervisor = transmitter.start()?;

    tokio::select! {
        result = shutdown_signal() => {
            transmitter.shutdown().await;
            result
        }
        _ = supervisor => {
            error!("transmitter supervisor exited");
            Err(Error::UnexpectedExit("transmitter supervisor"))
        }
    }
}
