//! Line-oriented ingestion loop.
//!
//! Requests arrive one JSON object per line. Sample requests feed the
//! acquisition core directly; control requests are answered in order on the
//! response channel. Spectrum snapshots share that channel but never block
//! ingestion: when the writer falls behind, snapshots are dropped.

use std::sync::atomic::{AtomicU64, Ordering};

use spectrascope_common::ipc::{decode_request, encode_response, CodecError, Request, Response};
use spectrascope_common::{AcquisitionStatus, TransformResult};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

use crate::acquisition::{SpectrumAcquisition, SpectrumCallback};
use crate::throttle::LogThrottle;

/// Forwards spectrum snapshots onto the response channel without waiting.
pub struct ChannelBroadcaster {
    tx: mpsc::Sender<Response>,
    dropped: AtomicU64,
    throttle: LogThrottle,
}

impl ChannelBroadcaster {
    pub fn new(tx: mpsc::Sender<Response>, log_every: u64) -> Self {
        Self {
            tx,
            dropped: AtomicU64::new(0),
            throttle: LogThrottle::new(log_every),
        }
    }

    /// Snapshots discarded because the writer was behind
    pub fn dropped_snapshots(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl SpectrumCallback for ChannelBroadcaster {
    fn on_spectrum(&self, result: TransformResult) {
        match self.tx.try_send(Response::Spectrum(result)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if self.throttle.should_log(dropped) {
                    warn!("[Ingest] Output behind, {} snapshots dropped", dropped);
                }
            }
            Err(TrySendError::Closed(_)) => {
                debug!("[Ingest] Output closed, snapshot discarded");
            }
        }
    }
}

/// Read requests from `reader` until end of input or a shutdown request.
///
/// Returns the final status of the acquisition core.
pub async fn run_ingest_loop<R>(
    mut reader: R,
    mut acquisition: SpectrumAcquisition,
    tx: mpsc::Sender<Response>,
) -> std::io::Result<AcquisitionStatus>
where
    R: AsyncBufRead + Unpin,
{
    info!("[Ingest] Starting ingestion loop");

    let mut line = String::new();
    let mut lines: u64 = 0;
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            info!("[Ingest] End of input after {} lines", lines);
            break;
        }
        lines += 1;

        let request = match decode_request(&line) {
            Ok(request) => request,
            Err(CodecError::EmptyLine) => continue,
            Err(e) => {
                warn!("[Ingest] Line {}: {}", lines, e);
                if tx.send(Response::error(e.to_string())).await.is_err() {
                    break;
                }
                continue;
            }
        };

        if !request.is_data() {
            debug!("[Ingest] Control request: {:?}", request);
        }
        let shutdown = matches!(request, Request::Shutdown);
        if let Some(response) = acquisition.handle_request(request) {
            if tx.send(response).await.is_err() {
                warn!("[Ingest] Output closed, stopping");
                break;
            }
        }
        if shutdown {
            info!("[Ingest] Shutdown requested");
            break;
        }
    }

    let status = acquisition.status();
    info!(
        "[Ingest] Stopped: {} cycles, {} samples dropped",
        status.cycles, status.dropped_samples
    );
    Ok(status)
}

/// Encode every response from `rx` onto `writer` until all senders are gone.
pub async fn run_writer<W>(mut rx: mpsc::Receiver<Response>, mut writer: W) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let encoded = match encode_response(&response) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!("[Ingest] Failed to encode response: {}", e);
                continue;
            }
        };
        writer.write_all(encoded.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}
