//! Acquisition engine
//!
//! Drives the request/response cycle against a live transport and
//! publishes one [`Snapshot`] per valid frame. Failed cycles are logged,
//! counted and dropped; the next cycle resynchronizes on its own.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::cycle::CycleState;
use super::{
    ByteStream, CycleFault, FrameError, ProtocolError, DEFAULT_CYCLE_PAUSE_MS,
    DEFAULT_READ_DEADLINE_MS,
};
use crate::definition::DecoderSchema;
use crate::realtime::Snapshot;

/// Engine timing. The defaults suit the 8192 baud ALDL bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Deadline for the read phase of one cycle, in milliseconds
    pub read_deadline_ms: u64,
    /// Pause between cycles, in milliseconds
    pub cycle_pause_ms: u64,
    /// Bytes requested from the transport per read call
    pub read_chunk_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            read_deadline_ms: DEFAULT_READ_DEADLINE_MS,
            cycle_pause_ms: DEFAULT_CYCLE_PAUSE_MS,
            read_chunk_size: 64,
        }
    }
}

impl EngineConfig {
    /// Read phase deadline
    pub fn read_deadline(&self) -> Duration {
        Duration::from_millis(self.read_deadline_ms)
    }

    /// Pause between cycles
    pub fn cycle_pause(&self) -> Duration {
        Duration::from_millis(self.cycle_pause_ms)
    }
}

/// Per-session cycle statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleStats {
    /// Frames that passed validation
    pub frames: u64,
    /// Cycles lost to write or read failures
    pub transport_errors: u64,
    /// Cycles where the header byte never arrived
    pub sync_misses: u64,
    /// Cycles with too few bytes after the header
    pub short_frames: u64,
    /// Cycles with a bad checksum
    pub checksum_errors: u64,
}

impl CycleStats {
    /// Cycles that produced no snapshot
    pub fn dropped(&self) -> u64 {
        self.transport_errors + self.sync_misses + self.short_frames + self.checksum_errors
    }
}

#[derive(Debug, Default)]
struct Counters {
    frames: AtomicU64,
    transport_errors: AtomicU64,
    sync_misses: AtomicU64,
    short_frames: AtomicU64,
    checksum_errors: AtomicU64,
}

/// Shared, monotonically increasing count of validated frames.
///
/// Cheap to clone; readable from any task while the engine runs.
#[derive(Debug, Clone, Default)]
pub struct FrameCounter {
    inner: Arc<Counters>,
}

impl FrameCounter {
    /// Number of frames validated so far
    pub fn frames(&self) -> u64 {
        self.inner.frames.load(Ordering::Relaxed)
    }

    /// Current statistics
    pub fn stats(&self) -> CycleStats {
        CycleStats {
            frames: self.inner.frames.load(Ordering::Relaxed),
            transport_errors: self.inner.transport_errors.load(Ordering::Relaxed),
            sync_misses: self.inner.sync_misses.load(Ordering::Relaxed),
            short_frames: self.inner.short_frames.load(Ordering::Relaxed),
            checksum_errors: self.inner.checksum_errors.load(Ordering::Relaxed),
        }
    }

    fn record_frame(&self) {
        self.inner.frames.fetch_add(1, Ordering::Relaxed);
    }

    fn record_fault(&self, fault: &CycleFault) {
        let counter = match fault {
            CycleFault::Transport(_) => &self.inner.transport_errors,
            CycleFault::Frame(FrameError::NoSync { .. }) => &self.inner.sync_misses,
            CycleFault::Frame(FrameError::ShortFrame { .. }) => &self.inner.short_frames,
            CycleFault::Frame(FrameError::ChecksumMismatch { .. }) => &self.inner.checksum_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Streaming acquisition over one exclusively owned transport
pub struct AcquisitionEngine<T> {
    transport: T,
    schema: Arc<DecoderSchema>,
    config: EngineConfig,
    latest: watch::Sender<Option<Arc<Snapshot>>>,
    sink: Option<mpsc::Sender<Arc<Snapshot>>>,
    counter: FrameCounter,
}

impl<T: ByteStream> AcquisitionEngine<T> {
    /// Create an engine with default timing
    pub fn new(transport: T, schema: Arc<DecoderSchema>) -> Self {
        Self::with_config(transport, schema, EngineConfig::default())
    }

    /// Create an engine with explicit timing
    pub fn with_config(transport: T, schema: Arc<DecoderSchema>, config: EngineConfig) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            transport,
            schema,
            config,
            latest,
            sink: None,
            counter: FrameCounter::default(),
        }
    }

    /// Also deliver every snapshot to `sink`. Delivery never blocks the
    /// loop: when the sink is full the snapshot is skipped for it.
    pub fn with_sink(mut self, sink: mpsc::Sender<Arc<Snapshot>>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Receiver for the most recent snapshot
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.latest.subscribe()
    }

    /// Handle to the validated-frame counter
    pub fn frame_counter(&self) -> FrameCounter {
        self.counter.clone()
    }

    /// Schema the engine decodes with
    pub fn schema(&self) -> &Arc<DecoderSchema> {
        &self.schema
    }

    /// Engine timing
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Give the transport back
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Run a single cycle without the inter-cycle pause.
    ///
    /// On success the snapshot has already been published.
    pub async fn run_cycle(&mut self) -> Result<Arc<Snapshot>, CycleFault> {
        let mut state = CycleState::Requesting;
        let mut captured_at = Utc::now();

        loop {
            trace!("cycle state: {}", state.name());
            state = match state {
                CycleState::Idle | CycleState::Requesting => match self.send_request().await {
                    Ok(()) => CycleState::AwaitingResponse,
                    Err(e) => CycleState::Abort(e.into()),
                },
                CycleState::AwaitingResponse => match self.read_response().await {
                    Ok(buffer) => {
                        captured_at = Utc::now();
                        CycleState::Reassembling { buffer }
                    }
                    Err(e) => CycleState::Abort(e.into()),
                },
                CycleState::Emit(snapshot) => {
                    let snapshot = Arc::new(snapshot);
                    self.publish(snapshot.clone());
                    return Ok(snapshot);
                }
                CycleState::Abort(fault) => {
                    self.counter.record_fault(&fault);
                    return Err(fault);
                }
                other => other.advance(&self.schema, captured_at),
            };
        }
    }

    /// Stream until `cancel` fires, then hand the transport back.
    ///
    /// Cancellation is checked between cycles only; a cycle in flight
    /// always finishes or times out first.
    pub async fn run(mut self, cancel: CancellationToken) -> T {
        info!(
            "Acquisition started: '{}', request {:02X?}, frame length {}",
            self.schema.name, self.schema.request_command, self.schema.expected_frame_length
        );

        while !cancel.is_cancelled() {
            match self.run_cycle().await {
                Ok(snapshot) => trace!("snapshot with {} values", snapshot.len()),
                Err(CycleFault::Transport(e)) => warn!("Transport error, cycle dropped: {e}"),
                Err(CycleFault::Frame(e)) => debug!("Frame dropped: {e}"),
            }
            tokio::time::sleep(self.config.cycle_pause()).await;
        }

        let stats = self.counter.stats();
        info!(
            "Acquisition stopped: {} frames, {} dropped cycles",
            stats.frames,
            stats.dropped()
        );
        self.transport
    }

    /// Spawn [`run`](Self::run) on the current runtime
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<T>
    where
        T: 'static,
    {
        tokio::spawn(self.run(cancel))
    }

    async fn send_request(&mut self) -> Result<(), ProtocolError> {
        self.transport.write_all(&self.schema.request_command).await?;
        self.transport.flush().await?;
        Ok(())
    }

    /// Read until a full response is buffered, the deadline passes or the
    /// stream ends.
    async fn read_response(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let wanted = self.schema.max_response_length();
        let deadline = Instant::now() + self.config.read_deadline();
        let mut buffer = Vec::new();
        let mut chunk = vec![0u8; self.config.read_chunk_size.max(1)];

        while buffer.len() < wanted {
            match timeout_at(deadline, self.transport.read(&mut chunk)).await {
                Ok(Ok(0)) if buffer.is_empty() => return Err(ProtocolError::Disconnected),
                Ok(Ok(0)) => {
                    debug!("End of stream after {} bytes", buffer.len());
                    break;
                }
                Ok(Ok(n)) => buffer.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    debug!(
                        "Read deadline reached with {} of {} bytes",
                        buffer.len(),
                        wanted
                    );
                    break;
                }
            }
        }

        Ok(buffer)
    }

    fn publish(&mut self, snapshot: Arc<Snapshot>) {
        self.counter.record_frame();
        self.latest.send_replace(Some(snapshot.clone()));

        if let Some(sink) = &self.sink {
            match sink.try_send(snapshot) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!("Snapshot sink full, skipping snapshot");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("Snapshot sink closed");
                    self.sink = None;
                }
            }
        }
    }
}
