//! The capture pipeline.
//!
//! Decouples packet arrival from disk-write latency: producers enqueue decoded
//! records without ever blocking on I/O, and a single writer task drains the
//! queue and serializes records to the open log file. One recording session
//! maps to one destination file and one writer task.
//!
//! Lifecycle is `Idle -> Recording -> Stopping -> Idle`. Stopping cancels the
//! writer, waits for it to finish its in-flight record, and only then releases
//! the file handle. Records still queued at that moment are discarded; stop is
//! a best-effort flush of what is in flight, not of the whole backlog.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::directory::TransmitterDirectory;
use crate::logfile::codec::encode_record;
use crate::source::PacketSource;
use crate::types::{SessionConfig, TransmissionRecord};
use crate::wire::FrameDecoder;
use crate::{CaptureError, Result};

/// Consecutive write failures tolerated before the session aborts.
const MAX_CONSECUTIVE_WRITE_FAILURES: u32 = 3;

/// Observable lifecycle state of a [`Recorder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
}

/// Owns the capture pipeline for recording sessions.
///
/// # Example
///
/// ```rust,no_run
/// use voxlog::{Recorder, SessionConfig, StaticDirectory};
/// use std::sync::Arc;
///
/// # async fn run() -> voxlog::Result<()> {
/// let mut recorder = Recorder::new(SessionConfig::default(), Arc::new(StaticDirectory::new()));
/// recorder.start("mission.vxl").await?;
/// // ... feed records via spawn_source or enqueue ...
/// let written = recorder.stop().await?;
/// println!("persisted {written} transmissions");
/// # Ok(())
/// # }
/// ```
pub struct Recorder {
    session: SessionConfig,
    directory: Arc<dyn TransmitterDirectory>,
    notify_tx: watch::Sender<Option<Arc<TransmissionRecord>>>,
    notify_rx: watch::Receiver<Option<Arc<TransmissionRecord>>>,
    active: Option<ActiveSession>,
}

/// State held only while a session is recording.
struct ActiveSession {
    path: PathBuf,
    queue_tx: mpsc::UnboundedSender<Arc<TransmissionRecord>>,
    cancel: CancellationToken,
    writer: JoinHandle<Result<u64>>,
    /// Write lock over the destination file. There is only one writer task,
    /// but the lock also closes the stop/start race where a new session could
    /// begin writing before the previous writer released the handle.
    file: Arc<Mutex<File>>,
    enqueued: Arc<AtomicU64>,
}

impl Recorder {
    /// Create an idle recorder.
    pub fn new(session: SessionConfig, directory: Arc<dyn TransmitterDirectory>) -> Self {
        let (notify_tx, notify_rx) = watch::channel(None);
        Self { session, directory, notify_tx, notify_rx, active: None }
    }

    /// Current lifecycle state.
    ///
    /// A session whose writer task has already exited (for example after a
    /// fatal write failure) reports `Idle`: the session is dead even though
    /// its failure has not been collected by [`stop`](Self::stop) yet.
    pub fn state(&self) -> RecorderState {
        match &self.active {
            Some(active) if !active.writer.is_finished() => RecorderState::Recording,
            _ => RecorderState::Idle,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecorderState::Recording
    }

    /// Begin a recording session writing to `path`.
    ///
    /// Truncate-creates the destination, resets session sequencing and spawns
    /// the writer task. Fails with [`CaptureError::AlreadyRecording`] while a
    /// session is active; if the previous session's writer died mid-session,
    /// the stored [`CaptureError::RecordingAborted`] is surfaced here and the
    /// recorder falls back to idle so a retry can succeed.
    pub async fn start<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let writer_died = match &self.active {
            Some(active) if !active.writer.is_finished() => {
                return Err(CaptureError::AlreadyRecording);
            }
            Some(_) => true,
            None => false,
        };
        if writer_died {
            // The writer exited on its own; collect its failure before
            // allowing a new session.
            self.stop().await?;
        }

        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| CaptureError::io_error(path.clone(), e))?;
        let file = Arc::new(Mutex::new(file));

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let enqueued = Arc::new(AtomicU64::new(0));

        let writer = tokio::spawn(writer_task(
            queue_rx,
            Arc::clone(&file),
            path.clone(),
            cancel.clone(),
        ));

        info!("recording started: {}", path.display());
        self.active = Some(ActiveSession { path, queue_tx, cancel, writer, file, enqueued });
        Ok(())
    }

    /// Stop the active session and return the number of records written.
    ///
    /// Signals cancellation, waits for the writer to finish its in-flight
    /// record and exit, then releases the file handle. A no-op returning
    /// `Ok(0)` when idle. Surfaces [`CaptureError::RecordingAborted`] if the
    /// writer lost the file mid-session.
    pub async fn stop(&mut self) -> Result<u64> {
        let Some(active) = self.active.take() else {
            debug!("stop requested while idle; nothing to do");
            return Ok(0);
        };

        active.cancel.cancel();
        drop(active.queue_tx);

        let written = match active.writer.await {
            Ok(result) => result?,
            Err(join_err) => {
                return Err(CaptureError::aborted_with_source(
                    "writer task ended abnormally",
                    Box::new(join_err),
                ));
            }
        };

        let pending = active.enqueued.load(Ordering::Relaxed).saturating_sub(written);
        if pending > 0 {
            debug!(pending, "records still queued at stop were discarded");
        }

        // Writer has exited; flush to durable storage before the handle drops.
        {
            let guard = match active.file.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Err(err) = guard.sync_all() {
                warn!("failed to sync log file on stop: {err}");
            }
        }

        info!(written, "recording stopped: {}", active.path.display());
        Ok(written)
    }

    /// Enqueue one decoded record for persistence.
    ///
    /// Never blocks. Also publishes the record on the live-display side
    /// channel regardless of what happens to it afterwards.
    pub fn enqueue(&self, record: TransmissionRecord) -> Result<()> {
        let Some(active) = &self.active else {
            return Err(CaptureError::NotRecording);
        };

        let record = Arc::new(record);
        active.enqueued.fetch_add(1, Ordering::Relaxed);
        self.notify_tx.send_replace(Some(Arc::clone(&record)));

        active
            .queue_tx
            .send(record)
            .map_err(|_| CaptureError::aborted("writer task is no longer accepting records"))
    }

    /// Subscribe to captured records for live display.
    ///
    /// Latest-wins: a slow consumer sees the most recent record, not every
    /// record. Persistence does not depend on anyone listening here.
    pub fn subscribe(&self) -> impl Stream<Item = Arc<TransmissionRecord>> + 'static {
        WatchStream::new(self.notify_rx.clone()).filter_map(|opt| async move { opt })
    }

    /// Spawn a producer task that pulls raw packets from `source`, decodes
    /// them and enqueues the records until the source ends or the session is
    /// cancelled. Malformed packets are logged and dropped without
    /// interrupting capture.
    pub fn spawn_source<S: PacketSource>(&self, source: S) -> Result<()> {
        let Some(active) = &self.active else {
            return Err(CaptureError::NotRecording);
        };

        let decoder = FrameDecoder::new(self.session, Arc::clone(&self.directory));
        let queue_tx = active.queue_tx.clone();
        let notify_tx = self.notify_tx.clone();
        let enqueued = Arc::clone(&active.enqueued);
        let cancel = active.cancel.clone();

        tokio::spawn(producer_loop(source, decoder, queue_tx, notify_tx, enqueued, cancel));
        Ok(())
    }

    /// Session constants stamped onto decoded records.
    pub fn session(&self) -> SessionConfig {
        self.session
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            debug!("recorder dropped while recording; cancelling writer");
            active.cancel.cancel();
        }
    }
}

/// Writer task: drains the queue and serializes records to the log file.
///
/// Exits when cancelled or when every producer handle is gone. A single
/// failed write is logged and the writer keeps going; failures that mean the
/// handle itself is lost, or too many in a row, abort the session.
async fn writer_task<W: Write + Send + 'static>(
    mut queue_rx: mpsc::UnboundedReceiver<Arc<TransmissionRecord>>,
    sink: Arc<Mutex<W>>,
    path: PathBuf,
    cancel: CancellationToken,
) -> Result<u64> {
    debug!("writer task started");
    let mut written = 0u64;
    let mut consecutive_failures = 0u32;

    loop {
        let record = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("writer cancelled; discarding queued backlog");
                break;
            }
            record = queue_rx.recv() => match record {
                Some(record) => record,
                None => break,
            },
        };

        // Encode outside the lock; the lock covers only the file write.
        let mut buf = Vec::with_capacity(64 + record.payload.len());
        encode_record(&record, &mut buf)?;

        let write_result = {
            let mut guard = match sink.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.write_all(&buf)
        };

        match write_result {
            Ok(()) => {
                written += 1;
                consecutive_failures = 0;
            }
            Err(err) => {
                consecutive_failures += 1;
                if handle_is_lost(&err) || consecutive_failures >= MAX_CONSECUTIVE_WRITE_FAILURES {
                    error!(
                        packet_id = record.packet_id,
                        consecutive_failures,
                        "write failure is fatal, aborting session: {err}"
                    );
                    return Err(CaptureError::aborted_with_source(
                        format!("lost log file {}", path.display()),
                        Box::new(err),
                    ));
                }
                warn!(
                    packet_id = record.packet_id,
                    "failed to write record, continuing: {err}"
                );
            }
        }
    }

    debug!(written, "writer task ended");
    Ok(written)
}

/// Whether an I/O error means the file handle itself is gone.
fn handle_is_lost(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::NotFound
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::PermissionDenied
    )
}

/// Producer task: pulls raw packets, decodes, notifies and enqueues.
async fn producer_loop<S: PacketSource>(
    mut source: S,
    decoder: FrameDecoder,
    queue_tx: mpsc::UnboundedSender<Arc<TransmissionRecord>>,
    notify_tx: watch::Sender<Option<Arc<TransmissionRecord>>>,
    enqueued: Arc<AtomicU64>,
    cancel: CancellationToken,
) {
    info!("packet producer task started");
    let mut received = 0u64;
    let mut dropped = 0u64;

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                info!("packet producer cancelled");
                break;
            }
            next = source.next_packet() => next,
        };

        match next {
            Ok(Some(packet)) => {
                if packet.is_empty() {
                    continue;
                }
                received += 1;

                match decoder.decode(&packet) {
                    Ok(record) => {
                        let record = Arc::new(record);
                        enqueued.fetch_add(1, Ordering::Relaxed);
                        notify_tx.send_replace(Some(Arc::clone(&record)));
                        if queue_tx.send(record).is_err() {
                            debug!("writer gone, producer exiting");
                            break;
                        }
                    }
                    Err(err) => {
                        // One bad datagram never ends the capture session.
                        dropped += 1;
                        warn!("dropping malformed frame: {err}");
                    }
                }
            }
            Ok(None) => {
                info!("packet source ended");
                break;
            }
            Err(err) if err.is_fatal() => {
                error!("packet source failed: {err}");
                break;
            }
            Err(err) => {
                warn!("packet source error, continuing: {err}");
            }
        }
    }

    info!(received, dropped, "packet producer task ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaticDirectory;
    use crate::logfile::LogReader;
    use anyhow::{Context, Result, ensure};
    use std::time::Duration;

    fn test_recorder() -> Recorder {
        Recorder::new(SessionConfig::default(), Arc::new(StaticDirectory::new()))
    }

    fn record_with_id(packet_id: u64) -> TransmissionRecord {
        TransmissionRecord {
            timestamp_ticks: crate::types::ticks_now(),
            frequency: 251.0e6,
            modulation: 0,
            encryption: 0,
            transmitter_unit_id: 10,
            packet_id,
            transmitter_identity: "pipeline-test".to_string(),
            sample_rate: 48_000,
            channels: 1,
            coalition: 1,
            payload: vec![packet_id as u8; 32],
        }
    }

    async fn drain_delay() {
        // Give the writer task time to pull everything off the queue before
        // cancellation discards the backlog.
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    /// Sink whose every write fails with a fixed error kind.
    struct FailingSink {
        kind: std::io::ErrorKind,
    }

    impl Write for FailingSink {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(self.kind, "injected write failure"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Sink that fails its first few writes and then starts accepting.
    struct FlakySink {
        failures_left: u32,
        data: Vec<u8>,
    }

    impl Write for FlakySink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(std::io::Error::other("injected write failure"));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn spawn_writer<W: Write + Send + 'static>(
        sink: Arc<Mutex<W>>,
    ) -> (mpsc::UnboundedSender<Arc<TransmissionRecord>>, JoinHandle<crate::Result<u64>>) {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(writer_task(
            queue_rx,
            sink,
            PathBuf::from("injected.vxl"),
            CancellationToken::new(),
        ));
        (queue_tx, writer)
    }

    #[tokio::test]
    async fn writer_aborts_when_the_file_handle_is_lost() -> Result<()> {
        let sink = Arc::new(Mutex::new(FailingSink { kind: std::io::ErrorKind::PermissionDenied }));
        let (queue_tx, writer) = spawn_writer(sink);

        queue_tx.send(Arc::new(record_with_id(1)))?;
        drop(queue_tx);

        let err = writer.await?.unwrap_err();
        ensure!(matches!(err, CaptureError::RecordingAborted { .. }), "got: {err}");
        ensure!(err.is_fatal());
        Ok(())
    }

    #[tokio::test]
    async fn writer_aborts_after_repeated_write_failures() -> Result<()> {
        let sink = Arc::new(Mutex::new(FailingSink { kind: std::io::ErrorKind::Other }));
        let (queue_tx, writer) = spawn_writer(sink);

        // Retryable failures are tolerated per record; a third in a row ends
        // the session.
        for packet_id in 1..=MAX_CONSECUTIVE_WRITE_FAILURES as u64 {
            queue_tx.send(Arc::new(record_with_id(packet_id)))?;
        }
        drop(queue_tx);

        let err = writer.await?.unwrap_err();
        ensure!(matches!(err, CaptureError::RecordingAborted { .. }), "got: {err}");
        Ok(())
    }

    #[tokio::test]
    async fn writer_recovers_from_transient_write_failures() -> Result<()> {
        let sink = Arc::new(Mutex::new(FlakySink { failures_left: 2, data: Vec::new() }));
        let (queue_tx, writer) = spawn_writer(Arc::clone(&sink));

        for packet_id in 1..=3u64 {
            queue_tx.send(Arc::new(record_with_id(packet_id)))?;
        }
        drop(queue_tx);

        let written = writer.await??;
        ensure!(written == 1, "only the record after recovery persists, got {written}");
        ensure!(!sink.lock().unwrap().data.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn dead_writer_reports_idle_and_surfaces_on_stop() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut recorder = test_recorder();
        recorder.start(dir.path().join("dead.vxl")).await?;
        ensure!(recorder.state() == RecorderState::Recording);

        // Kill the writer out from under the session.
        recorder.active.as_ref().unwrap().writer.abort();
        tokio::time::sleep(Duration::from_millis(50)).await;

        ensure!(recorder.state() == RecorderState::Idle, "dead session must read as idle");

        let err = recorder.stop().await.unwrap_err();
        ensure!(matches!(err, CaptureError::RecordingAborted { .. }), "got: {err}");

        // Once the failure is collected, a fresh session can start.
        recorder.start(dir.path().join("retry.vxl")).await?;
        recorder.stop().await?;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fifo_order_survives_the_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("fifo.vxl");

        let mut recorder = test_recorder();
        recorder.start(&path).await?;
        for packet_id in [1u64, 2, 3] {
            recorder.enqueue(record_with_id(packet_id))?;
        }
        drain_delay().await;
        let written = recorder.stop().await?;
        ensure!(written == 3, "expected 3 records written, got {written}");

        let ids: Vec<u64> = LogReader::open(&path)?
            .records(CancellationToken::new())
            .map(|r| r.map(|rec| rec.packet_id))
            .collect::<std::result::Result<_, _>>()?;
        ensure!(ids == vec![1, 2, 3], "order not preserved: {ids:?}");
        Ok(())
    }

    #[tokio::test]
    async fn start_twice_reports_already_recording() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut recorder = test_recorder();

        recorder.start(dir.path().join("a.vxl")).await?;
        let err = recorder.start(dir.path().join("b.vxl")).await.unwrap_err();
        ensure!(matches!(err, CaptureError::AlreadyRecording));

        // The original session is untouched by the failed start.
        ensure!(recorder.is_recording());
        recorder.stop().await?;
        Ok(())
    }

    #[tokio::test]
    async fn stop_while_idle_is_a_noop() -> Result<()> {
        let mut recorder = test_recorder();
        ensure!(recorder.stop().await? == 0);
        ensure!(recorder.state() == RecorderState::Idle);
        Ok(())
    }

    #[tokio::test]
    async fn enqueue_while_idle_is_lifecycle_misuse() {
        let recorder = test_recorder();
        let err = recorder.enqueue(record_with_id(1)).unwrap_err();
        assert!(matches!(err, CaptureError::NotRecording));
    }

    #[tokio::test]
    async fn restart_reopens_a_new_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let first = dir.path().join("first.vxl");
        let second = dir.path().join("second.vxl");

        let mut recorder = test_recorder();
        recorder.start(&first).await?;
        recorder.enqueue(record_with_id(1))?;
        drain_delay().await;
        recorder.stop().await?;

        recorder.start(&second).await?;
        recorder.enqueue(record_with_id(2))?;
        drain_delay().await;
        recorder.stop().await?;

        let mut reader = LogReader::open(&second)?;
        let record = reader.read_next_record()?.context("second log should have a record")?;
        ensure!(record.packet_id == 2);
        ensure!(reader.read_next_record()?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn subscribe_sees_enqueued_records() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut recorder = test_recorder();
        recorder.start(dir.path().join("live.vxl")).await?;

        let mut live = Box::pin(recorder.subscribe());
        recorder.enqueue(record_with_id(7))?;

        let seen = tokio::time::timeout(Duration::from_secs(1), live.next())
            .await
            .context("live notification should arrive")?
            .context("stream should not end")?;
        ensure!(seen.packet_id == 7);

        recorder.stop().await?;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn producer_survives_malformed_frames() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("mixed.vxl");

        let mut recorder = test_recorder();
        recorder.start(&path).await?;

        let (packets, source) = crate::source::ChannelSource::new();
        recorder.spawn_source(source)?;

        packets.send(build_test_frame(1))?;
        packets.send(vec![0u8; 5])?; // too short for any frame
        packets.send(build_test_frame(2))?;
        drop(packets);

        drain_delay().await;
        let written = recorder.stop().await?;
        ensure!(written == 2, "both valid frames should persist, got {written}");

        let ids: Vec<u64> = LogReader::open(&path)?
            .records(CancellationToken::new())
            .map(|r| r.map(|rec| rec.packet_id))
            .collect::<std::result::Result<_, _>>()?;
        ensure!(ids == vec![1, 2]);
        Ok(())
    }

    fn build_test_frame(packet_id: u64) -> Vec<u8> {
        use crate::types::IDENTITY_LEN;

        let audio = [0x11u8; 24];
        let mut frame = Vec::new();
        frame.extend_from_slice(&((55 + audio.len()) as u16).to_le_bytes());
        frame.extend_from_slice(&(audio.len() as u16).to_le_bytes());
        frame.extend_from_slice(&2u16.to_le_bytes());
        frame.extend_from_slice(&audio);
        frame.extend_from_slice(&251.0e6f64.to_le_bytes());
        frame.push(0);
        frame.push(0);
        frame.extend_from_slice(&99u32.to_le_bytes());
        frame.extend_from_slice(&packet_id.to_le_bytes());
        frame.push(1);
        let mut identity = [0u8; IDENTITY_LEN];
        identity[..9].copy_from_slice(b"test-unit");
        frame.extend_from_slice(&identity);
        frame.extend_from_slice(&1i32.to_le_bytes());
        frame
    }
}
