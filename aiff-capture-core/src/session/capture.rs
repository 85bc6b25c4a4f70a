use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::SessionState;
use crate::processing::encoder::AiffEncoder;
use crate::processing::seekable_buffer::SeekableByteBuffer;
use crate::session::stop_signal::StopSignal;
use crate::traits::capture_source::CaptureSource;
use crate::traits::session_observer::SessionObserver;

/// Source and encoder parked for the producer thread to pick up. Still
/// holds them if the thread never started.
type Handoff<S> = Mutex<Option<(S, AiffEncoder)>>;

/// What the producer thread hands back when it is joined.
struct ProducerExit<S> {
    source: S,
    encoder: AiffEncoder,
    outcome: Result<(), CaptureError>,
}

/// Drives one recording from a [`CaptureSource`] into an AIFF buffer.
///
/// Two operating modes share one loop and one teardown path:
///
/// - **Manual**: [`begin`](Self::begin) opens and starts the device, writes
///   the header and spawns a producer thread; [`end`](Self::end) fires the
///   stop signal, joins the producer, stops the device and finalizes.
/// - **Signal-driven**: [`run`](Self::run) does the same on the calling
///   thread until the supplied [`StopSignal`] fires.
///
/// ```text
/// [CaptureSource] → read_frame → [AiffEncoder] → [SeekableByteBuffer]
///                                      ↓ (after join)
///                                   finalize → RecordingResult
/// ```
///
/// The header is only patched after the producer has been joined, so the
/// sample count and buffer are fully published before finalize reads them.
/// A session records once; `Stopped` and `Faulted` are terminal.
pub struct CaptureSession<S: CaptureSource + 'static> {
    source: Option<S>,
    config: CaptureConfiguration,
    state: Mutex<SessionState>,
    observer: Option<Arc<dyn SessionObserver>>,

    // Shared with the producer thread; snapshot() locks it.
    buffer: Arc<Mutex<SeekableByteBuffer>>,
    samples_captured: Arc<AtomicU64>,

    // Manual mode only
    stop: StopSignal,
    producer: Option<thread::JoinHandle<Option<ProducerExit<S>>>>,

    device_name: String,
}

impl<S: CaptureSource + 'static> CaptureSession<S> {
    pub fn new(source: S, config: CaptureConfiguration) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        Ok(Self::from_parts(source, config))
    }

    /// Session with the default 64-sample frames.
    pub fn with_defaults(source: S) -> Self {
        Self::from_parts(source, CaptureConfiguration::default())
    }

    fn from_parts(source: S, config: CaptureConfiguration) -> Self {
        let device_name = source.device_name();
        Self {
            source: Some(source),
            config,
            state: Mutex::new(SessionState::Idle),
            observer: None,
            buffer: Arc::new(Mutex::new(SeekableByteBuffer::new())),
            samples_captured: Arc::new(AtomicU64::new(0)),
            stop: StopSignal::new(),
            producer: None,
            device_name,
        }
    }

    pub fn set_observer(&mut self, observer: Arc<dyn SessionObserver>) {
        self.observer = Some(observer);
    }

    pub fn state(&self) -> SessionState {
        self.state.lock().clone()
    }

    pub fn config(&self) -> &CaptureConfiguration {
        &self.config
    }

    /// Samples appended so far. Safe to poll from the controller thread
    /// while the producer runs.
    pub fn samples_captured(&self) -> u64 {
        self.samples_captured.load(Ordering::Acquire)
    }

    /// Copy of the bytes written so far, taken under the buffer lock.
    ///
    /// Mid-capture the size fields are still placeholders. After a fault the
    /// copy holds the partial, never-finalized output. Once the session is
    /// `Stopped` the bytes have moved into the [`RecordingResult`] and the
    /// copy is empty.
    pub fn snapshot(&self) -> Vec<u8> {
        self.buffer.lock().snapshot().to_vec()
    }

    /// Whether a manual-mode producer has exited on its own (after a fault).
    pub fn producer_finished(&self) -> bool {
        self.producer.as_ref().is_some_and(|h| h.is_finished())
    }

    /// A handle to the manual-mode stop signal, for cancelling from another
    /// thread. [`end`](Self::end) still has to be called to finalize.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Manual mode: open and start the device, write the header, spawn the
    /// producer. Transitions: idle → capturing.
    pub fn begin(&mut self) -> Result<(), CaptureError> {
        let (source, encoder) = self.open_and_start()?;

        let handoff: Arc<Handoff<S>> = Arc::new(Mutex::new(Some((source, encoder))));
        let producer_handoff = Arc::clone(&handoff);
        let buffer = Arc::clone(&self.buffer);
        let stop = self.stop.clone();
        let samples_captured = Arc::clone(&self.samples_captured);
        let frame_size = self.config.frame_size;

        let spawned = thread::Builder::new()
            .name("aiff-capture-producer".into())
            .spawn(move || {
                let (mut source, mut encoder) = producer_handoff.lock().take()?;
                let outcome = capture_loop(
                    &mut source,
                    &mut encoder,
                    &buffer,
                    frame_size,
                    &stop,
                    &samples_captured,
                );
                if let Err(ref e) = outcome {
                    error!("Capture loop stopped: {}", e);
                }
                Some(ProducerExit {
                    source,
                    encoder,
                    outcome,
                })
            });

        match spawned {
            Ok(handle) => {
                self.producer = Some(handle);
                Ok(())
            }
            Err(e) => {
                let err = CaptureError::Device(format!("failed to spawn producer thread: {}", e));
                self.release_unspawned(&handoff, err.clone());
                Err(err)
            }
        }
    }

    /// Manual mode: stop, join the producer, stop the device, finalize.
    /// Transitions: capturing → stopped / faulted.
    pub fn end(&mut self) -> Result<RecordingResult, CaptureError> {
        let handle = self.producer.take().ok_or_else(|| {
            CaptureError::InvalidState("end called without a running capture".into())
        })?;

        self.stop.fire();
        let exit = match handle.join() {
            Ok(Some(exit)) => exit,
            Ok(None) => {
                let err = CaptureError::InvalidState("producer started without a source".into());
                self.fault(err.clone());
                return Err(err);
            }
            Err(_) => {
                let err = CaptureError::InvalidState("producer thread panicked".into());
                self.fault(err.clone());
                return Err(err);
            }
        };

        self.finish(exit.source, exit.encoder, exit.outcome)
    }

    /// Signal-driven mode: capture on the calling thread until `stop` fires,
    /// then stop the device and finalize.
    /// Transitions: idle → capturing → stopped / faulted.
    pub fn run(&mut self, stop: &StopSignal) -> Result<RecordingResult, CaptureError> {
        let (mut source, mut encoder) = self.open_and_start()?;

        let outcome = capture_loop(
            &mut source,
            &mut encoder,
            &self.buffer,
            self.config.frame_size,
            stop,
            &self.samples_captured,
        );

        self.finish(source, encoder, outcome)
    }

    // --- Internal helpers ---

    /// Open and start the device, then write the header into a fresh buffer.
    ///
    /// The device is closed again if a later step fails.
    fn open_and_start(&mut self) -> Result<(S, AiffEncoder), CaptureError> {
        {
            let state = self.state.lock();
            if !state.is_idle() {
                return Err(CaptureError::InvalidState(format!(
                    "can only start capture from idle state, session is {}",
                    state.name()
                )));
            }
        }
        let mut source = self
            .source
            .take()
            .ok_or_else(|| CaptureError::InvalidState("capture source already consumed".into()))?;

        if let Err(e) = source.open_default(&self.config.stream_parameters()) {
            self.fault(e.clone());
            return Err(e);
        }

        if let Err(e) = source.start() {
            close_quietly(&mut source);
            self.fault(e.clone());
            return Err(e);
        }

        let mut buffer = SeekableByteBuffer::with_capacity(self.config.initial_capacity);
        let mut encoder = AiffEncoder::new();
        if let Err(e) = encoder.start(&mut buffer) {
            stop_quietly(&mut source);
            close_quietly(&mut source);
            self.fault(e.clone());
            return Err(e);
        }

        *self.buffer.lock() = buffer;
        self.samples_captured.store(0, Ordering::Release);
        self.set_state(SessionState::Capturing);
        info!(
            "Capture started on {} ({} samples per frame)",
            self.device_name, self.config.frame_size
        );
        Ok((source, encoder))
    }

    /// Release a device whose producer thread never started.
    fn release_unspawned(&self, handoff: &Handoff<S>, err: CaptureError) {
        if let Some((mut source, _)) = handoff.lock().take() {
            stop_quietly(&mut source);
            close_quietly(&mut source);
        }
        self.fault(err);
    }

    /// The single teardown path for both modes.
    ///
    /// On a loop fault the header is left unpatched. The device is closed on
    /// every path.
    fn finish(
        &mut self,
        mut source: S,
        mut encoder: AiffEncoder,
        outcome: Result<(), CaptureError>,
    ) -> Result<RecordingResult, CaptureError> {
        if let Err(e) = outcome {
            stop_quietly(&mut source);
            close_quietly(&mut source);
            self.fault(e.clone());
            return Err(e);
        }

        if let Err(e) = source.stop() {
            close_quietly(&mut source);
            self.fault(e.clone());
            return Err(e);
        }

        let finalized = encoder.finalize(&mut self.buffer.lock());
        if let Err(e) = finalized {
            close_quietly(&mut source);
            self.fault(e.clone());
            return Err(e);
        }

        if let Err(e) = source.close() {
            self.fault(e.clone());
            return Err(e);
        }

        let total_samples = encoder.total_samples();
        let bytes = std::mem::take(&mut *self.buffer.lock()).into_bytes();
        let result = RecordingResult::new(bytes, total_samples, &self.device_name);

        self.set_state(SessionState::Stopped { total_samples });
        info!(
            "Capture finished: {} samples, {:.2}s, {} bytes",
            total_samples,
            result.duration_secs,
            result.bytes.len()
        );
        if let Some(ref observer) = self.observer {
            observer.on_capture_finished(&result);
        }
        Ok(result)
    }

    fn set_state(&self, new_state: SessionState) {
        debug!("Session state → {}", new_state.name());
        {
            let mut s = self.state.lock();
            *s = new_state.clone();
        }
        if let Some(ref observer) = self.observer {
            observer.on_state_changed(&new_state);
        }
    }

    fn fault(&self, err: CaptureError) {
        error!("Capture session faulted: {}", err);
        if let Some(ref observer) = self.observer {
            observer.on_error(&err);
        }
        self.set_state(SessionState::Faulted(err));
    }
}

impl<S: CaptureSource + 'static> Drop for CaptureSession<S> {
    fn drop(&mut self) {
        let Some(handle) = self.producer.take() else {
            return;
        };
        warn!("Capture session dropped while capturing; releasing device");
        self.stop.fire();
        if let Ok(Some(mut exit)) = handle.join() {
            stop_quietly(&mut exit.source);
            close_quietly(&mut exit.source);
        }
    }
}

/// Read frames and append them until `stop` fires or the source faults.
///
/// The signal is checked before every read; a read already in progress is
/// allowed to complete.
fn capture_loop<S: CaptureSource>(
    source: &mut S,
    encoder: &mut AiffEncoder,
    buffer: &Mutex<SeekableByteBuffer>,
    frame_size: usize,
    stop: &StopSignal,
    samples_captured: &AtomicU64,
) -> Result<(), CaptureError> {
    let mut frame = vec![0i32; frame_size];
    while !stop.is_fired() {
        source.read_frame(&mut frame).map_err(|e| match e {
            CaptureError::FrameRead(_) => e,
            other => CaptureError::FrameRead(other.to_string()),
        })?;
        encoder.append_samples(&mut buffer.lock(), &frame)?;
        samples_captured.store(encoder.total_samples(), Ordering::Release);
    }
    debug!("Capture loop observed stop after {} samples", encoder.total_samples());
    Ok(())
}

fn stop_quietly<S: CaptureSource>(source: &mut S) {
    if let Err(e) = source.stop() {
        warn!("Failed to stop capture source during teardown: {}", e);
    }
}

fn close_quietly<S: CaptureSource>(source: &mut S) {
    if let Err(e) = source.close() {
        warn!("Failed to close capture source during teardown: {}", e);
    }
}
