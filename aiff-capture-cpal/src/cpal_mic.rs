//! cpal microphone capture source.
//!
//! Opens the default input device through cpal and delivers fixed-size mono
//! i32 frames to the blocking `read_frame` call of `CaptureSource`.

use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;

use aiff_capture_core::models::config::StreamParameters;
use aiff_capture_core::models::error::CaptureError;
use aiff_capture_core::traits::capture_source::CaptureSource;

use crate::frame_assembler::FrameAssembler;

/// Frames buffered between the audio callback and `read_frame`.
const FRAME_QUEUE_DEPTH: usize = 1024;

type FrameMessage = Result<Vec<i32>, String>;
type Reply = Sender<Result<(), CaptureError>>;

enum Command {
    Start(Reply),
    Stop(Reply),
    Close(Reply),
}

/// Default-microphone capture over cpal.
///
/// `cpal::Stream` is not `Send` on every host, so the stream lives on a
/// dedicated thread that owns it from open to close. The source itself only
/// holds channels and is free to move to the session's producer thread.
pub struct CpalMicSource {
    device_name: String,
    frames: Option<Receiver<FrameMessage>>,
    commands: Option<Sender<Command>>,
    stream_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl CpalMicSource {
    pub fn new() -> Self {
        let device_name = cpal::default_host()
            .default_input_device()
            .and_then(|d| d.name().ok())
            .unwrap_or_else(|| "default input".into());
        Self {
            device_name,
            frames: None,
            commands: None,
            stream_thread: Mutex::new(None),
        }
    }

    fn send(&self, make: impl FnOnce(Reply) -> Command) -> Result<(), CaptureError> {
        let commands = self
            .commands
            .as_ref()
            .ok_or_else(|| CaptureError::Device("device is not open".into()))?;
        let (reply_tx, reply_rx) = bounded(1);
        commands
            .send(make(reply_tx))
            .map_err(|_| CaptureError::Device("stream thread exited".into()))?;
        reply_rx
            .recv()
            .map_err(|_| CaptureError::Device("stream thread exited".into()))?
    }
}

impl Default for CpalMicSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSource for CpalMicSource {
    fn open_default(&mut self, params: &StreamParameters) -> Result<(), CaptureError> {
        if self.commands.is_some() {
            return Err(CaptureError::Device("device already open".into()));
        }

        let (frame_tx, frame_rx) = bounded::<FrameMessage>(FRAME_QUEUE_DEPTH);
        let (command_tx, command_rx) = bounded::<Command>(4);
        let (opened_tx, opened_rx) = bounded::<Result<(), CaptureError>>(1);
        let params = *params;

        let handle = thread::Builder::new()
            .name("cpal-mic-stream".into())
            .spawn(move || stream_thread(params, frame_tx, command_rx, opened_tx))
            .map_err(|e| CaptureError::Device(format!("failed to spawn stream thread: {}", e)))?;

        match opened_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(CaptureError::Device("stream thread exited during open".into()));
            }
        }

        self.frames = Some(frame_rx);
        self.commands = Some(command_tx);
        *self.stream_thread.lock() = Some(handle);
        Ok(())
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        self.send(Command::Start)
    }

    fn read_frame(&mut self, frame: &mut [i32]) -> Result<(), CaptureError> {
        let frames = self
            .frames
            .as_ref()
            .ok_or_else(|| CaptureError::FrameRead("device is not open".into()))?;
        match frames.recv() {
            Ok(Ok(samples)) if samples.len() == frame.len() => {
                frame.copy_from_slice(&samples);
                Ok(())
            }
            Ok(Ok(samples)) => Err(CaptureError::FrameRead(format!(
                "frame of {} samples, expected {}",
                samples.len(),
                frame.len()
            ))),
            Ok(Err(msg)) => Err(CaptureError::FrameRead(msg)),
            Err(_) => Err(CaptureError::FrameRead("input stream closed".into())),
        }
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.send(Command::Stop)
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        if self.commands.is_none() {
            return Ok(());
        }
        let result = self.send(Command::Close);
        self.commands = None;
        self.frames = None;
        if let Some(handle) = self.stream_thread.lock().take() {
            let _ = handle.join();
        }
        result
    }

    fn device_name(&self) -> String {
        self.device_name.clone()
    }
}

impl Drop for CpalMicSource {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to close cpal input on drop: {}", e);
        }
    }
}

/// Owns the cpal stream for its whole life and serves commands.
fn stream_thread(
    params: StreamParameters,
    frame_tx: Sender<FrameMessage>,
    commands: Receiver<Command>,
    opened: Sender<Result<(), CaptureError>>,
) {
    let stream = match build_stream(&params, frame_tx) {
        Ok(stream) => {
            let _ = opened.send(Ok(()));
            stream
        }
        Err(e) => {
            let _ = opened.send(Err(e));
            return;
        }
    };

    for command in commands.iter() {
        match command {
            Command::Start(reply) => {
                let result = stream
                    .play()
                    .map_err(|e| CaptureError::Device(format!("failed to start input stream: {}", e)));
                let _ = reply.send(result);
            }
            Command::Stop(reply) => {
                let result = stream
                    .pause()
                    .map_err(|e| CaptureError::Device(format!("failed to stop input stream: {}", e)));
                let _ = reply.send(result);
            }
            Command::Close(reply) => {
                drop(stream);
                let _ = reply.send(Ok(()));
                return;
            }
        }
    }
}

fn build_stream(params: &StreamParameters, frame_tx: Sender<FrameMessage>) -> Result<cpal::Stream, CaptureError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| CaptureError::Device("no default input device".into()))?;
    let default_config = device
        .default_input_config()
        .map_err(|e| CaptureError::Device(format!("failed to query input config: {}", e)))?;

    // Request the fixed rate; keep the device's channel count and downmix.
    let channels = default_config.channels();
    let config = cpal::StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(params.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    log::info!(
        "Opening input {:?}: {} ch, {} Hz, {:?}",
        device.name().unwrap_or_default(),
        channels,
        params.sample_rate,
        default_config.sample_format()
    );

    let error_tx = frame_tx.clone();
    let on_error = move |err: cpal::StreamError| {
        log::error!("Input stream error: {}", err);
        let _ = error_tx.try_send(Err(err.to_string()));
    };

    let mut assembler = FrameAssembler::new(params.frame_size);
    let stream = match default_config.sample_format() {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                forward(&frame_tx, assembler.push_f32(data, channels));
            },
            on_error,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                forward(&frame_tx, assembler.push_i16(data, channels));
            },
            on_error,
            None,
        ),
        cpal::SampleFormat::I32 => device.build_input_stream(
            &config,
            move |data: &[i32], _: &cpal::InputCallbackInfo| {
                forward(&frame_tx, assembler.push_i32(data, channels));
            },
            on_error,
            None,
        ),
        other => {
            return Err(CaptureError::Device(format!(
                "unsupported input sample format: {:?}",
                other
            )))
        }
    };

    stream.map_err(|e| CaptureError::Device(format!("failed to build input stream: {}", e)))
}

/// Hand completed frames to the reader without blocking the audio callback.
fn forward(frame_tx: &Sender<FrameMessage>, frames: Vec<Vec<i32>>) {
    for frame in frames {
        match frame_tx.try_send(Ok(frame)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                log::warn!("Frame queue full ({} frames), dropping input", FRAME_QUEUE_DEPTH);
                return;
            }
            Err(TrySendError::Disconnected(_)) => return,
        }
    }
}
