//! # aiff-capture-cpal
//!
//! cpal microphone backend for aiff-capture.
//!
//! Provides:
//! - `FrameAssembler` — regroups host-sized callbacks into fixed mono i32 frames
//! - `CpalMicSource` — default-microphone `CaptureSource` (`cpal` feature)
//!
//! ## Platform Requirements
//! - The `cpal` feature links the host audio API (ALSA development files on
//!   Linux, CoreAudio on macOS, WASAPI on Windows)
//!
//! ## Usage
//! ```ignore
//! use aiff_capture_core::{CaptureSession, StopSignal};
//! use aiff_capture_cpal::CpalMicSource;
//!
//! let mut session = CaptureSession::with_defaults(CpalMicSource::new());
//! session.begin()?;
//! std::thread::sleep(std::time::Duration::from_secs(2));
//! let recording = session.end()?;
//! ```

pub mod frame_assembler;

#[cfg(feature = "cpal")]
pub mod cpal_mic;

pub use frame_assembler::FrameAssembler;

#[cfg(feature = "cpal")]
pub use cpal_mic::CpalMicSource;
