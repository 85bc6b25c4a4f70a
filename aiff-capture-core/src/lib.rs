//! # aiff-capture-core
//!
//! Platform-agnostic microphone capture core.
//!
//! Encodes live audio straight into an AIFF file held in one growable,
//! seekable byte buffer: the header is written up front with placeholder
//! sizes, samples are streamed in behind it, and the three size fields are
//! patched in place once capture stops. Platform backends implement the
//! `CaptureSource` trait and plug into the generic `CaptureSession`.
//!
//! ## Architecture
//!
//! ```text
//! aiff-capture-core (this crate)
//! ├── traits/       ← CaptureSource, SessionObserver
//! ├── models/       ← CaptureError, SessionState, EncoderState, CaptureConfiguration, RecordingResult
//! ├── processing/   ← SeekableByteBuffer, AiffEncoder, AIFF layout
//! └── session/      ← CaptureSession (generic orchestrator), StopSignal
//! ```
//!
//! Output format is fixed: mono, 32-bit big-endian PCM, 44100 Hz.

pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::config::{CaptureConfiguration, StreamParameters};
pub use models::error::CaptureError;
pub use models::recording_result::{RecordingMetadata, RecordingResult};
pub use models::state::{EncoderState, SessionState};
pub use processing::aiff_format::{parse_header, AiffHeader};
pub use processing::encoder::AiffEncoder;
pub use processing::seekable_buffer::{SeekMode, SeekableByteBuffer};
pub use session::capture::CaptureSession;
pub use session::stop_signal::StopSignal;
pub use traits::capture_source::CaptureSource;
pub use traits::session_observer::SessionObserver;
