pub mod aiff_format;
pub mod encoder;
pub mod seekable_buffer;
