pub mod format_converter;
pub mod pcm;
pub mod ring_buffer;
