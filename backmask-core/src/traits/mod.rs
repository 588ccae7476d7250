pub mod capture_provider;
pub mod listeners;
pub mod playback_sink;
pub mod session_delegate;
