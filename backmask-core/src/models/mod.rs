pub mod audio_file;
pub mod audio_models;
pub mod config;
pub mod error;
pub mod results;
pub mod state;
