pub mod player;
pub mod recorder;
pub mod reverser;
mod worker;
