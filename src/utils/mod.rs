pub mod logging;
pub mod progress;
pub mod sample;
