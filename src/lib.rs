pub mod args;
pub mod assets;
pub mod audio;
pub mod compose;
pub mod config;
pub mod content;
pub mod error;
pub mod pipeline;
pub mod publish;
pub mod subtitle;
pub mod timing;
pub mod tts;
pub mod utils;
