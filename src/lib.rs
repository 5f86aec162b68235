pub mod cli;
pub mod commands;
pub mod errors;
pub mod format;
pub mod jobs;
pub mod library;
pub mod offline;
pub mod playback;
pub mod state;
pub mod storage;
pub mod video_cache;
