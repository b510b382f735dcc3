pub mod core;
pub mod library;
pub mod playback;
pub mod storage;
