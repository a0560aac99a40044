//! Streaming helpers for object transfers.

pub mod progress_stream;
