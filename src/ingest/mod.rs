// src/ingest/mod.rs
pub mod buffer;
pub mod gate;
pub mod providers;
pub mod source;
pub mod types;

pub use buffer::{FileBuffer, MemoryBuffer, SourceBuffer};
pub use gate::RateGate;
pub use source::Source;
pub use types::{Record, UpstreamFetch};
