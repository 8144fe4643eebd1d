//! adsb-core: Pure decode + position-resolution library for ADS-B feeds.
//!
//! No async, no sockets: the pipeline reads from any `std::io::Read`. The
//! `adsb-stream` binary supplies the TCP connection, thread, and publisher.

pub mod buffer;
pub mod config;
pub mod cpr;
pub mod crc;
pub mod framer;
pub mod interpret;
pub mod message;
pub mod pipeline;
pub mod state;
pub mod store;
pub mod types;

// Re-export commonly used types at crate root
pub use buffer::{FrameBuffer, FrameBufferEntry};
pub use config::Config;
pub use cpr::{Position, PositionResolver};
pub use framer::{Framer, RawFrame};
pub use interpret::{interpret, Report};
pub use message::DecodedMessage;
pub use pipeline::{ArchiveRecord, Clock, Outcome, Pipeline, PipelineStats, RecordSink, SystemClock};
pub use state::{AircraftState, Packet};
pub use store::{StateStore, Subscription};
pub use types::*;
