//! # iqx-rs
//!
//! Reading and writing IQX files: a self-describing, append-only container
//! for synchronized I/Q radio sample streams with timing, trigger, bookmark
//! and comment metadata.
//!
//! An IQX file is a sequence of frames, each a 4096-byte preamble followed
//! by aligned header and data blocks. The payload carries 16-bit or
//! DIGIQ-packed 12-bit I/Q sample frames and optional GPS fixes; the
//! epilogue carries tags, comments, bookmarks and the cue index used for
//! sample-accurate seeking. Multi-byte fields are host-endian; the format
//! is not portable across endianness.
//!
//! ## Quick Start
//!
//! ### Writing a recording
//!
//! ```no_run
//! use iqx_rs::{IqStreamParameters, IqxWriterBuilder, Result};
//!
//! fn main() -> Result<()> {
//!     let params = IqStreamParameters {
//!         samplerate: 1000.0,
//!         samplerate_valid: true,
//!         resolution: 16,
//!         resolution_valid: true,
//!         ..Default::default()
//!     };
//!     let mut writer = IqxWriterBuilder::new("capture")
//!         .comment("antenna test")
//!         .add_iq_stream("rf_a", params)
//!         .create("capture.iqx")?;
//!
//!     // interleaved I/Q pairs
//!     writer.write_data_frame(0, 0, &[0i16; 200])?;
//!     writer.close()?;
//!     Ok(())
//! }
//! ```
//!
//! ### Reading it back
//!
//! ```no_run
//! use iqx_rs::{IqxFile, Result};
//!
//! fn main() -> Result<()> {
//!     let mut file = IqxFile::open("capture.iqx")?;
//!     println!(
//!         "'{}': {} streams, {:.3} s",
//!         file.description_name(),
//!         file.number_of_streams(),
//!         file.duration().as_secs_f64()
//!     );
//!
//!     // one normalized component, 100 samples from the start
//!     let inphase = file.read_array("rf_a_I", 100, 0)?;
//!     println!("first I value: {}", inphase[0]);
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency
//!
//! All I/O is blocking and single-threaded by design; a file or writer is
//! exclusively owned by its handle. I/O and format errors are fatal to the
//! operation in progress and are never retried.

#![deny(missing_docs)]

mod alloc;
mod descriptor;
pub mod digiq;
mod epilogue;
mod error;
mod file;
mod frame;
mod time;
pub mod types;
mod wire;
mod writer;

pub use descriptor::IqStreamParameters;
pub use epilogue::Bookmark;
pub use error::{Error, Result};
pub use file::IqxFile;
pub use time::{sample_from_timestamp, timestamp_from_sample, Timespec};
pub use types::{
    CueEntry, ExportPermission, Geolocation, OverrunEntry, StreamType, TriggerEntry,
};
pub use writer::{IqxWriter, IqxWriterBuilder};
