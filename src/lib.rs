//! Extraction of Blu-ray PGS (`.sup`) subtitles.
//!
//! A stream is parsed into [`Packet`]s, the bitmaps carried by object
//! definitions are decompressed into [`Pixmap`]s, window definitions are
//! paired into display intervals and, given a [`TextRecognizer`], the whole
//! thing becomes a list of SRT entries.
//!
//! ```no_run
//! use pgs_srt::{build_pixmaps, decode_file, pair_subtitle_intervals};
//!
//! let packets = decode_file("subs.sup")?;
//! let pixmaps = build_pixmaps(&packets)?;
//! let intervals = pair_subtitle_intervals(&packets);
//! for (pm, iv) in pixmaps.iter().zip(&intervals) {
//!     println!("{}x{} shown {:.0}-{:.0} ms", pm.width, pm.height, iv.start_ms, iv.end_ms);
//! }
//! # Ok::<(), pgs_srt::Error>(())
//! ```

#[macro_use]
extern crate derivative;

pub mod config;
pub mod error;
pub mod ocr;
pub mod parser;
pub mod pipeline;
pub mod srt;

pub use crate::config::Config;
pub use crate::error::{Error, Result};
pub use crate::ocr::TextRecognizer;
pub use crate::parser::renderer::{decode, decode_with, Pixmap, RunLength};
pub use crate::parser::types::{Packet, Segment, SegmentType, Timestamp};
pub use crate::parser::{parse_stream, read_stream};
pub use crate::pipeline::{
    build_pixmaps, decode_file, object_compositions, pair_subtitle_intervals, transcribe, Decoded,
    Interval, Observer, Pipeline, PngDumper,
};
pub use crate::srt::SubtitleEntry;
