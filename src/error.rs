use std::io;

use thiserror::Error as ThisError;

use crate::parser::types::SegmentType;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("unknown segment type 0x{tag:02x} at byte {offset}")]
    UnknownSegmentType { tag: u8, offset: usize },

    #[error("{segment:?} segment at byte {offset} declares {declared} payload bytes but only {available} remain")]
    TruncatedSegment {
        segment: SegmentType,
        offset: usize,
        declared: usize,
        available: usize,
    },

    #[error("{segment:?} segment at byte {offset} is malformed near field `{field}`")]
    MalformedSegment {
        segment: SegmentType,
        offset: usize,
        field: &'static str,
    },

    #[error("{segment:?} segment has invalid {field} value 0x{value:02x}")]
    InvalidField {
        segment: SegmentType,
        field: &'static str,
        value: u8,
    },

    #[error("RLE run starting at byte {offset} needs {needed} bytes, only {available} remain")]
    TruncatedRun {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("RLE decoder reached impossible discriminator {0:#04b}")]
    DecodeInvariantViolation(u8),

    #[error("text recognition failed: {0}")]
    Ocr(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}
