use std::io::Read;

use log::{debug, trace, warn};
use nom::error::{ErrorKind, VerboseError, VerboseErrorKind};
use nom::InputTake;

use crate::error::{Error, Result};
use crate::parser::parse::{header, payload};
use crate::parser::types::{Packet, SegmentType};

pub mod bytes;
mod parse;
pub mod renderer;
pub mod types;

/// Decodes a whole PGS stream into its packets, in stream order.
///
/// A trailing run of fewer than 13 bytes is treated as the end of the
/// stream. Any other problem aborts the parse and no packets are returned.
pub fn parse_stream(i: &[u8]) -> Result<Vec<Packet>> {
    let mut data = i;
    let mut packets = Vec::new();

    while !data.is_empty() {
        let offset = i.len() - data.len();
        if data.len() < Packet::HEADER_SIZE {
            warn!("ignoring {} trailing bytes at offset {}", data.len(), offset);
            break;
        }

        let (rest, pkt) = packet(data, offset)?;
        trace!("packet at {}: {:?}", offset, pkt);
        packets.push(pkt);
        data = rest;
    }

    debug!("parsed {} packets from {} bytes", packets.len(), i.len());
    Ok(packets)
}

/// Reads a source to its end and parses it with [`parse_stream`].
pub fn read_stream<R: Read>(mut source: R) -> Result<Vec<Packet>> {
    let mut buffer = Vec::new();
    source.read_to_end(&mut buffer)?;
    parse_stream(&buffer)
}

fn packet(data: &[u8], offset: usize) -> Result<(&[u8], Packet)> {
    let (after_header, raw) = header::<VerboseError<&[u8]>>(data).map_err(|_| {
        // only reachable with fewer than 13 bytes, which the caller rules out
        Error::TruncatedSegment {
            segment: SegmentType::End,
            offset,
            declared: Packet::HEADER_SIZE,
            available: data.len(),
        }
    })?;

    let kind = SegmentType::from_tag(raw.tag)
        .ok_or(Error::UnknownSegmentType { tag: raw.tag, offset })?;

    let size = match kind {
        SegmentType::End => 0,
        _ => usize::from(raw.size),
    };
    if after_header.len() < size {
        return Err(Error::TruncatedSegment {
            segment: kind,
            offset,
            declared: size,
            available: after_header.len(),
        });
    }

    let (rest, body) = after_header.take_split(size);
    let payload_offset = offset + Packet::HEADER_SIZE;
    let (_, segment) = payload::<VerboseError<&[u8]>>(kind, body)
        .map_err(|e| payload_error(kind, body, payload_offset, e))?;

    Ok((rest, Packet {
        magic: raw.magic,
        pts: raw.pts,
        dts: raw.dts,
        payload_size: raw.size,
        segment,
    }))
}

fn payload_error(
    kind: SegmentType,
    body: &[u8],
    payload_offset: usize,
    err: nom::Err<VerboseError<&[u8]>>,
) -> Error {
    let errors = match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => e.errors,
        nom::Err::Incomplete(_) => Vec::new(),
    };

    // innermost context names the field that failed
    let field = errors
        .iter()
        .find_map(|(_, k)| match k {
            VerboseErrorKind::Context(name) => Some(*name),
            _ => None,
        })
        .unwrap_or("payload");

    match errors.first() {
        Some((input, VerboseErrorKind::Nom(ErrorKind::MapOpt))) if !input.is_empty() => {
            Error::InvalidField { segment: kind, field, value: input[0] }
        }
        Some((input, _)) => Error::MalformedSegment {
            segment: kind,
            offset: payload_offset + (body.len() - input.len()),
            field,
        },
        None => Error::MalformedSegment { segment: kind, offset: payload_offset, field },
    }
}
