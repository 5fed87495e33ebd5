use nom::{
    bytes::complete::take,
    combinator::{map, map_opt, rest},
    error::{context, ParseError},
    multi::count,
    number::complete::be_u8,
    sequence::tuple,
    IResult,
};

use crate::parser::bytes::{u16_from_bytes, u32_from_bytes};
use crate::parser::types::*;

fn be_u16_bytes<'a, E: ParseError<&'a [u8]>>(
    i: &'a [u8],
) -> IResult<&'a [u8], u16, E> {
    map(take(2usize), |b: &[u8]| u16_from_bytes(b[0], b[1]))(i)
}

fn be_u32_bytes<'a, E: ParseError<&'a [u8]>>(
    i: &'a [u8],
) -> IResult<&'a [u8], u32, E> {
    map(take(4usize), |b: &[u8]| u32_from_bytes(b[0], b[1], b[2], b[3]))(i)
}

// 24-bit lengths are read as a 32-bit value with a zero top byte
fn be_u24_bytes<'a, E: ParseError<&'a [u8]>>(
    i: &'a [u8],
) -> IResult<&'a [u8], u32, E> {
    map(take(3usize), |b: &[u8]| u32_from_bytes(0x00, b[0], b[1], b[2]))(i)
}

fn timestamp<'a, E: ParseError<&'a [u8]>>(
    i: &'a [u8],
) -> IResult<&'a [u8], Timestamp, E> {
    map(be_u32_bytes, Timestamp::from)(i)
}

/// The fixed 13 byte header, before the type tag has been validated.
#[derive(Debug, PartialEq, Clone, Copy)]
pub(crate) struct RawHeader {
    pub magic: [u8; 2],
    pub pts: Timestamp,
    pub dts: Timestamp,
    pub tag: u8,
    pub size: u16,
}

pub(crate) fn header<'a, E: ParseError<&'a [u8]>>(
    i: &'a [u8],
) -> IResult<&'a [u8], RawHeader, E> {
    context("header", map(tuple((
        context("magic", take(2usize)),
        context("pts", timestamp),
        context("dts", timestamp),
        context("segment_type", be_u8),
        context("payload_size", be_u16_bytes),
    )), |(magic, pts, dts, tag, size): (&[u8], _, _, _, _)| {
        RawHeader { magic: [magic[0], magic[1]], pts, dts, tag, size }
    }))(i)
}

/// Decodes a complete payload whose type is already known.
pub(crate) fn payload<'a, E: ParseError<&'a [u8]>>(
    kind: SegmentType,
    i: &'a [u8],
) -> IResult<&'a [u8], Segment, E> {
    match kind {
        SegmentType::PaletteDefinition => context("pds", seg_pds)(i),
        SegmentType::ObjectDefinition => context("ods", seg_ods)(i),
        SegmentType::PresentationComposition => context("pcs", seg_pcs)(i),
        SegmentType::WindowDefinition => context("wds", seg_wds)(i),
        SegmentType::End => Ok((i, Segment::End)),
    }
}

fn seg_pds<'a, E: ParseError<&'a [u8]>>(
    i: &'a [u8],
) -> IResult<&'a [u8], Segment, E> {
    let (rest, (id, version)) = tuple((
        context("palette_id", be_u8),
        context("palette_version", be_u8),
    ))(i)?;

    // trailing bytes that do not fill a whole entry are ignored
    let (rest, entries) = count(
        context("palette_entry", seg_pds_entry),
        rest.len() / 5,
    )(rest)?;

    Ok((rest, Segment::PaletteDefinition(PaletteDefinition { id, version, entries })))
}

fn seg_pds_entry<'a, E: ParseError<&'a [u8]>>(
    i: &'a [u8],
) -> IResult<&'a [u8], PaletteEntry, E> {
    map(tuple((
        context("id", be_u8),
        context("y", be_u8),
        context("Cr", be_u8),
        context("Cb", be_u8),
        context("a", be_u8),
    )), |(id, y, cr, cb, a)| {
        PaletteEntry { id, color: YCrCbAColor { y, cr, cb, a } }
    })(i)
}

fn seg_ods<'a, E: ParseError<&'a [u8]>>(
    i: &'a [u8],
) -> IResult<&'a [u8], Segment, E> {
    map(tuple((
        context("object_id", be_u16_bytes),
        context("object_version", be_u8),
        context("sequence_flag", map_opt(be_u8, SequenceFlag::from_byte)),
        context("object_data_length", be_u24_bytes),
        context("width", be_u16_bytes),
        context("height", be_u16_bytes),
        context("object_data", rest),
    )), |(id, version, sequence, data_length, width, height, data): (_, _, _, _, _, _, &[u8])| {
        Segment::ObjectDefinition(ObjectDefinition {
            id,
            version,
            sequence,
            data_length,
            width,
            height,
            data: data.to_vec(),
        })
    })(i)
}

fn seg_pcs<'a, E: ParseError<&'a [u8]>>(
    i: &'a [u8],
) -> IResult<&'a [u8], Segment, E> {
    let (rest, (width, height, framerate, number, state, palette_update, palette_id, object_count)) =
        tuple((
            context("width", be_u16_bytes),
            context("height", be_u16_bytes),
            context("framerate", be_u8),
            context("composition_number", be_u16_bytes),
            context("composition_state", map_opt(be_u8, CompositionState::from_byte)),
            context("palette_update_flag", map(be_u8, |b| b == 0x80)),
            context("palette_id", be_u8),
            context("object_count", be_u8),
        ))(i)?;

    let (rest, objects) = count(
        context("composition_object", composition_object),
        usize::from(object_count),
    )(rest)?;

    Ok((rest, Segment::PresentationComposition(PresentationComposition {
        width,
        height,
        framerate,
        number,
        state,
        palette_update,
        palette_id,
        object_count,
        objects,
    })))
}

fn composition_object<'a, E: ParseError<&'a [u8]>>(
    i: &'a [u8],
) -> IResult<&'a [u8], CompositionObject, E> {
    let (i1, (id, window_id, is_crop, x, y)) = tuple((
        context("object_id", be_u16_bytes),
        context("window_id", be_u8),
        context("object_cropped_flag", map(be_u8, |b| b == 0x40)),
        context("x", be_u16_bytes),
        context("y", be_u16_bytes),
    ))(i)?;

    let (i2, crop) = if is_crop {
        map(tuple((
            context("crop_x", be_u16_bytes),
            context("crop_y", be_u16_bytes),
            context("crop_w", be_u16_bytes),
            context("crop_h", be_u16_bytes),
        )), |(x, y, width, height)| {
            CompositionObjectCrop::Cropped { x, y, width, height }
        })(i1)
    } else {
        Ok((i1, CompositionObjectCrop::NotCropped))
    }?;

    Ok((i2, CompositionObject { id, window_id, x, y, crop }))
}

fn seg_wds<'a, E: ParseError<&'a [u8]>>(
    i: &'a [u8],
) -> IResult<&'a [u8], Segment, E> {
    let (rest, n_windows) = context("window_count", be_u8)(i)?;
    map(
        count(context("window", seg_wds_win), usize::from(n_windows)),
        move |windows| Segment::WindowDefinition(WindowDefinitionSet { count: n_windows, windows }),
    )(rest)
}

fn seg_wds_win<'a, E: ParseError<&'a [u8]>>(
    i: &'a [u8],
) -> IResult<&'a [u8], WindowDefinition, E> {
    map(tuple((
        context("id", be_u8),
        context("x", be_u16_bytes),
        context("y", be_u16_bytes),
        context("width", be_u16_bytes),
        context("height", be_u16_bytes),
    )), |(id, x, y, width, height)| {
        WindowDefinition { id, x, y, width, height }
    })(i)
}
