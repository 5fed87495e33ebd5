use std::fs::{self, File};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::Result;
use crate::ocr::{recognize_all, TextRecognizer};
use crate::parser::read_stream;
use crate::parser::renderer::{decode_with, Pixmap, RunLength};
use crate::parser::types::{Packet, Segment};
use crate::srt::{build_entries, SubtitleEntry};

/// When one subtitle is on screen, in milliseconds.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Interval {
    pub start_ms: f64,
    pub end_ms: f64,
}

impl Interval {
    pub fn duration_ms(&self) -> f64 {
        self.end_ms - self.start_ms
    }
}

/// Reads and parses a whole SUP file.
pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<Vec<Packet>> {
    let path = path.as_ref();
    let packets = read_stream(File::open(path)?)?;
    info!("decoded {} segments from {}", packets.len(), path.display());
    Ok(packets)
}

/// Decodes every object definition, in stream order.
pub fn build_pixmaps(packets: &[Packet]) -> Result<Vec<Pixmap>> {
    build_pixmaps_with(packets, RunLength::default())
}

pub fn build_pixmaps_with(packets: &[Packet], runs: RunLength) -> Result<Vec<Pixmap>> {
    packets
        .iter()
        .filter_map(|p| match &p.segment {
            Segment::ObjectDefinition(ods) => Some(ods),
            _ => None,
        })
        .map(|ods| decode_with(&ods.data, runs))
        .collect()
}

/// The number of the presentation composition each object definition
/// belongs to, in the same order as [`build_pixmaps`]. Objects seen before
/// any composition have none.
pub fn object_compositions(packets: &[Packet]) -> Vec<Option<u16>> {
    let mut current = None;
    let mut out = Vec::new();
    for p in packets {
        match &p.segment {
            Segment::PresentationComposition(pcs) => current = Some(pcs.number),
            Segment::ObjectDefinition(_) => out.push(current),
            _ => {}
        }
    }
    out
}

/// Runs text recognition over the decoded bitmaps and times the result.
pub fn transcribe<F, R>(decoded: Decoded, workers: usize, factory: F) -> Result<Vec<SubtitleEntry>>
where
    F: Fn() -> Result<R> + Send + Sync + 'static,
    R: TextRecognizer,
{
    let texts = recognize_all(decoded.pixmaps, workers, factory)?;
    Ok(build_entries(&decoded.intervals, texts))
}

/// Pairs window definitions as (show, hide) markers.
///
/// Assumes the stream strictly alternates; a window definition left without
/// a partner at the end is dropped.
pub fn pair_subtitle_intervals(packets: &[Packet]) -> Vec<Interval> {
    let mut intervals = Vec::new();
    let mut start = None;

    for p in packets {
        if let Segment::WindowDefinition(_) = p.segment {
            match start.take() {
                None => start = Some(p.pts.millis()),
                Some(start_ms) => intervals.push(Interval { start_ms, end_ms: p.pts.millis() }),
            }
        }
    }

    if let Some(start_ms) = start {
        debug!("unmatched window definition at {} ms", start_ms);
    }

    intervals
}

/// Instrumentation hooks called while a file is decoded.
pub trait Observer {
    fn on_packet(&mut self, _index: usize, _packet: &Packet) {}

    /// `composition` is the number of the presentation composition that
    /// preceded the object, if any.
    fn on_pixmap(&mut self, _index: usize, _composition: Option<u16>, _pixmap: &Pixmap) -> Result<()> {
        Ok(())
    }
}

/// Writes each decoded bitmap to `<dir>/<composition>-<index>.png`, or
/// `<dir>/<index>.png` when no composition preceded it.
pub struct PngDumper {
    dir: PathBuf,
}

impl PngDumper {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Result<PngDumper> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(PngDumper { dir })
    }
}

impl Observer for PngDumper {
    fn on_pixmap(&mut self, index: usize, composition: Option<u16>, pixmap: &Pixmap) -> Result<()> {
        let name = match composition {
            Some(n) => format!("{}-{}.png", n, index),
            None => format!("{}.png", index),
        };
        let path = self.dir.join(name);
        debug!("writing {}x{} bitmap to {}", pixmap.width, pixmap.height, path.display());
        pixmap.to_rgba_image().save(&path)?;
        Ok(())
    }
}

/// Everything the decoder extracts from one file.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub packets: Vec<Packet>,
    pub pixmaps: Vec<Pixmap>,
    pub intervals: Vec<Interval>,
}

#[derive(Default)]
pub struct Pipeline {
    runs: RunLength,
    observers: Vec<Box<dyn Observer>>,
}

impl Pipeline {
    pub fn new() -> Pipeline {
        Pipeline::default()
    }

    pub fn run_length(mut self, runs: RunLength) -> Pipeline {
        self.runs = runs;
        self
    }

    pub fn observe<O: Observer + 'static>(mut self, observer: O) -> Pipeline {
        self.observers.push(Box::new(observer));
        self
    }

    pub fn decode<P: AsRef<Path>>(&mut self, path: P) -> Result<Decoded> {
        let packets = decode_file(path)?;
        self.decode_packets(packets)
    }

    pub fn decode_packets(&mut self, packets: Vec<Packet>) -> Result<Decoded> {
        for (i, p) in packets.iter().enumerate() {
            for o in self.observers.iter_mut() {
                o.on_packet(i, p);
            }
        }

        let pixmaps = build_pixmaps_with(&packets, self.runs)?;
        if !self.observers.is_empty() {
            let compositions = object_compositions(&packets);
            for (i, (pm, n)) in pixmaps.iter().zip(compositions).enumerate() {
                for o in self.observers.iter_mut() {
                    o.on_pixmap(i, n, pm)?;
                }
            }
        }

        let intervals = pair_subtitle_intervals(&packets);
        info!("{} bitmaps, {} display intervals", pixmaps.len(), intervals.len());

        Ok(Decoded { packets, pixmaps, intervals })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::*;

    fn packet(pts: u32, segment: Segment) -> Packet {
        Packet { magic: Packet::MAGIC, pts: Timestamp(pts), dts: Timestamp(0), payload_size: 0, segment }
    }

    fn wds(pts: u32) -> Packet {
        packet(pts, Segment::WindowDefinition(WindowDefinitionSet { count: 0, windows: vec![] }))
    }

    fn pcs(number: u16) -> Packet {
        packet(0, Segment::PresentationComposition(PresentationComposition {
            width: 1920,
            height: 1080,
            framerate: 0x10,
            number,
            state: CompositionState::EpochStart,
            palette_update: false,
            palette_id: 0,
            object_count: 0,
            objects: vec![],
        }))
    }

    fn ods(id: u16, data: &[u8]) -> Packet {
        packet(0, Segment::ObjectDefinition(ObjectDefinition {
            id,
            version: 0,
            sequence: SequenceFlag::FirstAndLast,
            data_length: data.len() as u32 + 4,
            width: 0,
            height: 0,
            data: data.to_vec(),
        }))
    }

    #[test]
    fn pairs_two_windows() {
        let intervals = pair_subtitle_intervals(&[wds(1000), packet(1000, Segment::End), wds(2000)]);
        assert_eq!(intervals, vec![Interval { start_ms: 1000.0 / 90.0, end_ms: 2000.0 / 90.0 }]);
    }

    #[test]
    fn dangling_start_is_dropped() {
        let intervals = pair_subtitle_intervals(&[wds(90), wds(180), wds(270)]);
        assert_eq!(intervals, vec![Interval { start_ms: 1.0, end_ms: 2.0 }]);
    }

    #[test]
    fn no_windows_no_intervals() {
        assert!(pair_subtitle_intervals(&[packet(0, Segment::End)]).is_empty());
    }

    #[test]
    fn pixmaps_follow_object_order() {
        let packets = vec![
            ods(1, &[0x01, 0x00, 0x00]),
            wds(0),
            ods(1, &[0x02, 0x02, 0x00, 0x00]),
            ods(0, &[0x03, 0x00, 0x00]),
        ];
        let pixmaps = build_pixmaps(&packets).unwrap();
        let widths: Vec<_> = pixmaps.iter().map(|p| p.width).collect();
        let first_colors: Vec<_> = pixmaps.iter().map(|p| p.buffer[0]).collect();
        assert_eq!(widths, vec![1, 2, 1]);
        assert_eq!(first_colors, vec![1, 2, 3]);
    }

    #[test]
    fn decode_error_propagates() {
        assert!(build_pixmaps(&[ods(0, &[0x00, 0xC1, 0x00])]).is_err());
    }

    #[derive(Default)]
    struct Counter {
        packets: usize,
        pixmaps: Vec<(usize, Option<u16>)>,
    }

    impl Observer for std::rc::Rc<std::cell::RefCell<Counter>> {
        fn on_packet(&mut self, _: usize, _: &Packet) {
            self.borrow_mut().packets += 1;
        }

        fn on_pixmap(&mut self, index: usize, composition: Option<u16>, _: &Pixmap) -> Result<()> {
            self.borrow_mut().pixmaps.push((index, composition));
            Ok(())
        }
    }

    #[test]
    fn observers_see_every_packet_and_pixmap() {
        let counter = std::rc::Rc::new(std::cell::RefCell::new(Counter::default()));
        let mut pipeline = Pipeline::new().observe(counter.clone());
        let decoded = pipeline
            .decode_packets(vec![wds(0), ods(0, &[0x01, 0x00, 0x00]), ods(1, &[0x01, 0x00, 0x00]), wds(90)])
            .unwrap();

        assert_eq!(decoded.pixmaps.len(), 2);
        assert_eq!(decoded.intervals.len(), 1);
        assert_eq!(counter.borrow().packets, 4);
        assert_eq!(counter.borrow().pixmaps, vec![(0, None), (1, None)]);
    }

    #[test]
    fn pixmaps_carry_their_composition_number() {
        let counter = std::rc::Rc::new(std::cell::RefCell::new(Counter::default()));
        let mut pipeline = Pipeline::new().observe(counter.clone());
        pipeline
            .decode_packets(vec![
                ods(0, &[0x01, 0x00, 0x00]),
                pcs(7),
                ods(1, &[0x01, 0x00, 0x00]),
                ods(2, &[0x01, 0x00, 0x00]),
                pcs(9),
                wds(0),
                ods(3, &[0x01, 0x00, 0x00]),
            ])
            .unwrap();

        assert_eq!(counter.borrow().pixmaps, vec![(0, None), (1, Some(7)), (2, Some(7)), (3, Some(9))]);
    }

    #[test]
    fn exact_run_length_is_applied() {
        let mut pipeline = Pipeline::new().run_length(RunLength::Exact);
        let decoded = pipeline.decode_packets(vec![ods(0, &[0x00, 0x03, 0x00, 0x00])]).unwrap();
        assert_eq!(decoded.pixmaps[0].pixel_count(), 3);
    }
}
