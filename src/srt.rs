//! SRT-format subtitle output.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{TimeZone, Utc};
use log::{info, warn};

use crate::error::Result;
use crate::pipeline::Interval;

/// A single SRT subtitle.
#[derive(Debug, PartialEq, Clone)]
pub struct SubtitleEntry {
    /// Position in the output file, starting at 1.
    pub id: usize,
    pub start_ms: f64,
    pub end_ms: f64,
    pub lines: Vec<String>,
}

impl SubtitleEntry {
    pub fn to_srt(&self) -> String {
        let mut out = format!(
            "{}\n{} --> {}\n",
            self.id,
            format_timestamp(self.start_ms),
            format_timestamp(self.end_ms)
        );
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// Formats a millisecond offset from the Unix epoch as `HH:MM:SS,mmm` in UTC.
///
/// Fractions of a millisecond are dropped. Offsets of a day or more wrap
/// around, negative or unrepresentable ones clamp to zero.
pub fn format_timestamp(ms: f64) -> String {
    let millis = if ms.is_finite() && ms > 0.0 { ms.floor() as i64 } else { 0 };
    match Utc.timestamp_millis_opt(millis).single() {
        Some(t) => t.format("%H:%M:%S,%3f").to_string(),
        None => String::from("00:00:00,000"),
    }
}

/// Pairs intervals with recognized text by position and numbers them from 1.
pub fn build_entries(intervals: &[Interval], texts: Vec<Vec<String>>) -> Vec<SubtitleEntry> {
    if intervals.len() != texts.len() {
        warn!(
            "{} display intervals but {} bitmaps; keeping the first {}",
            intervals.len(),
            texts.len(),
            intervals.len().min(texts.len())
        );
    }

    intervals
        .iter()
        .zip(texts)
        .enumerate()
        .map(|(i, (interval, lines))| SubtitleEntry {
            id: i + 1,
            start_ms: interval.start_ms,
            end_ms: interval.end_ms,
            lines,
        })
        .collect()
}

/// Entries separated by blank lines.
pub fn render(entries: &[SubtitleEntry]) -> String {
    let subs: Vec<String> = entries.iter().map(SubtitleEntry::to_srt).collect();
    subs.join("\n")
}

pub fn write_srt<W: Write>(mut w: W, entries: &[SubtitleEntry]) -> Result<()> {
    w.write_all(render(entries).as_bytes())?;
    w.flush()?;
    Ok(())
}

pub fn write_srt_file<P: AsRef<Path>>(path: P, entries: &[SubtitleEntry]) -> Result<()> {
    let path = path.as_ref();
    write_srt(BufWriter::new(File::create(path)?), entries)?;
    info!("wrote {} subtitles to {}", entries.len(), path.display());
    Ok(())
}
