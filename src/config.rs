use std::path::PathBuf;

use crate::ocr::{default_workers, DEFAULT_LANGUAGE};
use crate::parser::renderer::RunLength;

/// Settings for one conversion run.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub input: PathBuf,
    /// Defaults to the input path with an `.srt` extension.
    pub output: Option<PathBuf>,
    pub language: String,
    /// Directory holding `*.traineddata`; the OCR engine's default when unset.
    pub tessdata: Option<PathBuf>,
    pub workers: usize,
    pub run_length: RunLength,
    /// Write every decoded bitmap here as PNG.
    pub dump_png: Option<PathBuf>,
}

impl Config {
    pub fn new<P: Into<PathBuf>>(input: P) -> Config {
        Config {
            input: input.into(),
            output: None,
            language: DEFAULT_LANGUAGE.to_string(),
            tessdata: None,
            workers: default_workers(),
            run_length: RunLength::default(),
            dump_png: None,
        }
    }

    pub fn output_path(&self) -> PathBuf {
        match &self.output {
            Some(p) => p.clone(),
            None => self.input.with_extension("srt"),
        }
    }
}
