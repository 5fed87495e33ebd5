//! Text recognition of decoded bitmaps.

use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use threadpool::ThreadPool;

use crate::error::{Error, Result};
use crate::parser::renderer::Pixmap;

pub const DEFAULT_LANGUAGE: &str = "eng";

pub trait TextRecognizer {
    /// Returns the recognized lines, top to bottom. May be empty.
    fn recognize(&mut self, pixmap: &Pixmap) -> Result<Vec<String>>;

    fn supported_languages(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Splits raw recognizer output into trimmed, non-empty lines.
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

pub fn default_workers() -> usize {
    num_cpus::get()
}

/// Recognizes every pixmap on a pool of `workers` threads.
///
/// Each worker builds one recognizer through `factory` and keeps it for all
/// the pixmaps it pulls, so recognizers do not have to be `Send`. Results
/// come back in the order of `pixmaps`; the first failure is returned.
pub fn recognize_all<F, R>(pixmaps: Vec<Pixmap>, workers: usize, factory: F) -> Result<Vec<Vec<String>>>
where
    F: Fn() -> Result<R> + Send + Sync + 'static,
    R: TextRecognizer,
{
    let total = pixmaps.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    let workers = workers.max(1).min(total);
    let pool = ThreadPool::new(workers);
    let factory = Arc::new(factory);
    let queue = Arc::new(Mutex::new(pixmaps.into_iter().enumerate()));
    let (tx, rx) = channel::<Result<(usize, Vec<String>)>>();

    for worker in 0..workers {
        let tx = tx.clone();
        let factory = Arc::clone(&factory);
        let queue = Arc::clone(&queue);
        pool.execute(move || {
            let mut recognizer = match factory() {
                Ok(r) => r,
                Err(e) => {
                    // receiver only hangs up after an earlier failure
                    let _ = tx.send(Err(e));
                    return;
                }
            };
            debug!("recognition worker {} started", worker);

            loop {
                let next = match queue.lock() {
                    Ok(mut items) => items.next(),
                    Err(_) => break,
                };
                let (index, pixmap) = match next {
                    Some(item) => item,
                    None => break,
                };
                let res = recognizer.recognize(&pixmap).map(|lines| (index, lines));
                let failed = res.is_err();
                if tx.send(res).is_err() || failed {
                    break;
                }
            }
        });
    }
    drop(tx);

    let mut out: Vec<Option<Vec<String>>> = vec![None; total];
    for res in rx.iter() {
        let (index, lines) = res?;
        debug!("recognized subtitle {}: {:?}", index, lines);
        out[index] = Some(lines);
    }

    out.into_iter()
        .enumerate()
        .map(|(index, lines)| {
            lines.ok_or_else(|| {
                warn!("subtitle {} was never recognized", index);
                Error::Ocr(format!("recognition of subtitle {} did not complete", index))
            })
        })
        .collect()
}

#[cfg(feature = "tesseract")]
pub use self::tesseract::TesseractRecognizer;

#[cfg(feature = "tesseract")]
mod tesseract {
    use std::fs;
    use std::path::{Path, PathBuf};

    use image::{DynamicImage, ImageOutputFormat};
    use leptess::LepTess;

    use super::{split_lines, TextRecognizer};
    use crate::error::{Error, Result};
    use crate::parser::renderer::Pixmap;

    pub struct TesseractRecognizer {
        api: LepTess,
        data_path: Option<PathBuf>,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<&Path>, language: &str) -> Result<TesseractRecognizer> {
            let path_str = data_path.and_then(Path::to_str);
            let api = LepTess::new(path_str, language)
                .map_err(|e| Error::Ocr(format!("cannot load language {:?}: {:?}", language, e)))?;
            Ok(TesseractRecognizer { api, data_path: data_path.map(Path::to_path_buf) })
        }
    }

    impl TextRecognizer for TesseractRecognizer {
        fn recognize(&mut self, pixmap: &Pixmap) -> Result<Vec<String>> {
            let mut png = Vec::new();
            DynamicImage::ImageRgba8(pixmap.to_rgba_image()).write_to(&mut png, ImageOutputFormat::Png)?;

            self.api
                .set_image_from_mem(&png)
                .map_err(|e| Error::Ocr(format!("cannot hand bitmap to tesseract: {:?}", e)))?;
            let text = self
                .api
                .get_utf8_text()
                .map_err(|e| Error::Ocr(format!("tesseract returned invalid UTF-8: {:?}", e)))?;

            Ok(split_lines(&text))
        }

        fn supported_languages(&self) -> Vec<String> {
            let dir = match &self.data_path {
                Some(p) => p.clone(),
                None => match std::env::var_os("TESSDATA_PREFIX") {
                    Some(p) => PathBuf::from(p),
                    None => return Vec::new(),
                },
            };

            let mut langs: Vec<String> = fs::read_dir(dir)
                .into_iter()
                .flatten()
                .filter_map(|e| e.ok())
                .filter_map(|e| {
                    let name = e.file_name().into_string().ok()?;
                    name.strip_suffix(".traineddata").map(String::from)
                })
                .collect();
            langs.sort();
            langs
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct WidthReader;

    impl TextRecognizer for WidthReader {
        fn recognize(&mut self, pixmap: &Pixmap) -> Result<Vec<String>> {
            Ok(vec![format!("{}x{}", pixmap.width, pixmap.height)])
        }
    }

    struct Failing;

    impl TextRecognizer for Failing {
        fn recognize(&mut self, _: &Pixmap) -> Result<Vec<String>> {
            Err(Error::Ocr("no text".into()))
        }
    }

    fn pixmap(width: usize) -> Pixmap {
        Pixmap { width, height: 1, buffer: vec![0xFF; 4 * width] }
    }

    #[test]
    fn splits_and_trims_lines() {
        assert_eq!(split_lines("  Hello \n\n world\n"), vec!["Hello", "world"]);
        assert!(split_lines("\n \n").is_empty());
    }

    #[test]
    fn results_keep_input_order() {
        let pixmaps: Vec<_> = (1..=20).map(pixmap).collect();
        let texts = recognize_all(pixmaps, 4, || Ok(WidthReader)).unwrap();
        assert_eq!(texts.len(), 20);
        for (i, lines) in texts.iter().enumerate() {
            assert_eq!(lines, &vec![format!("{}x1", i + 1)]);
        }
    }

    #[test]
    fn no_pixmaps_no_work() {
        let texts = recognize_all(Vec::new(), 2, || Ok(WidthReader)).unwrap();
        assert!(texts.is_empty());
    }

    #[test]
    fn failure_is_propagated() {
        let res = recognize_all(vec![pixmap(1), pixmap(2)], 2, || Ok(Failing));
        assert!(matches!(res, Err(Error::Ocr(_))));
    }

    #[test]
    fn factory_failure_is_propagated() {
        let res = recognize_all(vec![pixmap(1)], 1, || -> Result<WidthReader> {
            Err(Error::Ocr("missing language".into()))
        });
        assert!(matches!(res, Err(Error::Ocr(_))));
    }

    #[test]
    fn one_recognizer_per_worker() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let pixmaps: Vec<_> = (1..=100).map(pixmap).collect();

        let texts = recognize_all(pixmaps, 2, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(WidthReader)
        })
        .unwrap();

        assert_eq!(texts.len(), 100);
        assert_eq!(texts[99], vec!["100x1".to_string()]);
        let built = built.load(Ordering::SeqCst);
        assert!(built >= 1 && built <= 2, "built {} recognizers", built);
    }

    #[test]
    fn no_more_workers_than_pixmaps() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);

        recognize_all(vec![pixmap(1)], 8, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(WidthReader)
        })
        .unwrap();

        assert_eq!(built.load(Ordering::SeqCst), 1);
    }
}
