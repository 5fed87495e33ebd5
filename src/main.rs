#[cfg(not(target_env = "msvc"))]
use jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use log::{error, info, LevelFilter};

use pgs_srt::parser::types::Segment;
use pgs_srt::{Config, Pipeline, PngDumper, Result, RunLength};

#[derive(Debug, Parser)]
#[command(name = "pgs-srt", version, about)]
struct Args {
    /// More output; repeat for more detail.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Expand runs to exactly their count instead of count + 1.
    #[arg(long, global = true)]
    exact_runs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the segments of a SUP file.
    Dump { input: PathBuf },

    /// Write every subtitle bitmap as a PNG file.
    Png {
        input: PathBuf,
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Convert a SUP file to SRT.
    Srt {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long, default_value = pgs_srt::ocr::DEFAULT_LANGUAGE)]
        language: String,
        #[arg(long)]
        tessdata: Option<PathBuf>,
        #[arg(short = 'j', long)]
        workers: Option<usize>,
        /// Also write the bitmaps as PNG files here.
        #[arg(long)]
        dump_png: Option<PathBuf>,
    },

    /// List the OCR languages available.
    Languages {
        #[arg(long)]
        tessdata: Option<PathBuf>,
    },
}

fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    if let Err(err) = run(args) {
        error!("{}", err);
        eprintln!("error: {}", err);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let runs = if args.exact_runs { RunLength::Exact } else { RunLength::Inclusive };

    match args.command {
        Command::Dump { input } => dump(input),
        Command::Png { input, out_dir } => {
            let decoded = Pipeline::new()
                .run_length(runs)
                .observe(PngDumper::new(&out_dir)?)
                .decode(&input)?;
            info!("wrote {} bitmaps to {}", decoded.pixmaps.len(), out_dir.display());
            Ok(())
        }
        Command::Srt { input, output, language, tessdata, workers, dump_png } => {
            let mut config = Config::new(input);
            config.output = output;
            config.language = language;
            config.tessdata = tessdata;
            config.run_length = runs;
            config.dump_png = dump_png;
            if let Some(w) = workers {
                config.workers = w;
            }
            srt(config)
        }
        Command::Languages { tessdata } => languages(tessdata),
    }
}

fn dump(input: PathBuf) -> Result<()> {
    for (i, p) in pgs_srt::decode_file(&input)?.iter().enumerate() {
        println!(
            "{:>6} {:?} pts={:.3}ms dts={:.3}ms size={}",
            i,
            p.segment_type(),
            p.pts.millis(),
            p.dts.millis(),
            p.payload_size
        );
        match &p.segment {
            Segment::PresentationComposition(pcs) => println!(
                "       composition {} {:?} {}x{} objects={}",
                pcs.number, pcs.state, pcs.width, pcs.height, pcs.object_count
            ),
            Segment::WindowDefinition(wds) => {
                for w in &wds.windows {
                    println!("       window {} at {},{} {}x{}", w.id, w.x, w.y, w.width, w.height);
                }
            }
            Segment::PaletteDefinition(pds) => println!(
                "       palette {} v{} entries={}",
                pds.id,
                pds.version,
                pds.entries.len()
            ),
            Segment::ObjectDefinition(ods) => println!(
                "       object {} v{} {:?} {}x{} data={}",
                ods.id,
                ods.version,
                ods.sequence,
                ods.width,
                ods.height,
                ods.data.len()
            ),
            Segment::End => {}
        }
    }
    Ok(())
}

fn pipeline(config: &Config) -> Result<Pipeline> {
    let mut pipeline = Pipeline::new().run_length(config.run_length);
    if let Some(dir) = &config.dump_png {
        pipeline = pipeline.observe(PngDumper::new(dir)?);
    }
    Ok(pipeline)
}

#[cfg(feature = "tesseract")]
fn srt(config: Config) -> Result<()> {
    use pgs_srt::ocr::TesseractRecognizer;

    let decoded = pipeline(&config)?.decode(&config.input)?;
    let language = config.language.clone();
    let tessdata = config.tessdata.clone();
    let entries = pgs_srt::transcribe(decoded, config.workers, move || {
        TesseractRecognizer::new(tessdata.as_deref(), &language)
    })?;
    pgs_srt::srt::write_srt_file(config.output_path(), &entries)
}

#[cfg(not(feature = "tesseract"))]
fn srt(config: Config) -> Result<()> {
    // still decode so that format errors and --dump-png behave the same
    pipeline(&config)?.decode(&config.input)?;
    Err(no_ocr())
}

#[cfg(feature = "tesseract")]
fn languages(tessdata: Option<PathBuf>) -> Result<()> {
    use pgs_srt::ocr::{TesseractRecognizer, DEFAULT_LANGUAGE};
    use pgs_srt::TextRecognizer;

    let r = TesseractRecognizer::new(tessdata.as_deref(), DEFAULT_LANGUAGE)?;
    for lang in r.supported_languages() {
        println!("{}", lang);
    }
    Ok(())
}

#[cfg(not(feature = "tesseract"))]
fn languages(_tessdata: Option<PathBuf>) -> Result<()> {
    Err(no_ocr())
}

#[cfg(not(feature = "tesseract"))]
fn no_ocr() -> pgs_srt::Error {
    pgs_srt::Error::Ocr("built without text recognition; rebuild with `--features tesseract`".to_string())
}
