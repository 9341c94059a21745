use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::select;

use framegrid_core::jobs::engine_factory::DefaultEngineFactory;
use framegrid_core::jobs::job_id::JobId;
use framegrid_core::jobs::job_runner::JobRunner;
use framegrid_core::jobs::progress::ProgressSnapshot;
use framegrid_core::jobs::source_stager::{SourceLocation, SourceStager};
use framegrid_core::pipeline::sheet_request::SheetRequest;
use framegrid_core::shared::constants::{
    DEFAULT_COLS, DEFAULT_ROWS, DEFAULT_SAMPLE_STEP, DEFAULT_SSIM_THRESHOLD,
    PROGRESS_POLL_INTERVAL_MS,
};
use framegrid_core::shared::region::Roi;

/// Tile the visually distinct frames of a video region onto PDF pages.
#[derive(Parser)]
#[command(name = "framegrid")]
struct Cli {
    /// Input video file or http(s) URL.
    input: String,

    /// Region of interest as x,y,width,height (default: whole frame).
    #[arg(long, value_delimiter = ',')]
    roi: Option<Vec<u32>>,

    /// Grid rows per page.
    #[arg(long, default_value_t = DEFAULT_ROWS)]
    rows: usize,

    /// Grid columns per page.
    #[arg(long, default_value_t = DEFAULT_COLS)]
    cols: usize,

    /// Examine every Nth frame (1 = every frame).
    #[arg(long, default_value_t = DEFAULT_SAMPLE_STEP)]
    sample_step: usize,

    /// Similarity above which a frame counts as a duplicate (-1.0 to 1.0).
    #[arg(long, default_value_t = DEFAULT_SSIM_THRESHOLD)]
    threshold: f64,

    /// Directory for the generated PDF.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Save a first-frame preview image into this directory.
    #[arg(long)]
    thumbnail_dir: Option<PathBuf>,

    /// Print progress snapshots as JSON lines on stdout.
    #[arg(long)]
    json: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let request = build_request(&cli)?;

    if let Some(dir) = &cli.thumbnail_dir {
        fs::create_dir_all(dir)?;
    }

    let factory = if cli.json {
        DefaultEngineFactory::new()
    } else {
        DefaultEngineFactory::with_stage_logging()
    };
    let runner = JobRunner::new(Arc::new(factory), SourceStager::new()?);

    let job = runner.accept(&SourceLocation::parse(&cli.input), cli.thumbnail_dir.as_deref())?;
    if let Some(thumb) = job.thumbnail() {
        log::info!("Preview saved to {}", thumb.display());
    }
    let id = runner.launch(job, request)?;

    let snapshot = watch(&runner, id, cli.json)?;

    if let Some(Err(_)) = runner.join(id) {
        return Err(format!("worker thread for job {id} panicked").into());
    }
    if snapshot.failed {
        let reason = snapshot.error.unwrap_or_else(|| "unknown error".to_string());
        return Err(reason.into());
    }

    let path = cli.out_dir.join(&snapshot.filename);
    if cli.json {
        println!("{}", serde_json::to_string(&snapshot)?);
    } else {
        eprintln!();
        println!("{}", path.display());
    }
    Ok(())
}

fn build_request(cli: &Cli) -> Result<SheetRequest, Box<dyn std::error::Error>> {
    let mut request = SheetRequest::new(&cli.out_dir);
    request.roi = match &cli.roi {
        Some(values) => Some(Roi::try_from(values.as_slice())?),
        None => None,
    };
    request.rows = cli.rows;
    request.cols = cli.cols;
    request.sample_step = cli.sample_step;
    request.threshold = cli.threshold;
    Ok(request)
}

/// Polls the job until its record turns terminal and returns the last snapshot.
fn watch(
    runner: &JobRunner,
    id: JobId,
    json: bool,
) -> Result<ProgressSnapshot, Box<dyn std::error::Error>> {
    let finished = runner.finished();
    let ticker = crossbeam_channel::tick(Duration::from_millis(PROGRESS_POLL_INTERVAL_MS));

    loop {
        select! {
            recv(finished) -> msg => {
                if msg? == id {
                    return runner
                        .snapshot(id)
                        .ok_or_else(|| format!("job {id} vanished").into());
                }
            }
            recv(ticker) -> _ => {
                let Some(snapshot) = runner.snapshot(id) else {
                    continue;
                };
                if json {
                    println!("{}", serde_json::to_string(&snapshot)?);
                } else {
                    report_progress(&snapshot);
                }
            }
        }
    }
}

fn report_progress(snapshot: &ProgressSnapshot) {
    eprint!("\r{}", progress_line(snapshot));
}

fn progress_line(snapshot: &ProgressSnapshot) -> String {
    if snapshot.total > 0 {
        let examined = snapshot.examined.min(snapshot.total);
        let pct = examined as f64 / snapshot.total as f64 * 100.0;
        format!("Progress: {examined}/{} frames ({pct:.0}%)", snapshot.total)
    } else {
        format!("Progress: {} frames", snapshot.examined)
    }
}
