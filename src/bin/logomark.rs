use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use logomark::{DecodeState, ExportOptions, ExportProgress, LogoStore, LogoVariant, RawImage};

#[derive(Parser, Debug)]
#[command(name = "logomark", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stamp the logo onto a batch of images and write one ZIP archive.
    Export(ExportArgs),
    /// Print the logo placement computed for the given dimensions as JSON.
    Plan(PlanArgs),
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Logo variant to stamp onto each image.
    #[arg(long, value_enum)]
    logo: LogoChoice,

    /// Directory holding `logo_light.png` / `logo_dark.png`.
    #[arg(long, default_value = "assets")]
    logo_dir: PathBuf,

    /// Output archive path.
    #[arg(long, default_value = logomark::ARCHIVE_FILE_NAME)]
    out: PathBuf,

    /// Images composited concurrently per join point.
    #[arg(long, default_value_t = 90)]
    chunk_size: usize,

    /// Worker thread cap (defaults to the rayon global heuristic).
    #[arg(long)]
    threads: Option<usize>,

    /// Print a JSON export report to stdout.
    #[arg(long)]
    report: bool,

    /// Source image files.
    #[arg(required = true)]
    images: Vec<PathBuf>,
}

#[derive(Parser, Debug)]
struct PlanArgs {
    #[arg(long)]
    image_width: u32,

    #[arg(long)]
    image_height: u32,

    #[arg(long)]
    logo_width: u32,

    #[arg(long)]
    logo_height: u32,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogoChoice {
    Light,
    Dark,
}

impl From<LogoChoice> for LogoVariant {
    fn from(choice: LogoChoice) -> Self {
        match choice {
            LogoChoice::Light => LogoVariant::Light,
            LogoChoice::Dark => LogoVariant::Dark,
        }
    }
}

#[derive(serde::Serialize)]
struct ExportReport {
    logo: LogoVariant,
    total_files: usize,
    decoded: usize,
    exported: usize,
    archive: String,
    decode_failures: Vec<DecodeFailure>,
}

#[derive(serde::Serialize)]
struct DecodeFailure {
    file: String,
    error: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Export(args) => cmd_export(args),
        Command::Plan(args) => cmd_plan(args),
    }
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let mut files = Vec::with_capacity(args.images.len());
    for path in &args.images {
        let bytes =
            std::fs::read(path).with_context(|| format!("read image '{}'", path.display()))?;
        files.push(RawImage {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            bytes,
        });
    }

    let total_files = files.len();
    let images = logomark::decode_batch(files);
    let mut decode_failures = Vec::new();
    for image in &images {
        if let DecodeState::Failed(reason) = &image.state {
            eprintln!("warning: skipping '{}': {reason}", image.name);
            decode_failures.push(DecodeFailure {
                file: image.name.clone(),
                error: reason.clone(),
            });
        }
    }

    let store = LogoStore::new(&args.logo_dir);
    let logo = store.load(args.logo.into())?;

    let opts = ExportOptions {
        chunk_size: args.chunk_size,
        threads: args.threads,
    };
    let progress = ExportProgress::new();

    let stop = Arc::new(AtomicBool::new(false));
    let printer = {
        let progress = progress.clone();
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut last = usize::MAX;
            while !stop.load(Ordering::Acquire) {
                if progress.is_loading() {
                    let done = progress.completed();
                    if done != last {
                        eprintln!("progress: {done}/{}", progress.total());
                        last = done;
                    }
                }
                thread::sleep(Duration::from_millis(100));
            }
        })
    };

    let result = logomark::export(&images, &logo, &opts, &progress);
    stop.store(true, Ordering::Release);
    let _ = printer.join();
    let archive = result?;

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&args.out, &archive)
        .with_context(|| format!("write archive '{}'", args.out.display()))?;

    if args.report {
        let report = ExportReport {
            logo: logo.variant,
            total_files,
            decoded: images.iter().filter(|i| i.is_ready()).count(),
            exported: progress.completed(),
            archive: args.out.display().to_string(),
            decode_failures,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_plan(args: PlanArgs) -> anyhow::Result<()> {
    let plan = logomark::plan_placement(
        args.image_width,
        args.image_height,
        args.logo_width,
        args.logo_height,
    )?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}
