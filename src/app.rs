use crate::cli::{Cli, Commands};
use qpilot::config::Config;
use qpilot::engine;
use qpilot::engine::core::{BatchJob, JobStatus, TargetProfile};
use qpilot::engine::encoder::{BitrateProbe, FfmpegEncoder};
use qpilot::engine::error::is_cancelled;
use qpilot::engine::passes::PassReport;
use qpilot::engine::probe::FfprobeBitrate;
use qpilot::engine::{passes, planner, probe};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};

/// Set by the Ctrl-C handler; every encode loop polls it.
static CANCEL: AtomicBool = AtomicBool::new(false);

pub fn run(cli: Cli) {
    match cli.command {
        Commands::Run {
            path,
            target_mbps,
            tolerance,
            overwrite,
        } => handle_run(path, target_mbps, tolerance, overwrite),
        Commands::Scan {
            directory,
            overwrite,
        } => handle_scan(directory, overwrite),
        Commands::Plan { file, target_mbps } => handle_plan(file, target_mbps),
        Commands::Probe { file } => handle_probe(file),
        Commands::CheckFfmpeg => handle_check_ffmpeg(),
        Commands::InitConfig => handle_init_config(),
    }
}

fn install_cancel_handler() {
    let result = ctrlc::set_handler(|| {
        CANCEL.store(true, Ordering::Relaxed);
        eprintln!("\nStopping after the current ffmpeg step...");
    });
    if let Err(e) = result {
        eprintln!("Warning: could not install Ctrl-C handler: {}", e);
    }
}

fn handle_run(
    path: Option<PathBuf>,
    target_mbps: Option<f64>,
    tolerance: Option<f64>,
    overwrite: bool,
) {
    let config = Config::load().unwrap_or_default();

    let tolerance = tolerance.unwrap_or(config.defaults.tolerance);
    let target_mbps = target_mbps.or(config.defaults.target_mbps);
    if let Err(msg) = check_run_options(tolerance, target_mbps) {
        eprintln!("Error: {}", msg);
        process::exit(1);
    }

    let root = path
        .or_else(|| config.startup.default_directory.clone())
        .unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."))
        });
    let overwrite = overwrite || config.defaults.overwrite;

    let files = if root.is_file() {
        if !engine::is_video_file(&root) {
            eprintln!("Error: {} is not a recognized video file", root.display());
            process::exit(1);
        }
        vec![root.clone()]
    } else {
        match engine::scan(&root) {
            Ok(files) => files,
            Err(e) => {
                eprintln!("Error scanning directory: {:#}", e);
                process::exit(1);
            }
        }
    };

    let mut jobs = engine::build_batch(
        files,
        &config.defaults.output_suffix,
        &config.defaults.container,
        overwrite,
    );

    if jobs.is_empty() {
        println!("No video files found in {}", root.display());
        return;
    }

    install_cancel_handler();

    let total = jobs.len();
    let mut done = 0usize;
    let mut failed = 0usize;
    let mut skipped = 0usize;
    let mut cancelled = false;

    for (index, job) in jobs.iter_mut().enumerate() {
        if CANCEL.load(Ordering::Relaxed) {
            cancelled = true;
            break;
        }

        if job.status == JobStatus::Skipped {
            println!(
                "[{}/{}] Skipping {} (output exists)",
                index + 1,
                total,
                job.input_path.display()
            );
            skipped += 1;
            continue;
        }

        println!("[{}/{}] {}", index + 1, total, job.input_path.display());
        job.status = JobStatus::Running;

        match encode_job(job, &config, target_mbps, tolerance) {
            Ok(report) => {
                job.status = JobStatus::Done;
                done += 1;
                print_report(job, &report);
            }
            Err(e) if is_cancelled(&e) => {
                job.status = JobStatus::Failed;
                job.last_error = Some("Cancelled".to_string());
                cancelled = true;
                break;
            }
            Err(e) => {
                job.status = JobStatus::Failed;
                job.last_error = Some(format!("{:#}", e));
                failed += 1;
                eprintln!("Failed: {:#}", e);
            }
        }
    }

    if cancelled {
        println!("Cancelled; stopping batch.");
    }
    println!(
        "Batch finished: {} done, {} failed, {} skipped ({} total)",
        done, failed, skipped, total
    );
    let failures = failure_lines(&jobs);
    if !failures.is_empty() {
        eprintln!("Failures:");
        for line in &failures {
            eprintln!("  {}", line);
        }
    }
    if failed > 0 || cancelled {
        process::exit(1);
    }
}

/// Reject option values the search could never satisfy.
fn check_run_options(tolerance: f64, target_mbps: Option<f64>) -> Result<(), String> {
    if tolerance <= 0.0 || tolerance >= 1.0 {
        return Err(format!(
            "tolerance must be a fraction between 0 and 1, got {}",
            tolerance
        ));
    }
    if let Some(mbps) = target_mbps {
        if mbps <= 0.0 {
            return Err(format!("target bitrate must be positive, got {} Mbps", mbps));
        }
    }
    Ok(())
}

/// One line per failed job, read back from the error recorded on the job.
fn failure_lines(jobs: &[BatchJob]) -> Vec<String> {
    jobs.iter()
        .filter(|job| job.status == JobStatus::Failed)
        .map(|job| {
            let reason = job.last_error.as_deref().unwrap_or("unknown error");
            format!("{}: {}", job.input_path.display(), reason)
        })
        .collect()
}

/// Probe one input, pick its target and run the full search-plus-passes
/// pipeline. The temp directory is removed whatever the outcome.
fn encode_job(
    job: &BatchJob,
    config: &Config,
    target_mbps: Option<f64>,
    tolerance: f64,
) -> anyhow::Result<PassReport> {
    let asset = probe::probe_asset(&job.input_path)?;

    let profile = match target_mbps {
        Some(mbps) => TargetProfile::new((mbps * 1_000_000.0).round() as u64, tolerance),
        None => TargetProfile::for_height(asset.height, tolerance),
    };

    let encoder = FfmpegEncoder::new(
        job,
        asset.duration_s,
        &config.defaults.encoder,
        &config.defaults.extra_encode_args,
        &CANCEL,
    )?;

    let result = passes::run(
        &encoder,
        &FfprobeBitrate,
        &asset,
        &job.output_path,
        &profile,
        &CANCEL,
    );
    encoder.cleanup();
    result
}

fn print_report(job: &BatchJob, report: &PassReport) {
    println!(
        "  -> {} ({:.2} Mbps at quality {}, {} {}, {} search iterations)",
        job.output_path.display(),
        report.final_bitrate_bps as f64 / 1_000_000.0,
        report.final_quality,
        report.pass_count,
        if report.pass_count == 1 {
            "pass"
        } else {
            "passes"
        },
        report.search.len()
    );
    if !report.within_tolerance {
        println!("     (finished outside the tolerance band)");
    }
}

fn handle_scan(directory: Option<PathBuf>, overwrite: bool) {
    let config = Config::load().unwrap_or_default();
    let dir = directory.unwrap_or_else(|| {
        std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."))
    });
    println!("Scanning directory: {}", dir.display());

    match engine::scan(&dir) {
        Ok(files) => {
            let jobs = engine::build_batch(
                files,
                &config.defaults.output_suffix,
                &config.defaults.container,
                overwrite,
            );

            for job in &jobs {
                let marker = if job.status == JobStatus::Skipped {
                    " (skip: output exists)"
                } else {
                    ""
                };
                println!(
                    "- {} -> {}{}",
                    job.input_path.display(),
                    job.output_path.display(),
                    marker
                );
            }
            println!("Total jobs: {}", jobs.len());
        }
        Err(e) => {
            eprintln!("Error scanning directory: {:#}", e);
            process::exit(1);
        }
    }
}

fn handle_plan(file: PathBuf, target_mbps: Option<f64>) {
    let config = Config::load().unwrap_or_default();

    match probe::probe_asset(&file) {
        Ok(asset) => {
            let profile = match target_mbps.or(config.defaults.target_mbps) {
                Some(mbps) => TargetProfile::new(
                    (mbps * 1_000_000.0).round() as u64,
                    config.defaults.tolerance,
                ),
                None => TargetProfile::for_height(asset.height, config.defaults.tolerance),
            };
            let plan = planner::plan(asset.duration_s);

            println!("File: {}", asset.path.display());
            println!(
                "Source: {}p, {:.2} seconds",
                asset.height, asset.duration_s
            );
            println!(
                "Target: {:.2} Mbps, accepted band {:.2}-{:.2} Mbps (±{:.0}%)",
                profile.target_bps as f64 / 1_000_000.0,
                profile.lower_bps as f64 / 1_000_000.0,
                profile.upper_bps as f64 / 1_000_000.0,
                profile.tolerance * 100.0
            );
            println!(
                "Sample windows ({:.0}s each):",
                plan.sample_duration_s
            );
            for (i, window) in plan.windows.iter().enumerate() {
                println!("  {}. starts at {:.1}s", i + 1, window.start_s);
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn handle_probe(file: PathBuf) {
    match probe::probe_asset(&file) {
        Ok(asset) => {
            println!("Height: {}p", asset.height);
            println!("Duration: {:.2} seconds", asset.duration_s);
            match FfprobeBitrate.measure(&asset.path) {
                Ok(bitrate) => println!(
                    "Bitrate: {} bps ({:.2} Mbps)",
                    bitrate,
                    bitrate as f64 / 1_000_000.0
                ),
                Err(e) => println!("Bitrate: unavailable ({:#})", e),
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn handle_check_ffmpeg() {
    match engine::ffmpeg_version() {
        Ok(version) => println!("ffmpeg found: {}", version),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
    match engine::ffprobe_version() {
        Ok(version) => println!("ffprobe found: {}", version),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }

    let config = Config::load().unwrap_or_default();
    if engine::encoder_available(&config.defaults.encoder) {
        println!("encoder '{}' available", config.defaults.encoder);
    } else {
        eprintln!(
            "encoder '{}' not listed by ffmpeg -encoders",
            config.defaults.encoder
        );
        process::exit(1);
    }
}

fn handle_init_config() {
    match Config::load() {
        Ok(cfg) => {
            match Config::config_path() {
                Ok(path) => println!("Config loaded successfully from {}", path.display()),
                Err(e) => println!("Config loaded, but config path unknown: {:#}", e),
            }
            println!("{:#?}", cfg);
        }
        Err(e) => {
            println!("Config missing or invalid: {:#}", e);
            println!("Creating default config...");

            let cfg = Config::default();
            if let Err(err) = cfg.save() {
                eprintln!("Failed to save default config: {:#}", err);
                process::exit(1);
            } else {
                match Config::config_path() {
                    Ok(path) => println!("Default config saved to {}", path.display()),
                    Err(e) => println!("Default config saved (path unknown): {:#}", e),
                }
            }
        }
    }
}
