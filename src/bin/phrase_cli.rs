use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use phrase_matcher::analysis::{Classifier, FeatureExtractor, MatchResult};
use phrase_matcher::audio::resample::resample;
use phrase_matcher::audio::wav::read_wav;
use phrase_matcher::audio::list_input_devices;
use phrase_matcher::config::{AppConfig, CaptureMode};
use phrase_matcher::engine::{
    ChannelSink, ClassificationEvent, CommandSink, CpalBackend, FixtureBackend, LogSink,
    PipelineSession, ResultSink, SessionSummary, TriggerOutcome,
};
use phrase_matcher::templates::{load_directory, save_template, TemplateStore};
use serde::Serialize;

/// Exit code for a classification rejected by the distance threshold
const EXIT_NO_MATCH: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "phrase_cli",
    about = "Recognize spoken phrases by matching them against recorded templates"
)]
struct Cli {
    /// JSON configuration file (defaults are used when absent)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Template directory with one subdirectory per label
    #[arg(long, global = true)]
    templates: Option<PathBuf>,
    /// Reject matches whose normalized distance exceeds this value
    #[arg(long, global = true)]
    threshold: Option<f32>,
    /// Sakoe-Chiba band radius in frames
    #[arg(long, global = true)]
    band_radius: Option<usize>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture from the microphone and classify phrases
    Listen {
        /// triggered (Enter starts a capture) or continuous
        #[arg(long)]
        mode: Option<CaptureMode>,
        /// Input device index from `devices`
        #[arg(long)]
        device: Option<usize>,
    },
    /// Classify a WAV file and print a JSON report
    Classify {
        #[arg(long)]
        input: PathBuf,
    },
    /// Store a WAV recording as a pre-computed template
    Enroll {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        label: String,
        /// Defaults to <templates>/<label>/<input stem>.json
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run the live pipeline over a WAV file and print one JSON event per line
    Simulate {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        mode: Option<CaptureMode>,
        /// Pace playback at the file's real duration (continuous mode)
        #[arg(long)]
        realtime: bool,
    },
    /// List audio input devices
    Devices,
}

fn main() -> ExitCode {
    phrase_matcher::init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = cli
        .config
        .as_deref()
        .map(AppConfig::load_from_file)
        .unwrap_or_default();
    if let Some(dir) = cli.templates {
        config.templates.directory = dir;
    }
    if cli.threshold.is_some() {
        config.matching.threshold = cli.threshold;
    }
    if cli.band_radius.is_some() {
        config.matching.band_radius = cli.band_radius;
    }

    match cli.command {
        Commands::Listen { mode, device } => {
            if let Some(mode) = mode {
                config.capture.mode = mode;
            }
            if device.is_some() {
                config.audio.device_index = device;
            }
            run_listen(config)
        }
        Commands::Classify { input } => run_classify(&config, &input),
        Commands::Enroll {
            input,
            label,
            output,
        } => run_enroll(&config, &input, &label, output),
        Commands::Simulate {
            input,
            mode,
            realtime,
        } => {
            if let Some(mode) = mode {
                config.capture.mode = mode;
            }
            run_simulate(config, &input, realtime)
        }
        Commands::Devices => run_devices(),
    }
}

fn build_extractor(config: &AppConfig) -> Result<FeatureExtractor> {
    config.validate().map_err(|reason| anyhow!("invalid configuration: {reason}"))?;
    FeatureExtractor::new(config.audio.sample_rate, config.features.clone())
        .context("building feature extractor")
}

fn load_store(config: &AppConfig, extractor: &FeatureExtractor) -> Result<TemplateStore> {
    let dir = &config.templates.directory;
    load_directory(dir, extractor).with_context(|| format!("loading templates from {}", dir.display()))
}

/// Decode a WAV file and bring it to the extractor's rate
fn load_query(path: &Path, extractor: &FeatureExtractor) -> Result<Vec<f32>> {
    let (samples, rate) = read_wav(path).with_context(|| format!("reading {}", path.display()))?;
    resample(&samples, rate, extractor.sample_rate())
        .with_context(|| format!("resampling {} from {} Hz", path.display(), rate))
}

fn run_listen(config: AppConfig) -> Result<ExitCode> {
    let extractor = build_extractor(&config)?;
    let store = load_store(&config, &extractor)?;
    let mode = config.capture.mode;
    let backend = CpalBackend::new(&config.audio);
    let commands = config.actions.commands.clone();

    let session = PipelineSession::builder(config, Arc::new(store), Arc::new(extractor))
        .sink(Box::new(LogSink))
        .sink(Box::new(JsonLinesSink))
        .sink(Box::new(CommandSink::new(commands)))
        .start(Box::new(backend))
        .context("starting audio capture")?;

    match mode {
        CaptureMode::Triggered => {
            eprintln!("Press Enter to capture a phrase, 'q' + Enter to quit.");
        }
        CaptureMode::Continuous => eprintln!("Listening continuously, Enter to quit."),
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        if mode == CaptureMode::Continuous || line.trim().eq_ignore_ascii_case("q") {
            break;
        }
        match session.on_trigger() {
            TriggerOutcome::Accepted => eprintln!("Recording..."),
            TriggerOutcome::Busy(state) => eprintln!("Busy ({state:?}), trigger ignored"),
            other => eprintln!("Trigger not accepted: {other:?}"),
        }
    }

    let summary = session.shutdown().context("stopping audio capture")?;
    print_summary(&summary)?;
    Ok(ExitCode::SUCCESS)
}

#[derive(Serialize)]
struct ClassifyReport<'a> {
    input: &'a Path,
    sample_rate: u32,
    frames: usize,
    label: &'a str,
    distance: f32,
    accepted: bool,
    threshold: Option<f32>,
    ranking: &'a [MatchResult],
}

fn run_classify(config: &AppConfig, input: &Path) -> Result<ExitCode> {
    let extractor = build_extractor(config)?;
    let store = load_store(config, &extractor)?;
    let samples = load_query(input, &extractor)?;
    let query = extractor
        .extract(&samples, extractor.sample_rate())
        .with_context(|| format!("extracting features from {}", input.display()))?;

    let classifier = Classifier::from_config(&config.matching);
    let ranking = classifier.rank(&query, &store)?;
    let nearest = ranking
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("no templates to rank against"))?;
    let decision = classifier.decide(nearest);
    let best = decision.result();

    let report = ClassifyReport {
        input,
        sample_rate: extractor.sample_rate(),
        frames: query.len(),
        label: &best.label,
        distance: best.distance,
        accepted: decision.is_accepted(),
        threshold: classifier.threshold(),
        ranking: &ranking,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if decision.is_accepted() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_NO_MATCH))
    }
}

fn run_enroll(
    config: &AppConfig,
    input: &Path,
    label: &str,
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    if label.is_empty() || label.contains(['/', '\\']) {
        bail!("label '{label}' cannot be used as a directory name");
    }
    let extractor = build_extractor(config)?;
    let samples = load_query(input, &extractor)?;
    let features = extractor
        .extract(&samples, extractor.sample_rate())
        .with_context(|| format!("extracting features from {}", input.display()))?;

    let output = match output {
        Some(path) => path,
        None => {
            let stem = input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("template");
            config
                .templates
                .directory
                .join(label)
                .join(format!("{stem}.json"))
        }
    };
    save_template(&output, label, &features, &extractor)?;
    eprintln!(
        "Enrolled '{}' ({} frames) -> {}",
        label,
        features.len(),
        output.display()
    );
    Ok(ExitCode::SUCCESS)
}

fn run_simulate(config: AppConfig, input: &Path, realtime: bool) -> Result<ExitCode> {
    let extractor = build_extractor(&config)?;
    let store = load_store(&config, &extractor)?;
    let (samples, rate) = read_wav(input).with_context(|| format!("reading {}", input.display()))?;

    let mode = config.capture.mode;
    let capture_len = config.capture.capture_samples(rate);
    let backend = match mode {
        CaptureMode::Continuous => FixtureBackend::with_playback(rate, samples.clone(), realtime),
        CaptureMode::Triggered => FixtureBackend::new(rate),
    };
    let feeder = backend.feeder();
    let (sink, events) = ChannelSink::pair();

    let session = PipelineSession::builder(config, Arc::new(store), Arc::new(extractor))
        .sink(Box::new(sink))
        .start(Box::new(backend))
        .context("starting simulated capture")?;

    let timeout = Duration::from_secs(60);
    match mode {
        CaptureMode::Triggered => {
            // One trigger per capture-length segment; the tail is padded with silence
            for segment in samples.chunks(capture_len.max(1)) {
                if session.on_trigger() != TriggerOutcome::Accepted {
                    bail!("simulated trigger was not accepted");
                }
                feeder.feed(segment)?;
                if segment.len() < capture_len {
                    feeder.feed(&vec![0.0; capture_len - segment.len()])?;
                }
                if !session.wait_until_idle(timeout) {
                    bail!("pipeline did not finish the capture in time");
                }
            }
        }
        CaptureMode::Continuous => {
            if !feeder.wait_for_playback(timeout) || !session.wait_until_idle(timeout) {
                bail!("pipeline did not drain the input in time");
            }
        }
    }

    let summary = session.shutdown().context("stopping simulated capture")?;
    for event in events.iter() {
        println!("{}", serde_json::to_string(&event)?);
    }
    print_summary(&summary)?;
    Ok(ExitCode::SUCCESS)
}

fn run_devices() -> Result<ExitCode> {
    let devices = list_input_devices()?;
    if devices.is_empty() {
        println!("No input devices found");
        return Ok(ExitCode::SUCCESS);
    }
    for device in devices {
        let rate = device
            .default_sample_rate
            .map(|r| format!("{r} Hz"))
            .unwrap_or_else(|| "unknown rate".to_string());
        let marker = if device.is_default { " (default)" } else { "" };
        println!("{}: {} [{}]{}", device.index, device.name, rate, marker);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_summary(summary: &SessionSummary) -> Result<()> {
    eprintln!(
        "Session: {} block(s) processed, {} dropped, {} classification(s), {} without result",
        summary.blocks_processed,
        summary.blocks_dropped,
        summary.telemetry.classifications,
        summary.telemetry.no_results
    );
    tracing::debug!("{}", serde_json::to_string(summary)?);
    Ok(())
}

/// Prints each event as one JSON line on stdout.
struct JsonLinesSink;

impl ResultSink for JsonLinesSink {
    fn deliver(&mut self, event: &ClassificationEvent) {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(err) => tracing::warn!("[Result] Failed to serialize event: {}", err),
        }
    }
}
