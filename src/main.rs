use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dsonde::{
    ConfigFile, DsondePlugin, ErrorStrategy, JsonlRecordParser, OutputPlugin, PipelineConfig,
    ProcessingStats, SinkKind, StaticFieldProvider, StreamPipeline,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SinkArg {
    /// JSON log envelopes over UDP to the configured destination
    Udp,
    /// One line per entry on stdout
    Stdout,
}

#[derive(Parser)]
#[command(name = "dsonde")]
#[command(about = "Render pipeline records through templates into per-application logs")]
#[command(version)]
struct Args {
    /// YAML config file (destination, origin, sender, instance, format, f1-f4, fields)
    #[arg(short = 'c', long = "config")]
    config: PathBuf,

    /// Input file of JSON Lines records (default: stdin)
    #[arg(short = 'i', long = "input")]
    input_file: Option<PathBuf>,

    /// Where log entries are sent
    #[arg(long, value_enum, default_value = "udp")]
    sink: SinkArg,

    /// Debug mode - show processing details
    #[arg(long)]
    debug: bool,

    /// Fail on first error instead of skipping records
    #[arg(long)]
    fail_fast: bool,

    /// Maximum line length
    #[arg(long, default_value = "1048576")] // 1MB
    max_line_length: usize,

    /// Buffer size for I/O
    #[arg(long, default_value = "65536")] // 64KB
    buffer_size: usize,
}

fn main() {
    let args = Args::parse();
    init_tracing(args.debug);

    match run(args) {
        Ok(stats) => std::process::exit(exit_code(&stats)),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// 1 when any record failed, 2 when nothing was flushed, 0 otherwise.
fn exit_code(stats: &ProcessingStats) -> i32 {
    if stats.errors > 0 {
        1
    } else if stats.entries_flushed == 0 {
        2
    } else {
        0
    }
}

fn run(args: Args) -> anyhow::Result<ProcessingStats> {
    let file = ConfigFile::load(&args.config)
        .with_context(|| format!("loading config '{}'", args.config.display()))?;

    let provider = StaticFieldProvider::new(file.fields).with_instance_fields();
    let sink_kind = match args.sink {
        SinkArg::Udp => SinkKind::Udp,
        SinkArg::Stdout => SinkKind::Stdout,
    };

    let mut plugin = DsondePlugin::new(file.plugin, sink_kind);
    plugin
        .configure(&provider)
        .context("configuring plugin")?;
    plugin.start().context("starting plugin")?;
    let layout = plugin
        .layout()
        .context("plugin has no field layout")?
        .to_vec();

    let config = PipelineConfig {
        error_strategy: if args.fail_fast {
            ErrorStrategy::FailFast
        } else {
            ErrorStrategy::Skip
        },
        buffer_size: args.buffer_size,
        max_line_length: args.max_line_length,
    };
    let input_filename = args
        .input_file
        .as_ref()
        .map(|p| p.to_string_lossy().to_string());
    let input: Box<dyn BufRead> = if let Some(input_path) = &args.input_file {
        let file = File::open(input_path)
            .with_context(|| format!("opening input file '{}'", input_path.display()))?;
        Box::new(BufReader::with_capacity(config.buffer_size, file))
    } else {
        Box::new(BufReader::with_capacity(config.buffer_size, io::stdin()))
    };

    let mut pipeline = StreamPipeline::new(
        config,
        Box::new(JsonlRecordParser::new(layout)),
        Box::new(plugin),
    );

    let result = pipeline.process_stream(input, input_filename.as_deref());
    pipeline.plugin_mut().stop();
    let stats = result.context("processing failed")?;

    if args.debug {
        eprintln!("Final statistics:");
        eprintln!("  Records processed: {}", stats.records_processed);
        eprintln!("  Records skipped: {}", stats.records_skipped);
        eprintln!("  Entries flushed: {}", stats.entries_flushed);
        eprintln!("  Errors: {}", stats.errors);
        eprintln!("  Processing time: {:?}", stats.processing_time);

        if stats.records_processed > 0 {
            let rate = stats.records_processed as f64 / stats.processing_time.as_secs_f64();
            eprintln!("  Processing rate: {:.0} records/second", rate);
        }
    }

    Ok(stats)
}
