//! CLI binary for trakembox
//!
//! `live` records from a serial GPS receiver, `replay` runs recorded NMEA
//! captures through the same pipeline, and `simplify` reduces stored fix logs.

use anyhow::{anyhow, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use glob::glob;
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;
use trakembox::{
    export_track, parse_fix_csv_file, replay_nmea_file, should_skip_export, simplify_track,
    AggregatorConfig, ExportOptions, FirstSegment, SimplifierConfig, Track,
};

fn simplifier_args() -> [Arg; 3] {
    [
        Arg::new("interval")
            .long("interval")
            .help("Seconds after which a fix is kept even without a turn")
            .value_name("SECONDS")
            .value_parser(value_parser!(f64))
            .default_value("10"),
        Arg::new("turn-threshold")
            .long("turn-threshold")
            .help("Bearing change in degrees that counts as a turn")
            .value_name("DEGREES")
            .value_parser(value_parser!(f64))
            .default_value("5"),
        Arg::new("anchor-first-segment")
            .long("anchor-first-segment")
            .help("Keep the first fix that moves away from the start right away, instead of holding it until a turn")
            .action(ArgAction::SetTrue),
    ]
}

fn export_args() -> [Arg; 6] {
    [
        Arg::new("output-dir")
            .long("output-dir")
            .help("Directory for exported files (default: same as input file)")
            .value_name("DIR"),
        Arg::new("csv")
            .long("csv")
            .help("Export waypoints to .waypoints.csv")
            .action(ArgAction::SetTrue),
        Arg::new("kml")
            .long("kml")
            .help("Export the waypoint route to KML")
            .action(ArgAction::SetTrue),
        Arg::new("gpx")
            .long("gpx")
            .help("Export the waypoint route to GPX")
            .action(ArgAction::SetTrue),
        Arg::new("json")
            .long("json")
            .help("Export waypoints to JSON (requires the 'json' feature)")
            .action(ArgAction::SetTrue),
        Arg::new("force")
            .long("force")
            .help("Export even tracks with fewer than two fixes")
            .action(ArgAction::SetTrue),
    ]
}

fn files_arg(help: &'static str) -> Arg {
    Arg::new("files")
        .help(help)
        .required(true)
        .num_args(1..)
        .index(1)
}

fn build_cli() -> Command {
    let mut cli = Command::new("trakembox")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Record GPS fixes from an NMEA receiver and reduce them to waypoints.")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Enable debug output (RUST_LOG overrides)")
                .global(true)
                .action(ArgAction::SetTrue),
        );

    #[cfg(feature = "serial")]
    {
        cli = cli.subcommand(
            Command::new("live")
                .about("Read a serial GPS receiver, append every fix and every waypoint to CSV logs")
                .arg(
                    Arg::new("port")
                        .long("port")
                        .help("Serial device of the receiver")
                        .value_name("PATH")
                        .default_value("/dev/ttyACM0"),
                )
                .arg(
                    Arg::new("baud")
                        .long("baud")
                        .help("Baud rate")
                        .value_parser(value_parser!(u32))
                        .default_value("9600"),
                )
                .arg(
                    Arg::new("log")
                        .long("log")
                        .help("Fix log to append to")
                        .value_name("FILE")
                        .default_value("gps.log"),
                )
                .arg(
                    Arg::new("waypoints")
                        .long("waypoints")
                        .help("Waypoint log to append to")
                        .value_name("FILE")
                        .default_value("waypoints.log"),
                )
                .arg(
                    Arg::new("reread-delay-ms")
                        .long("reread-delay-ms")
                        .help("Delay before the second read of a burst")
                        .value_parser(value_parser!(u64))
                        .default_value("100"),
                )
                .arg(
                    Arg::new("show")
                        .long("show")
                        .help("Print a short summary of every fix")
                        .action(ArgAction::SetTrue),
                )
                .args(simplifier_args()),
        );
    }

    cli = cli
        .subcommand(
            Command::new("replay")
                .about("Run recorded raw NMEA captures through the aggregator and simplifier")
                .arg(files_arg("NMEA capture files (supports globbing)"))
                .arg(
                    Arg::new("burst-interval-ms")
                        .long("burst-interval-ms")
                        .help("Simulated time between bursts")
                        .value_parser(value_parser!(u64))
                        .default_value("1000"),
                )
                .args(simplifier_args())
                .args(export_args()),
        )
        .subcommand(
            Command::new("simplify")
                .about("Reduce stored fix logs (CSV) to waypoints")
                .arg(files_arg("Fix log files (supports globbing)"))
                .args(simplifier_args())
                .args(export_args()),
        );

    cli
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();
}

fn simplifier_config(matches: &ArgMatches) -> Result<SimplifierConfig> {
    let interval = matches.get_one::<f64>("interval").copied().unwrap_or(10.0);
    if !interval.is_finite() || interval < 0.0 {
        return Err(anyhow!("--interval must be a non-negative number of seconds"));
    }
    let turn_threshold_deg = matches
        .get_one::<f64>("turn-threshold")
        .copied()
        .unwrap_or(5.0);

    Ok(SimplifierConfig {
        interval_us: trakembox::seconds_to_micros(interval),
        turn_threshold_deg,
        first_segment: if matches.get_flag("anchor-first-segment") {
            FirstSegment::Anchor
        } else {
            FirstSegment::Provisional
        },
    })
}

fn export_options(matches: &ArgMatches) -> ExportOptions {
    ExportOptions {
        csv: matches.get_flag("csv"),
        kml: matches.get_flag("kml"),
        gpx: matches.get_flag("gpx"),
        json: matches.get_flag("json"),
        output_dir: matches.get_one::<String>("output-dir").cloned(),
        force_export: matches.get_flag("force"),
    }
}

/// Expand glob patterns, keeping plain paths as given
fn expand_inputs(matches: &ArgMatches) -> Vec<PathBuf> {
    let patterns: Vec<&String> = matches
        .get_many::<String>("files")
        .map(|values| values.collect())
        .unwrap_or_default();

    let mut paths = Vec::new();
    for pattern in patterns {
        if pattern.contains('*') || pattern.contains('?') {
            match glob(pattern) {
                Ok(glob_iter) => {
                    let matched: Vec<PathBuf> = glob_iter.filter_map(|entry| entry.ok()).collect();
                    debug!("Glob pattern '{}' matched {} files", pattern, matched.len());
                    paths.extend(matched);
                }
                Err(e) => warn!("Invalid glob pattern '{}': {}", pattern, e),
            }
        } else {
            paths.push(PathBuf::from(pattern));
        }
    }

    paths.retain(|path| {
        let exists = path.is_file();
        if !exists {
            warn!("File does not exist: {:?}", path);
        }
        exists
    });
    paths
}

fn finish_track(
    mut track: Track,
    path: &Path,
    config: &SimplifierConfig,
    options: &ExportOptions,
) -> Result<()> {
    let (skip, reason) = should_skip_export(&track, options.force_export);
    if skip {
        println!("Skipping {}: {}", path.display(), reason);
        return Ok(());
    }

    simplify_track(&mut track, config);
    println!(
        "{}: {} fixes, {} waypoints, {:.1}s",
        track.name,
        track.fixes.len(),
        track.waypoints.len(),
        track.duration_seconds()
    );
    if track.stats.invalid_records > 0 || track.stats.failed_bursts > 0 {
        println!(
            "  dropped {} invalid, {} failed bursts",
            track.stats.invalid_records, track.stats.failed_bursts
        );
    }

    let report = export_track(&track, path, options)
        .with_context(|| format!("Export failed for {:?}", path))?;
    for written in report.written() {
        println!("  wrote {}", written.display());
    }
    Ok(())
}

/// Run `load` over every input file, continuing past failures
fn process_files<F>(matches: &ArgMatches, load: F) -> Result<()>
where
    F: Fn(&Path) -> Result<Track>,
{
    let config = simplifier_config(matches)?;
    let options = export_options(matches);
    let paths = expand_inputs(matches);

    if paths.is_empty() {
        return Err(anyhow!("No valid files found to process"));
    }

    let mut processed_files = 0;
    for path in &paths {
        let outcome = load(path).and_then(|track| finish_track(track, path, &config, &options));
        match outcome {
            Ok(()) => processed_files += 1,
            Err(e) => {
                error!("Error processing {}: {:#}", path.display(), e);
                eprintln!("Continuing with next file...");
            }
        }
    }

    if processed_files == 0 {
        return Err(anyhow!(
            "No files were successfully processed out of {} files found",
            paths.len()
        ));
    }
    Ok(())
}

#[cfg(feature = "serial")]
fn run_live(matches: &ArgMatches) -> Result<()> {
    use trakembox::{spawn, FixLogWriter, SerialSource, Simplifier, SystemClock};

    let port = matches
        .get_one::<String>("port")
        .map(String::as_str)
        .unwrap_or("/dev/ttyACM0");
    let baud = matches.get_one::<u32>("baud").copied().unwrap_or(9600);
    let log_path = matches
        .get_one::<String>("log")
        .map(String::as_str)
        .unwrap_or("gps.log");
    let waypoint_path = matches
        .get_one::<String>("waypoints")
        .map(String::as_str)
        .unwrap_or("waypoints.log");
    let show = matches.get_flag("show");

    let aggregator_config = AggregatorConfig {
        reread_delay: Duration::from_millis(
            matches
                .get_one::<u64>("reread-delay-ms")
                .copied()
                .unwrap_or(100),
        ),
        ..AggregatorConfig::default()
    };

    let mut fix_log = FixLogWriter::open(Path::new(log_path))
        .with_context(|| format!("Failed to open fix log {}", log_path))?;
    let mut waypoint_log = FixLogWriter::open(Path::new(waypoint_path))
        .with_context(|| format!("Failed to open waypoint log {}", waypoint_path))?;
    let mut simplifier = Simplifier::new(simplifier_config(matches)?);

    let source = SerialSource::open(port, baud, Duration::from_millis(10))?;
    let handle = spawn(source, SystemClock, aggregator_config)?;
    info!("recording to {}, waypoints to {}", log_path, waypoint_path);

    for item in handle.receiver().iter() {
        let fix = match item {
            Ok(fix) => fix,
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };

        fix_log.append(&fix)?;
        if show {
            println!("{}\n", trakembox::format_fix_summary(&fix));
        }
        for waypoint in simplifier.push(fix) {
            waypoint_log.append(&waypoint.fix)?;
        }
    }

    let stats = handle.join()?;
    info!(
        "aggregator finished: {} fixes, {} dropped, {} failed bursts",
        stats.fixes, stats.dropped, stats.failed_bursts
    );
    println!(
        "Recorded {} fixes, {} waypoints",
        fix_log.records(),
        waypoint_log.records()
    );
    Ok(())
}

fn run_replay(matches: &ArgMatches) -> Result<()> {
    let burst_interval = Duration::from_millis(
        matches
            .get_one::<u64>("burst-interval-ms")
            .copied()
            .unwrap_or(1000),
    );
    let aggregator_config = AggregatorConfig::default();

    process_files(matches, |path| {
        replay_nmea_file(path, &aggregator_config, 0, burst_interval)
    })
}

fn run_simplify(matches: &ArgMatches) -> Result<()> {
    process_files(matches, parse_fix_csv_file)
}

fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    let debug = matches.get_flag("debug")
        || matches
            .subcommand()
            .map(|(_, sub)| sub.get_flag("debug"))
            .unwrap_or(false);
    init_logging(debug);
    info!(
        "trakembox {} ({})",
        env!("CARGO_PKG_VERSION"),
        option_env!("VERGEN_GIT_SHA").unwrap_or("unknown")
    );

    match matches.subcommand() {
        #[cfg(feature = "serial")]
        Some(("live", sub)) => run_live(sub),
        Some(("replay", sub)) => run_replay(sub),
        Some(("simplify", sub)) => run_simplify(sub),
        _ => Err(anyhow!("unknown subcommand, see --help")),
    }
}
