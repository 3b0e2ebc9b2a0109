use crate::clock::ManualClock;
use crate::parser::aggregator::{AggregatorConfig, AggregatorStep, FrameAggregator};
use crate::parser::source::CaptureSource;
use crate::types::*;
use crate::Result;
use anyhow::Context;
use log::{debug, info};
use std::path::Path;
use std::time::Duration;

#[cfg(feature = "csv")]
use anyhow::anyhow;

/// Name a track after the file it came from
fn track_name(file_path: &Path) -> String {
    file_path
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("track")
        .to_string()
}

/// Load a fix log written by [`FixLogWriter`](crate::export::FixLogWriter)
///
/// Invalid rows are dropped and counted, and the rest are sorted by capture
/// time, so the result can go straight into the simplifier.
#[cfg(feature = "csv")]
pub fn parse_fix_csv_file(file_path: &Path) -> Result<Track> {
    let data = std::fs::read(file_path)
        .with_context(|| format!("Failed to read fix log: {:?}", file_path))?;
    parse_fix_csv_bytes(&data, &track_name(file_path))
        .with_context(|| format!("Failed to parse fix log: {:?}", file_path))
}

/// Parse fix-log CSV from memory
///
/// The first row is skipped when its time column is not a number, which covers
/// both the current header and the one older loggers wrote. Rows need at least
/// time, latitude and longitude; the remaining columns default to zero.
#[cfg(feature = "csv")]
pub fn parse_fix_csv_bytes(data: &[u8], name: &str) -> Result<Track> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let mut fixes = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Bad CSV on row {}", row + 1))?;

        let time_field = record.get(0).unwrap_or("");
        if row == 0 && time_field.parse::<u64>().is_err() {
            debug!("skipping header row: {:?}", record);
            continue;
        }
        if record.len() < 3 {
            return Err(anyhow!(
                "Row {} has {} columns, expected at least 3",
                row + 1,
                record.len()
            ));
        }

        fixes.push(parse_fix_record(&record).with_context(|| format!("Row {}", row + 1))?);
    }

    let total = fixes.len() as u32;
    let (mut fixes, invalid) = crate::filters::filter_valid_fixes(fixes);
    crate::filters::sort_by_capture_time(&mut fixes);

    let mut track = Track::from_fixes(name, fixes);
    track.stats.total_records = total;
    track.stats.invalid_records = invalid;

    info!(
        "Loaded {} fixes from {} ({} invalid dropped)",
        track.fixes.len(),
        name,
        invalid
    );
    Ok(track)
}

#[cfg(feature = "csv")]
fn parse_fix_record(record: &csv::StringRecord) -> Result<Fix> {
    let field = |i: usize| record.get(i).filter(|s| !s.is_empty());
    let float = |i: usize, what: &str| -> Result<f64> {
        match field(i) {
            Some(s) => s
                .parse::<f64>()
                .with_context(|| format!("Could not parse {}: {:?}", what, s)),
            None => Ok(0.0),
        }
    };

    let captured_at_us = record
        .get(0)
        .unwrap_or("")
        .parse::<u64>()
        .context("Could not parse time")?;

    Ok(Fix {
        captured_at_us,
        lat: float(1, "latitude")?,
        long: float(2, "longitude")?,
        altitude_feet: float(3, "altitude")?,
        speed_mph: float(4, "speed")?,
        heading_deg: float(5, "heading")?,
        num_satellites: match field(6) {
            Some(s) => s
                .parse::<u32>()
                .with_context(|| format!("Could not parse satellites: {:?}", s))?,
            None => 0,
        },
    })
}

/// Replay a recorded raw NMEA capture through the frame aggregator
///
/// Time is simulated: the clock starts at `start_us` and moves by
/// `burst_interval` per burst plus the aggregator's own delays, so the same
/// capture always yields the same timestamps.
pub fn replay_nmea_file(
    file_path: &Path,
    config: &AggregatorConfig,
    start_us: u64,
    burst_interval: Duration,
) -> Result<Track> {
    let data = std::fs::read(file_path)
        .with_context(|| format!("Failed to read NMEA capture: {:?}", file_path))?;
    let text = String::from_utf8_lossy(&data);
    replay_nmea_capture(&text, &track_name(file_path), config, start_us, burst_interval)
}

/// In-memory variant of [`replay_nmea_file`]
pub fn replay_nmea_capture(
    capture: &str,
    name: &str,
    config: &AggregatorConfig,
    start_us: u64,
    burst_interval: Duration,
) -> Result<Track> {
    let clock = ManualClock::starting_at(start_us);
    let source = CaptureSource::new(capture, clock.clone(), burst_interval);
    debug!("replaying {} bursts from {}", source.remaining_bursts(), name);

    let mut aggregator = FrameAggregator::new(source, clock, config.clone());
    let mut track = Track::new(name);

    loop {
        match aggregator
            .next_step()
            .with_context(|| format!("Replay of {} failed", name))?
        {
            AggregatorStep::Fix(fix) => track.push_fix(fix),
            AggregatorStep::Failed(_) => track.stats.failed_bursts += 1,
            AggregatorStep::Stopped => break,
        }
    }

    track.stats.invalid_records = aggregator.stats().dropped;
    info!(
        "Replayed {} fixes from {} ({} bursts dropped, {} failed)",
        track.fixes.len(),
        name,
        track.stats.invalid_records,
        track.stats.failed_bursts
    );
    Ok(track)
}
