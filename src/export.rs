//! Export functionality for tracks and waypoints
//!
//! Contains the fix-log appender used while recording, and writers for the
//! simplified route: waypoint CSV, KML, GPX and JSON.

use crate::conversion::{format_unix_micros, FEET_PER_METER};
use crate::error::Result;
use crate::types::{Fix, Track, Waypoint};
use log::info;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Header of the fix log, one column per [`Fix`] field
pub const FIX_LOG_HEADER: [&str; 7] = [
    "unix_micro",
    "lat",
    "long",
    "alt_ft",
    "speed_mph",
    "heading_deg",
    "num_sats",
];

/// Export options for controlling output formats
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub csv: bool,
    pub kml: bool,
    pub gpx: bool,
    pub json: bool,
    pub output_dir: Option<String>,
    /// Export even tracks too short to describe a path
    pub force_export: bool,
}

/// Files written by [`export_track`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportReport {
    pub csv_path: Option<PathBuf>,
    pub kml_path: Option<PathBuf>,
    pub gpx_path: Option<PathBuf>,
    pub json_path: Option<PathBuf>,
}

impl ExportReport {
    pub fn written(&self) -> Vec<&Path> {
        [
            &self.csv_path,
            &self.kml_path,
            &self.gpx_path,
            &self.json_path,
        ]
        .into_iter()
        .filter_map(|p| p.as_deref())
        .collect()
    }
}

/// Output file names derived from one input file
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPaths {
    pub csv: PathBuf,
    pub kml: PathBuf,
    pub gpx: PathBuf,
    pub json: PathBuf,
}

/// Compute output paths next to the input, or inside `output_dir` when set
pub fn compute_export_paths(input_path: &Path, export_options: &ExportOptions) -> ExportPaths {
    let base_name = input_path
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("track");

    let output_dir = match &export_options.output_dir {
        Some(dir) => PathBuf::from(dir),
        None => input_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };

    ExportPaths {
        csv: output_dir.join(format!("{}.waypoints.csv", base_name)),
        kml: output_dir.join(format!("{}.kml", base_name)),
        gpx: output_dir.join(format!("{}.gpx", base_name)),
        json: output_dir.join(format!("{}.waypoints.json", base_name)),
    }
}

fn create_output_file(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(BufWriter::new(File::create(path)?))
}

fn fix_record(fix: &Fix) -> [String; 7] {
    [
        fix.captured_at_us.to_string(),
        format!("{:.7}", fix.lat),
        format!("{:.7}", fix.long),
        format!("{:.1}", fix.altitude_feet),
        format!("{:.2}", fix.speed_mph),
        format!("{:.2}", fix.heading_deg),
        fix.num_satellites.to_string(),
    ]
}

/// Append-only fix log written while recording
///
/// The header goes in only when the file is new or empty, so a restarted
/// recorder keeps appending to the same log.
#[cfg(feature = "csv")]
pub struct FixLogWriter {
    writer: csv::Writer<File>,
    path: PathBuf,
    records: u64,
}

#[cfg(feature = "csv")]
impl FixLogWriter {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        let is_empty = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_empty {
            writer.write_record(FIX_LOG_HEADER)?;
            writer.flush()?;
        }

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            records: 0,
        })
    }

    /// Write one fix and flush, so a power cut loses at most the current row
    pub fn append(&mut self, fix: &Fix) -> Result<()> {
        self.writer.write_record(fix_record(fix))?;
        self.writer.flush()?;
        self.records += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended through this writer
    pub fn records(&self) -> u64 {
        self.records
    }
}

/// Write waypoints as CSV, one row per waypoint with its input index first
#[cfg(feature = "csv")]
pub fn export_waypoints_csv(waypoints: &[Waypoint], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_writer(create_output_file(path)?);
    let mut header = vec!["index"];
    header.extend_from_slice(&FIX_LOG_HEADER);
    writer.write_record(&header)?;

    for waypoint in waypoints {
        let mut record = vec![waypoint.index.to_string()];
        record.extend(fix_record(&waypoint.fix));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Write the waypoint route as KML
///
/// One `LineString` through all waypoints plus a `Placemark` per waypoint.
/// Nothing is written for an empty route.
pub fn export_to_kml(track: &Track, path: &Path) -> Result<Option<PathBuf>> {
    if track.waypoints.is_empty() {
        return Ok(None);
    }

    let name = xml_escape(&track.name);
    let mut kml = create_output_file(path)?;
    writeln!(kml, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(kml, r#"<kml xmlns="http://www.opengis.net/kml/2.2">"#)?;
    writeln!(kml, "<Document>")?;
    writeln!(kml, "<name>{}</name>", name)?;
    writeln!(kml, "<Placemark><name>{}</name><LineString>", name)?;
    writeln!(kml, "<tessellate>1</tessellate><coordinates>")?;
    for waypoint in &track.waypoints {
        writeln!(kml, "{:.7},{:.7},0", waypoint.fix.long, waypoint.fix.lat)?;
    }
    writeln!(kml, "</coordinates></LineString></Placemark>")?;

    for (n, waypoint) in track.waypoints.iter().enumerate() {
        writeln!(
            kml,
            "<Placemark><name>WP{}</name><TimeStamp><when>{}</when></TimeStamp><Point><coordinates>{:.7},{:.7},0</coordinates></Point></Placemark>",
            n,
            format_unix_micros(waypoint.captured_at_us()),
            waypoint.fix.long,
            waypoint.fix.lat
        )?;
    }

    writeln!(kml, "</Document>")?;
    writeln!(kml, "</kml>")?;
    kml.flush()?;

    info!("Exported KML to: {}", path.display());
    Ok(Some(path.to_path_buf()))
}

/// Write the waypoint route as a GPX track
///
/// Elevation is written in meters. Nothing is written for an empty route.
pub fn export_to_gpx(track: &Track, path: &Path) -> Result<Option<PathBuf>> {
    if track.waypoints.is_empty() {
        return Ok(None);
    }

    let name = xml_escape(&track.name);
    let mut gpx = create_output_file(path)?;
    writeln!(gpx, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(
        gpx,
        r#"<gpx creator="trakembox" version="1.1" xmlns="http://www.topografix.com/GPX/1/1" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="http://www.topografix.com/GPX/1/1 http://www.topografix.com/GPX/1/1/gpx.xsd">"#
    )?;
    writeln!(gpx, "<metadata><name>{}</name></metadata>", name)?;
    writeln!(gpx, "<trk><name>{}</name><trkseg>", name)?;

    for waypoint in &track.waypoints {
        let fix = &waypoint.fix;
        writeln!(
            gpx,
            r#"  <trkpt lat="{:.7}" lon="{:.7}"><ele>{:.2}</ele><time>{}</time><sat>{}</sat></trkpt>"#,
            fix.lat,
            fix.long,
            fix.altitude_feet / FEET_PER_METER,
            format_unix_micros(fix.captured_at_us),
            fix.num_satellites
        )?;
    }

    writeln!(gpx, "</trkseg></trk>")?;
    writeln!(gpx, "</gpx>")?;
    gpx.flush()?;

    info!("Exported GPX to: {}", path.display());
    Ok(Some(path.to_path_buf()))
}

/// Write the waypoints as a pretty-printed JSON array
#[cfg(feature = "json")]
pub fn export_to_json(waypoints: &[Waypoint], path: &Path) -> Result<()> {
    let mut writer = create_output_file(path)?;
    serde_json::to_writer_pretty(&mut writer, waypoints)
        .map_err(|e| crate::error::TrakError::Export(format!("JSON export failed: {}", e)))?;
    writer.flush()?;
    info!("Exported JSON to: {}", path.display());
    Ok(())
}

/// Write every format enabled in `export_options`
///
/// `input_path` names the source of the track and determines output file names.
pub fn export_track(
    track: &Track,
    input_path: &Path,
    export_options: &ExportOptions,
) -> Result<ExportReport> {
    let paths = compute_export_paths(input_path, export_options);
    let mut report = ExportReport::default();

    if export_options.csv {
        #[cfg(feature = "csv")]
        {
            export_waypoints_csv(&track.waypoints, &paths.csv)?;
            info!("Exported waypoints to: {}", paths.csv.display());
            report.csv_path = Some(paths.csv.clone());
        }
        #[cfg(not(feature = "csv"))]
        return Err(crate::error::TrakError::Export(
            "CSV export requires the 'csv' feature".to_string(),
        ));
    }

    if export_options.kml {
        report.kml_path = export_to_kml(track, &paths.kml)?;
    }

    if export_options.gpx {
        report.gpx_path = export_to_gpx(track, &paths.gpx)?;
    }

    if export_options.json {
        #[cfg(feature = "json")]
        {
            export_to_json(&track.waypoints, &paths.json)?;
            report.json_path = Some(paths.json.clone());
        }
        #[cfg(not(feature = "json"))]
        return Err(crate::error::TrakError::Export(
            "JSON export requires the 'json' feature".to_string(),
        ));
    }

    Ok(report)
}
