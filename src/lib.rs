//! trakembox
//!
//! Records a vehicle track from an NMEA-0183 GPS receiver and reduces it to
//! the waypoints needed to redraw the route.
//!
//! The pipeline has two halves. The frame aggregator reads raw bytes from a
//! serial port (or a recorded capture), reassembles each burst of GLL, GGA and
//! VTG sentences into one [`Fix`], and hands valid fixes to a consumer over a
//! blocking channel. The trajectory simplifier then keeps a fix only when
//! enough time has passed since the last waypoint or the heading changed.
//!
//! # Features
//!
//! - **`csv`** (default): Fix log reading and writing, waypoint CSV export
//! - **`cli`** (default): Build the command-line interface binary
//! - **`serial`** (default): Read from a serial GPS receiver
//! - **`json`**: Enable waypoint export in JSON format
//! - **`serde`**: Enable serialization/deserialization of types
//!
//! # Quick Start
//!
//! Simplify a stored fix log and export it as KML:
//! ```rust,no_run
//! use trakembox::{export_track, parse_fix_csv_file, simplify_track, ExportOptions, SimplifierConfig};
//! use std::path::Path;
//!
//! let input = Path::new("gps.log");
//! let mut track = parse_fix_csv_file(input).unwrap();
//! simplify_track(&mut track, &SimplifierConfig::default());
//!
//! let options = ExportOptions {
//!     kml: true,
//!     ..ExportOptions::default()
//! };
//! let report = export_track(&track, input, &options).unwrap();
//! if let Some(path) = report.kml_path {
//!     println!("Exported to: {}", path.display());
//! }
//! ```
//!
//! Simplify a live stream as it arrives:
//! ```rust,no_run
//! use trakembox::{spawn, AggregatorConfig, ReaderSource, Simplifier, SimplifierConfig, SystemClock};
//! use std::fs::File;
//!
//! let source = ReaderSource::following(File::open("/tmp/nmea.pipe").unwrap());
//! let handle = spawn(source, SystemClock, AggregatorConfig::default()).unwrap();
//! let mut simplifier = Simplifier::new(SimplifierConfig::default());
//! for fix in handle.receiver().iter().flatten() {
//!     for waypoint in simplifier.push(fix) {
//!         println!("waypoint {}", waypoint.index);
//!     }
//! }
//! ```
//!
//! # Public API
//!
//! ## Parsing Functions
//! - [`parse_fix_csv_file`] - Load a fix log for batch simplification
//! - [`parse_fix_csv_bytes`] - Load a fix log from memory
//! - [`replay_nmea_file`] - Run a recorded NMEA capture through the aggregator
//! - [`decode_sentence`] - Decode one NMEA sentence into a field update
//!
//! ## Aggregation
//! - [`FrameAggregator`] - Burst reassembly over any [`ByteSource`]
//! - [`spawn`] - Run an aggregator on its own thread
//!
//! ## Simplification
//! - [`Simplifier`] - Streaming waypoint selection
//! - [`simplify`] - Batch waypoint selection
//! - [`bearing()`] - Local heading between two fixes
//!
//! ## Export Functions
//! - [`FixLogWriter`] - Append fixes to the CSV fix log
//! - [`export_track`] - Write every enabled format
//! - [`export_to_kml`] - Write waypoints as KML
//! - [`export_to_gpx`] - Write waypoints as GPX
//! - [`compute_export_paths`] - Helper for consistent path computation

// Module declarations
pub mod bearing;
pub mod clock;
pub mod conversion;
pub mod error;
pub mod export;
pub mod filters;
pub mod parser;
pub mod simplifier;
pub mod types;

#[allow(ambiguous_glob_reexports)]
pub use bearing::*;
pub use clock::*;
#[allow(ambiguous_glob_reexports)]
pub use conversion::*;
#[allow(ambiguous_glob_reexports)]
pub use error::*;
#[allow(ambiguous_glob_reexports)]
pub use export::*;
#[allow(ambiguous_glob_reexports)]
pub use filters::*;
#[allow(ambiguous_glob_reexports)]
pub use parser::*;
pub use simplifier::*;
#[allow(ambiguous_glob_reexports)]
pub use types::*;

// Re-export Result type for convenience
pub use anyhow::Result;
