//! Raw byte sources feeding the aggregator
//!
//! A source must tell "nothing yet" apart from real failures: serial devices
//! legitimately return no data between bursts.

use crate::clock::ManualClock;
use crate::error::{Result, TrakError};
use std::io::{ErrorKind, Read};
use std::time::Duration;

/// What a single read produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes were written to the front of the buffer
    Data(usize),
    /// Nothing available right now, try again later
    Idle,
    /// The source is exhausted and will never produce more data
    Closed,
}

pub trait ByteSource: Send {
    /// Read whatever is available into `buf`
    ///
    /// Errors returned here are fatal for the aggregator.
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<ReadOutcome>;
}

/// Map an I/O result the way a serial port reports it
///
/// Timeouts, would-block and end-of-stream errors are gaps between bursts,
/// not failures.
pub fn classify_read(result: std::io::Result<usize>) -> Result<ReadOutcome> {
    match result {
        Ok(0) => Ok(ReadOutcome::Idle),
        Ok(n) => Ok(ReadOutcome::Data(n)),
        Err(e) => match e.kind() {
            ErrorKind::TimedOut
            | ErrorKind::WouldBlock
            | ErrorKind::UnexpectedEof
            | ErrorKind::Interrupted => Ok(ReadOutcome::Idle),
            _ => Err(TrakError::Device(e.to_string())),
        },
    }
}

/// Source over any reader, e.g. a recorded NMEA capture file
///
/// End of file closes the source, unless `follow` is set, in which case it
/// is treated as a gap (useful for tailing a file another process appends to).
pub struct ReaderSource<R> {
    reader: R,
    follow: bool,
}

impl<R: Read + Send> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            follow: false,
        }
    }

    pub fn following(reader: R) -> Self {
        Self {
            reader,
            follow: true,
        }
    }
}

impl<R: Read + Send> ByteSource for ReaderSource<R> {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        match classify_read(self.reader.read(buf))? {
            ReadOutcome::Idle if !self.follow => Ok(ReadOutcome::Closed),
            outcome => Ok(outcome),
        }
    }
}

/// Scripted source handing out prepared chunks in order
///
/// `None` entries stand for reads that came back empty.
#[derive(Debug, Default)]
pub struct ChunkSource {
    chunks: std::collections::VecDeque<Option<Vec<u8>>>,
    error_at_end: Option<String>,
}

impl ChunkSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.chunks.push_back(Some(bytes.into()));
        self
    }

    pub fn idle(mut self) -> Self {
        self.chunks.push_back(None);
        self
    }

    /// Fail with a device error once the chunks run out, instead of closing
    pub fn then_fail(mut self, message: impl Into<String>) -> Self {
        self.error_at_end = Some(message.into());
        self
    }
}

impl ByteSource for ChunkSource {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        match self.chunks.pop_front() {
            Some(Some(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    self.chunks.push_front(Some(bytes[n..].to_vec()));
                }
                Ok(ReadOutcome::Data(n))
            }
            Some(None) => Ok(ReadOutcome::Idle),
            None => match &self.error_at_end {
                Some(message) => Err(TrakError::Device(message.clone())),
                None => Ok(ReadOutcome::Closed),
            },
        }
    }
}

/// Replays a recorded NMEA capture one burst at a time
///
/// Bursts are separated by blank lines. A capture without blank lines is cut
/// wherever a sentence type repeats, since a receiver sends each type once per
/// cycle. Every burst is followed by one idle read, like a receiver going
/// quiet between cycles, and advances `clock` by `burst_interval`.
pub struct CaptureSource {
    bursts: std::collections::VecDeque<String>,
    clock: ManualClock,
    burst_interval: Duration,
    gap_pending: bool,
}

impl CaptureSource {
    pub fn new(capture: &str, clock: ManualClock, burst_interval: Duration) -> Self {
        Self {
            bursts: group_capture(capture).into(),
            clock,
            burst_interval,
            gap_pending: false,
        }
    }

    pub fn remaining_bursts(&self) -> usize {
        self.bursts.len()
    }
}

impl ByteSource for CaptureSource {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        if self.gap_pending {
            self.gap_pending = false;
            return Ok(ReadOutcome::Idle);
        }
        let burst = match self.bursts.pop_front() {
            Some(burst) => burst,
            None => return Ok(ReadOutcome::Closed),
        };
        let bytes = burst.as_bytes();
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        if n < bytes.len() {
            // rest of an oversized burst arrives with the delayed read
            self.bursts
                .push_front(String::from_utf8_lossy(&bytes[n..]).into_owned());
        } else {
            self.gap_pending = true;
            self.clock.advance(self.burst_interval);
        }
        Ok(ReadOutcome::Data(n))
    }
}

/// Split capture text into bursts, see [`CaptureSource`]
pub fn group_capture(capture: &str) -> Vec<String> {
    let mut bursts = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut seen_types: Vec<&str> = Vec::new();

    let mut flush = |current: &mut Vec<&str>, seen: &mut Vec<&str>| {
        if !current.is_empty() {
            bursts.push(format!("{}\r\n", current.join("\r\n")));
            current.clear();
        }
        seen.clear();
    };

    for line in capture.lines() {
        let line = line.trim_end_matches('\r').trim_matches('\0');
        if line.trim().is_empty() {
            flush(&mut current, &mut seen_types);
            continue;
        }
        let sentence_type = line.get(3..6).unwrap_or("");
        if line.starts_with('$') && seen_types.contains(&sentence_type) {
            flush(&mut current, &mut seen_types);
        }
        if line.starts_with('$') {
            seen_types.push(sentence_type);
        }
        current.push(line);
    }
    flush(&mut current, &mut seen_types);

    bursts
}

#[cfg(feature = "serial")]
pub use serial::SerialSource;

#[cfg(feature = "serial")]
mod serial {
    use super::{classify_read, ByteSource, ReadOutcome};
    use crate::error::{Result, TrakError};
    use log::info;
    use std::io::Read;
    use std::time::Duration;

    /// GPS dongle on a serial port, 8 data bits
    pub struct SerialSource {
        port: Box<dyn serialport::SerialPort>,
    }

    impl SerialSource {
        pub fn open(path: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self> {
            info!("connecting to {}, baud: {}", path, baud_rate);
            let port = serialport::new(path, baud_rate)
                .data_bits(serialport::DataBits::Eight)
                .timeout(read_timeout)
                .open()
                .map_err(|e| TrakError::Device(format!("failed to open {}: {}", path, e)))?;
            Ok(Self { port })
        }
    }

    impl ByteSource for SerialSource {
        fn read_chunk(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
            classify_read(self.port.read(buf))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use std::io::{Cursor, Error};

    #[test]
    fn test_classify_read() {
        assert_eq!(classify_read(Ok(0)).unwrap(), ReadOutcome::Idle);
        assert_eq!(classify_read(Ok(12)).unwrap(), ReadOutcome::Data(12));
        assert_eq!(
            classify_read(Err(Error::from(ErrorKind::TimedOut))).unwrap(),
            ReadOutcome::Idle
        );
        assert_eq!(
            classify_read(Err(Error::from(ErrorKind::UnexpectedEof))).unwrap(),
            ReadOutcome::Idle
        );
        assert!(matches!(
            classify_read(Err(Error::from(ErrorKind::BrokenPipe))),
            Err(TrakError::Device(_))
        ));
    }

    #[test]
    fn test_reader_source_closes_at_eof() {
        let mut source = ReaderSource::new(Cursor::new(b"$GPGLL".to_vec()));
        let mut buf = [0u8; 16];
        assert_eq!(source.read_chunk(&mut buf).unwrap(), ReadOutcome::Data(6));
        assert_eq!(source.read_chunk(&mut buf).unwrap(), ReadOutcome::Closed);

        let mut tail = ReaderSource::following(Cursor::new(Vec::new()));
        assert_eq!(tail.read_chunk(&mut buf).unwrap(), ReadOutcome::Idle);
    }

    #[test]
    fn test_group_capture_by_blank_lines() {
        let capture = "$GPGLL,a*00\r\n$GPGGA,b*00\r\n\r\n$GPGLL,c*00\r\n";
        let bursts = group_capture(capture);
        assert_eq!(bursts.len(), 2);
        assert_eq!(bursts[0], "$GPGLL,a*00\r\n$GPGGA,b*00\r\n");
    }

    #[test]
    fn test_group_capture_by_repeated_type() {
        let capture = "$GPGLL,a*00\n$GPGGA,b*00\n$GPVTG,c*00\n$GPGLL,d*00\n$GPGGA,e*00\n";
        let bursts = group_capture(capture);
        assert_eq!(bursts.len(), 2);
        assert!(bursts[1].starts_with("$GPGLL,d"));
    }

    #[test]
    fn test_capture_source_gaps_and_clock() {
        let clock = ManualClock::starting_at(0);
        let mut source = CaptureSource::new(
            "$GPGLL,a*00\n\n$GPGLL,b*00\n",
            clock.clone(),
            Duration::from_secs(1),
        );
        let mut buf = [0u8; 64];
        assert!(matches!(source.read_chunk(&mut buf).unwrap(), ReadOutcome::Data(_)));
        assert_eq!(clock.now_us(), 1_000_000);
        assert_eq!(source.read_chunk(&mut buf).unwrap(), ReadOutcome::Idle);
        assert!(matches!(source.read_chunk(&mut buf).unwrap(), ReadOutcome::Data(_)));
        assert_eq!(source.read_chunk(&mut buf).unwrap(), ReadOutcome::Idle);
        assert_eq!(source.read_chunk(&mut buf).unwrap(), ReadOutcome::Closed);
        assert_eq!(source.remaining_bursts(), 0);
    }

    #[test]
    fn test_chunk_source_splits_long_chunks() {
        let mut source = ChunkSource::new().data("abcdef").idle();
        let mut buf = [0u8; 4];
        assert_eq!(source.read_chunk(&mut buf).unwrap(), ReadOutcome::Data(4));
        assert_eq!(&buf, b"abcd");
        assert_eq!(source.read_chunk(&mut buf).unwrap(), ReadOutcome::Data(2));
        assert_eq!(source.read_chunk(&mut buf).unwrap(), ReadOutcome::Idle);
        assert_eq!(source.read_chunk(&mut buf).unwrap(), ReadOutcome::Closed);
    }
}
