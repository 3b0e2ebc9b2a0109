//! Frame aggregator
//!
//! Turns the bursty output of a line-oriented NMEA source into a sequence of
//! valid fixes. Each burst is one read plus a second read issued after a short
//! delay, because drivers rarely deliver a whole burst in one go. Every
//! sentence of the burst is folded into one composite fix, which is stamped
//! from the injected [`Clock`] and emitted only if it passes the validity
//! filter.

use crate::clock::Clock;
use crate::error::{Result, TrakError};
use crate::parser::burst::{decode_burst, BurstBuffer};
use crate::parser::retry::RetryPolicy;
use crate::parser::source::{ByteSource, ReadOutcome};
use crate::types::Fix;
use log::{debug, error, info, trace, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Aggregator tuning
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AggregatorConfig {
    /// Pause between the first and the second read of a burst
    pub reread_delay: Duration,
    /// Pause after a read that returned nothing
    pub idle_backoff: Duration,
    /// Reads spent on a burst whose sentences fail to decode
    pub decode_attempts: u32,
    /// Size of the read buffer
    pub chunk_size: usize,
    /// Fixes that may wait in the handoff channel; 0 makes every send a rendezvous
    pub handoff_capacity: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            reread_delay: Duration::from_millis(100),
            idle_backoff: Duration::from_millis(50),
            decode_attempts: 3,
            chunk_size: 1024,
            handoff_capacity: 0,
        }
    }
}

/// Result of asking the aggregator for the next fix
#[derive(Debug)]
pub enum AggregatorStep {
    Fix(Fix),
    /// The burst could not be decoded within the retry budget; the aggregator keeps going
    Failed(TrakError),
    /// Source closed or a stop was requested
    Stopped,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorStats {
    pub bursts: u32,
    pub fixes: u32,
    pub dropped: u32,
    pub failed_bursts: u32,
}

enum BurstOutcome {
    Decoded(Fix),
    NoPosition,
    Ended,
}

pub struct FrameAggregator<S, C> {
    source: S,
    clock: C,
    config: AggregatorConfig,
    buffer: BurstBuffer,
    read_buf: Vec<u8>,
    closed: bool,
    stop: Arc<AtomicBool>,
    stats: AggregatorStats,
}

impl<S: ByteSource, C: Clock> FrameAggregator<S, C> {
    pub fn new(source: S, clock: C, config: AggregatorConfig) -> Self {
        let read_buf = vec![0u8; config.chunk_size.max(1)];
        Self {
            source,
            clock,
            config,
            buffer: BurstBuffer::new(),
            read_buf,
            closed: false,
            stop: Arc::new(AtomicBool::new(false)),
            stats: AggregatorStats::default(),
        }
    }

    /// Flag that makes the aggregator stop at its next read
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn stats(&self) -> AggregatorStats {
        self.stats
    }

    fn should_stop(&self) -> bool {
        self.closed || self.stop.load(Ordering::SeqCst)
    }

    /// Read bursts until one yields a valid fix, fails, or the source ends
    ///
    /// Errors returned here are fatal device errors; burst-level decode
    /// failures come back as [`AggregatorStep::Failed`].
    pub fn next_step(&mut self) -> Result<AggregatorStep> {
        let policy = RetryPolicy::new(self.config.decode_attempts);

        loop {
            if self.should_stop() {
                return Ok(AggregatorStep::Stopped);
            }

            self.buffer.clear();
            let outcome = policy.run(|attempt| self.read_and_decode(attempt));

            match outcome {
                Ok(BurstOutcome::Decoded(mut fix)) => {
                    fix.captured_at_us = self.clock.now_us();
                    if fix.is_valid() {
                        self.stats.fixes += 1;
                        return Ok(AggregatorStep::Fix(fix));
                    }
                    debug!("dropping invalid fix {:.6},{:.6}", fix.lat, fix.long);
                    self.stats.dropped += 1;
                }
                Ok(BurstOutcome::NoPosition) => {
                    debug!("burst carried no position");
                    self.stats.dropped += 1;
                }
                Ok(BurstOutcome::Ended) => return Ok(AggregatorStep::Stopped),
                Err(e @ TrakError::Burst { .. }) => {
                    warn!("{}", e);
                    self.stats.failed_bursts += 1;
                    return Ok(AggregatorStep::Failed(e));
                }
                Err(e) => {
                    error!("aggregator stopping: {}", e);
                    return Err(e);
                }
            }
        }
    }

    /// One attempt at a burst: wait for data, read the rest after a delay, decode
    ///
    /// Text from earlier failed attempts stays in the buffer, so a sentence cut
    /// in half by one read can be completed by the next.
    fn read_and_decode(&mut self, attempt: u32) -> Result<BurstOutcome> {
        if !self.wait_for_data()? {
            return Ok(BurstOutcome::Ended);
        }

        if !self.closed {
            self.clock.sleep(self.config.reread_delay);
            match self.source.read_chunk(&mut self.read_buf)? {
                ReadOutcome::Data(n) => self.buffer.push_bytes(&self.read_buf[..n]),
                ReadOutcome::Idle => {}
                ReadOutcome::Closed => self.closed = true,
            }
        }

        self.stats.bursts += 1;
        let decoded = decode_burst(self.buffer.as_str());
        debug!(
            "burst attempt {}: {} candidates, {} decoded, {} failed",
            attempt,
            decoded.candidates,
            decoded.decoded,
            decoded.failures.len()
        );

        if decoded.is_decode_failure() {
            return Err(TrakError::Decode(decoded.failure_summary()));
        }
        if !decoded.has_position {
            return Ok(BurstOutcome::NoPosition);
        }
        Ok(BurstOutcome::Decoded(decoded.fix))
    }

    /// Block until the first read of a burst returns data
    ///
    /// Returns false when there is nothing left to decode: the source closed
    /// with an empty buffer, or a stop was requested.
    fn wait_for_data(&mut self) -> Result<bool> {
        loop {
            if self.stop.load(Ordering::SeqCst) {
                return Ok(false);
            }
            if self.closed {
                return Ok(!self.buffer.is_empty());
            }
            match self.source.read_chunk(&mut self.read_buf)? {
                ReadOutcome::Data(n) => {
                    self.buffer.push_bytes(&self.read_buf[..n]);
                    return Ok(true);
                }
                ReadOutcome::Idle => {
                    trace!("no data, backing off {:?}", self.config.idle_backoff);
                    self.clock.sleep(self.config.idle_backoff);
                }
                ReadOutcome::Closed => {
                    debug!("source closed");
                    self.closed = true;
                }
            }
        }
    }

    /// Feed fixes and burst failures into `sender` until the source ends
    ///
    /// A consumer that hangs up ends the loop without an error.
    pub fn run(mut self, sender: SyncSender<Result<Fix>>) -> Result<AggregatorStats> {
        loop {
            let item = match self.next_step()? {
                AggregatorStep::Fix(fix) => Ok(fix),
                AggregatorStep::Failed(e) => Err(e),
                AggregatorStep::Stopped => break,
            };
            if sender.send(item).is_err() {
                info!("fix consumer went away");
                break;
            }
        }
        Ok(self.stats)
    }
}

/// Aggregator running on its own thread
pub struct AggregatorHandle {
    receiver: Receiver<Result<Fix>>,
    stop: Arc<AtomicBool>,
    thread: JoinHandle<Result<AggregatorStats>>,
}

impl AggregatorHandle {
    /// Fixes in capture order; `Err` items are burst failures
    pub fn receiver(&self) -> &Receiver<Result<Fix>> {
        &self.receiver
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Stop the aggregator and wait for it
    ///
    /// Returns the fatal device error if that is what ended the thread.
    pub fn join(self) -> Result<AggregatorStats> {
        let AggregatorHandle {
            receiver,
            stop,
            thread,
        } = self;
        stop.store(true, Ordering::SeqCst);
        // unblocks a pending send
        drop(receiver);
        thread
            .join()
            .map_err(|_| TrakError::Device("aggregator thread panicked".to_string()))?
    }
}

/// Start an aggregator thread over `source`
///
/// With the default `handoff_capacity` of zero the thread blocks on every fix
/// until the consumer takes it, which also pauses reading.
pub fn spawn<S, C>(source: S, clock: C, config: AggregatorConfig) -> Result<AggregatorHandle>
where
    S: ByteSource + 'static,
    C: Clock + 'static,
{
    let (sender, receiver) = sync_channel(config.handoff_capacity);
    let aggregator = FrameAggregator::new(source, clock, config);
    let stop = aggregator.stop_handle();

    let thread = std::thread::Builder::new()
        .name("nmea-aggregator".to_string())
        .spawn(move || aggregator.run(sender))?;

    Ok(AggregatorHandle {
        receiver,
        stop,
        thread,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::parser::sentence::frame_sentence;
    use crate::parser::source::ChunkSource;

    fn gll(lat: &str, long: &str) -> String {
        frame_sentence(&format!("GPGLL,{},N,{},W,161229.487,A,A", lat, long))
    }

    fn burst(sentences: &[String]) -> String {
        let mut text = sentences.join("\r\n");
        text.push_str("\r\n");
        text
    }

    fn aggregator(source: ChunkSource, clock: &ManualClock) -> FrameAggregator<ChunkSource, ManualClock> {
        FrameAggregator::new(source, clock.clone(), AggregatorConfig::default())
    }

    #[test]
    fn test_burst_split_across_two_reads() {
        let full = burst(&[
            gll("3723.2475", "12158.3416"),
            frame_sentence("GPGGA,092750.000,5321.6802,N,00630.3372,W,1,8,1.03,61.7,M,55.2,M,,"),
            frame_sentence("GPVTG,309.62,T,,M,13.00,N,24.08,K,A"),
        ]);
        let (first, second) = full.split_at(30);
        let clock = ManualClock::starting_at(5_000_000);
        let mut agg = aggregator(ChunkSource::new().data(first).data(second), &clock);

        match agg.next_step().unwrap() {
            AggregatorStep::Fix(fix) => {
                assert!((fix.lat - 37.387458).abs() < 1e-5);
                assert_eq!(fix.num_satellites, 8);
                assert!((fix.speed_mph - 13.0).abs() < 1e-3);
                // stamped after the 100ms re-read delay
                assert_eq!(fix.captured_at_us, 5_100_000);
            }
            other => panic!("expected fix, got {:?}", other),
        }
        assert!(matches!(agg.next_step().unwrap(), AggregatorStep::Stopped));
    }

    #[test]
    fn test_idle_reads_back_off() {
        let clock = ManualClock::starting_at(0);
        let source = ChunkSource::new()
            .idle()
            .idle()
            .data(burst(&[gll("3723.2475", "12158.3416")]))
            .idle();
        let mut agg = aggregator(source, &clock);

        match agg.next_step().unwrap() {
            AggregatorStep::Fix(fix) => assert_eq!(fix.captured_at_us, 200_000),
            other => panic!("expected fix, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_and_positionless_bursts_are_dropped() {
        let clock = ManualClock::starting_at(0);
        let mirrored = frame_sentence("GPGLL,1215.0000,N,01215.0000,E,161229.487,A,A");
        let source = ChunkSource::new()
            .data(burst(&[mirrored]))
            .idle()
            .data(burst(&[frame_sentence("GPVTG,309.62,T,,M,13.00,N,24.08,K,A")]))
            .idle()
            .data(burst(&[gll("3723.2475", "12158.3416")]))
            .idle();
        let mut agg = aggregator(source, &clock);

        match agg.next_step().unwrap() {
            AggregatorStep::Fix(fix) => assert!(fix.is_valid()),
            other => panic!("expected fix, got {:?}", other),
        }
        assert_eq!(agg.stats().dropped, 2);
        assert_eq!(agg.stats().fixes, 1);
    }

    #[test]
    fn test_zero_latitude_and_mirrored_bursts_are_dropped() {
        let clock = ManualClock::starting_at(0);
        let equator = frame_sentence("GPGLL,0000.0000,N,08900.0000,W,161229.487,A,A");
        let mirrored = frame_sentence("GPGLL,3700.0000,S,03700.0000,W,161229.487,A,A");
        let source = ChunkSource::new()
            .data(burst(&[equator]))
            .idle()
            .data(burst(&[mirrored]))
            .idle();
        let mut agg = aggregator(source, &clock);

        assert!(matches!(agg.next_step().unwrap(), AggregatorStep::Stopped));
        assert_eq!(agg.stats().dropped, 2);
        assert_eq!(agg.stats().fixes, 0);
    }

    #[test]
    fn test_decode_failure_recovers_with_more_data() {
        let clock = ManualClock::starting_at(1_000_000);
        let source = ChunkSource::new()
            .data("$GPGLL,37*00\r\n")
            .idle()
            .data(burst(&[gll("3723.2475", "12158.3416")]))
            .idle();
        let mut agg = aggregator(source, &clock);

        match agg.next_step().unwrap() {
            AggregatorStep::Fix(fix) => assert_eq!(fix.captured_at_us, 1_200_000),
            other => panic!("expected fix, got {:?}", other),
        }
        assert_eq!(agg.stats().bursts, 2);
    }

    #[test]
    fn test_burst_failure_after_three_attempts() {
        let clock = ManualClock::starting_at(0);
        let source = ChunkSource::new()
            .data("$GPGLL,bad*00\r\n")
            .idle()
            .data("$GPGGA,bad*00\r\n")
            .idle()
            .data("$GPVTG,bad*00\r\n")
            .idle()
            .data(burst(&[gll("3723.2475", "12158.3416")]))
            .idle();
        let mut agg = aggregator(source, &clock);

        match agg.next_step().unwrap() {
            AggregatorStep::Failed(TrakError::Burst { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected burst failure, got {:?}", other),
        }
        // the aggregator keeps going after a failed burst
        assert!(matches!(agg.next_step().unwrap(), AggregatorStep::Fix(_)));
        assert_eq!(agg.stats().failed_bursts, 1);
    }

    #[test]
    fn test_device_error_is_fatal() {
        let clock = ManualClock::starting_at(0);
        let mut agg = aggregator(ChunkSource::new().then_fail("unplugged"), &clock);
        assert!(matches!(agg.next_step(), Err(TrakError::Device(_))));
    }

    #[test]
    fn test_stop_flag() {
        let clock = ManualClock::starting_at(0);
        let mut agg = aggregator(
            ChunkSource::new().data(burst(&[gll("3723.2475", "12158.3416")])),
            &clock,
        );
        agg.stop_handle().store(true, Ordering::SeqCst);
        assert!(matches!(agg.next_step().unwrap(), AggregatorStep::Stopped));
    }

    #[test]
    fn test_threaded_handoff_in_order() {
        let clock = ManualClock::starting_at(0);
        let source = ChunkSource::new()
            .data(burst(&[gll("3723.0000", "12158.0000")]))
            .idle()
            .data("$GPGLL,bad*00\r\n")
            .then_fail("unplugged");
        let handle = spawn(source, clock, AggregatorConfig::default()).unwrap();

        let first = handle.receiver().recv().unwrap().unwrap();
        assert!((first.lat - (37.0 + 23.0 / 60.0)).abs() < 1e-9);

        // the device error ends the thread, which hangs up the channel
        assert!(handle.receiver().recv().is_err());
        assert!(matches!(handle.join(), Err(TrakError::Device(_))));
    }

    struct SilentSource;

    impl ByteSource for SilentSource {
        fn read_chunk(&mut self, _buf: &mut [u8]) -> Result<ReadOutcome> {
            Ok(ReadOutcome::Idle)
        }
    }

    #[test]
    fn test_join_stops_idle_thread() {
        let handle = spawn(
            SilentSource,
            ManualClock::starting_at(0),
            AggregatorConfig::default(),
        )
        .unwrap();
        handle.stop();
        let stats = handle.join().unwrap();
        assert_eq!(stats.fixes, 0);
    }
}
