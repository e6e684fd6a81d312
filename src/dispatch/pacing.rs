//! Delays between attempts, modelled as explicit points in the run

use std::{thread, time::Duration};

use crate::error::{self, Error};

/// Where a pause happens in the run
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum DelayPoint {
    /// After any attempt that is not the last
    AfterMessage,
    /// After every `batch_size`-th attempt that is not the last
    AfterBatch,
}

/// How fast recipients are attempted
///
/// `batch_size` is at least 1.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct PacingPolicy {
    message_delay: Duration,
    batch_size: usize,
    batch_pause: Duration,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            message_delay: Duration::ZERO,
            batch_size: 10,
            batch_pause: Duration::ZERO,
        }
    }
}

impl PacingPolicy {
    /// Creates a policy, rejecting an empty batch
    pub fn new(
        message_delay: Duration,
        batch_size: usize,
        batch_pause: Duration,
    ) -> Result<Self, Error> {
        if batch_size == 0 {
            return Err(error::configuration("batch size must be at least 1"));
        }

        Ok(Self {
            message_delay,
            batch_size,
            batch_pause,
        })
    }

    /// Delay after every attempt but the last
    pub fn message_delay(&self) -> Duration {
        self.message_delay
    }

    /// Attempts per batch
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Pause between two batches
    pub fn batch_pause(&self) -> Duration {
        self.batch_pause
    }

    /// The pauses due after attempt `attempt` (1-based) of `total`, in order
    ///
    /// Nothing follows the last attempt.
    pub fn delay_points(&self, attempt: usize, total: usize) -> Vec<(DelayPoint, Duration)> {
        let mut points = Vec::with_capacity(2);
        if attempt >= total {
            return points;
        }

        points.push((DelayPoint::AfterMessage, self.message_delay));
        if attempt % self.batch_size == 0 {
            points.push((DelayPoint::AfterBatch, self.batch_pause));
        }
        points
    }
}

/// Waits at a delay point
pub trait Pacer {
    /// Blocks for `duration` at `point`
    fn pause(&mut self, point: DelayPoint, duration: Duration);
}

/// Sleeps the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&mut self, _point: DelayPoint, duration: Duration) {
        if duration.is_zero() {
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("pausing {:?} at {:?}", duration, _point);
        thread::sleep(duration);
    }
}

impl<P: Pacer + ?Sized> Pacer for &mut P {
    fn pause(&mut self, point: DelayPoint, duration: Duration) {
        (**self).pause(point, duration);
    }
}
