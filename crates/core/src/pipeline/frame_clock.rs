use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

/// Paces the detection loop.
///
/// Ticks are delivered through a capacity-one channel: a consumer that falls
/// behind sees a single pending tick, never a backlog.
pub struct FrameClock {
    ticks: Receiver<Instant>,
    period: Option<Duration>,
}

impl FrameClock {
    /// Ticks once per display refresh.
    pub fn display(refresh_hz: u32) -> Self {
        let period = Duration::from_secs_f64(1.0 / refresh_hz.max(1) as f64);
        Self {
            ticks: crossbeam_channel::tick(period),
            period: Some(period),
        }
    }

    /// Clock driven by hand, one tick per [`ClockDriver::tick`].
    pub fn manual() -> (Self, ClockDriver) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        (
            Self {
                ticks: rx,
                period: None,
            },
            ClockDriver { tx },
        )
    }

    pub fn ticks(&self) -> &Receiver<Instant> {
        &self.ticks
    }

    /// Tick interval, `None` for manual clocks.
    pub fn period(&self) -> Option<Duration> {
        self.period
    }
}

pub struct ClockDriver {
    tx: Sender<Instant>,
}

impl ClockDriver {
    /// Returns `false` when a tick is already pending and this one was dropped.
    pub fn tick(&self) -> bool {
        self.tx.try_send(Instant::now()).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::sixty(60, 16_666)]
    #[case::thirty(30, 33_333)]
    #[case::zero_clamped(0, 1_000_000)]
    fn test_display_period(#[case] hz: u32, #[case] expected_us: u128) {
        let clock = FrameClock::display(hz);
        assert_eq!(clock.period().unwrap().as_micros(), expected_us);
    }

    #[test]
    fn test_display_clock_ticks() {
        let clock = FrameClock::display(200);
        assert!(clock.ticks().recv_timeout(Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_manual_clock_drops_missed_ticks() {
        let (clock, driver) = FrameClock::manual();
        assert!(driver.tick());
        assert!(!driver.tick());

        assert!(clock.ticks().try_recv().is_ok());
        assert!(clock.ticks().try_recv().is_err());
        assert!(clock.period().is_none());
    }
}
