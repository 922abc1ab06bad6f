use std::time::Duration;

/// Admits captured frames to detection at a target processing rate.
///
/// The camera usually captures faster than the detector should run. Frames
/// are admitted on a fixed schedule derived from their capture timestamps;
/// frames that arrive before the next slot are skipped. A small slack absorbs
/// capture-clock jitter so a 30 fps camera feeding a 30 fps target does not
/// alias down to 15 fps.
pub struct FrameThrottle {
    interval: Duration,
    slack: Duration,
    next_due: Option<Duration>,
}

impl FrameThrottle {
    pub fn new(target_fps: f64) -> Result<Self, &'static str> {
        if !(target_fps.is_finite() && target_fps > 0.0) {
            return Err("target_fps must be a positive number");
        }
        let interval = Duration::try_from_secs_f64(1.0 / target_fps)
            .map_err(|_| "target_fps is too small")?;
        Ok(Self {
            interval,
            slack: interval / 10,
            next_due: None,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns whether the frame captured at `timestamp` should be processed.
    pub fn admit(&mut self, timestamp: Duration) -> bool {
        let due = match self.next_due {
            None => {
                self.next_due = Some(timestamp + self.interval);
                return true;
            }
            Some(due) => due,
        };

        // Timestamps going backwards mean the capture clock restarted.
        if timestamp + self.interval < due {
            self.next_due = Some(timestamp + self.interval);
            return true;
        }

        if timestamp + self.slack < due {
            return false;
        }

        let next = due + self.interval;
        // After a stall, resynchronize instead of admitting a burst.
        self.next_due = Some(if next <= timestamp {
            timestamp + self.interval
        } else {
            next
        });
        true
    }

    pub fn reset(&mut self) {
        self.next_due = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn admitted(throttle: &mut FrameThrottle, capture_fps: f64, frames: usize) -> usize {
        (0..frames)
            .map(|i| Duration::from_secs_f64(i as f64 / capture_fps))
            .filter(|ts| throttle.admit(*ts))
            .count()
    }

    #[test]
    fn test_first_frame_always_admitted() {
        let mut throttle = FrameThrottle::new(1.0).unwrap();
        assert!(throttle.admit(Duration::from_millis(500)));
    }

    #[rstest]
    #[case::same_rate(30.0, 30.0, 90, 90)]
    #[case::half_rate(30.0, 15.0, 90, 45)]
    #[case::third_rate(30.0, 10.0, 90, 30)]
    #[case::target_above_capture(15.0, 30.0, 30, 30)]
    fn test_admission_rate(
        #[case] capture_fps: f64,
        #[case] target_fps: f64,
        #[case] frames: usize,
        #[case] expected: usize,
    ) {
        let mut throttle = FrameThrottle::new(target_fps).unwrap();
        assert_eq!(admitted(&mut throttle, capture_fps, frames), expected);
    }

    #[test]
    fn test_stall_does_not_cause_burst() {
        let mut throttle = FrameThrottle::new(10.0).unwrap();
        assert!(throttle.admit(Duration::from_millis(0)));
        // Two seconds of nothing, then frames resume at 30 fps.
        assert!(throttle.admit(Duration::from_millis(2000)));
        assert!(!throttle.admit(Duration::from_millis(2033)));
        assert!(!throttle.admit(Duration::from_millis(2066)));
        assert!(throttle.admit(Duration::from_millis(2100)));
    }

    #[test]
    fn test_backwards_timestamp_restarts_schedule() {
        let mut throttle = FrameThrottle::new(10.0).unwrap();
        assert!(throttle.admit(Duration::from_millis(5000)));
        assert!(throttle.admit(Duration::from_millis(0)));
        assert!(!throttle.admit(Duration::from_millis(50)));
        assert!(throttle.admit(Duration::from_millis(100)));
    }

    #[test]
    fn test_reset_readmits_immediately() {
        let mut throttle = FrameThrottle::new(1.0).unwrap();
        assert!(throttle.admit(Duration::from_millis(0)));
        assert!(!throttle.admit(Duration::from_millis(10)));
        throttle.reset();
        assert!(throttle.admit(Duration::from_millis(20)));
    }

    #[rstest]
    #[case(0.0)]
    #[case(-5.0)]
    #[case(f64::NAN)]
    #[case(1e-20)]
    fn test_invalid_rate_errors(#[case] fps: f64) {
        assert!(FrameThrottle::new(fps).is_err());
    }
}
