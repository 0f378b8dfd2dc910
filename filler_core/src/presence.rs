//! Bottle presence detection from noisy range readings.

/// Stability filter over instantaneous distance-threshold comparisons.
///
/// The stable value flips only after `samples_stable` consecutive samples
/// that disagree with it; any agreeing sample resets the pending change, so
/// a single noisy outlier can never flip the reading. An echo timeout
/// (`None`) reads as "absent" for that sample, never as "present", failing
/// toward pump safety.
#[derive(Debug, Clone)]
pub struct PresenceFilter {
    threshold_cm: f32,
    samples_stable: u8,
    stable: bool,
    disagree: u8,
}

impl PresenceFilter {
    pub fn new(threshold_cm: f32, samples_stable: u8) -> Self {
        Self {
            threshold_cm,
            samples_stable: samples_stable.max(1),
            // no bottle assumed at boot
            stable: false,
            disagree: 0,
        }
    }

    /// Feed one distance measurement. Returns `Some(new_value)` only when
    /// the stable value commits, so the caller publishes to the shared
    /// store at most once per actual change.
    pub fn sample(&mut self, distance_cm: Option<f32>) -> Option<bool> {
        let instant = matches!(distance_cm, Some(d) if d.is_finite() && d < self.threshold_cm);

        if instant == self.stable {
            self.disagree = 0;
            return None;
        }

        if self.disagree < u8::MAX {
            self.disagree += 1;
        }
        if self.disagree >= self.samples_stable {
            self.stable = instant;
            self.disagree = 0;
            return Some(instant);
        }
        None
    }

    pub fn is_present(&self) -> bool {
        self.stable
    }
}

#[cfg(test)]
mod tests {
    use super::PresenceFilter;

    #[test]
    fn timeout_reads_as_absent() {
        let mut f = PresenceFilter::new(10.0, 1);
        assert_eq!(f.sample(Some(5.0)), Some(true));
        assert_eq!(f.sample(None), Some(false));
    }

    #[test]
    fn nan_distance_reads_as_absent() {
        let mut f = PresenceFilter::new(10.0, 1);
        assert_eq!(f.sample(Some(f32::NAN)), None);
        assert!(!f.is_present());
    }
}
