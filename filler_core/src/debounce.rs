//! Mechanical switch debouncing.

/// Per-channel debouncer for a pulled-up, active-low push button.
///
/// A raw level change is committed only after `samples_stable` consecutive
/// identical samples, and the released→pressed edge (electrical high→low)
/// is reported at most once per physical press. Multiple buttons debounce
/// independently; there is no priority between channels.
#[derive(Debug, Clone)]
pub struct Debouncer {
    samples_stable: u8,
    last_raw: bool,
    stable: bool,
    run_len: u8,
}

impl Debouncer {
    /// `initial_level` is the raw pin level at init time (idle reads high),
    /// so a button held across boot does not register as a press.
    pub fn new(samples_stable: u8, initial_level: bool) -> Self {
        Self {
            samples_stable: samples_stable.max(1),
            last_raw: initial_level,
            stable: initial_level,
            run_len: 0,
        }
    }

    /// Feed one raw sample (true = electrically high).
    /// Returns true exactly when a stable released→pressed edge commits.
    pub fn sample(&mut self, level: bool) -> bool {
        if level == self.last_raw {
            // saturate so a held button cannot wrap the counter
            if self.run_len < self.samples_stable {
                self.run_len += 1;
            }
        } else {
            self.last_raw = level;
            self.run_len = 0;
            return false;
        }

        if self.run_len >= self.samples_stable && self.stable != self.last_raw {
            let was = self.stable;
            self.stable = self.last_raw;
            // pulled-up wiring: high -> low is the press
            return was && !self.stable;
        }
        false
    }

    /// Debounced pressed state (active low).
    pub fn is_pressed(&self) -> bool {
        !self.stable
    }
}

#[cfg(test)]
mod tests {
    use super::Debouncer;

    #[test]
    fn release_edge_emits_nothing() {
        let mut d = Debouncer::new(2, true);
        let presses: usize = (0..5).filter(|_| d.sample(false)).count();
        assert_eq!(presses, 1);
        assert!(d.is_pressed());

        let releases: usize = (0..5).filter(|_| d.sample(true)).count();
        assert_eq!(releases, 0);
        assert!(!d.is_pressed());
    }

    #[test]
    fn samples_stable_clamps_to_one() {
        let mut d = Debouncer::new(0, true);
        assert!(!d.sample(false)); // level change resets the run
        assert!(d.sample(false)); // one agreeing sample commits
    }
}
