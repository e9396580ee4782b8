use std::collections::VecDeque;

/// Correlates a primary stream against a reference (chopper/trigger) stream.
///
/// Each primary event is measured relative to the latest reference time not
/// exceeding it. Because the two streams arrive in separate, interleaved spills,
/// a primary event is held until a reference strictly later than it has been
/// seen; only then is its reference known for certain.
#[derive(Debug, Clone)]
pub struct StreamCorrelator<T> {
    primary: VecDeque<(f64, T)>,
    reference: VecDeque<f64>,
    max_lookback: f64,
    dropped: u64,
}

impl<T> StreamCorrelator<T> {
    /// A max_lookback of zero (or less) accepts any distance to the reference
    pub fn new(max_lookback: f64) -> Self {
        Self {
            primary: VecDeque::new(),
            reference: VecDeque::new(),
            max_lookback,
            dropped: 0,
        }
    }

    pub fn push_reference(&mut self, time_ns: f64) {
        if let Some(last) = self.reference.back() {
            if time_ns < *last {
                spdlog::warn!(
                    "Reference time {} ns arrived after {} ns and was ignored",
                    time_ns,
                    last
                );
                return;
            }
        }
        self.reference.push_back(time_ns);
        self.trim_references();
    }

    /// Drop references no pending or later primary can pair with.
    ///
    /// Primaries more than max_lookback behind the newest reference are
    /// rejected anyway, so only the latest reference at or before that horizon
    /// (or before the oldest pending primary) is kept.
    fn trim_references(&mut self) {
        if self.max_lookback <= 0.0 {
            return;
        }
        let newest = match self.reference.back() {
            Some(r) => *r,
            None => return,
        };
        let mut needed = newest - self.max_lookback;
        if let Some((oldest, _)) = self.primary.front() {
            needed = needed.min(*oldest);
        }
        while self.reference.len() > 1 && self.reference[1] <= needed {
            self.reference.pop_front();
        }
    }

    /// References held for pairing
    pub fn references(&self) -> usize {
        self.reference.len()
    }

    pub fn push_primary(&mut self, time_ns: f64, payload: T) {
        self.primary.push_back((time_ns, payload));
    }

    /// Primary events waiting for their reference
    pub fn pending(&self) -> usize {
        self.primary.len()
    }

    /// Primary events that never found a usable reference
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Move every primary event whose reference is settled into `out` as
    /// `(time since reference, payload)`.
    pub fn resolve(&mut self, out: &mut Vec<(f64, T)>) {
        self.drain(out, false);
    }

    /// Resolve everything left against the references seen so far
    pub fn flush(&mut self, out: &mut Vec<(f64, T)>) {
        self.drain(out, true);
    }

    pub fn reset(&mut self) {
        self.primary.clear();
        self.reference.clear();
        self.dropped = 0;
    }

    fn drain(&mut self, out: &mut Vec<(f64, T)>, force: bool) {
        loop {
            let time = match self.primary.front() {
                Some((t, _)) => *t,
                None => break,
            };
            if !force {
                match self.reference.back() {
                    Some(newest) if *newest > time => (),
                    _ => break,
                }
            }
            let payload = match self.primary.pop_front() {
                Some((_, p)) => p,
                None => break,
            };

            let idx = self.reference.partition_point(|r| *r <= time);
            if idx == 0 {
                self.dropped += 1;
                continue;
            }
            let delta = time - self.reference[idx - 1];
            if self.max_lookback > 0.0 && delta > self.max_lookback {
                self.dropped += 1;
            } else {
                out.push((delta, payload));
            }

            // Later primaries are never earlier than this one
            while self.reference.len() > 1 && self.reference[1] <= time {
                self.reference.pop_front();
            }
        }
        self.trim_references();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deltas(out: &[(f64, u32)]) -> Vec<f64> {
        out.iter().map(|(d, _)| *d).collect()
    }

    #[test]
    fn test_reference_first() {
        let mut corr = StreamCorrelator::new(0.0);
        let mut out = Vec::new();
        for r in [100.0, 200.0, 300.0] {
            corr.push_reference(r);
        }
        for (i, p) in [150.0, 260.0, 350.0].iter().enumerate() {
            corr.push_primary(*p, i as u32);
        }
        corr.resolve(&mut out);
        assert_eq!(deltas(&out), vec![50.0, 60.0]);
        assert_eq!(corr.pending(), 1);
        corr.flush(&mut out);
        assert_eq!(deltas(&out), vec![50.0, 60.0, 50.0]);
        assert_eq!(out[2].1, 2);
    }

    #[test]
    fn test_interleaved_matches_reference_first() {
        let mut corr = StreamCorrelator::new(0.0);
        let mut out = Vec::new();
        for (i, p) in [150.0, 260.0].iter().enumerate() {
            corr.push_primary(*p, i as u32);
        }
        corr.resolve(&mut out);
        assert!(out.is_empty());
        corr.push_reference(100.0);
        corr.push_reference(200.0);
        corr.resolve(&mut out);
        assert_eq!(deltas(&out), vec![50.0]);
        corr.push_primary(350.0, 2);
        corr.push_reference(300.0);
        corr.resolve(&mut out);
        corr.flush(&mut out);
        assert_eq!(deltas(&out), vec![50.0, 60.0, 50.0]);
    }

    #[test]
    fn test_no_reference_and_lookback() {
        let mut corr = StreamCorrelator::new(100.0);
        let mut out = Vec::new();
        corr.push_primary(50.0, 0);
        corr.push_reference(60.0);
        corr.push_primary(500.0, 1);
        corr.push_reference(1000.0);
        corr.resolve(&mut out);
        assert!(out.is_empty());
        assert_eq!(corr.dropped(), 2);
    }

    #[test]
    fn test_out_of_order_reference_ignored() {
        let mut corr: StreamCorrelator<u32> = StreamCorrelator::new(0.0);
        corr.push_reference(200.0);
        corr.push_reference(100.0);
        corr.push_primary(150.0, 0);
        let mut out = Vec::new();
        corr.flush(&mut out);
        assert!(out.is_empty());
        assert_eq!(corr.dropped(), 1);
    }

    #[test]
    fn test_quiet_primary_keeps_few_references() {
        let mut corr: StreamCorrelator<u32> = StreamCorrelator::new(100.0);
        for i in 0..100_000 {
            corr.push_reference(i as f64 * 10.0);
        }
        let mut out = Vec::new();
        corr.resolve(&mut out);
        assert!(corr.references() <= 12);

        corr.push_primary(999_950.0, 7);
        corr.push_reference(1_000_000.0);
        corr.resolve(&mut out);
        assert_eq!(out, vec![(0.0, 7)]);
    }

    #[test]
    fn test_pending_primary_keeps_its_reference() {
        let mut corr = StreamCorrelator::new(100.0);
        corr.push_reference(0.0);
        corr.push_primary(50.0, 1);
        for i in 1..1000 {
            corr.push_reference(i as f64 * 10.0);
        }
        let mut out = Vec::new();
        corr.resolve(&mut out);
        assert_eq!(deltas(&out), vec![0.0]);
        assert!(corr.references() <= 12);
    }
}
