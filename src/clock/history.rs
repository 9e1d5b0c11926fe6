/// Fixed-capacity ring of the most recent `N` intervals, in microseconds.
///
/// `N` must be a power of two; indices wrap with a mask.
#[derive(Debug, Clone)]
pub struct IntervalHistory<const N: usize> {
    samples: [i64; N],
    head: usize,
    len: usize,
}

impl<const N: usize> Default for IntervalHistory<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> IntervalHistory<N> {
    const MASK: usize = {
        assert!(N > 0 && N.is_power_of_two(), "history length must be a power of two");
        N - 1
    };

    pub fn new() -> Self {
        Self {
            samples: [0; N],
            head: 0,
            len: 0,
        }
    }

    pub fn push(&mut self, interval: i64) {
        self.samples[self.head] = interval;
        self.head = (self.head + 1) & Self::MASK;
        if self.len < N {
            self.len += 1;
        }
    }

    /// Number of valid samples, saturating at `N`.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == N
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Mean of the valid samples, or `None` when fewer than `min_samples` exist.
    pub fn average(&self, min_samples: usize) -> Option<i64> {
        if self.len == 0 || self.len < min_samples {
            return None;
        }
        let sum: i64 = self.samples[..self.len].iter().sum();
        Some(sum / self.len as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_requires_minimum_samples() {
        let mut hist = IntervalHistory::<8>::new();
        hist.push(100);
        hist.push(200);
        assert_eq!(hist.average(3), None);
        hist.push(300);
        assert_eq!(hist.average(3), Some(200));
    }

    #[test]
    fn oldest_samples_are_overwritten() {
        let mut hist = IntervalHistory::<2>::new();
        hist.push(1_000);
        hist.push(2_000);
        hist.push(4_000);
        assert!(hist.is_full());
        assert_eq!(hist.len(), 2);
        assert_eq!(hist.average(2), Some(3_000));
    }

    #[test]
    fn clear_forgets_everything() {
        let mut hist = IntervalHistory::<8>::new();
        for i in 0..20 {
            hist.push(i);
        }
        hist.clear();
        assert!(hist.is_empty());
        assert_eq!(hist.average(1), None);
    }
}
