//! Decreasing chunk sizes.

use diskfill_disk_space_allocation::ByteSize;

/// The decreasing distribution of a budget over a number of targets.
///
/// Every target but the last gets half of what remains, the last one gets
/// everything that is left. The remaining budget is reduced by each yielded
/// chunk, no matter what happens to the allocation of that chunk.
#[derive(Debug, Clone)]
pub struct Decreasing {
    /// The budget that is not handed out yet.
    remaining: ByteSize,
    /// The amount of targets still waiting for their chunk.
    targets_left: usize,
}

impl Decreasing {
    /// Create a new [`Decreasing`] distribution of the `total` budget over
    /// `targets` targets.
    pub fn new(total: ByteSize, targets: usize) -> Self {
        Self {
            remaining: total,
            targets_left: targets,
        }
    }

    /// The budget that is not handed out yet.
    pub fn remaining(&self) -> ByteSize {
        self.remaining
    }
}

impl Iterator for Decreasing {
    type Item = ByteSize;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk = match self.targets_left {
            0 => return None,
            1 => self.remaining,
            _ => self.remaining / 2,
        };
        self.remaining -= chunk;
        self.targets_left -= 1;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.targets_left, Some(self.targets_left))
    }
}

impl ExactSizeIterator for Decreasing {}

#[cfg(test)]
mod tests {
    use super::Decreasing;
    use pretty_assertions::assert_eq;

    fn test(total: u64, targets: usize, expected: &[u64]) {
        let actual: Vec<u64> = Decreasing::new(total, targets).collect();
        assert_eq!(actual, expected, "results don't match, expected is right");
    }

    #[test]
    fn no_targets() {
        test(1000, 0, &[]);
    }

    #[test]
    fn single_target_takes_everything() {
        test(1000, 1, &[1000]);
        test(0, 1, &[0]);
        test(u64::MAX, 1, &[u64::MAX]);
    }

    #[test]
    fn three_targets() {
        test(1000, 3, &[500, 250, 250]);
    }

    #[test]
    fn odd_budget() {
        test(7, 3, &[3, 2, 2]);
    }

    #[test]
    fn budget_smaller_than_targets() {
        test(1, 4, &[0, 0, 0, 1]);
    }

    #[test]
    fn zero_budget() {
        test(0, 3, &[0, 0, 0]);
    }

    #[test]
    fn halving_invariant() {
        for total in [0, 1, 2, 3, 999, 1000, 1 << 40, u64::MAX] {
            for targets in 1..=70 {
                let mut distribution = Decreasing::new(total, targets);
                let mut sum: u128 = 0;
                for index in 0..targets {
                    let remaining = distribution.remaining();
                    let chunk = distribution.next().unwrap();
                    if index < targets - 1 {
                        assert_eq!(chunk, remaining / 2);
                    } else {
                        assert_eq!(chunk, remaining);
                    }
                    sum += u128::from(chunk);
                }
                assert_eq!(distribution.next(), None);
                assert_eq!(distribution.remaining(), 0);
                assert_eq!(sum, u128::from(total));
            }
        }
    }

    #[test]
    fn exact_size() {
        let mut distribution = Decreasing::new(100, 5);
        assert_eq!(distribution.len(), 5);
        distribution.next();
        assert_eq!(distribution.len(), 4);
    }
}
