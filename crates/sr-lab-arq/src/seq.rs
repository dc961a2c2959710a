use sr_lab_abstract::ConfigError;

/// Modular sequence-number space of size `2 * window_size`.
///
/// Every ordering question about sequence numbers goes through this type; raw `<=`
/// on sequence numbers is wrong as soon as the counter wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqSpace {
    window_size: u32,
    limit: u32,
}

impl SeqSpace {
    pub fn new(window_size: u32) -> Result<Self, ConfigError> {
        if window_size == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        let limit = window_size
            .checked_mul(2)
            .ok_or(ConfigError::WindowTooLarge(window_size))?;
        Ok(Self { window_size, limit })
    }

    pub fn window_size(&self) -> u32 {
        self.window_size
    }

    /// Exclusive upper bound of valid sequence numbers.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn next(&self, seq: u32) -> u32 {
        self.add(seq, 1)
    }

    pub fn prev(&self, seq: u32) -> u32 {
        self.add(seq, self.limit - 1)
    }

    pub fn add(&self, seq: u32, n: u32) -> u32 {
        ((seq as u64 + n as u64) % self.limit as u64) as u32
    }

    /// Steps needed to walk forward from `from` to `to`.
    pub fn distance(&self, from: u32, to: u32) -> u32 {
        let limit = self.limit as u64;
        ((to as u64 % limit + limit - from as u64 % limit) % limit) as u32
    }

    /// `a <= b` under wraparound: `b` is less than half the space ahead of `a`.
    pub fn is_le(&self, a: u32, b: u32) -> bool {
        self.distance(a, b) < self.limit / 2
    }

    /// Whether `seq` is one of the `window_size` numbers starting at `base`.
    pub fn in_window(&self, base: u32, seq: u32) -> bool {
        self.distance(base, seq) < self.window_size
    }
}

#[cfg(test)]
mod tests {
    use super::SeqSpace;

    #[test]
    fn rejects_empty_window() {
        assert!(SeqSpace::new(0).is_err());
    }

    #[test]
    fn next_and_prev_wrap() {
        let space = SeqSpace::new(4).unwrap();
        assert_eq!(space.limit(), 8);
        assert_eq!(space.next(7), 0);
        assert_eq!(space.prev(0), 7);
        assert_eq!(space.add(6, 5), 3);
    }

    #[test]
    fn window_membership_matches_modular_distance() {
        for window in 1..=5u32 {
            let space = SeqSpace::new(window).unwrap();
            let limit = space.limit();
            for base in 0..limit {
                let members: Vec<u32> = (0..window).map(|i| (base + i) % limit).collect();
                for seq in 0..limit {
                    assert_eq!(
                        space.in_window(base, seq),
                        members.contains(&seq),
                        "window={window} base={base} seq={seq}"
                    );
                }
            }
        }
    }

    #[test]
    fn ordering_matches_modular_distance() {
        for window in 1..=5u32 {
            let space = SeqSpace::new(window).unwrap();
            let limit = space.limit();
            for a in 0..limit {
                for b in 0..limit {
                    let forward = (b + limit - a) % limit;
                    assert_eq!(
                        space.is_le(a, b),
                        forward < limit / 2,
                        "window={window} a={a} b={b}"
                    );
                }
                assert!(space.is_le(a, a));
            }
        }
    }

    #[test]
    fn ordering_across_wraparound() {
        let space = SeqSpace::new(4).unwrap();
        assert!(space.is_le(6, 1));
        assert!(!space.is_le(1, 6));
        assert!(space.is_le(7, 0));
        assert!(!space.is_le(0, 7));
    }

    #[test]
    fn acknowledged_prefix_is_le_but_tail_is_not() {
        // With window W, the W in-flight numbers after `base` split cleanly at any ack.
        for window in 1..=6u32 {
            let space = SeqSpace::new(window).unwrap();
            let limit = space.limit();
            for base in 0..limit {
                for k in 0..window {
                    let ack = space.add(base, k);
                    for i in 0..window {
                        let seq = space.add(base, i);
                        assert_eq!(space.is_le(seq, ack), i <= k);
                    }
                }
            }
        }
    }
}
