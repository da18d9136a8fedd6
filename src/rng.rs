/// Small seeded generator (mulberry32). Every random decision of a round goes
/// through one instance so a seed replays the same round.
#[derive(Clone, Debug)]
pub struct Rng {
    seed: u32,
}

impl Rng {
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }

    /// Uniform in `[0, 1)`.
    pub fn next_f32(&mut self) -> f32 {
        self.seed = self.seed.wrapping_add(0x6d2b79f5);
        let mut t = self.seed;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        let out = t ^ (t >> 14);
        // f32 rounding can land on 1.0 for outputs near u32::MAX.
        ((out as f64 / 4_294_967_296.0) as f32).min(1.0 - f32::EPSILON)
    }

    /// Uniform in `[min, max)`; returns `min` for an empty range.
    pub fn range_f32(&mut self, min: f32, max: f32) -> f32 {
        if max <= min {
            return min;
        }
        min + self.next_f32() * (max - min)
    }

    pub fn pick_index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        (self.next_f32() * len as f32).floor().min((len - 1) as f32) as usize
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for idx in (1..items.len()).rev() {
            let other = self.pick_index(idx + 1);
            items.swap(idx, other);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_yields_same_sequence() {
        let mut a = Rng::new(7);
        let mut b = Rng::new(7);
        for _ in 0..100 {
            assert_eq!(a.next_f32().to_bits(), b.next_f32().to_bits());
        }
    }

    #[test]
    fn next_f32_stays_in_unit_interval() {
        let mut rng = Rng::new(99);
        for _ in 0..10_000 {
            let value = rng.next_f32();
            assert!((0.0..1.0).contains(&value));
        }
    }

    #[test]
    fn range_f32_respects_bounds_and_empty_range() {
        let mut rng = Rng::new(3);
        for _ in 0..1_000 {
            let value = rng.range_f32(10.0, 20.0);
            assert!((10.0..20.0).contains(&value));
        }
        assert_eq!(rng.range_f32(5.0, 5.0), 5.0);
        assert_eq!(rng.range_f32(5.0, 1.0), 5.0);
    }

    #[test]
    fn shuffle_keeps_every_element() {
        let mut rng = Rng::new(11);
        let mut letters: Vec<char> = ('A'..='Z').collect();
        rng.shuffle(&mut letters);
        let mut sorted = letters.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, ('A'..='Z').collect::<Vec<_>>());
    }
}
