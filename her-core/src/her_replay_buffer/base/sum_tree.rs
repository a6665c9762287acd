//! Sum tree for prioritized sampling.
use segment_tree::{ops::MinIgnoreNaN, SegmentPoint};
use serde::{Deserialize, Serialize};

/// Specifies how to normalize the importance weights in a prioritized batch.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
pub enum WeightNormalizer {
    /// Normalize weights by the maximum weight of all samples in the buffer.
    All,

    /// Normalize weights by the maximum weight of samples in the batch.
    Batch,
}

/// Binary tree of priorities, each internal node holding the sum of its children.
///
/// Stored priorities are `(|p| + eps)^alpha`. Leaf `i` corresponds to slot `i`
/// of the replay buffer.
#[derive(Debug)]
pub struct SumTree {
    eps: f32,
    alpha: f32,
    capacity: usize,
    n_samples: usize,
    tree: Vec<f32>,
    min_tree: SegmentPoint<f32, MinIgnoreNaN>,
    max_priority: f32,
    normalize: WeightNormalizer,
}

impl SumTree {
    /// Creates a sum tree with `capacity` leaves.
    pub fn new(capacity: usize, alpha: f32, eps: f32, normalize: WeightNormalizer) -> Self {
        Self {
            eps,
            alpha,
            capacity,
            n_samples: 0,
            tree: vec![0f32; 2 * capacity - 1],
            min_tree: SegmentPoint::build(vec![f32::MAX; capacity], MinIgnoreNaN),
            max_priority: 1.0,
            normalize,
        }
    }

    fn propagate(&mut self, ix: usize, change: f32) {
        let parent = (ix - 1) / 2;
        self.tree[parent] += change;
        if parent != 0 {
            self.propagate(parent, change);
        }
    }

    fn retrieve(&self, ix: usize, s: f32) -> usize {
        let left = 2 * ix + 1;
        let right = left + 1;

        if left >= self.tree.len() {
            return ix;
        }

        if s <= self.tree[left] || self.tree[right] == 0f32 {
            self.retrieve(left, s)
        } else {
            self.retrieve(right, s - self.tree[left])
        }
    }

    /// Sum of the stored priorities.
    pub fn total(&self) -> f32 {
        self.tree[0]
    }

    /// Number of leaves holding a priority.
    pub fn len(&self) -> usize {
        self.n_samples
    }

    /// Returns `true` if no priority has been added.
    pub fn is_empty(&self) -> bool {
        self.n_samples == 0
    }

    /// Largest raw priority seen so far, given to new transitions.
    pub fn max(&self) -> f32 {
        self.max_priority
    }

    /// Stored value of leaf `ix`.
    pub fn priority(&self, ix: usize) -> f32 {
        self.tree[ix + self.capacity - 1]
    }

    /// Adds a raw priority at leaf `ix`.
    pub fn add(&mut self, ix: usize, p: f32) {
        debug_assert!(ix < self.capacity);
        self.update(ix, p);
        if self.n_samples < self.capacity {
            self.n_samples += 1;
        }
    }

    /// Updates the raw priority at leaf `ix`.
    pub fn update(&mut self, ix: usize, p: f32) {
        debug_assert!(ix < self.capacity);
        let p = if p.is_finite() { p.abs() } else { self.max_priority };
        self.max_priority = self.max_priority.max(p);

        let p = (p + self.eps).powf(self.alpha);
        self.min_tree.modify(ix, p);
        let ix = ix + self.capacity - 1;
        let change = p - self.tree[ix];
        self.tree[ix] = p;
        if ix > 0 {
            self.propagate(ix, change);
        }
    }

    /// Gets the leaf where the cumulative sum of priorities reaches `s`.
    pub fn get(&self, s: f32) -> usize {
        let ix = self.retrieve(0, s);
        debug_assert!(ix >= (self.capacity - 1));
        (ix + 1 - self.capacity).min(self.n_samples.saturating_sub(1))
    }

    /// Samples indices for a batch and returns the importance weights.
    ///
    /// The weight is $w_i=\left(N P(i)\right)^{-\beta}$, normalized by its maximum
    /// over the batch or over all stored samples.
    pub fn sample(
        &self,
        batch_size: usize,
        beta: f32,
        rng: &mut fastrand::Rng,
    ) -> (Vec<usize>, Vec<f32>) {
        let p_sum = self.total();
        let seg = p_sum / batch_size as f32;
        let indices = (0..batch_size)
            .map(|i| self.get(seg * (i as f32 + rng.f32())))
            .collect::<Vec<_>>();

        let n = self.n_samples as f32 / p_sum;
        let ws = indices
            .iter()
            .map(|&ix| (n * self.priority(ix)).powf(-beta))
            .collect::<Vec<_>>();

        let w_max_inv = match self.normalize {
            WeightNormalizer::All => (n * self.min_tree.query(0, self.n_samples)).powf(beta),
            WeightNormalizer::Batch => 1f32 / ws.iter().fold(f32::MIN_POSITIVE, |m, &v| v.max(m)),
        };
        let ws = ws.iter().map(|w| w * w_max_inv).collect();

        (indices, ws)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_tree_odd() {
        let data = vec![0.5f32, 0.2, 0.8, 0.3, 1.1, 2.5, 3.9];
        let mut sum_tree = SumTree::new(8, 1.0, 0.0, WeightNormalizer::Batch);
        for ix in 0..data.len() {
            sum_tree.add(ix, data[ix]);
        }

        assert!((sum_tree.total() - data.iter().sum::<f32>()).abs() < 1e-5);
        assert_eq!(sum_tree.get(0.0), 0);
        assert_eq!(sum_tree.get(0.4), 0);
        assert_eq!(sum_tree.get(0.5), 0);
        assert_eq!(sum_tree.get(0.6), 1);
        assert_eq!(sum_tree.get(1.2), 2);
        assert_eq!(sum_tree.get(1.6), 3);
        assert_eq!(sum_tree.get(2.0), 4);
        assert_eq!(sum_tree.get(2.8), 4);
        assert_eq!(sum_tree.max(), 3.9);
    }

    #[test]
    fn test_sample_frequency() {
        let data = vec![1.0f32, 3.0, 0.0, 4.0];
        let mut sum_tree = SumTree::new(4, 1.0, 0.0, WeightNormalizer::Batch);
        for ix in 0..data.len() {
            sum_tree.add(ix, data[ix]);
        }

        let mut rng = fastrand::Rng::with_seed(42);
        let n_samples = 80_000;
        let (ixs, ws) = sum_tree.sample(n_samples, 1.0, &mut rng);
        assert!(ixs.iter().all(|&ix| ix < data.len()));
        assert!(ixs.iter().all(|&ix| ix != 2));
        for ix in [0, 1, 3] {
            let freq = ixs.iter().filter(|&&e| e == ix).count() as f32 / n_samples as f32;
            let p = data[ix] / 8.0;
            assert!((freq - p).abs() < 0.02, "ix={}, freq={}, p={}", ix, freq, p);
        }

        // Rarest sample has the largest weight.
        let w_max = ws.iter().cloned().fold(0f32, f32::max);
        assert!((w_max - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_priorities_stay_positive() {
        let mut sum_tree = SumTree::new(2, 0.6, 1e-6, WeightNormalizer::All);
        sum_tree.add(0, 0.0);
        sum_tree.add(1, -2.0);
        assert!(sum_tree.priority(0) > 0.0);
        assert!((sum_tree.priority(1) - (2.0f32 + 1e-6).powf(0.6)).abs() < 1e-6);

        let mut rng = fastrand::Rng::with_seed(0);
        let (_, ws) = sum_tree.sample(16, 0.4, &mut rng);
        assert!(ws.iter().all(|w| w.is_finite() && *w > 0.0 && *w <= 1.0 + 1e-5));
    }
}
