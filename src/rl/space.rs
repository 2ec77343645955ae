//! Action and observation space descriptors

/// A finite set of actions `0..n`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Discrete {
    pub n: usize,
}

impl Discrete {
    pub fn new(n: usize) -> Self {
        Self { n }
    }

    pub fn contains(&self, action: usize) -> bool {
        action < self.n
    }
}

/// A box of values with per-element bounds.
///
/// Bounds are declarative: nothing clamps values to them.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxSpace {
    pub low: Vec<f32>,
    pub high: Vec<f32>,
    pub shape: Vec<usize>,
}

impl BoxSpace {
    /// A one-dimensional box with explicit bounds per element
    ///
    /// # Panics
    ///
    /// Panics if `low` and `high` differ in length.
    pub fn from_bounds(low: Vec<f32>, high: Vec<f32>) -> Self {
        assert_eq!(low.len(), high.len(), "low and high must have equal length");
        let shape = vec![low.len()];
        Self { low, high, shape }
    }

    /// A box of the given shape where every element shares the same bounds
    pub fn uniform(low: f32, high: f32, shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self {
            low: vec![low; len],
            high: vec![high; len],
            shape,
        }
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `values` has the right length and lies inside the bounds
    pub fn contains(&self, values: &[f32]) -> bool {
        values.len() == self.len()
            && values
                .iter()
                .zip(self.low.iter().zip(&self.high))
                .all(|(v, (lo, hi))| v >= lo && v <= hi)
    }
}
