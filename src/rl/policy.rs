//! Epsilon-greedy action selection with linear annealing

use rand::Rng;

/// Index of the largest Q-value. Ties go to the lowest index.
pub fn greedy_action(q_values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &q) in q_values.iter().enumerate() {
        if q > q_values[best] {
            best = i;
        }
    }
    best
}

/// Pick a uniformly random action with probability `eps`, else the greedy one
pub fn eps_greedy_action<R: Rng + ?Sized>(q_values: &[f32], eps: f64, rng: &mut R) -> usize {
    assert!(!q_values.is_empty(), "no Q-values to choose from");
    if rng.gen_bool(eps.clamp(0.0, 1.0)) {
        rng.gen_range(0..q_values.len())
    } else {
        greedy_action(q_values)
    }
}

/// Epsilon-greedy policy whose epsilon falls linearly with the training step
#[derive(Debug, Clone, PartialEq)]
pub struct LinearAnnealedPolicy {
    pub value_max: f64,
    pub value_min: f64,
    /// Epsilon used outside training
    pub value_test: f64,
    /// Steps over which epsilon goes from `value_max` to `value_min`
    pub nb_steps: usize,
}

impl LinearAnnealedPolicy {
    pub fn new(value_max: f64, value_min: f64, value_test: f64, nb_steps: usize) -> Self {
        Self {
            value_max,
            value_min,
            value_test,
            nb_steps,
        }
    }

    /// Epsilon at `step`
    pub fn epsilon(&self, step: usize, training: bool) -> f64 {
        if !training {
            return self.value_test;
        }
        if self.nb_steps == 0 {
            return self.value_min;
        }
        let slope = -(self.value_max - self.value_min) / self.nb_steps as f64;
        (slope * step as f64 + self.value_max).max(self.value_min)
    }

    pub fn select_action<R: Rng + ?Sized>(
        &self,
        q_values: &[f32],
        step: usize,
        training: bool,
        rng: &mut R,
    ) -> usize {
        eps_greedy_action(q_values, self.epsilon(step, training), rng)
    }
}
