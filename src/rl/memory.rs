//! Sequential replay memory with observation windows
//!
//! Transitions are stored in the order they happen. A sampled state is the
//! window of the last `window_length` observations of its episode, padded
//! with all-zero observations at the start of an episode.

use std::collections::VecDeque;

use rand::Rng;
use rand::seq::index;

use super::observation::{Observation, StateKind};

/// One stored step: the observation the agent acted on and what followed
#[derive(Debug, Clone)]
struct Entry {
    observation: Observation,
    action: usize,
    reward: f32,
    terminal: bool,
}

/// A sampled transition with windowed states
#[derive(Debug, Clone, PartialEq)]
pub struct Experience {
    pub state0: Vec<Observation>,
    pub action: usize,
    pub reward: f32,
    pub state1: Vec<Observation>,
    /// Whether `state1` ended the episode
    pub terminal1: bool,
}

/// Ring buffer of transitions that samples windowed experiences
pub struct SequentialMemory {
    entries: VecDeque<Entry>,
    limit: usize,
    window_length: usize,
}

impl SequentialMemory {
    /// # Panics
    ///
    /// Panics if `limit` or `window_length` is zero.
    pub fn new(limit: usize, window_length: usize) -> Self {
        assert!(limit > 0, "memory limit must be positive");
        assert!(window_length > 0, "window length must be positive");
        Self {
            entries: VecDeque::with_capacity(limit.min(4096)),
            limit,
            window_length,
        }
    }

    /// Record that `action` was taken from `observation`, yielding `reward`.
    /// `terminal` marks the step that ended the episode.
    pub fn append(&mut self, observation: Observation, action: usize, reward: f32, terminal: bool) {
        if self.entries.len() == self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(Entry {
            observation,
            action,
            reward,
            terminal,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn window_length(&self) -> usize {
        self.window_length
    }

    /// Number of entries that can be sampled. The newest entry has no
    /// successor yet.
    pub fn num_sampleable(&self) -> usize {
        self.entries.len().saturating_sub(1)
    }

    /// Draw `batch_size` experiences, without replacement when enough are stored.
    /// Returns an empty batch when nothing can be sampled.
    pub fn sample<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Vec<Experience> {
        let available = self.num_sampleable();
        if available == 0 {
            return Vec::new();
        }

        let indices: Vec<usize> = if batch_size <= available {
            index::sample(rng, available, batch_size).into_vec()
        } else {
            (0..batch_size).map(|_| rng.gen_range(0..available)).collect()
        };

        indices.into_iter().map(|i| self.experience(i)).collect()
    }

    fn experience(&self, index: usize) -> Experience {
        let entry = &self.entries[index];
        Experience {
            state0: self.window_ending_at(index),
            action: entry.action,
            reward: entry.reward,
            // The successor of a terminal step belongs to the next episode and
            // only stands in for shape; its value is masked out.
            state1: self.window_ending_at(index + 1),
            terminal1: entry.terminal,
        }
    }

    /// Observations `index - window_length + 1 ..= index`, cut at episode starts
    fn window_ending_at(&self, index: usize) -> Vec<Observation> {
        let mut window = VecDeque::with_capacity(self.window_length);
        window.push_front(self.entries[index].observation.clone());

        let mut current = index;
        while window.len() < self.window_length && current > 0 {
            let previous = &self.entries[current - 1];
            if previous.terminal {
                break;
            }
            window.push_front(previous.observation.clone());
            current -= 1;
        }

        pad_window(window, self.window_length)
    }
}

/// The most recent observations of the running episode
#[derive(Debug, Clone)]
pub struct ObservationWindow {
    frames: VecDeque<Observation>,
    window_length: usize,
}

impl ObservationWindow {
    pub fn new(window_length: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(window_length),
            window_length,
        }
    }

    /// Forget the previous episode
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn push(&mut self, observation: Observation) {
        if self.frames.len() == self.window_length {
            self.frames.pop_front();
        }
        self.frames.push_back(observation);
    }

    /// Current window, oldest first, zero-padded to full length
    pub fn window(&self) -> Vec<Observation> {
        pad_window(self.frames.clone(), self.window_length)
    }
}

fn pad_window(mut window: VecDeque<Observation>, window_length: usize) -> Vec<Observation> {
    let kind = window
        .front()
        .map(Observation::kind)
        .unwrap_or(StateKind::Vector);
    while window.len() < window_length {
        window.push_front(Observation::zeros(kind));
    }
    window.into()
}
