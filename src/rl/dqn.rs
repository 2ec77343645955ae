//! DQN agent
//!
//! Deep Q-learning with experience replay, an ε-greedy behaviour policy and
//! a target network that trails the online network.
//!
//! The loop per environment step is:
//! 1. Push the observation into the running window and pick an action.
//! 2. Step the environment and store the transition in replay memory.
//! 3. After warmup, every `train_interval` steps, sample a minibatch and take
//!    one Adam step on `½·mean((Q(s,a) − (r + γ·max Q'(s')))²)`.
//! 4. Move the target network towards the online network.

use std::sync::atomic::{AtomicBool, Ordering};

use burn::{
    module::{AutodiffModule, Module, ModuleMapper, ModuleVisitor, ParamId},
    optim::{Adam, AdamConfig, GradientsParams, Optimizer, adaptor::OptimizerAdaptor},
    tensor::{ElementConversion, Tensor, TensorData, backend::AutodiffBackend, backend::Backend},
};
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::config::DqnConfig;
use super::environment::Environment;
use super::memory::{ObservationWindow, SequentialMemory};
use super::network::{QNetwork, QNetworkConfig};
use super::observation::{Observation, encode_batch};
use super::policy::LinearAnnealedPolicy;
use crate::error::{ConfigError, EnvError};

/// Outcome of one finished episode
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    /// Zero-based episode number within the `fit` or `test` call
    pub episode: usize,
    /// Environment steps taken in the episode
    pub steps: usize,
    pub reward: f32,
    /// Mean loss of the gradient steps taken during the episode
    pub mean_loss: Option<f32>,
    /// Exploration rate at the end of the episode
    pub epsilon: f64,
    /// Training steps taken by the agent so far
    pub total_steps: usize,
}

/// DQN agent for discrete-action environments
///
/// # Type Parameters
///
/// * `B` - Autodiff backend for gradient computation
pub struct DqnAgent<B: AutodiffBackend> {
    /// Online Q-network
    model: QNetwork<B>,

    /// Target Q-network used to bootstrap returns
    target_model: QNetwork<B::InnerBackend>,

    /// Adam optimizer for the online network
    optim: OptimizerAdaptor<Adam, QNetwork<B>, B>,

    network_config: QNetworkConfig,
    config: DqnConfig,
    memory: SequentialMemory,
    policy: LinearAnnealedPolicy,

    /// Observations of the running episode
    recent: ObservationWindow,

    rng: StdRng,

    /// Training steps taken
    step: usize,

    device: B::Device,
}

impl<B: AutodiffBackend> DqnAgent<B> {
    /// Create an agent with a freshly initialized network
    pub fn new(
        network_config: QNetworkConfig,
        config: DqnConfig,
        device: B::Device,
    ) -> Result<Self, ConfigError> {
        config.validate().map_err(ConfigError::Validation)?;

        let model = network_config.init::<B>(&device);
        let target_model = model.valid();
        let window_length = network_config.window_length;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            model,
            target_model,
            optim: AdamConfig::new().init(),
            memory: SequentialMemory::new(config.memory_limit, window_length),
            policy: LinearAnnealedPolicy::new(
                config.epsilon_max,
                config.epsilon_min,
                config.epsilon_test,
                config.epsilon_anneal_steps,
            ),
            recent: ObservationWindow::new(window_length),
            network_config,
            config,
            rng,
            step: 0,
            device,
        })
    }

    /// Train on `env` for `nb_steps` environment steps.
    ///
    /// `on_episode` is called after every finished episode. An episode still
    /// running when the step budget is spent is not reported.
    ///
    /// `stop` is polled before every step; once it is set, training returns
    /// the episodes finished so far.
    pub fn fit<E, F>(
        &mut self,
        env: &mut E,
        nb_steps: usize,
        stop: &AtomicBool,
        mut on_episode: F,
    ) -> Result<Vec<EpisodeSummary>, EnvError>
    where
        E: Environment<Observation = Observation>,
        F: FnMut(&EpisodeSummary),
    {
        let mut summaries = Vec::new();
        let mut observation: Option<Observation> = None;
        let mut episode_steps = 0;
        let mut episode_reward = 0.0;
        let mut losses = Vec::new();

        for _ in 0..nb_steps {
            if stop.load(Ordering::Relaxed) {
                log::info!("training stopped after {} steps", self.step);
                break;
            }

            let current = match observation.take() {
                Some(obs) => obs,
                None => {
                    self.recent.clear();
                    episode_steps = 0;
                    episode_reward = 0.0;
                    losses.clear();
                    env.reset()
                }
            };

            let action = self.forward(current.clone(), true);
            let step = env.step(action)?;
            episode_steps += 1;
            episode_reward += step.reward;

            if let Some(loss) = self.backward(current, action, step.reward, step.done) {
                losses.push(loss);
            }

            if step.done {
                let summary = EpisodeSummary {
                    episode: summaries.len(),
                    steps: episode_steps,
                    reward: episode_reward,
                    mean_loss: mean(&losses),
                    epsilon: self.epsilon(true),
                    total_steps: self.step,
                };
                log::debug!(
                    "episode {} finished after {} steps, reward {:.1}",
                    summary.episode,
                    summary.steps,
                    summary.reward
                );
                on_episode(&summary);
                summaries.push(summary);
            } else {
                observation = Some(step.observation);
            }
        }

        Ok(summaries)
    }

    /// Play `nb_episodes` episodes with the evaluation exploration rate.
    /// Nothing is learned and nothing is stored in memory.
    pub fn test<E, F>(
        &mut self,
        env: &mut E,
        nb_episodes: usize,
        mut on_episode: F,
    ) -> Result<Vec<EpisodeSummary>, EnvError>
    where
        E: Environment<Observation = Observation>,
        F: FnMut(&EpisodeSummary),
    {
        let mut summaries = Vec::with_capacity(nb_episodes);

        for episode in 0..nb_episodes {
            self.recent.clear();
            let mut observation = env.reset();
            let mut steps = 0;
            let mut reward = 0.0;

            loop {
                let action = self.forward(observation, false);
                let step = env.step(action)?;
                steps += 1;
                reward += step.reward;
                if step.done {
                    break;
                }
                observation = step.observation;
            }

            let summary = EpisodeSummary {
                episode,
                steps,
                reward,
                mean_loss: None,
                epsilon: self.epsilon(false),
                total_steps: self.step,
            };
            on_episode(&summary);
            summaries.push(summary);
        }

        Ok(summaries)
    }

    /// Choose an action for `observation`, the newest frame of the running episode
    pub fn forward(&mut self, observation: Observation, training: bool) -> usize {
        self.recent.push(observation);
        let q_values = self.q_values(&self.recent.window());
        self.policy
            .select_action(&q_values, self.step, training, &mut self.rng)
    }

    /// Q-values of the online network for one observation window
    pub fn q_values(&self, window: &[Observation]) -> Vec<f32> {
        let input = encode_batch::<B::InnerBackend>(&[window.to_vec()], &self.device);
        self.model
            .valid()
            .forward(input)
            .into_data()
            .iter::<f32>()
            .collect()
    }

    /// Record a training transition and learn from memory when due.
    ///
    /// Returns the loss if a gradient step was taken.
    pub fn backward(
        &mut self,
        observation: Observation,
        action: usize,
        reward: f32,
        terminal: bool,
    ) -> Option<f32> {
        self.memory.append(observation, action, reward, terminal);
        self.step += 1;

        let mut loss = None;
        if self.step > self.config.warmup_steps && self.step % self.config.train_interval == 0 {
            loss = self.train_step();
        }

        if !self.config.soft_target_update() {
            let interval = self.config.target_update as usize;
            if interval > 0 && self.step % interval == 0 {
                self.hard_update_target();
            }
        }

        loss
    }

    /// One gradient step on a minibatch sampled from memory
    fn train_step(&mut self) -> Option<f32> {
        let batch = self.memory.sample(self.config.batch_size, &mut self.rng);
        if batch.is_empty() {
            return None;
        }
        let batch_size = batch.len();
        let num_actions = self.network_config.num_actions;

        let mut states0 = Vec::with_capacity(batch_size);
        let mut states1 = Vec::with_capacity(batch_size);
        let mut rewards = Vec::with_capacity(batch_size);
        let mut not_terminal = Vec::with_capacity(batch_size);
        let mut action_mask = vec![0.0f32; batch_size * num_actions];
        for (i, experience) in batch.into_iter().enumerate() {
            action_mask[i * num_actions + experience.action] = 1.0;
            rewards.push(experience.reward);
            not_terminal.push(if experience.terminal1 { 0.0 } else { 1.0 });
            states0.push(experience.state0);
            states1.push(experience.state1);
        }

        // Bootstrapped targets from the target network, outside the graph
        let next_q = self
            .target_model
            .forward(encode_batch::<B::InnerBackend>(&states1, &self.device))
            .max_dim(1);
        let rewards = Tensor::<B::InnerBackend, 2>::from_data(
            TensorData::new(rewards, [batch_size, 1]),
            &self.device,
        );
        let not_terminal = Tensor::<B::InnerBackend, 2>::from_data(
            TensorData::new(not_terminal, [batch_size, 1]),
            &self.device,
        );
        let targets = Tensor::<B, 2>::from_inner(
            rewards + next_q.mul(not_terminal).mul_scalar(self.config.gamma),
        );

        let action_mask = Tensor::<B, 2>::from_data(
            TensorData::new(action_mask, [batch_size, num_actions]),
            &self.device,
        );
        let q_all = self.model.forward(encode_batch::<B>(&states0, &self.device));
        let q_taken = (q_all * action_mask).sum_dim(1);

        let diff = q_taken - targets;
        let loss = (diff.clone() * diff).mean().mul_scalar(0.5);
        let loss_value = loss.clone().into_scalar().elem::<f32>();

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        self.model = self
            .optim
            .step(self.config.learning_rate, self.model.clone(), grads);

        if self.config.soft_target_update() {
            self.soft_update_target(self.config.target_update);
        }

        Some(loss_value)
    }

    /// Blend the online weights into the target: `θ' ← τ·θ + (1 − τ)·θ'`
    fn soft_update_target(&mut self, tau: f64) {
        let mut collector = ParamCollector::default();
        self.model.valid().visit(&mut collector);

        let mut blender = ParamBlender {
            params: collector.params.into_iter(),
            tau,
        };
        self.target_model = self.target_model.clone().map(&mut blender);
    }

    fn hard_update_target(&mut self) {
        self.target_model = self.model.valid();
    }

    /// Replace the online network, e.g. with restored weights. The target
    /// network is synchronised with it.
    pub fn load_model(&mut self, model: QNetwork<B>) {
        self.model = model;
        self.hard_update_target();
    }

    /// Online network
    pub fn model(&self) -> &QNetwork<B> {
        &self.model
    }

    pub fn network_config(&self) -> &QNetworkConfig {
        &self.network_config
    }

    pub fn config(&self) -> &DqnConfig {
        &self.config
    }

    pub fn memory(&self) -> &SequentialMemory {
        &self.memory
    }

    /// Training steps taken so far
    pub fn step(&self) -> usize {
        self.step
    }

    /// Current exploration rate
    pub fn epsilon(&self, training: bool) -> f64 {
        self.policy.epsilon(self.step, training)
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }
}

/// Collects float parameters in visiting order
#[derive(Default)]
struct ParamCollector {
    params: Vec<TensorData>,
}

impl<B: Backend> ModuleVisitor<B> for ParamCollector {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        self.params.push(tensor.to_data());
    }
}

/// Blends collected parameters into a module of the same structure
struct ParamBlender {
    params: std::vec::IntoIter<TensorData>,
    tau: f64,
}

impl<B: Backend> ModuleMapper<B> for ParamBlender {
    fn map_float<const D: usize>(&mut self, _id: ParamId, tensor: Tensor<B, D>) -> Tensor<B, D> {
        match self.params.next() {
            Some(data) => {
                let online = Tensor::<B, D>::from_data(data, &tensor.device());
                tensor.mul_scalar(1.0 - self.tau) + online.mul_scalar(self.tau)
            }
            None => tensor,
        }
    }
}

fn mean(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f32>() / values.len() as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameConfig;
    use crate::rl::environment::FlappyEnvironment;
    use crate::rl::observation::StateKind;
    use burn::backend::Autodiff;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    type TestBackend = Autodiff<NdArray<f32>>;

    fn small_config() -> DqnConfig {
        DqnConfig {
            warmup_steps: 10,
            batch_size: 8,
            memory_limit: 500,
            seed: Some(5),
            ..Default::default()
        }
    }

    fn vector_agent(config: DqnConfig) -> DqnAgent<TestBackend> {
        DqnAgent::new(QNetworkConfig::vector(2), config, NdArrayDevice::default()).unwrap()
    }

    fn params<B: Backend>(network: &QNetwork<B>) -> Vec<f32> {
        let mut collector = ParamCollector::default();
        network.visit(&mut collector);
        collector
            .params
            .into_iter()
            .flat_map(|data| data.iter::<f32>().collect::<Vec<_>>())
            .collect()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = DqnConfig {
            gamma: 2.0,
            ..Default::default()
        };
        let result =
            DqnAgent::<TestBackend>::new(QNetworkConfig::vector(2), config, NdArrayDevice::default());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_target_starts_equal_to_online() {
        let agent = vector_agent(small_config());
        assert_eq!(params(&agent.model.valid()), params(&agent.target_model));
    }

    #[test]
    fn test_soft_update_blends_weights() {
        let mut agent = vector_agent(small_config());
        let device = NdArrayDevice::default();
        agent.target_model = QNetworkConfig::vector(2).init(&device);

        let online = params(&agent.model.valid());
        let before = params(&agent.target_model);
        agent.soft_update_target(0.1);
        let after = params(&agent.target_model);

        assert_eq!(after.len(), online.len());
        for ((a, o), b) in after.iter().zip(&online).zip(&before) {
            let expected = 0.1 * o + 0.9 * b;
            assert!((a - expected).abs() < 1e-5, "{a} != {expected}");
        }
    }

    #[test]
    fn test_no_training_during_warmup() {
        let mut agent = vector_agent(small_config());
        let obs = Observation::zeros(StateKind::Vector);

        for _ in 0..10 {
            assert_eq!(agent.backward(obs.clone(), 0, 0.0, false), None);
        }
        let loss = agent.backward(obs, 1, 0.0, false);
        assert!(loss.is_some_and(f32::is_finite));
        assert_eq!(agent.step(), 11);
    }

    #[test]
    fn test_train_interval() {
        let config = DqnConfig {
            train_interval: 4,
            warmup_steps: 0,
            ..small_config()
        };
        let mut agent = vector_agent(config);
        let obs = Observation::zeros(StateKind::Vector);

        let trained: Vec<bool> = (0..8)
            .map(|_| agent.backward(obs.clone(), 0, 1.0, false).is_some())
            .collect();
        assert_eq!(
            trained,
            vec![false, false, false, true, false, false, false, true]
        );
    }

    #[test]
    fn test_hard_target_update() {
        let config = DqnConfig {
            target_update: 5.0,
            warmup_steps: 0,
            ..small_config()
        };
        let mut agent = vector_agent(config);
        let obs = Observation::zeros(StateKind::Vector);

        for _ in 0..4 {
            agent.backward(obs.clone(), 0, 1.0, false);
        }
        assert_ne!(params(&agent.model.valid()), params(&agent.target_model));

        agent.backward(obs, 0, 1.0, false);
        assert_eq!(params(&agent.model.valid()), params(&agent.target_model));
    }

    #[test]
    fn test_fit_collects_episodes() {
        let mut env = FlappyEnvironment::new("vector", GameConfig::seeded(3));
        let mut agent = vector_agent(small_config());
        let mut reported = 0;

        let summaries = agent
            .fit(&mut env, 120, &AtomicBool::new(false), |_| reported += 1)
            .unwrap();

        assert_eq!(agent.step(), 120);
        assert_eq!(agent.memory().len(), 120);
        assert!(!summaries.is_empty());
        assert_eq!(reported, summaries.len());
        for (i, summary) in summaries.iter().enumerate() {
            assert_eq!(summary.episode, i);
            assert!(summary.steps > 0);
        }
        assert!(summaries.iter().any(|s| s.mean_loss.is_some()));
    }

    #[test]
    fn test_fit_stops_when_flag_is_raised() {
        let mut env = FlappyEnvironment::new("vector", GameConfig::seeded(3));
        let mut agent = vector_agent(small_config());
        let stop = AtomicBool::new(false);

        let summaries = agent
            .fit(&mut env, 10_000, &stop, |_| stop.store(true, Ordering::Relaxed))
            .unwrap();

        assert_eq!(summaries.len(), 1);
        assert_eq!(agent.step(), summaries[0].steps);
        assert!(agent.step() < 10_000);
    }

    #[test]
    fn test_test_is_deterministic_and_does_not_learn() {
        let mut agent = vector_agent(small_config());
        let before = params(&agent.model.valid());

        let mut env = FlappyEnvironment::new("vector", GameConfig::seeded(8));
        let first = agent.test(&mut env, 2, |_| {}).unwrap();
        let mut env = FlappyEnvironment::new("vector", GameConfig::seeded(8));
        let second = agent.test(&mut env, 2, |_| {}).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|s| s.epsilon == 0.0));
        assert_eq!(agent.step(), 0);
        assert!(agent.memory().is_empty());
        assert_eq!(params(&agent.model.valid()), before);
    }

    #[test]
    fn test_image_agent_fits() {
        let mut env = FlappyEnvironment::new("image", GameConfig::seeded(4));
        let config = DqnConfig {
            warmup_steps: 5,
            batch_size: 4,
            ..small_config()
        };
        let mut agent =
            DqnAgent::<TestBackend>::new(QNetworkConfig::image(2), config, NdArrayDevice::default())
                .unwrap();

        agent.fit(&mut env, 20, &AtomicBool::new(false), |_| {}).unwrap();
        assert_eq!(agent.step(), 20);

        let window = vec![Observation::zeros(StateKind::Image); 3];
        assert_eq!(agent.q_values(&window).len(), 2);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 3.0]), Some(2.0));
    }
}
