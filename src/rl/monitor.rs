//! Episode recording
//!
//! [`Monitor`] wraps an environment and saves the rendered frames of selected
//! episodes as numbered PNG files, one directory per episode:
//!
//! ```text
//! training_video/
//!   episode_000010/frame_00000.png
//!   episode_000010/frame_00001.png
//!   ...
//!   stats.json
//! ```
//!
//! Episodes are numbered from zero in the order they are reset.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::environment::{Environment, RenderMode, Step};
use super::space::{BoxSpace, Discrete};
use crate::error::EnvError;

const EPISODE_PREFIX: &str = "episode_";
const STATS_FILE: &str = "stats.json";

/// Which episodes get recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordSchedule {
    /// Only the listed episode ids
    Episodes(Vec<usize>),
    All,
    Never,
}

impl RecordSchedule {
    pub fn records(&self, episode: usize) -> bool {
        match self {
            RecordSchedule::Episodes(ids) => ids.contains(&episode),
            RecordSchedule::All => true,
            RecordSchedule::Never => false,
        }
    }
}

/// Per-episode totals written to `stats.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorStats {
    pub episode_lengths: Vec<usize>,
    pub episode_rewards: Vec<f32>,
    pub recorded_episodes: Vec<usize>,
}

/// Environment wrapper that records episodes to disk
pub struct Monitor<E> {
    env: E,
    directory: PathBuf,
    schedule: RecordSchedule,
    episodes_started: usize,
    /// Directory of the episode being recorded and the next frame number
    recording: Option<(PathBuf, usize)>,
    episode_length: usize,
    episode_reward: f32,
    stats: MonitorStats,
}

impl<E: Environment> Monitor<E> {
    /// Wrap `env`, recording into `directory`.
    ///
    /// Recordings left in `directory` by an earlier monitor are removed.
    pub fn new(env: E, directory: impl Into<PathBuf>, schedule: RecordSchedule) -> io::Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        clear_recordings(&directory)?;

        Ok(Self {
            env,
            directory,
            schedule,
            episodes_started: 0,
            recording: None,
            episode_length: 0,
            episode_reward: 0.0,
            stats: MonitorStats::default(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn stats(&self) -> &MonitorStats {
        &self.stats
    }

    pub fn inner(&self) -> &E {
        &self.env
    }

    /// Unwrap the environment
    pub fn into_inner(self) -> E {
        self.env
    }

    fn record_frame(&mut self) {
        let Some((dir, frame)) = self.recording.as_mut() else {
            return;
        };

        let path = dir.join(format!("frame_{frame:05}.png"));
        let image: RgbImage = self.env.render(RenderMode::RgbArray);
        match image.save(&path) {
            Ok(()) => *frame += 1,
            Err(e) => {
                log::warn!("failed to write {}: {e}; recording stopped", path.display());
                self.recording = None;
            }
        }
    }

    fn finish_episode(&mut self) {
        self.stats.episode_lengths.push(self.episode_length);
        self.stats.episode_rewards.push(self.episode_reward);
        self.recording = None;

        let path = self.directory.join(STATS_FILE);
        let written = serde_json::to_string_pretty(&self.stats)
            .map_err(io::Error::from)
            .and_then(|json| fs::write(&path, json));
        if let Err(e) = written {
            log::warn!("failed to write {}: {e}", path.display());
        }
    }
}

impl<E: Environment> Environment for Monitor<E> {
    type Observation = E::Observation;

    fn action_space(&self) -> Discrete {
        self.env.action_space()
    }

    fn observation_space(&self) -> &BoxSpace {
        self.env.observation_space()
    }

    fn reset(&mut self) -> Self::Observation {
        let episode = self.episodes_started;
        self.episodes_started += 1;
        self.episode_length = 0;
        self.episode_reward = 0.0;

        let observation = self.env.reset();

        self.recording = None;
        if self.schedule.records(episode) {
            let dir = self.directory.join(format!("{EPISODE_PREFIX}{episode:06}"));
            match fs::create_dir_all(&dir) {
                Ok(()) => {
                    log::info!("recording episode {episode} to {}", dir.display());
                    self.stats.recorded_episodes.push(episode);
                    self.recording = Some((dir, 0));
                }
                Err(e) => log::warn!("cannot record episode {episode}: {e}"),
            }
        }
        self.record_frame();

        observation
    }

    fn step(&mut self, action: usize) -> Result<Step<Self::Observation>, EnvError> {
        let step = self.env.step(action)?;
        self.episode_length += 1;
        self.episode_reward += step.reward;

        self.record_frame();
        if step.done {
            self.finish_episode();
        }

        Ok(step)
    }

    fn render(&self, mode: RenderMode) -> RgbImage {
        self.env.render(mode)
    }
}

/// Remove episode directories and stats left by an earlier run
fn clear_recordings(directory: &Path) -> io::Result<()> {
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(EPISODE_PREFIX) && entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else if name == STATS_FILE {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameConfig;
    use crate::rl::environment::FlappyEnvironment;
    use tempfile::TempDir;

    const WAIT: usize = 1;

    fn monitor(dir: &Path, schedule: RecordSchedule) -> Monitor<FlappyEnvironment> {
        let env = FlappyEnvironment::new("vector", GameConfig::seeded(2));
        Monitor::new(env, dir, schedule).unwrap()
    }

    fn play_episode<E: Environment>(env: &mut E) -> usize {
        env.reset();
        let mut steps = 0;
        loop {
            steps += 1;
            if env.step(WAIT).unwrap().done {
                return steps;
            }
        }
    }

    fn frame_count(dir: &Path) -> usize {
        fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
    }

    #[test]
    fn test_schedule() {
        let schedule = RecordSchedule::Episodes(vec![10, 100, 1000]);
        assert!(schedule.records(10));
        assert!(!schedule.records(0));
        assert!(!schedule.records(11));
        assert!(RecordSchedule::All.records(7));
        assert!(!RecordSchedule::Never.records(0));
    }

    #[test]
    fn test_records_selected_episodes() {
        let dir = TempDir::new().unwrap();
        let mut env = monitor(dir.path(), RecordSchedule::Episodes(vec![1]));

        play_episode(&mut env);
        let steps = play_episode(&mut env);
        play_episode(&mut env);

        assert!(!dir.path().join("episode_000000").exists());
        assert!(!dir.path().join("episode_000002").exists());
        // Reset frame plus one frame per step
        assert_eq!(frame_count(&dir.path().join("episode_000001")), steps + 1);
        assert_eq!(env.stats().recorded_episodes, vec![1]);
    }

    #[test]
    fn test_frames_are_upright_renders() {
        let dir = TempDir::new().unwrap();
        let mut env = monitor(dir.path(), RecordSchedule::All);
        env.reset();

        let frame = image::open(dir.path().join("episode_000000/frame_00000.png"))
            .unwrap()
            .to_rgb8();
        assert_eq!((frame.width(), frame.height()), (288, 512));
        assert_eq!(frame, env.render(RenderMode::RgbArray));
    }

    #[test]
    fn test_stats_are_written() {
        let dir = TempDir::new().unwrap();
        let mut env = monitor(dir.path(), RecordSchedule::Never);

        let first = play_episode(&mut env);
        let second = play_episode(&mut env);

        let json = fs::read_to_string(dir.path().join(STATS_FILE)).unwrap();
        let stats: MonitorStats = serde_json::from_str(&json).unwrap();
        assert_eq!(stats.episode_lengths, vec![first, second]);
        assert_eq!(stats.episode_rewards, vec![-50.0, -50.0]);
        assert!(stats.recorded_episodes.is_empty());
    }

    #[test]
    fn test_new_clears_previous_recordings() {
        let dir = TempDir::new().unwrap();
        let keep = dir.path().join("notes.txt");
        fs::write(&keep, "keep me").unwrap();

        {
            let mut env = monitor(dir.path(), RecordSchedule::All);
            play_episode(&mut env);
        }
        assert!(dir.path().join("episode_000000").exists());

        let _env = monitor(dir.path(), RecordSchedule::All);
        assert!(!dir.path().join("episode_000000").exists());
        assert!(!dir.path().join(STATS_FILE).exists());
        assert!(keep.exists());
    }

    #[test]
    fn test_errors_pass_through() {
        let dir = TempDir::new().unwrap();
        let mut env = monitor(dir.path(), RecordSchedule::Never);
        play_episode(&mut env);

        assert_eq!(env.step(WAIT), Err(EnvError::EpisodeOver));
        let inner = env.into_inner();
        assert!(inner.engine().game_over());
    }
}
