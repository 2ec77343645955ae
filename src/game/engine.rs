use super::{
    action::{ACTION_SET, NativeAction, is_flap},
    config::GameConfig,
    state::{GameState, Pipe, Player},
};
use rand::{Rng, SeedableRng, rngs::StdRng};

const GRAVITY: f32 = 1.0;
const FLAP_POWER: f32 = 9.0;
const MAX_DROP_SPEED: f32 = 10.0;
const PIPE_SPEED: f32 = 4.0;
const PIPE_COUNT: usize = 3;

/// The Flappy Bird game.
///
/// Holds one live game session: the bird, the pipes, the running score and
/// the game-over flag. Every call to [`GameEngine::act`] advances the game by
/// exactly one tick.
pub struct GameEngine {
    config: GameConfig,
    rng: StdRng,
    player: Player,
    pipes: Vec<Pipe>,
    score: f32,
    pipes_passed: u32,
    ticks: u64,
    game_over: bool,
}

impl GameEngine {
    /// Create a new game and start the first session
    ///
    /// # Panics
    ///
    /// Panics if `config` fails [`GameConfig::validate`], for instance when
    /// the screen is too short to fit a pipe gap.
    pub fn new(config: GameConfig) -> Self {
        if let Err(e) = config.validate() {
            panic!("{e}");
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let player = Self::spawn_player(&config);
        let mut engine = Self {
            config,
            rng,
            player,
            pipes: Vec::with_capacity(PIPE_COUNT),
            score: 0.0,
            pipes_passed: 0,
            ticks: 0,
            game_over: false,
        };
        engine.reset_game();
        engine
    }

    /// Reset the game to its starting configuration
    pub fn reset_game(&mut self) {
        self.player = Self::spawn_player(&self.config);
        self.pipes.clear();

        let width = self.config.width as f32;
        for offset in [0.0, width * 0.5, width] {
            let gap_start = self.random_gap_start();
            self.pipes.push(Pipe::new(width + offset, gap_start));
        }

        self.score = 0.0;
        self.pipes_passed = 0;
        self.ticks = 0;
        self.game_over = false;
    }

    /// Inputs the game reacts to
    pub fn action_set(&self) -> [NativeAction; 2] {
        ACTION_SET
    }

    /// Apply one tick with the given input and return the reward it earned.
    ///
    /// Acting on a finished game does nothing and earns nothing.
    pub fn act(&mut self, action: NativeAction) -> f32 {
        if self.game_over {
            return 0.0;
        }

        let score_before = self.score;
        self.score += self.config.tick_reward;

        if is_flap(action) {
            self.flap();
        }
        self.update_player();
        self.update_pipes();

        if self.check_collision() {
            self.game_over = true;
            self.score += self.config.loss_reward;
        }

        self.ticks += 1;
        self.score - score_before
    }

    /// Whether the bird has crashed
    pub fn game_over(&self) -> bool {
        self.game_over
    }

    /// Named numeric description of the current game
    pub fn game_state(&self) -> GameState {
        let (next, next_next) = self.upcoming_pipes();
        let gap = self.config.pipe_gap as f32;

        GameState {
            player_y: self.player.pos_y,
            player_vel: self.player.vel,
            next_pipe_dist_to_player: next.x - self.player.pos_x,
            next_pipe_top_y: next.gap_start,
            next_pipe_bottom_y: next.gap_start + gap,
            next_next_pipe_dist_to_player: next_next.x - self.player.pos_x,
            next_next_pipe_top_y: next_next.gap_start,
            next_next_pipe_bottom_y: next_next.gap_start + gap,
        }
    }

    /// Accumulated native reward of this session
    pub fn score(&self) -> f32 {
        self.score
    }

    /// Number of pipes passed in this session
    pub fn pipes_passed(&self) -> u32 {
        self.pipes_passed
    }

    /// Ticks elapsed since the last reset
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn pipes(&self) -> &[Pipe] {
        &self.pipes
    }

    fn spawn_player(config: &GameConfig) -> Player {
        let x = (config.width as f32 * 0.2).floor();
        let y = (config.height / 2) as f32;
        Player::new(x, y)
    }

    fn random_gap_start(&mut self) -> f32 {
        self.rng
            .gen_range(self.config.pipe_min()..=self.config.pipe_max()) as f32
    }

    fn flap(&mut self) {
        if self.player.pos_y > -2.0 * self.player.height {
            self.player.vel = 0.0;
            self.player.flapped = true;
        }
    }

    /// Gravity and flap thrust.
    ///
    /// Thrust lasts a single frame. A flap that lands on the thrust frame
    /// of the previous flap zeroes the velocity without getting its own
    /// thrust; agents can abuse this to hover.
    fn update_player(&mut self) {
        let player = &mut self.player;

        if player.vel < MAX_DROP_SPEED && !player.thrusting {
            player.vel += GRAVITY;
        }

        if player.flapped && !player.thrusting {
            player.thrusting = true;
            player.vel -= FLAP_POWER;
        } else {
            player.thrusting = false;
            player.flapped = false;
        }

        player.pos_y += player.vel;
    }

    fn update_pipes(&mut self) {
        let player_x = self.player.pos_x;

        for pipe in &mut self.pipes {
            pipe.x -= PIPE_SPEED;

            if !pipe.scored && pipe.x < player_x {
                pipe.scored = true;
                self.pipes_passed += 1;
                self.score += self.config.pipe_reward;
            }
        }

        // Recycle pipes that left the screen behind the rightmost one
        let spacing = self.config.width as f32 * 0.5;
        for i in 0..self.pipes.len() {
            if self.pipes[i].x < -self.pipes[i].width {
                let rightmost = self
                    .pipes
                    .iter()
                    .map(|p| p.x)
                    .fold(f32::NEG_INFINITY, f32::max);
                let gap_start = self.random_gap_start();
                self.pipes[i] = Pipe::new(rightmost + spacing, gap_start);
            }
        }
    }

    fn check_collision(&self) -> bool {
        let player = &self.player;
        let gap = self.config.pipe_gap as f32;

        let hit_pipe = self.pipes.iter().any(|pipe| {
            let overlaps_column =
                player.pos_x + player.width > pipe.left() && player.pos_x < pipe.right();
            let outside_gap = player.pos_y < pipe.gap_start
                || player.pos_y + player.height > pipe.gap_start + gap;
            overlaps_column && outside_gap
        });

        let hit_ground = player.pos_y >= self.config.ground_y() - player.height;
        let above_screen = player.pos_y < -player.height;

        hit_pipe || hit_ground || above_screen
    }

    /// The two nearest pipes whose right edge is still ahead of the bird
    fn upcoming_pipes(&self) -> (&Pipe, &Pipe) {
        let mut ahead: Vec<&Pipe> = self
            .pipes
            .iter()
            .filter(|p| p.right() > self.player.pos_x)
            .collect();
        ahead.sort_by(|a, b| a.x.total_cmp(&b.x));

        let rightmost = self
            .pipes
            .iter()
            .max_by(|a, b| a.x.total_cmp(&b.x))
            .unwrap_or(&self.pipes[0]);
        let next = ahead.first().copied().unwrap_or(rightmost);
        let next_next = ahead.get(1).copied().unwrap_or(next);
        (next, next_next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::action::KeyCode;

    #[test]
    fn test_reset() {
        let engine = GameEngine::new(GameConfig::seeded(1));

        assert!(!engine.game_over());
        assert_eq!(engine.score(), 0.0);
        assert_eq!(engine.ticks(), 0);
        assert_eq!(engine.pipes().len(), 3);
        assert_eq!(engine.player().pos_y, 256.0);
        assert_eq!(engine.player().vel, 0.0);
    }

    #[test]
    #[should_panic(expected = "leaves no room for pipes")]
    fn test_screen_too_short_for_pipes_panics() {
        GameEngine::new(GameConfig {
            height: 100,
            ..GameConfig::seeded(1)
        });
    }

    #[test]
    fn test_gravity_pulls_bird_down() {
        let mut engine = GameEngine::new(GameConfig::seeded(1));
        let y_before = engine.player().pos_y;

        let reward = engine.act(None);

        assert_eq!(reward, 0.0);
        assert_eq!(engine.player().vel, 1.0);
        assert!(engine.player().pos_y > y_before);
        assert_eq!(engine.ticks(), 1);
    }

    #[test]
    fn test_flap_gives_upward_velocity() {
        let mut engine = GameEngine::new(GameConfig::seeded(1));

        engine.act(Some(KeyCode::W));
        assert_eq!(engine.player().vel, -8.0);

        // Thrust frame is over, no gravity on the frame right after it
        engine.act(None);
        assert_eq!(engine.player().vel, -8.0);

        engine.act(None);
        assert_eq!(engine.player().vel, -7.0);
    }

    #[test]
    fn test_consecutive_flaps_reset_velocity() {
        let mut engine = GameEngine::new(GameConfig::seeded(1));

        engine.act(Some(KeyCode::W));
        engine.act(Some(KeyCode::W));

        assert_eq!(engine.player().vel, 0.0);
    }

    #[test]
    fn test_unknown_key_is_no_input() {
        let mut engine = GameEngine::new(GameConfig::seeded(1));
        engine.act(Some(KeyCode(32)));
        assert_eq!(engine.player().vel, 1.0);
    }

    #[test]
    fn test_falling_ends_game_with_loss_reward() {
        let mut engine = GameEngine::new(GameConfig::seeded(3));
        let mut total = 0.0;
        let mut ticks = 0;

        while !engine.game_over() && ticks < 1000 {
            total += engine.act(None);
            ticks += 1;
        }

        assert!(engine.game_over());
        assert_eq!(total, -5.0);
        assert_eq!(engine.score(), -5.0);
    }

    #[test]
    fn test_act_after_game_over_is_noop() {
        let mut engine = GameEngine::new(GameConfig::seeded(3));
        while !engine.game_over() {
            engine.act(None);
        }
        let ticks = engine.ticks();
        let y = engine.player().pos_y;

        assert_eq!(engine.act(Some(KeyCode::W)), 0.0);
        assert_eq!(engine.ticks(), ticks);
        assert_eq!(engine.player().pos_y, y);
    }

    #[test]
    fn test_passing_pipe_is_rewarded() {
        let mut engine = GameEngine::new(GameConfig::seeded(5));
        // Line the first pipe's gap up with the bird and park the others far away
        let player_y = engine.player().pos_y;
        engine.pipes[0] = Pipe::new(engine.player().pos_x + 2.0, player_y - 40.0);
        engine.pipes[1].x = 1000.0;
        engine.pipes[2].x = 1200.0;

        let reward = engine.act(None);

        assert_eq!(reward, 1.0);
        assert_eq!(engine.pipes_passed(), 1);
        assert!(!engine.game_over());
    }

    #[test]
    fn test_pipe_collision() {
        let mut engine = GameEngine::new(GameConfig::seeded(5));
        // Gap far above the bird
        engine.pipes[0] = Pipe::new(engine.player().pos_x + 30.0, 25.0);

        let reward = engine.act(None);

        assert!(engine.game_over());
        assert_eq!(reward, -5.0);
    }

    #[test]
    fn test_game_state_points_at_upcoming_pipes() {
        let engine = GameEngine::new(GameConfig::seeded(9));
        let state = engine.game_state();
        let player_x = engine.player().pos_x;

        assert_eq!(state.player_y, 256.0);
        assert_eq!(state.next_pipe_dist_to_player, 288.0 - player_x);
        assert_eq!(state.next_next_pipe_dist_to_player, 432.0 - player_x);
        assert_eq!(state.next_pipe_bottom_y - state.next_pipe_top_y, 100.0);
        assert_eq!(
            state.next_next_pipe_bottom_y - state.next_next_pipe_top_y,
            100.0
        );
    }

    #[test]
    fn test_pipes_are_recycled() {
        let mut engine = GameEngine::new(GameConfig::seeded(11));
        engine.pipes[0].x = -50.0;

        engine.act(None);

        // -54 is past the left edge, so the pipe moves behind the rightmost one
        let max_x = engine.pipes().iter().map(|p| p.x).fold(f32::MIN, f32::max);
        assert!(engine.pipes().iter().all(|p| p.x >= -52.0));
        assert_eq!(max_x, engine.pipes[0].x);
    }

    #[test]
    fn test_gap_start_within_range() {
        let mut engine = GameEngine::new(GameConfig::seeded(13));
        for _ in 0..20 {
            engine.reset_game();
            for pipe in engine.pipes() {
                assert!(pipe.gap_start >= 25.0 && pipe.gap_start <= 192.0);
            }
        }
    }

    #[test]
    fn test_same_seed_same_pipes() {
        let a = GameEngine::new(GameConfig::seeded(42));
        let b = GameEngine::new(GameConfig::seeded(42));
        assert_eq!(a.pipes(), b.pipes());
    }
}
