/// The bird
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    /// Left edge in screen coordinates
    pub pos_x: f32,
    /// Top edge in screen coordinates, growing downwards
    pub pos_y: f32,
    /// Vertical velocity; negative values move the bird up
    pub vel: f32,
    pub width: f32,
    pub height: f32,
    /// A flap was requested and its thrust has not run out yet
    pub flapped: bool,
    /// The current tick is the thrust frame of a flap
    pub thrusting: bool,
}

impl Player {
    pub const WIDTH: f32 = 34.0;
    pub const HEIGHT: f32 = 24.0;

    pub fn new(pos_x: f32, pos_y: f32) -> Self {
        Self {
            pos_x,
            pos_y,
            vel: 0.0,
            width: Self::WIDTH,
            height: Self::HEIGHT,
            flapped: false,
            thrusting: false,
        }
    }
}

/// A pipe pair with a gap between the top and bottom halves
#[derive(Debug, Clone, PartialEq)]
pub struct Pipe {
    /// Horizontal centre
    pub x: f32,
    /// y coordinate where the gap starts (bottom of the top half)
    pub gap_start: f32,
    pub width: f32,
    /// The bird already got credit for this pipe
    pub scored: bool,
}

impl Pipe {
    pub const WIDTH: f32 = 52.0;

    pub fn new(x: f32, gap_start: f32) -> Self {
        Self {
            x,
            gap_start,
            width: Self::WIDTH,
            scored: false,
        }
    }

    pub fn left(&self) -> f32 {
        self.x - self.width / 2.0
    }

    pub fn right(&self) -> f32 {
        self.x + self.width / 2.0
    }
}

/// Named numeric view of the game exposed to agents
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameState {
    pub player_y: f32,
    pub player_vel: f32,
    pub next_pipe_dist_to_player: f32,
    pub next_pipe_top_y: f32,
    pub next_pipe_bottom_y: f32,
    pub next_next_pipe_dist_to_player: f32,
    pub next_next_pipe_top_y: f32,
    pub next_next_pipe_bottom_y: f32,
}

impl GameState {
    /// Number of named fields
    pub const LEN: usize = 8;

    /// Field names, in the order of [`GameState::values`]
    pub const FIELD_NAMES: [&'static str; Self::LEN] = [
        "player_y",
        "player_vel",
        "next_pipe_dist_to_player",
        "next_pipe_top_y",
        "next_pipe_bottom_y",
        "next_next_pipe_dist_to_player",
        "next_next_pipe_top_y",
        "next_next_pipe_bottom_y",
    ];

    /// All fields in their fixed order
    pub fn values(&self) -> [f32; Self::LEN] {
        [
            self.player_y,
            self.player_vel,
            self.next_pipe_dist_to_player,
            self.next_pipe_top_y,
            self.next_pipe_bottom_y,
            self.next_next_pipe_dist_to_player,
            self.next_next_pipe_top_y,
            self.next_next_pipe_bottom_y,
        ]
    }
}
