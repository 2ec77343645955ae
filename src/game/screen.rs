use image::{Rgb, RgbImage};

use super::engine::GameEngine;

const SKY: Rgb<u8> = Rgb([78, 192, 202]);
const GROUND: Rgb<u8> = Rgb([222, 216, 149]);
const PIPE: Rgb<u8> = Rgb([116, 191, 46]);
const BIRD: Rgb<u8> = Rgb([250, 210, 50]);

impl GameEngine {
    /// Current frame in the game's native layout.
    ///
    /// Frames are stored column-major: pixel `(y, x)` of the returned image
    /// holds screen position `(x, y)`, so the image is `height` pixels wide
    /// and `width` pixels tall.
    pub fn screen_rgb(&self) -> RgbImage {
        let config = self.config();
        let width = config.width;
        let height = config.height;
        let ground_y = config.ground_y();
        let gap = config.pipe_gap as f32;

        let mut frame = RgbImage::from_pixel(height, width, SKY);
        let mut fill = |x0: f32, y0: f32, x1: f32, y1: f32, color: Rgb<u8>| {
            let x0 = x0.max(0.0) as u32;
            let y0 = y0.max(0.0) as u32;
            let x1 = (x1.max(0.0) as u32).min(width);
            let y1 = (y1.max(0.0) as u32).min(height);
            for x in x0..x1 {
                for y in y0..y1 {
                    frame.put_pixel(y, x, color);
                }
            }
        };

        for pipe in self.pipes() {
            fill(pipe.left(), 0.0, pipe.right(), pipe.gap_start, PIPE);
            fill(pipe.left(), pipe.gap_start + gap, pipe.right(), ground_y, PIPE);
        }

        fill(0.0, ground_y, width as f32, height as f32, GROUND);

        let player = self.player();
        fill(
            player.pos_x,
            player.pos_y,
            player.pos_x + player.width,
            player.pos_y + player.height,
            BIRD,
        );

        frame
    }
}
