use std::f32::consts::FRAC_PI_4;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Point in image pixel coordinates (row index grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f32,
    pub y: f32,
}

impl PixelPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &PixelPoint) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

impl From<(f32, f32)> for PixelPoint {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// Egocentric compass direction from the hand to the target.
///
/// Declared counter-clockwise starting at "directly right"; the declaration
/// order is the bucket index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Right,
    UpRight,
    Up,
    UpLeft,
    Left,
    DownLeft,
    Down,
    DownRight,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::Right,
        Direction::UpRight,
        Direction::Up,
        Direction::UpLeft,
        Direction::Left,
        Direction::DownLeft,
        Direction::Down,
        Direction::DownRight,
    ];

    /// Buckets a mathematical angle (radians, counter-clockwise, 0 = right)
    /// into one of eight 45 degree sectors.
    ///
    /// Exact sector boundaries round half away from zero, so +22.5 degrees
    /// is up-right and -22.5 degrees is down-right.
    pub fn from_angle(radians: f32) -> Self {
        if !radians.is_finite() {
            return Direction::Right;
        }
        let bucket = (radians / FRAC_PI_4).round() as i64;
        Self::ALL[bucket.rem_euclid(8) as usize]
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn label(&self) -> &'static str {
        match self {
            Direction::Right => "directly right",
            Direction::UpRight => "up-right",
            Direction::Up => "directly up",
            Direction::UpLeft => "up-left",
            Direction::Left => "directly left",
            Direction::DownLeft => "down-left",
            Direction::Down => "directly down",
            Direction::DownRight => "down-right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Direction and pixel distance from `hand` to `target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Heading {
    pub direction: Direction,
    /// Radians, counter-clockwise with "up" meaning decreasing row index.
    pub angle: f32,
    pub distance: f32,
}

pub fn heading(hand: PixelPoint, target: PixelPoint) -> Heading {
    let dx = target.x - hand.x;
    let dy = target.y - hand.y;
    // atan2(0, 0) is 0, so coincident points read as "directly right".
    let angle = (-dy).atan2(dx);
    Heading {
        direction: Direction::from_angle(angle),
        angle,
        distance: dx.hypot(dy),
    }
}
