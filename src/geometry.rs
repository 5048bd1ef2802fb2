use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// 2D point in grid coordinates. Explosion points live on the integer grid
/// (see 'round'), but intermediate math stays in floats.
#[derive(Serialize, Deserialize, Debug, PartialEq, Copy, Clone, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

pub const ORIGIN: Vec2 = Vec2 { x: 0.0, y: 0.0 };

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Vec2 { x, y }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance_squared(&self, other: &Vec2) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn distance(&self, other: &Vec2) -> f32 {
        self.distance_squared(other).sqrt()
    }

    // Strict compare on squared distances despite the name; a point exactly
    // on the boundary counts as out of reach.
    pub fn distance_less_than_or_equal(&self, other: &Vec2, distance: f32) -> bool {
        self.distance_squared(other) < distance * distance
    }

    pub fn lerp(&self, other: &Vec2, t: f32) -> Vec2 {
        Vec2 {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Snap to the integer grid.
    pub fn round(&self) -> Vec2 {
        Vec2 { x: self.x.round(), y: self.y.round() }
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, other: Vec2) -> Vec2 {
        Vec2 { x: self.x + other.x, y: self.y + other.y }
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, other: Vec2) -> Vec2 {
        Vec2 { x: self.x - other.x, y: self.y - other.y }
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, scale: f32) -> Vec2 {
        Vec2 { x: self.x * scale, y: self.y * scale }
    }
}

/// Axis-aligned rectangle with inclusive bounds.
#[derive(Serialize, Deserialize, Debug, PartialEq, Copy, Clone)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    /// Rectangle containing no point at all, for environments without an
    /// exclusion area.
    pub const EMPTY: Rect = Rect {
        min: Vec2 { x: f32::INFINITY, y: f32::INFINITY },
        max: Vec2 { x: f32::NEG_INFINITY, y: f32::NEG_INFINITY },
    };

    pub fn new(min: Vec2, max: Vec2) -> Self {
        Rect { min, max }
    }

    pub fn contains(&self, point: &Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
            point.y >= self.min.y && point.y <= self.max.y
    }
}
