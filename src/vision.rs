use anyhow::{Result, anyhow};
use image::{DynamicImage, ImageBuffer, Rgb};
use serde::{Deserialize, Serialize};

/// A single RGB8 camera frame, row-major.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Blank frame of the given size. Used when only the dimensions matter,
    /// e.g. replaying recorded model outputs.
    pub fn blank(width: u32, height: u32) -> Self {
        let size = (width as usize) * (height as usize) * 3;
        Self {
            data: vec![0u8; size],
            width,
            height,
        }
    }

    pub fn from_image(image: &DynamicImage) -> Self {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        Self {
            data: rgb.into_raw(),
            width,
            height,
        }
    }

    pub fn to_image(&self) -> Result<DynamicImage> {
        let buffer = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_raw(
            self.width,
            self.height,
            self.data.clone(),
        )
        .ok_or_else(|| anyhow!("Frame buffer does not match {}x{} RGB", self.width, self.height))?;
        Ok(DynamicImage::ImageRgb8(buffer))
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Axis-aligned box in pixel coordinates with `x1 <= x2` and `y1 <= y2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    /// Builds a box from two opposite corners in any order.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    #[serde(default)]
    pub class_id: Option<u32>,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            class_id: None,
            confidence,
            bbox,
        }
    }

    pub fn is_person(&self) -> bool {
        self.label.trim().eq_ignore_ascii_case("person")
    }
}

/// Landmarks of one tracked hand. Only the wrist is used for guidance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandPose {
    /// Wrist position, normalized to `[0,1] x [0,1]` of the frame.
    pub wrist: (f32, f32),
    #[serde(default)]
    pub handedness: Option<String>,
}

impl HandPose {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            wrist: (x, y),
            handedness: None,
        }
    }

    /// Wrist position in integer pixel coordinates, clamped into the frame.
    /// Landmark models jitter slightly outside `[0,1]`.
    pub fn wrist_pixel(&self, width: u32, height: u32) -> (f32, f32) {
        let max_x = width.saturating_sub(1) as f32;
        let max_y = height.saturating_sub(1) as f32;
        let x = (self.wrist.0 * width as f32).floor().clamp(0.0, max_x);
        let y = (self.wrist.1 * height as f32).floor().clamp(0.0, max_y);
        (x, y)
    }
}

/// Dense relative depth, row-major, one sample per frame pixel.
/// Values are uncalibrated and only comparable within one map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthMap {
    pub width: u32,
    pub height: u32,
    pub values: Vec<f32>,
}

impl DepthMap {
    pub fn new(width: u32, height: u32, values: Vec<f32>) -> Result<Self> {
        let expected = (width as usize) * (height as usize);
        if values.len() != expected {
            return Err(anyhow!(
                "Depth map has {} samples, expected {} for {}x{}",
                values.len(),
                expected,
                width,
                height
            ));
        }
        Ok(Self { width, height, values })
    }

    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        Self {
            width,
            height,
            values: vec![value; (width as usize) * (height as usize)],
        }
    }

    /// Whether `values` holds exactly one sample per pixel.
    pub fn is_complete(&self) -> bool {
        self.values.len() == (self.width as usize) * (self.height as usize)
    }

    pub fn set(&mut self, x: u32, y: u32, value: f32) {
        if x < self.width && y < self.height {
            let idx = (y as usize) * (self.width as usize) + x as usize;
            if let Some(slot) = self.values.get_mut(idx) {
                *slot = value;
            }
        }
    }

    /// Depth at a pixel position; coordinates are floored and clamped.
    /// Reads past the end of a short map yield 0.
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        let max_x = self.width.saturating_sub(1) as f32;
        let max_y = self.height.saturating_sub(1) as f32;
        let px = x.floor().clamp(0.0, max_x) as usize;
        let py = y.floor().clamp(0.0, max_y) as usize;
        self.values
            .get(py * self.width as usize + px)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
