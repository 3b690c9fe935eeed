use crate::error::DispatchError;
use glam::Vec4;

/// Read-only grid of color samples, addressed by flattened row-major index.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelGrid {
    dimensions: (u32, u32),
    colors: Vec<Vec4>,
}

impl PixelGrid {
    pub fn from_colors(width: u32, height: u32, colors: Vec<Vec4>) -> Result<Self, DispatchError> {
        let expected = width as usize * height as usize;
        if colors.len() != expected {
            return Err(DispatchError::PixelCount {
                expected,
                actual: colors.len(),
            });
        }
        Ok(Self {
            dimensions: (width, height),
            colors,
        })
    }

    /// Converts 8-bit RGBA into normalized colors.
    pub fn from_rgba8(width: u32, height: u32, rgba: &[u8]) -> Result<Self, DispatchError> {
        if rgba.len() % 4 != 0 {
            return Err(DispatchError::PixelCount {
                expected: width as usize * height as usize,
                actual: rgba.len() / 4,
            });
        }
        let colors = rgba
            .chunks_exact(4)
            .map(|px| {
                Vec4::new(
                    f32::from(px[0]),
                    f32::from(px[1]),
                    f32::from(px[2]),
                    f32::from(px[3]),
                ) / 255.0
            })
            .collect();
        Self::from_colors(width, height, colors)
    }

    /// A grid filled with a single color.
    pub fn solid(width: u32, height: u32, color: Vec4) -> Self {
        Self {
            dimensions: (width, height),
            colors: vec![color; width as usize * height as usize],
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// The sample at `index`, or `None` past the end of the image.
    pub fn get(&self, index: usize) -> Option<Vec4> {
        self.colors.get(index).copied()
    }

    pub fn colors(&self) -> &[Vec4] {
        &self.colors
    }

    /// Raw `f32` RGBA bytes, ready for an `Rgba32Float` texture upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.colors)
    }
}
