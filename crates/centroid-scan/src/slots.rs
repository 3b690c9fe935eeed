//! Four-component vectors kept in independent atomic scalar cells.
//!
//! Neither WGSL nor `std` offer atomics on a whole `vec4`, so a vector is
//! split into four `u32` cells holding f32 bit patterns. A vector is only
//! coherent when its reader synchronizes with its writer through some other
//! location (a status flag, a barrier or a thread join); the cells themselves
//! are accessed with relaxed ordering.

use glam::Vec4;
use std::sync::atomic::{AtomicU32, Ordering};

/// Stores `value` into `cells[0..4]`.
pub(crate) fn store_vec4(cells: &[AtomicU32], value: Vec4) {
    for (cell, component) in cells.iter().zip(value.to_array()) {
        cell.store(component.to_bits(), Ordering::Relaxed);
    }
}

/// Loads a vector from `cells[0..4]`.
pub(crate) fn load_vec4(cells: &[AtomicU32]) -> Vec4 {
    let mut components = [0.0; 4];
    for (component, cell) in components.iter_mut().zip(cells) {
        *component = f32::from_bits(cell.load(Ordering::Relaxed));
    }
    Vec4::from_array(components)
}

/// A single vector made of four atomic cells.
#[derive(Debug, Default)]
pub struct AtomicVec4([AtomicU32; 4]);

impl AtomicVec4 {
    pub fn new(value: Vec4) -> Self {
        let cells = Self::default();
        cells.store(value);
        cells
    }

    pub fn load(&self) -> Vec4 {
        load_vec4(&self.0)
    }

    pub fn store(&self, value: Vec4) {
        store_vec4(&self.0, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_exact_bit_patterns() {
        let value = Vec4::new(-0.0, f32::MIN_POSITIVE, 1.0e-3, 3.5);
        let cells = AtomicVec4::new(value);
        let loaded = cells.load();
        assert_eq!(loaded.x.to_bits(), (-0.0f32).to_bits());
        assert_eq!(loaded, value);
    }

    #[test]
    fn slices_use_the_leading_four_cells() {
        let cells: Vec<AtomicU32> = (0..8).map(|_| AtomicU32::new(0)).collect();
        store_vec4(&cells[4..], Vec4::splat(2.0));
        assert_eq!(load_vec4(&cells[..4]), Vec4::ZERO);
        assert_eq!(load_vec4(&cells[4..]), Vec4::splat(2.0));
    }
}
