// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The accumulation sink: a four-channel color buffer and a density
//! buffer, both `stride * height` cells, row-major.
//!
//! Every lane in a launch writes into the same two buffers with no
//! locking.  A deposit is a relaxed load of the cell, an add, and a
//! relaxed store.  It is deliberately *not* an atomic read-modify-write:
//! two lanes landing on the same pixel at the same instant can lose one
//! of the two increments.  At millions of samples per frame that is a
//! small, unbiased amount of noise, and it keeps the inner loop free of
//! contended atomics.  Storing the floats as `AtomicU32` bit patterns
//! means a lost update is the worst that can happen; there is never a
//! torn or undefined read.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Written into density cell zero by a lane that hit a fatal selection.
/// Real densities are never negative, but a later hit on that cell adds
/// to the sentinel, so `DensityBuffer::is_marked_fatal` is what to ask.
pub const FATAL_SELECTION_SENTINEL: f32 = -1.0;

#[inline]
fn load(cell: &AtomicU32) -> f32 {
    f32::from_bits(cell.load(Ordering::Relaxed))
}

#[inline]
fn store(cell: &AtomicU32, v: f32) {
    cell.store(v.to_bits(), Ordering::Relaxed)
}

fn zeroed(n: usize) -> Vec<AtomicU32> {
    (0..n).map(|_| AtomicU32::new(0.0_f32.to_bits())).collect()
}

/// Dimensions shared by both buffers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Dims {
    /// Columns that hold image data.
    pub width: usize,
    /// Rows.
    pub height: usize,
    /// Cells per row, at least `width`.
    pub stride: usize,
}

impl Dims {
    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.stride * self.height
    }

    /// True when there are no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The flattened index of a pixel.
    #[inline]
    pub fn offset(&self, x: usize, y: usize) -> usize {
        y * self.stride + x
    }
}

/// The RGBA accumulator.
#[derive(Debug)]
pub struct ColorBuffer {
    dims: Dims,
    cells: Vec<AtomicU32>,
}

impl ColorBuffer {
    /// A zeroed buffer.
    pub fn new(dims: Dims) -> Self {
        ColorBuffer {
            dims,
            cells: zeroed(dims.len() * 4),
        }
    }

    /// The buffer's dimensions.
    pub fn dims(&self) -> Dims {
        self.dims
    }

    /// Add `rgba` into cell `i`.  Race-tolerant, see the module docs.
    #[inline]
    pub fn deposit(&self, i: usize, rgba: [f32; 4]) {
        let cell = &self.cells[i * 4..i * 4 + 4];
        for (c, v) in cell.iter().zip(rgba.iter()) {
            store(c, load(c) + v);
        }
    }

    /// The current value of cell `i`.
    pub fn get(&self, i: usize) -> [f32; 4] {
        let cell = &self.cells[i * 4..i * 4 + 4];
        [load(&cell[0]), load(&cell[1]), load(&cell[2]), load(&cell[3])]
    }

    /// Copy the whole buffer out, four floats per cell.
    pub fn to_vec(&self) -> Vec<f32> {
        self.cells.iter().map(load).collect()
    }
}

/// The hit-count accumulator.
#[derive(Debug)]
pub struct DensityBuffer {
    dims: Dims,
    cells: Vec<AtomicU32>,
    fatal: AtomicBool,
}

impl DensityBuffer {
    /// A zeroed buffer.
    pub fn new(dims: Dims) -> Self {
        DensityBuffer {
            dims,
            cells: zeroed(dims.len()),
            fatal: AtomicBool::new(false),
        }
    }

    /// The buffer's dimensions.
    pub fn dims(&self) -> Dims {
        self.dims
    }

    /// Count one hit in cell `i`.  Race-tolerant, see the module docs.
    #[inline]
    pub fn bump(&self, i: usize) {
        let c = &self.cells[i];
        store(c, load(c) + 1.0);
    }

    /// Flag the whole render as invalid: stamp the sentinel into cell
    /// zero and raise a flag that no later deposit can clear.
    pub fn mark_fatal(&self) {
        self.fatal.store(true, Ordering::Relaxed);
        if let Some(c) = self.cells.first() {
            store(c, FATAL_SELECTION_SENTINEL);
        }
    }

    /// True if some lane flagged the render as invalid, whatever has
    /// landed in cell zero since.
    pub fn is_marked_fatal(&self) -> bool {
        self.fatal.load(Ordering::Relaxed)
    }

    /// The current value of cell `i`.
    pub fn get(&self, i: usize) -> f32 {
        load(&self.cells[i])
    }

    /// Copy the whole buffer out.
    pub fn to_vec(&self) -> Vec<f32> {
        self.cells.iter().map(load).collect()
    }
}
