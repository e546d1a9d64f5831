// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! What a launch knows before it starts.
//!
//! `Features` is the fixed shape of a render: how many xforms, which
//! variations each one runs, which one is final, the fuse length, the
//! out-of-bounds limit, and the accumulator geometry.  It doesn't change
//! between launches.
//!
//! `IterInfo` is everything that may change from block to block: the
//! xform coefficients and weights, the camera, the sample density, and
//! the time step.  It travels as a flat block of floats whose offsets
//! are all resolved by `Layout` before any lane runs, so the iterator
//! never computes anything about its configuration mid-loop.

use crate::accum::Dims;
use crate::affine::Affine;
use crate::error::RenderError;
use crate::variations::VariationKind;
use crate::xform::{Transform, TransformSet};

/// The compile-time shape of a render.
#[derive(Clone, Debug, PartialEq)]
pub struct Features {
    /// The variation kinds of each xform, in order.
    pub xforms: Vec<Vec<VariationKind>>,
    /// Which xform, if any, is final.
    pub final_xform_index: Option<usize>,
    /// Warm-up rounds after every (re)seed.
    pub fuse: i32,
    /// Consecutive out-of-frame samples tolerated before a reseed.
    pub max_oob: i32,
    /// Accumulator geometry.
    pub acc: Dims,
    /// Lanes that share one info block.
    pub lanes_per_block: usize,
}

impl Features {
    /// Read the shape off an existing info.
    pub fn for_info(
        info: &IterInfo,
        fuse: i32,
        max_oob: i32,
        acc: Dims,
        lanes_per_block: usize,
    ) -> Self {
        Features {
            xforms: info
                .xforms
                .xforms()
                .iter()
                .map(|xf| xf.variations.iter().map(|(v, _)| v.kind()).collect())
                .collect(),
            final_xform_index: info.xforms.final_index(),
            fuse,
            max_oob,
            acc,
            lanes_per_block,
        }
    }

    /// Sanity checks on the shape itself.
    pub fn validate(&self) -> Result<(), RenderError> {
        let bad = |m: &str| Err(RenderError::InvalidConfig(m.to_string()));
        if self.xforms.is_empty() {
            return bad("no xforms");
        }
        if self.final_xform_index.map_or(false, |i| i >= self.xforms.len()) {
            return bad("final xform index out of range");
        }
        if self.fuse < 0 || self.max_oob < 0 {
            return bad("fuse and max_oob must not be negative");
        }
        if self.acc.width == 0 || self.acc.height == 0 || self.acc.stride < self.acc.width {
            return bad("accumulator must be non-empty with stride >= width");
        }
        if self.lanes_per_block == 0 {
            return bad("lanes per block must be positive");
        }
        Ok(())
    }

    /// Resolve every field of an info block to its offset.
    pub fn layout(&self) -> Layout {
        Layout::new(self)
    }
}

/// The per-block values the iterator reads.
#[derive(Clone, Debug, PartialEq)]
pub struct IterInfo {
    /// The xforms, final included.
    pub xforms: TransformSet,
    /// Flame space to continuous pixel coordinates.
    pub camera: Affine,
    /// Image width in pixels, for the sample budget.
    pub width: f32,
    /// Image height in pixels, for the sample budget.
    pub height: f32,
    /// How many blocks share the frame's sample budget.
    pub ntemporal_samples: f32,
    /// Scales the sample budget.
    pub adj_density: f32,
    /// Dither is `±0.5 * spatial_filter_radius` per axis.
    pub spatial_filter_radius: f32,
    /// Where in the frame's time step this block sits, for the palette.
    pub step_frac: f32,
}

impl IterInfo {
    /// How many active samples each lane of a block draws.
    pub fn samples_per_lane(&self, lanes_per_block: usize) -> u64 {
        let area = f64::from(self.width) * f64::from(self.height);
        let share = f64::from(self.ntemporal_samples) * lanes_per_block as f64;
        (area / share * f64::from(self.adj_density)) as u64
    }

    /// Flatten into a block laid out per `features`.
    pub fn pack(&self, features: &Features) -> Result<Vec<f32>, RenderError> {
        let shape = Features::for_info(
            self,
            features.fuse,
            features.max_oob,
            features.acc,
            features.lanes_per_block,
        );
        if shape.xforms != features.xforms || shape.final_xform_index != features.final_xform_index
        {
            return Err(RenderError::LayoutMismatch(
                "xforms differ from the compiled shape".to_string(),
            ));
        }

        let layout = features.layout();
        let mut block = vec![0.0; layout.len];
        for (xf, slots) in self.xforms.xforms().iter().zip(&layout.xforms) {
            block[slots.affine..slots.affine + 6].copy_from_slice(&xf.affine.coefs());
            block[slots.color] = xf.color;
            block[slots.color_speed] = xf.color_speed;
            block[slots.selection_weight] = xf.selection_weight;
            for (&(ref var, weight), &(w_at, p_at)) in xf.variations.iter().zip(&slots.vars) {
                block[w_at] = weight;
                let mut params = Vec::with_capacity(4);
                var.write_params(&mut params);
                block[p_at..p_at + params.len()].copy_from_slice(&params);
            }
        }
        block[layout.camera..layout.camera + 6].copy_from_slice(&self.camera.coefs());
        block[layout.width] = self.width;
        block[layout.height] = self.height;
        block[layout.ntemporal_samples] = self.ntemporal_samples;
        block[layout.adj_density] = self.adj_density;
        block[layout.spatial_filter_radius] = self.spatial_filter_radius;
        block[layout.step_frac] = self.step_frac;
        Ok(block)
    }

    /// Rebuild the typed info from a block laid out per `features`.
    pub fn unpack(block: &[f32], features: &Features) -> Result<IterInfo, RenderError> {
        let layout = features.layout();
        if block.len() != layout.len {
            return Err(RenderError::LayoutMismatch(format!(
                "block holds {} floats, layout wants {}",
                block.len(),
                layout.len
            )));
        }
        let affine_at = |at: usize| {
            let mut c = [0.0; 6];
            c.copy_from_slice(&block[at..at + 6]);
            Affine::from_coefs(c)
        };

        let mut xforms = Vec::with_capacity(layout.xforms.len());
        for (kinds, slots) in features.xforms.iter().zip(&layout.xforms) {
            let mut variations = Vec::with_capacity(kinds.len());
            for (&kind, &(w_at, p_at)) in kinds.iter().zip(&slots.vars) {
                let var = kind
                    .from_params(&block[p_at..p_at + kind.nparams()])
                    .ok_or_else(|| {
                        RenderError::LayoutMismatch(format!("bad parameters for {:?}", kind))
                    })?;
                variations.push((var, block[w_at]));
            }
            xforms.push(Transform {
                affine: affine_at(slots.affine),
                variations,
                color: block[slots.color],
                color_speed: block[slots.color_speed],
                selection_weight: block[slots.selection_weight],
            });
        }

        Ok(IterInfo {
            xforms: TransformSet::new(xforms, features.final_xform_index)?,
            camera: affine_at(layout.camera),
            width: block[layout.width],
            height: block[layout.height],
            ntemporal_samples: block[layout.ntemporal_samples],
            adj_density: block[layout.adj_density],
            spatial_filter_radius: block[layout.spatial_filter_radius],
            step_frac: block[layout.step_frac],
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
struct XformSlots {
    affine: usize,
    color: usize,
    color_speed: usize,
    selection_weight: usize,
    // (weight, first parameter) per variation
    vars: Vec<(usize, usize)>,
}

/// Offsets of every field in a packed info block.
#[derive(Clone, Debug, PartialEq)]
pub struct Layout {
    xforms: Vec<XformSlots>,
    camera: usize,
    width: usize,
    height: usize,
    ntemporal_samples: usize,
    adj_density: usize,
    spatial_filter_radius: usize,
    step_frac: usize,
    len: usize,
}

impl Layout {
    fn new(features: &Features) -> Layout {
        let mut next = 0;
        let mut take = |n: usize| {
            let at = next;
            next += n;
            at
        };
        let xforms = features
            .xforms
            .iter()
            .map(|kinds| XformSlots {
                affine: take(6),
                color: take(1),
                color_speed: take(1),
                selection_weight: take(1),
                vars: kinds.iter().map(|k| (take(1), take(k.nparams()))).collect(),
            })
            .collect();
        let camera = take(6);
        let width = take(1);
        let height = take(1);
        let ntemporal_samples = take(1);
        let adj_density = take(1);
        let spatial_filter_radius = take(1);
        let step_frac = take(1);
        Layout {
            xforms,
            camera,
            width,
            height,
            ntemporal_samples,
            adj_density,
            spatial_filter_radius,
            step_frac,
            len: next,
        }
    }

    /// Floats in a packed block.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Never true in practice; a block always carries the scalars.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Copy a block into block-shared storage the way the lanes of a block
/// do it together: lane `i` of `lanes` copies words `i`, `i + lanes`,
/// `i + 2 * lanes`, and so on.  The slices are disjoint, so no lane
/// waits on another during the copy.  The copy phase returns before
/// any lane reads the shared block, which is the synchronization point.
pub fn preload(src: &[f32], lanes: usize) -> Vec<f32> {
    let lanes = lanes.max(1);
    let mut shared = vec![0.0; src.len()];
    for lane in 0..lanes {
        for i in (lane..src.len()).step_by(lanes) {
            shared[i] = src[i];
        }
    }
    shared
}
