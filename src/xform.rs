// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Xforms and the set they live in.  An xform is an affine
//! pre-transform followed by a weighted sum of variations, plus a
//! palette position that it drags the running color toward.

use crate::affine::Affine;
use crate::error::RenderError;
use crate::rng::Mwc;
use crate::variations::Variation;

/// A point in flame space together with its running palette color.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Point {
    /// Flame-space x.
    pub x: f32,
    /// Flame-space y.
    pub y: f32,
    /// Position on the palette, in [0, 1].
    pub color: f32,
}

impl Point {
    /// A fresh point: position uniform in [-1, 1]², color in [0, 1].
    pub fn random(rng: &mut Mwc) -> Self {
        let x = rng.next_signed();
        let y = rng.next_signed();
        let color = rng.next_unit();
        Point { x, y, color }
    }
}

/// One entry in the transform set.
#[derive(Clone, Debug, PartialEq)]
pub struct Transform {
    /// Applied to the point before any variation sees it.
    pub affine: Affine,
    /// Variations and their weights, evaluated in order.  A weight of
    /// zero keeps the slot but removes its contribution.
    pub variations: Vec<(Variation, f32)>,
    /// This xform's position on the palette.
    pub color: f32,
    /// How hard a visit pulls the running color toward `color`.
    pub color_speed: f32,
    /// Cumulative selection threshold.  Ignored on the final xform.
    pub selection_weight: f32,
}

impl Transform {
    /// An xform with the given affine and variations, palette position
    /// zero, half color speed, and a threshold of one.
    pub fn new(affine: Affine, variations: Vec<(Variation, f32)>) -> Self {
        Transform {
            affine,
            variations,
            color: 0.0,
            color_speed: 0.5,
            selection_weight: 1.0,
        }
    }

    /// Run the point through this xform.
    #[inline]
    pub fn apply(&self, p: Point, rng: &mut Mwc) -> Point {
        let (tx, ty) = self.affine.apply(p.x, p.y);
        let (mut ox, mut oy) = (0.0, 0.0);
        for &(ref var, weight) in &self.variations {
            let (dx, dy) = var.apply(tx, ty, weight, rng);
            ox += dx;
            oy += dy;
        }
        Point {
            x: ox,
            y: oy,
            color: p.color * (1.0 - self.color_speed) + self.color * self.color_speed,
        }
    }
}

/// No non-final xform's threshold covered the selection draw.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FatalSelection {
    /// The draw that fell through.
    pub draw: f32,
}

/// The ordered xforms of a flame, at most one of which is final.
#[derive(Clone, Debug, PartialEq)]
pub struct TransformSet {
    xforms: Vec<Transform>,
    final_index: Option<usize>,
}

impl TransformSet {
    /// Wrap xforms whose thresholds are already set.  `final_index`
    /// names the final xform, if any.
    pub fn new(xforms: Vec<Transform>, final_index: Option<usize>) -> Result<Self, RenderError> {
        if let Some(i) = final_index {
            if i >= xforms.len() {
                return Err(RenderError::InvalidConfig(format!(
                    "final xform index {} out of range for {} xforms",
                    i,
                    xforms.len()
                )));
            }
        }
        Ok(TransformSet { xforms, final_index })
    }

    /// Build a set from relative selection weights, turning them into
    /// normalized cumulative thresholds.  `weights` must have one entry
    /// per xform; the final xform's entry is ignored.  The last
    /// non-final threshold is pinned to exactly one so rounding can't
    /// leave a gap at the top.
    pub fn from_weights(
        mut xforms: Vec<Transform>,
        weights: &[f32],
        final_index: Option<usize>,
    ) -> Result<Self, RenderError> {
        if weights.len() != xforms.len() {
            return Err(RenderError::InvalidConfig(format!(
                "{} weights for {} xforms",
                weights.len(),
                xforms.len()
            )));
        }
        let live = |i: &usize| Some(*i) != final_index;
        if weights.iter().enumerate().any(|(i, w)| live(&i) && !(*w >= 0.0)) {
            return Err(RenderError::InvalidConfig(
                "xform weights must be non-negative".to_string(),
            ));
        }
        let total: f32 = (0..xforms.len()).filter(live).map(|i| weights[i]).sum();
        if !(total > 0.0) {
            return Err(RenderError::InvalidConfig(
                "xform weights must sum to more than zero".to_string(),
            ));
        }
        let mut acc = 0.0;
        let mut last = None;
        for i in (0..xforms.len()).filter(live) {
            acc += weights[i] / total;
            xforms[i].selection_weight = acc;
            last = Some(i);
        }
        if let Some(i) = last {
            xforms[i].selection_weight = 1.0;
        }
        TransformSet::new(xforms, final_index)
    }

    /// Every xform, final included, in declaration order.
    pub fn xforms(&self) -> &[Transform] {
        &self.xforms
    }

    /// Index of the final xform, if there is one.
    pub fn final_index(&self) -> Option<usize> {
        self.final_index
    }

    /// The final xform, if there is one.
    pub fn final_xform(&self) -> Option<&Transform> {
        self.final_index.map(|i| &self.xforms[i])
    }

    /// Pick the first non-final xform whose threshold covers `draw`.
    #[inline]
    pub fn select(&self, draw: f32) -> Result<&Transform, FatalSelection> {
        self.xforms
            .iter()
            .enumerate()
            .filter(|&(i, _)| Some(i) != self.final_index)
            .map(|(_, xf)| xf)
            .find(|xf| draw <= xf.selection_weight)
            .ok_or(FatalSelection { draw })
    }

    /// Check the things the iterator trusts without looking: there is
    /// something to select, the thresholds climb to at least one, and
    /// colors sit on the palette.
    pub fn validate(&self) -> Result<(), RenderError> {
        let mut prev = 0.0;
        let mut last = None;
        for (i, xf) in self.xforms.iter().enumerate() {
            if !(xf.color >= 0.0 && xf.color <= 1.0) {
                return Err(RenderError::InvalidConfig(format!(
                    "xform {} color {} outside [0, 1]",
                    i, xf.color
                )));
            }
            if !(xf.color_speed >= 0.0 && xf.color_speed <= 1.0) {
                return Err(RenderError::InvalidConfig(format!(
                    "xform {} color speed {} outside [0, 1]",
                    i, xf.color_speed
                )));
            }
            if Some(i) == self.final_index {
                continue;
            }
            if !(xf.selection_weight >= prev) {
                return Err(RenderError::InvalidConfig(format!(
                    "xform {} threshold {} falls below {}",
                    i, xf.selection_weight, prev
                )));
            }
            prev = xf.selection_weight;
            last = Some(xf.selection_weight);
        }
        match last {
            None => Err(RenderError::InvalidConfig(
                "no selectable xforms".to_string(),
            )),
            Some(t) if t < 1.0 => Err(RenderError::InvalidConfig(format!(
                "last threshold {} does not reach 1",
                t
            ))),
            Some(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::seed_lanes;

    fn linear(color: f32, speed: f32) -> Transform {
        Transform {
            color,
            color_speed: speed,
            ..Transform::new(Affine::IDENTITY, vec![(Variation::Linear, 1.0)])
        }
    }

    #[test]
    fn weights_become_cumulative_thresholds() {
        let set = TransformSet::from_weights(
            vec![linear(0.0, 0.5), linear(0.5, 0.5), linear(1.0, 0.5)],
            &[1.0, 1.0, 2.0],
            None,
        )
        .unwrap();
        let t: Vec<f32> = set.xforms().iter().map(|x| x.selection_weight).collect();
        assert_eq!(t, vec![0.25, 0.5, 1.0]);
        assert!(set.validate().is_ok());
    }

    #[test]
    fn final_xform_is_skipped_by_thresholds_and_selection() {
        let set = TransformSet::from_weights(
            vec![linear(0.0, 0.5), linear(1.0, 1.0), linear(0.5, 0.5)],
            &[1.0, 100.0, 1.0],
            Some(1),
        )
        .unwrap();
        assert_eq!(set.xforms()[0].selection_weight, 0.5);
        assert_eq!(set.xforms()[2].selection_weight, 1.0);
        assert_eq!(set.final_xform().unwrap().color, 1.0);
        for &s in &[0.0, 0.3, 0.5, 0.51, 0.99, 1.0] {
            assert_ne!(set.select(s).unwrap().color, 1.0);
        }
    }

    #[test]
    fn ties_go_to_the_first_xform() {
        let set = TransformSet::from_weights(
            vec![linear(0.1, 0.5), linear(0.9, 0.5)],
            &[1.0, 1.0],
            None,
        )
        .unwrap();
        assert_eq!(set.select(0.5).unwrap().color, 0.1);
        assert_eq!(set.select(0.500_001).unwrap().color, 0.9);
    }

    #[test]
    fn valid_thresholds_never_fall_through() {
        let set = TransformSet::from_weights(
            vec![linear(0.0, 0.5), linear(0.3, 0.5), linear(0.7, 0.5)],
            &[0.3, 0.001, 7.0],
            None,
        )
        .unwrap();
        let mut rng = seed_lanes(1, 17)[0];
        for _ in 0..100_000 {
            assert!(set.select(rng.next_unit()).is_ok());
        }
        assert!(set.select(0.0).is_ok());
        assert!(set.select(1.0).is_ok());
    }

    #[test]
    fn short_thresholds_are_a_fatal_selection() {
        let mut xf = linear(0.0, 0.5);
        xf.selection_weight = 0.5;
        let set = TransformSet::new(vec![xf], None).unwrap();
        assert_eq!(set.select(0.75), Err(FatalSelection { draw: 0.75 }));
        assert!(set.validate().is_err());
    }

    #[test]
    fn validate_rejects_decreasing_thresholds_and_bad_colors() {
        let mut a = linear(0.0, 0.5);
        let mut b = linear(0.0, 0.5);
        a.selection_weight = 1.0;
        b.selection_weight = 0.5;
        assert!(TransformSet::new(vec![a.clone(), b], None)
            .unwrap()
            .validate()
            .is_err());
        a.color = 1.5;
        assert!(TransformSet::new(vec![a], None).unwrap().validate().is_err());
    }

    #[test]
    fn bad_weights_are_refused() {
        let xfs = vec![linear(0.0, 0.5), linear(0.0, 0.5)];
        assert!(TransformSet::from_weights(xfs.clone(), &[0.0, 0.0], None).is_err());
        assert!(TransformSet::from_weights(xfs.clone(), &[1.0, -1.0], None).is_err());
        assert!(TransformSet::from_weights(xfs.clone(), &[1.0], None).is_err());
        assert!(TransformSet::new(xfs, Some(2)).is_err());
    }

    #[test]
    fn color_blend_stays_on_the_palette() {
        let mut rng = seed_lanes(1, 23)[0];
        for _ in 0..10_000 {
            let xf = linear(rng.next_unit(), rng.next_unit());
            let p = Point {
                x: 0.0,
                y: 0.0,
                color: rng.next_unit(),
            };
            let c = xf.apply(p, &mut rng).color;
            assert!(c >= 0.0 && c <= 1.0, "blend gave {}", c);
        }
    }

    #[test]
    fn apply_sums_weighted_variations_after_the_affine() {
        let xf = Transform::new(
            Affine::from_coefs([2.0, 0.0, 0.0, 0.0, 2.0, 0.0]),
            vec![(Variation::Linear, 0.25), (Variation::Linear, 0.25)],
        );
        let mut rng = seed_lanes(1, 0)[0];
        let p = xf.apply(
            Point {
                x: 1.0,
                y: -2.0,
                color: 0.0,
            },
            &mut rng,
        );
        assert_eq!((p.x, p.y), (1.0, -2.0));
    }

    #[test]
    fn zero_weight_variations_collapse_to_the_origin() {
        let xf = Transform::new(Affine::IDENTITY, vec![(Variation::Swirl, 0.0)]);
        let mut rng = seed_lanes(1, 0)[0];
        let p = xf.apply(
            Point {
                x: 0.4,
                y: 0.2,
                color: 0.3,
            },
            &mut rng,
        );
        assert_eq!((p.x, p.y), (0.0, 0.0));
    }
}
