// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A flat TOML description of a flame, and the code that turns it into
//! the shape, info blocks, and palette a launch wants.
//!
//! ```toml
//! fuse = 20
//! max_oob = 10
//! spatial_filter_radius = 1.0
//!
//! [camera]
//! leftlower = [-1.2, -1.2]
//! rightupper = [1.2, 1.2]
//!
//! [[palette]]
//! position = 0.0
//! rgb = [255, 64, 0]
//!
//! [[xform]]
//! weight = 1.0
//! color = 0.0
//! affine = [0.5, 0.0, -0.5, 0.0, 0.5, -0.5]
//! variations = [{ kind = "linear", weight = 1.0 }]
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::accum::Dims;
use crate::affine::Affine;
use crate::camera::Camera;
use crate::error::RenderError;
use crate::info::{Features, IterInfo};
use crate::palette::Palette;
use crate::variations::VariationKind;
use crate::xform::{Transform, TransformSet};

const PALETTE_WIDTH: usize = 256;
const STRIDE_ALIGN: usize = 16;

fn default_fuse() -> i32 {
    20
}

fn default_max_oob() -> i32 {
    10
}

fn one() -> f32 {
    1.0
}

fn half() -> f32 {
    0.5
}

fn identity() -> [f32; 6] {
    Affine::IDENTITY.coefs()
}

/// The whole file.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scene {
    /// Warm-up rounds per seed.
    #[serde(default = "default_fuse")]
    pub fuse: i32,
    /// Consecutive misses before a reseed.
    #[serde(default = "default_max_oob")]
    pub max_oob: i32,
    /// Dither radius in pixels.
    #[serde(default = "one")]
    pub spatial_filter_radius: f32,
    /// The window onto flame space.
    pub camera: CameraSpec,
    /// Gradient stops.
    pub palette: Vec<StopSpec>,
    /// The selectable xforms.
    #[serde(rename = "xform")]
    pub xforms: Vec<XformSpec>,
    /// Applied after every selected xform.
    #[serde(default)]
    pub final_xform: Option<XformSpec>,
}

/// Corners of the visible window.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CameraSpec {
    /// Flame-space `[x, y]` of the bottom-left corner.
    pub leftlower: [f32; 2],
    /// Flame-space `[x, y]` of the top-right corner.
    pub rightupper: [f32; 2],
}

/// One palette stop.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StopSpec {
    /// Where on [0, 1] the stop sits.
    pub position: f32,
    /// Opaque color at the stop.
    pub rgb: [u8; 3],
}

/// One xform.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct XformSpec {
    /// Relative selection weight.  Ignored on the final xform.
    #[serde(default = "one")]
    pub weight: f32,
    /// Palette position.
    #[serde(default)]
    pub color: f32,
    /// Pull toward `color`.
    #[serde(default = "half")]
    pub color_speed: f32,
    /// `[a, b, c, d, e, f]`.
    #[serde(default = "identity")]
    pub affine: [f32; 6],
    /// Variations, in order.
    pub variations: Vec<VarSpec>,
}

/// One variation slot.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VarSpec {
    /// Which variation.
    pub kind: VariationKind,
    /// Its weight.
    #[serde(default = "one")]
    pub weight: f32,
    /// Its parameters, in the variation's own order.
    #[serde(default)]
    pub params: Vec<f32>,
}

impl XformSpec {
    fn to_transform(&self) -> Result<Transform, RenderError> {
        let mut variations = Vec::with_capacity(self.variations.len());
        for v in &self.variations {
            let var = v.kind.from_params(&v.params).ok_or_else(|| {
                RenderError::Scene(format!(
                    "{:?} takes {} parameters, got {}",
                    v.kind,
                    v.kind.nparams(),
                    v.params.len()
                ))
            })?;
            variations.push((var, v.weight));
        }
        Ok(Transform {
            color: self.color,
            color_speed: self.color_speed,
            ..Transform::new(Affine::from_coefs(self.affine), variations)
        })
    }
}

/// How a scene is sampled, as opposed to what it looks like.
#[derive(Copy, Clone, Debug)]
pub struct Sampling {
    /// Image width.
    pub width: usize,
    /// Image height.
    pub height: usize,
    /// Lanes sharing each block.
    pub lanes_per_block: usize,
    /// Blocks per launch; each gets its own slice of the time step.
    pub blocks: usize,
    /// Samples per pixel per launch, roughly.
    pub adj_density: f32,
}

/// A scene made ready for launching.
#[derive(Clone, Debug)]
pub struct Render {
    /// The fixed shape.
    pub features: Features,
    /// One packed info block per launch block.
    pub infos: Vec<Vec<f32>>,
    /// The palette.
    pub palette: Palette,
}

impl Scene {
    /// Parse a scene from TOML text.
    pub fn from_toml(text: &str) -> Result<Scene, RenderError> {
        toml::from_str(text).map_err(|e| RenderError::Scene(e.to_string()))
    }

    /// Read and parse a scene file.
    pub fn load(path: &Path) -> Result<Scene, RenderError> {
        let text = fs::read_to_string(path)
            .map_err(|e| RenderError::Scene(format!("{}: {}", path.display(), e)))?;
        Scene::from_toml(&text)
    }

    /// Resolve the scene against an image size and sampling plan.
    pub fn build(&self, s: &Sampling) -> Result<Render, RenderError> {
        if s.blocks == 0 {
            return Err(RenderError::InvalidConfig(
                "need at least one block".to_string(),
            ));
        }
        if !(s.adj_density > 0.0) {
            return Err(RenderError::InvalidConfig(
                "sample density must be positive".to_string(),
            ));
        }

        let mut xforms = self
            .xforms
            .iter()
            .map(XformSpec::to_transform)
            .collect::<Result<Vec<_>, _>>()?;
        let mut weights: Vec<f32> = self.xforms.iter().map(|x| x.weight).collect();
        let final_index = match self.final_xform {
            Some(ref fx) => {
                xforms.push(fx.to_transform()?);
                weights.push(0.0);
                Some(xforms.len() - 1)
            }
            None => None,
        };
        let set = TransformSet::from_weights(xforms, &weights, final_index)?;
        set.validate()?;

        let camera = Camera::new(
            s.width,
            s.height,
            (self.camera.leftlower[0], self.camera.leftlower[1]),
            (self.camera.rightupper[0], self.camera.rightupper[1]),
        )?;
        let stops: Vec<(f32, [u8; 3])> = self.palette.iter().map(|p| (p.position, p.rgb)).collect();
        let palette = Palette::from_stops(&stops, PALETTE_WIDTH)?;

        let acc = Dims {
            width: s.width,
            height: s.height,
            stride: (s.width + STRIDE_ALIGN - 1) / STRIDE_ALIGN * STRIDE_ALIGN,
        };
        let info = IterInfo {
            xforms: set,
            camera: camera.to_affine(),
            width: s.width as f32,
            height: s.height as f32,
            ntemporal_samples: s.blocks as f32,
            adj_density: s.adj_density,
            spatial_filter_radius: self.spatial_filter_radius,
            step_frac: 0.5,
        };
        let features = Features::for_info(&info, self.fuse, self.max_oob, acc, s.lanes_per_block);
        features.validate()?;

        let infos = (0..s.blocks)
            .map(|b| {
                let mut block = info.clone();
                block.step_frac = (b as f32 + 0.5) / s.blocks as f32;
                block.pack(&features)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Render {
            features,
            infos,
            palette,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variations::Variation;

    const SIERPINSKI: &str = r#"
        fuse = 15
        spatial_filter_radius = 0.5

        [camera]
        leftlower = [-1.1, -1.1]
        rightupper = [1.1, 1.1]

        [[palette]]
        position = 0.0
        rgb = [255, 0, 0]

        [[palette]]
        position = 1.0
        rgb = [0, 0, 255]

        [[xform]]
        color = 0.0
        affine = [0.5, 0.0, -0.5, 0.0, 0.5, -0.5]
        variations = [{ kind = "linear" }]

        [[xform]]
        weight = 2.0
        color = 1.0
        affine = [0.5, 0.0, 0.5, 0.0, 0.5, -0.5]
        variations = [{ kind = "linear" }, { kind = "rings2", weight = 0.1, params = [0.4] }]

        [final_xform]
        color_speed = 0.0
        variations = [{ kind = "spherical", weight = 0.5 }]
    "#;

    fn sampling() -> Sampling {
        Sampling {
            width: 100,
            height: 60,
            lanes_per_block: 8,
            blocks: 3,
            adj_density: 2.0,
        }
    }

    #[test]
    fn parses_and_fills_defaults() {
        let scene = Scene::from_toml(SIERPINSKI).unwrap();
        assert_eq!(scene.fuse, 15);
        assert_eq!(scene.max_oob, 10);
        assert_eq!(scene.xforms.len(), 2);
        assert_eq!(scene.xforms[0].weight, 1.0);
        assert_eq!(scene.xforms[0].color_speed, 0.5);
        assert_eq!(scene.xforms[1].variations[1].kind, VariationKind::Rings2);
        assert_eq!(
            scene.final_xform.as_ref().unwrap().affine,
            Affine::IDENTITY.coefs()
        );
    }

    #[test]
    fn builds_shape_blocks_and_palette() {
        let render = Scene::from_toml(SIERPINSKI).unwrap().build(&sampling()).unwrap();
        let f = &render.features;
        assert_eq!(f.xforms.len(), 3);
        assert_eq!(f.final_xform_index, Some(2));
        assert_eq!(f.xforms[1], vec![VariationKind::Linear, VariationKind::Rings2]);
        assert_eq!(f.acc.stride, 112);
        assert_eq!(render.infos.len(), 3);
        assert_eq!(render.palette.width(), 256);

        let info = IterInfo::unpack(&render.infos[2], f).unwrap();
        assert!((info.step_frac - 5.0 / 6.0).abs() < 1e-6);
        assert_eq!(info.ntemporal_samples, 3.0);
        let thresholds: Vec<f32> = info.xforms.xforms()[..2]
            .iter()
            .map(|x| x.selection_weight)
            .collect();
        assert!((thresholds[0] - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(thresholds[1], 1.0);
        assert_eq!(
            info.xforms.xforms()[1].variations[1],
            (Variation::Rings2 { val: 0.4 }, 0.1)
        );
    }

    #[test]
    fn bad_parameter_counts_are_reported() {
        let text = SIERPINSKI.replace("params = [0.4]", "params = [0.4, 0.5]");
        let err = Scene::from_toml(&text).unwrap().build(&sampling()).unwrap_err();
        match err {
            RenderError::Scene(msg) => assert!(msg.contains("Rings2")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_variations_and_fields_fail_to_parse() {
        assert!(Scene::from_toml(&SIERPINSKI.replace("\"linear\"", "\"nonesuch\"")).is_err());
        assert!(Scene::from_toml(&SIERPINSKI.replace("fuse = 15", "fuze = 15")).is_err());
    }

    #[test]
    fn out_of_range_colors_are_refused() {
        let text = SIERPINSKI.replace("color = 1.0", "color = 1.5");
        assert!(Scene::from_toml(&text).unwrap().build(&sampling()).is_err());
    }

    #[test]
    fn bad_sampling_is_refused() {
        let scene = Scene::from_toml(SIERPINSKI).unwrap();
        let mut s = sampling();
        s.blocks = 0;
        assert!(scene.build(&s).is_err());
        let mut s = sampling();
        s.adj_density = 0.0;
        assert!(scene.build(&s).is_err());
        let mut s = sampling();
        s.width = 0;
        assert!(scene.build(&s).is_err());
    }
}
