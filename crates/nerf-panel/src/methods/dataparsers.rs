use std::path::PathBuf;

use nerf_panel_macros::Method;

#[Method(id = "nerfstudio-data")]
#[derive(Debug, Clone)]
pub struct NerfstudioDataParser {
    pub scale_factor: f64,
    pub downscale_factor: Option<i32>,
    pub scene_scale: f64,
    #[choices("pca", "up", "vertical", "none")]
    pub orientation_method: String,
    #[choices("poses", "focus", "none")]
    pub center_method: String,
    pub auto_scale_poses: bool,
    #[choices("fraction", "filename", "interval", "all")]
    pub eval_mode: String,
    pub train_split_fraction: f64,
    pub eval_interval: i32,
    pub depth_unit_scale_factor: f64,
    /// Replace masked-out pixels with this colour.
    pub mask_color: Option<[f64; 3]>,
}

impl Default for NerfstudioDataParser {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            downscale_factor: None,
            scene_scale: 1.0,
            orientation_method: "up".into(),
            center_method: "poses".into(),
            auto_scale_poses: true,
            eval_mode: "fraction".into(),
            train_split_fraction: 0.9,
            eval_interval: 8,
            depth_unit_scale_factor: 1e-3,
            mask_color: None,
        }
    }
}

#[Method(id = "blender-data")]
#[derive(Debug, Clone)]
pub struct BlenderDataParser {
    pub scale_factor: f64,
    pub alpha_color: Option<String>,
    pub ply_path: Option<PathBuf>,
}

impl Default for BlenderDataParser {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            alpha_color: Some("white".into()),
            ply_path: None,
        }
    }
}

#[Method(id = "instant-ngp-data")]
#[derive(Debug, Clone)]
pub struct InstantNgpDataParser {
    pub scene_scale: f64,
    #[choices("fraction", "filename", "interval", "all")]
    pub eval_mode: String,
    pub train_split_fraction: f64,
    pub eval_interval: i32,
}

impl Default for InstantNgpDataParser {
    fn default() -> Self {
        Self {
            scene_scale: 0.3333,
            eval_mode: "fraction".into(),
            train_split_fraction: 0.9,
            eval_interval: 8,
        }
    }
}

#[Method(id = "colmap")]
#[derive(Debug, Clone)]
pub struct ColmapDataParser {
    pub scale_factor: f64,
    pub downscale_factor: Option<i32>,
    #[choices("floor", "round", "ceil")]
    pub downscale_rounding_mode: String,
    pub scene_scale: f64,
    #[choices("pca", "up", "vertical", "none")]
    pub orientation_method: String,
    #[choices("poses", "focus", "none")]
    pub center_method: String,
    pub auto_scale_poses: bool,
    pub assume_colmap_world_coordinate_convention: bool,
    #[choices("fraction", "filename", "interval", "all")]
    pub eval_mode: String,
    pub train_split_fraction: f64,
    pub eval_interval: i32,
    pub depth_unit_scale_factor: f64,
    pub images_path: PathBuf,
    pub masks_path: Option<PathBuf>,
    pub depths_path: Option<PathBuf>,
    /// Sparse model location relative to the data directory.
    pub colmap_path: PathBuf,
    pub max_2d_matches_per_3d_point: i32,
}

impl Default for ColmapDataParser {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            downscale_factor: None,
            downscale_rounding_mode: "floor".into(),
            scene_scale: 1.0,
            orientation_method: "up".into(),
            center_method: "poses".into(),
            auto_scale_poses: true,
            assume_colmap_world_coordinate_convention: true,
            eval_mode: "interval".into(),
            train_split_fraction: 0.9,
            eval_interval: 8,
            depth_unit_scale_factor: 1e-3,
            images_path: PathBuf::from("images"),
            masks_path: None,
            depths_path: None,
            colmap_path: PathBuf::from("colmap/sparse/0"),
            max_2d_matches_per_3d_point: 0,
        }
    }
}

#[Method(id = "dnerf-data")]
#[derive(Debug, Clone)]
pub struct DNeRFDataParser {
    pub scale_factor: f64,
    pub alpha_color: String,
}

impl Default for DNeRFDataParser {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            alpha_color: "white".into(),
        }
    }
}

#[Method(id = "phototourism-data")]
#[derive(Debug, Clone)]
pub struct PhototourismDataParser {
    pub scale_factor: f64,
    pub alpha_color: String,
    pub train_split_fraction: f64,
    pub scene_scale: f64,
    #[choices("pca", "up", "vertical", "none")]
    pub orientation_method: String,
    #[choices("poses", "focus", "none")]
    pub center_method: String,
    pub auto_scale_poses: bool,
}

impl Default for PhototourismDataParser {
    fn default() -> Self {
        Self {
            scale_factor: 3.0,
            alpha_color: "white".into(),
            train_split_fraction: 0.9,
            scene_scale: 1.0,
            orientation_method: "up".into(),
            center_method: "poses".into(),
            auto_scale_poses: true,
        }
    }
}
