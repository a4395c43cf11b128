use std::path::PathBuf;

use nerf_panel_macros::Method;

/// Process images into a nerfstudio dataset.
#[Method(id = "ImagesToNerfstudioDataset", subcommand = "images")]
#[derive(Debug, Clone)]
pub struct ImagesToNerfstudioDataset {
    /// Path to eval data; uses the same data for training and eval when unset.
    pub eval_data: Option<PathBuf>,
    #[choices("perspective", "fisheye", "equirectangular", "pinhole", "simple_pinhole")]
    pub camera_type: String,
    /// Feature matching method; vocab_tree is recommended for large captures.
    #[choices("exhaustive", "sequential", "vocab_tree")]
    pub matching_method: String,
    #[choices("any", "colmap", "hloc")]
    pub sfm_tool: String,
    pub refine_pixsfm: bool,
    pub refine_intrinsics: bool,
    #[choices(
        "any",
        "sift",
        "superpoint",
        "superpoint_aachen",
        "superpoint_max",
        "superpoint_inloc",
        "r2d2",
        "d2net-ss",
        "sosnet",
        "disk"
    )]
    pub feature_type: String,
    #[choices(
        "any",
        "NN",
        "superglue",
        "superglue-fast",
        "NN-superpoint",
        "NN-ratio",
        "NN-mutual",
        "adalam",
        "disk+lightglue",
        "superpoint+lightglue"
    )]
    pub matcher_type: String,
    /// Number of times to downscale the images.
    pub num_downscales: i32,
    pub skip_colmap: bool,
    pub skip_image_processing: bool,
    /// Colmap model location relative to the output directory.
    pub colmap_model_path: PathBuf,
    pub colmap_cmd: String,
    /// Number of samples per image taken from an equirectangular capture.
    #[choices(8, 14)]
    pub images_per_equirect: i32,
    /// Portion of the image to crop: top, bottom, left, right.
    pub crop_factor: [f64; 4],
    pub crop_bottom: f64,
    pub gpu: bool,
    pub use_sfm_depth: bool,
    pub include_depth_debug: bool,
    pub same_dimensions: bool,
    pub percent_radius_crop: f64,
}

impl Default for ImagesToNerfstudioDataset {
    fn default() -> Self {
        Self {
            eval_data: None,
            camera_type: "perspective".into(),
            matching_method: "vocab_tree".into(),
            sfm_tool: "any".into(),
            refine_pixsfm: false,
            refine_intrinsics: true,
            feature_type: "any".into(),
            matcher_type: "any".into(),
            num_downscales: 3,
            skip_colmap: false,
            skip_image_processing: false,
            colmap_model_path: PathBuf::from("colmap/sparse/0"),
            colmap_cmd: "colmap".into(),
            images_per_equirect: 8,
            crop_factor: [0.0; 4],
            crop_bottom: 0.0,
            gpu: true,
            use_sfm_depth: false,
            include_depth_debug: false,
            same_dimensions: true,
            percent_radius_crop: 1.0,
        }
    }
}

/// Process videos into a nerfstudio dataset by sampling frames.
#[Method(id = "VideoToNerfstudioDataset", subcommand = "video")]
#[derive(Debug, Clone)]
pub struct VideoToNerfstudioDataset {
    /// Target number of frames to sample from the video.
    pub num_frames_target: i32,
    pub random_seed: Option<i32>,
    pub eval_random_seed: Option<i32>,
    #[choices("perspective", "fisheye", "equirectangular", "pinhole", "simple_pinhole")]
    pub camera_type: String,
    #[choices("exhaustive", "sequential", "vocab_tree")]
    pub matching_method: String,
    #[choices("any", "colmap", "hloc")]
    pub sfm_tool: String,
    pub refine_pixsfm: bool,
    pub refine_intrinsics: bool,
    #[choices(
        "any",
        "sift",
        "superpoint",
        "superpoint_aachen",
        "superpoint_max",
        "superpoint_inloc",
        "r2d2",
        "d2net-ss",
        "sosnet",
        "disk"
    )]
    pub feature_type: String,
    #[choices(
        "any",
        "NN",
        "superglue",
        "superglue-fast",
        "NN-superpoint",
        "NN-ratio",
        "NN-mutual",
        "adalam",
        "disk+lightglue",
        "superpoint+lightglue"
    )]
    pub matcher_type: String,
    pub num_downscales: i32,
    pub skip_colmap: bool,
    pub colmap_cmd: String,
    #[choices(8, 14)]
    pub images_per_equirect: i32,
    pub crop_factor: [f64; 4],
    pub crop_bottom: f64,
    pub gpu: bool,
    pub use_sfm_depth: bool,
    pub same_dimensions: bool,
    pub percent_radius_crop: f64,
}

impl Default for VideoToNerfstudioDataset {
    fn default() -> Self {
        Self {
            num_frames_target: 300,
            random_seed: None,
            eval_random_seed: None,
            camera_type: "perspective".into(),
            matching_method: "sequential".into(),
            sfm_tool: "any".into(),
            refine_pixsfm: false,
            refine_intrinsics: true,
            feature_type: "any".into(),
            matcher_type: "any".into(),
            num_downscales: 3,
            skip_colmap: false,
            colmap_cmd: "colmap".into(),
            images_per_equirect: 8,
            crop_factor: [0.0; 4],
            crop_bottom: 0.0,
            gpu: true,
            use_sfm_depth: false,
            same_dimensions: true,
            percent_radius_crop: 1.0,
        }
    }
}

/// Process Polycam captures into a nerfstudio dataset.
#[Method(id = "ProcessPolycam", subcommand = "polycam")]
#[derive(Debug, Clone)]
pub struct ProcessPolycam {
    pub num_downscales: i32,
    /// Use the raw images instead of the ones Polycam corrected.
    pub use_uncorrected_images: bool,
    pub max_dataset_size: i32,
    /// Images below this blur score are dropped.
    pub min_blur_score: f64,
    pub crop_border_pixels: i32,
    pub use_depth: bool,
}

impl Default for ProcessPolycam {
    fn default() -> Self {
        Self {
            num_downscales: 3,
            use_uncorrected_images: false,
            max_dataset_size: 600,
            min_blur_score: 25.0,
            crop_border_pixels: 15,
            use_depth: false,
        }
    }
}

/// Process Record3D captures into a nerfstudio dataset.
#[Method(id = "ProcessRecord3D", subcommand = "record3d")]
#[derive(Debug, Clone)]
pub struct ProcessRecord3D {
    pub num_downscales: i32,
    pub max_dataset_size: i32,
    /// Directory of per-frame point clouds to merge into the initial cloud.
    pub ply_dir: Option<PathBuf>,
    pub voxel_size: Option<f64>,
}

impl Default for ProcessRecord3D {
    fn default() -> Self {
        Self {
            num_downscales: 3,
            max_dataset_size: 300,
            ply_dir: None,
            voxel_size: Some(0.8),
        }
    }
}

/// Process OpenDroneMap data into a nerfstudio dataset.
#[Method(id = "ProcessODM", subcommand = "odm")]
#[derive(Debug, Clone)]
pub struct ProcessODM {
    pub num_downscales: i32,
    pub max_dataset_size: i32,
}

impl Default for ProcessODM {
    fn default() -> Self {
        Self {
            num_downscales: 3,
            max_dataset_size: 600,
        }
    }
}
