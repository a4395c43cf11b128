use std::collections::BTreeMap;

use nerf_panel_macros::Method;

#[Method(
    id = "nerfacto",
    description = "Recommended real-time model tuned for real captures. This model will be continually updated."
)]
#[derive(Debug, Clone)]
pub struct NerfactoModel {
    pub near_plane: f64,
    pub far_plane: f64,
    #[choices("random", "last_sample", "black", "white")]
    pub background_color: String,
    pub hidden_dim: i32,
    pub hidden_dim_color: i32,
    pub hidden_dim_transient: i32,
    pub num_levels: i32,
    pub base_res: i32,
    pub max_res: i32,
    pub log2_hashmap_size: i32,
    pub features_per_level: i32,
    /// Samples per ray for each proposal network.
    pub num_proposal_samples_per_ray: [i32; 2],
    pub num_nerf_samples_per_ray: i32,
    pub proposal_update_every: i32,
    pub proposal_warmup: i32,
    pub num_proposal_iterations: i32,
    pub use_same_proposal_network: bool,
    #[choices("piecewise", "uniform")]
    pub proposal_initial_sampler: String,
    pub interlevel_loss_mult: f64,
    pub distortion_loss_mult: f64,
    pub orientation_loss_mult: f64,
    pub pred_normal_loss_mult: f64,
    pub use_proposal_weight_anneal: bool,
    pub use_appearance_embedding: bool,
    pub use_average_appearance_embedding: bool,
    pub proposal_weights_anneal_slope: f64,
    pub proposal_weights_anneal_max_num_iters: i32,
    pub use_single_jitter: bool,
    /// Train a normals head; needed for normal-based exports.
    pub predict_normals: bool,
    pub disable_scene_contraction: bool,
    pub use_gradient_scaling: bool,
    #[choices("tcnn", "torch")]
    pub implementation: String,
    pub appearance_embed_dim: i32,
    pub average_init_density: f64,
    #[skip]
    pub loss_coefficients: BTreeMap<String, f64>,
}

impl Default for NerfactoModel {
    fn default() -> Self {
        Self {
            near_plane: 0.05,
            far_plane: 1000.0,
            background_color: "last_sample".into(),
            hidden_dim: 64,
            hidden_dim_color: 64,
            hidden_dim_transient: 64,
            num_levels: 16,
            base_res: 16,
            max_res: 2048,
            log2_hashmap_size: 19,
            features_per_level: 2,
            num_proposal_samples_per_ray: [256, 96],
            num_nerf_samples_per_ray: 48,
            proposal_update_every: 5,
            proposal_warmup: 5000,
            num_proposal_iterations: 2,
            use_same_proposal_network: false,
            proposal_initial_sampler: "piecewise".into(),
            interlevel_loss_mult: 1.0,
            distortion_loss_mult: 0.002,
            orientation_loss_mult: 0.0001,
            pred_normal_loss_mult: 0.001,
            use_proposal_weight_anneal: true,
            use_appearance_embedding: true,
            use_average_appearance_embedding: true,
            proposal_weights_anneal_slope: 10.0,
            proposal_weights_anneal_max_num_iters: 1000,
            use_single_jitter: true,
            predict_normals: false,
            disable_scene_contraction: false,
            use_gradient_scaling: false,
            implementation: "tcnn".into(),
            appearance_embed_dim: 32,
            average_init_density: 1.0,
            loss_coefficients: BTreeMap::from([
                ("rgb_loss_coarse".to_string(), 1.0),
                ("rgb_loss_fine".to_string(), 1.0),
            ]),
        }
    }
}

#[Method(
    id = "nerfacto-big",
    description = "Larger version of nerfacto with higher quality."
)]
#[derive(Debug, Clone)]
pub struct NerfactoBigModel {
    pub num_nerf_samples_per_ray: i32,
    pub num_proposal_samples_per_ray: [i32; 2],
    pub hidden_dim: i32,
    pub hidden_dim_color: i32,
    pub appearance_embed_dim: i32,
    pub max_res: i32,
    pub log2_hashmap_size: i32,
    pub proposal_weights_anneal_max_num_iters: i32,
    pub use_appearance_embedding: bool,
    pub predict_normals: bool,
}

impl Default for NerfactoBigModel {
    fn default() -> Self {
        Self {
            num_nerf_samples_per_ray: 128,
            num_proposal_samples_per_ray: [512, 256],
            hidden_dim: 128,
            hidden_dim_color: 128,
            appearance_embed_dim: 128,
            max_res: 4096,
            log2_hashmap_size: 21,
            proposal_weights_anneal_max_num_iters: 5000,
            use_appearance_embedding: true,
            predict_normals: false,
        }
    }
}

#[Method(id = "depth-nerfacto", description = "Nerfacto with depth supervision.")]
#[derive(Debug, Clone)]
pub struct DepthNerfactoModel {
    pub depth_loss_mult: f64,
    /// Depth values are distances along the ray rather than z-depth.
    pub is_euclidean_depth: bool,
    pub depth_sigma: f64,
    pub should_decay_sigma: bool,
    pub starting_depth_sigma: f64,
    pub sigma_decay_rate: f64,
    #[choices("DS_NERF", "URF", "SPARSENERF_RANKING")]
    pub depth_loss_type: String,
    pub near_plane: f64,
    pub far_plane: f64,
}

impl Default for DepthNerfactoModel {
    fn default() -> Self {
        Self {
            depth_loss_mult: 1e-3,
            is_euclidean_depth: false,
            depth_sigma: 0.01,
            should_decay_sigma: false,
            starting_depth_sigma: 0.2,
            sigma_decay_rate: 0.99985,
            depth_loss_type: "DS_NERF".into(),
            near_plane: 0.05,
            far_plane: 1000.0,
        }
    }
}

#[Method(id = "splatfacto", description = "Gaussian Splatting model")]
#[derive(Debug, Clone)]
pub struct SplatfactoModel {
    pub warmup_length: i32,
    pub refine_every: i32,
    pub resolution_schedule: i32,
    #[choices("random", "black", "white")]
    pub background_color: String,
    pub num_downscales: i32,
    pub cull_alpha_thresh: f64,
    pub cull_scale_thresh: f64,
    pub continue_cull_post_densification: bool,
    pub reset_alpha_every: i32,
    pub densify_grad_thresh: f64,
    pub densify_size_thresh: f64,
    pub n_split_samples: i32,
    pub sh_degree_interval: i32,
    pub cull_screen_size: f64,
    pub split_screen_size: f64,
    pub stop_screen_size_at: i32,
    /// Initialise from random points instead of the sfm point cloud.
    pub random_init: bool,
    pub num_random: i32,
    pub random_scale: f64,
    pub ssim_lambda: f64,
    pub stop_split_at: i32,
    pub sh_degree: i32,
    pub use_scale_regularization: bool,
    pub max_gauss_ratio: f64,
    pub output_depth_during_training: bool,
    #[choices("classic", "antialiased")]
    pub rasterize_mode: String,
}

impl Default for SplatfactoModel {
    fn default() -> Self {
        Self {
            warmup_length: 500,
            refine_every: 100,
            resolution_schedule: 3000,
            background_color: "random".into(),
            num_downscales: 2,
            cull_alpha_thresh: 0.1,
            cull_scale_thresh: 0.5,
            continue_cull_post_densification: true,
            reset_alpha_every: 30,
            densify_grad_thresh: 0.0008,
            densify_size_thresh: 0.01,
            n_split_samples: 2,
            sh_degree_interval: 1000,
            cull_screen_size: 0.15,
            split_screen_size: 0.05,
            stop_screen_size_at: 4000,
            random_init: false,
            num_random: 50000,
            random_scale: 10.0,
            ssim_lambda: 0.2,
            stop_split_at: 15000,
            sh_degree: 3,
            use_scale_regularization: false,
            max_gauss_ratio: 10.0,
            output_depth_during_training: false,
            rasterize_mode: "classic".into(),
        }
    }
}

#[Method(
    id = "instant-ngp",
    description = "Implementation of Instant-NGP. Recommended real-time model for unbounded scenes."
)]
#[derive(Debug, Clone)]
pub struct InstantNgpModel {
    pub enable_collider: bool,
    pub grid_resolution: i32,
    pub grid_levels: i32,
    pub max_res: i32,
    pub log2_hashmap_size: i32,
    /// Opacity threshold for skipping samples.
    pub alpha_thre: f64,
    pub cone_angle: f64,
    pub render_step_size: Option<f64>,
    pub near_plane: f64,
    pub far_plane: f64,
    pub use_gradient_scaling: bool,
    pub use_appearance_embedding: bool,
    #[choices("random", "black", "white")]
    pub background_color: String,
    pub disable_scene_contraction: bool,
}

impl Default for InstantNgpModel {
    fn default() -> Self {
        Self {
            enable_collider: false,
            grid_resolution: 128,
            grid_levels: 4,
            max_res: 2048,
            log2_hashmap_size: 19,
            alpha_thre: 0.01,
            cone_angle: 0.004,
            render_step_size: None,
            near_plane: 0.05,
            far_plane: 1000.0,
            use_gradient_scaling: true,
            use_appearance_embedding: false,
            background_color: "random".into(),
            disable_scene_contraction: false,
        }
    }
}

#[Method(id = "mipnerf", description = "High quality model for bounded scenes. (slow)")]
#[derive(Debug, Clone)]
pub struct MipNerfModel {
    pub num_coarse_samples: i32,
    pub num_importance_samples: i32,
    pub use_integrated_encoding: bool,
    pub enable_temporal_distortion: bool,
}

impl Default for MipNerfModel {
    fn default() -> Self {
        Self {
            num_coarse_samples: 128,
            num_importance_samples: 128,
            use_integrated_encoding: true,
            enable_temporal_distortion: false,
        }
    }
}

#[Method(id = "vanilla-nerf", description = "Original NeRF model. (slow)")]
#[derive(Debug, Clone)]
pub struct VanillaNerfModel {
    pub num_coarse_samples: i32,
    pub num_importance_samples: i32,
    pub enable_temporal_distortion: bool,
}

impl Default for VanillaNerfModel {
    fn default() -> Self {
        Self {
            num_coarse_samples: 64,
            num_importance_samples: 128,
            enable_temporal_distortion: false,
        }
    }
}

#[Method(id = "tensorf", description = "tensorf")]
#[derive(Debug, Clone)]
pub struct TensoRFModel {
    pub init_resolution: i32,
    pub final_resolution: i32,
    /// Iterations at which the grid is upsampled.
    pub upsampling_iters: [i32; 5],
    pub num_den_components: i32,
    pub num_color_components: i32,
    pub appearance_dim: i32,
    #[choices("triplane", "vm", "cp")]
    pub tensorf_encoding: String,
    #[choices("none", "l1", "tv")]
    pub regularization: String,
}

impl Default for TensoRFModel {
    fn default() -> Self {
        Self {
            init_resolution: 128,
            final_resolution: 300,
            upsampling_iters: [2000, 3000, 4000, 5500, 7000],
            num_den_components: 16,
            num_color_components: 48,
            appearance_dim: 27,
            tensorf_encoding: "vm".into(),
            regularization: "l1".into(),
        }
    }
}

pub const SEMANTIC_NERFW_DESCRIPTION: &str =
    "Predicts semantic segmentations and filters out transient objects.";
