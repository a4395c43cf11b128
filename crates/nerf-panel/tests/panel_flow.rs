use std::sync::Arc;

use nerf_panel::args::{self, FlagStyle};
use nerf_panel::config::PanelConfig;
use nerf_panel::form::FormLayout;
use nerf_panel::methods::{self, DEFAULT_DATAPARSER};
use nerf_panel::schema::FieldValue;
use nerf_panel::supervisor::ProcessLauncher;
use nerf_panel::tabs::{ProcessRequest, ProcessorTab, TrainForm, TrainerTab};

fn write_config(body: &str) -> (tempfile::TempDir, PanelConfig) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nerf-panel.toml");
    std::fs::write(&path, body).unwrap();
    let cfg = PanelConfig::load(Some(&path)).unwrap();
    (dir, cfg)
}

#[test]
fn images_command_from_defaults() {
    let cfg = PanelConfig::default();
    let mut tab = ProcessorTab::new(&cfg, Arc::new(ProcessLauncher::new())).unwrap();
    let req = ProcessRequest {
        method: "ImagesToNerfstudioDataset".into(),
        data_path: "/data/my images".into(),
        output_dir: "/data/out".into(),
        values: tab.layout().defaults_json(),
    };
    let line = tab.show_command(&req).unwrap();
    assert!(
        line.starts_with("ns-process-data images --data '/data/my images' --output_dir /data/out "),
        "{line}"
    );
    assert!(line.contains("--camera_type perspective"), "{line}");
    assert!(line.contains("--crop_factor 0.0 0.0 0.0 0.0"), "{line}");
    // Optional paths without a default stay out of the command.
    assert!(!line.contains("--eval_data"), "{line}");
}

#[test]
fn blank_sequence_element_drops_the_whole_field() {
    let reg = methods::builtin_processors().unwrap();
    let layout = FormLayout::build(&reg);
    let (start, end) = layout.range("ImagesToNerfstudioDataset").unwrap();
    let mut values = layout.defaults();
    let crop = layout.widgets()[start..end]
        .iter()
        .position(|w| w.name == "crop_factor")
        .unwrap()
        + start;
    values[crop + 1] = FieldValue::Unset;

    let collected = args::collect(
        &layout,
        "ImagesToNerfstudioDataset",
        &values,
        FlagStyle::PLAIN,
        &[],
    );
    assert!(!collected.values.contains_key("crop_factor"));
    assert!(!collected.argv.iter().any(|a| a == "--crop_factor"));
    assert!(collected.values.contains_key("sfm_tool"));
}

#[test]
fn config_file_drives_binaries_and_external_methods() {
    let (_dir, cfg) = write_config(
        r#"
websocket_port = 0
use_external_methods = true

[binaries]
train = "/opt/ns/bin/ns-train"

[[external_methods]]
name = "my-nerf"
description = "A locally installed method."

[external_methods.fields]
hidden_dim = 64
far_plane = 1000.0
background = { choices = ["black", "white"], default = "white" }
"#,
    );
    assert_eq!(cfg.websocket_port, 0);

    let mut tab = TrainerTab::new(&cfg, Arc::new(ProcessLauncher::new())).unwrap();
    assert_eq!(tab.description("my-nerf").unwrap(), "A locally installed method.");
    let vis = tab.select_method("my-nerf");
    assert_eq!(vis.iter().filter(|v| **v).count(), 1);
    assert!(*vis.last().unwrap());

    let form = TrainForm {
        method: "my-nerf".into(),
        data_path: "/data/p".into(),
        visualizer: "tensorboard".into(),
        dataparser: DEFAULT_DATAPARSER.into(),
        model_values: tab.model_layout().defaults_json(),
        ..Default::default()
    };
    let line = tab.show_command(&form).unwrap();
    assert!(
        line.starts_with("/opt/ns/bin/ns-train my-nerf --vis tensorboard"),
        "{line}"
    );
    assert!(line.contains("--pipeline.model.hidden_dim 64"), "{line}");
    assert!(line.contains("--pipeline.model.far_plane 1000.0"), "{line}");
    assert!(line.contains("--pipeline.model.background white"), "{line}");
}

#[test]
fn dataparser_args_follow_the_dataparser_token() {
    let cfg = PanelConfig {
        websocket_port: 0,
        ..Default::default()
    };
    let mut tab = TrainerTab::new(&cfg, Arc::new(ProcessLauncher::new())).unwrap();
    let form = TrainForm {
        method: "nerfacto".into(),
        data_path: "/data/p".into(),
        dataparser: "blender-data".into(),
        visualizer: "wandb".into(),
        model_values: tab.model_layout().defaults_json(),
        dataparser_values: tab.dataparser_layout().defaults_json(),
        ..Default::default()
    };
    let line = tab.show_command(&form).unwrap();
    let (before, after) = line.split_once(" blender-data").unwrap();
    assert!(before.contains("--pipeline.model."));
    assert!(!after.contains("--pipeline.model."));
    assert_eq!(tab.dataparser_args().argv.is_empty(), after.trim().is_empty());
}
