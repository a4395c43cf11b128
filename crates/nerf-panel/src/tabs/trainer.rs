use std::sync::Arc;

use serde::Deserialize;
use tracing::Span;

use crate::args::{self, CollectedArgs, FlagStyle};
use crate::command::{self, Invocation, TrainRequest};
use crate::config::PanelConfig;
use crate::error::{Error, Result};
use crate::form::FormLayout;
use crate::methods::{self, DEFAULT_DATAPARSER, MethodRegistry};
use crate::schema::FieldValue;
use crate::supervisor::{JobLauncher, PollOutcome, Supervisor};

pub const DEFAULT_MAX_ITERATIONS: u32 = 30000;
pub const MAX_ITERATIONS_LIMIT: u32 = 50000;
pub const DEFAULT_STEPS_PER_SAVE: u32 = 2000;
pub const STEPS_PER_SAVE_LIMIT: u32 = 10000;
pub const SLIDER_STEP: u32 = 100;

pub const MODEL_PREFIX: &str = "pipeline.model.";
pub const STATUS_STARTED: &str = "Training started";
pub const STATUS_STARTED_TERMINAL: &str =
    "Initializing... Please check the terminal for more information.";

fn default_dataparser() -> String {
    DEFAULT_DATAPARSER.to_string()
}

fn default_visualizer() -> String {
    "viewer".to_string()
}

fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}

fn default_steps_per_save() -> u32 {
    DEFAULT_STEPS_PER_SAVE
}

/// Everything the trainer form submits.
#[derive(Debug, Clone, Deserialize)]
pub struct TrainForm {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub data_path: String,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default = "default_dataparser")]
    pub dataparser: String,
    #[serde(default = "default_visualizer")]
    pub visualizer: String,
    #[serde(default = "default_max_iterations")]
    pub max_num_iterations: u32,
    #[serde(default = "default_steps_per_save")]
    pub steps_per_save: u32,
    #[serde(default)]
    pub model_values: Vec<serde_json::Value>,
    #[serde(default)]
    pub dataparser_values: Vec<serde_json::Value>,
}

impl Default for TrainForm {
    fn default() -> Self {
        Self {
            method: String::new(),
            data_path: String::new(),
            output_dir: None,
            dataparser: default_dataparser(),
            visualizer: default_visualizer(),
            max_num_iterations: DEFAULT_MAX_ITERATIONS,
            steps_per_save: DEFAULT_STEPS_PER_SAVE,
            model_values: Vec::new(),
            dataparser_values: Vec::new(),
        }
    }
}

fn uses_viewer(visualizer: &str) -> bool {
    visualizer.starts_with("viewer")
}

pub struct TrainerTab {
    trainers: MethodRegistry,
    dataparsers: MethodRegistry,
    model_layout: FormLayout,
    dataparser_layout: FormLayout,
    supervisor: Supervisor,
    model_args: CollectedArgs,
    dataparser_args: CollectedArgs,
    binary: String,
    forwarded: Vec<String>,
    preferred_port: u16,
    /// Port handed to the last launched job, if it runs the viewer.
    websocket_port: Option<u16>,
    in_terminal: bool,
    span: Span,
}

impl TrainerTab {
    pub fn new(cfg: &PanelConfig, launcher: Arc<dyn JobLauncher>) -> Result<Self> {
        let mut trainers = methods::builtin_trainers()?;
        if cfg.use_external_methods {
            for m in &cfg.external_methods {
                trainers.register_external(&m.name, &m.description, m.fields.as_ref())?;
                tracing::info!(method = %m.name, "registered external method");
            }
        }
        let dataparsers = methods::builtin_dataparsers()?;
        let model_layout = FormLayout::build(&trainers);
        let dataparser_layout = FormLayout::build(&dataparsers);
        Ok(Self {
            trainers,
            dataparsers,
            model_layout,
            dataparser_layout,
            supervisor: Supervisor::new(launcher, cfg.relaunch),
            model_args: CollectedArgs::default(),
            dataparser_args: CollectedArgs::default(),
            binary: cfg.binaries.train.clone(),
            forwarded: cfg.forward_synthetic.clone(),
            preferred_port: cfg.websocket_port,
            websocket_port: None,
            in_terminal: cfg.run_in_new_terminal,
            span: tracing::info_span!("tab", tab = "train"),
        })
    }

    pub fn trainers(&self) -> &MethodRegistry {
        &self.trainers
    }

    pub fn dataparsers(&self) -> &MethodRegistry {
        &self.dataparsers
    }

    pub fn model_layout(&self) -> &FormLayout {
        &self.model_layout
    }

    pub fn dataparser_layout(&self) -> &FormLayout {
        &self.dataparser_layout
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn model_args(&self) -> &CollectedArgs {
        &self.model_args
    }

    pub fn dataparser_args(&self) -> &CollectedArgs {
        &self.dataparser_args
    }

    /// Data parser names as offered in the UI, `default` first.
    pub fn dataparser_choices(&self) -> Vec<String> {
        std::iter::once(DEFAULT_DATAPARSER.to_string())
            .chain(self.dataparsers.names())
            .collect()
    }

    pub fn select_method(&self, method: &str) -> Vec<bool> {
        self.model_layout.visibility(method)
    }

    /// `default` has no group, so every data parser group is hidden.
    pub fn select_dataparser(&self, dataparser: &str) -> Vec<bool> {
        self.dataparser_layout.visibility(dataparser)
    }

    pub fn description(&self, method: &str) -> Result<String> {
        self.trainers
            .get(method)
            .map(|e| e.description.clone())
            .ok_or_else(|| Error::schema("Invalid method"))
    }

    pub fn collect_model(&mut self, method: &str, values: &[FieldValue]) -> &CollectedArgs {
        self.model_args = args::collect(
            &self.model_layout,
            method,
            values,
            FlagStyle::prefixed(MODEL_PREFIX),
            &self.forwarded,
        );
        &self.model_args
    }

    pub fn collect_dataparser(&mut self, dataparser: &str, values: &[FieldValue]) -> &CollectedArgs {
        self.dataparser_args = if dataparser == DEFAULT_DATAPARSER {
            CollectedArgs::default()
        } else {
            args::collect(
                &self.dataparser_layout,
                dataparser,
                values,
                FlagStyle::PLAIN,
                &self.forwarded,
            )
        };
        &self.dataparser_args
    }

    fn check_bounds(form: &TrainForm) -> Result<()> {
        if form.max_num_iterations > MAX_ITERATIONS_LIMIT {
            return Err(Error::validation(format!(
                "Max num iterations must be between 0 and {MAX_ITERATIONS_LIMIT}"
            )));
        }
        if form.steps_per_save > STEPS_PER_SAVE_LIMIT {
            return Err(Error::validation(format!(
                "Steps per save must be between 0 and {STEPS_PER_SAVE_LIMIT}"
            )));
        }
        Ok(())
    }

    fn synthesize(&mut self, form: &TrainForm, websocket_port: Option<u16>) -> Result<Invocation> {
        let model_values = self.model_layout.parse_values(&form.model_values);
        let dataparser_values = self.dataparser_layout.parse_values(&form.dataparser_values);
        self.collect_model(&form.method, &model_values);
        self.collect_dataparser(&form.dataparser, &dataparser_values);

        let req = TrainRequest {
            method: &form.method,
            data_path: &form.data_path,
            output_dir: form.output_dir.as_deref(),
            dataparser: &form.dataparser,
            visualizer: &form.visualizer,
            max_num_iterations: form.max_num_iterations,
            steps_per_save: form.steps_per_save,
            websocket_port,
        };
        let inv = command::synthesize_train(
            &self.binary,
            &self.trainers,
            &self.dataparsers,
            &req,
            &self.model_args,
            &self.dataparser_args,
        )?;
        // Slider bounds come after the required selections.
        Self::check_bounds(form)?;
        Ok(inv)
    }

    /// Preview only: shows the configured port without probing it.
    pub fn show_command(&mut self, form: &TrainForm) -> Result<String> {
        let _g = self.span.clone().entered();
        let port = (uses_viewer(&form.visualizer) && self.preferred_port > 0)
            .then_some(self.preferred_port);
        let inv = self.synthesize(form, port).inspect_err(|e| {
            tracing::warn!(method = %form.method, error = %e, "command rejected");
        })?;
        Ok(inv.to_shell_string())
    }

    pub fn run(&mut self, form: &TrainForm) -> Result<String> {
        let _g = self.span.clone().entered();
        let port = if uses_viewer(&form.visualizer) {
            Some(super::choose_websocket_port(self.preferred_port)?)
        } else {
            None
        };
        let inv = self.synthesize(form, port).inspect_err(|e| {
            tracing::warn!(method = %form.method, error = %e, "run rejected");
        })?;
        self.supervisor.launch(&inv)?;
        self.websocket_port = port;
        if let Some(port) = port {
            tracing::info!(port, "viewer websocket port");
        }
        Ok(if self.in_terminal {
            STATUS_STARTED_TERMINAL
        } else {
            STATUS_STARTED
        }
        .to_string())
    }

    pub fn viewer_url(&self) -> Result<String> {
        self.websocket_port
            .map(|port| format!("http://localhost:{port}"))
            .ok_or_else(|| Error::validation("Please run the training first"))
    }

    pub fn pause(&mut self) -> Result<String> {
        let _g = self.span.clone().entered();
        self.supervisor.toggle_pause()
    }

    pub fn stop(&mut self) -> String {
        let _g = self.span.clone().entered();
        self.supervisor.terminate()
    }

    pub fn tick(&mut self) -> PollOutcome {
        let _g = self.span.clone().entered();
        self.supervisor.poll()
    }

    pub fn shutdown(&mut self) {
        let _g = self.span.clone().entered();
        self.supervisor.shutdown();
    }
}
