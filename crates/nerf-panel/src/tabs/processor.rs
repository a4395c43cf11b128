use std::sync::Arc;

use serde::Deserialize;
use tracing::Span;

use crate::args::{self, CollectedArgs, FlagStyle};
use crate::command::{self, Invocation};
use crate::config::PanelConfig;
use crate::error::Result;
use crate::form::FormLayout;
use crate::methods::{self, MethodRegistry};
use crate::schema::FieldValue;
use crate::supervisor::{JobLauncher, PollOutcome, Supervisor};

pub const STATUS_STARTED: &str = "Processing started";

/// Everything the data-processor form submits.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProcessRequest {
    pub method: String,
    pub data_path: String,
    pub output_dir: String,
    /// Flat widget values, in layout order.
    pub values: Vec<serde_json::Value>,
}

pub struct ProcessorTab {
    registry: MethodRegistry,
    layout: FormLayout,
    supervisor: Supervisor,
    pending: CollectedArgs,
    binary: String,
    forwarded: Vec<String>,
    span: Span,
}

impl ProcessorTab {
    pub fn new(cfg: &PanelConfig, launcher: Arc<dyn JobLauncher>) -> Result<Self> {
        let registry = methods::builtin_processors()?;
        let layout = FormLayout::build(&registry);
        Ok(Self {
            registry,
            layout,
            supervisor: Supervisor::new(launcher, cfg.relaunch),
            pending: CollectedArgs::default(),
            binary: cfg.binaries.process.clone(),
            forwarded: cfg.forward_synthetic.clone(),
            span: tracing::info_span!("tab", tab = "process"),
        })
    }

    pub fn layout(&self) -> &FormLayout {
        &self.layout
    }

    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    pub fn pending(&self) -> &CollectedArgs {
        &self.pending
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn select_method(&self, method: &str) -> Vec<bool> {
        self.layout.visibility(method)
    }

    /// Replaces the pending arguments with a fresh collection.
    pub fn collect(&mut self, method: &str, values: &[FieldValue]) -> &CollectedArgs {
        self.pending = args::collect(
            &self.layout,
            method,
            values,
            FlagStyle::PLAIN,
            &self.forwarded,
        );
        &self.pending
    }

    fn synthesize(&mut self, req: &ProcessRequest) -> Result<Invocation> {
        let values = self.layout.parse_values(&req.values);
        self.collect(&req.method, &values);
        command::synthesize_process(
            &self.binary,
            &self.registry,
            &req.method,
            &req.data_path,
            &req.output_dir,
            &self.pending,
        )
    }

    pub fn show_command(&mut self, req: &ProcessRequest) -> Result<String> {
        let _g = self.span.clone().entered();
        let inv = self.synthesize(req).inspect_err(|e| {
            tracing::warn!(method = %req.method, error = %e, "command rejected");
        })?;
        Ok(inv.to_shell_string())
    }

    pub fn run(&mut self, req: &ProcessRequest) -> Result<String> {
        let _g = self.span.clone().entered();
        let inv = self.synthesize(req).inspect_err(|e| {
            tracing::warn!(method = %req.method, error = %e, "run rejected");
        })?;
        super::submit_path(&req.output_dir)?;
        self.supervisor.launch(&inv)?;
        Ok(STATUS_STARTED.to_string())
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
