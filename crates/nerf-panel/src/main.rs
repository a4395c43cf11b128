use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use nerf_panel::config::{Overrides, PanelConfig};
use nerf_panel::methods::{self, DEFAULT_DATAPARSER, MethodRegistry};
use nerf_panel::supervisor::ProcessLauncher;
use nerf_panel::tabs::{ProcessRequest, ProcessorTab, TrainForm, TrainerTab, trainer};
use nerf_panel::{Error, Result, logging, web};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Panel config TOML (defaults to ./nerf-panel.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Root directory offered by path pickers
    #[arg(long, global = true)]
    root_dir: Option<PathBuf>,
    /// Run jobs inside a new terminal window
    #[arg(long, global = true)]
    run_in_new_terminal: bool,
    /// Address the panel listens on
    #[arg(long, global = true)]
    host: Option<String>,
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Viewer websocket port (0 = pick a free one)
    #[arg(long, global = true)]
    websocket_port: Option<u16>,
    #[arg(long, global = true)]
    disable_trainer_tab: bool,
    #[arg(long, global = true)]
    disable_data_processor_tab: bool,
    /// Add `[[external_methods]]` from the config file to the trainer
    #[arg(long, global = true)]
    use_external_methods: bool,
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    log_level: Option<String>,
}

impl GlobalArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            root_dir: self.root_dir.clone(),
            run_in_new_terminal: self.run_in_new_terminal,
            host: self.host.clone(),
            port: self.port,
            websocket_port: self.websocket_port,
            disable_trainer_tab: self.disable_trainer_tab,
            disable_data_processor_tab: self.disable_data_processor_tab,
            use_external_methods: self.use_external_methods,
            log_dir: self.log_dir.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the browser control panel (the default)
    Serve,
    /// Print the option schema of every method, or of one
    Schema {
        #[arg(long)]
        method: Option<String>,
    },
    /// Print the command a job would run, using default option values
    Command {
        #[command(subcommand)]
        which: DryRun,
    },
}

#[derive(Debug, Subcommand)]
enum DryRun {
    /// Data processing command
    Process {
        #[arg(long)]
        method: String,
        #[arg(long)]
        data: String,
        #[arg(long)]
        output_dir: String,
    },
    /// Training command
    Train {
        #[arg(long)]
        method: String,
        #[arg(long)]
        data: String,
        #[arg(long)]
        output_dir: Option<String>,
        #[arg(long, default_value = DEFAULT_DATAPARSER)]
        dataparser: String,
        #[arg(long, default_value = "viewer")]
        vis: String,
        #[arg(long, default_value_t = trainer::DEFAULT_MAX_ITERATIONS)]
        max_num_iterations: u32,
        #[arg(long, default_value_t = trainer::DEFAULT_STEPS_PER_SAVE)]
        steps_per_save: u32,
    },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut cfg = PanelConfig::load(cli.global.config.as_deref())?;
    cfg.apply(&cli.global.overrides());
    cfg.validate()?;

    match cli.cmd.unwrap_or(Command::Serve) {
        Command::Serve => cmd_serve(cfg),
        Command::Schema { method } => {
            let _log = logging::init(&cfg.log.level, Path::new(""))?;
            cmd_schema(&cfg, method.as_deref())
        }
        Command::Command { which } => {
            let _log = logging::init(&cfg.log.level, Path::new(""))?;
            cmd_dry_run(&cfg, which)
        }
    }
}

fn cmd_serve(cfg: PanelConfig) -> Result<()> {
    let _log = logging::init(&cfg.log.level, &cfg.log.dir)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(web::serve(cfg))
}

fn print_registry(title: &str, reg: &MethodRegistry, only: Option<&str>) {
    for entry in reg.entries() {
        if only.is_some_and(|m| m != entry.name) {
            continue;
        }
        println!("[{title}] {} -> {}", entry.name, entry.subcommand);
        if !entry.description.is_empty() {
            println!("    {}", entry.description);
        }
        let Some(schema) = &entry.schema else {
            println!("    (no options)");
            continue;
        };
        for f in schema.fields() {
            let default = f
                .default_value
                .as_ref()
                .map(|v| v.to_arg())
                .unwrap_or_else(|| "-".into());
            let choices = match &f.allowed_values {
                Some(vals) if !vals.is_empty() => {
                    let opts: Vec<String> = vals.iter().map(|v| v.to_arg()).collect();
                    format!("  {{{}}}", opts.join(", "))
                }
                _ => String::new(),
            };
            println!(
                "    {:<40} {:<14} {:<16}{}",
                f.name,
                f.kind.label(),
                default,
                choices
            );
        }
    }
}

fn cmd_schema(cfg: &PanelConfig, method: Option<&str>) -> Result<()> {
    let processors = methods::builtin_processors()?;
    let launcher = std::sync::Arc::new(ProcessLauncher::new());
    let trainers = TrainerTab::new(cfg, launcher)?;
    let dataparsers = methods::builtin_dataparsers()?;

    if let Some(m) = method {
        let known = processors.get(m).is_some()
            || trainers.trainers().get(m).is_some()
            || dataparsers.get(m).is_some();
        if !known {
            return Err(Error::schema(format!("Invalid method '{m}'")));
        }
    }
    print_registry("process", &processors, method);
    print_registry("train", trainers.trainers(), method);
    print_registry("dataparser", &dataparsers, method);
    Ok(())
}

fn cmd_dry_run(cfg: &PanelConfig, which: DryRun) -> Result<()> {
    let launcher = std::sync::Arc::new(ProcessLauncher::new());
    let line = match which {
        DryRun::Process {
            method,
            data,
            output_dir,
        } => {
            let mut tab = ProcessorTab::new(cfg, launcher)?;
            let req = ProcessRequest {
                method,
                data_path: data,
                output_dir,
                values: tab.layout().defaults_json(),
            };
            tab.show_command(&req)?
        }
        DryRun::Train {
            method,
            data,
            output_dir,
            dataparser,
            vis,
            max_num_iterations,
            steps_per_save,
        } => {
            let mut tab = TrainerTab::new(cfg, launcher)?;
            let form = TrainForm {
                method,
                data_path: data,
                output_dir,
                dataparser,
                visualizer: vis,
                max_num_iterations,
                steps_per_save,
                model_values: tab.model_layout().defaults_json(),
                dataparser_values: tab.dataparser_layout().defaults_json(),
            };
            tab.show_command(&form)?
        }
    };
    println!("{line}");
    Ok(())
}
