use crate::args::{CollectedArgs, join_shell};
use crate::error::{Error, Result};
use crate::methods::{DEFAULT_DATAPARSER, MethodRegistry, VISUALIZERS};

/// A fully composed external command, kept as discrete tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub argv: Vec<String>,
}

impl Invocation {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }

    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("")
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or(&[])
    }

    /// Quoted single-string form, for display and terminal launches only.
    pub fn to_shell_string(&self) -> String {
        join_shell(&self.argv)
    }
}

fn required(value: &str, msg: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(msg));
    }
    Ok(())
}

/// `<binary> <subcommand> --data <data> --output_dir <output> [args...]`
pub fn synthesize_process(
    binary: &str,
    registry: &MethodRegistry,
    method: &str,
    data_path: &str,
    output_dir: &str,
    args: &CollectedArgs,
) -> Result<Invocation> {
    required(method, "Please select a data processor")?;
    required(data_path, "Please select a data path")?;
    required(output_dir, "Please select a output directory")?;
    let subcommand = registry
        .subcommand(method)
        .ok_or_else(|| Error::schema("Invalid method"))?;

    let mut argv = vec![
        binary.to_string(),
        subcommand.to_string(),
        "--data".to_string(),
        data_path.trim().to_string(),
        "--output_dir".to_string(),
        output_dir.trim().to_string(),
    ];
    argv.extend(args.argv.iter().cloned());
    Ok(Invocation::new(argv))
}

#[derive(Debug, Clone)]
pub struct TrainRequest<'a> {
    pub method: &'a str,
    pub data_path: &'a str,
    pub output_dir: Option<&'a str>,
    pub dataparser: &'a str,
    pub visualizer: &'a str,
    pub max_num_iterations: u32,
    pub steps_per_save: u32,
    pub websocket_port: Option<u16>,
}

/// Composes a training command. Data parser arguments are only appended for a non-default
/// data parser, after the data parser's own subcommand token.
pub fn synthesize_train(
    binary: &str,
    trainers: &MethodRegistry,
    dataparsers: &MethodRegistry,
    req: &TrainRequest<'_>,
    model_args: &CollectedArgs,
    dataparser_args: &CollectedArgs,
) -> Result<Invocation> {
    required(req.dataparser, "Please select a data parser")?;
    required(req.method, "Please select a method")?;
    required(req.data_path, "Please select a data path")?;
    required(req.visualizer, "Please select a visualizer")?;

    let subcommand = trainers
        .subcommand(req.method)
        .ok_or_else(|| Error::schema("Invalid method"))?;
    if !VISUALIZERS.contains(&req.visualizer) {
        return Err(Error::schema(format!("Invalid visualizer '{}'", req.visualizer)));
    }
    let dataparser = match req.dataparser {
        DEFAULT_DATAPARSER => None,
        name => Some(
            dataparsers
                .subcommand(name)
                .ok_or_else(|| Error::schema(format!("Invalid data parser '{name}'")))?,
        ),
    };

    let mut argv = vec![
        binary.to_string(),
        subcommand.to_string(),
        "--vis".to_string(),
        req.visualizer.to_string(),
        "--max-num-iterations".to_string(),
        req.max_num_iterations.to_string(),
        "--steps-per-save".to_string(),
        req.steps_per_save.to_string(),
        "--data".to_string(),
        req.data_path.trim().to_string(),
    ];
    if let Some(out) = req.output_dir.map(str::trim).filter(|s| !s.is_empty()) {
        argv.push("--output-dir".to_string());
        argv.push(out.to_string());
    }
    if let Some(port) = req.websocket_port {
        argv.push("--viewer.websocket-port".to_string());
        argv.push(port.to_string());
    }
    argv.extend(model_args.argv.iter().cloned());
    if let Some(dp) = dataparser {
        argv.push(dp.to_string());
        argv.extend(dataparser_args.argv.iter().cloned());
    }
    Ok(Invocation::new(argv))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::methods::{builtin_dataparsers, builtin_processors, builtin_trainers};

    fn request<'a>() -> TrainRequest<'a> {
        TrainRequest {
            method: "nerfacto",
            data_path: "/data/poster",
            output_dir: None,
            dataparser: "default",
            visualizer: "viewer",
            max_num_iterations: 30000,
            steps_per_save: 2000,
            websocket_port: None,
        }
    }

    #[test]
    fn images_invocation_has_exact_token_order() {
        let reg = builtin_processors().unwrap();
        let inv = synthesize_process(
            "ns-process-data",
            &reg,
            "ImagesToNerfstudioDataset",
            "/d",
            "/o",
            &CollectedArgs::default(),
        )
        .unwrap();
        assert_eq!(
            inv.argv,
            ["ns-process-data", "images", "--data", "/d", "--output_dir", "/o"]
        );
        assert_eq!(inv.program(), "ns-process-data");
    }

    #[test]
    fn process_validation_is_checked_in_order() {
        let reg = builtin_processors().unwrap();
        let none = CollectedArgs::default();
        let cases = [
            ("", "", "", "Please select a data processor"),
            ("ProcessODM", "", "", "Please select a data path"),
            ("ProcessODM", "/d", " ", "Please select a output directory"),
        ];
        for (method, data, out, want) in cases {
            let err = synthesize_process("bin", &reg, method, data, out, &none).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
            assert_eq!(err.to_string(), want);
        }
    }

    #[test]
    fn unknown_method_is_a_schema_error() {
        let reg = builtin_processors().unwrap();
        let err = synthesize_process("bin", &reg, "Nope", "/d", "/o", &CollectedArgs::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert_eq!(err.to_string(), "Invalid method");
    }

    #[test]
    fn train_invocation_layout() {
        let trainers = builtin_trainers().unwrap();
        let parsers = builtin_dataparsers().unwrap();
        let model = CollectedArgs {
            argv: vec!["--pipeline.model.no-use-x".into()],
            ..Default::default()
        };
        let dp = CollectedArgs {
            argv: vec!["--scale_factor".into(), "2.0".into()],
            ..Default::default()
        };
        let mut req = request();
        req.dataparser = "colmap";
        req.output_dir = Some("/out");
        req.websocket_port = Some(7007);
        let inv = synthesize_train("ns-train", &trainers, &parsers, &req, &model, &dp).unwrap();
        assert_eq!(
            inv.argv,
            [
                "ns-train",
                "nerfacto",
                "--vis",
                "viewer",
                "--max-num-iterations",
                "30000",
                "--steps-per-save",
                "2000",
                "--data",
                "/data/poster",
                "--output-dir",
                "/out",
                "--viewer.websocket-port",
                "7007",
                "--pipeline.model.no-use-x",
                "colmap",
                "--scale_factor",
                "2.0",
            ]
        );
    }

    #[test]
    fn default_dataparser_appends_nothing() {
        let trainers = builtin_trainers().unwrap();
        let parsers = builtin_dataparsers().unwrap();
        let dp = CollectedArgs {
            argv: vec!["--scale_factor".into(), "2.0".into()],
            ..Default::default()
        };
        let inv = synthesize_train(
            "ns-train",
            &trainers,
            &parsers,
            &request(),
            &CollectedArgs::default(),
            &dp,
        )
        .unwrap();
        assert_eq!(inv.argv.last().map(String::as_str), Some("/data/poster"));
    }

    #[test]
    fn train_validation_is_checked_in_order() {
        let trainers = builtin_trainers().unwrap();
        let parsers = builtin_dataparsers().unwrap();
        let none = CollectedArgs::default();

        let mut req = request();
        req.dataparser = "";
        req.method = "";
        let err = synthesize_train("t", &trainers, &parsers, &req, &none, &none).unwrap_err();
        assert_eq!(err.to_string(), "Please select a data parser");

        let mut req = request();
        req.method = "";
        req.data_path = "";
        let err = synthesize_train("t", &trainers, &parsers, &req, &none, &none).unwrap_err();
        assert_eq!(err.to_string(), "Please select a method");

        let mut req = request();
        req.data_path = "";
        req.visualizer = "";
        let err = synthesize_train("t", &trainers, &parsers, &req, &none, &none).unwrap_err();
        assert_eq!(err.to_string(), "Please select a data path");

        let mut req = request();
        req.visualizer = "";
        let err = synthesize_train("t", &trainers, &parsers, &req, &none, &none).unwrap_err();
        assert_eq!(err.to_string(), "Please select a visualizer");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn shell_string_matches_argv() {
        let inv = Invocation::new(vec!["a".into(), "b c".into()]);
        assert_eq!(inv.to_shell_string(), "a 'b c'");
        assert_eq!(inv.args(), ["b c".to_string()]);
    }
}
