//! Built-in method catalogue and the name-keyed registry the tabs read it through.

use crate::error::{Error, Result};
use crate::schema::{self, ConfigSchema, Schema};

pub mod dataparsers;
pub mod process;
pub mod train;

/// Visualizers the trainer accepts, in display order.
pub const VISUALIZERS: &[&str] = &[
    "viewer",
    "wandb",
    "tensorboard",
    "comet",
    "viewer+wandb",
    "viewer+tensorboard",
    "viewer+comet",
    "viewer_legacy",
];

/// UI-only data parser choice meaning "let the method pick".
pub const DEFAULT_DATAPARSER: &str = "default";

#[derive(Debug, Clone)]
pub struct MethodEntry {
    pub name: String,
    pub subcommand: String,
    pub description: String,
    /// `None` for methods listed without editable options.
    pub schema: Option<Schema>,
}

impl MethodEntry {
    pub fn of<C: ConfigSchema>() -> Self {
        Self {
            name: C::ID.to_string(),
            subcommand: C::SUBCOMMAND.to_string(),
            description: C::DESCRIPTION.to_string(),
            schema: Some(C::schema()),
        }
    }

    pub fn description_only(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            subcommand: name.to_string(),
            description: description.to_string(),
            schema: None,
        }
    }
}

/// Method name to entry, in registration order.
#[derive(Debug, Clone, Default)]
pub struct MethodRegistry {
    entries: Vec<MethodEntry>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entry: MethodEntry) -> Result<()> {
        if self.get(&entry.name).is_some() {
            return Err(Error::schema(format!(
                "method '{}' is registered twice",
                entry.name
            )));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn add<C: ConfigSchema>(&mut self) -> Result<()> {
        self.register(MethodEntry::of::<C>())
    }

    /// Registers a method described at runtime by a TOML field table.
    pub fn register_external(
        &mut self,
        name: &str,
        description: &str,
        fields: Option<&toml::Value>,
    ) -> Result<()> {
        let schema = fields.map(|v| schema::extract_toml(name, v)).transpose()?;
        self.register(MethodEntry {
            name: name.to_string(),
            subcommand: name.to_string(),
            description: description.to_string(),
            schema,
        })
    }

    pub fn get(&self, name: &str) -> Option<&MethodEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn subcommand(&self, name: &str) -> Option<&str> {
        self.get(name).map(|e| e.subcommand.as_str())
    }

    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.get(name).and_then(|e| e.schema.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    pub fn entries(&self) -> &[MethodEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn builtin_processors() -> Result<MethodRegistry> {
    let mut reg = MethodRegistry::new();
    reg.add::<process::ImagesToNerfstudioDataset>()?;
    reg.add::<process::VideoToNerfstudioDataset>()?;
    reg.add::<process::ProcessPolycam>()?;
    reg.add::<process::ProcessRecord3D>()?;
    reg.add::<process::ProcessODM>()?;
    Ok(reg)
}

pub fn builtin_trainers() -> Result<MethodRegistry> {
    let mut reg = MethodRegistry::new();
    reg.add::<train::NerfactoModel>()?;
    reg.add::<train::NerfactoBigModel>()?;
    reg.add::<train::SplatfactoModel>()?;
    reg.add::<train::InstantNgpModel>()?;
    reg.add::<train::MipNerfModel>()?;
    reg.add::<train::VanillaNerfModel>()?;
    reg.add::<train::TensoRFModel>()?;
    reg.add::<train::DepthNerfactoModel>()?;
    reg.register(MethodEntry::description_only(
        "semantic-nerfw",
        train::SEMANTIC_NERFW_DESCRIPTION,
    ))?;
    Ok(reg)
}

pub fn builtin_dataparsers() -> Result<MethodRegistry> {
    let mut reg = MethodRegistry::new();
    reg.add::<dataparsers::NerfstudioDataParser>()?;
    reg.add::<dataparsers::BlenderDataParser>()?;
    reg.add::<dataparsers::InstantNgpDataParser>()?;
    reg.add::<dataparsers::ColmapDataParser>()?;
    reg.add::<dataparsers::DNeRFDataParser>()?;
    reg.add::<dataparsers::PhototourismDataParser>()?;
    Ok(reg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldKind, FieldValue, ScalarKind};

    #[test]
    fn processors_map_to_subcommands_in_order() {
        let reg = builtin_processors().unwrap();
        let pairs: Vec<_> = reg
            .entries()
            .iter()
            .map(|e| (e.name.as_str(), e.subcommand.as_str()))
            .collect();
        assert_eq!(
            pairs,
            [
                ("ImagesToNerfstudioDataset", "images"),
                ("VideoToNerfstudioDataset", "video"),
                ("ProcessPolycam", "polycam"),
                ("ProcessRecord3D", "record3d"),
                ("ProcessODM", "odm"),
            ]
        );
    }

    #[test]
    fn generated_schema_classifies_declared_types() {
        let reg = builtin_processors().unwrap();
        let schema = reg.schema("ImagesToNerfstudioDataset").unwrap();

        let camera = schema.get("camera_type").unwrap();
        assert_eq!(camera.kind, FieldKind::Enum);
        assert_eq!(
            camera.default_value,
            Some(FieldValue::Str("perspective".into()))
        );
        assert_eq!(camera.allowed_values.as_ref().unwrap().len(), 5);

        let crop = schema.get("crop_factor").unwrap();
        assert_eq!(
            crop.kind,
            FieldKind::Sequence {
                elem: ScalarKind::Float,
                arity: Some(4)
            }
        );

        assert_eq!(schema.get("gpu").unwrap().kind, FieldKind::Bool);
        assert_eq!(schema.get("num_downscales").unwrap().kind, FieldKind::Int);
        assert_eq!(
            schema.get("colmap_model_path").unwrap().default_value,
            Some(FieldValue::Str("colmap/sparse/0".into()))
        );
        assert_eq!(schema.get("eval_data").unwrap().default_value, None);
        assert!(!schema.contains("verbose"));
    }

    #[test]
    fn skipped_fields_are_not_exposed() {
        let reg = builtin_trainers().unwrap();
        let schema = reg.schema("nerfacto").unwrap();
        assert!(!schema.contains("loss_coefficients"));
        assert!(schema.contains("near_plane"));
    }

    #[test]
    fn description_only_methods_have_no_schema() {
        let reg = builtin_trainers().unwrap();
        let entry = reg.get("semantic-nerfw").unwrap();
        assert!(entry.schema.is_none());
        assert!(!entry.description.is_empty());
    }

    #[test]
    fn doc_comment_is_the_default_description() {
        let reg = builtin_processors().unwrap();
        assert_eq!(
            reg.get("ProcessODM").unwrap().description,
            "Process OpenDroneMap data into a nerfstudio dataset."
        );
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut reg = builtin_processors().unwrap();
        let err = reg.add::<process::ProcessODM>().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Schema);
    }

    #[test]
    fn external_methods_are_extracted_at_runtime() {
        let mut reg = builtin_trainers().unwrap();
        let fields: toml::Value = toml::from_str("hidden_dim = 32\nuse_mlp = false").unwrap();
        reg.register_external("my-method", "custom", Some(&fields))
            .unwrap();
        let schema = reg.schema("my-method").unwrap();
        assert_eq!(schema.len(), 2);
        assert_eq!(reg.subcommand("my-method"), Some("my-method"));

        let err = reg
            .register_external("broken", "", Some(&toml::Value::Boolean(true)))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Schema);
    }
}
