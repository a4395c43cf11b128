use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use toml::Value;
use toml::value::Table;

use crate::error::{Error, Result};

const EXTENDS_KEY: &str = "extends";
const IMPORTS_KEY: &str = "imports";

/// A panel config file after `extends` and `imports` are resolved.
#[derive(Debug, Clone)]
pub struct ConfigDoc {
    pub path: PathBuf,
    pub value: Value,
}

impl ConfigDoc {
    /// Looks up a dotted key; an empty key is the whole document.
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        let key = key.trim();
        if key.is_empty() {
            return Some(&self.value);
        }
        key.split('.')
            .try_fold(&self.value, |node, part| node.as_table()?.get(part))
    }

    pub fn deserialize_path<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(node) = self.lookup(key) else {
            return Ok(None);
        };
        let where_ = if key.is_empty() { "<root>" } else { key };
        node.clone().try_into().map(Some).map_err(|e| {
            Error::config(format!(
                "{}: invalid value at '{where_}': {e}",
                self.path.display()
            ))
        })
    }
}

/// Deep-merges `overlay` into `base`; tables merge key by key, anything else replaces.
pub fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Table(into), Value::Table(from)) => {
            for (key, incoming) in from {
                if let Some(slot) = into.get_mut(&key) {
                    merge(slot, incoming);
                } else {
                    into.insert(key, incoming);
                }
            }
        }
        (slot, other) => *slot = other,
    }
}

/// Follows `extends` and `imports` references, tracking the files currently
/// being expanded so a file that reaches itself is rejected.
struct Resolver {
    chain: Vec<PathBuf>,
}

impl Resolver {
    fn resolve(&mut self, file: &Path) -> Result<Value> {
        let key = file.canonicalize().unwrap_or_else(|_| file.to_path_buf());
        if self.chain.contains(&key) {
            let trail: Vec<String> = self
                .chain
                .iter()
                .chain(std::iter::once(&key))
                .map(|p| p.display().to_string())
                .collect();
            return Err(Error::config(format!(
                "config include cycle: {}",
                trail.join(" -> ")
            )));
        }
        self.chain.push(key);
        let out = self.expand_file(file);
        self.chain.pop();
        out
    }

    fn expand_file(&mut self, file: &Path) -> Result<Value> {
        let text = fs::read_to_string(file)
            .map_err(|e| Error::config(format!("cannot read {}: {e}", file.display())))?;
        let mut own: Value = text
            .parse::<Table>()
            .map(Value::Table)
            .map_err(|e| Error::config(format!("{} is not valid TOML: {e}", file.display())))?;

        let parent = match own.as_table_mut().and_then(|t| t.remove(EXTENDS_KEY)) {
            Some(Value::String(rel)) => Some(self.resolve(&sibling(file, &rel))?),
            Some(_) => {
                return Err(Error::config(format!(
                    "{}: '{EXTENDS_KEY}' must be a string",
                    file.display()
                )));
            }
            None => None,
        };

        self.expand_imports(file, &mut own)?;

        let mut out = parent.unwrap_or_else(|| Value::Table(Table::new()));
        merge(&mut out, own);
        Ok(out)
    }

    /// Replaces each table's `imports` list with the merged content of the
    /// listed files; keys written next to the list take precedence.
    fn expand_imports(&mut self, file: &Path, node: &mut Value) -> Result<()> {
        let Value::Table(table) = node else {
            return Ok(());
        };

        if let Some(list) = table.remove(IMPORTS_KEY) {
            let mut combined = Value::Table(Table::new());
            for rel in import_list(file, list)? {
                let imported = self.resolve(&sibling(file, &rel))?;
                merge(&mut combined, imported);
            }
            merge(&mut combined, Value::Table(std::mem::take(table)));
            if let Value::Table(done) = combined {
                *table = done;
            }
        }

        table
            .iter_mut()
            .try_for_each(|(_, child)| self.expand_imports(file, child))
    }
}

fn import_list(file: &Path, list: Value) -> Result<Vec<String>> {
    let Value::Array(items) = list else {
        return Err(Error::config(format!(
            "{}: '{IMPORTS_KEY}' must be an array of paths",
            file.display()
        )));
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(s) if s.trim().is_empty() => {}
            Value::String(s) => out.push(s.trim().to_string()),
            other => {
                return Err(Error::config(format!(
                    "{}: '{IMPORTS_KEY}' entry {other} is not a string",
                    file.display()
                )));
            }
        }
    }
    Ok(out)
}

fn sibling(file: &Path, rel: &str) -> PathBuf {
    let rel = Path::new(rel);
    if rel.is_absolute() {
        return rel.to_path_buf();
    }
    match file.parent() {
        Some(dir) => dir.join(rel),
        None => rel.to_path_buf(),
    }
}

pub fn load(path: &Path) -> Result<ConfigDoc> {
    let value = Resolver { chain: Vec::new() }.resolve(path)?;
    Ok(ConfigDoc {
        path: path.to_path_buf(),
        value,
    })
}
