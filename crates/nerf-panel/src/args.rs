//! Turns the widget values of the selected method into command-line arguments.
//!
//! Collection is lenient: unknown names, blank values and enum values outside the allowed set
//! are dropped one by one. Nothing here fails a launch.

use std::collections::BTreeMap;

use crate::form::FormLayout;
use crate::schema::{FieldKind, FieldValue};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectedArgs {
    pub values: BTreeMap<String, FieldValue>,
    pub argv: Vec<String>,
}

impl CollectedArgs {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_command_string(&self) -> String {
        join_shell(&self.argv)
    }
}

/// Flag spelling for one argument family: `--<prefix><name>`, `--<prefix>no-<name>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlagStyle<'a> {
    pub prefix: &'a str,
}

impl<'a> FlagStyle<'a> {
    pub const PLAIN: FlagStyle<'static> = FlagStyle { prefix: "" };

    pub fn prefixed(prefix: &'a str) -> Self {
        Self { prefix }
    }

    fn flag(&self, name: &str) -> String {
        format!("--{}{name}", self.prefix)
    }

    fn negated(&self, name: &str) -> String {
        format!("--{}no-{name}", self.prefix)
    }

    pub fn push(&self, argv: &mut Vec<String>, name: &str, value: &FieldValue) {
        match value {
            FieldValue::Bool(true) => argv.push(self.flag(name)),
            FieldValue::Bool(false) => argv.push(self.negated(name)),
            FieldValue::List(items) => {
                argv.push(self.flag(name));
                argv.extend(items.iter().map(FieldValue::to_arg));
            }
            FieldValue::Unset => {}
            other => {
                argv.push(self.flag(name));
                argv.push(other.to_arg());
            }
        }
    }
}

/// Collects `method`'s arguments from the flat widget value list.
///
/// Only names in the method's schema count, plus synthetic names listed in `forwarded`.
/// Sequence elements are regrouped under their field name in widget order; a sequence with
/// any blank element is dropped whole. Methods without a widget group collect nothing.
pub fn collect(
    layout: &FormLayout,
    method: &str,
    values: &[FieldValue],
    style: FlagStyle<'_>,
    forwarded: &[String],
) -> CollectedArgs {
    let Some((start, end)) = layout.range(method) else {
        return CollectedArgs::default();
    };
    let schema = layout.schema(method);

    let mut order: Vec<String> = Vec::new();
    let mut scalars: BTreeMap<String, FieldValue> = BTreeMap::new();
    let mut sequences: BTreeMap<String, Vec<FieldValue>> = BTreeMap::new();

    for (idx, widget) in layout.widgets()[start..end].iter().enumerate() {
        let name = &widget.name;
        let descriptor = schema.and_then(|s| s.get(name));
        if descriptor.is_none() && !forwarded.iter().any(|f| f == name) {
            continue;
        }
        let value = values.get(start + idx).cloned().unwrap_or(FieldValue::Unset);

        if widget.element.is_some() {
            let elems = sequences.entry(name.clone()).or_default();
            if elems.is_empty() {
                order.push(name.clone());
            }
            elems.push(value);
            continue;
        }

        if value.is_blank() {
            continue;
        }
        if let Some(d) = descriptor {
            if d.kind == FieldKind::Enum && !d.allows(&value) {
                tracing::debug!(method, field = %name, value = %value, "dropping value outside choices");
                continue;
            }
        }
        if !scalars.contains_key(name) {
            order.push(name.clone());
        }
        scalars.insert(name.clone(), value);
    }

    let mut out = CollectedArgs::default();
    for name in order {
        let value = if let Some(v) = scalars.remove(&name) {
            v
        } else if let Some(elems) = sequences.remove(&name) {
            if elems.iter().any(FieldValue::is_blank) {
                continue;
            }
            FieldValue::List(elems)
        } else {
            continue;
        };
        style.push(&mut out.argv, &name, &value);
        out.values.insert(name, value);
    }
    out
}

fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || "_-./=:,+@%".contains(c)
}

pub fn shell_quote(s: &str) -> String {
    if !s.is_empty() && s.chars().all(is_shell_safe) {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}

pub fn join_shell(argv: &[String]) -> String {
    argv.iter()
        .map(|a| shell_quote(a))
        .collect::<Vec<_>>()
        .join(" ")
}
