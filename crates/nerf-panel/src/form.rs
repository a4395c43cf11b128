//! Widget layout generated from method schemas.
//!
//! Every method with a schema owns one contiguous group in a flat widget list. Groups are laid
//! out once when a tab is built; afterwards only their visibility changes.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::methods::MethodRegistry;
use crate::schema::{FieldDescriptor, FieldKind, FieldValue, ScalarKind, Schema};

/// UI-only checkbox appended to every group.
pub const SYNTHETIC_VERBOSE: &str = "verbose";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Control {
    Checkbox,
    Number { precision: Option<u32>, step: f64 },
    Text,
    Choice { options: Vec<FieldValue> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Widget {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    pub control: Control,
    pub value: FieldValue,
    /// Position inside a sequence field; `None` for scalar fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<usize>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub help: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WidgetGroup {
    pub method: String,
    pub start: usize,
    pub end: usize,
}

impl WidgetGroup {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

fn scalar_control(elem: ScalarKind) -> Control {
    match elem {
        ScalarKind::Bool => Control::Checkbox,
        ScalarKind::Int => Control::Number {
            precision: Some(0),
            step: 1.0,
        },
        ScalarKind::Float => Control::Number {
            precision: None,
            step: 0.01,
        },
        ScalarKind::Str => Control::Text,
    }
}

fn scalar_widget(field: &FieldDescriptor, control: Control) -> Widget {
    Widget {
        name: field.name.clone(),
        label: field.name.clone(),
        kind: field.kind.clone(),
        control,
        value: field.default_value.clone().unwrap_or(FieldValue::Unset),
        element: None,
        help: field.help.clone(),
    }
}

/// Widgets for one field: one for scalars, one per element for sequences.
pub fn widgets_for(field: &FieldDescriptor) -> Vec<Widget> {
    match &field.kind {
        FieldKind::Bool => vec![scalar_widget(field, Control::Checkbox)],
        FieldKind::Int => vec![scalar_widget(field, scalar_control(ScalarKind::Int))],
        FieldKind::Float => vec![scalar_widget(field, scalar_control(ScalarKind::Float))],
        FieldKind::Str => vec![scalar_widget(field, Control::Text)],
        FieldKind::Enum => {
            let options = field.allowed_values.clone().unwrap_or_default();
            vec![scalar_widget(field, Control::Choice { options })]
        }
        FieldKind::Other(_) => {
            let mut w = scalar_widget(field, Control::Text);
            w.value = match &field.default_value {
                Some(FieldValue::Str(s)) => FieldValue::Str(s.clone()),
                Some(other) => FieldValue::Str(other.to_arg()),
                None => FieldValue::Unset,
            };
            vec![w]
        }
        FieldKind::Sequence { elem, arity } => {
            let elements: Vec<FieldValue> = match &field.default_value {
                Some(FieldValue::List(items)) if !items.is_empty() => items.clone(),
                _ => vec![elem.zero(); arity.unwrap_or(1).max(1)],
            };
            elements
                .into_iter()
                .enumerate()
                .map(|(i, value)| Widget {
                    name: field.name.clone(),
                    label: format!("{}[{i}]", field.name),
                    kind: field.kind.clone(),
                    control: scalar_control(*elem),
                    value,
                    element: Some(i),
                    help: if i == 0 {
                        field.help.clone()
                    } else {
                        String::new()
                    },
                })
                .collect()
        }
    }
}

/// Schema fields plus the synthetic `verbose` checkbox (unless the schema declares one).
pub fn with_synthetic(schema: &Schema) -> Vec<FieldDescriptor> {
    let mut fields = schema.fields().to_vec();
    if !schema.contains(SYNTHETIC_VERBOSE) {
        fields.push(FieldDescriptor::new(
            SYNTHETIC_VERBOSE,
            FieldKind::Bool,
            Some(FieldValue::Bool(true)),
        ));
    }
    fields
}

/// Builds one method's widgets and the parallel name list.
pub fn build(fields: &[FieldDescriptor]) -> (Vec<Widget>, Vec<String>) {
    let widgets: Vec<Widget> = fields.iter().flat_map(widgets_for).collect();
    let names = widgets.iter().map(|w| w.name.clone()).collect();
    (widgets, names)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FormLayout {
    widgets: Vec<Widget>,
    groups: Vec<WidgetGroup>,
    #[serde(skip)]
    group_index: BTreeMap<String, usize>,
    #[serde(skip)]
    schemas: BTreeMap<String, Schema>,
}

impl FormLayout {
    /// Lays out every method of `registry` that has a schema, in registration order.
    pub fn build(registry: &MethodRegistry) -> Self {
        let mut layout = FormLayout::default();
        for entry in registry.entries() {
            let Some(schema) = &entry.schema else {
                continue;
            };
            let (widgets, _) = build(&with_synthetic(schema));
            let start = layout.widgets.len();
            layout.widgets.extend(widgets);
            let end = layout.widgets.len();
            layout.group_index.insert(entry.name.clone(), layout.groups.len());
            layout.groups.push(WidgetGroup {
                method: entry.name.clone(),
                start,
                end,
            });
            layout.schemas.insert(entry.name.clone(), schema.clone());
        }
        layout
    }

    pub fn widgets(&self) -> &[Widget] {
        &self.widgets
    }

    pub fn names(&self) -> Vec<String> {
        self.widgets.iter().map(|w| w.name.clone()).collect()
    }

    pub fn groups(&self) -> &[WidgetGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    pub fn group_of(&self, method: &str) -> Option<usize> {
        self.group_index.get(method).copied()
    }

    /// Half-open widget index range owned by `method`.
    pub fn range(&self, method: &str) -> Option<(usize, usize)> {
        self.group_of(method)
            .map(|i| (self.groups[i].start, self.groups[i].end))
    }

    /// The schema fields were built from; synthetic fields are not part of it.
    pub fn schema(&self, method: &str) -> Option<&Schema> {
        self.schemas.get(method)
    }

    /// One flag per group: only `selected`'s group is visible. Unknown methods hide all.
    pub fn visibility(&self, selected: &str) -> Vec<bool> {
        let shown = self.group_of(selected);
        (0..self.groups.len()).map(|i| Some(i) == shown).collect()
    }

    /// Initial widget values, as the form shows them before any edit.
    pub fn defaults(&self) -> Vec<FieldValue> {
        self.widgets.iter().map(|w| w.value.clone()).collect()
    }

    /// [`Self::defaults`] in the shape the browser submits them.
    pub fn defaults_json(&self) -> Vec<serde_json::Value> {
        self.widgets
            .iter()
            .map(|w| serde_json::to_value(&w.value).unwrap_or(serde_json::Value::Null))
            .collect()
    }

    /// Reads raw browser values against each widget's kind. Missing trailing entries are unset.
    pub fn parse_values(&self, raw: &[serde_json::Value]) -> Vec<FieldValue> {
        self.widgets
            .iter()
            .enumerate()
            .map(|(i, w)| match raw.get(i) {
                Some(v) => FieldValue::from_json(&w.kind, v),
                None => FieldValue::Unset,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::{builtin_dataparsers, builtin_processors, builtin_trainers};

    #[test]
    fn scalar_widgets_start_at_their_defaults() {
        let reg = builtin_processors().unwrap();
        let schema = reg.schema("ProcessPolycam").unwrap();
        let (widgets, names) = build(schema.fields());
        assert_eq!(widgets.len(), schema.len());
        for (w, f) in widgets.iter().zip(schema.fields()) {
            assert_eq!(Some(&w.value), f.default_value.as_ref(), "field {}", f.name);
        }
        assert_eq!(names[0], "num_downscales");
        assert_eq!(widgets[1].control, Control::Checkbox);
    }

    #[test]
    fn sequences_get_one_widget_per_default_element() {
        let reg = builtin_trainers().unwrap();
        let schema = reg.schema("tensorf").unwrap();
        let field = schema.get("upsampling_iters").unwrap();
        let widgets = widgets_for(field);
        let values: Vec<_> = widgets.iter().map(|w| w.value.clone()).collect();
        assert_eq!(
            values,
            [2000, 3000, 4000, 5500, 7000].map(FieldValue::Int).to_vec()
        );
        assert!(widgets.iter().all(|w| w.name == "upsampling_iters"));
        assert_eq!(widgets[4].element, Some(4));
    }

    #[test]
    fn sequences_without_default_use_zero_values() {
        let reg = builtin_dataparsers().unwrap();
        let field = reg
            .schema("nerfstudio-data")
            .unwrap()
            .get("mask_color")
            .unwrap()
            .clone();
        let widgets = widgets_for(&field);
        assert_eq!(widgets.len(), 3);
        assert!(widgets.iter().all(|w| w.value == FieldValue::Float(0.0)));
    }

    #[test]
    fn unsupported_kinds_become_text() {
        let field = FieldDescriptor::new(
            "colmap_model_path",
            FieldKind::Other("PathBuf".into()),
            Some(FieldValue::Str("colmap/sparse/0".into())),
        );
        let widgets = widgets_for(&field);
        assert_eq!(widgets.len(), 1);
        assert_eq!(widgets[0].control, Control::Text);
        assert_eq!(widgets[0].value, FieldValue::Str("colmap/sparse/0".into()));
    }

    #[test]
    fn enum_widgets_offer_allowed_values() {
        let field = FieldDescriptor::choice(
            "sfm_tool",
            vec![FieldValue::Str("any".into()), FieldValue::Str("hloc".into())],
            Some(FieldValue::Str("any".into())),
        );
        let w = &widgets_for(&field)[0];
        match &w.control {
            Control::Choice { options } => assert_eq!(options.len(), 2),
            other => panic!("unexpected control: {other:?}"),
        }
    }

    #[test]
    fn every_group_ends_with_verbose() {
        let layout = FormLayout::build(&builtin_processors().unwrap());
        for g in layout.groups() {
            let last = &layout.widgets()[g.end - 1];
            assert_eq!(last.name, SYNTHETIC_VERBOSE);
            assert_eq!(last.value, FieldValue::Bool(true));
        }
    }

    #[test]
    fn group_ranges_partition_the_widget_list() {
        let layout = FormLayout::build(&builtin_trainers().unwrap());
        let mut next = 0;
        for g in layout.groups() {
            assert_eq!(g.start, next);
            assert!(g.end > g.start);
            next = g.end;
        }
        assert_eq!(next, layout.len());
        // description-only methods get no group
        assert!(layout.group_of("semantic-nerfw").is_none());
    }

    #[test]
    fn exactly_the_selected_group_is_visible() {
        let layout = FormLayout::build(&builtin_processors().unwrap());
        for g in layout.groups() {
            let vis = layout.visibility(&g.method);
            assert_eq!(vis.iter().filter(|v| **v).count(), 1);
            assert!(vis[layout.group_of(&g.method).unwrap()]);
        }
        assert!(layout.visibility("nope").iter().all(|v| !v));
    }

    #[test]
    fn parse_values_follows_widget_kinds() {
        let layout = FormLayout::build(&builtin_processors().unwrap());
        let (start, _) = layout.range("ProcessODM").unwrap();
        let mut raw = vec![serde_json::Value::Null; layout.len()];
        raw[start] = serde_json::json!("5");
        let parsed = layout.parse_values(&raw);
        assert_eq!(parsed[start], FieldValue::Int(5));
        assert_eq!(parsed[0], FieldValue::Unset);
    }
}
