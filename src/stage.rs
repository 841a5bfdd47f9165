//! In-process USD stage model and USDA (ASCII) text serializer.
//!
//! No maintained Rust binding to Pixar's USD runtime exists, so rather
//! than fabricate one, the writer's notion of a "stage" is this small
//! `Layer`/`Prim`/`Attribute` tree plus a serializer that renders it to
//! valid `.usda` text (see DESIGN.md, Open Question resolution). Every
//! `UsdWriter` operation in spec.md §4.4 that "authors an attribute" or
//! "creates a prim" ultimately mutates one of these in-memory `Layer`s;
//! [`crate::connection::Connection::write_file`] is what actually
//! persists the rendered text.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};

use crate::timecode::TimeCode;
use crate::types::UsdValueType;

new_key_type! {
    /// Handle to a [`Layer`] inside a [`StageStore`].
    pub struct LayerId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Specifier {
    #[default]
    Def,
    Over,
    Class,
}

impl Specifier {
    fn usda_keyword(self) -> &'static str {
        match self {
            Specifier::Def => "def",
            Specifier::Over => "over",
            Specifier::Class => "class",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reference {
    /// `None` for an internal (same-layer) reference.
    pub asset_path: Option<String>,
    pub prim_path: String,
}

/// One authored attribute: a static (default-time) value and/or a set of
/// time samples. Values are stored pre-rendered as USDA literals — the
/// attribute write dispatch (`writer::attributes`) is responsible for
/// correct numeric formatting; this type only serializes.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub value_type: UsdValueType,
    pub is_array: bool,
    pub uniform: Option<String>,
    pub samples: BTreeMap<TimeCode, String>,
}

impl Attribute {
    fn new(value_type: UsdValueType, is_array: bool) -> Self {
        Self {
            value_type,
            is_array,
            uniform: None,
            samples: BTreeMap::new(),
        }
    }

    fn type_token(&self) -> String {
        if self.is_array {
            self.value_type.array_usda_name()
        } else {
            self.value_type.usda_name().to_string()
        }
    }

    fn to_usda(&self, name: &str, indent: &str, buf: &mut String) {
        let type_token = self.type_token();
        if self.samples.is_empty() {
            if let Some(v) = &self.uniform {
                let _ = writeln!(buf, "{indent}{type_token} {name} = {v}");
            }
        } else {
            let _ = writeln!(buf, "{indent}{type_token} {name}.timeSamples = {{");
            for (t, v) in &self.samples {
                let _ = writeln!(buf, "{indent}    {}: {v},", format_time(t.get()));
            }
            let _ = writeln!(buf, "{indent}}}");
            if let Some(v) = &self.uniform {
                let _ = writeln!(buf, "{indent}{type_token} {name}.default = {v}");
            }
        }
    }
}

fn format_time(t: f64) -> String {
    if t.fract() == 0.0 {
        format!("{t:.0}")
    } else {
        format!("{t}")
    }
}

/// A single USD prim: identity, composition arcs, attributes, and
/// relationships.
#[derive(Debug, Clone)]
pub struct Prim {
    pub path: String,
    pub specifier: Specifier,
    pub type_name: String,
    pub kind: Option<String>,
    pub instanceable: bool,
    pub references: Vec<Reference>,
    pub relationships: FxHashMap<String, Vec<String>>,
    pub custom_metadata: Vec<(String, String)>,
    attributes: FxHashMap<String, Attribute>,
    attribute_order: Vec<String>,
}

impl Prim {
    fn new(path: String, type_name: String, specifier: Specifier) -> Self {
        Self {
            path,
            specifier,
            type_name,
            kind: None,
            instanceable: false,
            references: Vec::new(),
            relationships: FxHashMap::default(),
            custom_metadata: Vec::new(),
            attributes: FxHashMap::default(),
            attribute_order: Vec::new(),
        }
    }

    fn attribute_entry(&mut self, name: &str, value_type: UsdValueType, is_array: bool) -> &mut Attribute {
        if !self.attributes.contains_key(name) {
            self.attribute_order.push(name.to_string());
            self.attributes
                .insert(name.to_string(), Attribute::new(value_type, is_array));
        }
        self.attributes.get_mut(name).unwrap()
    }

    /// Authors (or overwrites) the default-time value of an attribute.
    pub fn set_uniform(&mut self, name: &str, value_type: UsdValueType, is_array: bool, literal: String) {
        self.attribute_entry(name, value_type, is_array).uniform = Some(literal);
    }

    /// Clears any default-time value, keeping time samples if present
    /// (spec.md §4.4.4: the writer "clears stale samples on transitions"
    /// and, symmetrically, clears the default opinion when an attribute
    /// becomes time-varying).
    pub fn clear_uniform(&mut self, name: &str) {
        if let Some(attr) = self.attributes.get_mut(name) {
            attr.uniform = None;
        }
    }

    /// Authors a value at a specific timecode.
    pub fn set_time_sample(&mut self, name: &str, value_type: UsdValueType, is_array: bool, t: TimeCode, literal: String) {
        self.attribute_entry(name, value_type, is_array).samples.insert(t, literal);
    }

    /// Clears a single time sample previously authored at `t`.
    pub fn clear_time_sample(&mut self, name: &str, t: TimeCode) {
        if let Some(attr) = self.attributes.get_mut(name) {
            attr.samples.remove(&t);
        }
    }

    /// Removes an attribute entirely (used when reinitializing a
    /// manifest stage on a timeVaryingBits transition).
    pub fn remove_attribute(&mut self, name: &str) {
        if self.attributes.remove(name).is_some() {
            self.attribute_order.retain(|n| n != name);
        }
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    #[must_use]
    pub fn attribute_names(&self) -> &[String] {
        &self.attribute_order
    }

    pub fn add_relationship_target(&mut self, name: &str, target: String) {
        self.relationships.entry(name.to_string()).or_default().push(target);
    }

    pub fn clear_relationship(&mut self, name: &str) {
        self.relationships.remove(name);
    }

    fn to_usda(&self, buf: &mut String) {
        let depth = self.path.matches('/').count().max(1) - 1;
        let indent = "    ".repeat(depth);
        let leaf = self.path.rsplit('/').next().unwrap_or(&self.path);

        let _ = write!(buf, "{indent}{} {}", self.specifier.usda_keyword(), self.type_name_or_blank());
        let _ = write!(buf, " \"{leaf}\"");
        if self.instanceable {
            let _ = write!(buf, " (\n{indent}    instanceable = true\n");
            if let Some(kind) = &self.kind {
                let _ = write!(buf, "{indent}    kind = \"{kind}\"\n");
            }
            let _ = write!(buf, "{indent})");
        } else if let Some(kind) = &self.kind {
            let _ = write!(buf, " (\n{indent}    kind = \"{kind}\"\n{indent})");
        }
        let _ = writeln!(buf, "\n{indent}{{");

        let inner = format!("{indent}    ");
        if !self.references.is_empty() {
            let refs: Vec<String> = self
                .references
                .iter()
                .map(|r| match &r.asset_path {
                    Some(asset) => format!("@{asset}@<{}>", r.prim_path),
                    None => format!("<{}>", r.prim_path),
                })
                .collect();
            let _ = writeln!(buf, "{inner}prepend references = [{}]", refs.join(", "));
        }
        for (key, value) in &self.custom_metadata {
            let _ = writeln!(buf, "{inner}{key} = {value}");
        }
        for name in &self.attribute_order {
            self.attributes[name].to_usda(name, &inner, buf);
        }
        for (rel, targets) in &self.relationships {
            let joined: Vec<String> = targets.iter().map(|t| format!("<{t}>")).collect();
            let _ = writeln!(buf, "{inner}rel {rel} = [{}]", joined.join(", "));
        }
        let _ = writeln!(buf, "{indent}}}");
    }

    fn type_name_or_blank(&self) -> &str {
        if self.type_name.is_empty() {
            "Scope"
        } else {
            &self.type_name
        }
    }
}

/// One open USD layer: a master stage, a manifest stage, or a per-timestep
/// clip stage (spec.md §3 "Stage").
#[derive(Debug, Clone)]
pub struct Layer {
    pub identifier: String,
    pub default_prim: Option<String>,
    pub start_time_code: f64,
    pub end_time_code: f64,
    pub sublayers: Vec<String>,
    prims: FxHashMap<String, Prim>,
    prim_order: Vec<String>,
}

impl Layer {
    #[must_use]
    pub fn new(identifier: String) -> Self {
        Self {
            identifier,
            default_prim: None,
            start_time_code: 0.0,
            end_time_code: 0.0,
            sublayers: Vec::new(),
            prims: FxHashMap::default(),
            prim_order: Vec::new(),
        }
    }

    /// Get-or-create a `def`-specifier prim at `path`.
    pub fn define_prim(&mut self, path: &str, type_name: &str) -> &mut Prim {
        self.ensure_ancestors(path);
        self.get_or_insert(path, type_name, Specifier::Def)
    }

    /// Get-or-create a `class`-specifier prim (used for `/RootClass`).
    pub fn define_class(&mut self, path: &str) -> &mut Prim {
        self.ensure_ancestors(path);
        self.get_or_insert(path, "", Specifier::Class)
    }

    /// Get-or-create an `over`-specifier prim, used for referencing prims
    /// that only add composition arcs and attribute overrides.
    pub fn over_prim(&mut self, path: &str) -> &mut Prim {
        self.ensure_ancestors(path);
        self.get_or_insert(path, "", Specifier::Over)
    }

    fn ensure_ancestors(&mut self, path: &str) {
        let mut components: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        components.pop();
        let mut current = String::new();
        for c in components {
            current.push('/');
            current.push_str(c);
            if !self.prims.contains_key(&current) {
                self.prim_order.push(current.clone());
                self.prims.insert(current.clone(), Prim::new(current.clone(), String::new(), Specifier::Over));
            }
        }
    }

    fn get_or_insert(&mut self, path: &str, type_name: &str, specifier: Specifier) -> &mut Prim {
        if !self.prims.contains_key(path) {
            self.prim_order.push(path.to_string());
            self.prims
                .insert(path.to_string(), Prim::new(path.to_string(), type_name.to_string(), specifier));
        }
        let prim = self.prims.get_mut(path).unwrap();
        if !type_name.is_empty() {
            prim.type_name = type_name.to_string();
        }
        prim
    }

    #[must_use]
    pub fn get_prim(&self, path: &str) -> Option<&Prim> {
        self.prims.get(path)
    }

    pub fn get_prim_mut(&mut self, path: &str) -> Option<&mut Prim> {
        self.prims.get_mut(path)
    }

    pub fn remove_prim(&mut self, path: &str) {
        if self.prims.remove(path).is_some() {
            self.prim_order.retain(|p| p != path);
        }
    }

    #[must_use]
    pub fn has_prim(&self, path: &str) -> bool {
        self.prims.contains_key(path)
    }

    /// Every prim path currently in the layer, in no particular order.
    pub fn prim_paths(&self) -> impl Iterator<Item = &str> {
        self.prim_order.iter().map(String::as_str)
    }

    pub fn extend_time_range(&mut self, t: f64) {
        if self.prim_order.is_empty() && self.start_time_code == 0.0 && self.end_time_code == 0.0 {
            self.start_time_code = t;
            self.end_time_code = t;
        }
        self.start_time_code = self.start_time_code.min(t);
        self.end_time_code = self.end_time_code.max(t);
    }

    /// Renders the full layer as `.usda` ASCII text.
    #[must_use]
    pub fn to_usda(&self) -> String {
        let mut buf = String::new();
        let _ = writeln!(buf, "#usda 1.0");
        let _ = writeln!(buf, "(");
        if let Some(default_prim) = &self.default_prim {
            let leaf = default_prim.rsplit('/').next().unwrap_or(default_prim);
            let _ = writeln!(buf, "    defaultPrim = \"{leaf}\"");
        }
        let _ = writeln!(buf, "    startTimeCode = {}", format_time(self.start_time_code));
        let _ = writeln!(buf, "    endTimeCode = {}", format_time(self.end_time_code));
        if !self.sublayers.is_empty() {
            let joined: Vec<String> = self.sublayers.iter().map(|s| format!("@{s}@")).collect();
            let _ = writeln!(buf, "    subLayers = [{}]", joined.join(", "));
        }
        let _ = writeln!(buf, ")");
        let _ = writeln!(buf);

        // Only emit top-level prims; nested prims are rendered inline by
        // their parent. A prim is top-level iff its path has one segment.
        let mut top_level: Vec<&str> = self
            .prim_order
            .iter()
            .map(String::as_str)
            .filter(|p| p.matches('/').count() == 1)
            .collect();
        top_level.sort_unstable();
        for path in top_level {
            self.render_subtree(path, &mut buf);
        }
        buf
    }

    fn render_subtree(&self, path: &str, buf: &mut String) {
        let Some(prim) = self.prims.get(path) else { return };
        prim.to_usda_open(buf);
        let prefix = format!("{path}/");
        let mut children: Vec<&str> = self
            .prim_order
            .iter()
            .map(String::as_str)
            .filter(|p| p.starts_with(&prefix) && !p[prefix.len()..].contains('/'))
            .collect();
        children.sort_unstable();
        for child in children {
            self.render_subtree(child, buf);
        }
        prim.to_usda_close(buf);
    }
}

// Split `Prim::to_usda` into open/close halves so `Layer::render_subtree`
// can interleave child prims between them.
impl Prim {
    fn to_usda_open(&self, buf: &mut String) {
        let full = self.to_usda_string();
        let close_idx = full.rfind('}').unwrap();
        buf.push_str(&full[..close_idx]);
    }

    fn to_usda_close(&self, buf: &mut String) {
        let depth = self.path.matches('/').count().max(1) - 1;
        let indent = "    ".repeat(depth);
        let _ = writeln!(buf, "{indent}}}");
    }

    fn to_usda_string(&self) -> String {
        let mut s = String::new();
        self.to_usda(&mut s);
        s
    }
}

/// Owns every open [`Layer`] for a session, addressed by [`LayerId`].
#[derive(Default)]
pub struct StageStore {
    layers: SlotMap<LayerId, Layer>,
}

impl StageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_layer(&mut self, identifier: String) -> LayerId {
        self.layers.insert(Layer::new(identifier))
    }

    #[must_use]
    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id)
    }

    pub fn get_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.get_mut(id)
    }

    pub fn remove(&mut self, id: LayerId) -> Option<Layer> {
        self.layers.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_time_value_renders_without_time_samples() {
        let mut layer = Layer::new("Test.usda".into());
        layer.define_class("/RootClass");
        let prim = layer.define_prim("/RootClass/geometries/G", "Mesh");
        prim.set_uniform("points", UsdValueType::Point3f, true, "[(0, 0, 0)]".into());
        let text = layer.to_usda();
        assert!(text.contains("point3f[] points = [(0, 0, 0)]"));
        assert!(!text.contains("timeSamples"));
    }

    #[test]
    fn time_sample_and_default_clear_are_independent() {
        let mut layer = Layer::new("Test.usda".into());
        let prim = layer.define_prim("/RootClass/geometries/G", "Mesh");
        prim.set_uniform("points", UsdValueType::Point3f, true, "[(0,0,0)]".into());
        prim.set_time_sample("points", UsdValueType::Point3f, true, TimeCode(1.0), "[(1,1,1)]".into());
        prim.clear_uniform("points");
        let text = layer.to_usda();
        assert!(text.contains("timeSamples"));
        assert!(!text.contains("= [(0,0,0)]"));
    }

    #[test]
    fn nested_prims_render_inside_their_parent_braces() {
        let mut layer = Layer::new("Test.usda".into());
        layer.define_class("/RootClass");
        layer.define_prim("/RootClass/geometries", "");
        layer.define_prim("/RootClass/geometries/G", "Mesh");
        let text = layer.to_usda();
        let root_open = text.find("class \"RootClass\"").unwrap();
        let mesh_def = text.find("def Mesh \"G\"").unwrap();
        assert!(mesh_def > root_open);
    }
}
