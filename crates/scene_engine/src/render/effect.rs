//! Effects, techniques and passes
//!
//! An [`Effect`] is a set of named [`Technique`]s; each technique is an
//! ordered list of [`Pass`]es. A pass names a program and describes where
//! each of its inputs comes from through [`Binding`]s whose property names
//! may reference draw-call variables, e.g.
//! `material[${materialUuid}].diffuseColor`.

use super::texture::Texture;
use crate::data::{Provider, Value};
use crate::error::{SceneError, SceneResult};
use crate::foundation::Uuid;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

/// Technique used when none is requested
pub const DEFAULT_TECHNIQUE: &str = "default";

/// Common pass priorities; higher draws first
pub mod priority {
    /// Drawn before everything
    pub const FIRST: f32 = 4000.0;
    /// Backgrounds and skyboxes
    pub const BACKGROUND: f32 = 3000.0;
    /// Opaque geometry
    pub const OPAQUE: f32 = 2000.0;
    /// Blended geometry
    pub const TRANSPARENT: f32 = 1000.0;
    /// Drawn after everything
    pub const LAST: f32 = 0.0;
}

/// Draw-call variables substituted into binding templates
pub type Variables = BTreeMap<String, String>;

/// Replace every `${name}` in `template` with its variable value
///
/// Unknown variables are left untouched.
pub fn resolve_template(template: &str, variables: &Variables) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match variables.get(name) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 3 + end]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Store a binding reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingSource {
    /// The surface's node
    Target,
    /// The renderer's node
    Renderer,
    /// The scene root
    Root,
}

/// Where a pass input comes from
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    /// Store key template
    pub property: String,
    /// Store to read from
    pub source: BindingSource,
    /// Value used when the key is absent
    pub default: Option<Value>,
}

impl Binding {
    /// Bind to a key of the surface's node store
    pub fn target(property: impl Into<String>) -> Self {
        Self::new(property, BindingSource::Target)
    }

    /// Bind to a key of the renderer's node store
    pub fn renderer(property: impl Into<String>) -> Self {
        Self::new(property, BindingSource::Renderer)
    }

    /// Bind to a key of the root store
    pub fn root(property: impl Into<String>) -> Self {
        Self::new(property, BindingSource::Root)
    }

    fn new(property: impl Into<String>, source: BindingSource) -> Self {
        Self { property: property.into(), source, default: None }
    }

    /// Value used when the key is absent
    pub fn or_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Fixed render states of a pass
#[derive(Debug, Clone)]
pub struct States {
    /// Draw order priority, higher first
    pub priority: f32,
    /// Drawn back to front after opaque draws of the same priority
    pub z_sorted: bool,
    /// Render into this texture instead of the renderer's target
    pub target: Option<Rc<Texture>>,
}

impl Default for States {
    fn default() -> Self {
        Self {
            priority: priority::OPAQUE,
            z_sorted: false,
            target: None,
        }
    }
}

/// One program invocation of a technique
#[derive(Debug, Clone)]
pub struct Pass {
    /// Pass name
    pub name: String,
    /// Program name
    pub program: String,
    /// Uniform name and where to read it
    pub uniform_bindings: Vec<(String, Binding)>,
    /// Attribute name and where to read it
    pub attribute_bindings: Vec<(String, Binding)>,
    /// Macro name and where to read it
    pub macro_bindings: Vec<(String, Binding)>,
    /// Render states
    pub states: States,
}

impl Pass {
    /// Pass running `program` with no bindings
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            uniform_bindings: Vec::new(),
            attribute_bindings: Vec::new(),
            macro_bindings: Vec::new(),
            states: States::default(),
        }
    }

    /// Add a uniform binding
    pub fn uniform(mut self, name: impl Into<String>, binding: Binding) -> Self {
        self.uniform_bindings.push((name.into(), binding));
        self
    }

    /// Add an attribute binding
    pub fn attribute(mut self, name: impl Into<String>, binding: Binding) -> Self {
        self.attribute_bindings.push((name.into(), binding));
        self
    }

    /// Add a macro binding
    pub fn define(mut self, name: impl Into<String>, binding: Binding) -> Self {
        self.macro_bindings.push((name.into(), binding));
        self
    }

    /// Set the draw priority
    pub fn with_priority(mut self, priority: f32) -> Self {
        self.states.priority = priority;
        self
    }

    /// Enable back-to-front sorting
    pub fn z_sorted(mut self, z_sorted: bool) -> Self {
        self.states.z_sorted = z_sorted;
        self
    }

    /// Render into `target`
    pub fn with_target(mut self, target: Rc<Texture>) -> Self {
        self.states.target = Some(target);
        self
    }
}

/// Ordered passes plus an optional fallback technique
#[derive(Debug, Clone, Default)]
pub struct Technique {
    /// Passes in execution order
    pub passes: Vec<Rc<Pass>>,
    /// Technique used when this one has no pass
    pub fallback: Option<String>,
}

impl Technique {
    /// Technique made of `passes`
    pub fn new(passes: impl IntoIterator<Item = Pass>) -> Self {
        Self {
            passes: passes.into_iter().map(Rc::new).collect(),
            fallback: None,
        }
    }

    /// Set the fallback technique
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }
}

/// Named techniques plus effect-level uniform data
#[derive(Debug)]
pub struct Effect {
    name: String,
    provider: Rc<Provider>,
    techniques: RefCell<HashMap<String, Technique>>,
}

impl Effect {
    /// Effect with no technique
    pub fn new(name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            provider: Provider::new(),
            techniques: RefCell::new(HashMap::new()),
        })
    }

    /// Effect with a single `default` technique
    pub fn with_passes(name: impl Into<String>, passes: impl IntoIterator<Item = Pass>) -> Rc<Self> {
        let effect = Self::new(name);
        effect.add_technique(DEFAULT_TECHNIQUE, Technique::new(passes));
        effect
    }

    /// Effect identifier (its provider's uuid)
    pub fn uuid(&self) -> Uuid {
        self.provider.uuid()
    }

    /// Effect name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Uniform defaults registered in target stores
    pub fn data(&self) -> &Rc<Provider> {
        &self.provider
    }

    /// Define or replace a technique
    pub fn add_technique(&self, name: impl Into<String>, technique: Technique) {
        self.techniques.borrow_mut().insert(name.into(), technique);
    }

    /// Whether a technique named `name` exists
    pub fn has_technique(&self, name: &str) -> bool {
        self.techniques.borrow().contains_key(name)
    }

    /// Resolve `name` to a technique with at least one pass
    ///
    /// Follows the fallback chain, then tries `default`. Returns the name of
    /// the technique actually used.
    pub fn resolve_technique(&self, name: &str) -> SceneResult<(String, Technique)> {
        let techniques = self.techniques.borrow();
        let mut visited = HashSet::new();
        let mut current = Some(name.to_string());

        while let Some(candidate) = current.take() {
            if !visited.insert(candidate.clone()) {
                break;
            }
            if let Some(technique) = techniques.get(&candidate) {
                if !technique.passes.is_empty() {
                    return Ok((candidate, technique.clone()));
                }
                current = technique.fallback.clone();
            }
        }

        match techniques.get(DEFAULT_TECHNIQUE) {
            Some(technique) if !technique.passes.is_empty() => {
                log::debug!("effect '{}': technique '{}' unavailable, using default", self.name, name);
                Ok((DEFAULT_TECHNIQUE.to_string(), technique.clone()))
            }
            _ => Err(SceneError::TechniqueNotFound {
                effect: self.name.clone(),
                technique: name.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_template() {
        let mut vars = Variables::new();
        vars.insert("materialUuid".into(), "00ff".into());
        assert_eq!(
            resolve_template("material[${materialUuid}].diffuseColor", &vars),
            "material[00ff].diffuseColor"
        );
        assert_eq!(resolve_template("${unknown}.x", &vars), "${unknown}.x");
        assert_eq!(resolve_template("plain", &vars), "plain");
        assert_eq!(resolve_template("broken${", &vars), "broken${");
    }

    #[test]
    fn test_technique_fallback_chain() {
        let effect = Effect::new("phong");
        effect.add_technique("shadowed", Technique::default().with_fallback("lit"));
        effect.add_technique("lit", Technique::new([Pass::new("lit", "phong_lit")]));
        effect.add_technique(DEFAULT_TECHNIQUE, Technique::new([Pass::new("basic", "basic")]));

        let (name, technique) = effect.resolve_technique("shadowed").unwrap();
        assert_eq!(name, "lit");
        assert_eq!(technique.passes[0].program, "phong_lit");

        let (name, _) = effect.resolve_technique("missing").unwrap();
        assert_eq!(name, DEFAULT_TECHNIQUE);
    }

    #[test]
    fn test_missing_technique_fails() {
        let effect = Effect::new("empty");
        effect.add_technique("a", Technique::default().with_fallback("b"));
        effect.add_technique("b", Technique::default().with_fallback("a"));

        assert!(matches!(
            effect.resolve_technique("a"),
            Err(SceneError::TechniqueNotFound { .. })
        ));
    }
}
