//! Draw calls
//!
//! A [`DrawCall`] is one pass of one surface, with every binding resolved
//! against the three stores it reads from. It listens to those stores and
//! flags itself dirty when one of the keys it resolved changes.

use super::context::{DrawSubmission, GraphicsContext};
use super::effect::{resolve_template, Binding, BindingSource, Effect, Pass, Variables};
use super::geometry::{VertexAttribute, VERTEX_COUNT};
use super::material::{PRIORITY, Z_SORTED};
use super::texture::Texture;
use crate::data::{Store, StoreEvent, Value, GEOMETRY_COLLECTION, MATERIAL_COLLECTION};
use crate::error::SceneResult;
use crate::foundation::math::{translation, Mat4, Rect, Vec4};
use crate::foundation::{Signal, Slot, Uuid};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

/// Store key of the object-to-world matrix published by transforms
pub const MODEL_TO_WORLD: &str = "modelToWorldMatrix";
/// Store key of the camera view matrix
pub const VIEW_MATRIX: &str = "viewMatrix";

/// Stores a draw call reads from
#[derive(Debug, Clone)]
pub struct DataBindings {
    /// Scene root store
    pub root: Rc<Store>,
    /// Renderer node store
    pub renderer: Rc<Store>,
    /// Surface node store
    pub target: Rc<Store>,
}

impl DataBindings {
    /// Store for `source`
    pub fn store(&self, source: BindingSource) -> &Rc<Store> {
        match source {
            BindingSource::Root => &self.root,
            BindingSource::Renderer => &self.renderer,
            BindingSource::Target => &self.target,
        }
    }
}

/// Chooses the program variant of a pass
pub trait ProgramResolver {
    /// Program for `pass` given its resolved macros
    fn resolve(&self, effect: &Effect, technique: &str, pass: &Pass, macros: &[(String, Value)]) -> String;
}

/// Default resolver: program name followed by every defined macro
///
/// `phong` with `SHININESS=Float(32.0)` becomes `phong#SHININESS=32`.
#[derive(Debug, Default, Clone, Copy)]
pub struct VariantKeyResolver;

impl ProgramResolver for VariantKeyResolver {
    fn resolve(&self, _effect: &Effect, _technique: &str, pass: &Pass, macros: &[(String, Value)]) -> String {
        let mut defines: Vec<String> = macros
            .iter()
            .filter_map(|(name, value)| match value {
                Value::Bool(false) => None,
                Value::Int(v) => Some(format!("{name}={v}")),
                Value::Float(v) => Some(format!("{name}={v}")),
                Value::Text(v) => Some(format!("{name}={v}")),
                _ => Some(name.clone()),
            })
            .collect();
        defines.sort();

        let mut key = pass.program.clone();
        for define in defines {
            key.push('#');
            key.push_str(&define);
        }
        key
    }
}

#[derive(Default)]
struct BoundKeys {
    root: HashSet<String>,
    renderer: HashSet<String>,
    target: HashSet<String>,
}

impl BoundKeys {
    fn insert(&mut self, source: BindingSource, key: String) {
        match source {
            BindingSource::Root => self.root.insert(key),
            BindingSource::Renderer => self.renderer.insert(key),
            BindingSource::Target => self.target.insert(key),
        };
    }

    fn contains(&self, source: BindingSource, key: &str) -> bool {
        match source {
            BindingSource::Root => self.root.contains(key),
            BindingSource::Renderer => self.renderer.contains(key),
            BindingSource::Target => self.target.contains(key),
        }
    }
}

/// Render target and viewport to restore after a pass with its own target
#[derive(Debug, Clone, Copy)]
pub struct TargetState {
    /// Active render target, `None` for the back buffer
    pub target: Option<super::texture::TextureId>,
    /// Active viewport
    pub viewport: Rect,
}

/// One resolved pass of one surface
pub struct DrawCall {
    surface: Uuid,
    pass: Rc<Pass>,
    effect: Rc<Effect>,
    technique: String,
    variables: Variables,
    data: DataBindings,
    program: String,
    uniforms: Vec<(String, Value)>,
    attributes: Vec<(String, VertexAttribute)>,
    macros: Vec<(String, Value)>,
    vertex_count: u32,
    priority: f32,
    z_sorted: bool,
    dirty: Rc<Cell<bool>>,
    bound: Rc<RefCell<BoundKeys>>,
    _listeners: Vec<Slot>,
}

impl DrawCall {
    pub(crate) fn new(
        surface: Uuid,
        effect: Rc<Effect>,
        technique: String,
        pass: Rc<Pass>,
        variables: Variables,
        data: DataBindings,
        resolver: &dyn ProgramResolver,
    ) -> Self {
        let dirty = Rc::new(Cell::new(false));
        let bound = Rc::new(RefCell::new(BoundKeys::default()));

        let mut listeners = Vec::with_capacity(9);
        for source in [BindingSource::Root, BindingSource::Renderer, BindingSource::Target] {
            let store = data.store(source);
            for signal in [store.property_added(), store.property_changed(), store.property_removed()] {
                listeners.push(watch(signal, source, &bound, &dirty));
            }
        }

        let mut draw_call = Self {
            surface,
            pass,
            effect,
            technique,
            variables,
            data,
            program: String::new(),
            uniforms: Vec::new(),
            attributes: Vec::new(),
            macros: Vec::new(),
            vertex_count: 0,
            priority: 0.0,
            z_sorted: false,
            dirty,
            bound,
            _listeners: listeners,
        };
        draw_call.bind(resolver);
        draw_call
    }

    /// Replace the variables and re-resolve every binding
    pub(crate) fn rebind(&mut self, variables: Variables, resolver: &dyn ProgramResolver) {
        self.variables = variables;
        self.bind(resolver);
    }

    /// Whether a bound key changed since the last resolution
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Resolve every binding against the stores
    pub(crate) fn bind(&mut self, resolver: &dyn ProgramResolver) {
        let mut bound = BoundKeys::default();

        self.macros = self.resolve_all(&self.pass.macro_bindings, &mut bound);
        self.uniforms = self.resolve_all(&self.pass.uniform_bindings, &mut bound);
        self.attributes = self
            .resolve_all(&self.pass.attribute_bindings, &mut bound)
            .into_iter()
            .filter_map(|(name, value)| match value {
                Value::Attribute(attribute) => Some((name, attribute)),
                other => {
                    log::warn!("attribute '{}' bound to a {} value", name, other.type_name());
                    None
                }
            })
            .collect();

        let material_key = |name: &str| {
            resolve_template(&format!("{MATERIAL_COLLECTION}[${{materialUuid}}].{name}"), &self.variables)
        };
        let priority_key = material_key(PRIORITY);
        let z_sorted_key = material_key(Z_SORTED);
        let count_key = resolve_template(
            &format!("{GEOMETRY_COLLECTION}[${{geometryUuid}}].{VERTEX_COUNT}"),
            &self.variables,
        );

        self.priority = match self.data.target.get(&priority_key) {
            Some(Value::Float(priority)) => priority,
            _ => self.pass.states.priority,
        };
        self.z_sorted = match self.data.target.get(&z_sorted_key) {
            Some(Value::Bool(z_sorted)) => z_sorted,
            _ => self.pass.states.z_sorted,
        };
        self.vertex_count = match self.data.target.get(&count_key) {
            Some(Value::Int(count)) => u32::try_from(count).unwrap_or(0),
            _ => 0,
        };
        bound.insert(BindingSource::Target, priority_key);
        bound.insert(BindingSource::Target, z_sorted_key);
        bound.insert(BindingSource::Target, count_key);

        self.program = resolver.resolve(&self.effect, &self.technique, &self.pass, &self.macros);
        *self.bound.borrow_mut() = bound;
        self.dirty.set(false);
    }

    fn resolve_all(&self, bindings: &[(String, Binding)], bound: &mut BoundKeys) -> Vec<(String, Value)> {
        let mut out = Vec::with_capacity(bindings.len());
        for (name, binding) in bindings {
            let key = resolve_template(&binding.property, &self.variables);
            match self.data.store(binding.source).get(&key).or_else(|| binding.default.clone()) {
                Some(value) => out.push((name.clone(), value)),
                None => log::trace!("draw call {}: '{}' unbound ({})", self.pass.name, name, key),
            }
            bound.insert(binding.source, key);
        }
        out
    }

    /// Eye-space depth of the surface origin; larger is farther
    pub fn depth(&self) -> f32 {
        let model = match self.data.target.get(MODEL_TO_WORLD) {
            Some(Value::Mat4(m)) => m,
            _ => Mat4::identity(),
        };
        let view = match self.data.renderer.get(VIEW_MATRIX) {
            Some(Value::Mat4(m)) => m,
            _ => Mat4::identity(),
        };
        let origin = translation(&model);
        let eye = view * Vec4::new(origin.x, origin.y, origin.z, 1.0);
        -eye.z
    }

    /// Issue the draw, switching to the pass's own target if it has one
    pub fn render(&self, context: &mut dyn GraphicsContext, restore: TargetState) -> SceneResult<()> {
        let own_target = self.pass.states.target.as_ref();
        if let Some(target) = own_target {
            context.set_render_to_texture(target.id(), true)?;
            context.configure_viewport(0, 0, texture_extent(target).0, texture_extent(target).1)?;
        }

        context.draw(&self.submission())?;

        if own_target.is_some() {
            match restore.target {
                Some(id) => context.set_render_to_texture(id, false)?,
                None => context.set_render_to_back_buffer()?,
            }
            let v = restore.viewport;
            context.configure_viewport(v.x, v.y, v.width, v.height)?;
        }
        Ok(())
    }

    /// Backend payload for this draw call
    pub fn submission(&self) -> DrawSubmission {
        DrawSubmission {
            surface: self.surface,
            pass: self.pass.name.clone(),
            program: self.program.clone(),
            uniforms: self.uniforms.clone(),
            attributes: self.attributes.clone(),
            macros: self.macros.clone(),
            vertex_count: self.vertex_count,
        }
    }

    /// Surface this draw call belongs to
    pub const fn surface(&self) -> Uuid {
        self.surface
    }

    /// Pass name
    pub fn pass_name(&self) -> &str {
        &self.pass.name
    }

    /// Resolved program variant
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Resolved value of `uniform`
    pub fn uniform(&self, uniform: &str) -> Option<&Value> {
        self.uniforms.iter().find(|(n, _)| n == uniform).map(|(_, v)| v)
    }

    /// Effective priority
    pub const fn priority(&self) -> f32 {
        self.priority
    }

    /// Effective z-sorting flag
    pub const fn z_sorted(&self) -> bool {
        self.z_sorted
    }

    /// Vertices to draw
    pub const fn vertex_count(&self) -> u32 {
        self.vertex_count
    }
}

impl std::fmt::Debug for DrawCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawCall")
            .field("surface", &self.surface)
            .field("pass", &self.pass.name)
            .field("program", &self.program)
            .field("priority", &self.priority)
            .field("z_sorted", &self.z_sorted)
            .finish()
    }
}

fn texture_extent(texture: &Texture) -> (i32, i32) {
    let extent = |size: u32| i32::try_from(size).unwrap_or(i32::MAX);
    (extent(texture.width()), extent(texture.height()))
}

fn watch(
    signal: &Signal<StoreEvent>,
    source: BindingSource,
    bound: &Rc<RefCell<BoundKeys>>,
    dirty: &Rc<Cell<bool>>,
) -> Slot {
    let bound = Rc::clone(bound);
    let dirty = Rc::clone(dirty);
    signal.connect(move |event| {
        if bound.borrow().contains(source, &event.key) {
            dirty.set(true);
        }
        Ok(())
    })
}
