//! Renderer component
//!
//! A renderer is attached to a node (usually the camera node) and draws
//! every eligible [`Surface`] of that node's scene once per frame.
//!
//! ## Lifecycle
//!
//! ```text
//! detached ──attach──► attached-no-scene ──scene manager found──► attached-active
//!    ▲                        │   ▲                                      │
//!    └────────detach──────────┘   └──────────scene manager lost──────────┘
//! ```
//!
//! Surfaces found in the scene are queued and turned into draw calls at the
//! start of the next [`render`](Renderer::render). Moving the renderer's node
//! to another scene resets everything and rescans the new scene.

use super::perspective_camera::WORLD_TO_SCREEN_MATRIX;
use super::scene_manager::{FrameEvent, SceneManager};
use super::surface::{Surface, SurfaceEvent};
use crate::config::RendererConfig;
use crate::data::{Provider, Value, EFFECT_COLLECTION};
use crate::error::{SceneError, SceneResult};
use crate::foundation::math::{unpack_rgba, Rect};
use crate::foundation::{Signal, Slot, Uuid};
use crate::render::{
    DataBindings, DrawCallGroupId, DrawCallPool, Effect, Geometry, GraphicsContext, PoolStats,
    TargetState, Texture, Variables, VertexBuffer,
};
use crate::scene::{downcast_component, Component, ComponentBase, Layout, Node, NodeEvent, NodeSet};
use std::cell::{Cell, Ref, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// Attribute key of the post-processing quad positions
pub const POST_PROCESSING_POSITION: &str = "postProcessingPosition";
/// Attribute key of the post-processing quad texture coordinates
pub const POST_PROCESSING_UV: &str = "postProcessingUV";

/// Payload of renderer signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RendererEvent {
    /// Renderer firing the signal
    pub renderer: Uuid,
}

struct PostProcessing {
    geometry: Rc<Geometry>,
    provider: Rc<Provider>,
}

impl PostProcessing {
    fn new() -> SceneResult<Self> {
        #[rustfmt::skip]
        let quad = vec![
            -1.0,  1.0, 0.0, 1.0,
            -1.0, -1.0, 0.0, 0.0,
             1.0, -1.0, 1.0, 0.0,
            -1.0,  1.0, 0.0, 1.0,
             1.0, -1.0, 1.0, 0.0,
             1.0,  1.0, 1.0, 1.0,
        ];
        let buffer = VertexBuffer::new(quad);
        buffer.add_attribute("position", 2, 0);
        buffer.add_attribute("uv", 2, 2);

        let geometry = Geometry::new("postProcessingQuad");
        geometry.add_vertex_buffer(Rc::clone(&buffer))?;

        let provider = Provider::new();
        for attribute in buffer.attributes() {
            let key = if attribute.name == "position" { POST_PROCESSING_POSITION } else { POST_PROCESSING_UV };
            provider.set(key, Value::Attribute(attribute))?;
        }
        Ok(Self { geometry, provider })
    }
}

struct RendererState {
    background_color: u32,
    viewport: Rect,
    scissor: Rect,
    enabled: bool,
    clear_before_render: bool,
    render_target: Option<Rc<Texture>>,
    priority: f32,
    effect: Option<Rc<Effect>>,
    effect_technique: String,
    variables: Variables,

    scene_manager: Option<Weak<SceneManager>>,
    frame_slot: Option<Slot>,
    target_slots: Vec<Slot>,
    root_slots: Vec<Slot>,

    to_collect: Vec<Rc<Surface>>,
    surface_to_group: HashMap<Uuid, DrawCallGroupId>,
    surface_watches: HashMap<Uuid, Vec<Slot>>,

    post_processing: Option<PostProcessing>,
    post_processing_registered: bool,
    frame_count: u64,
    sort_count: u64,
}

impl RendererState {
    fn is_pending(&self, uuid: Uuid) -> bool {
        self.to_collect.iter().any(|s| s.uuid() == uuid)
    }

    fn forget_surfaces(&mut self) {
        self.to_collect.clear();
        self.surface_to_group.clear();
        self.surface_watches.clear();
    }
}

/// Draws the surfaces of a scene into a render target
pub struct Renderer {
    base: ComponentBase,
    uuid: Uuid,
    self_ref: Weak<Renderer>,
    state: RefCell<RendererState>,
    pool: RefCell<DrawCallPool>,
    must_z_sort: Rc<Cell<bool>>,
    mask_slot: RefCell<Option<Slot>>,
    rendering_begin: Signal<RendererEvent>,
    before_present: Signal<RendererEvent>,
    rendering_end: Signal<RendererEvent>,
}

impl Renderer {
    /// Renderer with default settings
    pub fn new() -> Rc<Self> {
        Self::from_config(&RendererConfig::default())
    }

    /// Renderer configured from `config`
    pub fn from_config(config: &RendererConfig) -> Rc<Self> {
        Self::build(config, None, DrawCallPool::new())
    }

    /// Renderer overriding every surface's effect
    pub fn with_effect(config: &RendererConfig, effect: Rc<Effect>) -> Rc<Self> {
        Self::build(config, Some(effect), DrawCallPool::new())
    }

    /// Renderer using a custom pool (and therefore program resolver)
    pub fn with_pool(config: &RendererConfig, pool: DrawCallPool) -> Rc<Self> {
        Self::build(config, None, pool)
    }

    fn build(config: &RendererConfig, effect: Option<Rc<Effect>>, pool: DrawCallPool) -> Rc<Self> {
        let renderer = Rc::new_cyclic(|self_ref: &Weak<Self>| Self {
            base: ComponentBase::with_layout_mask(Layout::from_bits_retain(config.layout_mask)),
            uuid: Uuid::new(),
            self_ref: self_ref.clone(),
            state: RefCell::new(RendererState {
                background_color: config.background_color,
                viewport: config.viewport,
                scissor: config.scissor,
                enabled: config.enabled,
                clear_before_render: config.clear_before_render,
                render_target: None,
                priority: config.priority,
                effect,
                effect_technique: config.effect_technique.clone(),
                variables: Variables::new(),
                scene_manager: None,
                frame_slot: None,
                target_slots: Vec::new(),
                root_slots: Vec::new(),
                to_collect: Vec::new(),
                surface_to_group: HashMap::new(),
                surface_watches: HashMap::new(),
                post_processing: None,
                post_processing_registered: false,
                frame_count: 0,
                sort_count: 0,
            }),
            pool: RefCell::new(pool),
            must_z_sort: Rc::new(Cell::new(false)),
            mask_slot: RefCell::new(None),
            rendering_begin: Signal::new(),
            before_present: Signal::new(),
            rendering_end: Signal::new(),
        });

        let weak = Rc::downgrade(&renderer);
        let slot = renderer.base.layout_mask_changed().connect(move |_| match weak.upgrade() {
            Some(renderer) => renderer.rescan(),
            None => Ok(()),
        });
        *renderer.mask_slot.borrow_mut() = Some(slot);
        renderer
    }

    /// Renderer identifier
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Packed `0xRRGGBBAA` clear color
    pub fn background_color(&self) -> u32 {
        self.state.borrow().background_color
    }

    /// Set the clear color
    pub fn set_background_color(&self, color: u32) {
        self.state.borrow_mut().background_color = color;
    }

    /// Viewport box, unset for the full target
    pub fn viewport(&self) -> Rect {
        self.state.borrow().viewport
    }

    /// Set the viewport box
    pub fn set_viewport(&self, viewport: Rect) {
        self.state.borrow_mut().viewport = viewport;
    }

    /// Scissor box, unset to disable the test
    pub fn scissor(&self) -> Rect {
        self.state.borrow().scissor
    }

    /// Set the scissor box
    pub fn set_scissor(&self, scissor: Rect) {
        self.state.borrow_mut().scissor = scissor;
    }

    /// Whether the renderer draws at all
    pub fn enabled(&self) -> bool {
        self.state.borrow().enabled
    }

    /// Enable or disable drawing
    pub fn set_enabled(&self, enabled: bool) {
        self.state.borrow_mut().enabled = enabled;
    }

    /// Whether the target is cleared before drawing
    pub fn clear_before_render(&self) -> bool {
        self.state.borrow().clear_before_render
    }

    /// Toggle clearing before drawing
    pub fn set_clear_before_render(&self, clear: bool) {
        self.state.borrow_mut().clear_before_render = clear;
    }

    /// Own render target, overriding the frame's
    pub fn render_target(&self) -> Option<Rc<Texture>> {
        self.state.borrow().render_target.clone()
    }

    /// Set the own render target
    pub fn set_render_target(&self, target: Option<Rc<Texture>>) {
        self.state.borrow_mut().render_target = target;
    }

    /// Frame-end listener priority; higher renders first
    pub fn priority(&self) -> f32 {
        self.state.borrow().priority
    }

    /// Change the priority, reconnecting to the scene manager if bound
    pub fn set_priority(&self, priority: f32) -> SceneResult<()> {
        let scene_manager = {
            let mut state = self.state.borrow_mut();
            state.priority = priority;
            state.scene_manager.as_ref().and_then(Weak::upgrade)
        };
        if let Some(scene_manager) = scene_manager {
            self.unbind_scene_manager()?;
            self.bind_scene_manager(&scene_manager)?;
        }
        Ok(())
    }

    /// Effect overriding the surfaces' own effects
    pub fn effect(&self) -> Option<Rc<Effect>> {
        self.state.borrow().effect.clone()
    }

    /// Technique used with the override effect
    pub fn effect_technique(&self) -> String {
        self.state.borrow().effect_technique.clone()
    }

    /// Replace the override effect and rebuild every draw call
    pub fn set_effect(&self, effect: Option<Rc<Effect>>, technique: impl Into<String>) -> SceneResult<()> {
        let previous = {
            let mut state = self.state.borrow_mut();
            state.effect_technique = technique.into();
            std::mem::replace(&mut state.effect, effect.clone())
        };
        if let Some(target) = self.base.target() {
            if let Some(previous) = &previous {
                target.data().remove_provider(previous.data(), Some(EFFECT_COLLECTION))?;
            }
            if let Some(effect) = &effect {
                target.data().add_provider(effect.data(), Some(EFFECT_COLLECTION))?;
            }
        }
        self.rescan()
    }

    /// Variables added to every draw call of this renderer
    pub fn variables(&self) -> Variables {
        self.state.borrow().variables.clone()
    }

    /// Set a renderer variable and rebind every tracked surface
    pub fn set_variable(&self, name: impl Into<String>, value: impl Into<String>) {
        self.state.borrow_mut().variables.insert(name.into(), value.into());
        let tracked: Vec<Uuid> = self.state.borrow().surface_to_group.keys().copied().collect();
        for uuid in tracked {
            self.invalidate_surface(uuid);
        }
    }

    /// Scene manager currently driving this renderer
    pub fn scene_manager(&self) -> Option<Rc<SceneManager>> {
        self.state.borrow().scene_manager.as_ref().and_then(Weak::upgrade)
    }

    /// Whether `surface` has draw calls in this renderer
    pub fn tracks(&self, surface: &Surface) -> bool {
        self.state.borrow().surface_to_group.contains_key(&surface.uuid())
    }

    /// Number of surfaces with draw calls
    pub fn num_surfaces(&self) -> usize {
        self.state.borrow().surface_to_group.len()
    }

    /// Number of surfaces waiting for the next render
    pub fn num_pending(&self) -> usize {
        self.state.borrow().to_collect.len()
    }

    /// The draw call pool
    pub fn pool(&self) -> Ref<'_, DrawCallPool> {
        self.pool.borrow()
    }

    /// Pool activity counters
    pub fn stats(&self) -> PoolStats {
        self.pool.borrow().stats()
    }

    /// Frames rendered
    pub fn frame_count(&self) -> u64 {
        self.state.borrow().frame_count
    }

    /// Sorts performed by `render`
    pub fn sort_count(&self) -> u64 {
        self.state.borrow().sort_count
    }

    /// Fired once pending surfaces are flushed, before any context call
    pub const fn rendering_begin(&self) -> &Signal<RendererEvent> {
        &self.rendering_begin
    }

    /// Fired after every draw, before present
    pub const fn before_present(&self) -> &Signal<RendererEvent> {
        &self.before_present
    }

    /// Fired after present
    pub const fn rendering_end(&self) -> &Signal<RendererEvent> {
        &self.rendering_end
    }

    /// Draw one frame
    ///
    /// Does nothing when disabled or when no scene manager drives the scene.
    pub fn render(&self, context: &mut dyn GraphicsContext, frame_target: Option<Rc<Texture>>) -> SceneResult<()> {
        let (enabled, has_scene) = {
            let state = self.state.borrow();
            (state.enabled, state.scene_manager.is_some())
        };
        if !enabled || !has_scene {
            return Ok(());
        }

        let flushed = self.flush_pending()?;
        let event = RendererEvent { renderer: self.uuid };
        self.rendering_begin.execute(&event)?;

        let (scissor, viewport, clear, background, target) = {
            let state = self.state.borrow();
            (
                state.scissor,
                state.viewport,
                state.clear_before_render,
                state.background_color,
                state.render_target.clone().or(frame_target),
            )
        };

        context.set_scissor_test(scissor.is_set(), scissor)?;
        match &target {
            Some(target) => context.set_render_to_texture(target.id(), true)?,
            None => context.set_render_to_back_buffer()?,
        }
        let viewport = if viewport.is_set() {
            viewport
        } else {
            let (width, height) = match &target {
                Some(texture) => (texture.width(), texture.height()),
                None => context.back_buffer_extent(),
            };
            Rect::new(0, 0, to_extent(width), to_extent(height))
        };
        context.configure_viewport(viewport.x, viewport.y, viewport.width, viewport.height)?;
        if clear {
            let [r, g, b, a] = unpack_rgba(background);
            context.clear(r, g, b, a)?;
        }

        {
            let mut pool = self.pool.borrow_mut();
            pool.update();
            if self.must_z_sort.replace(false) || flushed || pool.needs_sort() {
                pool.sort_draw_calls();
                self.state.borrow_mut().sort_count += 1;
            }
        }

        self.pool.borrow().render(
            context,
            TargetState { target: target.as_ref().map(|t| t.id()), viewport },
        )?;

        context.set_render_to_back_buffer()?;
        self.before_present.execute(&event)?;
        context.present()?;
        self.state.borrow_mut().frame_count += 1;
        self.rendering_end.execute(&event)
    }

    fn flush_pending(&self) -> SceneResult<bool> {
        let pending = std::mem::take(&mut self.state.borrow_mut().to_collect);
        let mut added = false;
        for surface in pending {
            if self.tracks(&surface) {
                continue;
            }
            self.watch_surface(&surface);
            if self.is_eligible(&surface) {
                self.insert_draw_calls(&surface)?;
                added = true;
            }
        }
        Ok(added)
    }

    fn is_eligible(&self, surface: &Surface) -> bool {
        surface.base().target().is_some_and(|node| {
            node.layout().matches(surface.base().layout_mask(), self.base.layout_mask())
        })
    }

    /// Create draw calls for `surface` right away instead of at the next render
    ///
    /// Fails with [`SceneError::SurfaceAlreadyTracked`] if the surface
    /// already has draw calls in this renderer and with
    /// [`SceneError::SurfaceNotInScene`] if its node is not in the renderer's
    /// scene. A surface filtered out by layout is watched but gets no draw
    /// calls until its layout matches.
    pub fn add_surface(&self, surface: &Rc<Surface>) -> SceneResult<()> {
        if self.tracks(surface) {
            return Err(SceneError::SurfaceAlreadyTracked(surface.uuid()));
        }
        let same_scene = match (surface.base().target(), self.base.target()) {
            (Some(node), Some(target)) => node.root().ptr_eq(&target.root()),
            _ => false,
        };
        if !same_scene {
            return Err(SceneError::SurfaceNotInScene(surface.uuid()));
        }

        self.state.borrow_mut().to_collect.retain(|s| s.uuid() != surface.uuid());
        self.watch_surface(surface);
        if !self.is_eligible(surface) {
            return Ok(());
        }
        self.insert_draw_calls(surface)
    }

    fn insert_draw_calls(&self, surface: &Rc<Surface>) -> SceneResult<()> {
        let (Some(node), Some(target)) = (surface.base().target(), self.base.target()) else {
            return Ok(());
        };

        let (effect, technique, variables) = self.draw_call_inputs(surface);
        let data = DataBindings {
            root: Rc::clone(node.root().data()),
            renderer: Rc::clone(target.data()),
            target: Rc::clone(node.data()),
        };
        let id = self
            .pool
            .borrow_mut()
            .add_draw_calls(surface.uuid(), &effect, &technique, variables, data)?;
        self.state.borrow_mut().surface_to_group.insert(surface.uuid(), id);
        log::debug!("renderer {}: surface '{}' added", self.uuid, surface.name());
        Ok(())
    }

    fn draw_call_inputs(&self, surface: &Surface) -> (Rc<Effect>, String, Variables) {
        let state = self.state.borrow();
        let mut variables = surface.variables();
        variables.extend(state.variables.iter().map(|(k, v)| (k.clone(), v.clone())));
        match &state.effect {
            Some(effect) => {
                variables.insert("effectUuid".into(), effect.uuid().to_string());
                (Rc::clone(effect), state.effect_technique.clone(), variables)
            }
            None => (surface.effect(), surface.technique(), variables),
        }
    }

    fn remove_surface(&self, uuid: Uuid) {
        let id = self.state.borrow_mut().surface_to_group.remove(&uuid);
        if let Some(id) = id {
            self.pool.borrow_mut().remove_draw_calls(id);
            log::debug!("renderer {}: surface {} removed", self.uuid, uuid);
        }
    }

    fn invalidate_surface(&self, uuid: Uuid) {
        let id = self.state.borrow().surface_to_group.get(&uuid).copied();
        let Some(id) = id else { return };
        let surface = self.find_watched(uuid);
        if let Some(surface) = surface {
            let (_, _, variables) = self.draw_call_inputs(&surface);
            self.pool.borrow_mut().invalidate_draw_calls(id, variables);
        }
    }

    fn find_watched(&self, uuid: Uuid) -> Option<Rc<Surface>> {
        let target = self.base.target()?;
        NodeSet::new(&target.root())
            .descendants(true)
            .iter()
            .flat_map(Node::components_of::<Surface>)
            .find(|s| s.uuid() == uuid)
    }

    fn queue(&self, surface: &Rc<Surface>) {
        let mut state = self.state.borrow_mut();
        if !state.surface_to_group.contains_key(&surface.uuid()) && !state.is_pending(surface.uuid()) {
            state.to_collect.push(Rc::clone(surface));
        }
    }

    fn collect(&self, node: &Node) {
        for node in NodeSet::new(node).descendants(true) {
            for surface in node.components_of::<Surface>() {
                self.queue(&surface);
            }
        }
    }

    fn lose(&self, surface: &Surface) {
        let uuid = surface.uuid();
        let watches = {
            let mut state = self.state.borrow_mut();
            state.to_collect.retain(|s| s.uuid() != uuid);
            state.surface_watches.remove(&uuid)
        };
        drop(watches);
        self.remove_surface(uuid);
    }

    fn layout_changed(&self, surface: &Rc<Surface>) {
        let eligible = self.is_eligible(surface);
        let tracked = self.tracks(surface);
        if eligible && !tracked {
            self.queue(surface);
        } else if !eligible && tracked {
            self.remove_surface(surface.uuid());
        }
    }

    fn watch_surface(&self, surface: &Rc<Surface>) {
        if self.state.borrow().surface_watches.contains_key(&surface.uuid()) {
            return;
        }

        let watch = |signal: &Signal<SurfaceEvent>, action: fn(&Self, &Rc<Surface>) -> SceneResult<()>| {
            let renderer = self.self_ref.clone();
            let surface = Rc::downgrade(surface);
            signal.connect(move |_| match (renderer.upgrade(), surface.upgrade()) {
                (Some(renderer), Some(surface)) => action(&renderer, &surface),
                _ => Ok(()),
            })
        };

        let slots = vec![
            watch(surface.geometry_changed(), |r, s| {
                r.invalidate_surface(s.uuid());
                Ok(())
            }),
            watch(surface.material_changed(), |r, s| {
                r.invalidate_surface(s.uuid());
                Ok(())
            }),
            watch(surface.effect_changed(), |r, s| {
                r.remove_surface(s.uuid());
                r.queue(s);
                Ok(())
            }),
            watch(surface.technique_changed(), |r, s| {
                r.remove_surface(s.uuid());
                r.queue(s);
                Ok(())
            }),
        ];

        let renderer = self.self_ref.clone();
        let weak_surface = Rc::downgrade(surface);
        let mask_slot = surface.base().layout_mask_changed().connect(move |_| {
            if let (Some(renderer), Some(surface)) = (renderer.upgrade(), weak_surface.upgrade()) {
                renderer.layout_changed(&surface);
            }
            Ok(())
        });

        let mut all = slots;
        all.push(mask_slot);
        self.state.borrow_mut().surface_watches.insert(surface.uuid(), all);
    }

    fn watch_target(&self, target: &Node) {
        let on_move = |signal: &Signal<NodeEvent>| {
            let renderer = self.self_ref.clone();
            signal.connect(move |event| {
                let Some(renderer) = renderer.upgrade() else { return Ok(()) };
                let Some(target) = renderer.base.target() else { return Ok(()) };
                if is_ancestor_or_self(&event.target, &target) {
                    renderer.reset(&target)
                } else {
                    Ok(())
                }
            })
        };
        let moved_in = on_move(target.added());
        let moved_out = on_move(target.removed());

        let z_sort = Rc::clone(&self.must_z_sort);
        let camera = target.data().key_changed(WORLD_TO_SCREEN_MATRIX).connect(move |_| {
            z_sort.set(true);
            Ok(())
        });

        self.state.borrow_mut().target_slots = vec![moved_in, moved_out, camera];
    }

    fn watch_root(&self, root: &Node) -> SceneResult<()> {
        let renderer = self.self_ref.clone();
        let added = root.added().connect_with_priority(
            move |event| {
                if let Some(renderer) = renderer.upgrade() {
                    renderer.collect(&event.target);
                }
                Ok(())
            },
            f32::MAX,
        );

        let renderer = self.self_ref.clone();
        let removed = root.removed().connect_with_priority(
            move |event| {
                if let Some(renderer) = renderer.upgrade() {
                    for node in NodeSet::new(&event.target).descendants(true) {
                        for surface in node.components_of::<Surface>() {
                            renderer.lose(&surface);
                        }
                    }
                }
                Ok(())
            },
            f32::MAX,
        );

        let renderer = self.self_ref.clone();
        let component_added = root.component_added().connect_with_priority(
            move |event| {
                let Some(renderer) = renderer.upgrade() else { return Ok(()) };
                if let Some(surface) = downcast_component::<Surface>(&event.component) {
                    renderer.queue(&surface);
                } else if downcast_component::<SceneManager>(&event.component).is_some() {
                    renderer.discover_scene_manager()?;
                }
                Ok(())
            },
            f32::MAX,
        );

        let renderer = self.self_ref.clone();
        let component_removed = root.component_removed().connect_with_priority(
            move |event| {
                let Some(renderer) = renderer.upgrade() else { return Ok(()) };
                if let Some(surface) = downcast_component::<Surface>(&event.component) {
                    renderer.lose(&surface);
                } else if downcast_component::<SceneManager>(&event.component).is_some() {
                    renderer.discover_scene_manager()?;
                }
                Ok(())
            },
            f32::MAX,
        );

        let renderer = self.self_ref.clone();
        let layout = root.layout_changed().connect_with_priority(
            move |event| {
                if let Some(renderer) = renderer.upgrade() {
                    for surface in event.target.components_of::<Surface>() {
                        let watched = renderer.state.borrow().surface_watches.contains_key(&surface.uuid());
                        if watched {
                            renderer.layout_changed(&surface);
                        }
                    }
                }
                Ok(())
            },
            f32::MAX,
        );

        self.state.borrow_mut().root_slots = vec![added, removed, component_added, component_removed, layout];
        self.discover_scene_manager()?;
        self.collect(root);
        Ok(())
    }

    fn discover_scene_manager(&self) -> SceneResult<()> {
        let Some(target) = self.base.target() else { return Ok(()) };
        let managers: Vec<Rc<SceneManager>> = NodeSet::new(&target)
            .roots()
            .iter()
            .flat_map(Node::components_of::<SceneManager>)
            .collect();

        match managers.as_slice() {
            [] => self.unbind_scene_manager(),
            [scene_manager] => {
                let current = self.scene_manager();
                if current.is_some_and(|c| Rc::ptr_eq(&c, scene_manager)) {
                    return Ok(());
                }
                self.unbind_scene_manager()?;
                self.bind_scene_manager(scene_manager)
            }
            _ => Err(SceneError::MultipleSceneManagers(managers.len())),
        }
    }

    fn bind_scene_manager(&self, scene_manager: &Rc<SceneManager>) -> SceneResult<()> {
        let renderer = self.self_ref.clone();
        let priority = self.priority();
        let slot = scene_manager.frame_end().connect_with_priority(
            move |event: &FrameEvent| {
                let Some(renderer) = renderer.upgrade() else { return Ok(()) };
                let context = Rc::clone(event.scene_manager.assets().context());
                let mut context = context.try_borrow_mut().map_err(|_| SceneError::ContextBusy)?;
                renderer.render(&mut *context, event.render_target.clone())
            },
            priority,
        );

        let needs_quad = {
            let mut state = self.state.borrow_mut();
            state.scene_manager = Some(Rc::downgrade(scene_manager));
            state.frame_slot = Some(slot);
            state.post_processing.is_none()
        };
        if needs_quad {
            let quad = PostProcessing::new()?;
            self.state.borrow_mut().post_processing = Some(quad);
        }
        self.register_post_processing(true)?;
        log::debug!("renderer {}: bound to scene manager", self.uuid);
        Ok(())
    }

    fn unbind_scene_manager(&self) -> SceneResult<()> {
        let slot = {
            let mut state = self.state.borrow_mut();
            state.scene_manager = None;
            state.frame_slot.take()
        };
        drop(slot);
        self.register_post_processing(false)
    }

    fn register_post_processing(&self, register: bool) -> SceneResult<()> {
        let provider = {
            let state = self.state.borrow();
            if state.post_processing_registered == register {
                return Ok(());
            }
            state.post_processing.as_ref().map(|p| Rc::clone(&p.provider))
        };
        let (Some(provider), Some(target)) = (provider, self.base.target()) else {
            return Ok(());
        };

        if register {
            target.data().add_provider(&provider, None)?;
        } else {
            target.data().remove_provider(&provider, None)?;
        }
        self.state.borrow_mut().post_processing_registered = register;
        Ok(())
    }

    /// Geometry of the full-screen quad, built once a scene manager is found
    pub fn post_processing_geometry(&self) -> Option<Rc<Geometry>> {
        self.state.borrow().post_processing.as_ref().map(|p| Rc::clone(&p.geometry))
    }

    fn clear_scene(&self) -> SceneResult<()> {
        let (root_slots, watches) = {
            let mut state = self.state.borrow_mut();
            let root_slots = std::mem::take(&mut state.root_slots);
            let watches = std::mem::take(&mut state.surface_watches);
            state.forget_surfaces();
            (root_slots, watches)
        };
        drop(root_slots);
        drop(watches);
        self.pool.borrow_mut().clear();
        self.unbind_scene_manager()
    }

    fn reset(&self, target: &Node) -> SceneResult<()> {
        log::debug!("renderer {}: target moved, rescanning", self.uuid);
        self.clear_scene()?;
        self.watch_root(&target.root())
    }

    fn rescan(&self) -> SceneResult<()> {
        let Some(target) = self.base.target() else { return Ok(()) };
        let watches = {
            let mut state = self.state.borrow_mut();
            let watches = std::mem::take(&mut state.surface_watches);
            state.forget_surfaces();
            watches
        };
        drop(watches);
        self.pool.borrow_mut().clear();
        self.collect(&target.root());
        Ok(())
    }
}

fn to_extent(size: u32) -> i32 {
    i32::try_from(size).unwrap_or(i32::MAX)
}

fn is_ancestor_or_self(candidate: &Node, node: &Node) -> bool {
    let mut current = Some(node.clone());
    while let Some(n) = current {
        if n.ptr_eq(candidate) {
            return true;
        }
        current = n.parent();
    }
    false
}

impl Component for Renderer {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn target_added(&self, target: &Node) -> SceneResult<()> {
        if let Some(effect) = self.effect() {
            target.data().add_provider(effect.data(), Some(EFFECT_COLLECTION))?;
        }
        self.watch_target(target);
        if let Err(err) = self.watch_root(&target.root()) {
            self.detach(target)?;
            return Err(err);
        }
        log::debug!("renderer {} attached to '{}'", self.uuid, target.name());
        Ok(())
    }

    fn target_removed(&self, target: &Node) -> SceneResult<()> {
        self.detach(target)
    }

    fn type_name(&self) -> &'static str {
        "Renderer"
    }
}

impl Renderer {
    fn detach(&self, target: &Node) -> SceneResult<()> {
        let target_slots = std::mem::take(&mut self.state.borrow_mut().target_slots);
        drop(target_slots);
        self.clear_scene()?;

        let (provider, registered) = {
            let mut state = self.state.borrow_mut();
            let registered = std::mem::replace(&mut state.post_processing_registered, false);
            (state.post_processing.as_ref().map(|p| Rc::clone(&p.provider)), registered)
        };
        if let (Some(provider), true) = (provider, registered) {
            target.data().remove_provider(&provider, None)?;
        }
        if let Some(effect) = self.effect() {
            if target.data().has_provider(effect.data(), Some(EFFECT_COLLECTION)) {
                target.data().remove_provider(effect.data(), Some(EFFECT_COLLECTION))?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Renderer")
            .field("uuid", &self.uuid)
            .field("priority", &state.priority)
            .field("surfaces", &state.surface_to_group.len())
            .field("pending", &state.to_collect.len())
            .finish()
    }
}
