//! End-to-end tests driving whole scenes through a recording context

use scene_engine::component::{PerspectiveCamera, Renderer, SceneManager, Surface, Transform};
use scene_engine::config::RendererConfig;
use scene_engine::data::Provider;
use scene_engine::foundation::math::{Mat4, Vec3};
use scene_engine::render::{
    Binding, ContextCommand, Effect, Geometry, Material, Pass, RecordingContext, Technique, VertexBuffer,
};
use scene_engine::scene::{Component, Layout, Node};
use scene_engine::assets::AssetLibrary;
use scene_engine::SceneError;
use std::cell::RefCell;
use std::rc::Rc;

struct Scene {
    context: Rc<RefCell<RecordingContext>>,
    root: Node,
    camera: Node,
    scene_manager: Rc<SceneManager>,
}

impl Scene {
    fn new() -> Self {
        let (context, handle) = RecordingContext::shared(800, 600);
        let root = Node::new("root");
        let scene_manager = SceneManager::new(AssetLibrary::new(handle));
        root.add_component(scene_manager.clone()).unwrap();

        let camera = Node::new("camera");
        camera.add_component(Transform::with_matrix(Mat4::new_translation(&Vec3::new(0.0, 0.0, 10.0)))).unwrap();
        camera.add_component(PerspectiveCamera::new(45.0, 800.0 / 600.0, 0.1, 1000.0)).unwrap();
        root.add_child(&camera).unwrap();

        Self { context, root, camera, scene_manager }
    }

    fn renderer(&self, priority: f32) -> Rc<Renderer> {
        let config = RendererConfig { priority, ..RendererConfig::default() };
        let renderer = Renderer::from_config(&config);
        self.camera.add_component(renderer.clone()).unwrap();
        renderer
    }

    fn tick(&self) {
        self.scene_manager.next_frame(0.0, None).unwrap();
    }

    fn count(&self, predicate: impl Fn(&ContextCommand) -> bool) -> usize {
        self.context.borrow().count(predicate)
    }
}

fn triangle() -> Rc<Geometry> {
    let buffer = VertexBuffer::new(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    buffer.add_attribute("position", 3, 0);
    let geometry = Geometry::new("triangle");
    geometry.add_vertex_buffer(buffer).unwrap();
    geometry
}

fn basic_effect() -> Rc<Effect> {
    Effect::with_passes(
        "basic",
        [Pass::new("color", "basic")
            .uniform("uModel", Binding::target("modelToWorldMatrix"))
            .uniform("uView", Binding::renderer("viewMatrix"))
            .uniform("uColor", Binding::target("material[${materialUuid}].diffuseColor").or_default(1.0_f32))
            .attribute("aPosition", Binding::target("geometry[${geometryUuid}].position"))],
    )
}

fn surface(name: &str) -> Rc<Surface> {
    let material = Material::new("red");
    material.set("diffuseColor", 0.25_f32).unwrap();
    Surface::new(name, triangle(), material, basic_effect())
}

#[test]
fn test_unset_fires_removed_once() {
    let provider = Provider::with_values([("a", 1.0_f32)]);
    let removed = Rc::new(RefCell::new(Vec::new()));
    let r = Rc::clone(&removed);
    let _slot = provider.property_removed().connect(move |event| {
        r.borrow_mut().push(event.name.clone());
        Ok(())
    });

    assert!(provider.unset("a").unwrap());
    assert!(!provider.unset("a").unwrap());
    assert!(!provider.has_property("a"));
    assert_eq!(*removed.borrow(), vec!["a".to_string()]);
}

#[test]
fn test_single_surface_frame() {
    let scene = Scene::new();
    let renderer = scene.renderer(0.0);

    let group = Node::new("groupA");
    group.add_component(Transform::with_matrix(Mat4::new_translation(&Vec3::new(1.0, 0.0, 0.0)))).unwrap();
    let node = Node::new("nodeX");
    let surface = surface("x");
    node.add_component(surface.clone()).unwrap();
    group.add_child(&node).unwrap();
    scene.root.add_child(&group).unwrap();

    scene.tick();

    assert_eq!(renderer.pool().num_groups(), 1);
    assert_eq!(scene.count(|c| matches!(c, ContextCommand::Clear(_))), 1);
    assert_eq!(scene.count(|c| matches!(c, ContextCommand::Viewport(_))), 1);
    assert_eq!(scene.count(|c| matches!(c, ContextCommand::Draw(_))), 1);
    assert_eq!(scene.count(|c| matches!(c, ContextCommand::Present)), 1);

    let context = scene.context.borrow();
    let draw = context.draws()[0].clone();
    assert_eq!(draw.surface, surface.uuid());
    assert_eq!(draw.vertex_count, 3);
    assert_eq!(draw.uniform("uColor"), Some(&0.25_f32.into()));
    assert!(draw.uniform("uView").is_some());
    assert_eq!(draw.attributes.len(), 1);
}

#[test]
fn test_add_then_remove_surface_empties_pool() {
    let scene = Scene::new();
    let renderer = scene.renderer(0.0);
    let node = Node::new("mesh");
    scene.root.add_child(&node).unwrap();

    let surface = surface("s");
    node.add_component(surface.clone()).unwrap();
    scene.tick();
    assert_eq!(renderer.pool().len(), 1);

    node.remove_component(&surface).unwrap();
    assert!(renderer.pool().is_empty());
    assert_eq!(renderer.num_surfaces(), 0);

    scene.tick();
    assert_eq!(scene.count(|c| matches!(c, ContextCommand::Draw(_))), 1);
}

#[test]
fn test_readding_surface_fails() {
    let scene = Scene::new();
    let renderer = scene.renderer(0.0);
    let node = Node::new("mesh");
    let surface = surface("s");
    node.add_component(surface.clone()).unwrap();
    scene.root.add_child(&node).unwrap();
    scene.tick();

    assert!(matches!(renderer.add_surface(&surface), Err(SceneError::SurfaceAlreadyTracked(_))));
    assert_eq!(renderer.pool().num_groups(), 1);
}

#[test]
fn test_sort_is_idempotent() {
    let scene = Scene::new();
    let renderer = scene.renderer(0.0);
    for z in [-3.0, 2.0, -8.0, 0.5] {
        let node = Node::new(format!("mesh{z}"));
        node.add_component(Transform::with_matrix(Mat4::new_translation(&Vec3::new(0.0, 0.0, z)))).unwrap();
        node.add_component(surface("s")).unwrap();
        scene.root.add_child(&node).unwrap();
    }
    scene.tick();

    let first = renderer.pool().order().to_vec();
    scene.tick();
    assert_eq!(renderer.pool().order(), first.as_slice());
}

#[test]
fn test_material_change_only_invalidates() {
    let scene = Scene::new();
    let renderer = scene.renderer(0.0);
    let node = Node::new("mesh");
    let surface = surface("s");
    node.add_component(surface.clone()).unwrap();
    scene.root.add_child(&node).unwrap();
    scene.tick();
    let before = renderer.stats();

    let blue = Material::new("blue");
    blue.set("diffuseColor", 0.75_f32).unwrap();
    surface.set_material(blue).unwrap();

    let after = renderer.stats();
    assert_eq!(after.invalidations, before.invalidations + 1);
    assert_eq!(after.adds, before.adds);
    assert_eq!(after.removes, before.removes);

    scene.tick();
    let context = scene.context.borrow();
    let last = context.draws().last().cloned().unwrap();
    assert_eq!(last.uniform("uColor"), Some(&0.75_f32.into()));
}

#[test]
fn test_two_scene_managers_is_an_error() {
    let scene = Scene::new();
    let _renderer = scene.renderer(0.0);
    let (_, handle) = RecordingContext::shared(8, 8);

    let result = scene.root.add_component(SceneManager::new(AssetLibrary::new(handle)));
    assert!(matches!(result, Err(SceneError::MultipleSceneManagers(2))));
}

#[test]
fn test_no_scene_manager_no_render() {
    let (context, _) = RecordingContext::shared(64, 64);
    let root = Node::new("root");
    let renderer = Renderer::new();
    root.add_component(renderer.clone()).unwrap();
    let mesh = Node::new("mesh");
    mesh.add_component(surface("s")).unwrap();
    root.add_child(&mesh).unwrap();

    assert!(renderer.scene_manager().is_none());
    renderer.render(&mut *context.borrow_mut(), None).unwrap();
    assert!(context.borrow().commands().is_empty());
    assert_eq!(renderer.num_surfaces(), 0);
}

#[test]
fn test_renderer_priority_orders_frames() {
    let scene = Scene::new();
    let low = scene.renderer(0.0);
    let high = scene.renderer(10.0);

    let order = Rc::new(RefCell::new(Vec::new()));
    let o = Rc::clone(&order);
    let _low = low.rendering_begin().connect(move |_| { o.borrow_mut().push("R2"); Ok(()) });
    let o = Rc::clone(&order);
    let _high = high.rendering_begin().connect(move |_| { o.borrow_mut().push("R1"); Ok(()) });

    scene.tick();
    assert_eq!(*order.borrow(), vec!["R1", "R2"]);
    assert_eq!(scene.count(|c| matches!(c, ContextCommand::Present)), 2);
}

#[test]
fn test_layout_mask_toggle_removes_surface() {
    let scene = Scene::new();
    let renderer = scene.renderer(0.0);
    let node = Node::new("mesh");
    let surface = surface("s");
    node.add_component(surface.clone()).unwrap();
    scene.root.add_child(&node).unwrap();
    scene.tick();
    assert!(renderer.tracks(&surface));

    surface.base().set_layout_mask(Layout::DEBUG_ONLY).unwrap();
    scene.tick();
    assert!(!renderer.tracks(&surface));
    assert_eq!(scene.count(|c| matches!(c, ContextCommand::Draw(_))), 1);

    surface.base().set_layout_mask(Layout::EVERYTHING).unwrap();
    scene.tick();
    assert!(renderer.tracks(&surface));
    assert_eq!(scene.count(|c| matches!(c, ContextCommand::Draw(_))), 2);
}

#[test]
fn test_hidden_nodes_skipped_by_renderer_mask() {
    let scene = Scene::new();
    let config = RendererConfig { layout_mask: Layout::DEFAULT.bits(), ..RendererConfig::default() };
    let renderer = Renderer::from_config(&config);
    scene.camera.add_component(renderer.clone()).unwrap();

    let visible = Node::new("visible");
    visible.add_component(surface("v")).unwrap();
    let hidden = Node::new("hidden");
    hidden.set_layout(Layout::HIDDEN).unwrap();
    hidden.add_component(surface("h")).unwrap();
    scene.root.add_child(&visible).unwrap();
    scene.root.add_child(&hidden).unwrap();
    scene.tick();

    assert_eq!(renderer.num_surfaces(), 1);
    hidden.set_layout(Layout::DEFAULT | Layout::HIDDEN).unwrap();
    scene.tick();
    assert_eq!(renderer.num_surfaces(), 2);
}

fn tracked_scene() -> (Scene, Rc<Renderer>, Rc<Surface>) {
    let scene = Scene::new();
    let renderer = scene.renderer(0.0);
    let node = Node::new("mesh");
    let surface = surface("s");
    node.add_component(surface.clone()).unwrap();
    scene.root.add_child(&node).unwrap();
    scene.tick();
    assert!(renderer.tracks(&surface));
    (scene, renderer, surface)
}

fn last_program(scene: &Scene) -> String {
    let context = scene.context.borrow();
    context.draws().last().map(|d| d.program.clone()).unwrap()
}

#[test]
fn test_renderer_layout_mask_toggle() {
    let (scene, renderer, surface) = tracked_scene();

    renderer.base().set_layout_mask(Layout::DEBUG_ONLY).unwrap();
    assert!(renderer.pool().is_empty());
    scene.tick();
    assert!(!renderer.tracks(&surface));
    assert_eq!(scene.count(|c| matches!(c, ContextCommand::Draw(_))), 1);

    renderer.base().set_layout_mask(Layout::EVERYTHING).unwrap();
    scene.tick();
    assert!(renderer.tracks(&surface));
    assert_eq!(scene.count(|c| matches!(c, ContextCommand::Draw(_))), 2);
}

#[test]
fn test_geometry_change_only_invalidates() {
    let (scene, renderer, surface) = tracked_scene();
    let before = renderer.stats();

    surface.set_geometry(triangle()).unwrap();

    let after = renderer.stats();
    assert_eq!(after.invalidations, before.invalidations + 1);
    assert_eq!(after.adds, before.adds);
    assert_eq!(after.removes, before.removes);
    scene.tick();
    assert_eq!(scene.context.borrow().draws().last().map(|d| d.vertex_count), Some(3));
}

#[test]
fn test_effect_change_rebuilds_draw_calls() {
    let (scene, renderer, surface) = tracked_scene();
    let before = renderer.stats();

    surface.set_effect(basic_effect()).unwrap();
    assert_eq!(renderer.stats().removes, before.removes + 1);
    assert!(!renderer.tracks(&surface));

    scene.tick();
    assert_eq!(renderer.stats().adds, before.adds + 1);
    assert!(renderer.tracks(&surface));
}

#[test]
fn test_technique_change_rebuilds_draw_calls() {
    let (scene, renderer, surface) = tracked_scene();
    surface.effect().add_technique("wireframe", Technique::new([Pass::new("wire", "wire")]));
    let before = renderer.stats();

    surface.set_technique("wireframe").unwrap();
    assert_eq!(renderer.stats().removes, before.removes + 1);

    scene.tick();
    assert_eq!(renderer.stats().adds, before.adds + 1);
    assert_eq!(last_program(&scene), "wire");
}

#[test]
fn test_renderer_effect_override_and_back() {
    let (scene, renderer, surface) = tracked_scene();
    assert_eq!(last_program(&scene), "basic");

    let over = Effect::with_passes("flat", [Pass::new("flat", "flat")]);
    renderer.set_effect(Some(over), "default").unwrap();
    scene.tick();
    assert!(renderer.tracks(&surface));
    assert_eq!(last_program(&scene), "flat");

    renderer.set_effect(None, "default").unwrap();
    scene.tick();
    assert_eq!(last_program(&scene), "basic");
}

#[test]
fn test_renderer_variable_invalidates_tracked_surfaces() {
    let (_scene, renderer, _surface) = tracked_scene();
    let before = renderer.stats();

    renderer.set_variable("lightUuid", "sun");
    assert_eq!(renderer.stats().invalidations, before.invalidations + 1);
    assert_eq!(renderer.variables()["lightUuid"], "sun");
}

#[test]
fn test_set_priority_reorders_frames() {
    let scene = Scene::new();
    let first = scene.renderer(10.0);
    let second = scene.renderer(0.0);

    let order = Rc::new(RefCell::new(Vec::new()));
    let o = Rc::clone(&order);
    let _first = first.rendering_begin().connect(move |_| { o.borrow_mut().push("first"); Ok(()) });
    let o = Rc::clone(&order);
    let _second = second.rendering_begin().connect(move |_| { o.borrow_mut().push("second"); Ok(()) });

    scene.tick();
    second.set_priority(20.0).unwrap();
    scene.tick();
    assert_eq!(*order.borrow(), vec!["first", "second", "second", "first"]);
}

