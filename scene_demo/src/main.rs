//! Headless scene demo
//!
//! Builds a small scene (a camera, a few triangles and a debug marker),
//! drives it for `frame_count` frames through a [`RecordingContext`] and logs
//! what every frame submitted.
//!
//! Usage: `scene_demo [config.toml|config.ron]`

use scene_engine::foundation::logging;
use scene_engine::prelude::*;
use scene_engine::render::ContextCommand;
use std::cell::RefCell;
use std::rc::Rc;

const DEFAULT_CONFIG: &str = "scene_demo/scene_demo.toml";

struct Demo {
    context: Rc<RefCell<RecordingContext>>,
    scene_manager: Rc<SceneManager>,
    spinner: Rc<Transform>,
    config: EngineConfig,
}

fn main() {
    let path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = match EngineConfig::load_or_default(&path).and_then(|c| c.validate().map(|()| c)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid configuration {path}: {err}");
            std::process::exit(2);
        }
    };
    logging::init_with_config(&config);

    if let Err(err) = build(config).and_then(|demo| run(&demo)) {
        log::error!("scene demo failed: {err}");
        std::process::exit(1);
    }
}

fn register_assets(assets: &AssetLibrary) -> SceneResult<()> {
    let buffer = VertexBuffer::new(vec![
        0.0, 0.5, 0.0, 0.5, 1.0, //
        -0.5, -0.5, 0.0, 0.0, 0.0, //
        0.5, -0.5, 0.0, 1.0, 0.0,
    ]);
    buffer.add_attribute("position", 3, 0);
    buffer.add_attribute("uv", 2, 3);
    let triangle = Geometry::new("triangle");
    triangle.add_vertex_buffer(buffer)?;
    assets.set_geometry("triangle", triangle);

    let basic = Effect::new("basic");
    basic.add_technique(
        "default",
        Technique::new([Pass::new("color", "basic")
            .uniform("uModelToWorld", Binding::target("modelToWorldMatrix"))
            .uniform("uWorldToScreen", Binding::renderer("worldToScreenMatrix"))
            .uniform("uDiffuse", Binding::target("material[${materialUuid}].diffuseColor").or_default(Vec3::new(1.0, 1.0, 1.0)))
            .attribute("aPosition", Binding::target("geometry[${geometryUuid}].position"))
            .define("HAS_UV", Binding::target("geometry[${geometryUuid}].uv").or_default(false))]),
    );
    basic.add_technique("wireframe", Technique::new([]).with_fallback("default"));
    assets.set_effect("basic", basic);

    for (name, color, z_sorted) in [("red", Vec3::new(1.0, 0.0, 0.0), false), ("glass", Vec3::new(0.6, 0.8, 1.0), true)] {
        let material = Material::new(name);
        material.set("diffuseColor", color)?;
        material.set("zSorted", z_sorted)?;
        assets.set_material(name, material);
    }
    Ok(())
}

fn mesh(assets: &AssetLibrary, name: &str, material: &str, offset: Vec3) -> SceneResult<Node> {
    let node = Node::new(name);
    node.add_component(Transform::with_matrix(Mat4::new_translation(&offset)))?;
    node.add_component(Surface::new(
        name,
        assets.get_geometry("triangle")?,
        assets.get_material(material)?,
        assets.get_effect("basic")?,
    ))?;
    Ok(node)
}

fn build(config: EngineConfig) -> SceneResult<Demo> {
    let (context, handle) = RecordingContext::shared(1280, 720);
    let assets = AssetLibrary::new(handle);
    register_assets(&assets)?;

    let root = Node::new("root");
    let scene_manager = SceneManager::new(Rc::clone(&assets));
    root.add_component(scene_manager.clone())?;

    let camera = Node::new("camera");
    camera.add_component(Transform::with_matrix(Mat4::new_translation(&Vec3::new(0.0, 0.0, 5.0))))?;
    camera.add_component(PerspectiveCamera::new(60.0, 1280.0 / 720.0, 0.1, 100.0))?;
    for renderer in &config.renderers {
        camera.add_component(Renderer::from_config(renderer))?;
    }
    root.add_child(&camera)?;

    let spinner_node = mesh(&assets, "spinner", "red", Vec3::new(0.0, 0.0, 0.0))?;
    let spinner = spinner_node
        .component::<Transform>()
        .ok_or_else(|| SceneError::ComponentNotFound(spinner_node.name()))?;
    root.add_child(&spinner_node)?;
    root.add_child(&mesh(&assets, "pane", "glass", Vec3::new(0.5, 0.0, 1.0))?)?;

    let marker = mesh(&assets, "marker", "red", Vec3::new(-1.0, 1.0, 0.0))?;
    marker.set_layout(Layout::DEBUG_ONLY)?;
    root.add_child(&marker)?;

    log::info!("scene built: {} renderers, {} nodes", config.renderers.len(), NodeSet::new(&root).descendants(true).len());
    Ok(Demo { context, scene_manager, spinner, config })
}

fn run(demo: &Demo) -> SceneResult<()> {
    let mut time = 0.0_f32;
    for _ in 0..demo.config.frame_count {
        demo.spinner.set_matrix(Mat4::new_rotation(Vec3::new(0.0, time, 0.0)));
        demo.scene_manager.next_frame(time, None)?;

        let commands = demo.context.borrow_mut().take_commands();
        let draws: Vec<String> = commands
            .iter()
            .filter_map(|c| match c {
                ContextCommand::Draw(submission) => {
                    Some(format!("{}({} vertices)", submission.program, submission.vertex_count))
                }
                _ => None,
            })
            .collect();
        log::info!(
            "frame {}: {} commands, {} draws [{}]",
            demo.scene_manager.frame_id(),
            commands.len(),
            draws.len(),
            draws.join(", ")
        );
        time += demo.config.frame_time;
    }
    Ok(())
}
