//! Native 3D viewer
//!
//! Opens a three-d window and drives a `SceneContext` from its render loop:
//! window events feed the camera and picking, every frame ticks the scene
//! and redraws buildings and blocks as instanced cubes.
//!
//! Controls: left-drag orbit, wheel zoom, arrows/WASD step yaw and height,
//! 1-9 focus an entity, Enter pick at the view centre, R reload the
//! snapshot, F toggle free-look, Home reset, P screenshot, Esc quit.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use three_d::*;
use tracing::{debug, info, warn};

use crate::camera::CameraKey;
use crate::color::{self, Color};
use crate::config::Config;
use crate::picking::{PickEvent, PickResult, PickTarget};
use crate::scene::SceneContext;
use crate::source;

/// Thickness of the base/roof plates and corner posts
const FRAME_THICKNESS: f32 = 0.08;

const FOCUS_KEYS: [Key; 9] = [
    Key::Num1,
    Key::Num2,
    Key::Num3,
    Key::Num4,
    Key::Num5,
    Key::Num6,
    Key::Num7,
    Key::Num8,
    Key::Num9,
];

type Part = (Mat4, Color);

type Cubes = Gm<InstancedMesh, ColorMaterial>;

/// Run the native viewer on a snapshot file, optionally aimed at one entity
pub fn run_viewer(config: Config, snapshot: PathBuf, focus: Option<String>) -> anyhow::Result<()> {
    let entities = source::load_snapshot(&snapshot)?;
    info!("Launching viewer with {} entities from {:?}", entities.len(), snapshot);

    let window = Window::new(WindowSettings {
        title: "Data Skyline".to_string(),
        max_size: Some((1280, 800)),
        ..Default::default()
    })?;
    let context = window.gl();

    let mut scene = SceneContext::new(config);
    scene.set_pick_handler(Box::new(|event: &PickEvent| {
        info!("Pick delivered: {}/{}", event.entity_id, event.record_id);
        match serde_json::to_string_pretty(event) {
            Ok(json) => println!("{}", json),
            Err(e) => warn!("Failed to serialize pick event: {}", e),
        }
    }));
    scene.mount(entities);
    print_overview(&scene);
    if let Some(name) = focus {
        scene.focus_entity(&name);
    }

    let lens = scene.camera().config().clone();
    let mut camera = Camera::new_perspective(
        window.viewport(),
        vec3(0.0, 30.0, 60.0),
        vec3(0.0, 0.0, 0.0),
        vec3(0.0, 1.0, 0.0),
        degrees(lens.fov_degrees),
        lens.near,
        lens.far,
    );
    let cube = CpuMesh::cube();
    let mut buildings: Option<Cubes> = None;
    let mut blocks: Option<Cubes> = None;

    window.render_loop(move |frame_input| {
        let viewport = frame_input.viewport;
        scene.set_viewport(viewport.width as f32, viewport.height as f32);

        let mut exit = false;
        let mut screenshot = false;

        for event in frame_input.events.iter() {
            match event {
                Event::MousePress {
                    button: MouseButton::Left,
                    position,
                    ..
                } => {
                    let (x, y) = to_screen(position, viewport);
                    scene.pointer_down(x, y);
                }
                Event::MouseMotion { button, position, .. } => {
                    if button.is_none() && scene.camera().is_dragging() {
                        // The release happened outside the window
                        scene.pointer_cancel();
                    } else {
                        let (x, y) = to_screen(position, viewport);
                        scene.pointer_move(x, y);
                    }
                }
                Event::MouseRelease {
                    button: MouseButton::Left,
                    position,
                    ..
                } => {
                    let (x, y) = to_screen(position, viewport);
                    if !scene.pointer_up(x, y).is_hit() {
                        debug!("Release at ({:.0}, {:.0}) picked nothing", x, y);
                    }
                }
                Event::MouseWheel { delta, .. } => scene.wheel(-delta.1),
                Event::KeyPress { kind, .. } => match kind {
                    Key::Escape => {
                        scene.teardown();
                        exit = true;
                    }
                    Key::R => reload(&mut scene, &snapshot),
                    Key::Enter => pick_centre(&mut scene),
                    Key::F => {
                        scene.toggle_free_look();
                    }
                    Key::P => screenshot = true,
                    other => {
                        if let Some(key) = camera_key(other) {
                            scene.key(key);
                        } else if let Some(i) = FOCUS_KEYS.iter().position(|k| k == other) {
                            focus_nth(&mut scene, i);
                        }
                    }
                },
                _ => {}
            }
        }

        if exit {
            return FrameOutput {
                exit: true,
                ..Default::default()
            };
        }

        scene.tick(frame_input.accumulated_time / 1000.0);

        let state = scene.camera().state();
        camera.set_viewport(viewport);
        camera.set_view(to_vec3(state.eye), to_vec3(state.target), vec3(0.0, 1.0, 0.0));

        sync_instances(&mut buildings, &context, &cube, building_parts(&scene));
        sync_instances(&mut blocks, &context, &cube, block_parts(&scene));

        frame_input
            .screen()
            .clear(ClearState::color_and_depth(0.06, 0.07, 0.1, 1.0, 1.0));

        for obj in buildings.iter().chain(blocks.iter()) {
            obj.render(&camera, &[]);
        }

        if screenshot {
            save_screenshot(&frame_input);
        }

        FrameOutput::default()
    });

    Ok(())
}

/// Window positions have their origin at the bottom-left; the scene works
/// from the top-left
fn to_screen(position: &PhysicalPoint, viewport: Viewport) -> (f32, f32) {
    (position.x, viewport.height as f32 - position.y)
}

fn to_vec3(v: glam::Vec3) -> Vec3 {
    vec3(v.x, v.y, v.z)
}

fn camera_key(key: &Key) -> Option<CameraKey> {
    match key {
        Key::ArrowLeft | Key::A => Some(CameraKey::YawLeft),
        Key::ArrowRight | Key::D => Some(CameraKey::YawRight),
        Key::ArrowUp | Key::W => Some(CameraKey::Raise),
        Key::ArrowDown | Key::S => Some(CameraKey::Lower),
        Key::Home => Some(CameraKey::Reset),
        _ => None,
    }
}

fn focus_nth(scene: &mut SceneContext, index: usize) {
    if !scene.focus(PickTarget::Building { entity: index }) {
        info!("No entity bound to focus key {}", index + 1);
    }
}

/// Keyboard pick through the middle of the view
fn pick_centre(scene: &mut SceneContext) {
    let vp = scene.viewport();
    if let PickResult::Hit(event) = scene.pick_at(vp.width / 2.0, vp.height / 2.0) {
        debug!("Centre pick on {}/{}", event.entity_id, event.record_id);
    } else {
        info!("Nothing under the view centre");
    }
}

fn reload(scene: &mut SceneContext, snapshot: &Path) {
    let entities = match source::load_snapshot(snapshot) {
        Ok(entities) => entities,
        Err(e) => {
            warn!("Reload failed, keeping the current scene: {}", e);
            return;
        }
    };
    if let PickResult::Hit(event) = scene.last_pick() {
        debug!("Reload clears selection {}/{}", event.entity_id, event.record_id);
    }

    let known: HashSet<&str> = scene.graph().visuals().iter().map(|v| v.name.as_str()).collect();
    let created = entities.iter().any(|e| !known.contains(e.name.as_str()));
    if created {
        scene.acknowledge_created(entities);
    } else {
        scene.refresh(entities);
    }
    print_overview(scene);
}

fn print_overview(scene: &SceneContext) {
    println!("Entities ({}), {} records total:", scene.graph().visuals().len(), scene.total_records());
    for (i, (visual, summary)) in scene.graph().visuals().iter().zip(scene.summaries()).enumerate() {
        let key = if i < FOCUS_KEYS.len() {
            format!("[{}]", i + 1)
        } else {
            "   ".to_string()
        };
        println!("  {} {}  updated {}", key, visual.label, summary.last_updated);
    }
}

/// Base plate, roof plate, four corner posts and a label beacon per building
fn building_parts(scene: &SceneContext) -> Vec<Part> {
    let mut parts = Vec::new();
    for visual in scene.graph().visuals() {
        let p = visual.placement.position;
        let h = visual.roof_height;
        let half_w = visual.footprint.x / 2.0;
        let half_d = visual.footprint.y / 2.0;
        let t = FRAME_THICKNESS;

        let frame = Mat4::from_translation(vec3(p.x, p.y, p.z)) * Mat4::from_angle_y(radians(visual.yaw));
        let piece = |local: Vec3, half: Vec3| {
            frame * Mat4::from_translation(local) * Mat4::from_nonuniform_scale(half.x, half.y, half.z)
        };

        let base = visual.color.map(|c| c * 0.5);
        parts.push((piece(vec3(0.0, t / 2.0, 0.0), vec3(half_w, t / 2.0, half_d)), base));
        parts.push((piece(vec3(0.0, h, 0.0), vec3(half_w, t / 2.0, half_d)), visual.color));

        for (sx, sz) in [(-1.0, -1.0), (-1.0, 1.0), (1.0, -1.0), (1.0, 1.0)] {
            let local = vec3(sx * half_w, h / 2.0, sz * half_d);
            parts.push((piece(local, vec3(t / 2.0, h / 2.0, t / 2.0)), visual.color));
        }

        // Beacon where the label hangs, so buildings read from a distance
        let beacon = to_vec3(visual.label_position());
        parts.push((
            Mat4::from_translation(beacon) * Mat4::from_scale(t * 2.0),
            color::brighten(visual.color, 0.5),
        ));
    }
    parts
}

fn block_parts(scene: &SceneContext) -> Vec<Part> {
    let half = scene.config().layout.block_size / 2.0;
    let animation = &scene.config().animation;
    scene
        .graph()
        .blocks()
        .iter()
        .map(|block| {
            let tf = block.transform;
            let m = Mat4::from_translation(to_vec3(tf.position))
                * Mat4::from_angle_y(radians(tf.yaw))
                * Mat4::from_scale(half * tf.scale);
            (m, block.color(animation))
        })
        .collect()
}

/// Upload this frame's parts, creating the instanced mesh on first use
fn sync_instances(slot: &mut Option<Cubes>, context: &Context, mesh: &CpuMesh, parts: Vec<Part>) {
    if parts.is_empty() {
        *slot = None;
        return;
    }
    let (transformations, colors): (Vec<Mat4>, Vec<Srgba>) = parts
        .into_iter()
        .map(|(m, c)| {
            let [r, g, b] = color::to_rgb8(c);
            (m, Srgba::new(r, g, b, 255))
        })
        .unzip();

    let instances = Instances {
        transformations,
        colors: Some(colors),
        ..Default::default()
    };
    match slot {
        Some(cubes) => cubes.geometry.set_instances(&instances),
        None => {
            *slot = Some(Gm::new(
                InstancedMesh::new(context, &instances, mesh),
                ColorMaterial::default(),
            ))
        }
    }
}

fn save_screenshot(frame_input: &FrameInput) {
    let vp = frame_input.viewport;
    let pixels: Vec<[u8; 4]> = frame_input.screen().read_color();
    let flat: Vec<u8> = pixels.iter().flat_map(|p| p.iter().copied()).collect();

    let dir = Path::new("screenshots");
    if let Err(e) = std::fs::create_dir_all(dir) {
        warn!("Cannot create {}: {}", dir.display(), e);
        return;
    }
    let path = dir.join(format!("skyline-{}.png", chrono::Local::now().format("%Y%m%d-%H%M%S")));

    match image::RgbaImage::from_raw(vp.width, vp.height, flat) {
        Some(img) => match img.save(&path) {
            Ok(()) => info!("Saved screenshot {}", path.display()),
            Err(e) => warn!("Failed to save {}: {}", path.display(), e),
        },
        None => warn!("Screenshot buffer does not match the {}x{} viewport", vp.width, vp.height),
    }
}
