//! [`Backend`] on top of three.js.

use js_sys::{Array, Function, Object, Reflect};
use wasm_bindgen::{JsCast, prelude::*};
use web_sys::HtmlCanvasElement;

use super::three::{self, Uniforms};
use crate::{
    backend::{
        AnimationAction, AnimationHelper, AttachOptions, Backend, Controls, Effect, LoopMode,
        MmdLoader, Mixer, PoseOptions, Rect, SceneGraph, SkinnedMesh, Surface,
    },
    error::{Result, ViewerError},
    loader::{LoadCallbacks, LoadStream, callback_stream, with_guard},
    store::RendererInfo,
};

pub struct ThreeBackend;

impl Backend for ThreeBackend {
    type Mesh = three::SkinnedMesh;
    /// The parsed VPD object as returned by `MMDLoader.loadVPD`.
    type Pose = JsValue;
    type Clip = three::AnimationClip;
    type Mixer = three::AnimationMixer;
    type Surface = ThreeSurface;
    type Controls = three::OrbitControls;
    type Scene = three::Scene;
    type Helper = three::MMDAnimationHelper;
    type Loader = ThreeLoader;
}

fn js_error(e: JsValue) -> String {
    match e.dyn_ref::<js_sys::Error>() {
        Some(error) => String::from(error.message()),
        None => format!("{:?}", e),
    }
}

impl SkinnedMesh for three::SkinnedMesh {
    fn rest_pose(&self) {
        self.pose();
    }

    fn dispose_geometry(&self) {
        self.geometry().dispose();
    }

    fn dispose_materials(&self) {
        let material = self.material();
        let materials = if Array::is_array(&material) {
            Array::from(&material)
        } else {
            Array::of1(&material)
        };
        for material in materials.iter() {
            if material.is_undefined() || material.is_null() {
                continue;
            }
            // any property holding a texture: map, envMap, gradientMap, alphaMap, ...
            for value in Object::values(material.unchecked_ref::<Object>()).iter() {
                let is_texture = Reflect::get(&value, &"isTexture".into())
                    .map(|v| v.is_truthy())
                    .unwrap_or(false);
                if is_texture {
                    value.unchecked_into::<three::Texture>().dispose();
                }
            }
            material.unchecked_into::<three::Material>().dispose();
        }
    }

    fn dispose_skeleton(&self) {
        if let Some(skeleton) = self.skeleton() {
            if let Some(texture) = skeleton.bone_texture() {
                texture.dispose();
            }
            skeleton.dispose();
        }
    }
}

/// Renderer, camera and canvas.
pub struct ThreeSurface {
    pub renderer: three::WebGlRenderer,
    pub camera: three::PerspectiveCamera,
    canvas: HtmlCanvasElement,
}

impl ThreeSurface {
    pub fn new(renderer: three::WebGlRenderer, camera: three::PerspectiveCamera) -> Self {
        let canvas = renderer.dom_element();
        Self {
            renderer,
            camera,
            canvas,
        }
    }
}

impl Surface<ThreeBackend> for ThreeSurface {
    fn backing_height(&self) -> u32 {
        self.canvas.height()
    }

    fn parent_rect(&self) -> Rect {
        match self.canvas.parent_element() {
            Some(parent) => {
                let rect = parent.get_bounding_client_rect();
                Rect {
                    left: rect.left(),
                    top: rect.top(),
                    right: rect.right(),
                    bottom: rect.bottom(),
                }
            }
            None => {
                log::warn!("Canvas is not attached to the document.");
                Rect::default()
            }
        }
    }

    fn device_pixel_ratio(&self) -> f64 {
        web_sys::window().map_or(1.0, |w| w.device_pixel_ratio())
    }

    fn set_backing_size(&mut self, width: f64, height: f64) {
        self.renderer.set_size(width, height, false);
    }

    fn client_size(&self) -> (f64, f64) {
        (
            self.canvas.client_width() as f64,
            self.canvas.client_height() as f64,
        )
    }

    fn set_camera_aspect(&mut self, aspect: f64) {
        self.camera.set_aspect(aspect);
        self.camera.update_projection_matrix();
    }

    fn render(&mut self, scene: &three::Scene) {
        self.renderer.render(scene, &self.camera);
    }

    fn info(&self) -> RendererInfo {
        let info: JsValue = self.renderer.info().into();
        RendererInfo {
            geometries: three::number_at(&info, &["memory", "geometries"]),
            textures: three::number_at(&info, &["memory", "textures"]),
            calls: three::number_at(&info, &["render", "calls"]),
            triangles: three::number_at(&info, &["render", "triangles"]),
            points: three::number_at(&info, &["render", "points"]),
            lines: three::number_at(&info, &["render", "lines"]),
            frame: three::number_at(&info, &["render", "frame"]),
        }
    }
}

impl Controls for three::OrbitControls {
    fn update(&mut self) {
        three::OrbitControls::update(self);
    }

    fn save_state(&mut self) {
        three::OrbitControls::save_state(self);
    }

    fn reset(&mut self) {
        three::OrbitControls::reset(self);
    }
}

impl SceneGraph<ThreeBackend> for three::Scene {
    fn add_mesh(&mut self, mesh: &three::SkinnedMesh) {
        self.add(mesh);
    }

    fn remove_mesh(&mut self, mesh: &three::SkinnedMesh) {
        self.remove(mesh);
    }
}

impl AnimationHelper<ThreeBackend> for three::MMDAnimationHelper {
    fn add(&mut self, mesh: &three::SkinnedMesh, options: AttachOptions<three::AnimationClip>) {
        let clips: Array = options.clips.iter().collect();
        let mut entries = vec![
            ("animation", JsValue::from(clips)),
            ("physics", JsValue::from(options.physics)),
        ];
        if let Some(warmup) = options.warmup {
            entries.push(("warmup", warmup.into()));
        }
        if let Some(unit_step) = options.unit_step {
            entries.push(("unitStep", unit_step.into()));
        }
        if let Some(max_step_num) = options.max_step_num {
            entries.push(("maxStepNum", max_step_num.into()));
        }
        match three::object(&entries) {
            Ok(parameters) => three::MMDAnimationHelper::add(self, mesh, &parameters),
            Err(e) => log::error!("Cannot register mesh: {}", js_error(e)),
        }
    }

    fn remove(&mut self, mesh: &three::SkinnedMesh) {
        three::MMDAnimationHelper::remove(self, mesh);
    }

    fn mixer(&self, mesh: &three::SkinnedMesh) -> Result<three::AnimationMixer> {
        let not_registered = || ViewerError::ResourceNotRegistered("mixer".to_string());
        let entry = self.objects().get(mesh.unchecked_ref::<Object>());
        if entry.is_undefined() {
            return Err(not_registered());
        }
        let mixer = Reflect::get(&entry, &"mixer".into()).map_err(|_| not_registered())?;
        if mixer.is_undefined() || mixer.is_null() {
            return Err(not_registered());
        }
        Ok(mixer.unchecked_into())
    }

    fn pose(&mut self, mesh: &three::SkinnedMesh, pose: &JsValue, options: PoseOptions) {
        let parameters = three::object(&[
            ("resetPose", options.reset_pose.into()),
            ("ik", options.ik.into()),
            ("grant", options.grant.into()),
        ]);
        match parameters {
            Ok(parameters) => three::MMDAnimationHelper::pose(self, mesh, pose, &parameters),
            Err(e) => log::error!("Cannot apply pose: {}", js_error(e)),
        }
    }

    fn update(&mut self, delta: f64) {
        three::MMDAnimationHelper::update(self, delta);
    }
}

impl Mixer<ThreeBackend> for three::AnimationMixer {
    type Action = three::AnimationAction;

    fn stop_all_action(&self) {
        three::AnimationMixer::stop_all_action(self);
    }

    fn set_time(&self, seconds: f64) {
        three::AnimationMixer::set_time(self, seconds);
    }

    fn existing_action(&self, clip: &three::AnimationClip) -> Option<three::AnimationAction> {
        three::AnimationMixer::existing_action(self, clip)
    }
}

impl AnimationAction for three::AnimationAction {
    fn set_loop(&self, mode: LoopMode, repetitions: u32) {
        let mode = match mode {
            LoopMode::Once => three::LOOP_ONCE,
            LoopMode::Repeat => three::LOOP_REPEAT,
            LoopMode::PingPong => three::LOOP_PING_PONG,
        };
        three::AnimationAction::set_loop(self, mode, repetitions as f64);
    }

    fn reset(&self) {
        three::AnimationAction::reset(self);
    }

    fn play(&self) {
        three::AnimationAction::play(self);
    }
}

/// The three JS callbacks of one load. Dropped together with the stream they feed.
struct LoadClosures {
    _on_load: Closure<dyn FnMut(JsValue)>,
    _on_progress: Closure<dyn FnMut(JsValue)>,
    _on_error: Closure<dyn FnMut(JsValue)>,
}

/// Wire `callbacks` to three JS functions and call `start` with them.
fn start_load<T: 'static>(
    convert: impl Fn(JsValue) -> T + 'static,
    start: impl FnOnce(&Function, &Function, &Function),
) -> LoadStream<T> {
    let (callbacks, stream) = callback_stream::<T>();

    let sink: std::rc::Rc<LoadCallbacks<T>> = callbacks.clone();
    let on_load = Closure::<dyn FnMut(JsValue)>::new(move |value: JsValue| {
        sink.resolve(convert(value));
    });
    let sink = callbacks.clone();
    let on_progress = Closure::<dyn FnMut(JsValue)>::new(move |xhr: JsValue| {
        sink.progress(
            three::number_at(&xhr, &["loaded"]),
            three::number_at(&xhr, &["total"]),
        );
    });
    let sink = callbacks;
    let on_error = Closure::<dyn FnMut(JsValue)>::new(move |e: JsValue| {
        sink.reject(js_error(e));
    });

    start(
        on_load.as_ref().unchecked_ref(),
        on_progress.as_ref().unchecked_ref(),
        on_error.as_ref().unchecked_ref(),
    );
    with_guard(
        stream,
        LoadClosures {
            _on_load: on_load,
            _on_progress: on_progress,
            _on_error: on_error,
        },
    )
}

pub struct ThreeLoader {
    loader: three::MMDLoader,
}

impl ThreeLoader {
    pub fn new() -> Self {
        Self {
            loader: three::MMDLoader::new(),
        }
    }
}

impl Default for ThreeLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl MmdLoader<ThreeBackend> for ThreeLoader {
    fn load_model(&self, url: &str) -> LoadStream<three::SkinnedMesh> {
        start_load(
            |mesh| mesh.unchecked_into(),
            |on_load, on_progress, on_error| {
                self.loader.load(url, on_load, on_progress, on_error)
            },
        )
    }

    fn load_pose(&self, url: &str, unicode: bool) -> LoadStream<JsValue> {
        start_load(
            |vpd| vpd,
            |on_load, on_progress, on_error| {
                self.loader
                    .load_vpd(url, unicode, on_load, on_progress, on_error)
            },
        )
    }

    fn load_motion(&self, url: &str, mesh: &three::SkinnedMesh) -> LoadStream<three::AnimationClip> {
        start_load(
            |clip| clip.unchecked_into(),
            |on_load, on_progress, on_error| {
                self.loader
                    .load_animation(url, mesh, on_load, on_progress, on_error)
            },
        )
    }
}

/// The animated water surface.
pub struct Ocean {
    water: three::Water,
}

impl Ocean {
    pub fn new(water: three::Water) -> Self {
        Self { water }
    }
}

impl Effect for Ocean {
    fn advance(&mut self, delta: f64) {
        let time = self
            .water
            .uniform("time")
            .ok()
            .and_then(|t| t.as_f64())
            .unwrap_or(0.0);
        if let Err(e) = self.water.set_uniform("time", &(time + delta).into()) {
            log::warn!("Cannot advance ocean time: {}", js_error(e));
        }
    }
}
