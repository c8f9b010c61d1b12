//! wasm-bindgen declarations of the three.js objects the viewer touches.
//!
//! The page is expected to expose three.js as the global `THREE`, with the
//! example modules (`MMDLoader`, `MMDAnimationHelper`, `OrbitControls`, `Sky`,
//! `Water`) attached to it.

use js_sys::{Function, Object, Reflect};
use wasm_bindgen::prelude::*;
use web_sys::HtmlCanvasElement;

/// `THREE.RepeatWrapping`
pub const REPEAT_WRAPPING: u32 = 1000;
/// `THREE.LoopOnce`, `THREE.LoopRepeat`, `THREE.LoopPingPong`
pub const LOOP_ONCE: u32 = 2200;
pub const LOOP_REPEAT: u32 = 2201;
pub const LOOP_PING_PONG: u32 = 2202;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console, js_name = log)]
    pub fn console_log(s: &str);
}

// core
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = THREE)]
    #[derive(Debug, Clone)]
    pub type Vector3;
    #[wasm_bindgen(constructor, js_namespace = THREE)]
    pub fn new(x: f64, y: f64, z: f64) -> Vector3;
    #[wasm_bindgen(method)]
    pub fn set(this: &Vector3, x: f64, y: f64, z: f64) -> Vector3;
    #[wasm_bindgen(method, js_name = setScalar)]
    pub fn set_scalar(this: &Vector3, scalar: f64) -> Vector3;
    #[wasm_bindgen(method)]
    pub fn normalize(this: &Vector3) -> Vector3;
    #[wasm_bindgen(method, getter)]
    pub fn x(this: &Vector3) -> f64;
    #[wasm_bindgen(method, getter)]
    pub fn y(this: &Vector3) -> f64;
    #[wasm_bindgen(method, getter)]
    pub fn z(this: &Vector3) -> f64;

    #[wasm_bindgen(js_namespace = THREE)]
    pub type Euler;
    #[wasm_bindgen(method, setter = x)]
    pub fn set_x(this: &Euler, x: f64);

    #[wasm_bindgen(js_namespace = THREE)]
    pub type Color;
    #[wasm_bindgen(constructor, js_namespace = THREE)]
    pub fn new(hex: u32) -> Color;

    #[wasm_bindgen(js_namespace = THREE)]
    #[derive(Debug, Clone)]
    pub type Object3D;
    #[wasm_bindgen(method, getter)]
    pub fn position(this: &Object3D) -> Vector3;
    #[wasm_bindgen(method, getter)]
    pub fn up(this: &Object3D) -> Vector3;
    #[wasm_bindgen(method, getter)]
    pub fn rotation(this: &Object3D) -> Euler;
    #[wasm_bindgen(method, getter)]
    pub fn scale(this: &Object3D) -> Vector3;
    #[wasm_bindgen(method, js_name = lookAt)]
    pub fn look_at(this: &Object3D, x: f64, y: f64, z: f64);
    #[wasm_bindgen(method)]
    pub fn add(this: &Object3D, child: &Object3D);
    #[wasm_bindgen(method)]
    pub fn remove(this: &Object3D, child: &Object3D);

    #[wasm_bindgen(extends = Object3D, js_namespace = THREE)]
    #[derive(Debug, Clone)]
    pub type Scene;
    #[wasm_bindgen(constructor, js_namespace = THREE)]
    pub fn new() -> Scene;
    #[wasm_bindgen(method, setter)]
    pub fn set_background(this: &Scene, color: &Color);

    #[wasm_bindgen(extends = Object3D, js_namespace = THREE)]
    #[derive(Debug, Clone)]
    pub type PerspectiveCamera;
    #[wasm_bindgen(constructor, js_namespace = THREE)]
    pub fn new(fov: f64, aspect: f64, near: f64, far: f64) -> PerspectiveCamera;
    #[wasm_bindgen(method, setter)]
    pub fn set_aspect(this: &PerspectiveCamera, aspect: f64);
    #[wasm_bindgen(method, js_name = updateProjectionMatrix)]
    pub fn update_projection_matrix(this: &PerspectiveCamera);

    #[wasm_bindgen(js_namespace = THREE, js_name = WebGLRenderer)]
    #[derive(Debug, Clone)]
    pub type WebGlRenderer;
    #[wasm_bindgen(constructor, js_namespace = THREE, js_class = "WebGLRenderer")]
    pub fn new(parameters: &Object) -> WebGlRenderer;
    #[wasm_bindgen(method, js_name = setSize)]
    pub fn set_size(this: &WebGlRenderer, width: f64, height: f64, update_style: bool);
    #[wasm_bindgen(method)]
    pub fn render(this: &WebGlRenderer, scene: &Scene, camera: &PerspectiveCamera);
    #[wasm_bindgen(method, getter, js_name = domElement)]
    pub fn dom_element(this: &WebGlRenderer) -> HtmlCanvasElement;
    #[wasm_bindgen(method, getter)]
    pub fn info(this: &WebGlRenderer) -> Object;
    #[wasm_bindgen(method, setter = physicallyCorrectLights)]
    pub fn set_physically_correct_lights(this: &WebGlRenderer, value: bool);
    #[wasm_bindgen(method, js_name = setAnimationLoop)]
    pub fn set_animation_loop(this: &WebGlRenderer, callback: Option<&Function>);

    #[wasm_bindgen(extends = Object3D, js_namespace = THREE)]
    pub type HemisphereLight;
    #[wasm_bindgen(constructor, js_namespace = THREE)]
    pub fn new(sky_color: u32, ground_color: u32, intensity: f64) -> HemisphereLight;

    #[wasm_bindgen(js_namespace = THREE)]
    pub type PlaneGeometry;
    #[wasm_bindgen(constructor, js_namespace = THREE)]
    pub fn new(width: f64, height: f64) -> PlaneGeometry;

    #[wasm_bindgen(js_namespace = THREE)]
    #[derive(Debug, Clone)]
    pub type Texture;
    #[wasm_bindgen(method, setter = wrapS)]
    pub fn set_wrap_s(this: &Texture, mode: u32);
    #[wasm_bindgen(method, setter = wrapT)]
    pub fn set_wrap_t(this: &Texture, mode: u32);
    #[wasm_bindgen(method)]
    pub fn dispose(this: &Texture);

    #[wasm_bindgen(js_namespace = THREE)]
    pub type TextureLoader;
    #[wasm_bindgen(constructor, js_namespace = THREE)]
    pub fn new() -> TextureLoader;
    #[wasm_bindgen(method)]
    pub fn load(this: &TextureLoader, url: &str) -> Texture;
}

// skinning and animation
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = THREE)]
    #[derive(Debug, Clone)]
    pub type BufferGeometry;
    #[wasm_bindgen(method)]
    pub fn dispose(this: &BufferGeometry);

    #[wasm_bindgen(js_namespace = THREE)]
    #[derive(Debug, Clone)]
    pub type Material;
    #[wasm_bindgen(method)]
    pub fn dispose(this: &Material);

    #[wasm_bindgen(js_namespace = THREE)]
    #[derive(Debug, Clone)]
    pub type Skeleton;
    #[wasm_bindgen(method, getter = boneTexture)]
    pub fn bone_texture(this: &Skeleton) -> Option<Texture>;
    #[wasm_bindgen(method)]
    pub fn dispose(this: &Skeleton);

    #[wasm_bindgen(extends = Object3D, js_namespace = THREE)]
    #[derive(Debug, Clone)]
    pub type SkinnedMesh;
    #[wasm_bindgen(method, getter)]
    pub fn geometry(this: &SkinnedMesh) -> BufferGeometry;
    /// A single material or an array of them.
    #[wasm_bindgen(method, getter)]
    pub fn material(this: &SkinnedMesh) -> JsValue;
    #[wasm_bindgen(method, getter)]
    pub fn skeleton(this: &SkinnedMesh) -> Option<Skeleton>;
    #[wasm_bindgen(method)]
    pub fn pose(this: &SkinnedMesh);

    #[wasm_bindgen(js_namespace = THREE)]
    #[derive(Debug, Clone)]
    pub type AnimationClip;

    #[wasm_bindgen(js_namespace = THREE)]
    #[derive(Debug, Clone)]
    pub type AnimationMixer;
    #[wasm_bindgen(method, js_name = stopAllAction)]
    pub fn stop_all_action(this: &AnimationMixer);
    #[wasm_bindgen(method, js_name = setTime)]
    pub fn set_time(this: &AnimationMixer, seconds: f64);
    #[wasm_bindgen(method, js_name = existingAction)]
    pub fn existing_action(this: &AnimationMixer, clip: &AnimationClip) -> Option<AnimationAction>;

    #[wasm_bindgen(js_namespace = THREE)]
    #[derive(Debug, Clone)]
    pub type AnimationAction;
    #[wasm_bindgen(method, js_name = setLoop)]
    pub fn set_loop(this: &AnimationAction, mode: u32, repetitions: f64);
    #[wasm_bindgen(method)]
    pub fn reset(this: &AnimationAction);
    #[wasm_bindgen(method)]
    pub fn play(this: &AnimationAction);
}

// example modules
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = THREE)]
    pub type MMDLoader;
    #[wasm_bindgen(constructor, js_namespace = THREE)]
    pub fn new() -> MMDLoader;
    #[wasm_bindgen(method)]
    pub fn load(
        this: &MMDLoader,
        url: &str,
        on_load: &Function,
        on_progress: &Function,
        on_error: &Function,
    );
    #[wasm_bindgen(method, js_name = loadVPD)]
    pub fn load_vpd(
        this: &MMDLoader,
        url: &str,
        is_unicode: bool,
        on_load: &Function,
        on_progress: &Function,
        on_error: &Function,
    );
    #[wasm_bindgen(method, js_name = loadAnimation)]
    pub fn load_animation(
        this: &MMDLoader,
        url: &str,
        object: &SkinnedMesh,
        on_load: &Function,
        on_progress: &Function,
        on_error: &Function,
    );

    #[wasm_bindgen(js_namespace = THREE)]
    pub type MMDAnimationHelper;
    #[wasm_bindgen(constructor, js_namespace = THREE)]
    pub fn new(parameters: &Object) -> MMDAnimationHelper;
    #[wasm_bindgen(method)]
    pub fn add(this: &MMDAnimationHelper, object: &SkinnedMesh, parameters: &Object);
    #[wasm_bindgen(method)]
    pub fn remove(this: &MMDAnimationHelper, object: &SkinnedMesh);
    #[wasm_bindgen(method)]
    pub fn pose(this: &MMDAnimationHelper, mesh: &SkinnedMesh, vpd: &JsValue, parameters: &Object);
    #[wasm_bindgen(method)]
    pub fn update(this: &MMDAnimationHelper, delta: f64);
    /// `WeakMap` from registered objects to `{ mixer, ... }`.
    #[wasm_bindgen(method, getter)]
    pub fn objects(this: &MMDAnimationHelper) -> js_sys::WeakMap;

    #[wasm_bindgen(js_namespace = THREE)]
    #[derive(Debug, Clone)]
    pub type OrbitControls;
    #[wasm_bindgen(constructor, js_namespace = THREE)]
    pub fn new(camera: &PerspectiveCamera, dom_element: &HtmlCanvasElement) -> OrbitControls;
    #[wasm_bindgen(method, getter)]
    pub fn target(this: &OrbitControls) -> Vector3;
    #[wasm_bindgen(method, setter = enablePan)]
    pub fn set_enable_pan(this: &OrbitControls, value: bool);
    #[wasm_bindgen(method, setter = minDistance)]
    pub fn set_min_distance(this: &OrbitControls, value: f64);
    #[wasm_bindgen(method, setter = maxDistance)]
    pub fn set_max_distance(this: &OrbitControls, value: f64);
    #[wasm_bindgen(method, setter = maxPolarAngle)]
    pub fn set_max_polar_angle(this: &OrbitControls, value: f64);
    #[wasm_bindgen(method)]
    pub fn update(this: &OrbitControls) -> bool;
    #[wasm_bindgen(method, js_name = saveState)]
    pub fn save_state(this: &OrbitControls);
    #[wasm_bindgen(method)]
    pub fn reset(this: &OrbitControls);

    #[wasm_bindgen(extends = Object3D, js_namespace = THREE)]
    pub type Sky;
    #[wasm_bindgen(constructor, js_namespace = THREE)]
    pub fn new() -> Sky;

    #[wasm_bindgen(extends = Object3D, js_namespace = THREE)]
    pub type Water;
    #[wasm_bindgen(constructor, js_namespace = THREE)]
    pub fn new(geometry: &PlaneGeometry, options: &Object) -> Water;
}

/// Objects with a `material.uniforms` table, i.e. `Sky` and `Water`.
pub trait Uniforms: AsRef<JsValue> {
    fn uniform(&self, name: &str) -> Result<JsValue, JsValue> {
        let material = Reflect::get(self.as_ref(), &"material".into())?;
        let uniforms = Reflect::get(&material, &"uniforms".into())?;
        let uniform = Reflect::get(&uniforms, &name.into())?;
        Reflect::get(&uniform, &"value".into())
    }

    fn set_uniform(&self, name: &str, value: &JsValue) -> Result<(), JsValue> {
        let material = Reflect::get(self.as_ref(), &"material".into())?;
        let uniforms = Reflect::get(&material, &"uniforms".into())?;
        let uniform = Reflect::get(&uniforms, &name.into())?;
        Reflect::set(&uniform, &"value".into(), value)?;
        Ok(())
    }
}

impl Uniforms for Sky {}
impl Uniforms for Water {}

/// Build a plain JS object from key / value pairs.
pub fn object(entries: &[(&str, JsValue)]) -> Result<Object, JsValue> {
    let object = Object::new();
    for (key, value) in entries {
        Reflect::set(&object, &(*key).into(), value)?;
    }
    Ok(object)
}

/// Read a numeric property at `path`, e.g. `["memory", "geometries"]`. Missing values read as zero.
pub fn number_at(root: &JsValue, path: &[&str]) -> u64 {
    let mut value = root.clone();
    for key in path {
        value = match Reflect::get(&value, &(*key).into()) {
            Ok(next) => next,
            Err(_) => return 0,
        };
    }
    value.as_f64().map_or(0, |n| n.max(0.0) as u64)
}
