//! The interop boundary to the rendering library.
//!
//! The scene graph, renderer, skinning, physics and MMD file parsing all live
//! in the external library. The viewer only needs a handful of capabilities
//! from it, each expressed as one trait here. A [`Backend`] bundles the
//! concrete types; `crate::web` implements it on top of three.js, the tests
//! implement it with recording mocks.

use std::fmt::Debug;

use crate::{error::Result, loader::LoadStream, store::RendererInfo};

/// Bundle of the library types the viewer works with.
pub trait Backend: Sized + 'static {
    /// An opaque handle to a loaded character mesh.
    type Mesh: SkinnedMesh;
    /// A parsed VPD pose.
    type Pose: 'static;
    /// A parsed VMD motion clip fitted to a mesh.
    type Clip: Clone + 'static;
    type Mixer: Mixer<Self> + 'static;
    type Surface: Surface<Self> + 'static;
    type Controls: Controls + 'static;
    type Scene: SceneGraph<Self> + 'static;
    type Helper: AnimationHelper<Self> + 'static;
    type Loader: MmdLoader<Self> + 'static;
}

/// A skinned character mesh and the GPU resources hanging off it.
///
/// The library does not free any of these when a mesh leaves the scene; see
/// [`crate::attachment::SceneAttachment::dispose`] for the order they are released in.
pub trait SkinnedMesh: Clone + Debug + 'static {
    /// Put the skeleton back into its rest pose.
    fn rest_pose(&self);
    fn dispose_geometry(&self);
    /// Dispose every material and the textures it references.
    fn dispose_materials(&self);
    /// Dispose the bone texture (if any) and then the skeleton itself.
    fn dispose_skeleton(&self);
}

/// Bounding box of an element in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            right: width,
            bottom: height,
        }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

/// Renderer, camera and the canvas they draw into.
pub trait Surface<B: Backend> {
    /// Height of the canvas backing store in device pixels. Zero until the canvas got a layout.
    fn backing_height(&self) -> u32;
    /// Bounding box of the canvas' parent element.
    fn parent_rect(&self) -> Rect;
    fn device_pixel_ratio(&self) -> f64;
    /// Resize the backing store without touching the element's CSS size.
    fn set_backing_size(&mut self, width: f64, height: f64);
    /// Displayed size of the canvas in CSS pixels.
    fn client_size(&self) -> (f64, f64);
    /// Set the camera aspect ratio and refresh its projection matrix.
    fn set_camera_aspect(&mut self, aspect: f64);
    fn render(&mut self, scene: &B::Scene);
    /// Internal counters of the renderer after the last render.
    fn info(&self) -> RendererInfo;
}

/// Orbit style camera controls.
pub trait Controls {
    /// Advance damping and apply pending user input to the camera.
    fn update(&mut self);
    /// Remember the current camera state as the one [`Controls::reset`] returns to.
    fn save_state(&mut self);
    fn reset(&mut self);
}

pub trait SceneGraph<B: Backend> {
    fn add_mesh(&mut self, mesh: &B::Mesh);
    fn remove_mesh(&mut self, mesh: &B::Mesh);
}

/// Options for registering a mesh with the animation helper.
#[derive(Debug, Clone)]
pub struct AttachOptions<C> {
    pub physics: bool,
    pub clips: Vec<C>,
    /// Physics warm-up steps.
    pub warmup: Option<u32>,
    pub unit_step: Option<f64>,
    pub max_step_num: Option<u32>,
}

impl<C> Default for AttachOptions<C> {
    fn default() -> Self {
        Self {
            physics: true,
            clips: Vec::new(),
            warmup: None,
            unit_step: None,
            max_step_num: None,
        }
    }
}

/// Options for applying a VPD pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseOptions {
    pub reset_pose: bool,
    pub ik: bool,
    pub grant: bool,
}

impl Default for PoseOptions {
    fn default() -> Self {
        Self {
            reset_pose: true,
            ik: true,
            grant: true,
        }
    }
}

/// The MMD animation helper: IK, grant and physics on top of the animation mixer.
pub trait AnimationHelper<B: Backend> {
    /// Register `mesh` and create its mixer for `options.clips`.
    fn add(&mut self, mesh: &B::Mesh, options: AttachOptions<B::Clip>);
    fn remove(&mut self, mesh: &B::Mesh);
    /// The mixer of a registered mesh, [`crate::error::ViewerError::ResourceNotRegistered`] otherwise.
    fn mixer(&self, mesh: &B::Mesh) -> Result<B::Mixer>;
    fn pose(&mut self, mesh: &B::Mesh, pose: &B::Pose, options: PoseOptions);
    /// Advance all registered meshes by `delta` seconds.
    fn update(&mut self, delta: f64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Once,
    Repeat,
    PingPong,
}

pub trait Mixer<B: Backend> {
    type Action: AnimationAction;

    fn stop_all_action(&self);
    fn set_time(&self, seconds: f64);
    /// The action already created for `clip`, if any.
    fn existing_action(&self, clip: &B::Clip) -> Option<Self::Action>;
}

pub trait AnimationAction {
    fn set_loop(&self, mode: LoopMode, repetitions: u32);
    fn reset(&self);
    fn play(&self);
}

/// The "load one resource" capability of the MMD loader.
///
/// Every call starts one load immediately and returns the stream of its signals.
pub trait MmdLoader<B: Backend> {
    /// Load a `.pmx` / `.pmd` model.
    fn load_model(&self, url: &str) -> LoadStream<B::Mesh>;
    /// Load a `.vpd` pose file.
    fn load_pose(&self, url: &str, unicode: bool) -> LoadStream<B::Pose>;
    /// Load a `.vmd` motion file as a clip fitted to `mesh`.
    fn load_motion(&self, url: &str, mesh: &B::Mesh) -> LoadStream<B::Clip>;
}

/// Something in the scene that moves with time on its own (water, sky).
pub trait Effect {
    fn advance(&mut self, delta: f64);
}
