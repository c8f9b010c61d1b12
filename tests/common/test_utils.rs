use std::{
    cell::{Cell, RefCell},
    collections::HashSet,
    fmt,
    rc::Rc,
};

use futures::{executor::LocalPool, future::LocalBoxFuture, task::LocalSpawnExt};
use mmd_viewer::{
    Backend, ViewerConfig, ViewerError,
    backend::{
        AnimationAction, AnimationHelper, AttachOptions, Controls, Effect, LoopMode, MmdLoader,
        Mixer, PoseOptions, Rect, SceneGraph, SkinnedMesh, Surface,
    },
    loader::{LoadCallbacks, LoadStream, callback_stream},
    platform::Spawner,
    store::RendererInfo,
    viewer::{Scenery, Viewer},
};

/// A registration with the mock animation helper.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub mesh: u32,
    pub clips: Vec<MockClip>,
    pub physics: bool,
}

/// Everything the mocks observed, shared by all of them.
#[derive(Debug, Default)]
pub struct ProbeState {
    /// Calls in the order they happened, e.g. `"scene.remove 1"`.
    pub log: Vec<String>,
    /// Ids of the meshes currently in the scene.
    pub scene: Vec<u32>,
    pub registered: Vec<Registration>,
    /// `(mesh id, pose url)` for every applied pose.
    pub poses: Vec<(u32, String)>,
    pub helper_updates: Vec<f64>,
    pub controls_updates: u32,
    pub controls_saved: u32,
    pub controls_resets: u32,
    pub parent: Rect,
    pub device_pixel_ratio: f64,
    pub backing: (f64, f64),
    pub client: (f64, f64),
    pub aspect: Option<f64>,
    pub renders: u64,
    pub effect_time: f64,
}

impl ProbeState {
    pub fn count(&self, entry: &str) -> usize {
        self.log.iter().filter(|e| *e == entry).count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.log.iter().position(|e| e == entry)
    }
}

pub type Probe = Rc<RefCell<ProbeState>>;

pub fn probe() -> Probe {
    Rc::new(RefCell::new(ProbeState {
        parent: Rect::new(800.0, 600.0),
        device_pixel_ratio: 2.0,
        client: (800.0, 600.0),
        ..Default::default()
    }))
}

fn record(probe: &Probe, entry: String) {
    probe.borrow_mut().log.push(entry);
}

pub struct MockBackend;

impl Backend for MockBackend {
    type Mesh = MockMesh;
    type Pose = String;
    type Clip = MockClip;
    type Mixer = MockMixer;
    type Surface = MockSurface;
    type Controls = MockControls;
    type Scene = MockScene;
    type Helper = MockHelper;
    type Loader = MockLoader;
}

#[derive(Clone)]
pub struct MockMesh {
    pub id: u32,
    pub url: String,
    probe: Probe,
}

impl fmt::Debug for MockMesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MockMesh({}, {})", self.id, self.url)
    }
}

impl SkinnedMesh for MockMesh {
    fn rest_pose(&self) {
        record(&self.probe, format!("mesh.rest_pose {}", self.id));
    }

    fn dispose_geometry(&self) {
        record(&self.probe, format!("mesh.dispose_geometry {}", self.id));
    }

    fn dispose_materials(&self) {
        record(&self.probe, format!("mesh.dispose_materials {}", self.id));
    }

    fn dispose_skeleton(&self) {
        record(&self.probe, format!("mesh.dispose_skeleton {}", self.id));
    }
}

/// A motion clip: the file it came from and the mesh it was fitted to.
#[derive(Debug, Clone, PartialEq)]
pub struct MockClip {
    pub url: String,
    pub mesh: u32,
}

pub struct MockScene {
    probe: Probe,
}

impl SceneGraph<MockBackend> for MockScene {
    fn add_mesh(&mut self, mesh: &MockMesh) {
        record(&self.probe, format!("scene.add {}", mesh.id));
        self.probe.borrow_mut().scene.push(mesh.id);
    }

    fn remove_mesh(&mut self, mesh: &MockMesh) {
        record(&self.probe, format!("scene.remove {}", mesh.id));
        self.probe.borrow_mut().scene.retain(|id| *id != mesh.id);
    }
}

pub struct MockHelper {
    probe: Probe,
}

impl AnimationHelper<MockBackend> for MockHelper {
    fn add(&mut self, mesh: &MockMesh, options: AttachOptions<MockClip>) {
        record(&self.probe, format!("helper.add {}", mesh.id));
        self.probe.borrow_mut().registered.push(Registration {
            mesh: mesh.id,
            clips: options.clips,
            physics: options.physics,
        });
    }

    fn remove(&mut self, mesh: &MockMesh) {
        record(&self.probe, format!("helper.remove {}", mesh.id));
        self.probe
            .borrow_mut()
            .registered
            .retain(|r| r.mesh != mesh.id);
    }

    fn mixer(&self, mesh: &MockMesh) -> mmd_viewer::Result<MockMixer> {
        let registered = self
            .probe
            .borrow()
            .registered
            .iter()
            .any(|r| r.mesh == mesh.id);
        if !registered {
            return Err(ViewerError::ResourceNotRegistered("mixer".to_string()));
        }
        Ok(MockMixer {
            mesh: mesh.id,
            probe: self.probe.clone(),
        })
    }

    fn pose(&mut self, mesh: &MockMesh, pose: &String, options: PoseOptions) {
        assert_eq!(options, PoseOptions::default());
        self.probe.borrow_mut().poses.push((mesh.id, pose.clone()));
    }

    fn update(&mut self, delta: f64) {
        record(&self.probe, "helper.update".to_string());
        self.probe.borrow_mut().helper_updates.push(delta);
    }
}

pub struct MockMixer {
    mesh: u32,
    probe: Probe,
}

impl Mixer<MockBackend> for MockMixer {
    type Action = MockAction;

    fn stop_all_action(&self) {
        record(&self.probe, format!("mixer.stop_all_action {}", self.mesh));
    }

    fn set_time(&self, seconds: f64) {
        record(&self.probe, format!("mixer.set_time {} {}", self.mesh, seconds));
    }

    fn existing_action(&self, clip: &MockClip) -> Option<MockAction> {
        let probe = self.probe.borrow();
        let registration = probe.registered.iter().find(|r| r.mesh == self.mesh)?;
        registration.clips.contains(clip).then(|| MockAction {
            clip: clip.clone(),
            probe: self.probe.clone(),
        })
    }
}

pub struct MockAction {
    clip: MockClip,
    probe: Probe,
}

impl AnimationAction for MockAction {
    fn set_loop(&self, mode: LoopMode, repetitions: u32) {
        record(&self.probe, format!("action.set_loop {:?} {}", mode, repetitions));
    }

    fn reset(&self) {
        record(&self.probe, "action.reset".to_string());
    }

    fn play(&self) {
        record(&self.probe, format!("action.play {}", self.clip.url));
    }
}

pub struct MockSurface {
    probe: Probe,
}

impl MockSurface {
    pub fn new(probe: &Probe) -> Self {
        Self {
            probe: probe.clone(),
        }
    }
}

impl Surface<MockBackend> for MockSurface {
    fn backing_height(&self) -> u32 {
        self.probe.borrow().backing.1 as u32
    }

    fn parent_rect(&self) -> Rect {
        self.probe.borrow().parent
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.probe.borrow().device_pixel_ratio
    }

    fn set_backing_size(&mut self, width: f64, height: f64) {
        record(&self.probe, format!("surface.set_backing_size {} {}", width, height));
        self.probe.borrow_mut().backing = (width, height);
    }

    fn client_size(&self) -> (f64, f64) {
        self.probe.borrow().client
    }

    fn set_camera_aspect(&mut self, aspect: f64) {
        self.probe.borrow_mut().aspect = Some(aspect);
    }

    fn render(&mut self, _: &MockScene) {
        record(&self.probe, "surface.render".to_string());
        self.probe.borrow_mut().renders += 1;
    }

    fn info(&self) -> RendererInfo {
        let probe = self.probe.borrow();
        RendererInfo {
            geometries: probe.scene.len() as u64,
            calls: probe.scene.len() as u64,
            frame: probe.renders,
            ..Default::default()
        }
    }
}

pub struct MockControls {
    probe: Probe,
}

impl Controls for MockControls {
    fn update(&mut self) {
        record(&self.probe, "controls.update".to_string());
        self.probe.borrow_mut().controls_updates += 1;
    }

    fn save_state(&mut self) {
        self.probe.borrow_mut().controls_saved += 1;
    }

    fn reset(&mut self) {
        self.probe.borrow_mut().controls_resets += 1;
    }
}

pub struct MockEffect {
    probe: Probe,
}

impl Effect for MockEffect {
    fn advance(&mut self, delta: f64) {
        record(&self.probe, "effect.advance".to_string());
        self.probe.borrow_mut().effect_time += delta;
    }
}

/// Shared state of [`MockLoader`] handles.
#[derive(Default)]
struct LoaderState {
    /// Answer every request as soon as it is made.
    auto: Cell<bool>,
    failing: RefCell<HashSet<String>>,
    requests: RefCell<Vec<String>>,
    models: RefCell<Vec<(String, Rc<LoadCallbacks<MockMesh>>)>>,
    poses: RefCell<Vec<(String, Rc<LoadCallbacks<String>>)>>,
    motions: RefCell<Vec<(String, u32, Rc<LoadCallbacks<MockClip>>)>>,
    next_mesh: Cell<u32>,
}

/// MMD loader answering from memory. Cloning yields another handle to the same loader.
#[derive(Clone)]
pub struct MockLoader {
    probe: Probe,
    state: Rc<LoaderState>,
}

impl MockLoader {
    /// A loader that completes every load right away.
    pub fn auto(probe: &Probe) -> Self {
        let loader = Self::manual(probe);
        loader.state.auto.set(true);
        loader
    }

    /// A loader whose loads stay pending until the test completes them.
    pub fn manual(probe: &Probe) -> Self {
        Self {
            probe: probe.clone(),
            state: Rc::new(LoaderState::default()),
        }
    }

    /// Make every load of `url` fail.
    pub fn fail(&self, url: &str) {
        self.state.failing.borrow_mut().insert(url.to_string());
    }

    /// Requests made so far, e.g. `"model ./a.pmx"`.
    pub fn requests(&self) -> Vec<String> {
        self.state.requests.borrow().clone()
    }

    pub fn pending(&self) -> usize {
        let open = |finished: bool| usize::from(!finished);
        self.state
            .models
            .borrow()
            .iter()
            .map(|(_, c)| open(c.is_finished()))
            .chain(self.state.poses.borrow().iter().map(|(_, c)| open(c.is_finished())))
            .chain(
                self.state
                    .motions
                    .borrow()
                    .iter()
                    .map(|(_, _, c)| open(c.is_finished())),
            )
            .sum()
    }

    fn mesh(&self, url: &str) -> MockMesh {
        let id = self.state.next_mesh.get() + 1;
        self.state.next_mesh.set(id);
        MockMesh {
            id,
            url: url.to_string(),
            probe: self.probe.clone(),
        }
    }

    fn fails(&self, url: &str) -> bool {
        self.state.failing.borrow().contains(url)
    }

    /// Complete the pending model loads. Returns the id of the last mesh handed out.
    pub fn complete_models(&self) -> Option<u32> {
        let pending = std::mem::take(&mut *self.state.models.borrow_mut());
        let mut last = None;
        for (url, callbacks) in pending {
            if let Some(id) = self.complete_model(&url, &callbacks) {
                last = Some(id);
            }
        }
        last
    }

    fn complete_model(&self, url: &str, callbacks: &LoadCallbacks<MockMesh>) -> Option<u32> {
        callbacks.progress(50, 100);
        if self.fails(url) {
            callbacks.reject(format!("404 {}", url));
            return None;
        }
        callbacks.progress(100, 100);
        let mesh = self.mesh(url);
        let id = mesh.id;
        callbacks.resolve(mesh);
        Some(id)
    }

    pub fn complete_poses(&self) {
        let pending = std::mem::take(&mut *self.state.poses.borrow_mut());
        for (url, callbacks) in pending {
            self.complete_pose(&url, &callbacks);
        }
    }

    fn complete_pose(&self, url: &str, callbacks: &LoadCallbacks<String>) {
        if self.fails(url) {
            callbacks.reject(format!("404 {}", url));
        } else {
            callbacks.resolve(url.to_string());
        }
    }

    pub fn complete_motions(&self) {
        let pending = std::mem::take(&mut *self.state.motions.borrow_mut());
        for (url, mesh, callbacks) in pending {
            self.complete_motion(&url, mesh, &callbacks);
        }
    }

    fn complete_motion(&self, url: &str, mesh: u32, callbacks: &LoadCallbacks<MockClip>) {
        if self.fails(url) {
            callbacks.reject(format!("404 {}", url));
        } else {
            callbacks.resolve(MockClip {
                url: url.to_string(),
                mesh,
            });
        }
    }
}

impl MmdLoader<MockBackend> for MockLoader {
    fn load_model(&self, url: &str) -> LoadStream<MockMesh> {
        self.state.requests.borrow_mut().push(format!("model {}", url));
        let (callbacks, stream) = callback_stream();
        if self.state.auto.get() {
            self.complete_model(url, &callbacks);
        } else {
            self.state
                .models
                .borrow_mut()
                .push((url.to_string(), callbacks));
        }
        stream
    }

    fn load_pose(&self, url: &str, unicode: bool) -> LoadStream<String> {
        assert!(!unicode);
        self.state.requests.borrow_mut().push(format!("pose {}", url));
        let (callbacks, stream) = callback_stream();
        if self.state.auto.get() {
            self.complete_pose(url, &callbacks);
        } else {
            self.state
                .poses
                .borrow_mut()
                .push((url.to_string(), callbacks));
        }
        stream
    }

    fn load_motion(&self, url: &str, mesh: &MockMesh) -> LoadStream<MockClip> {
        self.state
            .requests
            .borrow_mut()
            .push(format!("motion {} {}", url, mesh.id));
        let (callbacks, stream) = callback_stream();
        if self.state.auto.get() {
            self.complete_motion(url, mesh.id, &callbacks);
        } else {
            self.state
                .motions
                .borrow_mut()
                .push((url.to_string(), mesh.id, callbacks));
        }
        stream
    }
}

pub fn scenery(probe: &Probe) -> Scenery<MockBackend> {
    Scenery {
        surface: MockSurface::new(probe),
        controls: MockControls {
            probe: probe.clone(),
        },
        scene: MockScene {
            probe: probe.clone(),
        },
        helper: MockHelper {
            probe: probe.clone(),
        },
        effects: vec![Box::new(MockEffect {
            probe: probe.clone(),
        })],
    }
}

/// Spawn reload tasks onto `pool`; they run on `run_until_stalled`.
pub fn pool_spawner(pool: &LocalPool) -> Spawner {
    let spawner = pool.spawner();
    Rc::new(move |task: LocalBoxFuture<'static, ()>| {
        spawner
            .spawn_local(task)
            .expect("local pool accepts tasks");
    })
}

/// A viewer on mock objects, its reload tasks running on the returned pool.
pub struct TestViewer {
    pub viewer: Viewer<MockBackend>,
    pub probe: Probe,
    pub loader: MockLoader,
    pub pool: LocalPool,
}

impl TestViewer {
    pub fn new(config: ViewerConfig, auto: bool) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let probe = probe();
        let loader = if auto {
            MockLoader::auto(&probe)
        } else {
            MockLoader::manual(&probe)
        };
        let pool = LocalPool::new();
        let viewer = Viewer::new(config, scenery(&probe), loader.clone())
            .expect("valid configuration")
            .with_spawner(pool_spawner(&pool));
        Self {
            viewer,
            probe,
            loader,
            pool,
        }
    }

    pub fn run(&mut self) {
        self.pool.run_until_stalled();
    }

    pub fn model_url(&self, name: &str) -> String {
        self.viewer
            .config()
            .catalog
            .model(name)
            .expect("model in catalog")
            .url
            .clone()
    }

    pub fn motion_url(&self, name: &str) -> String {
        self.viewer
            .config()
            .catalog
            .motion(name)
            .expect("motion in catalog")
            .url
            .clone()
    }
}
