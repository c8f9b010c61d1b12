//! Model reload sequencing.
//!
//! A character is only animatable after three loads ran one after another:
//! the model mesh, then the VPD rest poses (they need the mesh), then the VMD
//! motion clips (they are fitted to the posed mesh). Each stage drains its
//! whole [`crate::loader::LoadPipeline`] before the next one starts.
//!
//! ```text
//! Idle -> LoadingMesh -> MeshReady -> LoadingPoses -> PosesApplied -> LoadingMotions -> Ready
//!              |
//!              +-> Failed (no mesh and nothing to fall back to)
//! ```
//!
//! Reloads are last-writer-wins: starting a new one through [`ReloadGate::begin`]
//! supersedes the previous [`ReloadTicket`]. A superseded reload stops acting on
//! its loads; whatever is still in flight is drained and discarded.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

use futures::StreamExt;

use crate::{
    backend::{AnimationHelper, AttachOptions, Backend, MmdLoader, PoseOptions, SkinnedMesh},
    config::ViewerConfig,
    error::{Result, ViewerError},
    loader::{CancelToken, LoadEvent, load_all},
    viewer::ViewState,
};

/// The three loads of a reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Mesh,
    Poses,
    Motions,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Mesh => "mesh",
            Stage::Poses => "pose",
            Stage::Motions => "motion",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReloadState {
    #[default]
    Idle,
    LoadingMesh,
    /// The mesh is attached to the scene.
    MeshReady,
    LoadingPoses,
    PosesApplied,
    LoadingMotions,
    /// Mesh attached, posed and registered with the animation helper.
    Ready,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    Ready,
    /// A newer reload started before this one finished.
    Superseded,
}

/// What to load for one character.
#[derive(Debug, Clone, PartialEq)]
pub struct ReloadPlan {
    pub model_url: String,
    pub pose_urls: Vec<String>,
    /// `(motion name, url)`; clips are matched back to names by URL.
    pub motions: Vec<(String, String)>,
    pub physics: bool,
    pub unicode_poses: bool,
}

impl ReloadPlan {
    pub fn for_model(config: &ViewerConfig, model: &str) -> Result<Self> {
        let catalog = &config.catalog;
        Ok(Self {
            model_url: catalog.model(model)?.url.clone(),
            pose_urls: catalog.poses.clone(),
            motions: catalog
                .motions
                .iter()
                .map(|m| (m.name.clone(), m.url.clone()))
                .collect(),
            physics: config.animation.physics,
            unicode_poses: config.animation.unicode_poses,
        })
    }

    /// The first motion loaded from `url` that has no clip in `claimed` yet.
    ///
    /// Several motions may share a file; each of them gets its own clip.
    pub fn unclaimed_motion<C>(&self, url: &str, claimed: &[(String, C)]) -> Option<&str> {
        self.motions
            .iter()
            .find(|(name, u)| u == url && !claimed.iter().any(|(n, _)| n == name))
            .map(|(name, _)| name.as_str())
    }
}

/// Hands out [`ReloadTicket`]s. Only the newest ticket is current.
#[derive(Debug, Default)]
pub struct ReloadGate {
    current: Rc<Cell<u64>>,
    active: RefCell<Option<CancelToken>>,
}

impl ReloadGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supersede the running reload (if any) and issue a ticket for a new one.
    pub fn begin(&self) -> ReloadTicket {
        let cancel = CancelToken::new();
        if let Some(previous) = self.active.replace(Some(cancel.clone())) {
            if !previous.is_cancelled() {
                log::info!("Reload {} superseded.", self.current.get());
                previous.cancel();
            }
        }
        let generation = self.current.get() + 1;
        self.current.set(generation);
        ReloadTicket {
            generation,
            current: self.current.clone(),
            cancel,
        }
    }

    /// Supersede the running reload without starting a new one.
    pub fn cancel(&self) {
        if let Some(active) = self.active.borrow_mut().take() {
            active.cancel();
        }
        self.current.set(self.current.get() + 1);
    }

    pub fn generation(&self) -> u64 {
        self.current.get()
    }
}

/// Identity of one reload.
#[derive(Debug, Clone)]
pub struct ReloadTicket {
    generation: u64,
    current: Rc<Cell<u64>>,
    cancel: CancelToken,
}

impl ReloadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.current.get() == self.generation && !self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }
}

/// Run the three stages of a reload against the shared view state.
///
/// The previous mesh stays attached until the new one has loaded, so a failed
/// reload leaves the character on screen. No borrow of `view` is held across an
/// await point; the render callback keeps running in between.
pub(crate) async fn run_reload<B: Backend>(
    view: Rc<RefCell<ViewState<B>>>,
    loader: Rc<B::Loader>,
    ticket: ReloadTicket,
    plan: ReloadPlan,
) -> Result<ReloadOutcome> {
    log::info!("Next - Model loading ({}).", plan.model_url);
    view.borrow_mut().enter(&ticket, ReloadState::LoadingMesh);

    let mesh = {
        let loader = loader.clone();
        // not tied to the ticket: a superseded mesh must still arrive to be disposed
        let mut events = load_all(
            [plan.model_url.clone()],
            CancelToken::new(),
            move |url| loader.load_model(url),
        );
        let mut mesh: Option<B::Mesh> = None;
        while let Some(event) = events.next().await {
            match event {
                LoadEvent::Progress { loaded, total, .. } => {
                    log::debug!("Loaded {} byte in {}.", loaded, total)
                }
                LoadEvent::Loaded { url, resource } => {
                    if mesh.is_none() {
                        log::info!("Model {} loaded.", url);
                        mesh = Some(resource);
                    } else {
                        log::warn!("Ignoring additional mesh from {}.", url);
                    }
                }
                LoadEvent::Failed { url, reason } => {
                    log::warn!("Model: {}", ViewerError::LoadFailure { url, reason })
                }
            }
        }
        mesh
    };

    if !ticket.is_current() {
        if let Some(mesh) = mesh {
            // loaded but never attached
            mesh.dispose_geometry();
            mesh.dispose_materials();
            mesh.dispose_skeleton();
        }
        return Ok(ReloadOutcome::Superseded);
    }

    let Some(mesh) = mesh else {
        let reason = format!("no model could be loaded from {}", plan.model_url);
        view.borrow_mut().fall_back(&ticket);
        return Err(ViewerError::StageFailure {
            stage: Stage::Mesh,
            reason,
        });
    };

    {
        let mut view = view.borrow_mut();
        let view = &mut *view;
        view.attachment.attach(
            mesh.clone(),
            &mut view.scenery.scene,
            &mut view.scenery.helper,
        );
        view.clips.clear();
        view.enter(&ticket, ReloadState::MeshReady);
    }

    log::info!("Next - Pose loading.");
    view.borrow_mut().enter(&ticket, ReloadState::LoadingPoses);
    {
        let loader = loader.clone();
        let unicode = plan.unicode_poses;
        let mut events = load_all(
            plan.pose_urls.iter().cloned(),
            ticket.cancel_token().clone(),
            move |url| loader.load_pose(url, unicode),
        );
        let mut applied = 0;
        while let Some(event) = events.next().await {
            match event {
                LoadEvent::Progress { .. } => (),
                LoadEvent::Loaded { url, resource } => {
                    if !ticket.is_current() {
                        continue;
                    }
                    view.borrow_mut().scenery.helper.pose(
                        &mesh,
                        &resource,
                        PoseOptions::default(),
                    );
                    applied += 1;
                    log::debug!("Pose {} applied.", url);
                }
                LoadEvent::Failed { url, reason } => {
                    log::warn!("Pose skipped: {}", ViewerError::LoadFailure { url, reason })
                }
            }
        }
        if !ticket.is_current() {
            return Ok(ReloadOutcome::Superseded);
        }
        log::info!("{} of {} pose(s) applied.", applied, plan.pose_urls.len());
    }
    view.borrow_mut().enter(&ticket, ReloadState::PosesApplied);

    log::info!("Next - Motion loading.");
    view.borrow_mut().enter(&ticket, ReloadState::LoadingMotions);
    let clips = {
        let loader = loader.clone();
        let target = mesh.clone();
        let mut events = load_all(
            plan.motions.iter().map(|(_, url)| url.clone()),
            ticket.cancel_token().clone(),
            move |url| loader.load_motion(url, &target),
        );
        let mut clips: Vec<(String, B::Clip)> = Vec::new();
        while let Some(event) = events.next().await {
            match event {
                LoadEvent::Progress { .. } => (),
                LoadEvent::Loaded { url, resource } => {
                    match plan.unclaimed_motion(&url, &clips) {
                        Some(name) => {
                            log::debug!("Motion {} loaded.", name);
                            clips.push((name.to_string(), resource));
                        }
                        None => log::warn!("Motion {} does not belong to any catalog entry.", url),
                    }
                }
                LoadEvent::Failed { url, reason } => {
                    log::warn!("Motion skipped: {}", ViewerError::LoadFailure { url, reason })
                }
            }
        }
        if !ticket.is_current() {
            return Ok(ReloadOutcome::Superseded);
        }
        clips
    };

    {
        let mut view = view.borrow_mut();
        let view = &mut *view;
        let helper = &mut view.scenery.helper;
        if helper.mixer(&mesh).is_ok() {
            helper.remove(&mesh);
        }
        helper.add(
            &mesh,
            AttachOptions {
                physics: plan.physics,
                clips: clips.iter().map(|(_, clip)| clip.clone()).collect(),
                ..Default::default()
            },
        );
        view.attachment.mark_animated();
        log::info!("{} of {} motion(s) registered.", clips.len(), plan.motions.len());
        view.clips = clips;
        view.enter(&ticket, ReloadState::Ready);
    }
    log::info!("Finish - ReloadModel.");
    Ok(ReloadOutcome::Ready)
}
