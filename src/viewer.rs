//! The view controller.
//!
//! [`Viewer`] owns everything rendered into one canvas: the renderer surface,
//! camera controls, scene, animation helper and time based effects
//! ([`Scenery`]), the attached character ([`SceneAttachment`]) and the reload
//! state. The host drives it through three entry points:
//!
//! 1. [`Viewer::mount`] / [`Viewer::unmount`] when the canvas appears or goes away
//! 2. [`Viewer::dispatch`] for user actions (change model, play motion, resize, ...)
//! 3. [`Viewer::frame`] once per display frame
//!
//! Reloads run as local tasks next to the frame callback. Both share
//! [`ViewState`] through an `Rc<RefCell<_>>`; the frame callback never awaits and
//! the reload task never holds a borrow across an await, so they never overlap.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
    str::FromStr,
};

use futures::{FutureExt, future::LocalBoxFuture};
use instant::Instant;

use crate::{
    attachment::SceneAttachment,
    backend::{
        AnimationAction, AnimationHelper, AttachOptions, Backend, Controls, Effect, LoopMode,
        Mixer, SkinnedMesh, Surface,
    },
    config::ViewerConfig,
    error::{Result, ViewerError},
    frame::{FrameClock, sync_canvas_size},
    platform::{self, Spawner},
    sequencer::{ReloadGate, ReloadOutcome, ReloadPlan, ReloadState, ReloadTicket, run_reload},
    store::{RendererInfoStore, Selection},
};

/// Library objects that make up the rendered view.
pub struct Scenery<B: Backend> {
    pub surface: B::Surface,
    pub controls: B::Controls,
    pub scene: B::Scene,
    pub helper: B::Helper,
    /// Advanced by the frame delta every frame, e.g. the ocean.
    pub effects: Vec<Box<dyn Effect>>,
}

/// State shared between the frame callback and reload tasks.
pub(crate) struct ViewState<B: Backend> {
    pub(crate) scenery: Scenery<B>,
    pub(crate) attachment: SceneAttachment<B>,
    pub(crate) state: ReloadState,
    /// Motion clips of the attached mesh, by motion name.
    pub(crate) clips: Vec<(String, B::Clip)>,
    size_invalidated: bool,
    clock: FrameClock,
}

impl<B: Backend> ViewState<B> {
    /// Move to `state` unless `ticket` has been superseded.
    pub(crate) fn enter(&mut self, ticket: &ReloadTicket, state: ReloadState) {
        if ticket.is_current() {
            log::debug!("Reload {}: {:?} -> {:?}", ticket.generation(), self.state, state);
            self.state = state;
        }
    }

    /// After a failed mesh stage: keep a character that got as far as `Ready`.
    ///
    /// A mesh that is attached but was never registered with the helper is left
    /// over from a superseded reload. Nothing will finish it, so it goes.
    pub(crate) fn fall_back(&mut self, ticket: &ReloadTicket) {
        if !ticket.is_current() {
            return;
        }
        let state = if self.attachment.is_animated() {
            ReloadState::Ready
        } else {
            if self.attachment.is_attached() {
                log::warn!("Disposing a model whose reload never finished.");
                self.attachment
                    .dispose(&mut self.scenery.scene, &mut self.scenery.helper);
                self.clips.clear();
            }
            ReloadState::Failed
        };
        self.enter(ticket, state);
    }

    fn clip(&self, motion: &str) -> Option<&B::Clip> {
        self.clips
            .iter()
            .find(|(name, _)| name == motion)
            .map(|(_, clip)| clip)
    }
}

/// User facing actions, the viewer's replacement for a UI dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Republish the current renderer statistics.
    Refresh,
    /// The window was resized; recompute the canvas size on the next frame.
    Resize,
    ChangeModel(String),
    ChangeMotion(String),
    PlayMotion,
    ResetPose,
    ResetCamera,
    DisposeModel,
}

impl FromStr for Action {
    type Err = ViewerError;

    /// Parse `name` or `name:argument`, e.g. `change-model:lisa`.
    fn from_str(s: &str) -> Result<Self> {
        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => (name, Some(arg.to_string())),
            None => (s, None),
        };
        let missing = || ViewerError::UnknownAsset {
            kind: "action argument",
            name: s.to_string(),
        };
        Ok(match name {
            "refresh" => Action::Refresh,
            "resize" => Action::Resize,
            "change-model" => Action::ChangeModel(arg.ok_or_else(missing)?),
            "change-motion" => Action::ChangeMotion(arg.ok_or_else(missing)?),
            "play-motion" => Action::PlayMotion,
            "reset-pose" => Action::ResetPose,
            "reset-camera" => Action::ResetCamera,
            "dispose-model" => Action::DisposeModel,
            _ => {
                return Err(ViewerError::UnknownAsset {
                    kind: "action",
                    name: name.to_string(),
                });
            }
        })
    }
}

/// View controller for one canvas.
pub struct Viewer<B: Backend> {
    config: ViewerConfig,
    view: Rc<RefCell<ViewState<B>>>,
    loader: Rc<B::Loader>,
    gate: ReloadGate,
    selection: RefCell<Selection>,
    info: RendererInfoStore,
    mounted: Cell<bool>,
    initialized: Cell<bool>,
    spawner: Spawner,
    last_outcome: Rc<RefCell<Option<Result<ReloadOutcome>>>>,
}

impl<B: Backend> Viewer<B> {
    pub fn new(config: ViewerConfig, scenery: Scenery<B>, loader: B::Loader) -> Result<Self> {
        config.validate()?;
        let selection = Selection::from_catalog(&config.catalog);
        let view = ViewState {
            scenery,
            attachment: SceneAttachment::new(),
            state: ReloadState::Idle,
            clips: Vec::new(),
            size_invalidated: false,
            clock: FrameClock::start(),
        };
        Ok(Self {
            config,
            view: Rc::new(RefCell::new(view)),
            loader: Rc::new(loader),
            gate: ReloadGate::new(),
            selection: RefCell::new(selection),
            info: RendererInfoStore::new(),
            mounted: Cell::new(false),
            initialized: Cell::new(false),
            spawner: platform::default_spawner(),
            last_outcome: Rc::new(RefCell::new(None)),
        })
    }

    /// Run reload tasks on `spawner` instead of the platform executor.
    pub fn with_spawner(mut self, spawner: Spawner) -> Self {
        self.spawner = spawner;
        self
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn renderer_info(&self) -> &RendererInfoStore {
        &self.info
    }

    pub fn selection(&self) -> Selection {
        self.selection.borrow().clone()
    }

    pub fn reload_state(&self) -> ReloadState {
        self.view.borrow().state
    }

    /// Result of the last reload that was not superseded.
    pub fn last_outcome(&self) -> Option<Result<ReloadOutcome>> {
        self.last_outcome.borrow().clone()
    }

    pub fn attached_mesh(&self) -> Option<B::Mesh> {
        self.view.borrow().attachment.mesh().cloned()
    }

    /// Names of the motions whose clips are registered for the attached mesh.
    pub fn loaded_motions(&self) -> Vec<String> {
        self.view
            .borrow()
            .clips
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.get()
    }

    /// Access the scenery, e.g. to add scene objects at startup.
    pub fn with_scenery<R>(&self, f: impl FnOnce(&mut Scenery<B>) -> R) -> R {
        f(&mut self.view.borrow_mut().scenery)
    }

    /// Start showing frames. The first mount remembers the camera state for
    /// [`Action::ResetCamera`] and loads the selected model.
    pub fn mount(&self) {
        if self.mounted.replace(true) {
            return;
        }
        log::info!("Viewer mounted.");
        let first = !self.initialized.replace(true);
        {
            let mut view = self.view.borrow_mut();
            // time spent unmounted is not replayed into the animation
            view.clock = FrameClock::start();
            if first {
                view.scenery.controls.update();
                view.scenery.controls.save_state();
            }
        }
        if first {
            self.reload_model();
        }
    }

    pub fn unmount(&self) {
        if self.mounted.replace(false) {
            log::info!("Viewer unmounted.");
        }
    }

    pub fn dispatch(&self, action: Action) -> Result<()> {
        log::debug!("Dispatch {:?}.", action);
        match action {
            Action::Refresh => {
                self.info.publish(self.info.snapshot());
            }
            Action::Resize => {
                self.view.borrow_mut().size_invalidated = true;
                self.info.publish(self.info.snapshot());
            }
            Action::ChangeModel(name) => {
                let changed = self
                    .selection
                    .borrow_mut()
                    .set_model(&self.config.catalog, &name)?;
                if changed {
                    log::info!("Change Model to {}.", name);
                    self.reload_model();
                }
            }
            Action::ChangeMotion(name) => {
                self.selection
                    .borrow_mut()
                    .set_motion(&self.config.catalog, &name)?;
                match self.play_motion() {
                    Err(ViewerError::ResourceNotRegistered(what)) => {
                        log::info!("Motion {} selected, {} is not ready yet.", name, what)
                    }
                    other => other?,
                }
            }
            Action::PlayMotion => self.play_motion()?,
            Action::ResetPose => self.reset_pose()?,
            Action::ResetCamera => self.reset_camera(),
            Action::DisposeModel => {
                self.dispose_model();
            }
        }
        Ok(())
    }

    /// Build the reload of the selected model without starting it.
    ///
    /// Issuing the task already supersedes any reload still running.
    pub fn reload_task(&self) -> Result<LocalBoxFuture<'static, Result<ReloadOutcome>>> {
        let plan = ReloadPlan::for_model(&self.config, self.selection.borrow().model())?;
        let ticket = self.gate.begin();
        log::info!("Reload {} of {}.", ticket.generation(), plan.model_url);
        Ok(run_reload::<B>(self.view.clone(), self.loader.clone(), ticket, plan).boxed_local())
    }

    /// Reload the selected model in the background. Returns the reload's generation.
    pub fn reload_model(&self) -> u64 {
        let task = match self.reload_task() {
            Ok(task) => task,
            Err(e) => {
                log::error!("Cannot reload model: {}", e);
                *self.last_outcome.borrow_mut() = Some(Err(e));
                return self.gate.generation();
            }
        };
        let last_outcome = self.last_outcome.clone();
        (self.spawner)(
            async move {
                let outcome = task.await;
                match &outcome {
                    Ok(ReloadOutcome::Superseded) => return,
                    Ok(ReloadOutcome::Ready) => (),
                    Err(e) => log::error!("Reload failed: {}", e),
                }
                *last_outcome.borrow_mut() = Some(outcome);
            }
            .boxed_local(),
        );
        self.gate.generation()
    }

    /// Stop any running reload and release the attached character.
    pub fn dispose_model(&self) -> bool {
        self.gate.cancel();
        let mut view = self.view.borrow_mut();
        let view = &mut *view;
        let disposed = view
            .attachment
            .dispose(&mut view.scenery.scene, &mut view.scenery.helper);
        view.clips.clear();
        view.state = ReloadState::Idle;
        disposed
    }

    /// Play the selected motion once from its start.
    pub fn play_motion(&self) -> Result<()> {
        let view = self.view.borrow();
        let mesh = view
            .attachment
            .mesh()
            .ok_or_else(|| ViewerError::ResourceNotRegistered("model".to_string()))?;
        mesh.rest_pose();
        let mixer = view.scenery.helper.mixer(mesh)?;
        mixer.stop_all_action();

        let selection = self.selection.borrow();
        let clip = view.clip(selection.motion()).ok_or_else(|| {
            ViewerError::ResourceNotRegistered(format!("motion '{}'", selection.motion()))
        })?;
        let action = mixer.existing_action(clip).ok_or_else(|| {
            ViewerError::ResourceNotRegistered(format!("action of motion '{}'", selection.motion()))
        })?;
        action.set_loop(LoopMode::Once, 0);
        action.reset();
        action.play();
        log::info!("Playing {}.", selection.motion());
        Ok(())
    }

    /// Stop all motions and rewind the mixer. Registers the mesh with the
    /// animation helper first if that has not happened yet.
    pub fn reset_pose(&self) -> Result<()> {
        let mut view = self.view.borrow_mut();
        let view = &mut *view;
        let mesh = view
            .attachment
            .mesh()
            .cloned()
            .ok_or_else(|| ViewerError::ResourceNotRegistered("model".to_string()))?;
        let helper = &mut view.scenery.helper;
        let mixer = match helper.mixer(&mesh) {
            Ok(mixer) => mixer,
            Err(_) => {
                helper.add(
                    &mesh,
                    AttachOptions {
                        physics: self.config.animation.physics,
                        clips: view.clips.iter().map(|(_, clip)| clip.clone()).collect(),
                        ..Default::default()
                    },
                );
                view.attachment.mark_animated();
                helper.mixer(&mesh)?
            }
        };
        mixer.stop_all_action();
        mixer.set_time(0.0);
        Ok(())
    }

    pub fn reset_camera(&self) {
        self.view.borrow_mut().scenery.controls.reset();
    }

    /// The per-frame callback.
    pub fn frame(&self) {
        self.frame_at(Instant::now());
    }

    /// [`Viewer::frame`] with an explicit clock reading.
    ///
    /// Steps: canvas size sync, controls update, time delta, animation and
    /// effects, render, publish renderer statistics. Does nothing while unmounted.
    pub fn frame_at(&self, now: Instant) {
        if !self.mounted.get() {
            return;
        }
        let info = {
            let mut view = self.view.borrow_mut();
            let view = &mut *view;
            let invalidated = std::mem::take(&mut view.size_invalidated);
            if let Some(resized) = sync_canvas_size::<B>(&mut view.scenery.surface, invalidated) {
                log::debug!(
                    "Canvas resized to {}x{} (aspect {:.3}).",
                    resized.backing_width,
                    resized.backing_height,
                    resized.aspect
                );
            }

            view.scenery.controls.update();

            let delta = view.clock.delta_at(now);
            // the mesh may be absent between a dispose and the next attach
            if view.attachment.is_attached() {
                view.scenery.helper.update(delta);
            }
            for effect in view.scenery.effects.iter_mut() {
                effect.advance(delta);
            }

            view.scenery.surface.render(&view.scenery.scene);
            view.scenery.surface.info()
        };
        self.info.publish(info);
    }
}

impl<B: Backend> fmt::Debug for Viewer<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Viewer")
            .field("state", &self.reload_state())
            .field("selection", &self.selection.borrow())
            .field("mounted", &self.mounted.get())
            .finish()
    }
}
