//! The single character mesh attached to the scene.

use crate::backend::{AnimationHelper, Backend, SceneGraph, SkinnedMesh};

/// Owns at most one active character mesh.
///
/// The rendering library keeps geometry, materials, textures and the skeleton's
/// bone texture on the GPU until they are disposed explicitly, so a mesh is
/// never dropped without going through [`SceneAttachment::dispose`].
pub struct SceneAttachment<B: Backend> {
    mesh: Option<B::Mesh>,
    /// Whether the mesh has been registered with the animation helper.
    animated: bool,
}

impl<B: Backend> Default for SceneAttachment<B> {
    fn default() -> Self {
        Self {
            mesh: None,
            animated: false,
        }
    }
}

impl<B: Backend> SceneAttachment<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mesh(&self) -> Option<&B::Mesh> {
        self.mesh.as_ref()
    }

    pub fn is_attached(&self) -> bool {
        self.mesh.is_some()
    }

    pub fn is_animated(&self) -> bool {
        self.animated
    }

    /// Add `mesh` to the scene. An already attached mesh is disposed first.
    pub fn attach(&mut self, mesh: B::Mesh, scene: &mut B::Scene, helper: &mut B::Helper) {
        if self.mesh.is_some() {
            self.dispose(scene, helper);
        }
        scene.add_mesh(&mesh);
        self.mesh = Some(mesh);
    }

    /// Record that the mesh got registered with the animation helper.
    pub fn mark_animated(&mut self) {
        self.animated = self.mesh.is_some();
    }

    /// Release the attached mesh and everything it owns on the GPU.
    ///
    /// Order: unregister from the animation helper, remove from the scene,
    /// geometry, materials with their textures, then bone texture and skeleton.
    /// Returns `false` (and does nothing) when no mesh is attached.
    pub fn dispose(&mut self, scene: &mut B::Scene, helper: &mut B::Helper) -> bool {
        let Some(mesh) = self.mesh.take() else {
            log::debug!("No model is loaded.");
            return false;
        };
        if helper.mixer(&mesh).is_ok() {
            helper.remove(&mesh);
        }
        self.animated = false;
        scene.remove_mesh(&mesh);
        mesh.dispose_geometry();
        mesh.dispose_materials();
        mesh.dispose_skeleton();
        log::info!("Model disposed.");
        true
    }
}

impl<B: Backend> std::fmt::Debug for SceneAttachment<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneAttachment")
            .field("mesh", &self.mesh)
            .field("animated", &self.animated)
            .finish()
    }
}
