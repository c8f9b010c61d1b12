//! mmd-viewer
//!
//! A browser viewer for MikuMikuDance characters. Rendering, skinning, physics
//! and MMD file parsing are done by three.js; this crate drives it: it loads a
//! model with its poses and motions in order, keeps exactly one character in
//! the scene, runs the per-frame render callback and publishes renderer
//! statistics to the page. Everything except the `web` module also builds
//! natively, which is how it is tested.
//!
//! High-level modules
//! - `backend`: the capabilities the viewer needs from the rendering library
//! - `loader`: callback loads as streams, and batches of them as one merged stream
//! - `sequencer`: the mesh -> poses -> motions reload and its supersession rules
//! - `attachment`: owning and disposing the single character mesh
//! - `frame`: frame clock and canvas size synchronisation
//! - `viewer`: the view controller tying the above together
//! - `store`: renderer statistics and the current selection
//! - `config`: camera, scene and asset catalog configuration
//! - `resources`: reading text assets
//! - `web` (wasm32 only): three.js bindings and the page entry point
//!

pub mod attachment;
pub mod backend;
pub mod config;
pub mod error;
pub mod frame;
pub mod loader;
pub mod platform;
pub mod resources;
pub mod sequencer;
pub mod store;
pub mod viewer;
#[cfg(target_arch = "wasm32")]
pub mod web;

// Re-exports commonly used types for convenience in downstream code.
pub use backend::Backend;
pub use config::{ViewerConfig, load_config, load_config_or_default};
pub use error::{Result, ViewerError};
pub use loader::{CancelToken, LoadEvent, LoadPipeline, LoadSignal, load_all};
pub use sequencer::{ReloadOutcome, ReloadState};
pub use store::{RendererInfo, RendererInfoStore, Selection};
pub use viewer::{Action, Scenery, Viewer};
