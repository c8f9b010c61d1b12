//! Application state shared with the UI.
//!
//! [`Selection`] holds the model and motion the user picked, [`RendererInfoStore`]
//! the renderer statistics republished after every frame. Both are owned by the
//! [`crate::viewer::Viewer`]; nothing here is global.

use std::{cell::RefCell, fmt, rc::Rc};

use crate::{config::Catalog, error::Result};

/// Counters of the renderer after a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RendererInfo {
    /// Geometries currently uploaded to the GPU.
    pub geometries: u64,
    /// Textures currently uploaded to the GPU.
    pub textures: u64,
    pub calls: u64,
    pub triangles: u64,
    pub points: u64,
    pub lines: u64,
    /// Frame number as counted by the renderer.
    pub frame: u64,
}

impl RendererInfo {
    /// Label / value pairs in display order.
    pub fn rows(&self) -> [(&'static str, u64); 7] {
        [
            ("MemoryGeometries", self.geometries),
            ("MemoryTextures", self.textures),
            ("RenderCalls", self.calls),
            ("RenderTriangles", self.triangles),
            ("RenderPoints", self.points),
            ("RenderLines", self.lines),
            ("RenderFrame", self.frame),
        ]
    }
}

impl fmt::Display for RendererInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = self.rows();
        for (i, (label, value)) in rows.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} : {}", label, value)?;
        }
        Ok(())
    }
}

type Subscriber = Box<dyn Fn(&RendererInfo)>;

/// Observable holder of the latest [`RendererInfo`].
///
/// Cloning yields another handle to the same store.
#[derive(Clone, Default)]
pub struct RendererInfoStore {
    inner: Rc<RefCell<StoreInner>>,
}

#[derive(Default)]
struct StoreInner {
    latest: RendererInfo,
    published: u64,
    subscribers: Vec<Subscriber>,
}

impl RendererInfoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored info and notify every subscriber.
    pub fn publish(&self, info: RendererInfo) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.latest = info;
            inner.published += 1;
        }
        // subscribers may read the store again, so no borrow is held while notifying
        let subscribers = std::mem::take(&mut self.inner.borrow_mut().subscribers);
        for subscriber in &subscribers {
            subscriber(&info);
        }
        let mut inner = self.inner.borrow_mut();
        let added = std::mem::replace(&mut inner.subscribers, subscribers);
        inner.subscribers.extend(added);
    }

    pub fn snapshot(&self) -> RendererInfo {
        self.inner.borrow().latest
    }

    /// How many times [`RendererInfoStore::publish`] was called.
    pub fn published(&self) -> u64 {
        self.inner.borrow().published
    }

    pub fn subscribe(&self, subscriber: impl Fn(&RendererInfo) + 'static) {
        self.inner.borrow_mut().subscribers.push(Box::new(subscriber));
    }
}

impl fmt::Debug for RendererInfoStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("RendererInfoStore")
            .field("latest", &inner.latest)
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

/// The model and motion currently picked by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    model: String,
    motion: String,
}

impl Selection {
    pub fn from_catalog(catalog: &Catalog) -> Self {
        Self {
            model: catalog.default_model.clone(),
            motion: catalog.default_motion.clone(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn motion(&self) -> &str {
        &self.motion
    }

    /// Select another model. Returns `Ok(false)` when it already was the current one.
    pub fn set_model(&mut self, catalog: &Catalog, name: &str) -> Result<bool> {
        catalog.model(name)?;
        if self.model == name {
            return Ok(false);
        }
        self.model = name.to_string();
        Ok(true)
    }

    pub fn set_motion(&mut self, catalog: &Catalog, name: &str) -> Result<bool> {
        catalog.motion(name)?;
        if self.motion == name {
            return Ok(false);
        }
        self.motion = name.to_string();
        Ok(true)
    }
}
