//! Browser entry point.
//!
//! Builds the three.js scene described by [`ViewerConfig`], wires the viewer
//! to `setAnimationLoop` and the window's resize event, and exports a small
//! API to the page:
//!
//! - `mount()` / `unmount()` start and stop the render loop
//! - `dispatch_action("change-model:lisa")` forwards user actions
//!
//! # Key types
//!
//! - [`ThreeBackend`] implements [`crate::backend::Backend`] with three.js
//! - [`Page`] holds the mounted viewer and the JS closures bound to it

use std::{cell::RefCell, f64::consts::PI, rc::Rc};

use anyhow::anyhow;
use js_sys::{Function, Reflect};
use wasm_bindgen::{JsCast, prelude::*};
use wasm_bindgen_futures::JsFuture;

mod backend;
mod three;

use three::Uniforms;

pub use backend::{Ocean, ThreeBackend, ThreeLoader, ThreeSurface};
pub(crate) use three::console_log;

use crate::{
    config::{SkyConfig, ViewerConfig, load_config_or_default},
    platform,
    store::RendererInfo,
    viewer::{Action, Scenery, Viewer},
};

const CONFIG_FILE: &str = "viewer.json";

/// The viewer of this page and the closures that keep it running.
pub struct Page {
    viewer: Rc<Viewer<ThreeBackend>>,
    renderer: three::WebGlRenderer,
    render_loop: Closure<dyn FnMut()>,
}

thread_local! {
    static PAGE: RefCell<Option<Page>> = const { RefCell::new(None) };
}

#[wasm_bindgen(start)]
pub fn start() {
    platform::init_logger();
    platform::spawn_local(Box::pin(async {
        if let Err(e) = run().await {
            log::error!("Viewer could not be started: {:#}", e);
        }
    }));
}

async fn run() -> anyhow::Result<()> {
    let config = load_config_or_default(CONFIG_FILE).await;
    wait_for_physics().await;

    let (viewer, renderer) = build_viewer(config)?;
    let viewer = Rc::new(viewer);

    let frame_viewer = viewer.clone();
    let render_loop = Closure::<dyn FnMut()>::new(move || frame_viewer.frame());

    let resize_viewer = viewer.clone();
    let on_resize = Closure::<dyn FnMut()>::new(move || {
        if let Err(e) = resize_viewer.dispatch(Action::Resize) {
            log::warn!("Resize failed: {}", e);
        }
    });
    let window = web_sys::window().ok_or_else(|| anyhow!("no window"))?;
    window
        .add_event_listener_with_callback("resize", on_resize.as_ref().unchecked_ref())
        .map_err(|e| anyhow!("cannot listen to resize events: {:?}", e))?;
    // lives as long as the page
    on_resize.forget();

    subscribe_info_pane(&viewer, &window);

    PAGE.with(|page| {
        *page.borrow_mut() = Some(Page {
            viewer,
            renderer,
            render_loop,
        })
    });
    mount();
    Ok(())
}

/// Ammo.js is a factory function until it has been initialised; physics needs it resolved.
async fn wait_for_physics() {
    let Ok(ammo) = Reflect::get(&js_sys::global(), &"Ammo".into()) else {
        return;
    };
    let Some(factory) = ammo.dyn_ref::<Function>() else {
        return;
    };
    log::info!("Waiting for Ammo.js.");
    match factory.call0(&JsValue::UNDEFINED) {
        Ok(promise) => {
            if let Ok(promise) = promise.dyn_into::<js_sys::Promise>() {
                if let Err(e) = JsFuture::from(promise).await {
                    log::warn!("Ammo.js failed to initialise: {:?}", e);
                }
            }
        }
        Err(e) => log::warn!("Ammo.js failed to initialise: {:?}", e),
    }
}

fn js(e: JsValue) -> anyhow::Error {
    anyhow!("{:?}", e)
}

fn build_viewer(config: ViewerConfig) -> anyhow::Result<(Viewer<ThreeBackend>, three::WebGlRenderer)> {
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| anyhow!("no document"))?;
    let canvas = document
        .get_element_by_id(&config.canvas_id)
        .ok_or_else(|| anyhow!("canvas #{} not found", config.canvas_id))?;

    let renderer = three::WebGlRenderer::new(&three::object(&[
        ("canvas", canvas.into()),
        ("antialias", true.into()),
    ]).map_err(js)?);
    renderer.set_physically_correct_lights(true);

    let c = &config.camera;
    let camera = three::PerspectiveCamera::new(c.fov, c.aspect, c.near, c.far);
    camera.position().set(c.position.x, c.position.y, c.position.z);
    camera.up().set(c.up.x, c.up.y, c.up.z);
    camera.look_at(c.look_at.x, c.look_at.y, c.look_at.z);

    let scene = three::Scene::new();
    scene.set_background(&three::Color::new(config.background));

    let controls = three::OrbitControls::new(&camera, &renderer.dom_element());
    let t = &config.controls.target;
    controls.target().set(t.x, t.y, t.z);
    controls.set_enable_pan(config.controls.enable_pan);
    controls.set_max_distance(config.controls.max_distance);
    controls.set_min_distance(config.controls.min_distance);
    controls.set_max_polar_angle(config.controls.max_polar_angle.0);

    if config.sky.enabled {
        let sky = three::Sky::new();
        sky.scale().set_scalar(config.sky.scale);
        let s = &config.sky;
        for (name, value) in [
            ("turbidity", s.turbidity),
            ("rayleigh", s.rayleigh),
            ("mieCoefficient", s.mie_coefficient),
            ("mieDirectionalG", s.mie_directional_g),
        ] {
            sky.set_uniform(name, &value.into()).map_err(js)?;
        }
        sky.set_uniform("sunPosition", &sun_position(s)).map_err(js)?;
        scene.add(&sky);
    }

    let mut effects: Vec<Box<dyn crate::backend::Effect>> = Vec::new();
    if config.ocean.enabled {
        let o = &config.ocean;
        let normals = three::TextureLoader::new().load(&o.normal_texture);
        normals.set_wrap_s(three::REPEAT_WRAPPING);
        normals.set_wrap_t(three::REPEAT_WRAPPING);
        let water = three::Water::new(
            &three::PlaneGeometry::new(o.width, o.height),
            &three::object(&[
                ("textureWidth", o.texture_size.into()),
                ("textureHeight", o.texture_size.into()),
                ("waterNormals", normals.into()),
                ("alpha", o.alpha.into()),
                ("sunDirection", sun_position(&config.sky).normalize().into()),
                ("sunColor", o.sun_color.into()),
                ("waterColor", o.water_color.into()),
                ("distortionScale", o.distortion_scale.into()),
                ("fog", false.into()),
            ])
            .map_err(js)?,
        );
        water.set_uniform("size", &o.wave_size.into()).map_err(js)?;
        water.rotation().set_x(-PI / 2.0);
        water.position().set(0.0, o.level, 0.0);
        scene.add(&water);
        effects.push(Box::new(Ocean::new(water)));
    }

    let l = &config.light;
    scene.add(&three::HemisphereLight::new(l.sky_color, l.ground_color, l.intensity));

    let helper = three::MMDAnimationHelper::new(
        &three::object(&[("afterglow", config.animation.afterglow.into())]).map_err(js)?,
    );

    let scenery = Scenery {
        surface: ThreeSurface::new(renderer.clone(), camera),
        controls,
        scene,
        helper,
        effects,
    };
    let viewer = Viewer::new(config, scenery, ThreeLoader::new())?;
    Ok((viewer, renderer))
}

/// Sun direction from the sky's inclination and azimuth, both in turns.
fn sun_position(sky: &SkyConfig) -> three::Vector3 {
    let theta = PI * (sky.inclination - 0.5);
    let phi = 2.0 * PI * (sky.azimuth - 0.5);
    three::Vector3::new(phi.cos(), phi.sin() * theta.sin(), phi.sin() * theta.cos())
}

fn subscribe_info_pane(viewer: &Viewer<ThreeBackend>, window: &web_sys::Window) {
    let Some(pane) = window
        .document()
        .and_then(|d| d.get_element_by_id(&viewer.config().info_pane_id))
    else {
        log::info!("No info pane on this page.");
        return;
    };
    viewer.renderer_info().subscribe(move |info: &RendererInfo| {
        let html: String = info
            .rows()
            .iter()
            .map(|(label, value)| format!("<li>{} : {}</li>", label, value))
            .collect();
        pane.set_inner_html(&format!("<ul>{}</ul>", html));
    });
}

/// Start the render loop. The first call also loads the selected model.
#[wasm_bindgen]
pub fn mount() {
    PAGE.with(|page| {
        if let Some(page) = page.borrow().as_ref() {
            page.viewer.mount();
            page.renderer
                .set_animation_loop(Some(page.render_loop.as_ref().unchecked_ref()));
        }
    });
}

#[wasm_bindgen]
pub fn unmount() {
    PAGE.with(|page| {
        if let Some(page) = page.borrow().as_ref() {
            page.renderer.set_animation_loop(None);
            page.viewer.unmount();
        }
    });
}

/// Forward a user action, e.g. `"change-motion:dance2"` or `"reset-camera"`.
#[wasm_bindgen]
pub fn dispatch_action(action: &str) -> Result<(), JsError> {
    let action: Action = action.parse()?;
    PAGE.with(|page| match page.borrow().as_ref() {
        Some(page) => page.viewer.dispatch(action).map_err(JsError::from),
        None => Err(JsError::new("viewer is not started yet")),
    })
}
