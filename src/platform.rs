//! The few things that differ between the browser and native builds.

use std::rc::Rc;

use futures::future::LocalBoxFuture;

/// Runs a local (non-`Send`) task to completion in the background.
pub type Spawner = Rc<dyn Fn(LocalBoxFuture<'static, ()>)>;

/// Spawn on the current thread's executor.
///
/// On wasm32 this is the browser's microtask queue. On native it requires a
/// running `tokio::task::LocalSet`.
pub fn spawn_local(task: LocalBoxFuture<'static, ()>) {
    #[cfg(target_arch = "wasm32")]
    {
        wasm_bindgen_futures::spawn_local(task);
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        tokio::task::spawn_local(task);
    }
}

pub fn default_spawner() -> Spawner {
    Rc::new(spawn_local)
}

/// Install the platform logger. Safe to call more than once.
pub fn init_logger() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Info) {
            web_sys_log(&format!("Warning: Could not initialize logger: {}", e));
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn web_sys_log(msg: &str) {
    // the logger is not available, so go through the console binding of the web module
    crate::web::console_log(msg);
}
