/**
 * Loading of plain text assets (configuration) from the asset directory.
 *
 * Model, pose and motion files are never read here: the MMD loader of the
 * rendering library fetches and parses them itself, see `crate::loader`.
 */

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().ok_or_else(|| anyhow::anyhow!("no window"))?;
    let href = window
        .location()
        .href()
        .map_err(|e| anyhow::anyhow!("cannot read page location: {:?}", e))?;
    let base = reqwest::Url::parse(&href)?;
    Ok(base.join(&format!("assets/{}", file_name))?)
}

/// Path of an asset on native targets. `build.rs` copies `assets/` into `OUT_DIR`.
#[cfg(not(target_arch = "wasm32"))]
pub fn asset_path(file_name: &str) -> std::path::PathBuf {
    std::path::Path::new(env!("OUT_DIR"))
        .join("assets")
        .join(file_name)
}

pub async fn load_string(file_name: &str) -> anyhow::Result<String> {
    #[cfg(target_arch = "wasm32")]
    let txt = {
        let url = format_url(file_name)?;
        let response = reqwest::get(url).await?.error_for_status()?;
        response.text().await?
    };
    #[cfg(not(target_arch = "wasm32"))]
    let txt = {
        let path = asset_path(file_name);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?
    };

    Ok(txt)
}
