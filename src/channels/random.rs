//! Random channel: uniform pick over proxy-bearing assets.

use crate::error::Result;
use crate::normalize;
use crate::store::Store;

/// Resolve the URL to serve: a uniformly random proxy-bearing asset, or
/// the configured fallback when the asset table is empty. No history is
/// tracked for this channel.
pub async fn resolve_url(store: &dyn Store, fallback_url: &str) -> Result<String> {
    Ok(store
        .random_proxy_asset()
        .await?
        .and_then(|a| a.serve_url().map(str::to_string))
        .unwrap_or_else(|| fallback_url.to_string()))
}

/// Full render path: resolve, fetch-and-adapt, encode as BMP.
pub async fn render(
    store: &dyn Store,
    http: &reqwest::Client,
    fallback_url: &str,
    width: u32,
    height: u32,
) -> Result<Vec<u8>> {
    let url = resolve_url(store, fallback_url).await?;
    let adapted = normalize::fetch_and_adapt(http, &url, fallback_url, width, height).await?;
    normalize::encode_bmp(&adapted.image)
}
