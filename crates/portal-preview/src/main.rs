mod app;
mod demo;
mod site;

use eframe::NativeOptions;
use portal_player::PlayerConfig;

use crate::app::PortalPreviewApp;

/// Optional JSON overrides, same shape as the page's `data-player-config`.
const CONFIG_ENV: &str = "PORTAL_PLAYER_CONFIG";

fn load_config() -> PlayerConfig {
    let Ok(raw) = std::env::var(CONFIG_ENV) else {
        return PlayerConfig::default();
    };
    PlayerConfig::from_json(&raw).unwrap_or_else(|e| {
        log::warn!("ignoring {CONFIG_ENV}: {e}");
        PlayerConfig::default()
    })
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let app = PortalPreviewApp::new(load_config());
    if let Err(e) = eframe::run_native(
        "Portal Player Preview",
        NativeOptions::default(),
        Box::new(|_cc| Ok(Box::new(app))),
    ) {
        log::error!("failed to start preview: {e}");
    }
}
