use crate::db::local::{self, EngineConfig};
use crate::error::GenerationError;
use crate::state::AppState;

pub fn get_engine_config(state: &AppState) -> EngineConfig {
    state.config.clone()
}

/// Persist `config` (normalized) and make it the live configuration.
pub async fn set_engine_config(
    state: &mut AppState,
    config: EngineConfig,
) -> Result<EngineConfig, GenerationError> {
    let config = config.normalized();
    local::save_engine_config(&state.local_db, &config).await?;
    log::info!(
        "[config] saved: export_dir={} max_track_count={} jingle_pool_limit={}",
        config.export_dir,
        config.max_track_count,
        config.jingle_pool_limit
    );
    state.config = config.clone();
    Ok(config)
}
