use std::path::Path;

use anyhow::Context;
use fake_user_agent::get_chrome_rua;
use kinedl::Config;

/// Read the TOML configuration. A missing file falls back to the defaults.
///
/// ```toml
/// temp_dir = "/tmp/kinedl"
/// output_dir = "videos"
/// quality = "high"
///
/// [tools]
/// ffmpeg = "ffmpeg"
/// mp4decrypt = "/opt/bento4/bin/mp4decrypt"
/// ```
pub fn load(path: &Path) -> anyhow::Result<Config> {
    let mut config = if path.exists() {
        let data = std::fs::read_to_string(path)?;
        toml::from_str(&data)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?
    } else {
        tracing::info!("{} not found, using default settings", path.display());
        Config::new(std::env::temp_dir().join("kinedl"), "videos")
    };

    if config.http.user_agent.is_none() {
        config.http.user_agent = Some(get_chrome_rua().to_string());
    }
    Ok(config)
}
