use tvsurf::models::Config;

use crate::cli::ConfigSubcommand;
use crate::commands::Backend;
use crate::errors::Result;
use crate::state::AppState;

pub async fn config(state: &AppState, command: ConfigSubcommand) -> Result<()> {
    let backend = Backend::open(state)?;
    let client = backend.online("server configuration")?;
    let mut config = tvsurf::config::get(client).await?;
    match command {
        ConfigSubcommand::Show => print!("{}", render_config(&config)),
        ConfigSubcommand::Set { key, value } => {
            config.set(&key, &value)?;
            tvsurf::config::set(client, &config).await?;
            println!("{key} = {}", config.get(&key).unwrap_or_default());
        }
    }
    Ok(())
}

fn render_config(config: &Config) -> String {
    Config::KEYS
        .iter()
        .map(|key| format!("{key} = {}\n", config.get(key).unwrap_or_default()))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_render_config() {
        let config: Config = serde_json::from_value(json!({
            "updater": {"update_interval": 3600, "tracking_timeout": "P1D", "update_parallel": 4},
            "download": {
                "connect_timeout": "30s", "chunk_size": 1_048_576,
                "max_concurrent_fragments": 8, "max_concurrent_downloads": 2,
                "max_retries": 3, "download_timeout": "1h", "retry_interval": "5m"
            },
            "db": {"save_interval": "10m"}
        }))
        .unwrap();
        let rendered = render_config(&config);
        assert!(rendered.starts_with("updater.update_interval = 1h\n"));
        assert!(rendered.contains("updater.tracking_timeout = 1d\n"));
        assert!(rendered.contains("download.chunk_size = 1MB\n"));
        assert_eq!(rendered.lines().count(), Config::KEYS.len());
    }
}
