use chatstorm_domain::Config;
use clap::{Parser, Subcommand};

/// chatstorm-persona-worker — reacts to `chat.firehose` and `observations`
/// on behalf of the room's enrolled personas, publishing replies on
/// `chat.ingest`.
#[derive(Debug, Parser)]
#[command(name = "chatstorm-persona-worker", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the worker (default when no subcommand is given).
    Serve,
    /// Parse the config file and report any validation issues.
    ConfigValidate,
    /// Dump the resolved configuration (with defaults) as TOML.
    ConfigShow,
    /// Print version information.
    Version,
}

/// Load configuration from the path in `CHATSTORM_CONFIG` (default
/// `config.toml`). Falls back to [`Config::default()`] if the file does
/// not exist.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("CHATSTORM_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        Config::default()
    };

    Ok((config, config_path))
}
