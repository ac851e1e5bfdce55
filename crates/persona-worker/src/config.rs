//! Loads the room config file and the directory of per-persona config
//! files named by `ROOM_CONFIG_PATH`/`PERSONA_CONFIG_DIR`
//! (`config.room_config_path`/`config.persona_config_dir`).

use std::collections::HashMap;
use std::path::Path;

use chatstorm_domain::{PersonaConfig, RoomConfig};

pub fn load_room_config(path: &str) -> anyhow::Result<RoomConfig> {
    let raw = std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("reading {path}: {e}"))?;
    toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {path}: {e}"))
}

/// Reads every `*.toml` file directly under `dir` as one [`PersonaConfig`],
/// keyed by `persona.id`. A persona file whose `id` doesn't match any
/// `enabled_personas` entry is still loaded; enrollment is decided by the
/// room config, not by which files exist on disk.
pub fn load_persona_configs(dir: &str) -> anyhow::Result<HashMap<String, PersonaConfig>> {
    let dir_path = Path::new(dir);
    let mut personas = HashMap::new();

    if !dir_path.is_dir() {
        return Ok(personas);
    }

    for entry in std::fs::read_dir(dir_path).map_err(|e| anyhow::anyhow!("reading {dir}: {e}"))? {
        let entry = entry.map_err(|e| anyhow::anyhow!("reading entry in {dir}: {e}"))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("toml") {
            continue;
        }
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
        let persona: PersonaConfig = toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("parsing {}: {e}", path.display()))?;
        personas.insert(persona.id.clone(), persona);
    }

    Ok(personas)
}
