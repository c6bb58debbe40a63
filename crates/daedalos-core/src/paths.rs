//! Standard paths used by Daedalos tools

use std::path::PathBuf;

/// Standard Daedalos paths
#[derive(Debug, Clone)]
pub struct Paths {
    /// Config directory (~/.config/daedalos)
    pub config: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    pub fn new() -> Self {
        let config = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("daedalos");

        Self { config }
    }

    /// Get the JSON config file for a tool (~/.config/daedalos/<tool>.json)
    pub fn tool_config(&self, tool: &str) -> PathBuf {
        self.config.join(format!("{}.json", tool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_config_path() {
        let paths = Paths::new();
        let path = paths.tool_config("pomodoro");
        assert!(path.ends_with("daedalos/pomodoro.json"));
    }
}
