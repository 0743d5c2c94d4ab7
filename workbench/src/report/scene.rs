use anyhow::Context;
use std::path::PathBuf;
use uscore::display::Scene;

/// Writes scene reports for the visualizer, or just announces them when no path is set.
pub struct SceneWriter {
    path: Option<PathBuf>,
}

impl SceneWriter {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn enabled(&self) -> bool {
        self.path.is_some()
    }

    pub fn publish(&self, scene: &Scene) -> anyhow::Result<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating scene directory {}", parent.display()))?;
        }
        scene
            .save(path)
            .with_context(|| format!("writing scene {}", path.display()))?;
        println!("[scene] '{}' -> {}", scene.title, path.display());
        Ok(())
    }

    pub fn publish_status(&self, message: &str) {
        println!("[scene] {}", message);
    }
}
