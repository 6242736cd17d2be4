//! Project Scaffolding
//!
//! Mints the project identity and lays out the package skeleton that every
//! generator writes into.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::state::{FileRecord, PipelineState};
use crate::constants::layout;
use crate::types::{ForgeError, ProjectId, Result};

/// Create `<output_root>/<id>` with its package directories and markers
pub fn create_layout(output_root: &Path, id: &ProjectId) -> Result<PathBuf> {
    let project_dir = output_root.join(id.as_str());
    let scaffold_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ForgeError::Scaffold { path, source }
    };

    std::fs::create_dir_all(&project_dir).map_err(scaffold_err(&project_dir))?;
    for dir in layout::DIRECTORIES {
        let path = project_dir.join(dir);
        std::fs::create_dir_all(&path).map_err(scaffold_err(&path))?;
    }
    for marker in layout::PACKAGE_MARKERS {
        let path = project_dir.join(marker);
        std::fs::write(&path, b"").map_err(scaffold_err(&path))?;
    }
    Ok(project_dir)
}

/// Scaffold stage
pub fn run(output_root: &Path, mut state: PipelineState) -> PipelineState {
    let id = ProjectId::generate();

    let project_dir = match create_layout(output_root, &id) {
        Ok(dir) => dir,
        Err(e) => {
            warn!("Scaffolding failed: {}", e);
            state.fail(format!("Error generating project structure: {}", e));
            return state;
        }
    };

    if let Err(e) = state.assign_project(id.clone(), project_dir.clone()) {
        warn!("{}", e);
        state.fail(format!("Error generating project structure: {}", e));
        return state;
    }

    info!(project_id = %id, "Scaffolded project at {}", project_dir.display());
    state.record_file(FileRecord::directory(&project_dir, "Project root directory"));
    state.system_message(format!(
        "Generated project structure at {}",
        project_dir.display()
    ));
    state
}
