use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::error::StageError;

/// Resume files available for applications, sorted by name.
pub fn list_resumes(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Err(StageError::NoResumesFound(dir.display().to_string()).into());
    }

    let mut names: Vec<String> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read resume directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();

    if names.is_empty() {
        return Err(StageError::NoResumesFound(dir.display().to_string()).into());
    }
    Ok(names)
}

/// Absolute path to a named resume, for the file-upload input.
pub fn resume_path(dir: &Path, name: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    if !path.is_file() {
        return Err(StageError::NoResumesFound(path.display().to_string()).into());
    }
    path.canonicalize()
        .with_context(|| format!("Failed to resolve resume path: {}", path.display()))
}

/// The free-text personal profile handed to the AI collaborator when drafting
/// answers.
pub fn load_knowledge_base(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(StageError::KnowledgeBaseNotFound(path.display().to_string()).into());
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read knowledge base: {}", path.display()))
}
