//! SPIR-V shader loading.

use crate::error::{GpuError, Result};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Read a SPIR-V binary from disk into 32-bit words.
pub fn load_spirv(path: impl AsRef<Path>) -> Result<Vec<u32>> {
    let path = path.as_ref();
    let shader_load = |source| GpuError::ShaderLoad {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(shader_load)?;
    let words = ash::util::read_spv(&mut file).map_err(shader_load)?;

    tracing::debug!("Loaded shader {} ({} words)", path.display(), words.len());
    Ok(words)
}

/// Vertex and fragment byte code for one graphics pipeline.
#[derive(Debug, Clone)]
pub struct ShaderStages {
    pub vertex: Vec<u32>,
    pub fragment: Vec<u32>,
}

impl ShaderStages {
    /// Load both stages from SPIR-V files.
    pub fn load(vertex: impl AsRef<Path>, fragment: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            vertex: load_spirv(vertex)?,
            fragment: load_spirv(fragment)?,
        })
    }
}

/// Paths of the two SPIR-V files making up a [`ShaderStages`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderPaths {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

impl ShaderPaths {
    pub fn new(vertex: impl Into<PathBuf>, fragment: impl Into<PathBuf>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    pub fn load(&self) -> Result<ShaderStages> {
        ShaderStages::load(&self.vertex, &self.fragment)
    }
}
