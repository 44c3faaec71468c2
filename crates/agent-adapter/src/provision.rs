//! Ephemeral configuration files scoped to one call

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::{debug, warn};

use crate::request::McpConfig;

/// A temporary file backing an inline configuration
///
/// The file is removed by [`EphemeralResource::release`] or, failing that,
/// when the value is dropped (including during unwinding).
#[derive(Debug)]
pub struct EphemeralResource {
    path: TempPath,
}

impl EphemeralResource {
    /// Serialize an MCP config into a uniquely named JSON file
    ///
    /// Uses `scratch_dir` when given, the system temp dir otherwise.
    pub fn mcp_config(config: &McpConfig, scratch_dir: Option<&Path>) -> std::io::Result<Self> {
        let body = serde_json::to_vec_pretty(config)?;

        let mut builder = tempfile::Builder::new();
        builder.prefix("agent-mcp-").suffix(".json");
        let mut file = match scratch_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                builder.tempfile_in(dir)?
            }
            None => builder.tempfile()?,
        };

        file.write_all(&body)?;
        file.flush()?;

        let path = file.into_temp_path();
        debug!("Provisioned MCP config at {:?}", &*path);
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file now
    pub fn release(self) {
        let path: PathBuf = self.path.to_path_buf();
        if let Err(e) = self.path.close() {
            warn!("Failed to remove ephemeral file {:?}: {}", path, e);
        } else {
            debug!("Released ephemeral file {:?}", path);
        }
    }
}
