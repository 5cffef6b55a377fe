//! Per-Session Workspace
//!
//! Every session owns a private directory under the work root. The
//! generated script, its output files and the published semantic model
//! all live there, so concurrent sessions never share artifacts.
//!
//! ```text
//! <work_root>/<session_id>/
//!   generated_script.py
//!   generated_csvs/*.csv
//!   semantic_model.yaml
//!   script_stdout.log, script_stderr.log
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::workflow::checkpoint::SessionId;

pub const OUTPUT_DIR: &str = "generated_csvs";
pub const SCRIPT_FILE: &str = "generated_script.py";
pub const SEMANTIC_MODEL_FILE: &str = "semantic_model.yaml";
pub const STDOUT_LOG: &str = "script_stdout.log";
pub const STDERR_LOG: &str = "script_stderr.log";

#[derive(Debug, Clone, PartialEq)]
pub struct SessionWorkspace {
    root: PathBuf,
}

impl SessionWorkspace {
    /// Returns the workspace of a session without touching the filesystem.
    pub fn for_session(work_root: &Path, session_id: &SessionId) -> Self {
        Self {
            root: work_root.join(session_id.as_str()),
        }
    }

    /// Returns the workspace of a session, creating its directory.
    pub fn create(work_root: &Path, session_id: &SessionId) -> io::Result<Self> {
        let workspace = Self::for_session(work_root, session_id);
        fs::create_dir_all(&workspace.root)?;
        debug!("Workspace ready: {}", workspace.root.display());
        Ok(workspace)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    pub fn script_path(&self) -> PathBuf {
        self.root.join(SCRIPT_FILE)
    }

    pub fn semantic_model_path(&self) -> PathBuf {
        self.root.join(SEMANTIC_MODEL_FILE)
    }

    pub fn stdout_log(&self) -> PathBuf {
        self.root.join(STDOUT_LOG)
    }

    pub fn stderr_log(&self) -> PathBuf {
        self.root.join(STDERR_LOG)
    }

    /// Deletes the previous run's output and recreates an empty output directory.
    pub fn reset_output_dir(&self) -> io::Result<PathBuf> {
        let dir = self.output_dir();
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Names of files in the output directory with the given extension, sorted.
    pub fn list_output_files(&self, extension: &str) -> io::Result<Vec<String>> {
        let dir = self.output_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            let matches = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case(extension))
                .unwrap_or(false);
            if matches {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    /// Removes the whole workspace. Missing workspaces are ignored.
    pub fn remove(&self) -> io::Result<()> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root)?;
            debug!("Removed workspace: {}", self.root.display());
        }
        Ok(())
    }
}
