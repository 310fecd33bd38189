//! On-disk storage of runner authentication tokens
//!
//! One file per runner at `<config-dir>/auth-token-<runner-name>`, holding the
//! raw token. Surrounding whitespace is trimmed on read.

use crate::{RunnerCredential, RunnerError};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_DIR: &str = "/etc/gitlab-runner";
const TOKEN_FILE_PREFIX: &str = "auth-token-";

#[derive(Debug, Clone)]
pub struct TokenStore {
    dir: PathBuf,
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIG_DIR)
    }
}

impl TokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the token file for `runner_name`.
    pub fn path_for(&self, runner_name: &str) -> crate::Result<PathBuf> {
        validate_runner_name(runner_name)?;
        Ok(self
            .dir
            .join(format!("{}{}", TOKEN_FILE_PREFIX, runner_name)))
    }

    /// Read a stored token, or `None` when no file exists for this runner.
    pub fn read(&self, runner_name: &str) -> crate::Result<Option<RunnerCredential>> {
        let path = self.path_for(runner_name)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(RunnerCredential::new(content.trim()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RunnerError::Io(e)),
        }
    }

    /// Persist a token. Creates the config dir (0700) if missing; the token
    /// file itself is left read-only for its owner (0400).
    pub fn write(
        &self,
        runner_name: &str,
        credential: &RunnerCredential,
    ) -> crate::Result<PathBuf> {
        let path = self.path_for(runner_name)?;

        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
            set_mode(&self.dir, 0o700)?;
        }

        let mut file = fs::File::create(&path)?;
        file.write_all(credential.as_str().as_bytes())?;
        file.sync_all()?;
        drop(file);
        set_mode(&path, 0o400)?;

        Ok(path)
    }

    /// Remove the token file. Returns whether a file was actually removed.
    pub fn remove(&self, runner_name: &str) -> crate::Result<bool> {
        let path = self.path_for(runner_name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(RunnerError::Io(e)),
        }
    }
}

fn validate_runner_name(name: &str) -> crate::Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(RunnerError::InvalidRunnerName(name.to_string()));
    }
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> crate::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> crate::Result<()> {
    Ok(())
}
