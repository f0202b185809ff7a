use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{anyhow, Result};
use temp_dir::TempDir;
use tracing::debug;

/// Links an object file image into an executable at `dest`. The object is
/// staged in a temporary directory that is removed afterwards.
pub fn link(object: &[u8], dest: impl AsRef<Path>, optimize: bool) -> Result<()> {
    let dir = TempDir::new()?;
    let src = dir.child("module.o");

    fs::write(&src, object)?;

    let mut cmd = Command::new("gcc");

    if optimize {
        cmd.arg("-O3");
    }

    debug!(dest = %dest.as_ref().display(), "linking");

    let status = cmd
        .arg("-o")
        .arg(dest.as_ref())
        .arg(&src)
        .spawn()?
        .wait()?;

    if !status.success() {
        return Err(anyhow!("linking failed"));
    }

    Ok(())
}
