//! Writing kernel files, the layout manifest and the extracted host files.
//!
//! Every file goes through a temporary sibling and a rename, so a failed
//! run never leaves a half-written kernel behind.

use std::fs;
use std::path::{Path, PathBuf};

use super::{KernelShader, GENERATED};
use crate::error::{Error, Result};
use crate::layout::Manifest;

/// Name of the layout manifest in the output directory.
pub const MANIFEST_FILE: &str = "layout.json";

pub fn output_path(out_dir: &Path, shader: &KernelShader) -> PathBuf {
    out_dir.join(shader.relative_path())
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| Error::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// Write `text` to `path` via a temporary file and a rename.
pub fn write_file(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    let write_err = |source| Error::Write {
        path: path.to_path_buf(),
        source,
    };
    fs::write(&tmp, text).map_err(write_err)?;
    fs::rename(&tmp, path).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        Error::Write {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Write every buffered kernel file. Returns the written paths, in order.
pub fn write_shaders(out_dir: &Path, shaders: &[KernelShader]) -> Result<Vec<PathBuf>> {
    create_dir(out_dir)?;
    let mut written = Vec::with_capacity(shaders.len());
    for shader in shaders {
        let path = output_path(out_dir, shader);
        write_file(&path, &shader.text)?;
        tracing::info!(kernel = %shader.kernel, path = %path.display(), "wrote kernel");
        written.push(path);
    }
    Ok(written)
}

pub fn write_manifest(out_dir: &Path, manifest: &Manifest) -> Result<PathBuf> {
    let json = manifest.to_json()?;
    let path = out_dir.join(MANIFEST_FILE);
    write_file(&path, &json)?;
    Ok(path)
}

/// Write the extracted host files, `(file name, text)`, with a
/// generated-code header.
pub fn write_imports(dir: &Path, files: &[(String, String)]) -> Result<()> {
    create_dir(dir)?;
    for (name, text) in files {
        let body = format!("{}\n// Extracted from {}.\n\n{}", GENERATED, name, text);
        write_file(&dir.join(name), &body)?;
    }
    tracing::debug!(dir = %dir.display(), files = files.len(), "wrote imports");
    Ok(())
}
