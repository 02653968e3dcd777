use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// File name looked up in the input directory and its ancestors.
pub const CONFIG_FILE: &str = "rustsl.toml";

/// WebGPU's default `maxStorageBuffersPerShaderStage`.
pub const DEFAULT_MAX_STORAGE_BUFFERS: usize = 8;

/// Default per-buffer byte ceiling used to decide tensor splits.
pub const DEFAULT_MAX_BUFFER_SIZE: u64 = 2_147_483_648;

/// WebGPU's default `maxComputeInvocationsPerWorkgroup`.
pub const MAX_WORKGROUP_SIZE: u32 = 256;

/// Functions that are CPU-side conveniences and never translated.
pub const DEFAULT_EXCLUDE: &[&str] = &["update", "defaults", "should_display"];

/// Compilation settings, from `rustsl.toml` and/or CLI flags.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory receiving one `.wgsl` file per kernel.
    pub output: PathBuf,
    /// Directory for the extracted host files (default: `<output>/imports`).
    pub imports: Option<PathBuf>,
    /// Function and method names that are never translated.
    pub exclude: Vec<String>,
    /// Largest byte size of one physical GPU buffer.
    pub max_buffer_size: u64,
    /// Per-kernel storage buffer ceiling; exceeding it is a warning.
    pub max_storage_buffers: usize,
    /// Threads per workgroup of every entry point.
    pub workgroup_size: u32,
    /// Verbose logging.
    pub debug: bool,
    /// Validate generated shaders in-process with naga.
    pub validate: bool,
    /// External validator command, run on each written kernel file.
    pub validator: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: PathBuf::from("shaders"),
            imports: None,
            exclude: DEFAULT_EXCLUDE.iter().map(|s| s.to_string()).collect(),
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            max_storage_buffers: DEFAULT_MAX_STORAGE_BUFFERS,
            workgroup_size: 64,
            debug: false,
            validate: true,
            validator: None,
        }
    }
}

impl Config {
    /// Load a config from a `rustsl.toml` file. Relative output paths are
    /// resolved against the file's directory.
    pub fn load(toml_path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(toml_path).map_err(|source| Error::Read {
            path: toml_path.to_path_buf(),
            source,
        })?;
        let mut config: Config = toml::from_str(&content).map_err(|e| Error::Config {
            path: toml_path.to_path_buf(),
            message: e.to_string(),
        })?;

        if let Err(message) = config.check() {
            return Err(Error::Config {
                path: toml_path.to_path_buf(),
                message,
            });
        }

        let root = toml_path.parent().unwrap_or(Path::new("."));
        if config.output.is_relative() {
            config.output = root.join(&config.output);
        }
        if let Some(imports) = config.imports.as_mut() {
            if imports.is_relative() {
                *imports = root.join(&*imports);
            }
        }
        Ok(config)
    }

    /// Reject settings no shader can be generated for.
    pub fn check(&self) -> std::result::Result<(), String> {
        if self.max_buffer_size < 16 {
            return Err(format!("max_buffer_size {} is too small", self.max_buffer_size));
        }
        if self.workgroup_size == 0 || self.workgroup_size > MAX_WORKGROUP_SIZE {
            return Err(format!(
                "workgroup_size {} is outside 1..={}",
                self.workgroup_size, MAX_WORKGROUP_SIZE
            ));
        }
        if self.max_storage_buffers == 0 {
            return Err("max_storage_buffers must be at least 1".to_string());
        }
        Ok(())
    }

    /// Try to find a rustsl.toml in the given directory or its ancestors.
    pub fn find(start_dir: &Path) -> Option<PathBuf> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.exists() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    /// Directory for extracted host files.
    pub fn imports_dir(&self) -> PathBuf {
        self.imports
            .clone()
            .unwrap_or_else(|| self.output.join("imports"))
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclude.iter().any(|e| e == name)
    }

    /// Replace the exclusion list from a comma-separated CLI value.
    pub fn set_exclude_list(&mut self, list: &str) {
        self.exclude = parse_name_list(list);
    }
}

/// Parse `a, b,c` into `["a", "b", "c"]`, dropping empty entries.
pub fn parse_name_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|part| part.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Expand CLI inputs into source files: files are taken as given,
/// directories contribute their `*.rs` files (non-recursive, sorted).
pub fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let entries = std::fs::read_dir(input).map_err(|source| Error::Read {
                path: input.clone(),
                source,
            })?;
            let mut found: Vec<PathBuf> = entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "rs"))
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.output, PathBuf::from("shaders"));
        assert_eq!(config.imports_dir(), PathBuf::from("shaders/imports"));
        assert_eq!(config.max_storage_buffers, 8);
        assert!(config.is_excluded("update"));
        assert!(!config.is_excluded("compute"));
    }

    #[test]
    fn test_load_config() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join(CONFIG_FILE);
        fs::write(
            &toml_path,
            r#"output = "gpu"
exclude = ["init"]
max_buffer_size = 1024
debug = true
"#,
        )
        .unwrap();

        let config = Config::load(&toml_path).unwrap();
        assert_eq!(config.output, dir.path().join("gpu"));
        assert_eq!(config.exclude, vec!["init".to_string()]);
        assert_eq!(config.max_buffer_size, 1024);
        assert!(config.debug);
        assert!(config.validate);
        assert_eq!(config.workgroup_size, 64);
    }

    #[test]
    fn test_load_rejects_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join(CONFIG_FILE);
        fs::write(&toml_path, "outptu = \"x\"\n").unwrap();
        assert!(matches!(
            Config::load(&toml_path),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_load_rejects_zero_workgroup() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join(CONFIG_FILE);
        fs::write(&toml_path, "workgroup_size = 0\n").unwrap();
        match Config::load(&toml_path) {
            Err(Error::Config { message, .. }) => assert!(message.contains("workgroup_size 0")),
            other => panic!("expected a config error, got {:?}", other),
        }
        fs::write(&toml_path, "workgroup_size = 128\n").unwrap();
        assert_eq!(Config::load(&toml_path).unwrap().workgroup_size, 128);
    }

    #[test]
    fn test_find_in_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "").unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(
            Config::find(&nested),
            Some(dir.path().join(CONFIG_FILE))
        );
    }

    #[test]
    fn test_parse_name_list() {
        assert_eq!(parse_name_list("a, b,,c "), vec!["a", "b", "c"]);
        assert!(parse_name_list("").is_empty());
        let mut config = Config::default();
        config.set_exclude_list("init,reset");
        assert!(config.is_excluded("reset"));
        assert!(!config.is_excluded("update"));
    }

    #[test]
    fn test_collect_inputs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.rs"), "").unwrap();
        fs::write(dir.path().join("a.rs"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        let files = collect_inputs(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(files, vec![dir.path().join("a.rs"), dir.path().join("b.rs")]);
    }
}
