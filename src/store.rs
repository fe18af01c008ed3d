// The model store is responsible for:
// locating its root directory (flag, OLLAMA_MODELS or a platform default)
// mapping a model reference to its manifest file
// mapping a digest to its blob file
//
// Layout:
//   <root>/manifests/<host>/library/<name>/<version>
//   <root>/manifests/<host>/<namespace>/<name>/<version>
//   <root>/blobs/<algo>-<hex>
use crate::error::{Error, Result};
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

pub const ROOT_ENV: &str = "OLLAMA_MODELS";
pub const DEFAULT_VERSION: &str = "latest";

/// Namespace used for models that don't carry one (`ollama pull llama3`).
const LIBRARY: &str = "library";

/// Picks the store root: an explicit path wins, then `OLLAMA_MODELS`,
/// then the platform default.
pub fn locate_root(explicit: Option<&Path>) -> Result<PathBuf> {
    root_from(explicit, std::env::var_os(ROOT_ENV))
}

fn root_from(explicit: Option<&Path>, env: Option<OsString>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    match env {
        Some(value) if !value.is_empty() => Ok(PathBuf::from(value)),
        _ => default_root(),
    }
}

fn default_root() -> Result<PathBuf> {
    if cfg!(windows) {
        let home = dirs::home_dir().ok_or(Error::NoHomeDir)?;
        Ok(home.join(".ollama").join("models"))
    } else {
        // the linux service installer runs ollama as its own user
        Ok(PathBuf::from("/usr/share/ollama/.ollama/models"))
    }
}

/// Blob file for a digest. `sha256:abc` is stored as `blobs/sha256-abc`.
/// Returns None for a digest that isn't a single plain file name, so a
/// manifest can't point outside `blobs/`.
pub fn blob_path(root: &Path, digest: &str) -> Option<PathBuf> {
    let name = digest.replace(':', "-");
    let mut components = Path::new(&name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(file)), None) if file == name.as_str() => {
            Some(root.join("blobs").join(file))
        }
        _ => None,
    }
}

/// `.` and `..` would walk out of the manifests tree.
fn is_dot_segment(segment: &str) -> bool {
    segment.chars().all(|c| c == '.')
}

/// A parsed `[namespace/]name[:version]` model reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub namespace: Option<String>,
    pub name: String,
    pub version: String,
}

impl ModelRef {
    /// parse a reference of the form `name:version` or
    /// `namespace/name:version`. A missing version means `latest`.
    pub fn parse(s: &str) -> Result<ModelRef> {
        let re = regex::Regex::new(r"^(?:([^/:\s]+)/)?([^/:\s]+)(?::([^/:\s]*))?$")
            .expect("model reference pattern");
        let caps = re
            .captures(s)
            .ok_or_else(|| Error::InvalidModelRef(s.to_string()))?;
        let version = match caps.get(3).map(|m| m.as_str()) {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => DEFAULT_VERSION.to_string(),
        };
        let model = ModelRef {
            namespace: caps.get(1).map(|m| m.as_str().to_string()),
            name: caps[2].to_string(),
            version,
        };
        let mut segments = model
            .namespace
            .iter()
            .chain(std::iter::once(&model.name))
            .chain(std::iter::once(&model.version));
        if segments.any(|segment| is_dot_segment(segment)) {
            return Err(Error::InvalidModelRef(s.to_string()));
        }
        Ok(model)
    }

    pub fn manifest_path(&self, root: &Path, host: &str) -> PathBuf {
        root.join("manifests")
            .join(host)
            .join(self.namespace.as_deref().unwrap_or(LIBRARY))
            .join(&self.name)
            .join(&self.version)
    }

    /// `name-version.zip`, with the namespace folded in as `ns-name` since
    /// a `/` can't go into a file name.
    pub fn archive_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}-{}-{}.zip", ns, self.name, self.version),
            None => format!("{}-{}.zip", self.name, self.version),
        }
    }
}

impl std::fmt::Display for ModelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if let Some(ns) = &self.namespace {
            write!(f, "{}/", ns)?;
        }
        write!(f, "{}:{}", self.name, self.version)
    }
}
