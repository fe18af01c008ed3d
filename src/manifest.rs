use crate::error::{Error, Result};
use crate::store;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// One entry of the manifest, either a layer or the config.
#[derive(Deserialize, Debug)]
pub struct Descriptor {
    pub digest: String,
    pub size: Option<u64>,
}

/// Image manifest as written by the registry. Other top-level keys
/// (schemaVersion, mediaType) are ignored.
#[derive(Deserialize, Debug)]
pub struct Manifest {
    pub layers: Vec<Descriptor>,
    pub config: Descriptor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Layer,
    Config,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobReference {
    pub role: Role,
    pub digest: String,
    /// Size recorded in the manifest, not checked against the file.
    pub size: Option<u64>,
}

impl BlobReference {
    pub fn path(&self, root: &Path) -> Option<PathBuf> {
        store::blob_path(root, &self.digest)
    }
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Manifest> {
        let bytes = std::fs::read(path).map_err(|source| Error::ManifestRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| Error::ManifestParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// All layers in manifest order, then the config.
    pub fn blob_references(&self) -> Vec<BlobReference> {
        self.layers
            .iter()
            .map(|layer| BlobReference {
                role: Role::Layer,
                digest: layer.digest.clone(),
                size: layer.size,
            })
            .chain(std::iter::once(BlobReference {
                role: Role::Config,
                digest: self.config.digest.clone(),
                size: self.config.size,
            }))
            .collect()
    }
}

/// Returns the blob files referenced by the manifest at `manifest_path`
/// that are present under `root`. Blobs that are missing (evicted, or a
/// pull that never finished) are skipped. The manifest itself is not part
/// of the result, and a blob shared by several entries is listed once.
pub fn resolve(manifest_path: &Path, root: &Path) -> Result<Vec<PathBuf>> {
    let manifest = Manifest::load(manifest_path)?;
    let mut paths: Vec<PathBuf> = Vec::new();
    for blob in manifest.blob_references() {
        let path = match blob.path(root) {
            Some(path) => path,
            None => {
                warn!("ignoring {:?} blob with bad digest {:?}", blob.role, blob.digest);
                continue;
            }
        };
        if paths.contains(&path) {
            continue;
        }
        if path.exists() {
            debug!(
                "found {:?} blob {} ({} bytes)",
                blob.role,
                path.display(),
                blob.size.unwrap_or_default()
            );
            paths.push(path);
        } else {
            debug!("skipping missing {:?} blob {}", blob.role, path.display());
        }
    }
    Ok(paths)
}
