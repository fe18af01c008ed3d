// Packs blob files and manifests into a single zip. Entries are stored under
// their path relative to the store root so that unpacking the archive into
// another store root restores the model.
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};
use zip::result::{ZipError, ZipResult};
use zip::write::{SimpleFileOptions, ZipWriter};

/// Writes `entries` into `output_dir/archive_name` and returns the archive
/// path. Directories become empty directory entries, their contents are not
/// walked. The first entry that fails aborts the whole archive and the
/// partially written file is left behind.
pub fn archive(
    archive_name: &str,
    output_dir: &Path,
    entries: &[PathBuf],
    base_dir: &Path,
) -> Result<PathBuf> {
    let archive_path = output_dir.join(archive_name);
    let file = File::create(&archive_path).map_err(|source| Error::ArchiveCreate {
        path: archive_path.clone(),
        source,
    })?;
    info!("packing {} entries, this can take a while", entries.len());

    let mut zip = ZipWriter::new(BufWriter::new(file));
    // model weights routinely exceed the 4GiB zip32 limit, and deflate can
    // grow an incompressible blob past it even when the input is smaller
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .large_file(true);

    for entry in entries {
        add_entry(&mut zip, entry, base_dir, options).map_err(|source| Error::ArchiveWrite {
            path: entry.clone(),
            source,
        })?;
    }

    // central directory goes last, nothing can be appended after this
    let finished = zip
        .finish()
        .and_then(|mut out| out.flush().map_err(ZipError::from));
    finished.map_err(|source| Error::ArchiveWrite {
        path: archive_path.clone(),
        source,
    })?;

    info!("archive written to {}", archive_path.display());
    Ok(archive_path)
}

fn add_entry<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    path: &Path,
    base_dir: &Path,
    options: SimpleFileOptions,
) -> ZipResult<()> {
    let name = entry_name(path, base_dir)?;
    info!("adding {}", name);

    let metadata = std::fs::metadata(path)?;
    if metadata.is_dir() {
        return zip.add_directory(format!("{}/", name), options);
    }

    zip.start_file(name, options)?;
    let mut source = File::open(path)?;
    std::io::copy(&mut source, zip)?;
    Ok(())
}

/// Archive entry name for `path`: relative to `base_dir`, always `/`
/// separated.
fn entry_name(path: &Path, base_dir: &Path) -> ZipResult<String> {
    let relative = path
        .strip_prefix(base_dir)
        .ok()
        .filter(|rel| !rel.as_os_str().is_empty())
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not below {}", base_dir.display()),
            )
        })?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Read;

    fn open(path: &Path) -> zip::ZipArchive<File> {
        zip::ZipArchive::new(File::open(path).unwrap()).unwrap()
    }

    fn read_entry(archive: &mut zip::ZipArchive<File>, name: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        archive.by_name(name).unwrap().read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_archive_keeps_relative_paths_and_content() {
        let store = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let root = store.path();
        fs::create_dir_all(root.join("blobs")).unwrap();
        fs::create_dir_all(root.join("manifests/registry.ollama.ai/library/m")).unwrap();

        let weights: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(root.join("blobs/sha256-aa"), &weights).unwrap();
        fs::write(root.join("blobs/sha256-cc"), b"{}").unwrap();
        fs::write(
            root.join("manifests/registry.ollama.ai/library/m/1.0"),
            b"manifest",
        )
        .unwrap();

        let entries = vec![
            root.join("blobs/sha256-aa"),
            root.join("blobs/sha256-cc"),
            root.join("manifests/registry.ollama.ai/library/m/1.0"),
        ];
        let path = archive("m-1.0.zip", out.path(), &entries, root).unwrap();
        assert_eq!(path, out.path().join("m-1.0.zip"));

        let mut zip = open(&path);
        assert_eq!(zip.len(), 3);
        assert_eq!(read_entry(&mut zip, "blobs/sha256-aa"), weights);
        assert_eq!(read_entry(&mut zip, "blobs/sha256-cc"), b"{}");
        assert_eq!(
            read_entry(&mut zip, "manifests/registry.ollama.ai/library/m/1.0"),
            b"manifest"
        );
    }

    #[test]
    fn test_archive_directory_is_not_walked() {
        let store = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let dir = store.path().join("manifests/library/m");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("1.0"), b"manifest").unwrap();

        let path = archive("m.zip", out.path(), &[dir], store.path()).unwrap();
        let mut zip = open(&path);
        assert_eq!(zip.len(), 1);
        let entry = zip.by_index(0).unwrap();
        assert!(entry.is_dir());
        assert_eq!(entry.name(), "manifests/library/m/");
    }

    #[test]
    fn test_archive_empty() {
        let store = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let path = archive("empty.zip", out.path(), &[], store.path()).unwrap();
        assert!(open(&path).is_empty());
    }

    #[test]
    fn test_archive_create_fails() {
        let store = tempfile::tempdir().unwrap();
        let missing = store.path().join("no/such/dir");
        match archive("m.zip", &missing, &[], store.path()) {
            Err(Error::ArchiveCreate { path, .. }) => assert_eq!(path, missing.join("m.zip")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_archive_aborts_on_unreadable_entry() {
        let store = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(store.path().join("present"), b"x").unwrap();
        let gone = store.path().join("gone");
        let entries = vec![store.path().join("present"), gone.clone()];

        match archive("m.zip", out.path(), &entries, store.path()) {
            Err(Error::ArchiveWrite { path, .. }) => assert_eq!(path, gone),
            other => panic!("unexpected {:?}", other),
        }
        // no rollback
        assert!(out.path().join("m.zip").exists());
    }

    #[test]
    fn test_archive_rejects_entry_outside_base() {
        let store = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let stray = elsewhere.path().join("stray");
        fs::write(&stray, b"x").unwrap();

        match archive("m.zip", out.path(), &[stray.clone()], store.path()) {
            Err(Error::ArchiveWrite { path, .. }) => assert_eq!(path, stray),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_entry_name_uses_forward_slashes() {
        let base = Path::new("/models");
        assert_eq!(
            entry_name(&base.join("blobs").join("sha256-aa"), base).unwrap(),
            "blobs/sha256-aa"
        );
        assert!(entry_name(base, base).is_err());
    }
}
