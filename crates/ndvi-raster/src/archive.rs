//! Archive extraction as a typestate machine.
//!
//! ```text
//! Unopened ──validate──► Validated ──extract──► Extracted ──locate──► ArtifactLocated
//! ```
//!
//! Entries are only written after every header has been checked, so a
//! traversal entry anywhere in the archive means nothing is unpacked at all.
//! Unpacking goes to a staging directory next to the target. Its entries are
//! moved into the target only once the expected artifact has been found, and
//! files in the target that the archive does not name are left alone.

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use ndvi_common::{NdviError, NdviResult};
use tar::{Archive, EntryType};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Initial state: nothing has been read.
#[derive(Debug)]
pub struct Unopened;

/// Every entry header has been read and accepted.
#[derive(Debug)]
pub struct Validated {
    gzip: bool,
    entries: usize,
}

/// Entries are unpacked in the staging directory.
#[derive(Debug)]
pub struct Extracted {
    gzip: bool,
    staging: TempDir,
}

/// Staged entries were moved into the target and the artifact was found.
#[derive(Debug)]
pub struct ArtifactLocated {
    artifact: PathBuf,
    placed: Vec<PathBuf>,
}

/// Unpacks one archive into one target directory.
#[derive(Debug)]
pub struct ArchiveExtractor<S> {
    archive: PathBuf,
    target: PathBuf,
    state: S,
}

impl<S> ArchiveExtractor<S> {
    pub fn archive_path(&self) -> &Path {
        &self.archive
    }

    pub fn target_dir(&self) -> &Path {
        &self.target
    }

    fn corrupt(&self, message: impl Into<String>) -> NdviError {
        NdviError::ArchiveCorrupt {
            path: self.archive.clone(),
            message: message.into(),
        }
    }

    fn open(&self) -> NdviResult<(Archive<Box<dyn Read>>, bool)> {
        let file = File::open(&self.archive).map_err(|e| self.corrupt(format!("cannot open: {}", e)))?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 2];
        let read = reader
            .read(&mut magic)
            .map_err(|e| self.corrupt(format!("cannot read: {}", e)))?;
        reader
            .seek(SeekFrom::Start(0))
            .map_err(|e| self.corrupt(format!("cannot rewind: {}", e)))?;

        let gzip = read == 2 && magic == [0x1f, 0x8b];
        let inner: Box<dyn Read> = if gzip {
            Box::new(GzDecoder::new(reader))
        } else {
            Box::new(reader)
        };
        Ok((Archive::new(inner), gzip))
    }
}

impl ArchiveExtractor<Unopened> {
    pub fn new(archive: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            archive: archive.into(),
            target: target.into(),
            state: Unopened,
        }
    }

    /// Read every entry header without writing anything.
    ///
    /// Rejects absolute paths, `..` components, links and device nodes, and a
    /// target directory that contains the archive itself.
    pub fn validate(self) -> NdviResult<ArchiveExtractor<Validated>> {
        self.check_target()?;
        let (mut archive, gzip) = self.open()?;
        let mut entries = 0usize;

        let iter = archive
            .entries()
            .map_err(|e| self.corrupt(format!("cannot list entries: {}", e)))?;

        for entry in iter {
            let entry = entry.map_err(|e| self.corrupt(format!("unreadable entry header: {}", e)))?;
            let path = entry
                .path()
                .map_err(|e| self.corrupt(format!("undecodable entry name: {}", e)))?
                .into_owned();

            let kind = entry.header().entry_type();
            if !is_allowed_kind(kind) {
                warn!(entry = %path.display(), kind = ?kind, "Rejecting archive entry type");
                return Err(self.corrupt(format!(
                    "entry '{}' has disallowed type {:?}",
                    path.display(),
                    kind
                )));
            }

            if escapes_root(&path) {
                warn!(entry = %path.display(), "Rejecting path traversal entry");
                return Err(self.corrupt(format!(
                    "entry '{}' escapes the extraction directory",
                    path.display()
                )));
            }

            entries += 1;
        }

        debug!(archive = %self.archive.display(), entries, gzip, "Archive validated");

        Ok(ArchiveExtractor {
            archive: self.archive,
            target: self.target,
            state: Validated { gzip, entries },
        })
    }

    fn check_target(&self) -> NdviResult<()> {
        let invalid = |message: String| NdviError::InvalidExtractTarget {
            target: self.target.clone(),
            message,
        };

        let archive = resolve(&self.archive)
            .map_err(|e| invalid(format!("cannot resolve {}: {}", self.archive.display(), e)))?;
        let target = resolve(&self.target)
            .map_err(|e| invalid(format!("cannot resolve target: {}", e)))?;

        if archive.starts_with(&target) {
            return Err(invalid(format!(
                "directory contains the archive {}",
                self.archive.display()
            )));
        }
        Ok(())
    }
}

impl ArchiveExtractor<Validated> {
    /// Number of entries seen during validation.
    pub fn entry_count(&self) -> usize {
        self.state.entries
    }

    pub fn is_gzip(&self) -> bool {
        self.state.gzip
    }

    /// Unpack into a fresh staging directory beside the target.
    pub fn extract(self) -> NdviResult<ArchiveExtractor<Extracted>> {
        let parent = staging_parent(&self.target);
        fs::create_dir_all(&parent)
            .map_err(|e| self.corrupt(format!("cannot create {}: {}", parent.display(), e)))?;

        let staging = tempfile::Builder::new()
            .prefix(".ndvi-extract-")
            .tempdir_in(&parent)
            .map_err(|e| self.corrupt(format!("cannot create staging directory: {}", e)))?;

        let (mut archive, gzip) = self.open()?;
        archive.set_preserve_mtime(false);

        let iter = archive
            .entries()
            .map_err(|e| self.corrupt(format!("cannot list entries: {}", e)))?;

        for entry in iter {
            let mut entry = entry.map_err(|e| self.corrupt(format!("unreadable entry: {}", e)))?;
            let unpacked = entry
                .unpack_in(staging.path())
                .map_err(|e| self.corrupt(format!("failed to unpack entry: {}", e)))?;
            if !unpacked {
                return Err(self.corrupt("entry refused by unpacker"));
            }
        }

        debug!(staging = %staging.path().display(), "Archive unpacked to staging");

        Ok(ArchiveExtractor {
            archive: self.archive,
            target: self.target,
            state: Extracted { gzip, staging },
        })
    }
}

impl ArchiveExtractor<Extracted> {
    pub fn staging_dir(&self) -> &Path {
        self.state.staging.path()
    }

    /// Find `artifact_name` and move the staged entries into the target.
    ///
    /// Exactly one regular file with that name must exist. On failure the
    /// staging directory is removed and the target is left untouched. On
    /// success entries named by the archive replace their namesakes in the
    /// target; directories are merged.
    pub fn locate(self, artifact_name: &str) -> NdviResult<ArchiveExtractor<ArtifactLocated>> {
        let staging = self.state.staging.path();

        let matches: Vec<PathBuf> = WalkDir::new(staging)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && e.file_name() == artifact_name)
            .filter_map(|e| e.path().strip_prefix(staging).ok().map(Path::to_path_buf))
            .collect();

        let relative = match matches.as_slice() {
            [] => {
                return Err(NdviError::ExpectedArtifactMissing {
                    artifact: artifact_name.to_string(),
                    archive: self.archive.clone(),
                })
            }
            [one] => one.clone(),
            many => {
                return Err(self.corrupt(format!(
                    "{} entries named '{}'",
                    many.len(),
                    artifact_name
                )))
            }
        };

        let mut placed = Vec::new();
        merge_into(staging, &self.target, &mut placed).map_err(|e| {
            self.corrupt(format!(
                "cannot move extracted files to {}: {}",
                self.target.display(),
                e
            ))
        })?;

        let artifact = self.target.join(relative);
        info!(
            archive = %self.archive.display(),
            artifact = %artifact.display(),
            gzip = self.state.gzip,
            entries = placed.len(),
            "Artifact extracted"
        );

        Ok(ArchiveExtractor {
            archive: self.archive,
            target: self.target,
            state: ArtifactLocated { artifact, placed },
        })
    }
}

impl ArchiveExtractor<ArtifactLocated> {
    pub fn artifact_path(&self) -> &Path {
        &self.state.artifact
    }

    /// Files and directories this extraction created or replaced in the target.
    pub fn placed_entries(&self) -> &[PathBuf] {
        &self.state.placed
    }

    pub fn into_artifact_path(self) -> PathBuf {
        self.state.artifact
    }
}

/// Run all extraction states and return the artifact path.
pub fn extract_artifact(archive: &Path, target: &Path, artifact_name: &str) -> NdviResult<PathBuf> {
    let located = ArchiveExtractor::new(archive, target)
        .validate()?
        .extract()?
        .locate(artifact_name)?;
    Ok(located.into_artifact_path())
}

fn is_allowed_kind(kind: EntryType) -> bool {
    matches!(
        kind,
        EntryType::Regular
            | EntryType::Continuous
            | EntryType::Directory
            | EntryType::GNULongName
            | EntryType::XHeader
            | EntryType::XGlobalHeader
    )
}

/// True for absolute paths and any `..` component.
fn escapes_root(path: &Path) -> bool {
    path.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

fn staging_parent(target: &Path) -> PathBuf {
    match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Absolute form of `path` with symlinks resolved for the part that exists.
fn resolve(path: &Path) -> io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    loop {
        match existing.canonicalize() {
            Ok(mut resolved) => {
                resolved.extend(missing.iter().rev());
                return Ok(resolved);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                match (existing.parent(), existing.file_name()) {
                    (Some(parent), Some(name)) => {
                        missing.push(name.to_os_string());
                        existing = parent;
                    }
                    _ => return Err(e),
                }
            }
            Err(e) => return Err(e),
        }
    }
}

/// Move every entry of `from` into `to`, merging directories that exist on
/// both sides. Paths created or replaced in `to` are appended to `placed`.
fn merge_into(from: &Path, to: &Path, placed: &mut Vec<PathBuf>) -> io::Result<()> {
    fs::create_dir_all(to)?;

    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let src = entry.path();
        let dest = to.join(entry.file_name());
        let src_is_dir = entry.file_type()?.is_dir();

        match fs::symlink_metadata(&dest) {
            Ok(meta) if meta.is_dir() && src_is_dir => {
                merge_into(&src, &dest, placed)?;
                continue;
            }
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&dest)?,
            Ok(_) => fs::remove_file(&dest)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        fs::rename(&src, &dest)?;
        placed.push(dest);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escapes_root() {
        assert!(escapes_root(Path::new("../x.tif")));
        assert!(escapes_root(Path::new("a/../../x.tif")));
        assert!(escapes_root(Path::new("/etc/passwd")));
        assert!(!escapes_root(Path::new("default.tif")));
        assert!(!escapes_root(Path::new("./outputs/default.tif")));
    }

    #[test]
    fn test_links_are_not_allowed() {
        assert!(!is_allowed_kind(EntryType::Symlink));
        assert!(!is_allowed_kind(EntryType::Link));
        assert!(!is_allowed_kind(EntryType::Char));
        assert!(is_allowed_kind(EntryType::Regular));
        assert!(is_allowed_kind(EntryType::Directory));
    }

    #[test]
    fn test_resolve_missing_tail() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        assert_eq!(resolve(&dir.path().join("a/b")).unwrap(), root.join("a").join("b"));
        assert_eq!(resolve(dir.path()).unwrap(), root);
    }

    #[test]
    fn test_merge_keeps_unrelated_files() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("from");
        let to = dir.path().join("to");
        fs::create_dir_all(from.join("outputs")).unwrap();
        fs::write(from.join("outputs/default.tif"), b"new").unwrap();
        fs::write(from.join("userdata.json"), b"{}").unwrap();
        fs::create_dir_all(to.join("outputs")).unwrap();
        fs::write(to.join("outputs/notes.txt"), b"mine").unwrap();
        fs::write(to.join("userdata.json"), b"old").unwrap();

        let mut placed = Vec::new();
        merge_into(&from, &to, &mut placed).unwrap();
        placed.sort();

        assert_eq!(fs::read(to.join("outputs/default.tif")).unwrap(), b"new");
        assert_eq!(fs::read(to.join("outputs/notes.txt")).unwrap(), b"mine");
        assert_eq!(fs::read(to.join("userdata.json")).unwrap(), b"{}");
        assert_eq!(
            placed,
            vec![to.join("outputs").join("default.tif"), to.join("userdata.json")]
        );
    }

    #[test]
    fn test_staging_parent_of_bare_name() {
        assert_eq!(staging_parent(Path::new("retrieved_files")), PathBuf::from("."));
        assert_eq!(staging_parent(Path::new("/data/out")), PathBuf::from("/data"));
    }
}
