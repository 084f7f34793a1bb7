//! Directory scanning and identity grouping.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{classify_role, identity_key, is_media, FileRole};

/// All files sharing one identity key, classified by role.
#[derive(Debug, Clone, Default)]
pub struct FileGroup {
    /// Shared identity key.
    pub key: String,
    /// The playable media file, if one was produced.
    pub media: Option<PathBuf>,
    /// Sidecar metadata JSON.
    pub metadata: Option<PathBuf>,
    /// Sidecar description text.
    pub description: Option<PathBuf>,
    /// Thumbnail image.
    pub thumbnail: Option<PathBuf>,
    /// Unrecognized extras sharing the key.
    pub other: Vec<PathBuf>,
}

impl FileGroup {
    fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    fn add(&mut self, role: FileRole, path: PathBuf) {
        let slot = match role {
            FileRole::Media => &mut self.media,
            FileRole::Metadata => &mut self.metadata,
            FileRole::Description => &mut self.description,
            FileRole::Thumbnail => &mut self.thumbnail,
            FileRole::Other => {
                self.other.push(path);
                return;
            }
        };
        // Duplicate roles under one key are unexpected; keep the first and
        // treat the rest as extras so nothing is silently dropped.
        if slot.is_none() {
            *slot = Some(path);
        } else {
            self.other.push(path);
        }
    }

    /// Sidecar files deleted once the media file is placed.
    #[must_use]
    pub fn sidecars(&self) -> Vec<&PathBuf> {
        self.metadata
            .iter()
            .chain(self.description.iter())
            .chain(self.other.iter())
            .collect()
    }
}

/// Scan the top level of `dir` and group files by identity key.
///
/// Subdirectories (including already-organized item folders) are ignored,
/// which is what makes a second pipeline run a no-op. Groups come back in
/// deterministic key order.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn scan_groups(dir: &Path) -> std::io::Result<Vec<FileGroup>> {
    let mut groups: BTreeMap<String, FileGroup> = BTreeMap::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let key = identity_key(&name);
        let role = classify_role(&name);
        groups
            .entry(key.clone())
            .or_insert_with(|| FileGroup::new(key))
            .add(role, entry.path());
    }

    Ok(groups.into_values().collect())
}

/// Whether any file directly in `dir` has a known media extension.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn has_media(dir: &Path) -> std::io::Result<bool> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() && is_media(&entry.file_name().to_string_lossy()) {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn test_scan_groups_by_identity() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Ep1 [abc123].mp4");
        touch(dir.path(), "Ep1 [abc123].info.json");
        touch(dir.path(), "Ep1 [abc123].description");
        touch(dir.path(), "Ep2 [def456].mp4");

        let groups = scan_groups(dir.path()).unwrap();
        assert_eq!(groups.len(), 2);

        let ep1 = groups.iter().find(|g| g.key == "Ep1").unwrap();
        assert!(ep1.media.is_some());
        assert!(ep1.metadata.is_some());
        assert!(ep1.description.is_some());
        assert!(ep1.thumbnail.is_none());
        assert_eq!(ep1.sidecars().len(), 2);
    }

    #[test]
    fn test_scan_ignores_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("Already Organized")).unwrap();
        touch(dir.path(), "Ep1 [abc].mp4");

        let groups = scan_groups(dir.path()).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key, "Ep1");
    }

    #[test]
    fn test_group_without_media() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Text Post [t1].info.json");
        touch(dir.path(), "Text Post [t1].description");

        let groups = scan_groups(dir.path()).unwrap();
        assert_eq!(groups.len(), 1);
        assert!(groups[0].media.is_none());
    }

    #[test]
    fn test_duplicate_role_goes_to_other() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "Ep1 [a].mp4");
        touch(dir.path(), "Ep1 [b].mkv");

        let groups = scan_groups(dir.path()).unwrap();
        assert_eq!(groups.len(), 1);
        assert!(groups[0].media.is_some());
        assert_eq!(groups[0].other.len(), 1);
    }

    #[test]
    fn test_has_media() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "notes.txt");
        assert!(!has_media(dir.path()).unwrap());

        touch(dir.path(), "Ep1 [abc].webm");
        assert!(has_media(dir.path()).unwrap());
    }

    #[test]
    fn test_has_media_ignores_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("Ep1");
        std::fs::create_dir(&sub).unwrap();
        touch(&sub, "video.mp4");

        assert!(!has_media(dir.path()).unwrap());
    }
}
