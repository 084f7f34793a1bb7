//! Per-item folder reorganization.
//!
//! Each identity group that produced a media file becomes one folder named
//! after the cleaned-up identity key, holding `video.<ext>` and optionally
//! `thumbnail.<ext>`. Sidecars are consumed: metadata is injected into the
//! media stream first, then every remaining sidecar is deleted.

use std::path::{Path, PathBuf};

use super::{scan_groups, FileGroup, MetadataInjector, SidecarInfo};

/// Longest folder name derived from an identity key.
const MAX_FOLDER_LEN: usize = 60;

/// Canonical media file name inside an item folder.
pub const MEDIA_NAME: &str = "video";

/// Canonical thumbnail file name inside an item folder.
pub const THUMBNAIL_NAME: &str = "thumbnail";

/// Counters describing one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Item folders produced.
    pub items: usize,
    /// Media files that received injected metadata.
    pub injected: usize,
    /// Files moved into item folders.
    pub moves: usize,
    /// Sidecar files deleted.
    pub deletions: usize,
    /// Groups abandoned after an I/O error.
    pub skipped_groups: usize,
}

/// Post-processing pipeline for one creator's output directory.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    injector: MetadataInjector,
}

impl Pipeline {
    /// Pipeline using the default transcode binary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pipeline with a custom injector (for testing).
    #[must_use]
    pub fn with_injector(injector: MetadataInjector) -> Self {
        Self { injector }
    }

    /// Reorganize `dir`. Groups without a media file are left untouched;
    /// per-group failures skip only that group.
    ///
    /// # Errors
    ///
    /// Returns an error only if the directory itself cannot be scanned.
    pub async fn run(&self, dir: &Path) -> std::io::Result<PipelineReport> {
        let groups = scan_groups(dir)?;
        let mut report = PipelineReport::default();

        for group in &groups {
            let Some(media) = &group.media else {
                // No media instance exists for this identity (a text-only
                // post); its files stay where they are.
                tracing::debug!(group = %group.key, "no media file, leaving group in place");
                continue;
            };
            match self.process_group(dir, group, media, &mut report).await {
                Ok(()) => report.items += 1,
                Err(e) => {
                    tracing::warn!(group = %group.key, error = %e, "skipping group");
                    report.skipped_groups += 1;
                }
            }
        }

        tracing::info!(
            dir = %dir.display(),
            items = report.items,
            injected = report.injected,
            moves = report.moves,
            deletions = report.deletions,
            skipped = report.skipped_groups,
            "post-processing finished"
        );
        Ok(report)
    }

    async fn process_group(
        &self,
        dir: &Path,
        group: &FileGroup,
        media: &Path,
        report: &mut PipelineReport,
    ) -> std::io::Result<()> {
        if let Some(sidecar) = &group.metadata {
            match SidecarInfo::load(sidecar).await {
                Ok(info) => match self.injector.inject(media, &info).await {
                    Ok(()) => report.injected += 1,
                    Err(e) => {
                        // Injection failure is not fatal: the original file
                        // is intact and still worth organizing.
                        tracing::warn!(
                            media = %media.display(),
                            error = %e,
                            "metadata injection failed, keeping original"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        sidecar = %sidecar.display(),
                        error = %e,
                        "unreadable sidecar, skipping injection"
                    );
                }
            }
        }

        let folder = dir.join(folder_name(&group.key));
        tokio::fs::create_dir_all(&folder).await?;

        let dest = canonical_dest(&folder, MEDIA_NAME, media);
        tokio::fs::rename(media, &dest).await?;
        report.moves += 1;

        if let Some(thumbnail) = &group.thumbnail {
            let dest = canonical_dest(&folder, THUMBNAIL_NAME, thumbnail);
            tokio::fs::rename(thumbnail, &dest).await?;
            report.moves += 1;
        }

        for sidecar in group.sidecars() {
            match tokio::fs::remove_file(sidecar).await {
                Ok(()) => report.deletions += 1,
                Err(e) => {
                    tracing::warn!(file = %sidecar.display(), error = %e, "failed to delete sidecar");
                }
            }
        }

        Ok(())
    }
}

/// Canonical destination keeping the source file's extension.
fn canonical_dest(folder: &Path, base: &str, source: &Path) -> PathBuf {
    match source.extension() {
        Some(ext) => folder.join(format!("{base}.{}", ext.to_string_lossy())),
        None => folder.join(base),
    }
}

/// Human-readable folder name for an identity key.
///
/// Separators become spaces, whitespace collapses, each word is
/// title-cased, and the result is truncated to a fixed maximum.
#[must_use]
pub fn folder_name(key: &str) -> String {
    let cleaned = key
        .split(|c: char| c == '_' || c == '-' || c == '.' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ");
    truncate_chars(&cleaned, MAX_FOLDER_LEN)
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
        None => String::new(),
    }
}

fn truncate_chars(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_name_cleans_separators() {
        assert_eq!(folder_name("My_great_episode"), "My Great Episode");
        assert_eq!(folder_name("weekly-update.part2"), "Weekly Update Part2");
        assert_eq!(folder_name("  spaced   out  "), "Spaced Out");
    }

    #[test]
    fn test_folder_name_preserves_simple_keys() {
        assert_eq!(folder_name("Ep1"), "Ep1");
    }

    #[test]
    fn test_folder_name_truncates_long_keys() {
        let key = "word ".repeat(30);
        let name = folder_name(&key);
        assert!(name.chars().count() <= MAX_FOLDER_LEN);
        assert!(name.ends_with("..."));
    }

    #[test]
    fn test_folder_name_unicode_safe_truncation() {
        let key = "日".repeat(100);
        let name = folder_name(&key);
        assert!(name.chars().count() <= MAX_FOLDER_LEN);
    }

    #[test]
    fn test_canonical_dest() {
        assert_eq!(
            canonical_dest(Path::new("/out/Ep1"), MEDIA_NAME, Path::new("/x/a.mp4")),
            PathBuf::from("/out/Ep1/video.mp4")
        );
        assert_eq!(
            canonical_dest(Path::new("/out/Ep1"), THUMBNAIL_NAME, Path::new("/x/a.jpg")),
            PathBuf::from("/out/Ep1/thumbnail.jpg")
        );
    }
}
