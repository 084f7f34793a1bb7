//! Filename identity grammar and role classification.
//!
//! Every file the fetch tool emits for one item shares a stem of the form
//! `<base><sep>[<id>]` followed by an extension, where `<sep>` is a space or
//! (with restricted filenames) an underscore, and `<id>` contains no
//! brackets. The identity key is `<base>`; sidecar files attach to the same
//! key as their media file. `.info.json` counts as a single extension.
//!
//! A stem with no well-formed id suffix is its own identity key, so titles
//! that themselves end in bracketed text are kept intact.

/// Role of a file within an identity group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    /// Playable media.
    Media,
    /// Sidecar metadata JSON.
    Metadata,
    /// Sidecar description text.
    Description,
    /// Thumbnail image.
    Thumbnail,
    /// Anything else sharing the identity key.
    Other,
}

/// Extensions recognized as playable media.
pub const MEDIA_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "webm", "mov", "avi", "flv", "m4v", "m4a", "mp3", "opus", "ogg", "wav",
];

const THUMBNAIL_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

const METADATA_EXTENSION: &str = ".info.json";
const DESCRIPTION_EXTENSION: &str = ".description";

/// Split a file name into `(stem, extension)`.
///
/// The extension includes its leading dot; `.info.json` is one extension.
/// Dotfiles and extensionless names have an empty extension.
#[must_use]
pub fn split_extension(name: &str) -> (&str, &str) {
    if let Some(stem) = name.strip_suffix(METADATA_EXTENSION) {
        if !stem.is_empty() {
            return (stem, METADATA_EXTENSION);
        }
    }
    match name.rfind('.') {
        Some(pos) if pos > 0 => (&name[..pos], &name[pos..]),
        _ => (name, ""),
    }
}

/// Classify a file name into its group role.
#[must_use]
pub fn classify_role(name: &str) -> FileRole {
    let (_, ext) = split_extension(name);
    if ext == METADATA_EXTENSION {
        return FileRole::Metadata;
    }
    if ext == DESCRIPTION_EXTENSION {
        return FileRole::Description;
    }

    let bare = ext.trim_start_matches('.').to_ascii_lowercase();
    if MEDIA_EXTENSIONS.contains(&bare.as_str()) {
        FileRole::Media
    } else if THUMBNAIL_EXTENSIONS.contains(&bare.as_str()) {
        FileRole::Thumbnail
    } else {
        FileRole::Other
    }
}

/// Whether a file name has a media extension.
#[must_use]
pub fn is_media(name: &str) -> bool {
    classify_role(name) == FileRole::Media
}

/// Identity key for a file name: the stem with one trailing bracketed-id
/// suffix stripped.
#[must_use]
pub fn identity_key(name: &str) -> String {
    let (stem, _) = split_extension(name);
    strip_id_suffix(stem).to_string()
}

/// Strip a trailing ` [id]` or `_[id]` suffix, if well-formed.
fn strip_id_suffix(stem: &str) -> &str {
    let Some(without_close) = stem.strip_suffix(']') else {
        return stem;
    };

    let sep = [without_close.rfind(" ["), without_close.rfind("_[")]
        .into_iter()
        .flatten()
        .max();
    let Some(open) = sep else {
        return stem;
    };

    let id = &without_close[open + 2..];
    if id.is_empty() || id.contains('[') || id.contains(']') {
        return stem;
    }

    &stem[..open]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_strips_space_bracket_id() {
        assert_eq!(identity_key("Ep1 [abc123].mp4"), "Ep1");
        assert_eq!(identity_key("Ep1 [abc123].info.json"), "Ep1");
        assert_eq!(identity_key("Ep1 [abc123].description"), "Ep1");
    }

    #[test]
    fn test_identity_strips_underscore_bracket_id() {
        // --restrict-filenames turns the separating space into an underscore.
        assert_eq!(identity_key("My_Episode_[98765].mp4"), "My_Episode");
    }

    #[test]
    fn test_identity_without_id_suffix() {
        assert_eq!(identity_key("plain-title.mp4"), "plain-title");
        assert_eq!(identity_key("noextension"), "noextension");
    }

    #[test]
    fn test_identity_title_containing_brackets() {
        // Only a trailing well-formed suffix is stripped; interior brackets
        // belong to the title.
        assert_eq!(identity_key("Q&A [live] session [xy12].mp4"), "Q&A [live] session");
        // A bracketed tail with no separator stays.
        assert_eq!(identity_key("strange[tag].mp4"), "strange[tag]");
    }

    #[test]
    fn test_identity_consecutive_brackets() {
        assert_eq!(identity_key("Name [[x]].mp4"), "Name [[x]]");
        assert_eq!(identity_key("Name [].mp4"), "Name []");
    }

    #[test]
    fn test_identity_unicode_title() {
        assert_eq!(identity_key("日誌 エピソード [id9].mp4"), "日誌 エピソード");
    }

    #[test]
    fn test_split_extension_double() {
        assert_eq!(
            split_extension("Ep1 [abc].info.json"),
            ("Ep1 [abc]", ".info.json")
        );
        assert_eq!(split_extension("Ep1 [abc].json"), ("Ep1 [abc]", ".json"));
        assert_eq!(split_extension(".hidden"), (".hidden", ""));
        assert_eq!(split_extension("a.b.c"), ("a.b", ".c"));
    }

    #[test]
    fn test_roles() {
        assert_eq!(classify_role("Ep1 [abc].mp4"), FileRole::Media);
        assert_eq!(classify_role("Ep1 [abc].MKV"), FileRole::Media);
        assert_eq!(classify_role("Ep1 [abc].info.json"), FileRole::Metadata);
        assert_eq!(classify_role("Ep1 [abc].description"), FileRole::Description);
        assert_eq!(classify_role("Ep1 [abc].jpg"), FileRole::Thumbnail);
        assert_eq!(classify_role("Ep1 [abc].webp"), FileRole::Thumbnail);
        assert_eq!(classify_role("Ep1 [abc].srt"), FileRole::Other);
        assert_eq!(classify_role("notes.txt"), FileRole::Other);
    }

    #[test]
    fn test_is_media() {
        assert!(is_media("a.mp4"));
        assert!(!is_media("a.jpg"));
        assert!(!is_media("a.info.json"));
    }

    #[test]
    fn test_sidecars_share_media_key() {
        let media = identity_key("Ep1 [abc123].mp4");
        let info = identity_key("Ep1 [abc123].info.json");
        let desc = identity_key("Ep1 [abc123].description");
        let thumb = identity_key("Ep1 [abc123].jpg");
        assert_eq!(media, info);
        assert_eq!(media, desc);
        assert_eq!(media, thumb);
    }
}
