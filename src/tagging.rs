use crate::error::{Error, Result};
use crate::metadata::VideoMetadata;
use lofty::{
    config::WriteOptions,
    file::{AudioFile, TaggedFileExt},
    picture::{MimeType, Picture, PictureType},
    read_from_path,
    tag::{Accessor, Tag},
};
use log::{debug, warn};
use std::path::Path;

/// Detects the image formats cover art can be stored as.
pub fn detect_image_mime_type(bytes: &[u8]) -> Option<MimeType> {
    if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        return Some(MimeType::Unknown("image/webp".to_string()));
    }

    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(MimeType::Jpeg);
    }

    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some(MimeType::Png);
    }

    None
}

/// Downloads the video thumbnail.
pub async fn fetch_cover(url: &str) -> Result<Vec<u8>> {
    let response = reqwest::get(url).await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

/// Writes title, artist and, when given, cover art into a saved audio file.
pub fn tag_audio(path: &Path, metadata: &VideoMetadata, cover: Option<Vec<u8>>) -> Result<()> {
    let mut tagged_file = read_from_path(path)?;

    if tagged_file.primary_tag().is_none() && tagged_file.first_tag().is_none() {
        let tag_type = tagged_file.primary_tag_type();
        debug!("No tags found, creating a new tag of type `{tag_type:?}`");
        tagged_file.insert_tag(Tag::new(tag_type));
    }

    let tag = match tagged_file.primary_tag_mut() {
        Some(primary_tag) => primary_tag,
        None => tagged_file
            .first_tag_mut()
            .ok_or_else(|| Error::Tag(format!("{} cannot hold tags", path.display())))?,
    };

    tag.set_title(metadata.title.clone());
    tag.set_artist(metadata.author.clone());

    if let Some(bytes) = cover {
        match detect_image_mime_type(&bytes) {
            Some(mime_type) => {
                let front_cover = Picture::new_unchecked(
                    PictureType::CoverFront,
                    Some(mime_type),
                    Some("Cover".to_string()),
                    bytes,
                );
                tag.push_picture(front_cover);
            }
            None => warn!("Thumbnail is not a JPEG, PNG or WebP image, skipping cover art"),
        }
    }

    let write_options = WriteOptions::new()
        .use_id3v23(true)
        .remove_others(false)
        .respect_read_only(false);

    tagged_file.save_to_path(path, write_options)?;
    Ok(())
}
