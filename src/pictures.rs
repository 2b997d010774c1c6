//! Profile pictures: upload checks, resizing into the `uf/{user_id}/` tree,
//! and serving that tree back under `/uf/...`.
//!
//! Uploads arrive as base64 (optionally a `data:` URL) in the JSON body of
//! `PUT /users`. Every stored picture is a square full-size JPEG plus a
//! thumbnail, named `{picture}-original.jpeg` and `{picture}-thumb.jpeg`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use mime_guess::from_path;
use spin_sdk::http::Response;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{DEFAULT_PICTURE, MAX_PICTURE_BYTES, PICTURE_ORIGINAL_SIZE, PICTURE_THUMB_SIZE};
use crate::core::errors::ApiError;
use crate::core::helpers::validate_uuid;
use crate::core::validation::Validator;

const PARAM: &str = "picture";
const LOCATION: &str = "file";

/// Decodes an uploaded picture and checks it. Problems are recorded on `v`
/// and yield `None`.
pub fn read_upload(raw: &str, v: &mut Validator) -> Option<DynamicImage> {
    let encoded = match raw.trim().split_once(',') {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => raw.trim(),
    };

    // Base64 grows data by a third; refuse oversized uploads before decoding.
    if encoded.len() / 4 * 3 > MAX_PICTURE_BYTES + 3 {
        v.reject_at(LOCATION, PARAM, "File too large", None);
        return None;
    }
    let Ok(bytes) = STANDARD.decode(encoded) else {
        v.reject_at(LOCATION, PARAM, "Picture must be base64 encoded", None);
        return None;
    };
    if bytes.len() > MAX_PICTURE_BYTES {
        v.reject_at(LOCATION, PARAM, "File too large", None);
        return None;
    }

    let format = match image::guess_format(&bytes) {
        Ok(format @ (ImageFormat::Png | ImageFormat::Jpeg)) => format,
        _ => {
            v.reject_at(LOCATION, PARAM, "Allowed image extensions are png, jpg, jpeg.", None);
            return None;
        }
    };
    let image = match image::load_from_memory_with_format(&bytes, format) {
        Ok(image) => image,
        Err(err) => {
            warn!(error = %err, "undecodable picture upload");
            v.reject_at(LOCATION, PARAM, "Picture could not be decoded", None);
            return None;
        }
    };

    let (width, height) = image.dimensions();
    if width < PICTURE_ORIGINAL_SIZE || height < PICTURE_ORIGINAL_SIZE {
        v.reject_at(
            LOCATION,
            PARAM,
            &format!("Image too small. Must have at least {PICTURE_ORIGINAL_SIZE}px of width and height."),
            None,
        );
        return None;
    }

    Some(image)
}

fn user_dir(uploads_dir: &str, user_id: &str) -> PathBuf {
    Path::new(uploads_dir).join("uf").join(user_id)
}

fn variants(name: &str) -> [(String, u32); 2] {
    [
        (format!("{name}-original.jpeg"), PICTURE_ORIGINAL_SIZE),
        (format!("{name}-thumb.jpeg"), PICTURE_THUMB_SIZE),
    ]
}

/// Writes both sizes of `image` for `user_id` and returns the new picture
/// name. Nothing is left behind on failure.
pub fn store_picture(uploads_dir: &str, user_id: &str, image: &DynamicImage) -> anyhow::Result<String> {
    let name = Uuid::new_v4().simple().to_string();
    let dir = user_dir(uploads_dir, user_id);
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    for (file, side) in variants(&name) {
        let resized = image.resize_to_fill(side, side, FilterType::Triangle);
        let path = dir.join(&file);
        let written = DynamicImage::ImageRgb8(resized.to_rgb8())
            .save_with_format(&path, ImageFormat::Jpeg)
            .with_context(|| format!("failed to write {}", path.display()));
        if let Err(err) = written {
            remove_picture(uploads_dir, user_id, &name);
            return Err(err);
        }
    }

    info!(user_id, picture = %name, "profile picture stored");
    Ok(name)
}

/// Deletes both files of a previous picture. The shared default picture is
/// never touched; failures are logged only.
pub fn remove_picture(uploads_dir: &str, user_id: &str, name: &str) {
    if name == DEFAULT_PICTURE {
        return;
    }
    let dir = user_dir(uploads_dir, user_id);
    for (file, _) in variants(name) {
        match fs::remove_file(dir.join(&file)) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(user_id, file = %file, error = %err, "could not delete old picture"),
        }
    }
}

fn is_safe_file_name(file: &str) -> bool {
    !file.starts_with('.')
        && !file.contains("..")
        && file
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_')
}

/// `GET /uf/{owner}/{file}`.
pub fn serve_picture(uploads_dir: &str, owner: &str, file: &str) -> Result<Response, ApiError> {
    let not_found = || ApiError::NotFound("File not found".to_string());
    if !(owner == DEFAULT_PICTURE || validate_uuid(owner)) || !is_safe_file_name(file) {
        return Err(not_found());
    }

    let path = user_dir(uploads_dir, owner).join(file);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Err(not_found()),
        Err(err) => return Err(anyhow::Error::from(err).context(format!("failed to read {}", path.display())).into()),
    };

    let mime = from_path(&path).first_or_octet_stream();
    Ok(Response::builder()
        .status(200)
        .header("content-type", mime.as_ref())
        .body(bytes)
        .build())
}
