//! File upload adapter. Produces the same `ImageBuffer` a capture does, without
//! touching any capture session.

use std::{fs, io::Cursor, path::Path};

use image::{ImageFormat, ImageReader};

use crate::{
    errors::ScanError,
    models::{ImageBuffer, ImageSource},
};

/// A file picked by the operator.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    /// Declared MIME type, when the picker supplies one.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn read(path: &Path) -> Result<Self, ScanError> {
        let bytes = fs::read(path).map_err(|err| {
            log::warn!("Failed to read upload {}: {err}", path.display());
            ScanError::InvalidUpload
        })?;
        let content_type = ImageFormat::from_path(path)
            .ok()
            .map(|format| format.to_mime_type().to_string());

        Ok(Self {
            name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            content_type,
            bytes,
        })
    }
}

/// Accept the file only if it is an image both by declared type and by content.
pub fn accept_upload(file: UploadedFile) -> Result<ImageBuffer, ScanError> {
    if let Some(declared) = file.content_type.as_deref() {
        if !declared.starts_with("image/") {
            log::warn!("Rejected upload {}: declared type {declared}", file.name);
            return Err(ScanError::InvalidUpload);
        }
    }

    let format = image::guess_format(&file.bytes).map_err(|_| {
        log::warn!("Rejected upload {}: not a recognised image", file.name);
        ScanError::InvalidUpload
    })?;

    let dimensions = ImageReader::with_format(Cursor::new(&file.bytes), format)
        .into_dimensions()
        .map_err(|err| {
            log::warn!("Rejected upload {}: unreadable header: {err}", file.name);
            ScanError::InvalidUpload
        })?;

    log::info!(
        "Accepted upload {} ({}x{}, {} bytes)",
        file.name,
        dimensions.0,
        dimensions.1,
        file.bytes.len()
    );

    Ok(ImageBuffer::new(
        file.bytes,
        format.to_mime_type(),
        Some(dimensions),
        ImageSource::Uploaded,
    ))
}

pub fn load_upload(path: &Path) -> Result<ImageBuffer, ScanError> {
    accept_upload(UploadedFile::read(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn accepts_png_and_reads_dimensions() {
        let image = accept_upload(UploadedFile {
            name: "sig.png".into(),
            content_type: Some("image/png".into()),
            bytes: png_bytes(12, 7),
        })
        .unwrap();

        assert_eq!(image.dimensions(), Some((12, 7)));
        assert_eq!(image.content_type(), "image/png");
        assert_eq!(image.source(), ImageSource::Uploaded);
    }

    #[test]
    fn rejects_non_image_declared_type() {
        let result = accept_upload(UploadedFile {
            name: "notes.pdf".into(),
            content_type: Some("application/pdf".into()),
            bytes: png_bytes(2, 2),
        });
        assert_eq!(result, Err(ScanError::InvalidUpload));
    }

    #[test]
    fn rejects_text_content_without_declared_type() {
        let result = accept_upload(UploadedFile {
            name: "notes.txt".into(),
            content_type: None,
            bytes: b"just some text".to_vec(),
        });
        assert_eq!(result, Err(ScanError::InvalidUpload));
    }

    #[test]
    fn missing_file_is_invalid_upload() {
        let result = load_upload(Path::new("/definitely/not/here.png"));
        assert_eq!(result, Err(ScanError::InvalidUpload));
    }
}
