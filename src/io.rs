use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbaImage};
use rfd::FileDialog;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::error::LoadError;

/// Longest side of a history thumbnail, in pixels.
pub const THUMBNAIL_MAX_SIDE: u32 = 150;
/// JPEG quality of history thumbnails.
pub const THUMBNAIL_QUALITY: u8 = 70;

/// Extensions offered by the open dialog and accepted from drag-and-drop.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "webp", "bmp", "gif", "tga", "ico", "tiff", "tif",
];

// ============================================================================
// FILE TYPE DETECTION
// ============================================================================

/// MIME type guessed from a file name's extension. Unknown extensions map to
/// `application/octet-stream`.
pub fn mime_for_name(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "gif" => "image/gif",
        "tga" => "image/x-tga",
        "ico" => "image/x-icon",
        "tiff" | "tif" => "image/tiff",
        "svg" => "image/svg+xml",
        "txt" => "text/plain",
        "json" => "application/json",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

pub fn is_image_mime(mime: &str) -> bool {
    mime.trim().to_ascii_lowercase().starts_with("image/")
}

/// Reject anything that is not an image before any decoding is attempted.
pub fn check_image_type(name: &str, mime: Option<&str>) -> Result<(), LoadError> {
    let mime = mime.unwrap_or_else(|| mime_for_name(name));
    if is_image_mime(mime) {
        Ok(())
    } else {
        Err(LoadError::InvalidFileType(name.to_string()))
    }
}

// ============================================================================
// DECODING
// ============================================================================

/// Read a whole file into memory.
pub fn read_file(path: &Path) -> Result<Vec<u8>, LoadError> {
    Ok(std::fs::read(path)?)
}

/// Decode image bytes. The format is sniffed from the bytes themselves; a
/// declared MIME type is only used to reject non-images up front.
pub fn decode_image(bytes: &[u8], mime: Option<&str>) -> Result<DynamicImage, LoadError> {
    if let Some(mime) = mime
        && !is_image_mime(mime)
    {
        return Err(LoadError::InvalidFileType(mime.to_string()));
    }
    let format = match image::guess_format(bytes) {
        Ok(format) => format,
        Err(e) if mime.is_some() => return Err(LoadError::DecodeFailure(e)),
        Err(_) => {
            return Err(LoadError::InvalidFileType(
                "unrecognized image data".to_string(),
            ));
        }
    };
    Ok(image::load_from_memory_with_format(bytes, format)?)
}

// ============================================================================
// THUMBNAILS
// ============================================================================

/// Size of the thumbnail for a `width × height` image: the longer side is capped
/// at [`THUMBNAIL_MAX_SIDE`], aspect ratio kept, never upscaled.
pub fn thumbnail_size(width: u32, height: u32) -> (u32, u32) {
    let (w, h) = (width as f32, height as f32);
    let max = THUMBNAIL_MAX_SIDE as f32;
    let (w, h) = if w > h {
        if w > max { (max, max * h / w) } else { (w, h) }
    } else if h > max {
        (max * w / h, max)
    } else {
        (w, h)
    };
    ((w.round() as u32).max(1), (h.round() as u32).max(1))
}

/// Downscale `img` and encode it as a lossy JPEG for the image history.
pub fn make_thumbnail(img: &DynamicImage) -> Result<Vec<u8>, LoadError> {
    let (tw, th) = thumbnail_size(img.width(), img.height());
    let small = if (tw, th) == (img.width(), img.height()) {
        img.to_rgb8()
    } else {
        image::imageops::resize(&img.to_rgb8(), tw, th, image::imageops::FilterType::Triangle)
    };

    let mut bytes = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut bytes, THUMBNAIL_QUALITY);
        encoder.encode(
            small.as_raw(),
            small.width(),
            small.height(),
            image::ColorType::Rgb8,
        )?;
    }
    Ok(bytes)
}

/// Decode a stored history thumbnail back into pixels.
pub fn decode_thumbnail(bytes: &[u8]) -> Result<RgbaImage, LoadError> {
    Ok(image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)?.to_rgba8())
}

// ============================================================================
// OPEN DIALOG
// ============================================================================

/// Native "open image" dialog. "All Files" is offered too; whatever is picked is
/// still validated by [`check_image_type`].
pub fn pick_image_path() -> Option<PathBuf> {
    FileDialog::new()
        .add_filter("Images", IMAGE_EXTENSIONS)
        .add_filter("All Files", &["*"])
        .pick_file()
}

/// Display name of a path (file name, or the whole path as a fallback).
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Encode an RGBA image as PNG bytes.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, LoadError> {
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img.clone()).write_to(&mut cursor, image::ImageOutputFormat::Png)?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid_png(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
        encode_png(&RgbaImage::from_pixel(w, h, Rgba(px))).unwrap()
    }

    #[test]
    fn mime_follows_extension_case_insensitively() {
        assert_eq!(mime_for_name("Cat.PNG"), "image/png");
        assert_eq!(mime_for_name("photo.jpeg"), "image/jpeg");
        assert_eq!(mime_for_name("notes.txt"), "text/plain");
        assert_eq!(mime_for_name("no_extension"), "application/octet-stream");
    }

    #[test]
    fn non_images_are_rejected_before_decoding() {
        assert!(check_image_type("cat.png", None).is_ok());
        assert!(check_image_type("blob", Some("image/webp")).is_ok());
        assert!(matches!(
            check_image_type("notes.txt", None),
            Err(LoadError::InvalidFileType(_))
        ));
        assert!(matches!(
            decode_image(b"hello", Some("text/plain")),
            Err(LoadError::InvalidFileType(_))
        ));
    }

    #[test]
    fn garbage_with_image_mime_is_a_decode_failure() {
        assert!(matches!(
            decode_image(b"definitely not a png", Some("image/png")),
            Err(LoadError::DecodeFailure(_))
        ));
    }

    #[test]
    fn unknown_bytes_without_mime_are_not_an_image() {
        assert!(matches!(
            decode_image(b"plain words", None),
            Err(LoadError::InvalidFileType(_))
        ));
    }

    #[test]
    fn png_bytes_decode_to_their_pixels() {
        let img = decode_image(&solid_png(3, 2, [10, 20, 30, 255]), None).unwrap();
        assert_eq!((img.width(), img.height()), (3, 2));
        assert_eq!(img.to_rgba8().get_pixel(2, 1).0, [10, 20, 30, 255]);
    }

    #[test]
    fn thumbnail_caps_longest_side() {
        assert_eq!(thumbnail_size(600, 300), (150, 75));
        assert_eq!(thumbnail_size(300, 600), (75, 150));
        assert_eq!(thumbnail_size(150, 150), (150, 150));
        assert_eq!(thumbnail_size(40, 20), (40, 20));
        assert_eq!(thumbnail_size(10_000, 1), (150, 1));
    }

    #[test]
    fn thumbnail_is_a_small_jpeg() {
        let img = decode_image(&solid_png(400, 200, [200, 40, 40, 255]), None).unwrap();
        let jpeg = make_thumbnail(&img).unwrap();
        assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);

        let back = decode_thumbnail(&jpeg).unwrap();
        assert_eq!((back.width(), back.height()), (150, 75));
        let [r, g, b, _] = back.get_pixel(75, 37).0;
        assert!(r.abs_diff(200) < 8 && g.abs_diff(40) < 8 && b.abs_diff(40) < 8);
    }

    #[test]
    fn display_name_is_the_file_name() {
        assert_eq!(display_name(Path::new("/tmp/pics/cat.png")), "cat.png");
    }
}
