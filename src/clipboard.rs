//! Clipboard image source — the platform clipboard behind a narrow seam.
//!
//! The watcher only ever sees "PNG bytes or nothing"; how they are obtained
//! is this module's business. The arboard adapter opens the clipboard per
//! read, which works reliably across desktops.

use async_trait::async_trait;

/// Reads the current clipboard image, if any, as encoded PNG bytes.
#[async_trait]
pub trait ClipboardImageSource: Send + Sync {
    async fn read_image(&self) -> Option<Vec<u8>>;
}

/// Native clipboard access via arboard.
pub struct ArboardSource;

#[async_trait]
impl ClipboardImageSource for ArboardSource {
    async fn read_image(&self) -> Option<Vec<u8>> {
        let mut clipboard = match arboard::Clipboard::new() {
            Ok(c) => c,
            Err(e) => {
                log::debug!("[CLIPBOARD] Clipboard unavailable: {}", e);
                return None;
            }
        };
        let image = match clipboard.get_image() {
            Ok(img) => img,
            // No image on the clipboard is the common case, not an error.
            Err(_) => return None,
        };
        encode_png(image.width, image.height, image.bytes.into_owned())
    }
}

/// Encode raw RGBA pixels to PNG in memory — no disk I/O.
fn encode_png(width: usize, height: usize, rgba: Vec<u8>) -> Option<Vec<u8>> {
    let buffer = image::RgbaImage::from_raw(width as u32, height as u32, rgba)?;
    let mut png_bytes = Vec::new();
    if let Err(e) = image::DynamicImage::ImageRgba8(buffer).write_to(
        &mut std::io::Cursor::new(&mut png_bytes),
        image::ImageFormat::Png,
    ) {
        log::warn!("[CLIPBOARD] PNG encode failed: {}", e);
        return None;
    }
    Some(png_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_rgba_to_png() {
        let rgba = vec![255u8; 2 * 2 * 4];
        let png = encode_png(2, 2, rgba).expect("encode");
        // PNG magic
        assert_eq!(&png[..4], &[0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn rejects_mismatched_dimensions() {
        assert!(encode_png(10, 10, vec![0u8; 4]).is_none());
    }
}
