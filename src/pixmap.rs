use std::io::Cursor;
use std::sync::Arc;

use egui::Vec2;
use image::{imageops, DynamicImage, ImageFormat, Rgba, RgbaImage};

/// Immutable, cheaply clonable RGBA buffer (straight alpha).
///
/// Clones share the same pixels, so a cache eviction never invalidates a
/// `Pixmap` that a stroke still holds.
#[derive(Clone)]
pub struct Pixmap {
    pixels: Arc<RgbaImage>,
}

impl Pixmap {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(image),
        }
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self::new(image.to_rgba8())
    }

    /// Fully transparent pixmap.
    pub fn transparent(width: u32, height: u32) -> Self {
        Self::new(RgbaImage::new(width.max(1), height.max(1)))
    }

    /// Grey tile with an outline and a diagonal cross, shown while pixels are
    /// loading or when the source could not be decoded.
    pub fn placeholder(width: u32, height: u32) -> Self {
        let (w, h) = (width.max(1), height.max(1));
        let fill = Rgba([200, 200, 200, 255]);
        let ink = Rgba([110, 110, 110, 255]);
        let mut img = RgbaImage::from_pixel(w, h, fill);
        for x in 0..w {
            img.put_pixel(x, 0, ink);
            img.put_pixel(x, h - 1, ink);
        }
        for y in 0..h {
            img.put_pixel(0, y, ink);
            img.put_pixel(w - 1, y, ink);
        }
        let steps = w.max(h);
        for i in 0..steps {
            let t = i as f32 / steps as f32;
            let x = (t * (w - 1) as f32).round() as u32;
            let y = (t * (h - 1) as f32).round() as u32;
            img.put_pixel(x, y, ink);
            img.put_pixel(w - 1 - x, y, ink);
        }
        Self::new(img)
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width() as f32, self.height() as f32)
    }

    pub fn image(&self) -> &RgbaImage {
        &self.pixels
    }

    /// True when both handles point at the same pixel buffer.
    pub fn ptr_eq(&self, other: &Pixmap) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }

    /// Resampled copy at exactly `width`×`height`. Same-size requests return a plain copy.
    pub fn scaled(&self, width: u32, height: u32) -> RgbaImage {
        let (w, h) = (width.max(1), height.max(1));
        if w == self.width() && h == self.height() {
            return (*self.pixels).clone();
        }
        imageops::resize(&*self.pixels, w, h, imageops::FilterType::Triangle)
    }

    pub fn to_png_bytes(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut bytes = Vec::new();
        self.pixels
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }
}

impl From<RgbaImage> for Pixmap {
    fn from(image: RgbaImage) -> Self {
        Self::new(image)
    }
}

impl PartialEq for Pixmap {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.pixels == *other.pixels
    }
}

impl std::fmt::Debug for Pixmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pixmap")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_pixels() {
        let a = Pixmap::transparent(4, 4);
        let b = a.clone();
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn test_placeholder_is_opaque() {
        let p = Pixmap::placeholder(20, 10);
        assert_eq!((p.width(), p.height()), (20, 10));
        assert!(p.image().pixels().all(|px| px[3] == 255));
    }

    #[test]
    fn test_png_bytes_have_signature() {
        let bytes = Pixmap::placeholder(8, 8).to_png_bytes().unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }
}
