use std::path::Path;

use anyhow::{bail, Context, Result};
use image::{DynamicImage, GrayImage, Rgb, RgbImage};

/// The reference button image, grayscale. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Template {
    image: GrayImage,
}

impl Template {
    /// Decode an image file into a grayscale template. Transparent pixels are
    /// flattened onto white first, so a PNG with an alpha channel matches the
    /// way the button looks on a light background.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            bail!("template image not found at {}", path.display());
        }
        let img = image::open(path)
            .with_context(|| format!("failed to decode template {}", path.display()))?;
        Self::from_gray(to_gray(img))
    }

    pub fn from_gray(image: GrayImage) -> Result<Self> {
        if image.width() == 0 || image.height() == 0 {
            bail!("template image is empty");
        }
        Ok(Self { image })
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Offset from the top-left corner to the template's center.
    pub fn half_extent(&self) -> (i32, i32) {
        ((self.width() / 2) as i32, (self.height() / 2) as i32)
    }
}

fn to_gray(img: DynamicImage) -> GrayImage {
    if !img.color().has_alpha() {
        return img.to_luma8();
    }
    let rgba = img.to_rgba8();
    let mut flat = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, p) in rgba.enumerate_pixels() {
        let a = p[3] as f32 / 255.0;
        let blend = |c: u8| (c as f32 * a + 255.0 * (1.0 - a)) as u8;
        flat.put_pixel(x, y, Rgb([blend(p[0]), blend(p[1]), blend(p[2])]));
    }
    DynamicImage::ImageRgb8(flat).to_luma8()
}
