use anyhow::{bail, Result};
use image::{imageops, GrayImage, Luma};

use crate::logger;
use crate::template::Template;
use crate::types::*;
use super::Platform;

const TICKER_SIZE: u32 = 8;

/// Simulated screen for development and tests. Paints a textured
/// background, an optional button, and a small ticker that changes on every
/// capture so consecutive frames differ the way a live desktop does.
pub struct StubPlatform {
    size: ScreenSize,
    background: GrayImage,
    button: Option<StubButton>,
    respawn_after: u32,
    ticker: bool,
    captures: u64,
    clicks: Vec<Point>,
}

struct StubButton {
    image: GrayImage,
    at: Point,
    hidden_for: u32,
}

impl StubButton {
    fn bounds(&self) -> ScanRegion {
        ScanRegion {
            left: self.at.x,
            top: self.at.y,
            width: self.image.width(),
            height: self.image.height(),
        }
    }
}

impl StubPlatform {
    pub fn new() -> Self {
        Self::with_size(ScreenSize::new(1920, 1080))
    }

    pub fn with_size(size: ScreenSize) -> Self {
        Self {
            size,
            background: textured(size),
            button: None,
            respawn_after: 3,
            ticker: true,
            captures: 0,
            clicks: Vec::new(),
        }
    }

    /// Paint `template` with its top-left corner at `at`.
    pub fn with_button(mut self, template: &Template, at: Point) -> Self {
        self.button = Some(StubButton { image: template.image().clone(), at, hidden_for: 0 });
        self
    }

    /// Captures a clicked button stays hidden for.
    pub fn respawn_after(mut self, captures: u32) -> Self {
        self.respawn_after = captures;
        self
    }

    /// Disable the ticker so an untouched screen yields identical frames.
    pub fn static_screen(mut self) -> Self {
        self.ticker = false;
        self
    }

    pub fn clicks(&self) -> &[Point] {
        &self.clicks
    }

    pub fn captures(&self) -> u64 {
        self.captures
    }

    fn render(&self, area: ScanRegion) -> GrayImage {
        let mut out = imageops::crop_imm(
            &self.background,
            area.left as u32,
            area.top as u32,
            area.width,
            area.height,
        )
        .to_image();

        if self.ticker {
            let c = self.size.center();
            let shade = Luma([(self.captures.wrapping_mul(37) % 256) as u8]);
            let ticker = GrayImage::from_pixel(TICKER_SIZE, TICKER_SIZE, shade);
            blit(&mut out, area, &ticker, c);
        }
        if let Some(b) = self.button.as_ref().filter(|b| b.hidden_for == 0) {
            blit(&mut out, area, &b.image, b.at);
        }
        out
    }
}

impl Default for StubPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for StubPlatform {
    fn screen_size(&self) -> Result<ScreenSize> {
        Ok(self.size)
    }

    fn capture(&mut self, region: Option<ScanRegion>) -> Result<Frame> {
        let area = region.unwrap_or(ScanRegion {
            left: 0,
            top: 0,
            width: self.size.width,
            height: self.size.height,
        });
        if area.left < 0
            || area.top < 0
            || area.right() > self.size.width as i64
            || area.bottom() > self.size.height as i64
        {
            bail!("capture region {:?} is outside the {}x{} screen", area, self.size.width, self.size.height);
        }

        let frame = Frame::new(self.render(area));
        if let Some(b) = self.button.as_mut() {
            b.hidden_for = b.hidden_for.saturating_sub(1);
        }
        self.captures += 1;
        Ok(frame)
    }

    fn click(&mut self, at: Point) -> Result<()> {
        logger::info_p("stub", &format!("click({}, {})", at.x, at.y));
        self.clicks.push(at);
        let respawn = self.respawn_after;
        if let Some(b) = self.button.as_mut() {
            if b.hidden_for == 0 && b.bounds().contains(at) {
                b.hidden_for = respawn;
            }
        }
        Ok(())
    }
}

/// Deterministic high-frequency texture; it never correlates with a real
/// button image.
fn textured(size: ScreenSize) -> GrayImage {
    GrayImage::from_fn(size.width, size.height, |x, y| {
        let mut v = x.wrapping_mul(0x9E37_79B1) ^ y.wrapping_mul(0x85EB_CA77);
        v ^= v >> 15;
        v = v.wrapping_mul(0xC2B2_AE3D);
        v ^= v >> 13;
        Luma([(v >> 24) as u8])
    })
}

/// Copy the part of `src` (placed at screen position `at`) that falls
/// inside `area` into `out`, which holds the pixels of `area`.
fn blit(out: &mut GrayImage, area: ScanRegion, src: &GrayImage, at: Point) {
    for (x, y, p) in src.enumerate_pixels() {
        let sx = at.x as i64 + x as i64;
        let sy = at.y as i64 + y as i64;
        if sx < area.left as i64 || sy < area.top as i64 || sx >= area.right() || sy >= area.bottom() {
            continue;
        }
        out.put_pixel((sx - area.left as i64) as u32, (sy - area.top as i64) as u32, *p);
    }
}
