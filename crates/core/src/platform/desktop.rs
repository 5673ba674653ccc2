use anyhow::{anyhow, bail, Result};
use enigo::{Button, Coordinate, Direction, Enigo, Mouse, Settings};
use image::{imageops, DynamicImage};
use xcap::Monitor;

use crate::logger;
use crate::types::*;
use super::Platform;

/// Primary monitor capture (xcap) and pointer injection (enigo).
///
/// Only plain data is stored; OS handles are reacquired per call so the
/// platform stays `Send` on every backend.
pub struct DesktopPlatform {
    monitor_id: u32,
    size: ScreenSize,
}

impl DesktopPlatform {
    pub fn new() -> Result<Self> {
        let monitor = primary_monitor(None)?;
        let size = ScreenSize::new(monitor.width(), monitor.height());
        logger::info_p(
            "desktop",
            &format!("primary monitor \"{}\" {}x{}", monitor.name(), size.width, size.height),
        );
        Ok(Self { monitor_id: monitor.id(), size })
    }
}

pub fn primary_screen_size() -> Result<ScreenSize> {
    let monitor = primary_monitor(None)?;
    let size = ScreenSize::new(monitor.width(), monitor.height());
    if size.width == 0 || size.height == 0 {
        bail!("primary monitor reports a zero size");
    }
    Ok(size)
}

fn primary_monitor(id: Option<u32>) -> Result<Monitor> {
    let monitors = Monitor::all().map_err(|e| anyhow!("failed to enumerate monitors: {}", e))?;
    let found = match id {
        Some(id) => monitors.into_iter().find(|m| m.id() == id),
        None => {
            let idx = monitors.iter().position(|m| m.is_primary()).unwrap_or(0);
            monitors.into_iter().nth(idx)
        }
    };
    found.ok_or_else(|| anyhow!("no monitor found"))
}

impl Platform for DesktopPlatform {
    fn screen_size(&self) -> Result<ScreenSize> {
        Ok(self.size)
    }

    fn capture(&mut self, region: Option<ScanRegion>) -> Result<Frame> {
        let monitor = primary_monitor(Some(self.monitor_id))?;
        let shot = monitor
            .capture_image()
            .map_err(|e| anyhow!("screen capture failed (check screen recording permission): {}", e))?;
        if shot.width() == 0 || shot.height() == 0 {
            bail!("captured an empty screenshot");
        }

        let rgba = match region {
            None => shot,
            Some(r) => {
                if r.left < 0 || r.top < 0 || r.right() > shot.width() as i64 || r.bottom() > shot.height() as i64 {
                    bail!("capture region {:?} exceeds the {}x{} screenshot", r, shot.width(), shot.height());
                }
                imageops::crop_imm(&shot, r.left as u32, r.top as u32, r.width, r.height).to_image()
            }
        };
        Ok(Frame::new(DynamicImage::ImageRgba8(rgba).to_luma8()))
    }

    fn click(&mut self, at: Point) -> Result<()> {
        let mut enigo = Enigo::new(&Settings::default())
            .map_err(|e| anyhow!("failed to open input connection: {}", e))?;

        // Parking the pointer in the top-left corner aborts automation.
        let (px, py) = enigo.location().map_err(|e| anyhow!("pointer location: {}", e))?;
        if (px, py) == (0, 0) {
            bail!("fail-safe triggered: pointer is in the top-left corner");
        }

        logger::info_p("desktop", &format!("click({}, {})", at.x, at.y));
        enigo
            .move_mouse(at.x, at.y, Coordinate::Abs)
            .map_err(|e| anyhow!("pointer move failed: {}", e))?;
        std::thread::sleep(std::time::Duration::from_millis(15));
        enigo
            .button(Button::Left, Direction::Click)
            .map_err(|e| anyhow!("click failed: {}", e))?;
        Ok(())
    }
}
