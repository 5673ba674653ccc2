pub mod stub;

#[cfg(feature = "desktop")]
pub mod desktop;

use anyhow::Result;

use crate::logger;
use crate::template::Template;
use crate::types::*;

const SIMULATED_SCREEN: ScreenSize = ScreenSize { width: 1920, height: 1080 };

/// Screen capture and pointer injection. Only ever driven from the engine
/// thread, so implementations need `Send` but not `Sync`.
pub trait Platform: Send {
    fn screen_size(&self) -> Result<ScreenSize>;
    /// Grayscale capture of `region`, or of the whole screen for `None`.
    fn capture(&mut self, region: Option<ScanRegion>) -> Result<Frame>;
    fn click(&mut self, at: Point) -> Result<()>;
}

/// Create the platform for this build: the real desktop when compiled with
/// the `desktop` feature, the simulated screen otherwise or when forced.
/// The simulated screen shows `template` in its lower-right quadrant, away
/// from the initial search region.
pub fn create_platform(force_stub: bool, template: &Template) -> Result<Box<dyn Platform>> {
    if force_stub {
        return Ok(simulated(template));
    }
    #[cfg(feature = "desktop")]
    {
        logger::register_prefix("desktop", logger::COLOR_GRAY);
        Ok(Box::new(desktop::DesktopPlatform::new()?))
    }
    #[cfg(not(feature = "desktop"))]
    {
        logger::warn("built without the `desktop` feature, using the simulated screen");
        Ok(simulated(template))
    }
}

fn simulated(template: &Template) -> Box<dyn Platform> {
    logger::register_prefix("stub", logger::COLOR_GRAY);
    let size = SIMULATED_SCREEN;
    let at = Point::new(
        (size.width * 3 / 4).min(size.width.saturating_sub(template.width())) as i32,
        (size.height * 3 / 4).min(size.height.saturating_sub(template.height())) as i32,
    );
    Box::new(stub::StubPlatform::with_size(size).with_button(template, at))
}

/// Size of the screen the platform from [`create_platform`] would drive,
/// without taking hold of any input device.
pub fn probe_screen(force_stub: bool) -> Result<ScreenSize> {
    if force_stub {
        return Ok(SIMULATED_SCREEN);
    }
    #[cfg(feature = "desktop")]
    {
        desktop::primary_screen_size()
    }
    #[cfg(not(feature = "desktop"))]
    {
        Ok(SIMULATED_SCREEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::compute_region;
    use image::{GrayImage, Luma};

    #[test]
    fn forced_stub_hides_button_outside_initial_region() {
        let template =
            Template::from_gray(GrayImage::from_fn(30, 12, |x, y| Luma([(x * 8 + y * 3) as u8]))).unwrap();
        let mut platform = create_platform(true, &template).unwrap();
        let screen = platform.screen_size().unwrap();
        assert_eq!(screen, probe_screen(true).unwrap());

        let region = compute_region(screen, 0.4, template.width(), template.height(), None);
        assert!(!region.contains(Point::new(1440, 810)));

        let full = platform.capture(None).unwrap();
        assert_eq!(full.image.get_pixel(1440, 810), template.image().get_pixel(0, 0));
    }
}
