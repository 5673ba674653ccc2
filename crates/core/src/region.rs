use crate::types::{Point, ScanRegion, ScreenSize};

/// Search window of `scale` times the screen, never smaller than the
/// template, centered on `center` (screen center if `None`) and shifted so it
/// stays on screen.
pub fn compute_region(
    screen: ScreenSize,
    scale: f64,
    template_w: u32,
    template_h: u32,
    center: Option<Point>,
) -> ScanRegion {
    let center = center.unwrap_or_else(|| screen.center());
    let (left, width) = fit_axis(screen.width, scale, template_w, center.x);
    let (top, height) = fit_axis(screen.height, scale, template_h, center.y);
    ScanRegion { left, top, width, height }
}

/// Size and clamped start offset along one axis.
fn fit_axis(screen: u32, scale: f64, min_size: u32, center: i32) -> (i32, u32) {
    let scaled = (screen as f64 * scale).floor() as u32;
    let size = scaled.max(min_size).min(screen);
    let start = center as i64 - (size / 2) as i64;
    let max_start = (screen - size) as i64;
    (start.clamp(0, max_start) as i32, size)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCREEN: ScreenSize = ScreenSize { width: 1920, height: 1080 };

    fn assert_fits(r: ScanRegion, screen: ScreenSize, tw: u32, th: u32) {
        assert!(r.width >= tw && r.height >= th, "{:?} smaller than template", r);
        assert!(r.left >= 0 && r.top >= 0, "{:?} starts off screen", r);
        assert!(r.right() <= screen.width as i64, "{:?} overflows right", r);
        assert!(r.bottom() <= screen.height as i64, "{:?} overflows bottom", r);
    }

    #[test]
    fn default_center_is_screen_center() {
        let r = compute_region(SCREEN, 0.4, 100, 40, None);
        assert_eq!(r, ScanRegion { left: 576, top: 324, width: 768, height: 432 });
    }

    #[test]
    fn template_wider_than_scaled_window_wins() {
        let r = compute_region(SCREEN, 0.1, 500, 20, None);
        assert_eq!(r.width, 500);
        assert_eq!(r.height, 108);
        assert_eq!(r.left, 960 - 250);
    }

    #[test]
    fn clamped_against_every_edge() {
        let r = compute_region(SCREEN, 0.4, 100, 40, Some(Point::new(10, 10)));
        assert_eq!((r.left, r.top), (0, 0));

        let r = compute_region(SCREEN, 0.4, 100, 40, Some(Point::new(1915, 1075)));
        assert_eq!((r.left, r.top), (1920 - 768, 1080 - 432));
    }

    #[test]
    fn full_scale_covers_the_screen() {
        let r = compute_region(SCREEN, 1.0, 100, 40, Some(Point::new(3, 900)));
        assert_eq!(r, ScanRegion { left: 0, top: 0, width: 1920, height: 1080 });
    }

    #[test]
    fn always_on_screen_for_any_center() {
        let centers = [
            Point::new(i32::MIN, i32::MIN),
            Point::new(i32::MAX, i32::MAX),
            Point::new(-5000, 500),
            Point::new(500, -5000),
            Point::new(99_999, 3),
            Point::new(0, 0),
            Point::new(1920, 1080),
        ];
        let templates = [(1, 1), (100, 40), (1920, 1080), (800, 900)];
        let screens = [SCREEN, ScreenSize::new(1024, 768), ScreenSize::new(3840, 2160)];

        for screen in screens {
            for &(tw, th) in &templates {
                if tw > screen.width || th > screen.height {
                    continue;
                }
                for scale in [0.05, 0.4, 0.99, 1.0] {
                    for c in centers {
                        assert_fits(compute_region(screen, scale, tw, th, Some(c)), screen, tw, th);
                    }
                }
            }
        }
    }

    #[test]
    fn recenters_on_click_point() {
        let r = compute_region(SCREEN, 0.4, 100, 40, Some(Point::new(1000, 600)));
        assert_eq!(r.left, 1000 - 384);
        assert_eq!(r.top, 600 - 216);
        assert!(r.contains(Point::new(1000, 600)));
    }
}
