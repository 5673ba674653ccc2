use anyhow::{bail, Result};
use image::GrayImage;
use imageproc::integral_image::{integral_image, integral_squared_image, sum_image_pixels};
use rayon::prelude::*;

use crate::template::Template;
use crate::types::{Frame, MatchResult, Point};

/// Locates the template inside a captured frame.
pub trait Matcher: Send {
    fn best_match(&self, frame: &Frame, template: &Template) -> Result<MatchResult>;
}

/// Zero-mean normalized cross-correlation. Scores lie in [-1, 1]; 1 is a
/// pixel-perfect match up to brightness and contrast. Windows (or templates)
/// with no variance score 0.
///
/// Every sum is kept in integers until the final division, so light,
/// low-contrast buttons score as well as high-contrast ones.
#[derive(Debug, Default, Clone, Copy)]
pub struct NccMatcher;

impl Matcher for NccMatcher {
    fn best_match(&self, frame: &Frame, template: &Template) -> Result<MatchResult> {
        let image = &frame.image;
        let tmpl = template.image();
        if image.width() < tmpl.width() || image.height() < tmpl.height() {
            bail!(
                "frame {}x{} is smaller than the template {}x{}",
                image.width(),
                image.height(),
                tmpl.width(),
                tmpl.height()
            );
        }

        let (tw, th) = tmpl.dimensions();
        let n = tw as u64 * th as u64;
        let (t_sum, t_sq) = pixel_sums(tmpl);
        let t_spread = spread(n, t_sum, t_sq);
        let miss = MatchResult { score: 0.0, location: Point::default() };
        if t_spread == 0 {
            return Ok(miss);
        }
        let t_norm = (t_spread as f64).sqrt();

        let sums = integral_image::<_, u64>(image);
        let squares = integral_squared_image::<_, u64>(image);
        let out_w = image.width() - tw + 1;
        let out_h = image.height() - th + 1;

        let best = (0..out_h)
            .into_par_iter()
            .map(|y| {
                let mut row_best = MatchResult { score: f32::NEG_INFINITY, location: Point::default() };
                for x in 0..out_w {
                    let w_sum = sum_image_pixels(&sums, x, y, x + tw - 1, y + th - 1)[0];
                    let w_sq = sum_image_pixels(&squares, x, y, x + tw - 1, y + th - 1)[0];
                    let w_spread = spread(n, w_sum, w_sq);

                    let score = if w_spread == 0 {
                        0.0
                    } else {
                        let dot = window_dot(image, tmpl, x, y);
                        let numerator = n as i128 * dot as i128 - t_sum as i128 * w_sum as i128;
                        (numerator as f64 / (t_norm * (w_spread as f64).sqrt())).clamp(-1.0, 1.0) as f32
                    };
                    if score > row_best.score {
                        row_best = MatchResult { score, location: Point::new(x as i32, y as i32) };
                    }
                }
                row_best
            })
            // ties go to the earliest window in raster order
            .reduce_with(|a, b| if b.score > a.score { b } else { a });

        Ok(best.unwrap_or(miss))
    }
}

fn pixel_sums(img: &GrayImage) -> (u64, u64) {
    img.pixels().fold((0, 0), |(s, sq), p| {
        let v = p[0] as u64;
        (s + v, sq + v * v)
    })
}

/// n * sum((v - mean)^2) = n * sum(v^2) - sum(v)^2, exact.
fn spread(n: u64, sum: u64, sum_sq: u64) -> u128 {
    n as u128 * sum_sq as u128 - sum as u128 * sum as u128
}

/// sum(I * T) for the window of `image` whose top-left corner is (x, y).
fn window_dot(image: &GrayImage, tmpl: &GrayImage, x: u32, y: u32) -> u64 {
    let iw = image.width() as usize;
    let tw = tmpl.width() as usize;
    let pixels = image.as_raw();
    let mut total = 0u64;
    for (ty, t_row) in tmpl.as_raw().chunks_exact(tw).enumerate() {
        let start = (y as usize + ty) * iw + x as usize;
        let i_row = &pixels[start..start + tw];
        total += i_row.iter().zip(t_row).map(|(&a, &b)| a as u64 * b as u64).sum::<u64>();
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn noise(w: u32, h: u32, seed: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            let mut v = x.wrapping_mul(374_761_393) ^ y.wrapping_mul(668_265_263) ^ seed;
            v = (v ^ (v >> 13)).wrapping_mul(1_274_126_177);
            Luma([(v >> 24) as u8])
        })
    }

    fn paste(frame: &mut GrayImage, tmpl: &GrayImage, at: (u32, u32)) {
        for (x, y, p) in tmpl.enumerate_pixels() {
            frame.put_pixel(at.0 + x, at.1 + y, *p);
        }
    }

    #[test]
    fn finds_planted_template() {
        let tmpl = noise(16, 9, 7);
        let mut frame = noise(120, 80, 99);
        paste(&mut frame, &tmpl, (41, 23));

        let t = Template::from_gray(tmpl).unwrap();
        let m = NccMatcher.best_match(&Frame::new(frame), &t).unwrap();
        assert_eq!(m.location, Point::new(41, 23));
        assert!(m.score > 0.999, "score {}", m.score);
    }

    #[test]
    fn brightness_shift_still_matches() {
        let tmpl = GrayImage::from_fn(10, 10, |x, y| Luma([((x + y) * 8) as u8]));
        let shifted = GrayImage::from_fn(10, 10, |x, y| Luma([((x + y) * 8 + 40) as u8]));
        let mut frame = noise(60, 60, 3);
        paste(&mut frame, &shifted, (5, 30));

        let t = Template::from_gray(tmpl).unwrap();
        let m = NccMatcher.best_match(&Frame::new(frame), &t).unwrap();
        assert_eq!(m.location, Point::new(5, 30));
        assert!(m.score > 0.999);
    }

    fn low_contrast(w: u32, h: u32, base: u8, amp: u8) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            let v = (x.wrapping_mul(2_654_435_761) ^ y.wrapping_mul(40_503)) >> 7;
            Luma([base + (v % (amp as u32 + 1)) as u8])
        })
    }

    #[test]
    fn light_low_contrast_template_is_found() {
        for &(fw, fh, base, amp) in &[(100, 40, 240, 10), (300, 80, 245, 4), (200, 60, 250, 2), (400, 120, 250, 3)] {
            let tmpl = low_contrast(24, 12, base, amp);
            let mut frame = GrayImage::from_pixel(fw, fh, Luma([base]));
            paste(&mut frame, &tmpl, (20, 20));

            let t = Template::from_gray(tmpl).unwrap();
            let m = NccMatcher.best_match(&Frame::new(frame), &t).unwrap();
            assert_eq!(m.location, Point::new(20, 20), "{}x{} base={} amp={}", fw, fh, base, amp);
            assert!(m.score > 0.99, "{}x{} base={} amp={}: score {}", fw, fh, base, amp, m.score);
        }
    }

    #[test]
    fn ties_resolve_to_first_window() {
        let tmpl = noise(6, 6, 4);
        let mut frame = GrayImage::from_pixel(40, 20, Luma([0]));
        paste(&mut frame, &tmpl, (25, 10));
        paste(&mut frame, &tmpl, (3, 2));
        let t = Template::from_gray(tmpl).unwrap();
        let m = NccMatcher.best_match(&Frame::new(frame), &t).unwrap();
        assert_eq!(m.location, Point::new(3, 2));
    }

    #[test]
    fn absent_template_scores_low() {
        let t = Template::from_gray(noise(16, 16, 1)).unwrap();
        let m = NccMatcher.best_match(&Frame::new(noise(100, 100, 2)), &t).unwrap();
        assert!(m.score < 0.85, "score {}", m.score);
    }

    #[test]
    fn flat_frame_scores_zero() {
        let t = Template::from_gray(noise(8, 8, 5)).unwrap();
        let frame = GrayImage::from_pixel(40, 30, Luma([128]));
        let m = NccMatcher.best_match(&Frame::new(frame), &t).unwrap();
        assert_eq!(m.score, 0.0);
    }

    #[test]
    fn frame_equal_to_template_size() {
        let tmpl = noise(20, 10, 11);
        let t = Template::from_gray(tmpl.clone()).unwrap();
        let m = NccMatcher.best_match(&Frame::new(tmpl), &t).unwrap();
        assert_eq!(m.location, Point::new(0, 0));
        assert!(m.score > 0.999);
    }

    #[test]
    fn frame_smaller_than_template_is_an_error() {
        let t = Template::from_gray(noise(50, 10, 1)).unwrap();
        assert!(NccMatcher.best_match(&Frame::new(noise(40, 40, 2)), &t).is_err());
    }
}
