use std::path::Path;

use anyhow::{Context, Result};
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Pixel, RgbImage};
use ndarray::Array4;

/// Load an image from disk into memory.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path_ref = path.as_ref();
    image::open(path_ref).with_context(|| format!("failed to open image {}", path_ref.display()))
}

/// Decode an in-memory upload (JPEG, PNG, BMP or WebP).
///
/// Zero-sized images are rejected so callers can rely on a non-empty buffer.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    anyhow::ensure!(!bytes.is_empty(), "image payload is empty");
    let image = image::load_from_memory(bytes).context("failed to decode image payload")?;
    anyhow::ensure!(
        image.width() > 0 && image.height() > 0,
        "decoded image has zero dimensions"
    );
    Ok(image)
}

/// Resize to exactly `width` x `height`, ignoring aspect ratio.
pub fn resize_exact(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    resize_bilinear(image, width, height)
}

const RESIZE_COEF_BITS: u32 = 11;
const RESIZE_COEF_SCALE: i32 = 1 << RESIZE_COEF_BITS;

/// Two-tap bilinear resize with half-pixel centres and 11-bit fixed-point
/// weights, matching OpenCV's `INTER_LINEAR` on 8-bit images.
///
/// Unlike `image::imageops::resize` with `Triangle`, the filter support does
/// not widen when downscaling: every output sample reads at most 2x2 inputs.
pub fn resize_bilinear<P>(
    image: &ImageBuffer<P, Vec<u8>>,
    width: u32,
    height: u32,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let (src_w, src_h) = image.dimensions();
    if width == 0 || height == 0 || src_w == 0 || src_h == 0 {
        return ImageBuffer::new(width, height);
    }
    if (src_w, src_h) == (width, height) {
        return image.clone();
    }

    let channels = usize::from(P::CHANNEL_COUNT);
    let xs = linear_taps(width, src_w);
    let ys = linear_taps(height, src_h);
    let src = image.as_raw();
    let src_row_len = src_w as usize * channels;
    let dst_row_len = width as usize * channels;

    // Horizontal pass over every source row, kept at fixed-point precision.
    let mut rows = vec![0i32; src_h as usize * dst_row_len];
    for (src_row, out_row) in src
        .chunks_exact(src_row_len)
        .zip(rows.chunks_exact_mut(dst_row_len))
    {
        for (dx, tap) in xs.iter().enumerate() {
            for c in 0..channels {
                out_row[dx * channels + c] = i32::from(src_row[tap.first * channels + c])
                    * tap.w0
                    + i32::from(src_row[tap.second * channels + c]) * tap.w1;
            }
        }
    }

    let mut out = Vec::with_capacity(height as usize * dst_row_len);
    for tap in &ys {
        let r0 = &rows[tap.first * dst_row_len..(tap.first + 1) * dst_row_len];
        let r1 = &rows[tap.second * dst_row_len..(tap.second + 1) * dst_row_len];
        out.extend(r0.iter().zip(r1).map(|(&v0, &v1)| {
            let acc = i64::from(v0) * i64::from(tap.w0) + i64::from(v1) * i64::from(tap.w1);
            ((acc + (1 << (2 * RESIZE_COEF_BITS - 1))) >> (2 * RESIZE_COEF_BITS)).clamp(0, 255)
                as u8
        }));
    }
    ImageBuffer::from_raw(width, height, out).unwrap_or_else(|| ImageBuffer::new(width, height))
}

struct LinearTap {
    first: usize,
    second: usize,
    w0: i32,
    w1: i32,
}

fn linear_taps(dst_len: u32, src_len: u32) -> Vec<LinearTap> {
    let scale = f64::from(src_len) / f64::from(dst_len);
    let last = src_len as usize - 1;
    (0..dst_len)
        .map(|d| {
            let pos = (f64::from(d) + 0.5) * scale - 0.5;
            let floor = pos.floor();
            let (first, frac) = if floor < 0.0 {
                (0, 0.0)
            } else if floor as usize >= last {
                (last, 0.0)
            } else {
                (floor as usize, pos - floor)
            };
            let w0 = ((1.0 - frac) * f64::from(RESIZE_COEF_SCALE)).round() as i32;
            LinearTap {
                first,
                second: (first + 1).min(last),
                w0,
                w1: RESIZE_COEF_SCALE - w0,
            }
        })
        .collect()
}

/// Convert RGB to single-channel luminance with BT.601 weights.
///
/// `image`'s own `to_luma8` uses BT.709 coefficients; cascade files trained on
/// OpenCV grayscale expect `0.299 R + 0.587 G + 0.114 B`.
pub fn luminance_bt601(image: &RgbImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut gray = GrayImage::new(width, height);
    for (x, y, pixel) in image.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let value = 0.299f32.mul_add(
            f32::from(r),
            0.587f32.mul_add(f32::from(g), 0.114 * f32::from(b)),
        );
        gray.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
    }
    gray
}

/// Lay out an RGB image as a `[1, H, W, 3]` BGR tensor of raw `0..=255` values.
///
/// This is the layout produced by stacking an OpenCV (BGR) image into a batch
/// of one and casting it to `float32`, without any rescaling.
pub fn rgb_to_bgr_nhwc(image: &RgbImage) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let mut array = Array4::<f32>::zeros((1, height as usize, width as usize, 3));
    for (x, y, pixel) in image.enumerate_pixels() {
        let (xi, yi) = (x as usize, y as usize);
        array[(0, yi, xi, 0)] = f32::from(pixel[2]); // Blue
        array[(0, yi, xi, 1)] = f32::from(pixel[1]); // Green
        array[(0, yi, xi, 2)] = f32::from(pixel[0]); // Red
    }
    array
}
