use std::io::Cursor;

use crate::{
    bitmap::Bitmap,
    error::{LogomarkError, LogomarkResult},
};

/// Nominal logo footprint for landscape images (logo target width in px).
pub const LOGO_SIZE_HORIZONTAL: u32 = 1000;
/// Nominal logo footprint for portrait/square images.
pub const LOGO_SIZE_VERTICAL: u32 = 1200;
/// JPEG quality for the composited output. Maximum: the export is meant to
/// preserve the source, the archive layer does the compression.
pub const JPEG_QUALITY: u8 = 100;

/// Resolved logo scale and position for one image, in image pixel space.
///
/// `x` may be negative when the clamped logo is wider than the image; the
/// draw clips to the image bounds.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct LogoPlacement {
    pub width: f64,
    pub height: f64,
    pub x: f64,
    pub y: f64,
}

/// Compute logo scale and placement for an image.
///
/// Orientation picks the nominal footprint (landscape vs. portrait/square);
/// the logo keeps its aspect ratio, clamped to the image height when the
/// nominal size would overflow it. Placement is horizontally centered and
/// flush to the bottom edge.
pub fn plan_placement(
    image_width: u32,
    image_height: u32,
    logo_width: u32,
    logo_height: u32,
) -> LogomarkResult<LogoPlacement> {
    if image_width == 0 || image_height == 0 {
        return Err(LogomarkError::composite("image has zero dimension"));
    }
    if logo_width == 0 || logo_height == 0 {
        return Err(LogomarkError::composite("logo has zero dimension"));
    }

    let target = if image_width > image_height {
        f64::from(LOGO_SIZE_HORIZONTAL)
    } else {
        f64::from(LOGO_SIZE_VERTICAL)
    };
    let logo_ratio = f64::from(logo_width) / f64::from(logo_height);

    let (width, height) = if target / logo_ratio > f64::from(image_height) {
        let height = f64::from(image_height);
        (height * logo_ratio, height)
    } else {
        (target, target / logo_ratio)
    };

    Ok(LogoPlacement {
        width,
        height,
        x: (f64::from(image_width) - width) / 2.0,
        y: f64::from(image_height) - height,
    })
}

/// Produces one encoded output image from a source bitmap and the logo.
///
/// Implementations must not mutate either input.
pub trait Compositor: Sync {
    fn composite(&self, image: &Bitmap, logo: &Bitmap) -> LogomarkResult<Vec<u8>>;
}

/// Production compositor: draws the source at native resolution onto a
/// private surface, blends the scaled logo on top per [`plan_placement`],
/// and encodes the surface as JPEG at [`JPEG_QUALITY`].
#[derive(Clone, Copy, Debug, Default)]
pub struct LogoCompositor;

impl Compositor for LogoCompositor {
    fn composite(&self, image: &Bitmap, logo: &Bitmap) -> LogomarkResult<Vec<u8>> {
        validate_bitmap(image, "image")?;
        validate_bitmap(logo, "logo")?;

        let plan = plan_placement(image.width, image.height, logo.width, logo.height)?;

        // Private copy of the source pixels; inputs stay untouched.
        let mut canvas = image.rgba8_premul.as_ref().clone();

        let scaled = scale_logo(logo, plan.width, plan.height)?;
        blit_over(
            &mut canvas,
            image.width,
            image.height,
            &scaled,
            plan.x.round() as i64,
            plan.y.round() as i64,
        );

        encode_jpeg(&canvas, image.width, image.height)
    }
}

fn validate_bitmap(bitmap: &Bitmap, what: &str) -> LogomarkResult<()> {
    if bitmap.width == 0 || bitmap.height == 0 {
        return Err(LogomarkError::composite(format!("{what} has zero dimension")));
    }
    let expected = (bitmap.width as usize)
        .checked_mul(bitmap.height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| LogomarkError::composite(format!("{what} buffer size overflow")))?;
    if bitmap.rgba8_premul.len() != expected {
        return Err(LogomarkError::composite(format!(
            "{what} buffer length {} does not match {}x{}",
            bitmap.rgba8_premul.len(),
            bitmap.width,
            bitmap.height
        )));
    }
    Ok(())
}

fn scale_logo(logo: &Bitmap, width: f64, height: f64) -> LogomarkResult<image::RgbaImage> {
    let w = (width.round() as u32).max(1);
    let h = (height.round() as u32).max(1);

    let src =
        image::RgbaImage::from_raw(logo.width, logo.height, logo.rgba8_premul.as_ref().clone())
            .ok_or_else(|| LogomarkError::composite("logo buffer does not form an image"))?;
    if (w, h) == (logo.width, logo.height) {
        return Ok(src);
    }
    // Premultiplied channels resample cleanly; straight alpha would bleed.
    Ok(image::imageops::resize(
        &src,
        w,
        h,
        image::imageops::FilterType::Triangle,
    ))
}

/// Source-over blend of `src` onto the canvas at `(x0, y0)`, clipped to the
/// canvas bounds. Both sides are premultiplied RGBA8.
fn blit_over(canvas: &mut [u8], width: u32, height: u32, src: &image::RgbaImage, x0: i64, y0: i64) {
    for sy in 0..src.height() {
        let dy = y0 + i64::from(sy);
        if dy < 0 || dy >= i64::from(height) {
            continue;
        }
        for sx in 0..src.width() {
            let dx = x0 + i64::from(sx);
            if dx < 0 || dx >= i64::from(width) {
                continue;
            }
            let idx = (dy as usize * width as usize + dx as usize) * 4;
            let s = src.get_pixel(sx, sy).0;
            let d = [canvas[idx], canvas[idx + 1], canvas[idx + 2], canvas[idx + 3]];
            canvas[idx..idx + 4].copy_from_slice(&over(d, s));
        }
    }
}

pub(crate) type PremulRgba8 = [u8; 4];

pub(crate) fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    if src[3] == 0 {
        return dst;
    }
    let inv = 255u16 - u16::from(src[3]);

    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = src[i].saturating_add(mul_div255(u16::from(dst[i]), inv));
    }
    out
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

/// Encode a premultiplied RGBA8 surface as JPEG at [`JPEG_QUALITY`].
///
/// JPEG carries no alpha; premultiplied channels flatten over black, which is
/// what a 2D canvas does when exporting transparent pixels to JPEG.
fn encode_jpeg(rgba8_premul: &[u8], width: u32, height: u32) -> LogomarkResult<Vec<u8>> {
    let mut rgb = Vec::with_capacity(rgba8_premul.len() / 4 * 3);
    for px in rgba8_premul.chunks_exact(4) {
        rgb.extend_from_slice(&px[..3]);
    }

    let mut out = Vec::new();
    let mut cursor = Cursor::new(&mut out);
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, JPEG_QUALITY);
    encoder
        .encode(&rgb, width, height, image::ExtendedColorType::Rgb8)
        .map_err(|e| LogomarkError::composite(format!("encode jpeg: {e}")))?;
    Ok(out)
}
