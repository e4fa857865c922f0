use std::sync::Arc;

use rayon::prelude::*;

use crate::error::{LogomarkError, LogomarkResult};

/// Decoded raster image in premultiplied RGBA8 form.
///
/// Cloning shares the pixel buffer.
#[derive(Clone, Debug)]
pub struct Bitmap {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8.
    pub rgba8_premul: Arc<Vec<u8>>,
}

/// One raw input file: the filename (for reporting) plus its bytes.
#[derive(Clone, Debug)]
pub struct RawImage {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Decode outcome for one source image.
#[derive(Clone, Debug)]
pub enum DecodeState {
    Pending,
    Ready(Bitmap),
    Failed(String),
}

/// A source image tracked through the pipeline: original identity plus its
/// decode state. A failed decode keeps its slot so callers can report it.
#[derive(Clone, Debug)]
pub struct SourceImage {
    pub name: String,
    pub state: DecodeState,
}

impl SourceImage {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: DecodeState::Pending,
        }
    }

    pub fn ready(name: impl Into<String>, bitmap: Bitmap) -> Self {
        Self {
            name: name.into(),
            state: DecodeState::Ready(bitmap),
        }
    }

    pub fn bitmap(&self) -> Option<&Bitmap> {
        match &self.state {
            DecodeState::Ready(b) => Some(b),
            DecodeState::Pending | DecodeState::Failed(_) => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, DecodeState::Ready(_))
    }
}

/// Decode raw bytes into a premultiplied RGBA8 [`Bitmap`].
pub fn decode_bitmap(bytes: &[u8]) -> LogomarkResult<Bitmap> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| LogomarkError::decode(format!("decode image from memory: {e}")))?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(Bitmap {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

/// Decode a whole batch concurrently. Completion order is arbitrary but the
/// output preserves input order, and one bad file never blocks the others:
/// its slot is marked [`DecodeState::Failed`] instead.
pub fn decode_batch(files: Vec<RawImage>) -> Vec<SourceImage> {
    files
        .into_par_iter()
        .map(|file| {
            let state = match decode_bitmap(&file.bytes) {
                Ok(bitmap) => DecodeState::Ready(bitmap),
                Err(e) => DecodeState::Failed(e.to_string()),
            };
            SourceImage {
                name: file.name,
                state,
            }
        })
        .collect()
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}
