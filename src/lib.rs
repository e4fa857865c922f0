#![forbid(unsafe_code)]

pub mod archive;
pub mod bitmap;
pub mod composite;
pub mod error;
pub mod export;
pub mod logo;

pub use archive::{ARCHIVE_FILE_NAME, ArchiveBuilder};
pub use bitmap::{Bitmap, DecodeState, RawImage, SourceImage, decode_batch, decode_bitmap};
pub use composite::{
    Compositor, JPEG_QUALITY, LOGO_SIZE_HORIZONTAL, LOGO_SIZE_VERTICAL, LogoCompositor,
    LogoPlacement, plan_placement,
};
pub use error::{LogomarkError, LogomarkResult};
pub use export::{ExportOptions, ExportProgress, ExportStatus, export, export_with_compositor};
pub use logo::{LogoAsset, LogoState, LogoStore, LogoVariant};
