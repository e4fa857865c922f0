use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::{
    bitmap::{Bitmap, decode_bitmap},
    error::{LogomarkError, LogomarkResult},
};

/// The two selectable watermark variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogoVariant {
    Light,
    Dark,
}

impl LogoVariant {
    /// Fixed asset filename for this variant under the logo directory.
    pub fn file_name(self) -> &'static str {
        match self {
            LogoVariant::Light => "logo_light.png",
            LogoVariant::Dark => "logo_dark.png",
        }
    }
}

impl std::fmt::Display for LogoVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogoVariant::Light => write!(f, "light"),
            LogoVariant::Dark => write!(f, "dark"),
        }
    }
}

/// Load state of the active logo.
#[derive(Clone, Debug)]
pub enum LogoState {
    Unset,
    Loading,
    Ready(Bitmap),
    Failed(String),
}

/// The active watermark: a variant plus its load state. Compositing and
/// export refuse an asset that is not [`LogoState::Ready`].
#[derive(Clone, Debug)]
pub struct LogoAsset {
    pub variant: LogoVariant,
    state: LogoState,
}

impl LogoAsset {
    pub fn ready(variant: LogoVariant, bitmap: Bitmap) -> Self {
        Self {
            variant,
            state: LogoState::Ready(bitmap),
        }
    }

    pub fn unset(variant: LogoVariant) -> Self {
        Self {
            variant,
            state: LogoState::Unset,
        }
    }

    pub fn failed(variant: LogoVariant, reason: impl Into<String>) -> Self {
        Self {
            variant,
            state: LogoState::Failed(reason.into()),
        }
    }

    pub fn state(&self) -> &LogoState {
        &self.state
    }

    pub fn bitmap(&self) -> Option<&Bitmap> {
        match &self.state {
            LogoState::Ready(b) => Some(b),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, LogoState::Ready(_))
    }
}

/// Loads and caches logo bitmaps from a directory.
///
/// Loading is idempotent per variant: the first successful load decodes the
/// file, later loads for the same variant hand back the cached bitmap (the
/// pixel buffer is shared, not copied). Failures are not cached so a fixed
/// file can be retried.
pub struct LogoStore {
    root: PathBuf,
    cache: Mutex<HashMap<LogoVariant, Bitmap>>,
}

impl LogoStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load (or reuse) the bitmap for `variant` and return it as a ready
    /// [`LogoAsset`].
    pub fn load(&self, variant: LogoVariant) -> LogomarkResult<LogoAsset> {
        if let Some(bitmap) = self.cached(variant) {
            return Ok(LogoAsset::ready(variant, bitmap));
        }

        let path = self.root.join(variant.file_name());
        let bytes = std::fs::read(&path).map_err(|e| {
            LogomarkError::asset_load(format!("read logo '{}': {e}", path.display()))
        })?;
        let bitmap = decode_bitmap(&bytes).map_err(|e| {
            LogomarkError::asset_load(format!("decode logo '{}': {e}", path.display()))
        })?;

        self.cache
            .lock()
            .expect("logo cache poisoned")
            .insert(variant, bitmap.clone());
        Ok(LogoAsset::ready(variant, bitmap))
    }

    fn cached(&self, variant: LogoVariant) -> Option<Bitmap> {
        self.cache
            .lock()
            .expect("logo cache poisoned")
            .get(&variant)
            .cloned()
    }
}
