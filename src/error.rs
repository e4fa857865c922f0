pub type LogomarkResult<T> = Result<T, LogomarkError>;

#[derive(thiserror::Error, Debug)]
pub enum LogomarkError {
    #[error("decode error: {0}")]
    Decode(String),

    #[error("asset load error: {0}")]
    AssetLoad(String),

    #[error("not ready: {0}")]
    NotReady(String),

    #[error("composite error: {0}")]
    Composite(String),

    #[error("duplicate archive entry: {0}")]
    DuplicateEntry(String),

    #[error("archive finalize error: {0}")]
    ArchiveFinalize(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LogomarkError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn asset_load(msg: impl Into<String>) -> Self {
        Self::AssetLoad(msg.into())
    }

    pub fn not_ready(msg: impl Into<String>) -> Self {
        Self::NotReady(msg.into())
    }

    pub fn composite(msg: impl Into<String>) -> Self {
        Self::Composite(msg.into())
    }

    pub fn duplicate_entry(msg: impl Into<String>) -> Self {
        Self::DuplicateEntry(msg.into())
    }

    pub fn archive_finalize(msg: impl Into<String>) -> Self {
        Self::ArchiveFinalize(msg.into())
    }
}
