use thiserror::Error;

/// Coordinate access outside the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("coordinate ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfRange { x: i32, y: i32, width: u32, height: u32 },
}

/// Fog-of-war invariant violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FogError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("fog reference count at ({x}, {y}) is already zero")]
    RefCountUnderflow { x: i32, y: i32 },
    #[error("fog reference count at ({x}, {y}) is saturated")]
    RefCountOverflow { x: i32, y: i32 },
    #[error("unknown player {0}")]
    UnknownPlayer(u8),
}

/// Failure to load persisted lake, fog or map data.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("invalid value {value:?} for attribute {name}")]
    InvalidAttribute { name: &'static str, value: String },
    #[error("missing tag {0}")]
    MissingTag(&'static str),
    #[error("lake at ({x}, {y}) could not be created")]
    LakeRejected { x: i32, y: i32 },
    #[error("size mismatch: expected {expected} entries, found {found}")]
    SizeMismatch { expected: usize, found: usize },
    #[error("unsupported map version {found}, expected {expected}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("invalid base64 data: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
}
