use haven_mapgen::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cell ({x}, {y}) is outside the {size}x{size} grid")]
    OutOfBounds { x: i32, y: i32, size: i32 },

    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),

    #[error("cell ({x}, {y}) is inside a protected zone")]
    ProtectedCell { x: i32, y: i32 },

    #[error("cell ({x}, {y}) is already occupied by {occupant}")]
    CellOccupied { x: i32, y: i32, occupant: String },

    #[error("obstacle at ({x}, {y}) has no owning object, place one with build or place_object")]
    UnownedObstacle { x: i32, y: i32 },

    #[error("unknown object: {0}")]
    UnknownObject(String),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("world inconsistency at ({x}, {y}): {detail}")]
    ConsistencyViolation { x: i32, y: i32, detail: String },
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
