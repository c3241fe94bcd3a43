use thiserror::Error;

/// All errors that can occur in isbnmeta-core.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Missing secret: {name} ({hint})")]
    MissingSecret { name: &'static str, hint: &'static str },

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Row on line {line} has {found} cells but the header has {expected}")]
    RaggedRow { line: u64, expected: usize, found: usize },

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Process exit codes used by the CLI.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NotFound = 2,
    InvalidArgs = 3,
    FileSystemError = 4,
    ConfigError = 5,
    NetworkError = 6,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl CoreError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_) | Self::MissingSecret { .. } | Self::TomlParse(_) => {
                ExitCode::ConfigError
            }
            Self::UnknownSource(_) | Self::UnknownField(_) | Self::ColumnNotFound(_) => {
                ExitCode::InvalidArgs
            }
            Self::Io(_) | Self::Csv(_) | Self::RaggedRow { .. } => ExitCode::FileSystemError,
            Self::TomlSerialize(_) => ExitCode::GeneralError,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
