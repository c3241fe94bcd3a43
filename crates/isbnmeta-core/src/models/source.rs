use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Identity of a metadata provider.
///
/// The short name doubles as the prefix of labelled candidate keys
/// (`gobo_title`, `isbndb_publisher`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceId {
    /// Volume-search API (Google Books).
    #[serde(rename = "gobo")]
    GoogleBooks,
    /// Library-catalog API (Open Library).
    #[serde(rename = "ol")]
    OpenLibrary,
    /// Commercial book database (ISBNdb).
    #[serde(rename = "isbndb")]
    IsbnDb,
    /// Local CSV catalog export.
    #[serde(rename = "csv")]
    LocalCsv,
    /// Local SQLite catalog.
    #[serde(rename = "sqlite")]
    Sqlite,
}

impl SourceId {
    pub const ALL: [SourceId; 5] = [
        SourceId::GoogleBooks,
        SourceId::OpenLibrary,
        SourceId::IsbnDb,
        SourceId::LocalCsv,
        SourceId::Sqlite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GoogleBooks => "gobo",
            Self::OpenLibrary => "ol",
            Self::IsbnDb => "isbndb",
            Self::LocalCsv => "csv",
            Self::Sqlite => "sqlite",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::GoogleBooks => "Google Books",
            Self::OpenLibrary => "Open Library",
            Self::IsbnDb => "ISBNdb",
            Self::LocalCsv => "CSV catalog",
            Self::Sqlite => "SQLite catalog",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gobo" | "google" | "google_books" => Ok(Self::GoogleBooks),
            "ol" | "openlibrary" | "open_library" => Ok(Self::OpenLibrary),
            "isbndb" => Ok(Self::IsbnDb),
            "csv" => Ok(Self::LocalCsv),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(CoreError::UnknownSource(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_roundtrip_through_from_str() {
        for id in SourceId::ALL {
            assert_eq!(id.as_str().parse::<SourceId>().unwrap(), id);
        }
    }

    #[test]
    fn serde_uses_short_names() {
        let json = serde_json::to_string(&SourceId::OpenLibrary).unwrap();
        assert_eq!(json, "\"ol\"");
        let back: SourceId = serde_json::from_str("\"isbndb\"").unwrap();
        assert_eq!(back, SourceId::IsbnDb);
    }

    #[test]
    fn unknown_source_is_rejected() {
        assert!(matches!(
            "amazon".parse::<SourceId>(),
            Err(CoreError::UnknownSource(_))
        ));
    }
}
