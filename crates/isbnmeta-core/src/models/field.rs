use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models::SourceId;

/// A book attribute that providers report, each in their own shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Subtitle,
    Binding,
    Description,
    Msrp,
    Publisher,
    PublishedDate,
    PageCount,
    Weight,
    Width,
    Height,
    Thickness,
    Authors,
    Image,
}

impl Field {
    pub const ALL: [Field; 14] = [
        Field::Title,
        Field::Subtitle,
        Field::Binding,
        Field::Description,
        Field::Msrp,
        Field::Publisher,
        Field::PublishedDate,
        Field::PageCount,
        Field::Weight,
        Field::Width,
        Field::Height,
        Field::Thickness,
        Field::Authors,
        Field::Image,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Subtitle => "subtitle",
            Self::Binding => "binding",
            Self::Description => "description",
            Self::Msrp => "msrp",
            Self::Publisher => "publisher",
            Self::PublishedDate => "published_date",
            Self::PageCount => "page_count",
            Self::Weight => "weight",
            Self::Width => "width",
            Self::Height => "height",
            Self::Thickness => "thickness",
            Self::Authors => "authors",
            Self::Image => "image",
        }
    }

    /// True for the fields read out of a provider's dimensions record.
    pub fn is_dimension(&self) -> bool {
        matches!(self, Self::Weight | Self::Width | Self::Height | Self::Thickness)
    }

    /// Per-source candidate key, e.g. `gobo_title`.
    pub fn label_for(&self, source: SourceId) -> String {
        format!("{}_{}", source.as_str(), self.as_str())
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == needle)
            .or(match needle.as_str() {
                "author" => Some(Self::Authors),
                "format" => Some(Self::Binding),
                "price" | "retail" => Some(Self::Msrp),
                "cover" | "image_url" => Some(Self::Image),
                "pages" => Some(Self::PageCount),
                _ => None,
            })
            .ok_or_else(|| CoreError::UnknownField(s.to_string()))
    }
}
