use serde::{Deserialize, Serialize};

use crate::models::Field;

/// A recognized column of a catalog table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Column {
    Isbn,
    Title,
    Format,
    Description,
    Retail,
    Publisher,
    Weight,
    Width,
    Height,
    Thickness,
    Author,
    Image,
}

/// What the enrichment driver does with a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// The lookup key itself; copied through untouched.
    Identity,
    /// Populated from provider data for this field.
    Lookup(Field),
}

impl Column {
    /// Recognized columns in table order.
    pub const ALL: [Column; 12] = [
        Column::Isbn,
        Column::Title,
        Column::Format,
        Column::Description,
        Column::Retail,
        Column::Publisher,
        Column::Weight,
        Column::Width,
        Column::Height,
        Column::Thickness,
        Column::Author,
        Column::Image,
    ];

    pub const ISBN_HEADER: &'static str = "product_isbn";

    pub fn header(&self) -> &'static str {
        match self {
            Self::Isbn => Self::ISBN_HEADER,
            Self::Title => "product_title",
            Self::Format => "format",
            Self::Description => "product_description",
            Self::Retail => "product_retail",
            Self::Publisher => "publisher",
            Self::Weight => "product_weight",
            Self::Width => "product_width",
            Self::Height => "product_height",
            Self::Thickness => "product_thickness",
            Self::Author => "Author",
            Self::Image => "image",
        }
    }

    pub fn from_header(header: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|col| col.header() == header)
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Self::Isbn => ColumnKind::Identity,
            Self::Title => ColumnKind::Lookup(Field::Title),
            Self::Format => ColumnKind::Lookup(Field::Binding),
            Self::Description => ColumnKind::Lookup(Field::Description),
            Self::Retail => ColumnKind::Lookup(Field::Msrp),
            Self::Publisher => ColumnKind::Lookup(Field::Publisher),
            Self::Weight => ColumnKind::Lookup(Field::Weight),
            Self::Width => ColumnKind::Lookup(Field::Width),
            Self::Height => ColumnKind::Lookup(Field::Height),
            Self::Thickness => ColumnKind::Lookup(Field::Thickness),
            Self::Author => ColumnKind::Lookup(Field::Authors),
            Self::Image => ColumnKind::Lookup(Field::Image),
        }
    }

    pub fn headers() -> impl Iterator<Item = &'static str> {
        Self::ALL.into_iter().map(|col| col.header())
    }
}
