use chrono::NaiveDate;
use indexmap::IndexMap;
use isbnmeta_core::{Column, ColumnKind, Field, OpenLibraryConfig, SourceId};
use serde_json::Value;

use crate::aggregate::AggregatedMetadata;
use crate::metric::{metric_to_inches, normalize_length, normalize_weight, parse_dimension_list};
use crate::sources::ProviderResult;
use crate::sources::openlibrary::cover_url;

/// One field's value from each source that had it, in aggregation order.
pub type FieldCandidates = IndexMap<SourceId, String>;

/// Candidates keyed `"<source>_<field>"`, e.g. `gobo_title`.
pub fn labelled(field: Field, candidates: &FieldCandidates) -> IndexMap<String, String> {
    candidates
        .iter()
        .map(|(source, value)| (field.label_for(*source), value.clone()))
        .collect()
}

/// Reads fields out of provider records, each provider in its own shape.
#[derive(Debug, Clone, Default)]
pub struct FieldExtractor {
    covers: OpenLibraryConfig,
}

impl FieldExtractor {
    pub fn new(covers: OpenLibraryConfig) -> Self {
        Self { covers }
    }

    pub fn extract(&self, field: Field, isbn: &str, aggregated: &AggregatedMetadata) -> FieldCandidates {
        aggregated
            .iter()
            .filter_map(|(source, record)| {
                let record = record.as_ref()?;
                let value = self.read(field, *source, isbn, record)?;
                Some((*source, value))
            })
            .collect()
    }

    fn read(&self, field: Field, source: SourceId, isbn: &str, record: &ProviderResult) -> Option<String> {
        if matches!(source, SourceId::LocalCsv | SourceId::Sqlite) {
            return read_local(field, record);
        }
        if field.is_dimension() {
            return read_dimension(field, source, record);
        }

        match (field, source) {
            (Field::Subtitle, SourceId::IsbnDb) => {
                let title = first_text(record, &["title_long", "title"])?;
                let (_, subtitle) = title.rsplit_once(':')?;
                non_empty(subtitle)
            }
            (Field::Description, SourceId::IsbnDb) => first_text(record, &["synopsis", "overview"]),
            (Field::Publisher, SourceId::OpenLibrary) => names(record.get("publishers")?),
            (Field::Authors, _) => names(record.get("authors")?),
            (Field::PublishedDate, SourceId::GoogleBooks) => first_text(record, &["publishedDate"]),
            (Field::PublishedDate, SourceId::OpenLibrary) => {
                first_text(record, &["publish_date"]).map(|raw| catalog_date(&raw))
            }
            (Field::PublishedDate, SourceId::IsbnDb) => {
                let raw = first_text(record, &["date_published"])?;
                Some(if raw.chars().count() > 4 { raw.chars().take(10).collect() } else { raw })
            }
            (Field::PageCount, SourceId::GoogleBooks) => {
                first_text(record, &["printedPageCount", "pageCount"])
            }
            (Field::PageCount, SourceId::OpenLibrary) => first_text(record, &["number_of_pages"]),
            (Field::PageCount, SourceId::IsbnDb) => first_text(record, &["pages"]),
            (Field::Image, SourceId::GoogleBooks) => {
                text(record.get("imageLinks")?.get("thumbnail")?)
            }
            (Field::Image, SourceId::OpenLibrary) => Some(cover_url(&self.covers, isbn)),
            _ => first_text(record, &[remote_key(field)]),
        }
    }
}

/// Key shared by the remote providers for the fields with no special shape.
fn remote_key(field: Field) -> &'static str {
    match field {
        Field::Image => "image",
        other => other.as_str(),
    }
}

fn read_dimension(field: Field, source: SourceId, record: &ProviderResult) -> Option<String> {
    match (field, source) {
        (Field::Weight, SourceId::OpenLibrary) => {
            let raw = first_text(record, &["weight"])?;
            Some(normalize_weight(&raw).unwrap_or(raw))
        }
        (Field::Weight, SourceId::IsbnDb) => {
            let raw = dimension_list(record)?.shift_remove("Weight")?;
            Some(normalize_weight(&raw).unwrap_or(raw))
        }
        (_, SourceId::GoogleBooks) => {
            let key = match field {
                Field::Width => "width",
                Field::Height => "height",
                Field::Thickness => "thickness",
                _ => return None,
            };
            let dims = record.get("dimensions")?.as_object()?;
            let mut inches =
                metric_to_inches(dims.iter().filter_map(|(k, v)| Some((k.as_str(), v.as_str()?))));
            inches.shift_remove(key)
        }
        (_, SourceId::IsbnDb) => {
            // the commercial database measures books lying flat
            let key = match field {
                Field::Width => "Length",
                Field::Height => "Height",
                Field::Thickness => "Width",
                _ => return None,
            };
            let raw = dimension_list(record)?.shift_remove(key)?;
            Some(normalize_length(&raw).unwrap_or(raw))
        }
        _ => None,
    }
}

fn dimension_list(record: &ProviderResult) -> Option<IndexMap<String, String>> {
    let raw = record.get("dimensions")?.as_str()?;
    Some(parse_dimension_list(raw))
}

/// Local stores use catalog headers, falling back to the plain field name.
fn read_local(field: Field, record: &ProviderResult) -> Option<String> {
    let header = Column::ALL
        .iter()
        .find(|column| column.kind() == ColumnKind::Lookup(field))
        .map(|column| column.header());
    let keys = header.into_iter().chain([field.as_str()]).collect::<Vec<_>>();
    let raw = first_text(record, &keys)?;

    Some(match field {
        Field::Width | Field::Height | Field::Thickness => normalize_length(&raw).unwrap_or(raw),
        Field::Weight => normalize_weight(&raw).unwrap_or(raw),
        _ => raw,
    })
}

/// `"November 18, 2016"` becomes `"2016-11-18"`. Bare years and anything
/// unparseable are kept as given.
fn catalog_date(raw: &str) -> String {
    if raw.chars().count() <= 4 {
        return raw.to_string();
    }
    let mut words = raw.split_whitespace().map(str::to_string).collect::<Vec<_>>();
    if let Some(month) = words.first_mut() {
        *month = month.chars().take(3).collect();
    }
    match NaiveDate::parse_from_str(&words.join(" "), "%b %d, %Y") {
        Ok(date) => date.format("%Y-%m-%d").to_string(),
        Err(_) => {
            tracing::debug!(date = raw, "unrecognized publish date kept verbatim");
            raw.to_string()
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        // catalog descriptions may come as {"type": ..., "value": ...}
        Value::Object(map) => map.get("value").and_then(text),
        Value::Array(_) => names(value),
        Value::Null | Value::Bool(_) => None,
    }
}

fn first_text(record: &ProviderResult, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| record.get(*key).and_then(text))
}

/// Join a list of names, given either as strings or as `{"name": ...}` objects.
fn names(value: &Value) -> Option<String> {
    let joined = value
        .as_array()?
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => non_empty(s),
            Value::Object(obj) => obj.get("name").and_then(Value::as_str).and_then(non_empty),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(", ");
    non_empty(&joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Option<ProviderResult> {
        value.as_object().cloned()
    }

    fn aggregated() -> AggregatedMetadata {
        let mut m = AggregatedMetadata::new();
        m.insert(
            SourceId::GoogleBooks,
            record(json!({
                "title": "The Book of Trees",
                "subtitle": "Visualizing Branches of Knowledge",
                "authors": ["Manuel Lima", "Ben Shneiderman"],
                "publisher": "Princeton Architectural Press",
                "publishedDate": "2014-03-01",
                "printedPageCount": 208,
                "dimensions": {"height": "20 cm", "width": "13 cm", "thickness": "2.20 cm"},
                "imageLinks": {"thumbnail": "http://books.example/thumb.jpg"}
            })),
        );
        m.insert(
            SourceId::OpenLibrary,
            record(json!({
                "title": "The book of trees",
                "authors": [{"name": "Manuel Lima", "url": "https://openlibrary.org/authors/OL1A"}],
                "publishers": [{"name": "Princeton Architectural Press"}, {"name": "PAP"}],
                "publish_date": "March 1, 2014",
                "number_of_pages": 208,
                "weight": "1 kg"
            })),
        );
        m.insert(
            SourceId::IsbnDb,
            record(json!({
                "title": "The Book of Trees",
                "title_long": "The Book of Trees: Visualizing Branches of Knowledge",
                "authors": ["Lima, Manuel"],
                "publisher": "Princeton Architectural Press",
                "date_published": "2014-03-04T00:00:01+00:00",
                "binding": "Hardcover",
                "msrp": 40.0,
                "synopsis": "A history of tree diagrams.",
                "dimensions": "Height: 9.21 Inches, Length: 7.48 Inches, Weight: 2.2 Pounds, Width: 0.87 Inches",
                "image": "https://images.example/9780711246812.jpg"
            })),
        );
        m.insert(SourceId::Sqlite, None);
        m
    }

    fn extract(field: Field) -> FieldCandidates {
        FieldExtractor::default().extract(field, "9780711246812", &aggregated())
    }

    #[test]
    fn plain_fields_keep_source_order() {
        let titles = extract(Field::Title);
        assert_eq!(
            titles.keys().copied().collect::<Vec<_>>(),
            vec![SourceId::GoogleBooks, SourceId::OpenLibrary, SourceId::IsbnDb]
        );
        assert_eq!(titles[&SourceId::OpenLibrary], "The book of trees");
    }

    #[test]
    fn sources_without_the_field_are_dropped() {
        let binding = extract(Field::Binding);
        assert_eq!(binding.len(), 1);
        assert_eq!(binding[&SourceId::IsbnDb], "Hardcover");
        assert_eq!(extract(Field::Msrp)[&SourceId::IsbnDb], "40.0");
    }

    #[test]
    fn authors_and_publishers_are_joined() {
        let authors = extract(Field::Authors);
        assert_eq!(authors[&SourceId::GoogleBooks], "Manuel Lima, Ben Shneiderman");
        assert_eq!(authors[&SourceId::OpenLibrary], "Manuel Lima");
        assert_eq!(authors[&SourceId::IsbnDb], "Lima, Manuel");

        let publishers = extract(Field::Publisher);
        assert_eq!(publishers[&SourceId::OpenLibrary], "Princeton Architectural Press, PAP");
        assert_eq!(publishers[&SourceId::IsbnDb], "Princeton Architectural Press");
    }

    #[test]
    fn dimensions_map_per_source() {
        let width = extract(Field::Width);
        assert_eq!(width[&SourceId::GoogleBooks], "5.12 Inches");
        assert_eq!(width[&SourceId::IsbnDb], "7.48 Inches");

        let height = extract(Field::Height);
        assert_eq!(height[&SourceId::GoogleBooks], "7.87 Inches");
        assert_eq!(height[&SourceId::IsbnDb], "9.21 Inches");

        assert_eq!(extract(Field::Thickness)[&SourceId::IsbnDb], "0.87 Inches");

        let weight = extract(Field::Weight);
        assert_eq!(weight[&SourceId::IsbnDb], "2.2 Pounds");
        assert_eq!(weight[&SourceId::OpenLibrary], "2.2 Pounds");
        assert!(!weight.contains_key(&SourceId::GoogleBooks));
    }

    #[test]
    fn dates_subtitles_and_pages() {
        let dates = extract(Field::PublishedDate);
        assert_eq!(dates[&SourceId::GoogleBooks], "2014-03-01");
        assert_eq!(dates[&SourceId::OpenLibrary], "2014-03-01");
        assert_eq!(dates[&SourceId::IsbnDb], "2014-03-04");

        let subtitles = extract(Field::Subtitle);
        assert_eq!(subtitles[&SourceId::IsbnDb], "Visualizing Branches of Knowledge");

        let pages = extract(Field::PageCount);
        assert_eq!(pages[&SourceId::GoogleBooks], "208");
        assert_eq!(pages[&SourceId::OpenLibrary], "208");
    }

    #[test]
    fn images_come_from_three_places() {
        let images = extract(Field::Image);
        assert_eq!(images[&SourceId::GoogleBooks], "http://books.example/thumb.jpg");
        assert_eq!(
            images[&SourceId::OpenLibrary],
            "https://covers.openlibrary.org/b/isbn/9780711246812-L.jpg"
        );
        assert_eq!(images[&SourceId::IsbnDb], "https://images.example/9780711246812.jpg");
    }

    #[test]
    fn local_records_use_catalog_headers() {
        let mut m = AggregatedMetadata::new();
        m.insert(
            SourceId::LocalCsv,
            record(json!({
                "product_isbn": "9780711246812",
                "product_title": "The Book of Trees",
                "format": "Hardcover",
                "product_width": "19 cm",
                "weight": "2.2 Pounds"
            })),
        );
        let extractor = FieldExtractor::default();
        let pick = |field| extractor.extract(field, "9780711246812", &m);

        assert_eq!(pick(Field::Title)[&SourceId::LocalCsv], "The Book of Trees");
        assert_eq!(pick(Field::Binding)[&SourceId::LocalCsv], "Hardcover");
        assert_eq!(pick(Field::Width)[&SourceId::LocalCsv], "7.48 Inches");
        assert_eq!(pick(Field::Weight)[&SourceId::LocalCsv], "2.2 Pounds");
        assert!(pick(Field::Description).is_empty());
    }

    #[test]
    fn labels_join_source_and_field() {
        let labelled = labelled(Field::Title, &extract(Field::Title));
        assert_eq!(
            labelled.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["gobo_title", "ol_title", "isbndb_title"]
        );
    }

    #[test]
    fn catalog_dates() {
        assert_eq!(catalog_date("November 18, 2016"), "2016-11-18");
        assert_eq!(catalog_date("2016"), "2016");
        assert_eq!(catalog_date("Nov 2016"), "Nov 2016");
    }
}
