//! Extraction of the canonical fields from the verbose, revision-specific
//! columns of the source tables.

use log::{debug, warn};

use crate::config::*;

/// The placeholder replaced by the timepoint label in trend column names.
pub const TIMEPOINT_PLACEHOLDER: &str = "{timepoint}";

/// Where the fields of one revision of a source table are found.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ColumnLayout {
    pub country_column: String,
    /// Only set for the tables that have a row per administrative region.
    pub region_column: Option<String>,
    pub date_column: String,
    /// One column per indicator, in the order of `Indicator::ALL`.
    pub indicator_columns: Vec<String>,
    pub survey_column: Option<String>,
    pub methodology_note_column: Option<String>,
}

impl ColumnLayout {
    pub fn validate(&self) -> Result<(), StandardiseError> {
        if self.indicator_columns.len() != Indicator::ALL.len() {
            return Err(StandardiseError::IndicatorColumnCount {
                expected: Indicator::ALL.len(),
                found: self.indicator_columns.len(),
            });
        }
        Ok(())
    }

    /// All the columns this layout reads.
    pub fn columns(&self) -> Vec<&str> {
        let mut res: Vec<&str> = vec![self.country_column.as_str(), self.date_column.as_str()];
        res.extend(self.region_column.as_deref());
        res.extend(self.indicator_columns.iter().map(|s| s.as_str()));
        res.extend(self.survey_column.as_deref());
        res.extend(self.methodology_note_column.as_deref());
        res
    }

    /// The columns of this layout that are not in the header.
    pub fn missing_columns(&self, headers: &[String]) -> Vec<String> {
        self.columns()
            .into_iter()
            .filter(|c| !headers.iter().any(|h| h == c))
            .map(|c| c.to_string())
            .collect()
    }

    /// Expands the `{timepoint}` placeholder in every column name.
    pub fn for_timepoint(&self, label: &str) -> ColumnLayout {
        let expand = |s: &String| s.replace(TIMEPOINT_PLACEHOLDER, label);
        ColumnLayout {
            country_column: expand(&self.country_column),
            region_column: self.region_column.as_ref().map(expand),
            date_column: expand(&self.date_column),
            indicator_columns: self.indicator_columns.iter().map(expand).collect(),
            survey_column: self.survey_column.as_ref().map(expand),
            methodology_note_column: self.methodology_note_column.as_ref().map(expand),
        }
    }
}

/// Collapses runs of whitespace, so that column names written in a
/// configuration file match the headers assembled from a spreadsheet.
pub fn normalise_header(s: &str) -> String {
    s.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Maps a region of a country to the code of its first-level administrative unit.
pub trait AdminResolver {
    fn get_pcode(&self, country_iso3: &str, name: &str) -> (Option<String>, MatchConfidence);
}

/// A resolver that knows no administrative unit.
pub struct NoAdminResolver;

impl AdminResolver for NoAdminResolver {
    fn get_pcode(&self, _country_iso3: &str, _name: &str) -> (Option<String>, MatchConfidence) {
        (None, MatchConfidence::NoMatch)
    }
}

/// Formats an indicator value with 4 decimal places.
///
/// Numbers stored as text are accepted. Empty cells and placeholders such as
/// `..` give no value.
pub fn format_indicator(cell: &CellValue) -> Option<String> {
    let value: f64 = match cell {
        CellValue::Empty => return None,
        CellValue::Number(n) => *n,
        CellValue::Text(s) => match s.trim().parse::<f64>() {
            Ok(n) => n,
            Err(_) => {
                if !s.trim().is_empty() {
                    debug!("format_indicator: not a number: {:?}", s);
                }
                return None;
            }
        },
    };
    if !value.is_finite() {
        return None;
    }
    Some(format!("{:.4}", value))
}

/// A normalised row and the text of its reference period.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct NormalizedRecord {
    pub row: NormalizedRow,
    pub date_range_text: String,
}

/// Builds the canonical row for one source row.
///
/// Returns `None` when the row has no country code: the published tables have
/// blank and footnote rows that carry no data.
pub fn normalize_row(
    raw: &RawRow,
    layout: &ColumnLayout,
    resolver: &dyn AdminResolver,
) -> Result<Option<NormalizedRecord>, StandardiseError> {
    layout.validate()?;
    let country_code = raw.text(&layout.country_column);
    if country_code.is_empty() {
        debug!("normalize_row: skipping row without country code: {:?}", raw);
        return Ok(None);
    }

    let admin1_name = layout
        .region_column
        .as_ref()
        .map(|c| raw.text(c))
        .unwrap_or_default();
    let admin1_code = if admin1_name.is_empty() {
        "".to_string()
    } else {
        match resolver.get_pcode(&country_code, &admin1_name) {
            (Some(pcode), confidence) => {
                debug!(
                    "normalize_row: {} {:?} -> {} ({:?})",
                    country_code, admin1_name, pcode, confidence
                );
                pcode
            }
            (None, _) => {
                warn!(
                    "normalize_row: could not find pcode for {} {:?}",
                    country_code, admin1_name
                );
                "".to_string()
            }
        }
    };

    let mut indicators = Indicators::default();
    for (indicator, column) in Indicator::ALL.iter().zip(layout.indicator_columns.iter()) {
        indicators.set(*indicator, format_indicator(raw.cell(column)));
    }

    let optional_text = |column: &Option<String>| {
        column
            .as_ref()
            .map(|c| raw.text(c))
            .filter(|s| !s.is_empty())
    };

    Ok(Some(NormalizedRecord {
        row: NormalizedRow {
            country_code,
            admin1_code,
            admin1_name,
            indicators,
            survey: optional_text(&layout.survey_column),
            methodology_note: optional_text(&layout.methodology_note_column),
        },
        date_range_text: raw.text(&layout.date_column),
    }))
}
