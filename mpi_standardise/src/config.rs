// ********* Input data structures ***********

use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::Display;

/// The content of a single cell, as read from a spreadsheet or a CSV file.
#[derive(PartialEq, Debug, Clone)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
}

impl CellValue {
    /// The text representation of the cell.
    ///
    /// Whole numbers are printed without a fractional part, so that a year
    /// stored as a number in Excel reads back as `2015` and not `2015.0`.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => "".to_string(),
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                format!("{}", *n as i64)
            }
            CellValue::Number(n) => n.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }
}

/// A row of a source table, addressed by header text.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct RawRow {
    cells: HashMap<String, CellValue>,
}

const EMPTY_CELL: CellValue = CellValue::Empty;

impl RawRow {
    pub fn new() -> RawRow {
        RawRow {
            cells: HashMap::new(),
        }
    }

    /// Adds a cell. If the header is already present, the first value is kept.
    pub fn insert(&mut self, header: &str, value: CellValue) {
        self.cells.entry(header.to_string()).or_insert(value);
    }

    pub fn get(&self, header: &str) -> Option<&CellValue> {
        self.cells.get(header)
    }

    /// The cell under this header, or an empty cell when the row is too short.
    pub fn cell(&self, header: &str) -> &CellValue {
        self.cells.get(header).unwrap_or(&EMPTY_CELL)
    }

    pub fn text(&self, header: &str) -> String {
        self.cell(header).as_text()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, CellValue)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (S, CellValue)>>(iter: I) -> Self {
        let mut row = RawRow::new();
        for (header, value) in iter {
            row.insert(&header.into(), value);
        }
        row
    }
}

// ******** Output data structures *********

/// The five indicators published for every record, in canonical order.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum Indicator {
    Mpi,
    HeadcountRatio,
    IntensityOfDeprivation,
    VulnerableToPoverty,
    InSeverePoverty,
}

impl Indicator {
    pub const ALL: [Indicator; 5] = [
        Indicator::Mpi,
        Indicator::HeadcountRatio,
        Indicator::IntensityOfDeprivation,
        Indicator::VulnerableToPoverty,
        Indicator::InSeverePoverty,
    ];

    /// The short canonical name of the field.
    pub fn field_name(&self) -> &'static str {
        match self {
            Indicator::Mpi => "mpi",
            Indicator::HeadcountRatio => "headcount_ratio",
            Indicator::IntensityOfDeprivation => "intensity_of_deprivation",
            Indicator::VulnerableToPoverty => "vulnerable_to_poverty",
            Indicator::InSeverePoverty => "in_severe_poverty",
        }
    }
}

/// Indicator values, already formatted with 4 decimal places.
/// A missing value means the source cell was empty or not numeric.
#[derive(Eq, PartialEq, Debug, Clone, Default, Hash)]
pub struct Indicators {
    pub mpi: Option<String>,
    pub headcount_ratio: Option<String>,
    pub intensity_of_deprivation: Option<String>,
    pub vulnerable_to_poverty: Option<String>,
    pub in_severe_poverty: Option<String>,
}

impl Indicators {
    pub fn get(&self, indicator: Indicator) -> Option<&String> {
        match indicator {
            Indicator::Mpi => self.mpi.as_ref(),
            Indicator::HeadcountRatio => self.headcount_ratio.as_ref(),
            Indicator::IntensityOfDeprivation => self.intensity_of_deprivation.as_ref(),
            Indicator::VulnerableToPoverty => self.vulnerable_to_poverty.as_ref(),
            Indicator::InSeverePoverty => self.in_severe_poverty.as_ref(),
        }
    }

    pub fn set(&mut self, indicator: Indicator, value: Option<String>) {
        let slot = match indicator {
            Indicator::Mpi => &mut self.mpi,
            Indicator::HeadcountRatio => &mut self.headcount_ratio,
            Indicator::IntensityOfDeprivation => &mut self.intensity_of_deprivation,
            Indicator::VulnerableToPoverty => &mut self.vulnerable_to_poverty,
            Indicator::InSeverePoverty => &mut self.in_severe_poverty,
        };
        *slot = value;
    }
}

/// A closed range of instants.
///
/// Invariant: `start <= end`.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// A standardised row before the reference period is attached.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct NormalizedRow {
    pub country_code: String,
    pub admin1_code: String,
    pub admin1_name: String,
    pub indicators: Indicators,
    pub survey: Option<String>,
    pub methodology_note: Option<String>,
}

impl NormalizedRow {
    pub fn into_dated(self, period: DateRange) -> IndicatorRow {
        IndicatorRow {
            country_code: self.country_code,
            admin1_code: self.admin1_code,
            admin1_name: self.admin1_name,
            indicators: self.indicators,
            survey: self.survey,
            methodology_note: self.methodology_note,
            reference_period_start: period.start,
            reference_period_end: period.end,
        }
    }
}

/// A standardised row, as published.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct IndicatorRow {
    pub country_code: String,
    pub admin1_code: String,
    pub admin1_name: String,
    pub indicators: Indicators,
    pub survey: Option<String>,
    pub methodology_note: Option<String>,
    pub reference_period_start: NaiveDateTime,
    pub reference_period_end: NaiveDateTime,
}

impl IndicatorRow {
    pub fn key(&self) -> CompositeKey {
        CompositeKey {
            country_code: self.country_code.clone(),
            admin1_code: self.admin1_code.clone(),
            admin1_name: self.admin1_name.clone(),
            start: self.reference_period_start,
            end: self.reference_period_end,
        }
    }

    pub fn reference_period(&self) -> DateRange {
        DateRange {
            start: self.reference_period_start,
            end: self.reference_period_end,
        }
    }
}

/// Identifies a record across all the source tables.
///
/// The field order is the sort order of the published rows.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct CompositeKey {
    pub country_code: String,
    pub admin1_code: String,
    pub admin1_name: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Display for CompositeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {}, {})",
            self.country_code,
            self.admin1_code,
            self.admin1_name,
            self.start.format("%Y-%m-%dT%H:%M:%S"),
            self.end.format("%Y-%m-%dT%H:%M:%S")
        )
    }
}

/// One of the two measurement points of the trend tables.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Timepoint {
    Early,
    Late,
}

impl Timepoint {
    pub const BOTH: [Timepoint; 2] = [Timepoint::Early, Timepoint::Late];

    /// The label used by the source tables (`t0`, `t1`).
    pub fn default_label(&self) -> &'static str {
        match self {
            Timepoint::Early => "t0",
            Timepoint::Late => "t1",
        }
    }
}

/// A value for each of the two timepoints.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Timepoints<T> {
    pub early: T,
    pub late: T,
}

impl<T> Timepoints<T> {
    pub fn get(&self, timepoint: Timepoint) -> &T {
        match timepoint {
            Timepoint::Early => &self.early,
            Timepoint::Late => &self.late,
        }
    }

    pub fn get_mut(&mut self, timepoint: Timepoint) -> &mut T {
        match timepoint {
            Timepoint::Early => &mut self.early,
            Timepoint::Late => &mut self.late,
        }
    }

    pub fn map<U, F: Fn(&T) -> U>(&self, f: F) -> Timepoints<U> {
        Timepoints {
            early: f(&self.early),
            late: f(&self.late),
        }
    }
}

/// How well a region name matched an administrative unit.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum MatchConfidence {
    /// Matched through an explicit name mapping or an identical name.
    Exact,
    /// Matched after normalising case, punctuation and spacing.
    Normalised,
    NoMatch,
}

/// Errors that stop a table from being standardised.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum StandardiseError {
    /// The text does not contain a recognisable date or year range.
    DateRangeParse { text: String },
    /// The range ends before it starts.
    InvertedDateRange { text: String },
    /// A column layout does not list one column per indicator.
    IndicatorColumnCount { expected: usize, found: usize },
}

impl Error for StandardiseError {}

impl Display for StandardiseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StandardiseError::DateRangeParse { text } => {
                write!(f, "could not parse date range {:?}", text)
            }
            StandardiseError::InvertedDateRange { text } => {
                write!(f, "date range {:?} ends before it starts", text)
            }
            StandardiseError::IndicatorColumnCount { expected, found } => write!(
                f,
                "expected {} indicator columns, found {}",
                expected, found
            ),
        }
    }
}
