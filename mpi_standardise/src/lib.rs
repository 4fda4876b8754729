mod config;
mod date_range;
mod merge;
mod normalize;

pub mod manual;

use log::{debug, error};
use std::collections::BTreeMap;

pub use crate::config::*;
pub use crate::date_range::{extend_envelope, parse_date_range, DateRangeEnvelopes, GLOBAL_SCOPE};
pub use crate::merge::{merge_country_row_maps, merge_row_maps, merge_rows, merge_timepoints};
pub use crate::normalize::{
    format_indicator, normalise_header, normalize_row, AdminResolver, ColumnLayout,
    NoAdminResolver, NormalizedRecord, TIMEPOINT_PLACEHOLDER,
};

/// The rows of a table, in key order.
pub type RowMap = BTreeMap<CompositeKey, IndicatorRow>;

/// The rows of a table, grouped by country code.
pub type CountryRowMaps = BTreeMap<String, RowMap>;

/// What happened to a row offered to a table.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Insertion {
    Inserted,
    /// Another row already had the same key. The row was discarded.
    Duplicate,
}

/// The deduplicated rows of one or more source tables.
///
/// Every row is stored twice: once in the global map and once in the map of
/// its country. Both views always hold the same set of keys.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct StandardisedTable {
    global: RowMap,
    countries: CountryRowMaps,
    discarded: usize,
}

impl StandardisedTable {
    pub fn new() -> StandardisedTable {
        StandardisedTable::default()
    }

    pub(crate) fn from_parts(
        global: RowMap,
        countries: CountryRowMaps,
        discarded: usize,
    ) -> StandardisedTable {
        StandardisedTable {
            global,
            countries,
            discarded,
        }
    }

    /// Adds a normalised row to the table.
    ///
    /// The reference period is resolved from `date_range_text` and recorded in
    /// the envelopes, even when the row turns out to be a duplicate. The first
    /// row seen for a key is kept: later rows with the same key are logged and
    /// dropped.
    pub fn add_row(
        &mut self,
        row: NormalizedRow,
        date_range_text: &str,
        max_end: bool,
        envelopes: &mut DateRangeEnvelopes,
        source_label: &str,
    ) -> Result<Insertion, StandardiseError> {
        let range = parse_date_range(date_range_text, max_end)?;
        envelopes.record(&row.country_code, range);
        let row = row.into_dated(range);
        let key = row.key();
        if self.global.contains_key(&key) {
            error!("Key {} already exists in {}!", key, source_label);
            self.discarded += 1;
            return Ok(Insertion::Duplicate);
        }
        debug!("add_row: {}: inserting {}", source_label, key);
        self.countries
            .entry(row.country_code.clone())
            .or_default()
            .insert(key.clone(), row.clone());
        self.global.insert(key, row);
        Ok(Insertion::Inserted)
    }

    pub fn global(&self) -> &RowMap {
        &self.global
    }

    pub fn countries(&self) -> &CountryRowMaps {
        &self.countries
    }

    pub fn country(&self, country_code: &str) -> Option<&RowMap> {
        self.countries.get(country_code)
    }

    pub fn len(&self) -> usize {
        self.global.len()
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty()
    }

    /// The number of rows dropped because their key was already present.
    pub fn discarded(&self) -> usize {
        self.discarded
    }
}
