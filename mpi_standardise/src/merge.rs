//! Combination of the two timepoints of the trend tables.
//!
//! All the functions here are pure: the inputs are left untouched.

use log::debug;

use crate::config::*;
use crate::{CountryRowMaps, RowMap, StandardisedTable};

/// Overlays the later row on the earlier one.
///
/// Every field that the late row carries replaces the early value. Fields that
/// the late row lacks keep the early value. The location and the reference
/// period come from the early row: both rows are expected to share the same key.
pub fn merge_rows(early: &IndicatorRow, late: &IndicatorRow) -> IndicatorRow {
    let mut indicators = early.indicators.clone();
    for indicator in Indicator::ALL {
        if let Some(v) = late.indicators.get(indicator) {
            indicators.set(indicator, Some(v.clone()));
        }
    }
    IndicatorRow {
        country_code: early.country_code.clone(),
        admin1_code: early.admin1_code.clone(),
        admin1_name: early.admin1_name.clone(),
        indicators,
        survey: late.survey.clone().or_else(|| early.survey.clone()),
        methodology_note: late
            .methodology_note
            .clone()
            .or_else(|| early.methodology_note.clone()),
        reference_period_start: early.reference_period_start,
        reference_period_end: early.reference_period_end,
    }
}

/// Overlays the map of the late timepoint on the map of the early timepoint.
///
/// Keys in both maps are combined with `merge_rows`. Keys present at a single
/// timepoint keep the row of that timepoint unchanged.
pub fn merge_row_maps(early: &RowMap, late: &RowMap) -> RowMap {
    let mut res: RowMap = early.clone();
    for (key, late_row) in late.iter() {
        let merged = match early.get(key) {
            Some(early_row) => {
                debug!("merge_row_maps: merging both timepoints for {}", key);
                merge_rows(early_row, late_row)
            }
            None => late_row.clone(),
        };
        res.insert(key.clone(), merged);
    }
    res
}

/// Applies `merge_row_maps` country by country.
///
/// A country that only has rows at one timepoint keeps these rows.
pub fn merge_country_row_maps(early: &CountryRowMaps, late: &CountryRowMaps) -> CountryRowMaps {
    let empty = RowMap::new();
    let mut res: CountryRowMaps = CountryRowMaps::new();
    for country in early.keys().chain(late.keys()) {
        if res.contains_key(country) {
            continue;
        }
        let e = early.get(country).unwrap_or(&empty);
        let l = late.get(country).unwrap_or(&empty);
        if e.is_empty() || l.is_empty() {
            debug!(
                "merge_country_row_maps: {} only has rows at one timepoint",
                country
            );
        }
        res.insert(country.clone(), merge_row_maps(e, l));
    }
    res
}

/// Merges the tables of both timepoints into a single table.
pub fn merge_timepoints(tables: &Timepoints<StandardisedTable>) -> StandardisedTable {
    StandardisedTable::from_parts(
        merge_row_maps(tables.early.global(), tables.late.global()),
        merge_country_row_maps(tables.early.countries(), tables.late.countries()),
        tables.early.discarded() + tables.late.discarded(),
    )
}
