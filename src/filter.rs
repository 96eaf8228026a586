use crate::model::InstrumentRecord;

/// Expiration timestamp of the cohort the filter keeps: the first record's.
///
/// Purely positional. The upstream array order decides which expiry wins;
/// nothing here picks the nearest or most liquid one.
pub fn selected_expiry(records: &[InstrumentRecord]) -> Option<i64> {
    records.first().map(|r| r.expiration_timestamp)
}

/// All records sharing the first record's expiration timestamp, in input order.
///
/// Empty input yields an empty output.
pub fn filter_by_expiry(records: &[InstrumentRecord]) -> Vec<InstrumentRecord> {
    let Some(expiry) = selected_expiry(records) else {
        return Vec::new();
    };

    records
        .iter()
        .filter(|r| r.expiration_timestamp == expiry)
        .cloned()
        .collect()
}
