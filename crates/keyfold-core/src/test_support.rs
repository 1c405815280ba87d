use crate::{
    function::AggregateFunction,
    index::RecordSet,
    result::ResultMapping,
    sampling::SamplingPlan,
    store::RecordStore,
};
use tempfile::TempDir;

/// Scratch directory removed on drop, including during unwind.
pub(crate) fn scratch_dir() -> TempDir {
    tempfile::tempdir().expect("scratch dir")
}

/// Index key/value pairs into a record set.
pub(crate) fn record_set<K, V>(records: &[(K, V)]) -> RecordSet
where
    K: AsRef<[u8]>,
    V: AsRef<[u8]>,
{
    let store = RecordStore::from_records(records.iter().map(|(k, v)| (k.as_ref(), v.as_ref())))
        .expect("test records build");
    let (keys, values, _) = store.into_parts();

    RecordSet::index(keys, values).expect("test records index")
}

/// Five-record fixture: keys a, b, a, c, b.
pub(crate) fn five_records() -> RecordSet {
    record_set(&[("a", "1"), ("b", "2"), ("a", "3"), ("c", "4"), ("b", "5")])
}

/// Project a mapping into sorted `(key, result)` pairs.
pub(crate) fn results(mapping: &ResultMapping, function: AggregateFunction) -> Vec<(String, u64)> {
    mapping
        .results(function)
        .map(|row| {
            let (key, value) = row.expect("result extraction");
            (String::from_utf8_lossy(key).into_owned(), value)
        })
        .collect()
}

/// Plan covering every row.
pub(crate) fn full_plan(records: &RecordSet) -> SamplingPlan {
    SamplingPlan::resolve(None, records.len()).expect("full plan")
}
