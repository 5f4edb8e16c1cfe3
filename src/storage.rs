use crate::article::ArticleRecord;

/// Ordered, session-owned collection of extracted records.
///
/// Records keep insertion order until [`ResultStore::sort_by_date`] is
/// called. The store also tracks the result count the backend reports next
/// to the records themselves.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    records: Vec<ArticleRecord>,
    total_count: Option<u64>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, record: ArticleRecord) {
        self.records.push(record);
    }

    pub(crate) fn extend(&mut self, records: Vec<ArticleRecord>) {
        self.records.extend(records);
    }

    pub(crate) fn set_total_count(&mut self, count: Option<u64>) {
        self.total_count = count;
    }

    /// All records, in insertion order unless sorted in the meantime.
    pub fn records(&self) -> &[ArticleRecord] {
        &self.records
    }

    /// Sorts the records by their normalized date, newest first. Records
    /// whose date could not be normalized sort as oldest.
    pub fn sort_by_date(&mut self) {
        self.records
            .sort_by(|a, b| b.date_value.cmp(&a.date_value));
    }

    /// The titles of all records.
    pub fn titles(&self) -> Vec<String> {
        self.records.iter().map(|r| r.title.clone()).collect()
    }

    /// The links of all records.
    pub fn links(&self) -> Vec<String> {
        self.records.iter().map(|r| r.link.clone()).collect()
    }

    /// Result count reported by the backend statistics, `None` when the last
    /// fetched page carried none.
    pub fn total_count(&self) -> Option<u64> {
        self.total_count
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drops all records and the total count.
    pub fn clear(&mut self) {
        self.records.clear();
        self.total_count = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(title: &str, day: Option<u32>) -> ArticleRecord {
        ArticleRecord {
            title: title.to_string(),
            link: format!("https://example.com/{}", title),
            date_value: day.and_then(|day| {
                NaiveDate::from_ymd_opt(2024, 3, day)?.and_hms_opt(0, 0, 0)
            }),
            ..ArticleRecord::default()
        }
    }

    #[test]
    fn sort_is_newest_first_with_sentinels_last() {
        let mut store = ResultStore::new();
        store.push(record("a", Some(3)));
        store.push(record("b", Some(9)));
        store.push(record("c", None));
        store.push(record("d", Some(5)));

        store.sort_by_date();
        let titles = store.titles();
        assert_eq!(titles, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn projections_follow_the_records() {
        let mut store = ResultStore::new();
        store.push(record("a", Some(1)));
        store.push(record("b", None));
        store.set_total_count(Some(42));

        assert_eq!(store.len(), 2);
        assert_eq!(store.titles().len(), store.records().len());
        assert_eq!(
            store.links(),
            vec!["https://example.com/a", "https://example.com/b"]
        );
        assert_eq!(store.total_count(), Some(42));
    }

    #[test]
    fn clear_drops_records_and_count() {
        let mut store = ResultStore::new();
        store.push(record("a", Some(1)));
        store.set_total_count(Some(7));

        store.clear();
        assert!(store.is_empty());
        assert!(store.titles().is_empty());
        assert!(store.links().is_empty());
        assert_eq!(store.total_count(), None);
    }
}
