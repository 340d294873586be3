//! Purpose: Derive the filtered, paginated view the rendering layer displays.
//! Exports: `PAGE_SIZE`, `PageView`, `page_view`.
//! Role: Pure projection of (records, query, page); never mutates the store.
//! Invariants: Search is case-insensitive substring match on title only.
//! Invariants: Page numbers are 1-based and clamped to the valid range.

use crate::core::record::Record;

pub const PAGE_SIZE: usize = 10;

#[derive(Clone, Debug, PartialEq)]
pub struct PageView {
    pub records: Vec<Record>,
    pub page: usize,
    pub total_pages: usize,
    pub total_records: usize,
}

/// An empty query matches everything.
fn matches(record: &Record, query_lower: &str) -> bool {
    query_lower.is_empty() || record.title.to_lowercase().contains(query_lower)
}

pub fn page_view(records: &[Record], query: &str, page: usize, page_size: usize) -> PageView {
    let query_lower = query.to_lowercase();
    let filtered: Vec<&Record> = records
        .iter()
        .filter(|record| matches(record, &query_lower))
        .collect();

    let total_records = filtered.len();
    let total_pages = total_records.div_ceil(page_size).max(1);
    let page = page.clamp(1, total_pages);
    let start = (page - 1) * page_size;
    let records = filtered
        .into_iter()
        .skip(start)
        .take(page_size)
        .cloned()
        .collect();

    PageView {
        records,
        page,
        total_pages,
        total_records,
    }
}

#[cfg(test)]
mod tests {
    use super::{PAGE_SIZE, page_view};
    use crate::core::record::{Draft, Record};

    fn records(count: usize) -> Vec<Record> {
        (1..=count)
            .map(|n| Draft::new(format!("Leaf {n}"), "example.com").into_record(n.to_string()))
            .collect()
    }

    #[test]
    fn empty_query_returns_everything() {
        let all = records(3);
        let view = page_view(&all, "", 1, PAGE_SIZE);
        assert_eq!(view.total_records, 3);
        assert_eq!(view.records.len(), 3);
    }

    #[test]
    fn search_is_case_insensitive_on_title() {
        let mut all = records(2);
        all[0].title = "Rust Patterns".to_string();
        all[1].title = "Other".to_string();
        let view = page_view(&all, "rUsT", 1, PAGE_SIZE);
        assert_eq!(view.total_records, 1);
        assert_eq!(view.records[0].title, "Rust Patterns");
    }

    #[test]
    fn search_does_not_match_domain() {
        let all = records(2);
        let view = page_view(&all, "example.com", 1, PAGE_SIZE);
        assert_eq!(view.total_records, 0);
        assert!(view.records.is_empty());
    }

    #[test]
    fn pages_split_at_page_size() {
        let all = records(25);
        let view = page_view(&all, "", 1, 10);
        assert_eq!(view.total_pages, 3);
        assert_eq!(view.records.len(), 10);
        let last = page_view(&all, "", 3, 10);
        assert_eq!(last.records.len(), 5);
    }

    #[test]
    fn page_is_clamped_to_valid_range() {
        let all = records(15);
        let high = page_view(&all, "", 99, 10);
        assert_eq!(high.page, 2);
        assert_eq!(high.records.len(), 5);
        let low = page_view(&all, "", 0, 10);
        assert_eq!(low.page, 1);
        assert_eq!(low.records.len(), 10);
    }

    #[test]
    fn empty_set_still_has_one_page() {
        let view = page_view(&[], "", 5, 10);
        assert_eq!(view.page, 1);
        assert_eq!(view.total_pages, 1);
        assert!(view.records.is_empty());
    }
}
