//! Result ordering. Pure reordering, no merging.

use std::cmp::Reverse;

use crate::models::{PaperRecord, SortMode};

/// Reorder `records` in place according to the requested sort mode.
///
/// `Relevance` keeps aggregator order since each backend already ranks by
/// relevance. The sorts are stable, so equal keys preserve that order too.
pub fn sort_records(records: &mut [PaperRecord], mode: SortMode) {
    match mode {
        SortMode::Relevance => {}
        SortMode::Newest => {
            records.sort_by_key(|r| Reverse(r.year.unwrap_or(i32::MIN)));
        }
        SortMode::Citations => {
            records.sort_by_key(|r| Reverse(r.citations));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceId;

    fn record(id: &str, year: Option<i32>, citations: u32) -> PaperRecord {
        let mut r = PaperRecord::new(id, format!("Paper {}", id), SourceId::Semantic);
        r.year = year;
        r.citations = citations;
        r
    }

    #[test]
    fn test_relevance_preserves_order() {
        let mut records = vec![record("a", Some(2001), 5), record("b", Some(2020), 1)];
        sort_records(&mut records, SortMode::Relevance);
        assert_eq!(records[0].id, "a");
        assert_eq!(records[1].id, "b");
    }

    #[test]
    fn test_newest_sorts_year_descending_missing_last() {
        let mut records = vec![
            record("a", Some(2010), 0),
            record("b", None, 0),
            record("c", Some(2022), 0),
        ];
        sort_records(&mut records, SortMode::Newest);
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_citations_sorts_descending() {
        let mut records = vec![
            record("a", None, 10),
            record("b", None, 300),
            record("c", None, 0),
        ];
        sort_records(&mut records, SortMode::Citations);
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }
}
