//! Page results.

use rivet_core::Collection;
use serde::Serialize;

/// One page of results plus the numbers needed to render a pager.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LengthAwarePaginator<T> {
    /// Items on this page.
    pub data: Collection<T>,
    /// Items across all pages.
    pub total: u64,
    pub per_page: u64,
    /// 1-based page number.
    pub current_page: u64,
    /// Last page number; 1 when there are no items.
    pub last_page: u64,
    /// 1-based position of the first item on this page.
    pub from: Option<u64>,
    /// 1-based position of the last item on this page.
    pub to: Option<u64>,
}

impl<T> LengthAwarePaginator<T> {
    /// Builds a page from its items and the overall total.
    #[must_use]
    pub fn new(data: Collection<T>, total: u64, per_page: u64, current_page: u64) -> Self {
        let per_page = per_page.max(1);
        let current_page = current_page.max(1);
        let last_page = total.div_ceil(per_page).max(1);
        let offset = (current_page - 1).saturating_mul(per_page);
        let (from, to) = if data.is_empty() {
            (None, None)
        } else {
            (
                Some(offset.saturating_add(1)),
                Some(offset.saturating_add(data.len() as u64)),
            )
        };
        Self {
            data,
            total,
            per_page,
            current_page,
            last_page,
            from,
            to,
        }
    }

    #[must_use]
    pub const fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page
    }

    #[must_use]
    pub const fn on_first_page(&self) -> bool {
        self.current_page == 1
    }

    /// Transforms the items, keeping the page numbers.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> LengthAwarePaginator<U> {
        LengthAwarePaginator {
            data: self.data.map(f),
            total: self.total,
            per_page: self.per_page,
            current_page: self.current_page,
            last_page: self.last_page,
            from: self.from,
            to: self.to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_numbers() {
        let page = LengthAwarePaginator::new(Collection::new(vec![11, 12, 13]), 23, 10, 2);
        assert_eq!(page.last_page, 3);
        assert_eq!(page.from, Some(11));
        assert_eq!(page.to, Some(13));
        assert!(page.has_more_pages());
    }

    #[test]
    fn test_page_past_the_end_saturates() {
        let page = LengthAwarePaginator::new(Collection::new(vec![1]), 3, 10, u64::MAX);
        assert_eq!(page.current_page, u64::MAX);
        assert_eq!(page.from, Some(u64::MAX));
        assert_eq!(page.to, Some(u64::MAX));
        assert!(!page.has_more_pages());
    }

    #[test]
    fn test_empty_page() {
        let page = LengthAwarePaginator::<i32>::new(Collection::default(), 0, 15, 1);
        assert_eq!(page.last_page, 1);
        assert_eq!((page.from, page.to), (None, None));
        assert!(!page.has_more_pages());
        assert!(page.on_first_page());
    }

    #[test]
    fn test_serializes_page_fields() {
        let page = LengthAwarePaginator::new(Collection::new(vec!["a"]), 1, 5, 1);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["data"], serde_json::json!(["a"]));
        assert_eq!(json["last_page"], 1);
        assert_eq!(json["per_page"], 5);
    }
}
