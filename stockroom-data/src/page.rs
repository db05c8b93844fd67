use serde::{Deserialize, Serialize};

/// Pagination metadata returned alongside a page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PageMeta {
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        Self {
            page,
            limit,
            total,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

/// A page of results with pagination metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: PageMeta,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, page: u64, limit: u64, total: u64) -> Self {
        Self {
            data,
            pagination: PageMeta::new(page, limit, total),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_serializes_camel_case() {
        let page = Page::new(vec![1, 2], 1, 2, 3);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "data": [1, 2],
                "pagination": {
                    "page": 1, "limit": 2, "total": 3,
                    "totalPages": 2, "hasNext": true, "hasPrev": false
                }
            })
        );
    }

    #[test]
    fn test_page_beyond_last_is_empty_with_flags() {
        let page: Page<i32> = Page::new(vec![], 9, 10, 25);
        assert_eq!(page.pagination.total_pages, 3);
        assert!(!page.pagination.has_next);
        assert!(page.pagination.has_prev);
    }

    #[test]
    fn test_zero_limit_has_no_pages() {
        let meta = PageMeta::new(1, 0, 12);
        assert_eq!(meta.total_pages, 0);
        assert!(!meta.has_next);
    }

    #[test]
    fn test_map_keeps_meta() {
        let page = Page::new(vec![1, 2], 2, 2, 4).map(|n| n.to_string());
        assert_eq!(page.data, vec!["1", "2"]);
        assert_eq!(page.pagination.page, 2);
    }

    proptest! {
        #[test]
        fn prop_meta_invariants(page in 1u64..500, limit in 1u64..1000, total in 0u64..100_000) {
            let meta = PageMeta::new(page, limit, total);
            prop_assert_eq!(meta.total_pages, (total + limit - 1) / limit);
            prop_assert_eq!(meta.has_next, page < meta.total_pages);
            prop_assert_eq!(meta.has_prev, page > 1);
            prop_assert!(meta.total_pages * limit >= total);
        }
    }
}
