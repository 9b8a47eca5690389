use std::collections::BTreeMap;

pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// `ceil(total / limit)`, with zero pages for an empty result set.
pub fn total_pages(total_count: u64, limit: u32) -> u32 {
    if total_count == 0 || limit == 0 {
        return 0;
    }
    total_count.div_ceil(limit as u64) as u32
}

/// One fetched slice of a resource list.
#[derive(Clone, Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub current_page: u32,
    pub total_pages: u32,
    pub total_count: u64,
}

impl<T> Page<T> {
    pub fn empty(current_page: u32) -> Self {
        Self {
            items: Vec::new(),
            current_page,
            total_pages: 0,
            total_count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Per-list filter and pagination state. Changing any filter restarts
/// pagination at page 1 so the view never lands on a page that is out
/// of range for the narrower result set.
#[derive(Clone, Debug)]
pub struct ListQuery {
    page: u32,
    limit: u32,
    query: String,
    fields: BTreeMap<String, String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
            query: String::new(),
            fields: BTreeMap::new(),
        }
    }
}

impl ListQuery {
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit: limit.max(1),
            ..Self::default()
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(|v| v.as_str())
    }

    pub fn set_query(&mut self, query: &str) {
        self.query = query.trim().to_string();
        self.page = 1;
    }

    /// Sets a typed field filter. An empty value removes the filter
    /// entirely so it participates in no predicate.
    pub fn set_field(&mut self, key: &str, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            self.fields.remove(key);
        } else {
            self.fields.insert(key.to_string(), value.to_string());
        }
        self.page = 1;
    }

    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
    }

    /// Advances a page if the upper bound allows it; reports whether
    /// anything moved so the caller can skip a redundant fetch.
    pub fn next_page(&mut self, total_pages: u32) -> bool {
        if self.page < total_pages {
            self.page += 1;
            true
        } else {
            false
        }
    }

    pub fn prev_page(&mut self) -> bool {
        if self.page > 1 {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    /// Pulls an out-of-range page back to the last valid one after the
    /// result set shrank. Reports whether a correction happened.
    pub fn clamp(&mut self, total_pages: u32) -> bool {
        if total_pages > 0 && self.page > total_pages {
            self.page = total_pages;
            true
        } else {
            false
        }
    }

    /// Canonical query-string pairs. Absent filters are never encoded
    /// as empty parameters: the server would read `?status=` as
    /// "filter for the empty string" rather than "no filter".
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut out = vec![
            ("page".to_string(), self.page.to_string()),
            ("limit".to_string(), self.limit.to_string()),
        ];
        if !self.query.is_empty() {
            out.push(("query".to_string(), self.query.clone()));
        }
        for (k, v) in self.fields.iter() {
            out.push((k.clone(), v.clone()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(95, 10), 10);
    }

    #[test]
    fn filter_changes_reset_to_page_one() {
        let mut q = ListQuery::default();
        q.set_page(4);
        q.set_query("reyes");
        assert_eq!(q.page(), 1);

        q.set_page(3);
        q.set_field("status", "Late");
        assert_eq!(q.page(), 1);
    }

    #[test]
    fn paging_clamps_at_both_bounds() {
        let mut q = ListQuery::default();
        assert!(!q.prev_page());
        assert!(q.next_page(3));
        assert!(q.next_page(3));
        assert_eq!(q.page(), 3);
        assert!(!q.next_page(3));
        assert!(q.prev_page());
        assert_eq!(q.page(), 2);
    }

    #[test]
    fn clamp_pulls_back_out_of_range_page() {
        let mut q = ListQuery::default();
        q.set_page(5);
        assert!(q.clamp(2));
        assert_eq!(q.page(), 2);
        assert!(!q.clamp(2));
        // there is no valid page in an empty result set; leave as-is
        assert!(!q.clamp(0));
        assert_eq!(q.page(), 2);
    }

    #[test]
    fn empty_filters_are_never_encoded() {
        let mut q = ListQuery::default();
        q.set_field("date", "2025-08-05");
        q.set_field("status", "  ");
        let pairs = q.to_pairs();
        assert_eq!(
            pairs,
            vec![
                ("page".to_string(), "1".to_string()),
                ("limit".to_string(), "10".to_string()),
                ("date".to_string(), "2025-08-05".to_string()),
            ]
        );
    }

    #[test]
    fn clearing_a_field_removes_it() {
        let mut q = ListQuery::default();
        q.set_field("status", "Late");
        q.set_field("status", "");
        assert!(q.field("status").is_none());
    }
}
