use serde::Serialize;

use crate::backend::Record;
use datakit_schema::SortDirection;

pub const DEFAULT_PER_PAGE: u64 = 20;
pub const MAX_PER_PAGE: u64 = 100;

/// Listing parameters, rebuilt per call by the hosting layer.
///
/// Field names carried here are untrusted: the engines validate every one
/// of them against the schema's capability flags and drop the ones that
/// fail, so a `Criteria` can never smuggle a name into a query.
#[derive(Debug, Clone)]
pub struct Criteria {
    page: u64,
    per_page: u64,
    sort: Option<(String, SortDirection)>,
    filters: Vec<(String, String)>,
    search: Option<String>,
    include_deleted: bool,
}

impl Default for Criteria {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            sort: None,
            filters: Vec::new(),
            search: None,
            include_deleted: false,
        }
    }
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page number, floored at 1.
    pub fn page(mut self, page: u64) -> Self {
        self.page = page.max(1);
        self
    }

    /// Page size, clamped to `1..=MAX_PER_PAGE`.
    pub fn per_page(mut self, per_page: u64) -> Self {
        self.per_page = per_page.clamp(1, MAX_PER_PAGE);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some((field.into(), direction));
        self
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn include_deleted(mut self, include: bool) -> Self {
        self.include_deleted = include;
        self
    }

    pub fn page_number(&self) -> u64 {
        self.page
    }

    pub fn page_size(&self) -> u64 {
        self.per_page
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }

    pub fn sort_field(&self) -> Option<(&str, SortDirection)> {
        self.sort.as_ref().map(|(f, d)| (f.as_str(), *d))
    }

    pub fn filter_entries(&self) -> &[(String, String)] {
        &self.filters
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn includes_deleted(&self) -> bool {
        self.include_deleted
    }
}

/// A page of records with both counts: `count` is the unfiltered total,
/// `count_filtered` the total after filter/search but before pagination.
#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    pub rows: Vec<Record>,
    pub count: u64,
    pub count_filtered: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl ListResult {
    pub fn new(rows: Vec<Record>, criteria: &Criteria, count: u64, count_filtered: u64) -> Self {
        let per_page = criteria.page_size();
        let total_pages = count_filtered.div_ceil(per_page);
        Self {
            rows,
            count,
            count_filtered,
            page: criteria.page_number(),
            per_page,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let criteria = Criteria::new();
        assert_eq!(criteria.page_number(), 1);
        assert_eq!(criteria.page_size(), DEFAULT_PER_PAGE);
        assert_eq!(criteria.offset(), 0);
        assert!(!criteria.includes_deleted());
    }

    #[test]
    fn test_page_and_size_are_clamped() {
        let criteria = Criteria::new().page(0).per_page(10_000);
        assert_eq!(criteria.page_number(), 1);
        assert_eq!(criteria.page_size(), MAX_PER_PAGE);

        let criteria = Criteria::new().per_page(0);
        assert_eq!(criteria.page_size(), 1);
    }

    #[test]
    fn test_offset() {
        let criteria = Criteria::new().page(3).per_page(25);
        assert_eq!(criteria.offset(), 50);
    }

    #[test]
    fn test_offset_saturates_instead_of_overflowing() {
        let criteria = Criteria::new().page(u64::MAX).per_page(MAX_PER_PAGE);
        assert_eq!(criteria.offset(), u64::MAX);
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let criteria = Criteria::new().per_page(10);
        let result = ListResult::new(Vec::new(), &criteria, 95, 41);
        assert_eq!(result.total_pages, 5);
        assert_eq!(result.count, 95);
        assert_eq!(result.count_filtered, 41);
    }
}
