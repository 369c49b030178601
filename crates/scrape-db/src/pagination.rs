use serde::Serialize;

/// Validated `page`/`limit` query parameters. Construction enforces
/// `page >= 1` and `1 <= limit <= 100`.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64) -> Result<Self, scrape_types::ScrapeError> {
        if page < 1 {
            return Err(scrape_types::ScrapeError::validation(
                "page must be >= 1",
            ));
        }
        if !(1..=100).contains(&limit) {
            return Err(scrape_types::ScrapeError::validation(
                "limit must be between 1 and 100",
            ));
        }
        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

/// A page of results plus the metadata the HTTP layer reports back.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        let total_pages = if pagination.limit == 0 {
            0
        } else {
            (total + pagination.limit - 1) / pagination.limit
        };
        Self {
            items,
            total,
            page: pagination.page,
            limit: pagination.limit,
            total_pages,
        }
    }

    /// Maps each item, keeping the pagination metadata untouched. Lets
    /// handlers project a repository row onto its public response shape
    /// without re-deriving `total_pages`.
    pub fn map_items<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_limit() {
        assert!(Pagination::new(1, 0).is_err());
        assert!(Pagination::new(1, 101).is_err());
        assert!(Pagination::new(0, 10).is_err());
        assert!(Pagination::new(1, 10).is_ok());
    }

    #[test]
    fn total_pages_rounds_up() {
        let p = Pagination::new(1, 10).unwrap();
        let page = Page::new(Vec::<i32>::new(), 25, p);
        assert_eq!(page.total_pages, 3);
    }
}
