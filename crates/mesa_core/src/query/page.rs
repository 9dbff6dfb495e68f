use serde::{Deserialize, Serialize};

/// One page of a view plus the numbers the pager UI needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based.
    pub page: usize,
    pub page_count: usize,
    pub total: usize,
}

/// Page size and current page; the page is kept inside `[1, page_count]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pager {
    page_size: usize,
    page: usize,
}

impl Pager {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            page: 1,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// `ceil(total / page_size)`, never less than 1.
    pub fn page_count(&self, total: usize) -> usize {
        total.div_ceil(self.page_size).max(1)
    }

    /// Re-clamp after the view shrank or grew.
    pub fn clamp(&mut self, total: usize) {
        self.page = self.page.clamp(1, self.page_count(total));
    }

    pub fn set_page(&mut self, page: usize, total: usize) {
        self.page = page;
        self.clamp(total);
    }

    pub fn set_page_size(&mut self, page_size: usize, total: usize) {
        self.page_size = page_size.max(1);
        self.clamp(total);
    }

    pub fn next(&mut self, total: usize) {
        self.set_page(self.page.saturating_add(1), total);
    }

    pub fn previous(&mut self, total: usize) {
        self.set_page(self.page.saturating_sub(1), total);
    }

    pub fn reset(&mut self) {
        self.page = 1;
    }
}

/// Slice `view` according to `pager`, clamping an out-of-range page.
pub fn paginate<T: Clone>(view: &[T], pager: &Pager) -> Page<T> {
    let total = view.len();
    let mut pager = *pager;
    pager.clamp(total);
    let start = (pager.page - 1) * pager.page_size;
    let end = (start + pager.page_size).min(total);
    Page {
        items: view.get(start..end).map(<[T]>::to_vec).unwrap_or_default(),
        page: pager.page,
        page_count: pager.page_count(total),
        total,
    }
}
