//! Paged listings and the application sort order.

use std::cmp::Ordering;
use veracode_api::{Application, PagedResource};

use super::filters::PageCursor;
use super::scope::ScopeState;

/// One page of results, replaced wholesale on every load.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultPage<T> {
    pub items: Vec<T>,
    pub total_items: u64,
    pub total_pages: u32,
}

impl<T> ResultPage<T> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> From<PagedResource<T>> for ResultPage<T> {
    fn from(resource: PagedResource<T>) -> Self {
        let page = resource.page();
        Self {
            items: resource.into_items(),
            total_items: page.total_elements,
            total_pages: page.total_pages,
        }
    }
}

/// Filters, cursor, load state and row selection of one listing.
#[derive(Debug, Clone)]
pub struct PagedList<F, T> {
    pub filters: F,
    pub cursor: PageCursor,
    pub state: ScopeState<ResultPage<T>>,
    selected: usize,
}

impl<F: Default, T> PagedList<F, T> {
    #[must_use]
    pub fn new(page_size: u32) -> Self {
        Self {
            filters: F::default(),
            cursor: PageCursor::new(page_size),
            state: ScopeState::Idle,
            selected: 0,
        }
    }
}

impl<F, T> PagedList<F, T> {
    #[must_use]
    pub fn page(&self) -> Option<&ResultPage<T>> {
        self.state.loaded()
    }

    #[must_use]
    pub fn selected_index(&self) -> usize {
        self.selected
    }

    #[must_use]
    pub fn selected_item(&self) -> Option<&T> {
        self.page().and_then(|page| page.items.get(self.selected))
    }

    /// Move the row selection, clamped to the loaded page.
    pub fn move_selection(&mut self, delta: isize) {
        let len = self.page().map_or(0, |page| page.items.len());
        if len == 0 {
            self.selected = 0;
            return;
        }
        let target = self.selected.saturating_add_signed(delta);
        self.selected = target.min(len - 1);
    }

    /// Store a freshly loaded page and put the selection on its first row.
    pub fn load(&mut self, page: ResultPage<T>) {
        self.state = ScopeState::Loaded(page);
        self.selected = 0;
    }

    /// Total pages of the loaded page, `None` unless loaded.
    #[must_use]
    pub fn total_pages(&self) -> Option<u32> {
        self.page().map(|page| page.total_pages)
    }
}

/// Modification time descending; entries without one go last.
///
/// The sort is stable, so entries without a modification time keep their
/// relative order.
pub fn sort_by_modified(applications: &mut [Application]) {
    applications.sort_by(|a, b| match (a.modified, b.modified) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}
