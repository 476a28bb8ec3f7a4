use serde::Serialize;

/// One page of a larger result set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based.
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: u32, per_page: u32, total: u64) -> Self {
        Self {
            items,
            page,
            per_page,
            total,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn last_page(&self) -> u32 {
        if self.per_page == 0 || self.total == 0 {
            return 1;
        }
        self.total.div_ceil(u64::from(self.per_page)) as u32
    }

    pub fn has_more(&self) -> bool {
        self.page < self.last_page()
    }

    /// Row offset of the first item for a 1-based page number.
    pub fn offset(page: u32, per_page: u32) -> u64 {
        u64::from(page.max(1) - 1) * u64::from(per_page)
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_page_rounds_up() {
        let page: Page<u8> = Page::new(vec![], 1, 12, 25);
        assert_eq!(page.last_page(), 3);
        assert!(page.has_more());
    }

    #[test]
    fn empty_result_has_a_single_page() {
        let page: Page<u8> = Page::new(vec![], 1, 12, 0);
        assert!(page.is_empty());
        assert_eq!(page.last_page(), 1);
        assert!(!page.has_more());
    }

    #[test]
    fn offset_treats_page_zero_as_first() {
        assert_eq!(Page::<u8>::offset(0, 12), 0);
        assert_eq!(Page::<u8>::offset(1, 12), 0);
        assert_eq!(Page::<u8>::offset(3, 12), 24);
    }
}
