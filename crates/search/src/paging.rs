use crate::error::{Result, SearchError};

/// Number of pages for `total` items; an empty listing still has one page.
pub fn page_count(total: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 1;
    }
    total.div_ceil(page_size).max(1)
}

/// Items of the 1-based page `page_number`, or `NotFound` outside `1..=page_count`.
pub fn page<T>(items: &[T], page_number: usize, page_size: usize) -> Result<&[T]> {
    if page_size == 0 {
        return Err(SearchError::BadInput("page size must be positive".to_string()));
    }
    let pages = page_count(items.len(), page_size);
    if page_number == 0 || page_number > pages {
        return Err(SearchError::NotFound(format!(
            "page {page_number} (of {pages})"
        )));
    }
    let start = (page_number - 1) * page_size;
    let end = (start + page_size).min(items.len());
    Ok(&items[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn ten_items_in_pages_of_four() {
        let items: Vec<u32> = (0..10).collect();
        assert_eq!(page(&items, 1, 4).expect("page 1"), &[0, 1, 2, 3]);
        assert_eq!(page(&items, 3, 4).expect("page 3"), &[8, 9]);
        assert!(matches!(page(&items, 4, 4), Err(SearchError::NotFound(_))));
        assert!(matches!(page(&items, 0, 4), Err(SearchError::NotFound(_))));
        assert_eq!(page_count(items.len(), 4), 3);
    }

    #[test]
    fn empty_listing_has_one_empty_page() {
        let items: Vec<u32> = Vec::new();
        assert_eq!(page_count(0, 15), 1);
        assert!(page(&items, 1, 15).expect("first page").is_empty());
        assert!(matches!(page(&items, 2, 15), Err(SearchError::NotFound(_))));
    }

    #[test]
    fn zero_page_size_is_rejected() {
        assert!(matches!(page(&[1, 2, 3], 1, 0), Err(SearchError::BadInput(_))));
    }

    proptest! {
        #[test]
        fn proptest_every_page_in_range_is_non_empty(total in 1usize..200, size in 1usize..30) {
            let items: Vec<usize> = (0..total).collect();
            let pages = page_count(total, size);
            let mut seen = 0;
            for number in 1..=pages {
                let slice = page(&items, number, size).expect("in range");
                prop_assert!(!slice.is_empty());
                seen += slice.len();
            }
            prop_assert_eq!(seen, total);
            prop_assert!(page(&items, pages + 1, size).is_err());
        }
    }
}
