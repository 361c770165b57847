//! Lazy iteration over paged remote listings.

use std::collections::VecDeque;

use crate::error::Result;
use crate::remote::Page;

/// Page size used for every remote listing.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Iterator returned by [`paged`].
pub struct Paged<T, F> {
    fetch: F,
    page_size: usize,
    offset: usize,
    buffer: VecDeque<T>,
    done: bool,
}

/// Iterate over a paged listing.
///
/// `fetch(offset, page_size)` is called lazily, starting at offset 0 and
/// advancing by the number of items each page returned. Iteration stops
/// after an empty page, after a page whose reported total is reached, or,
/// when no total is reported, after a short page. A fetch error is yielded
/// once and ends the iteration.
///
/// ```
/// use jiramail::remote::Page;
/// use jiramail::sync::paging::paged;
///
/// let data: Vec<u32> = (0..5).collect();
/// let items: Vec<u32> = paged(2, |offset, size| {
///     let end = (offset + size).min(data.len());
///     Ok(Page::new(data[offset..end].to_vec(), Some(data.len())))
/// })
/// .collect::<Result<_, _>>()
/// .unwrap();
/// assert_eq!(items, data);
/// ```
pub fn paged<T, F>(page_size: usize, fetch: F) -> Paged<T, F>
where
    F: FnMut(usize, usize) -> Result<Page<T>>,
{
    Paged {
        fetch,
        page_size: page_size.max(1),
        offset: 0,
        buffer: VecDeque::new(),
        done: false,
    }
}

impl<T, F> Iterator for Paged<T, F>
where
    F: FnMut(usize, usize) -> Result<Page<T>>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(item) = self.buffer.pop_front() {
            return Some(Ok(item));
        }
        if self.done {
            return None;
        }

        let page = match (self.fetch)(self.offset, self.page_size) {
            Ok(page) => page,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };

        let count = page.items.len();
        if count == 0 {
            self.done = true;
            return None;
        }

        self.offset += count;
        self.done = match page.total {
            Some(total) => total <= self.offset,
            None => count < self.page_size,
        };

        self.buffer.extend(page.items);
        self.buffer.pop_front().map(Ok)
    }
}
