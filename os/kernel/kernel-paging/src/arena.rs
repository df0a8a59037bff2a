//! Generation-checked storage for [`Page`] records.
//!
//! Frame-table back-references hold a [`PageId`] rather than a pointer. A
//! removed slot bumps its generation, so a stale id resolves to `None`
//! instead of to whatever page reused the slot.

use crate::page::Page;
use alloc::vec::Vec;

/// Stable reference to a page in a [`PageArena`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct PageId {
    index: usize,
    generation: u32,
}

#[derive(Debug, Clone, Copy)]
enum Entry {
    Occupied { generation: u32, page: Page },
    Vacant { generation: u32, next_free: Option<usize> },
}

#[derive(Debug, Default)]
pub struct PageArena {
    entries: Vec<Entry>,
    free_head: Option<usize>,
    len: usize,
}

impl PageArena {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            free_head: None,
            len: 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, page: Page) -> PageId {
        self.len += 1;
        if let Some(index) = self.free_head
            && let Some(&Entry::Vacant {
                generation,
                next_free,
            }) = self.entries.get(index)
        {
            self.free_head = next_free;
            self.entries[index] = Entry::Occupied { generation, page };
            return PageId { index, generation };
        }

        let index = self.entries.len();
        self.entries.push(Entry::Occupied {
            generation: 0,
            page,
        });
        PageId {
            index,
            generation: 0,
        }
    }

    #[must_use]
    pub fn get(&self, id: PageId) -> Option<&Page> {
        match self.entries.get(id.index)? {
            Entry::Occupied { generation, page } if *generation == id.generation => Some(page),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: PageId) -> Option<&mut Page> {
        match self.entries.get_mut(id.index)? {
            Entry::Occupied { generation, page } if *generation == id.generation => Some(page),
            _ => None,
        }
    }

    /// Remove the page behind `id`; every copy of `id` goes stale.
    pub fn remove(&mut self, id: PageId) -> Option<Page> {
        let entry = self.entries.get_mut(id.index)?;
        let Entry::Occupied { generation, page } = *entry else {
            return None;
        };
        if generation != id.generation {
            return None;
        }
        *entry = Entry::Vacant {
            generation: generation.wrapping_add(1),
            next_free: self.free_head,
        };
        self.free_head = Some(id.index);
        self.len -= 1;
        Some(page)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PageId, &Page)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| match entry {
                Entry::Occupied { generation, page } => Some((
                    PageId {
                        index,
                        generation: *generation,
                    },
                    page,
                )),
                Entry::Vacant { .. } => None,
            })
    }

    /// Consume the arena, yielding every live page.
    pub fn into_pages(self) -> impl Iterator<Item = Page> {
        self.entries.into_iter().filter_map(|entry| match entry {
            Entry::Occupied { page, .. } => Some(page),
            Entry::Vacant { .. } => None,
        })
    }
}
