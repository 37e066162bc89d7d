use std::collections::HashSet;

use folio::{BookInfo, SectionCursor, StructuredReference};

use crate::{CorpusStore, LoadError, Page, Segment};

/// Loads one section at a time and works out its neighbors.
///
/// The loader is stateless: every call reads the store afresh. It sorts and de-duplicates
/// within a page but knows nothing about the window the page will be stitched into.
#[derive(Clone, Debug)]
pub struct PageLoader<S> {
    store: S,
}

impl<S: CorpusStore> PageLoader<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fetches the section at `cursor`.
    ///
    /// `next_cursor` is the following section of the same book, or the first section of the
    /// next book that has any; `prev_cursor` mirrors that backwards. `None` marks the corpus
    /// boundary.
    pub fn load_page(&self, cursor: &SectionCursor) -> Result<Page, LoadError> {
        let section = cursor.prefix();
        vdebug!(section = %section, "load_page");
        if self.book(cursor.book_slug())?.is_none() {
            return Err(LoadError::UnknownBook(cursor.book_slug().to_owned()));
        }

        let fetched = self
            .store
            .fetch_section(cursor)
            .map_err(|source| LoadError::Fetch {
                section: section.clone(),
                source,
            })?;
        let book = fetched.book;

        let mut segments = Vec::with_capacity(fetched.records.len());
        for record in fetched.records {
            let reference = StructuredReference::parse(&record.reference, &self.store)
                .map_err(|source| LoadError::CorruptRecord {
                    section: section.clone(),
                    raw: record.reference.clone(),
                    source,
                })?;
            if !cursor.contains(&reference) {
                vwarn!(section = %section, reference = %reference, "record outside section, dropped");
                continue;
            }
            segments.push(Segment::new(reference, record, &book));
        }
        segments.sort_by_key(Segment::sort_key);
        segments.dedup_by(|a, b| a.reference == b.reference);

        let next_cursor = self.next_section(&book, cursor)?;
        let prev_cursor = self.prev_section(&book, cursor)?;
        vtrace!(
            section = %section,
            segments = segments.len(),
            next = ?next_cursor.as_ref().map(SectionCursor::prefix),
            prev = ?prev_cursor.as_ref().map(SectionCursor::prefix),
            "page loaded"
        );

        Ok(Page {
            book_slug: book.slug,
            section_prefix: section,
            cursor: cursor.clone(),
            segments,
            next_cursor,
            prev_cursor,
        })
    }

    fn next_section(
        &self,
        book: &BookInfo,
        cursor: &SectionCursor,
    ) -> Result<Option<SectionCursor>, LoadError> {
        let keys = self.table_of_contents(&book.slug)?;
        let at = keys.partition_point(|key| key.as_slice() <= cursor.ordinals());
        if let Some(key) = keys.get(at) {
            return section_cursor(book, key).map(Some);
        }
        self.across_books(book, true)
    }

    fn prev_section(
        &self,
        book: &BookInfo,
        cursor: &SectionCursor,
    ) -> Result<Option<SectionCursor>, LoadError> {
        let keys = self.table_of_contents(&book.slug)?;
        let at = keys.partition_point(|key| key.as_slice() < cursor.ordinals());
        if at > 0 {
            return section_cursor(book, &keys[at - 1]).map(Some);
        }
        self.across_books(book, false)
    }

    /// Walks the canonical book chain, skipping books without sections.
    fn across_books(
        &self,
        from: &BookInfo,
        forward: bool,
    ) -> Result<Option<SectionCursor>, LoadError> {
        let step = |book: &BookInfo| {
            if forward {
                book.next_book.clone()
            } else {
                book.prev_book.clone()
            }
        };
        let mut visited = HashSet::from([from.slug.clone()]);
        let mut link = step(from);
        while let Some(slug) = link {
            if !visited.insert(slug.clone()) {
                vwarn!(book = %slug, "cycle in book order");
                return Ok(None);
            }
            let Some(book) = self.book(&slug)? else {
                vwarn!(book = %slug, "neighbor book missing from catalog");
                return Ok(None);
            };
            let keys = self.table_of_contents(&book.slug)?;
            let key = if forward { keys.first() } else { keys.last() };
            if let Some(key) = key {
                return section_cursor(&book, key).map(Some);
            }
            link = step(&book);
        }
        Ok(None)
    }

    fn book(&self, slug: &str) -> Result<Option<BookInfo>, LoadError> {
        self.store
            .book_info(slug)
            .map_err(|source| LoadError::Fetch {
                section: slug.to_owned(),
                source,
            })
    }

    fn table_of_contents(&self, slug: &str) -> Result<Vec<Vec<u32>>, LoadError> {
        let mut keys = self
            .store
            .section_keys(slug)
            .map_err(|source| LoadError::Fetch {
                section: slug.to_owned(),
                source,
            })?;
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}

fn section_cursor(book: &BookInfo, key: &[u32]) -> Result<SectionCursor, LoadError> {
    SectionCursor::new(book, key.to_vec()).map_err(|source| LoadError::InvalidSection {
        book: book.slug.clone(),
        source,
    })
}
