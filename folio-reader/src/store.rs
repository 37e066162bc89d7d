use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use folio::{
    BookCatalog, BookInfo, ReferenceError, SectionCursor, StructureType, StructuredReference,
};

use crate::{SectionRecords, SegmentRecord, StoreError};

/// The storage collaborator the page loader reads from.
///
/// Implementations are usually thin wrappers over a remote API; any retry or timeout policy
/// lives here, not in the engine.
pub trait CorpusStore: BookCatalog {
    /// Book metadata, with lookup failures reported instead of folded into `None`.
    ///
    /// `Ok(None)` means the book does not exist. The default defers to
    /// [`BookCatalog::book`], which suits stores whose catalog cannot fail.
    fn book_info(&self, slug: &str) -> Result<Option<BookInfo>, StoreError> {
        Ok(self.book(slug))
    }

    /// All records of one section, in ordinal order, plus the owning book's metadata.
    ///
    /// A section the book does not have yields an empty record list.
    fn fetch_section(&self, cursor: &SectionCursor) -> Result<SectionRecords, StoreError>;

    /// The book's table of contents: section ordinals in canonical order.
    fn section_keys(&self, book_slug: &str) -> Result<Vec<Vec<u32>>, StoreError>;
}

impl<S: CorpusStore + ?Sized> CorpusStore for &S {
    fn book_info(&self, slug: &str) -> Result<Option<BookInfo>, StoreError> {
        (**self).book_info(slug)
    }

    fn fetch_section(&self, cursor: &SectionCursor) -> Result<SectionRecords, StoreError> {
        (**self).fetch_section(cursor)
    }

    fn section_keys(&self, book_slug: &str) -> Result<Vec<Vec<u32>>, StoreError> {
        (**self).section_keys(book_slug)
    }
}

impl<S: CorpusStore + ?Sized> CorpusStore for Arc<S> {
    fn book_info(&self, slug: &str) -> Result<Option<BookInfo>, StoreError> {
        (**self).book_info(slug)
    }

    fn fetch_section(&self, cursor: &SectionCursor) -> Result<SectionRecords, StoreError> {
        (**self).fetch_section(cursor)
    }

    fn section_keys(&self, book_slug: &str) -> Result<Vec<Vec<u32>>, StoreError> {
        (**self).section_keys(book_slug)
    }
}

type SectionMap = BTreeMap<Vec<u32>, BTreeMap<Vec<u32>, SegmentRecord>>;

/// An in-memory corpus.
///
/// Books added with [`with_book`](Self::with_book) are linked to each other in insertion
/// order, which becomes the canonical order.
#[derive(Clone, Debug, Default)]
pub struct MemoryCorpus {
    books: Vec<BookInfo>,
    index: HashMap<String, usize>,
    sections: HashMap<String, SectionMap>,
}

impl MemoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a book after the last one added.
    pub fn with_book(mut self, slug: &str, structure: StructureType, depth: usize) -> Self {
        let mut info =
            BookInfo::new(slug, structure, depth).with_canon_position(self.books.len() as u32);
        if let Some(prev) = self.books.last_mut() {
            prev.next_book = Some(info.slug.clone());
            info.prev_book = Some(prev.slug.clone());
        }
        self.push_book(info);
        self
    }

    /// Adds a book with caller-supplied metadata; neighbors are taken as given.
    pub fn with_book_info(mut self, info: BookInfo) -> Self {
        self.push_book(info);
        self
    }

    fn push_book(&mut self, info: BookInfo) {
        if let Some(&i) = self.index.get(&info.slug) {
            self.books[i] = info;
            return;
        }
        self.index.insert(info.slug.clone(), self.books.len());
        self.books.push(info);
    }

    /// Stores one segment. Replaces an existing segment with the same reference.
    pub fn insert(
        &mut self,
        reference: &str,
        primary_text: &str,
        secondary_text: Option<&str>,
    ) -> Result<StructuredReference, ReferenceError> {
        let reference = StructuredReference::parse(reference, &*self)?;
        let mut record = SegmentRecord::new(reference.serialize(), primary_text);
        record.secondary_text = secondary_text.map(str::to_owned);
        let section = reference.section_cursor().ordinals().to_vec();
        self.sections
            .entry(reference.book_slug().to_owned())
            .or_default()
            .entry(section)
            .or_default()
            .insert(reference.ordinals().to_vec(), record);
        Ok(reference)
    }

    pub fn books(&self) -> &[BookInfo] {
        &self.books
    }

    pub fn segment_count(&self) -> usize {
        self.sections
            .values()
            .flat_map(|sections| sections.values())
            .map(BTreeMap::len)
            .sum()
    }

    fn info(&self, slug: &str) -> Result<&BookInfo, StoreError> {
        self.index
            .get(slug)
            .map(|&i| &self.books[i])
            .ok_or_else(|| StoreError::NotFound(slug.to_owned()))
    }
}

impl BookCatalog for MemoryCorpus {
    fn book(&self, slug: &str) -> Option<BookInfo> {
        self.info(slug).ok().cloned()
    }
}

impl CorpusStore for MemoryCorpus {
    fn fetch_section(&self, cursor: &SectionCursor) -> Result<SectionRecords, StoreError> {
        let book = self.info(cursor.book_slug())?.clone();
        let records = self
            .sections
            .get(cursor.book_slug())
            .and_then(|sections| sections.get(cursor.ordinals()))
            .map(|segments| segments.values().cloned().collect())
            .unwrap_or_default();
        Ok(SectionRecords { book, records })
    }

    fn section_keys(&self, book_slug: &str) -> Result<Vec<Vec<u32>>, StoreError> {
        self.info(book_slug)?;
        Ok(self
            .sections
            .get(book_slug)
            .map(|sections| sections.keys().cloned().collect())
            .unwrap_or_default())
    }
}
