use folio::{BookInfo, SectionCursor, StructuredReference};

/// One row as the storage collaborator returns it.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentRecord {
    /// Wire-format reference (`Genesis.1.1`).
    pub reference: String,
    pub primary_text: String,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub secondary_text: Option<String>,
}

impl SegmentRecord {
    pub fn new(reference: impl Into<String>, primary_text: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            primary_text: primary_text.into(),
            secondary_text: None,
        }
    }

    pub fn with_secondary(mut self, secondary_text: impl Into<String>) -> Self {
        self.secondary_text = Some(secondary_text.into());
        self
    }
}

/// The records of one section plus the metadata of the book that owns them.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SectionRecords {
    pub book: BookInfo,
    pub records: Vec<SegmentRecord>,
}

/// Total order of segments across the corpus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentKey {
    pub canon_position: u32,
    pub c1: u32,
    pub c2: u32,
    pub c3: Option<u32>,
}

/// The smallest addressable unit of text. Immutable once fetched.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Segment {
    /// Canonical wire form of `reference`.
    pub id: String,
    pub reference: StructuredReference,
    pub primary_text: String,
    pub secondary_text: Option<String>,
    pub c1: u32,
    /// `0` for depth-1 books.
    pub c2: u32,
    pub c3: Option<u32>,
    pub owner_book: String,
    pub canon_position: u32,
}

impl Segment {
    pub fn new(reference: StructuredReference, record: SegmentRecord, book: &BookInfo) -> Self {
        let ordinals = reference.ordinals();
        let c1 = ordinals.first().copied().unwrap_or(0);
        let c2 = ordinals.get(1).copied().unwrap_or(0);
        let c3 = ordinals.get(2).copied();
        Self {
            id: reference.serialize(),
            primary_text: record.primary_text,
            secondary_text: record.secondary_text,
            c1,
            c2,
            c3,
            owner_book: book.slug.clone(),
            canon_position: book.canon_position,
            reference,
        }
    }

    pub fn sort_key(&self) -> SegmentKey {
        SegmentKey {
            canon_position: self.canon_position,
            c1: self.c1,
            c2: self.c2,
            c3: self.c3,
        }
    }

    /// Lengths of the primary and secondary text, in chars.
    pub fn text_chars(&self) -> (usize, usize) {
        (
            self.primary_text.chars().count(),
            self.secondary_text.as_deref().map_or(0, |s| s.chars().count()),
        )
    }
}

/// One fetched section.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Page {
    pub book_slug: String,
    pub section_prefix: String,
    pub cursor: SectionCursor,
    /// Strictly ascending by `(c1, c2, c3)`.
    pub segments: Vec<Segment>,
    /// The following section; `None` at the end of the corpus.
    pub next_cursor: Option<SectionCursor>,
    /// The preceding section; `None` at the start of the corpus.
    pub prev_cursor: Option<SectionCursor>,
}

impl Page {
    pub fn first_reference(&self) -> Option<&StructuredReference> {
        self.segments.first().map(|s| &s.reference)
    }

    pub fn last_reference(&self) -> Option<&StructuredReference> {
        self.segments.last().map(|s| &s.reference)
    }
}
