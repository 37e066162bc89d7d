use alloc::borrow::ToOwned;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::hash::{Hash, Hasher};

use crate::ReferenceError;

/// Maximum number of ordinals in a segment reference.
pub const MAX_DEPTH: usize = 3;

/// How a book's segments are addressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StructureType {
    /// Chapter/verse style numbering (`Genesis.1.1`).
    Verse,
    /// Talmud-style numbering where the first ordinal is an amud (`Berakhot.2a.5`).
    ///
    /// Internally the amud is a plain 1-based index: folio `n` side `a` is `2n - 1`,
    /// side `b` is `2n`. Only the wire form carries the letter.
    DafLine,
    /// Flat section numbering (`Introduction.3`).
    SectionOnly,
}

/// Book metadata supplied by the catalog collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BookInfo {
    pub slug: String,
    pub title: String,
    pub structure: StructureType,
    /// Number of ordinals in a segment reference (`1..=MAX_DEPTH`).
    pub depth: usize,
    /// Position of the book in canonical order. Used to order segments across books.
    pub canon_position: u32,
    pub prev_book: Option<String>,
    pub next_book: Option<String>,
}

impl BookInfo {
    pub fn new(slug: &str, structure: StructureType, depth: usize) -> Self {
        let slug = normalize_slug(slug);
        Self {
            title: slug.replace('_', " "),
            slug,
            structure,
            depth: depth.clamp(1, MAX_DEPTH),
            canon_position: 0,
            prev_book: None,
            next_book: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_canon_position(mut self, canon_position: u32) -> Self {
        self.canon_position = canon_position;
        self
    }

    pub fn with_neighbors(mut self, prev_book: Option<&str>, next_book: Option<&str>) -> Self {
        self.prev_book = prev_book.map(normalize_slug);
        self.next_book = next_book.map(normalize_slug);
        self
    }

    /// Number of ordinals in a section key: everything but the last segment ordinal.
    pub fn section_depth(&self) -> usize {
        self.depth.saturating_sub(1)
    }
}

/// Book metadata lookup.
///
/// Slugs passed in are already normalized (spaces replaced by underscores).
pub trait BookCatalog {
    fn book(&self, slug: &str) -> Option<BookInfo>;
}

impl<C: BookCatalog + ?Sized> BookCatalog for &C {
    fn book(&self, slug: &str) -> Option<BookInfo> {
        (**self).book(slug)
    }
}

impl<C: BookCatalog + ?Sized> BookCatalog for Arc<C> {
    fn book(&self, slug: &str) -> Option<BookInfo> {
        (**self).book(slug)
    }
}

/// A resolved address of one segment.
///
/// Equality and hashing ignore [`raw`](Self::raw): `Song of Songs.1.1` and
/// `Song_of_Songs.1.1` are the same reference.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StructuredReference {
    book_slug: String,
    ordinals: Vec<u32>,
    structure: StructureType,
    raw: String,
}

impl StructuredReference {
    /// Parses a segment reference.
    ///
    /// The number of ordinals must equal the depth the catalog declares for the book.
    pub fn parse(raw: &str, catalog: &impl BookCatalog) -> Result<Self, ReferenceError> {
        let tokens = Tokens::split(raw, catalog)?;
        tokens.expect_count(tokens.book.depth)?;
        let ordinals = tokens.ordinals()?;
        vtrace!(raw, "parsed reference");
        Ok(Self {
            book_slug: tokens.book.slug.clone(),
            ordinals,
            structure: tokens.book.structure,
            raw: tokens.raw.to_owned(),
        })
    }

    /// Builds a reference from already-numeric ordinals.
    pub fn new(book: &BookInfo, ordinals: Vec<u32>) -> Result<Self, ReferenceError> {
        let raw = Address::new(&book.slug, book.structure, &ordinals).to_string();
        if ordinals.len() != book.depth {
            return Err(ReferenceError::StructureMismatch {
                raw,
                slug: book.slug.clone(),
                expected: book.depth,
                found: ordinals.len(),
            });
        }
        if ordinals.contains(&0) {
            return Err(ReferenceError::InvalidOrdinal {
                raw,
                token: "0".to_owned(),
            });
        }
        Ok(Self {
            book_slug: book.slug.clone(),
            ordinals,
            structure: book.structure,
            raw,
        })
    }

    pub fn book_slug(&self) -> &str {
        &self.book_slug
    }

    pub fn ordinals(&self) -> &[u32] {
        &self.ordinals
    }

    pub fn structure(&self) -> StructureType {
        self.structure
    }

    /// The text this reference was parsed from (or its canonical form when built directly).
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Ordinal at `position` (0-based), if the reference is that deep.
    pub fn ordinal(&self, position: usize) -> Option<u32> {
        self.ordinals.get(position).copied()
    }

    /// Canonical wire form. `parse(serialize(r)) == r`.
    pub fn serialize(&self) -> String {
        self.to_string()
    }

    /// The key of the page this reference lives on (`Genesis.1` for `Genesis.1.1`).
    pub fn section_prefix(&self) -> String {
        self.section_cursor().prefix()
    }

    pub fn section_cursor(&self) -> SectionCursor {
        let depth = self.ordinals.len().saturating_sub(1);
        SectionCursor {
            book_slug: self.book_slug.clone(),
            ordinals: self.ordinals[..depth].to_vec(),
            structure: self.structure,
        }
    }
}

impl PartialEq for StructuredReference {
    fn eq(&self, other: &Self) -> bool {
        self.book_slug == other.book_slug
            && self.ordinals == other.ordinals
            && self.structure == other.structure
    }
}

impl Eq for StructuredReference {}

impl Hash for StructuredReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.book_slug.hash(state);
        self.ordinals.hash(state);
        self.structure.hash(state);
    }
}

impl fmt::Display for StructuredReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Address::new(&self.book_slug, self.structure, &self.ordinals), f)
    }
}

/// The key of one page: a book plus all but the last segment ordinal.
///
/// For depth-1 books the cursor has no ordinals and the whole book is one section.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SectionCursor {
    book_slug: String,
    ordinals: Vec<u32>,
    structure: StructureType,
}

impl SectionCursor {
    /// Parses a section address (`Genesis.1`, `Berakhot.2a`).
    pub fn parse(raw: &str, catalog: &impl BookCatalog) -> Result<Self, ReferenceError> {
        let tokens = Tokens::split(raw, catalog)?;
        tokens.expect_count(tokens.book.section_depth())?;
        Ok(Self {
            book_slug: tokens.book.slug.clone(),
            ordinals: tokens.ordinals()?,
            structure: tokens.book.structure,
        })
    }

    pub fn new(book: &BookInfo, ordinals: Vec<u32>) -> Result<Self, ReferenceError> {
        let cursor = Self {
            book_slug: book.slug.clone(),
            ordinals,
            structure: book.structure,
        };
        if cursor.ordinals.len() != book.section_depth() {
            return Err(ReferenceError::StructureMismatch {
                raw: cursor.prefix(),
                slug: book.slug.clone(),
                expected: book.section_depth(),
                found: cursor.ordinals.len(),
            });
        }
        if cursor.ordinals.contains(&0) {
            return Err(ReferenceError::InvalidOrdinal {
                raw: cursor.prefix(),
                token: "0".to_owned(),
            });
        }
        Ok(cursor)
    }

    pub fn book_slug(&self) -> &str {
        &self.book_slug
    }

    pub fn ordinals(&self) -> &[u32] {
        &self.ordinals
    }

    pub fn structure(&self) -> StructureType {
        self.structure
    }

    /// The section prefix string; unique per page in a window.
    pub fn prefix(&self) -> String {
        self.to_string()
    }

    /// Whether `reference` lives in this section.
    pub fn contains(&self, reference: &StructuredReference) -> bool {
        reference.book_slug == self.book_slug
            && reference.ordinals.len() == self.ordinals.len() + 1
            && reference.ordinals.starts_with(&self.ordinals)
    }
}

impl fmt::Display for SectionCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Address::new(&self.book_slug, self.structure, &self.ordinals), f)
    }
}

/// Where user input (a typed reference, a link, a table-of-contents entry) points.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Location {
    /// A single segment: open its section, then bring it into view.
    Segment(StructuredReference),
    /// The start of a section.
    Section(SectionCursor),
}

impl Location {
    /// Accepts either a full segment reference or a section address.
    pub fn parse(raw: &str, catalog: &impl BookCatalog) -> Result<Self, ReferenceError> {
        let tokens = Tokens::split(raw, catalog)?;
        let book = tokens.book.clone();
        if tokens.count() == book.section_depth() {
            return Ok(Self::Section(SectionCursor {
                ordinals: tokens.ordinals()?,
                book_slug: book.slug,
                structure: book.structure,
            }));
        }
        tokens.expect_count(book.depth)?;
        Ok(Self::Segment(StructuredReference {
            ordinals: tokens.ordinals()?,
            book_slug: book.slug,
            structure: book.structure,
            raw: tokens.raw.to_owned(),
        }))
    }

    pub fn cursor(&self) -> SectionCursor {
        match self {
            Self::Segment(reference) => reference.section_cursor(),
            Self::Section(cursor) => cursor.clone(),
        }
    }

    pub fn focus(&self) -> Option<&StructuredReference> {
        match self {
            Self::Segment(reference) => Some(reference),
            Self::Section(_) => None,
        }
    }
}

/// Replaces runs of whitespace with a single underscore and trims the ends.
pub(crate) fn normalize_slug(slug: &str) -> String {
    let mut out = String::with_capacity(slug.len());
    for (i, word) in slug.split_whitespace().enumerate() {
        if i > 0 {
            out.push('_');
        }
        out.push_str(word);
    }
    out
}

struct Tokens<'a> {
    raw: &'a str,
    book: BookInfo,
    ordinals: Vec<&'a str>,
}

impl<'a> Tokens<'a> {
    fn split(raw: &'a str, catalog: &impl BookCatalog) -> Result<Self, ReferenceError> {
        let raw = raw.trim();
        let mut parts = raw.split('.');
        let slug = normalize_slug(parts.next().unwrap_or_default());
        if slug.is_empty() {
            return Err(ReferenceError::Empty);
        }
        let book = catalog
            .book(&slug)
            .ok_or(ReferenceError::UnknownBook { slug })?;
        Ok(Self {
            raw,
            book,
            ordinals: parts.collect(),
        })
    }

    fn count(&self) -> usize {
        self.ordinals.len()
    }

    fn expect_count(&self, expected: usize) -> Result<(), ReferenceError> {
        if self.count() == expected {
            return Ok(());
        }
        Err(ReferenceError::StructureMismatch {
            raw: self.raw.to_owned(),
            slug: self.book.slug.clone(),
            expected,
            found: self.count(),
        })
    }

    fn ordinals(&self) -> Result<Vec<u32>, ReferenceError> {
        self.ordinals
            .iter()
            .enumerate()
            .map(|(position, token)| {
                parse_ordinal(self.book.structure, position, token.trim()).ok_or_else(|| {
                    ReferenceError::InvalidOrdinal {
                        raw: self.raw.to_owned(),
                        token: (*token).to_owned(),
                    }
                })
            })
            .collect()
    }
}

fn parse_ordinal(structure: StructureType, position: usize, token: &str) -> Option<u32> {
    if structure == StructureType::DafLine && position == 0 {
        return parse_amud(token);
    }
    parse_number(token)
}

fn parse_number(token: &str) -> Option<u32> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse::<u32>().ok().filter(|&n| n > 0)
}

fn parse_amud(token: &str) -> Option<u32> {
    let side = token.chars().last()?;
    let folio = parse_number(&token[..token.len() - side.len_utf8()])?;
    let base = folio.checked_mul(2)?;
    match side {
        'a' | 'A' => Some(base - 1),
        'b' | 'B' => Some(base),
        _ => None,
    }
}

struct Address<'a> {
    slug: &'a str,
    structure: StructureType,
    ordinals: &'a [u32],
}

impl<'a> Address<'a> {
    fn new(slug: &'a str, structure: StructureType, ordinals: &'a [u32]) -> Self {
        Self {
            slug,
            structure,
            ordinals,
        }
    }
}

impl fmt::Display for Address<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug)?;
        for (position, &ordinal) in self.ordinals.iter().enumerate() {
            if self.structure == StructureType::DafLine && position == 0 {
                let side = if ordinal % 2 == 1 { 'a' } else { 'b' };
                write!(f, ".{}{side}", ordinal.div_ceil(2))?;
            } else {
                write!(f, ".{ordinal}")?;
            }
        }
        Ok(())
    }
}
