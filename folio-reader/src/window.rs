use std::collections::VecDeque;

use folio::{SectionCursor, StructuredReference};

use crate::{LoadError, Page, Segment};

/// One end of the window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Edge {
    Forward,
    Backward,
}

/// Per-edge fetch state.
///
/// `Idle -> Loading -> Idle` on success, `Loading -> Error` on failure. `Error` only goes
/// back to `Idle` through an explicit retry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FetchStatus {
    #[default]
    Idle,
    Loading,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchKind {
    /// The first page of a new window.
    Seed,
    Edge(Edge),
}

/// A fetch the controller has committed to. The host loads `cursor` and hands the result
/// back to [`WindowController::complete`] together with this ticket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchTicket {
    kind: FetchKind,
    generation: u64,
    cursor: SectionCursor,
}

impl FetchTicket {
    pub fn kind(&self) -> FetchKind {
        self.kind
    }

    /// The window generation the ticket was issued for.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cursor(&self) -> &SectionCursor {
        &self.cursor
    }
}

/// What [`WindowController::complete`] did with a response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Completion {
    Seeded { segments: usize },
    Appended { segments: usize },
    Prepended { segments: usize },
    /// The section was already in the window; only the edge cursor moved.
    AlreadyLoaded { edge: Edge },
    Failed { kind: FetchKind, error: LoadError },
    /// The ticket belongs to an older window (or was already completed).
    Discarded,
}

/// Snapshot of the window's flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WindowState {
    pub len: usize,
    pub has_next_page: bool,
    pub has_prev_page: bool,
    pub forward: FetchStatus,
    pub backward: FetchStatus,
    pub seed: FetchStatus,
    pub generation: u64,
}

#[derive(Clone, Debug, Default)]
struct EdgeState {
    status: FetchStatus,
    cursor: Option<SectionCursor>,
}

/// Owns the window: the ordered, de-duplicated concatenation of loaded pages.
///
/// Each edge runs its own state machine, so a forward and a backward fetch may be in flight
/// together, but never two on the same edge. [`navigate`](Self::navigate) starts a new
/// generation; tickets from earlier generations are discarded on completion.
#[derive(Clone, Debug, Default)]
pub struct WindowController {
    generation: u64,
    segments: Vec<Segment>,
    /// `(section prefix, segment count)` per page, in window order.
    sections: VecDeque<(String, usize)>,
    seed: FetchStatus,
    seed_cursor: Option<SectionCursor>,
    seeded: bool,
    forward: EdgeState,
    backward: EdgeState,
}

impl WindowController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the current window and starts a new one at `cursor`.
    pub fn navigate(&mut self, cursor: SectionCursor) -> FetchTicket {
        self.generation = self.generation.wrapping_add(1);
        vdebug!(generation = self.generation, cursor = %cursor, "navigate");
        self.segments.clear();
        self.sections.clear();
        self.seeded = false;
        self.seed = FetchStatus::Loading;
        self.seed_cursor = Some(cursor.clone());
        self.forward = EdgeState::default();
        self.backward = EdgeState::default();
        FetchTicket {
            kind: FetchKind::Seed,
            generation: self.generation,
            cursor,
        }
    }

    pub fn request_next(&mut self) -> Option<FetchTicket> {
        self.request(Edge::Forward)
    }

    pub fn request_previous(&mut self) -> Option<FetchTicket> {
        self.request(Edge::Backward)
    }

    /// Issues a ticket for `edge` if the edge is idle and not at the corpus boundary.
    pub fn request(&mut self, edge: Edge) -> Option<FetchTicket> {
        if !self.seeded {
            return None;
        }
        let generation = self.generation;
        let state = self.edge_mut(edge);
        if state.status != FetchStatus::Idle {
            return None;
        }
        let cursor = state.cursor.clone()?;
        state.status = FetchStatus::Loading;
        vtrace!(?edge, generation, cursor = %cursor, "request");
        Some(FetchTicket {
            kind: FetchKind::Edge(edge),
            generation,
            cursor,
        })
    }

    /// Re-arms an edge that failed and requests it again.
    pub fn retry(&mut self, edge: Edge) -> Option<FetchTicket> {
        let state = self.edge_mut(edge);
        if state.status != FetchStatus::Error {
            return None;
        }
        state.status = FetchStatus::Idle;
        self.request(edge)
    }

    /// Re-issues the seed fetch after it failed.
    pub fn retry_seed(&mut self) -> Option<FetchTicket> {
        if self.seed != FetchStatus::Error {
            return None;
        }
        let cursor = self.seed_cursor.clone()?;
        self.seed = FetchStatus::Loading;
        Some(FetchTicket {
            kind: FetchKind::Seed,
            generation: self.generation,
            cursor,
        })
    }

    /// Merges the outcome of a fetch.
    ///
    /// Nothing from a stale ticket ever reaches the window, and a failure leaves the loaded
    /// segments untouched.
    pub fn complete(
        &mut self,
        ticket: FetchTicket,
        result: Result<Page, LoadError>,
    ) -> Completion {
        if ticket.generation != self.generation {
            vdebug!(
                ticket = ticket.generation,
                current = self.generation,
                cursor = %ticket.cursor,
                "stale response discarded"
            );
            return Completion::Discarded;
        }
        match ticket.kind {
            FetchKind::Seed => self.complete_seed(ticket, result),
            FetchKind::Edge(edge) => self.complete_edge(edge, ticket, result),
        }
    }

    fn complete_seed(&mut self, ticket: FetchTicket, result: Result<Page, LoadError>) -> Completion {
        if self.seeded
            || self.seed != FetchStatus::Loading
            || self.seed_cursor.as_ref() != Some(&ticket.cursor)
        {
            return Completion::Discarded;
        }
        match result {
            Ok(page) => {
                self.segments = page.segments;
                self.segments.dedup_by_key(|s| s.sort_key());
                self.sections.push_back((page.section_prefix, self.segments.len()));
                self.forward.cursor = page.next_cursor;
                self.backward.cursor = page.prev_cursor;
                self.seed = FetchStatus::Idle;
                self.seeded = true;
                vdebug!(cursor = %ticket.cursor, segments = self.segments.len(), "seeded");
                Completion::Seeded {
                    segments: self.segments.len(),
                }
            }
            Err(error) => {
                vwarn!(cursor = %ticket.cursor, %error, "seed failed");
                self.seed = FetchStatus::Error;
                Completion::Failed {
                    kind: FetchKind::Seed,
                    error,
                }
            }
        }
    }

    fn complete_edge(
        &mut self,
        edge: Edge,
        ticket: FetchTicket,
        result: Result<Page, LoadError>,
    ) -> Completion {
        let state = self.edge_mut(edge);
        if state.status != FetchStatus::Loading || state.cursor.as_ref() != Some(&ticket.cursor) {
            return Completion::Discarded;
        }
        let page = match result {
            Ok(page) => page,
            Err(error) => {
                vwarn!(?edge, cursor = %ticket.cursor, %error, "edge fetch failed");
                state.status = FetchStatus::Error;
                return Completion::Failed {
                    kind: FetchKind::Edge(edge),
                    error,
                };
            }
        };
        state.status = FetchStatus::Idle;
        state.cursor = match edge {
            Edge::Forward => page.next_cursor.clone(),
            Edge::Backward => page.prev_cursor.clone(),
        };
        if self.sections.iter().any(|(prefix, _)| *prefix == page.section_prefix) {
            vdebug!(?edge, section = %page.section_prefix, "section already loaded");
            return Completion::AlreadyLoaded { edge };
        }
        match edge {
            Edge::Forward => self.append(page),
            Edge::Backward => self.prepend(page),
        }
    }

    fn append(&mut self, page: Page) -> Completion {
        let before = self.segments.len();
        for segment in page.segments {
            let key = segment.sort_key();
            if self.segments.last().map(Segment::sort_key) >= Some(key) {
                vwarn!(id = %segment.id, "out-of-order segment dropped on append");
                continue;
            }
            self.segments.push(segment);
        }
        let added = self.segments.len() - before;
        self.sections.push_back((page.section_prefix, added));
        vdebug!(added, len = self.segments.len(), "appended");
        Completion::Appended { segments: added }
    }

    fn prepend(&mut self, page: Page) -> Completion {
        let first = self.segments.first().map(Segment::sort_key);
        let mut incoming: Vec<Segment> = Vec::with_capacity(page.segments.len());
        for segment in page.segments {
            let key = segment.sort_key();
            let above_window = first.is_none_or(|first| key < first);
            let ascending = incoming.last().is_none_or(|prev| prev.sort_key() < key);
            if !above_window || !ascending {
                vwarn!(id = %segment.id, "out-of-order segment dropped on prepend");
                continue;
            }
            incoming.push(segment);
        }
        let added = incoming.len();
        self.segments.splice(0..0, incoming);
        self.sections.push_front((page.section_prefix, added));
        vdebug!(added, len = self.segments.len(), "prepended");
        Completion::Prepended { segments: added }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    /// Window index of `reference`, if loaded.
    pub fn index_of(&self, reference: &StructuredReference) -> Option<usize> {
        self.segments.iter().position(|s| s.reference == *reference)
    }

    pub fn has_next_page(&self) -> bool {
        self.forward.cursor.is_some()
    }

    pub fn has_prev_page(&self) -> bool {
        self.backward.cursor.is_some()
    }

    pub fn status(&self, edge: Edge) -> FetchStatus {
        match edge {
            Edge::Forward => self.forward.status,
            Edge::Backward => self.backward.status,
        }
    }

    pub fn seed_status(&self) -> FetchStatus {
        self.seed
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// Cursor the next request on `edge` would load.
    pub fn edge_cursor(&self, edge: Edge) -> Option<&SectionCursor> {
        match edge {
            Edge::Forward => self.forward.cursor.as_ref(),
            Edge::Backward => self.backward.cursor.as_ref(),
        }
    }

    pub fn state(&self) -> WindowState {
        WindowState {
            len: self.segments.len(),
            has_next_page: self.has_next_page(),
            has_prev_page: self.has_prev_page(),
            forward: self.forward.status,
            backward: self.backward.status,
            seed: self.seed,
            generation: self.generation,
        }
    }

    /// Loaded section prefixes with their segment counts, in window order.
    pub fn sections(&self) -> impl Iterator<Item = (&str, usize)> {
        self.sections.iter().map(|(prefix, len)| (prefix.as_str(), *len))
    }

    pub fn is_strictly_ordered(&self) -> bool {
        self.segments
            .windows(2)
            .all(|pair| pair[0].sort_key() < pair[1].sort_key())
    }

    fn edge_mut(&mut self, edge: Edge) -> &mut EdgeState {
        match edge {
            Edge::Forward => &mut self.forward,
            Edge::Backward => &mut self.backward,
        }
    }
}
