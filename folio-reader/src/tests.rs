use crate::*;

use std::cell::Cell;
use std::sync::{Arc, Mutex};

use folio::{
    Align, BookCatalog, BookInfo, EstimatorConfig, LayoutMode, ReferenceError, SectionCursor,
    SizeEstimator, StructureType, StructuredReference,
};

#[derive(Clone, Copy, Debug)]
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 11
    }

    fn gen_range_u64(&mut self, start: u64, end_exclusive: u64) -> u64 {
        debug_assert!(start < end_exclusive);
        start + (self.next_u64() % (end_exclusive - start))
    }

    fn gen_index(&mut self, len: usize) -> usize {
        self.gen_range_u64(0, len as u64) as usize
    }
}

fn verse_text(rng: &mut Lcg) -> String {
    "word ".repeat(rng.gen_range_u64(8, 48) as usize)
}

/// Introduction, Genesis (3 chapters), Exodus (2), Leviticus (empty), Berakhot (2a..3a).
fn corpus() -> MemoryCorpus {
    let mut corpus = MemoryCorpus::new()
        .with_book("Introduction", StructureType::SectionOnly, 1)
        .with_book("Genesis", StructureType::Verse, 2)
        .with_book("Exodus", StructureType::Verse, 2)
        .with_book("Leviticus", StructureType::Verse, 2)
        .with_book("Berakhot", StructureType::DafLine, 2);
    let mut rng = Lcg::new(7);
    for n in 1..=3 {
        corpus
            .insert(&format!("Introduction.{n}"), "Preface.", None)
            .unwrap();
    }
    for chapter in 1..=3 {
        for verse in 1..=30 {
            let text = verse_text(&mut rng);
            corpus
                .insert(&format!("Genesis.{chapter}.{verse}"), &text, Some("translation"))
                .unwrap();
        }
    }
    for chapter in 1..=2 {
        for verse in 1..=20 {
            let text = verse_text(&mut rng);
            corpus
                .insert(&format!("Exodus.{chapter}.{verse}"), &text, None)
                .unwrap();
        }
    }
    for amud in ["2a", "2b", "3a"] {
        for line in 1..=5 {
            corpus
                .insert(&format!("Berakhot.{amud}.{line}"), "Mishnah.", None)
                .unwrap();
        }
    }
    corpus
}

fn cursor(corpus: &MemoryCorpus, raw: &str) -> SectionCursor {
    SectionCursor::parse(raw, corpus).unwrap()
}

fn reference(corpus: &MemoryCorpus, raw: &str) -> StructuredReference {
    StructuredReference::parse(raw, corpus).unwrap()
}

/// A reader with a laid-out viewport and a seeded window, no edge fetches issued.
fn seeded<S: CorpusStore>(store: S, raw: &str, viewport: u32) -> Reader<S> {
    let mut reader = Reader::new(store, ReaderOptions::default());
    assert!(reader.on_viewport_size(viewport).is_empty());
    let ticket = reader.open(raw).unwrap();
    assert!(matches!(reader.run(ticket), Completion::Seeded { .. }));
    reader
}

fn screen_position(reader: &Reader<impl CorpusStore>, reference: &StructuredReference) -> i64 {
    let index = reader.window().index_of(reference).unwrap();
    reader.list().item_start(index).unwrap() as i64 - reader.list().scroll_offset() as i64
}

fn ids(segments: &[Segment]) -> Vec<&str> {
    segments.iter().map(|s| s.id.as_str()).collect()
}

struct Flaky {
    corpus: MemoryCorpus,
    failing: Cell<bool>,
    fetches: Cell<usize>,
    /// A book whose catalog lookup times out.
    unreachable_book: Cell<Option<&'static str>>,
}

impl Flaky {
    fn new(corpus: MemoryCorpus) -> Self {
        Self {
            corpus,
            failing: Cell::new(false),
            fetches: Cell::new(0),
            unreachable_book: Cell::new(None),
        }
    }
}

impl BookCatalog for Flaky {
    fn book(&self, slug: &str) -> Option<BookInfo> {
        self.corpus.book(slug)
    }
}

impl CorpusStore for Flaky {
    fn book_info(&self, slug: &str) -> Result<Option<BookInfo>, StoreError> {
        if self.unreachable_book.get() == Some(slug) {
            return Err(StoreError::Unavailable(format!("catalog lookup for {slug} timed out")));
        }
        Ok(self.corpus.book(slug))
    }

    fn fetch_section(&self, cursor: &SectionCursor) -> Result<SectionRecords, StoreError> {
        self.fetches.set(self.fetches.get() + 1);
        if self.failing.get() {
            return Err(StoreError::Unavailable("offline".to_owned()));
        }
        self.corpus.fetch_section(cursor)
    }

    fn section_keys(&self, book_slug: &str) -> Result<Vec<Vec<u32>>, StoreError> {
        self.corpus.section_keys(book_slug)
    }
}

/// Returns the same records for every section.
struct Scripted {
    corpus: MemoryCorpus,
    records: Vec<SegmentRecord>,
}

impl BookCatalog for Scripted {
    fn book(&self, slug: &str) -> Option<BookInfo> {
        self.corpus.book(slug)
    }
}

impl CorpusStore for Scripted {
    fn fetch_section(&self, cursor: &SectionCursor) -> Result<SectionRecords, StoreError> {
        let book = self
            .corpus
            .book(cursor.book_slug())
            .ok_or_else(|| StoreError::NotFound(cursor.book_slug().to_owned()))?;
        Ok(SectionRecords {
            book,
            records: self.records.clone(),
        })
    }

    fn section_keys(&self, book_slug: &str) -> Result<Vec<Vec<u32>>, StoreError> {
        self.corpus.section_keys(book_slug)
    }
}

#[test]
fn memory_corpus_links_books_in_insertion_order() {
    let corpus = corpus();
    let genesis = corpus.book("Genesis").unwrap();
    assert_eq!(genesis.canon_position, 1);
    assert_eq!(genesis.prev_book.as_deref(), Some("Introduction"));
    assert_eq!(genesis.next_book.as_deref(), Some("Exodus"));
    assert_eq!(corpus.book("Introduction").unwrap().prev_book, None);
    assert_eq!(corpus.book("Berakhot").unwrap().next_book, None);
    assert_eq!(corpus.segment_count(), 3 + 90 + 40 + 15);

    assert_eq!(
        corpus.section_keys("Genesis").unwrap(),
        vec![vec![1], vec![2], vec![3]]
    );
    assert_eq!(corpus.section_keys("Introduction").unwrap(), vec![Vec::<u32>::new()]);
    assert!(corpus.section_keys("Leviticus").unwrap().is_empty());
    assert_eq!(
        corpus.section_keys("Numbers"),
        Err(StoreError::NotFound("Numbers".to_owned()))
    );
}

#[test]
fn memory_corpus_rejects_bad_references_and_tolerates_missing_sections() {
    let mut corpus = corpus();
    assert!(matches!(
        corpus.insert("Numbers.1.1", "x", None),
        Err(ReferenceError::UnknownBook { .. })
    ));
    assert!(matches!(
        corpus.insert("Genesis.1", "x", None),
        Err(ReferenceError::StructureMismatch { .. })
    ));

    let missing = corpus.fetch_section(&cursor(&corpus, "Genesis.9")).unwrap();
    assert_eq!(missing.book.slug, "Genesis");
    assert!(missing.records.is_empty());

    let replaced = corpus.insert("Genesis.1.1", "In the beginning", None).unwrap();
    assert_eq!(replaced.serialize(), "Genesis.1.1");
    let first = corpus.fetch_section(&cursor(&corpus, "Genesis.1")).unwrap();
    assert_eq!(first.records.len(), 30);
    assert_eq!(first.records[0].primary_text, "In the beginning");
    assert_eq!(first.records[0].secondary_text, None);
}

#[test]
fn page_holds_one_section_in_order_with_neighbors() {
    let corpus = corpus();
    let loader = PageLoader::new(&corpus);
    let page = loader.load_page(&cursor(&corpus, "Genesis.2")).unwrap();
    assert_eq!(page.book_slug, "Genesis");
    assert_eq!(page.section_prefix, "Genesis.2");
    assert_eq!(page.segments.len(), 30);
    assert_eq!(page.first_reference().unwrap().serialize(), "Genesis.2.1");
    assert_eq!(page.last_reference().unwrap().serialize(), "Genesis.2.30");
    assert!(page.segments.windows(2).all(|w| w[0].sort_key() < w[1].sort_key()));
    assert_eq!(page.next_cursor.unwrap().prefix(), "Genesis.3");
    assert_eq!(page.prev_cursor.unwrap().prefix(), "Genesis.1");

    let segment = &page.segments[4];
    assert_eq!(segment.id, "Genesis.2.5");
    assert_eq!((segment.c1, segment.c2, segment.c3), (2, 5, None));
    assert_eq!(segment.owner_book, "Genesis");
    assert_eq!(segment.secondary_text.as_deref(), Some("translation"));
}

#[test]
fn next_page_crosses_into_the_following_book() {
    let mut corpus = MemoryCorpus::new()
        .with_book("Genesis", StructureType::Verse, 2)
        .with_book("Exodus", StructureType::Verse, 2);
    corpus.insert("Genesis.1.1", "In the beginning", None).unwrap();
    corpus.insert("Genesis.1.2", "And the earth was without form", None).unwrap();
    corpus.insert("Exodus.1.1", "Now these are the names", None).unwrap();
    corpus.insert("Exodus.1.2", "Reuben, Simeon, Levi", None).unwrap();

    let mut reader = seeded(&corpus, "Genesis.1", 600);
    assert!(reader.state().has_next_page);
    assert!(!reader.state().has_prev_page);
    let next = reader.request_next().unwrap();
    assert_eq!(next.cursor().prefix(), "Exodus.1");
    assert_eq!(reader.run(next), Completion::Appended { segments: 2 });
    assert_eq!(
        ids(reader.segments()),
        ["Genesis.1.1", "Genesis.1.2", "Exodus.1.1", "Exodus.1.2"]
    );
    assert!(!reader.state().has_next_page);
    assert!(reader.window().is_strictly_ordered());
}

#[test]
fn neighbors_skip_books_without_sections_and_stop_at_corpus_edges() {
    let corpus = corpus();
    let loader = PageLoader::new(&corpus);

    let exodus = loader.load_page(&cursor(&corpus, "Exodus.2")).unwrap();
    assert_eq!(exodus.next_cursor.unwrap().prefix(), "Berakhot.2a");

    let berakhot = loader.load_page(&cursor(&corpus, "Berakhot.2a")).unwrap();
    assert_eq!(berakhot.prev_cursor.unwrap().prefix(), "Exodus.2");
    assert_eq!(berakhot.next_cursor.unwrap().prefix(), "Berakhot.2b");

    let last = loader.load_page(&cursor(&corpus, "Berakhot.3a")).unwrap();
    assert_eq!(last.next_cursor, None);

    let first = loader.load_page(&cursor(&corpus, "Introduction")).unwrap();
    assert_eq!(first.prev_cursor, None);
    assert_eq!(first.next_cursor.unwrap().prefix(), "Genesis.1");
    assert_eq!(ids(&first.segments), ["Introduction.1", "Introduction.2", "Introduction.3"]);

    let genesis = loader.load_page(&cursor(&corpus, "Genesis.1")).unwrap();
    assert_eq!(genesis.prev_cursor.unwrap().prefix(), "Introduction");
}

#[test]
fn loader_sorts_dedups_and_drops_foreign_records() {
    let store = Scripted {
        corpus: corpus(),
        records: vec![
            SegmentRecord::new("Genesis.1.3", "third"),
            SegmentRecord::new("Genesis.1.1", "first"),
            SegmentRecord::new("Genesis.2.1", "elsewhere"),
            SegmentRecord::new("Genesis.1.2", "second"),
            SegmentRecord::new("Genesis.1.1", "first again"),
        ],
    };
    let loader = PageLoader::new(&store);
    let page = loader
        .load_page(&SectionCursor::parse("Genesis.1", &store).unwrap())
        .unwrap();
    assert_eq!(ids(&page.segments), ["Genesis.1.1", "Genesis.1.2", "Genesis.1.3"]);
    assert_eq!(page.segments[0].primary_text, "first");
}

#[test]
fn loader_errors() {
    let store = Scripted {
        corpus: corpus(),
        records: vec![SegmentRecord::new("Genesis.1.x", "garbled")],
    };
    let loader = PageLoader::new(&store);
    let err = loader
        .load_page(&SectionCursor::parse("Genesis.1", &store).unwrap())
        .unwrap_err();
    assert!(matches!(
        err,
        LoadError::CorruptRecord { ref section, ref raw, .. }
            if section == "Genesis.1" && raw == "Genesis.1.x"
    ));

    let corpus = corpus();
    let loader = PageLoader::new(&corpus);
    let numbers = BookInfo::new("Numbers", StructureType::Verse, 2);
    let err = loader
        .load_page(&SectionCursor::new(&numbers, vec![1]).unwrap())
        .unwrap_err();
    assert_eq!(err, LoadError::UnknownBook("Numbers".to_owned()));

    let flaky = Flaky::new(corpus);
    flaky.failing.set(true);
    let loader = PageLoader::new(&flaky);
    let err = loader
        .load_page(&cursor(&flaky.corpus, "Genesis.1"))
        .unwrap_err();
    assert_eq!(
        err,
        LoadError::Fetch {
            section: "Genesis.1".to_owned(),
            source: StoreError::Unavailable("offline".to_owned()),
        }
    );
    assert_eq!(flaky.fetches.get(), 1);
}

#[test]
fn window_stitches_pages_in_both_directions() {
    let corpus = corpus();
    let loader = PageLoader::new(&corpus);
    let mut window = WindowController::new();
    let run = |window: &mut WindowController, ticket: FetchTicket| {
        let page = loader.load_page(ticket.cursor());
        window.complete(ticket, page)
    };

    let seed = window.navigate(cursor(&corpus, "Genesis.2"));
    assert_eq!(window.seed_status(), FetchStatus::Loading);
    assert!(window.request_next().is_none());
    assert_eq!(run(&mut window, seed), Completion::Seeded { segments: 30 });

    let next = window.request_next().unwrap();
    let prev = window.request_previous().unwrap();
    assert_eq!(run(&mut window, prev), Completion::Prepended { segments: 30 });
    assert_eq!(run(&mut window, next), Completion::Appended { segments: 30 });

    let sections: Vec<_> = window.sections().collect();
    assert_eq!(sections, [("Genesis.1", 30), ("Genesis.2", 30), ("Genesis.3", 30)]);
    assert_eq!(window.len(), 90);
    assert!(window.is_strictly_ordered());
    assert_eq!(window.segment(0).unwrap().id, "Genesis.1.1");
    assert_eq!(
        window.index_of(&reference(&corpus, "Genesis.3.1")),
        Some(60)
    );

    let state = window.state();
    assert!(state.has_next_page && state.has_prev_page);
    assert_eq!((state.forward, state.backward), (FetchStatus::Idle, FetchStatus::Idle));
    assert_eq!(window.edge_cursor(Edge::Forward).unwrap().prefix(), "Exodus.1");
    assert_eq!(window.edge_cursor(Edge::Backward).unwrap().prefix(), "Introduction");
}

#[test]
fn one_fetch_in_flight_per_edge() {
    let corpus = corpus();
    let mut reader = seeded(&corpus, "Genesis.2", 600);

    let forward = reader.request_next().unwrap();
    assert!(reader.request_next().is_none());
    assert_eq!(reader.state().forward, FetchStatus::Loading);

    // The backward edge has its own cursor chain.
    let backward = reader.request_previous().unwrap();
    assert!(reader.request_previous().is_none());

    assert!(matches!(reader.run(backward), Completion::Prepended { .. }));
    assert_eq!(reader.state().forward, FetchStatus::Loading);
    assert!(matches!(reader.run(forward), Completion::Appended { .. }));
    assert!(reader.window().is_strictly_ordered());
}

#[test]
fn repeated_sections_are_not_merged_twice() {
    let corpus = corpus();
    let loader = PageLoader::new(&corpus);
    let mut window = WindowController::new();

    let seed = window.navigate(cursor(&corpus, "Genesis.1"));
    let first = loader.load_page(seed.cursor()).unwrap();
    window.complete(seed, Ok(first));

    let next = window.request_next().unwrap();
    let second = loader.load_page(next.cursor()).unwrap();
    assert_eq!(
        window.complete(next.clone(), Ok(second.clone())),
        Completion::Appended { segments: 30 }
    );
    assert_eq!(window.complete(next, Ok(second.clone())), Completion::Discarded);

    let again = window.request_next().unwrap();
    assert_eq!(
        window.complete(again, Ok(second)),
        Completion::AlreadyLoaded { edge: Edge::Forward }
    );
    assert_eq!(window.len(), 60);
    assert_eq!(window.sections().count(), 2);
    assert_eq!(window.status(Edge::Forward), FetchStatus::Idle);
}

#[test]
fn navigation_discards_responses_for_the_old_window() {
    let corpus = corpus();
    let mut reader = Reader::new(&corpus, ReaderOptions::default());
    reader.on_viewport_size(600);

    let a = reader.open("Genesis.1").unwrap();
    let a_page = reader.fetch(&a);
    let b = reader.open("Exodus.1").unwrap();
    assert_eq!(reader.complete(a, a_page), Completion::Discarded);
    assert!(reader.segments().is_empty());
    assert_eq!(reader.run(b), Completion::Seeded { segments: 20 });
    assert!(reader.segments().iter().all(|s| s.owner_book == "Exodus"));

    // Edge fetches are stamped too.
    let next = reader.request_next().unwrap();
    let next_page = reader.fetch(&next);
    let c = reader.open("Berakhot.2a").unwrap();
    reader.run(c);
    assert_eq!(reader.complete(next, next_page), Completion::Discarded);
    assert!(reader.segments().iter().all(|s| s.owner_book == "Berakhot"));
    assert_eq!(reader.state().forward, FetchStatus::Idle);
}

#[test]
fn failed_edge_waits_for_explicit_retry() {
    let store = Flaky::new(corpus());
    let mut reader = seeded(&store, "Genesis.1", 600);
    let loaded = ids(reader.segments()).join(",");

    store.failing.set(true);
    let ticket = reader.request_next().unwrap();
    match reader.run(ticket) {
        Completion::Failed {
            kind: FetchKind::Edge(Edge::Forward),
            error: LoadError::Fetch { section, .. },
        } => assert_eq!(section, "Genesis.2"),
        other => panic!("unexpected completion: {other:?}"),
    }
    assert_eq!(reader.state().forward, FetchStatus::Error);
    assert_eq!(ids(reader.segments()).join(","), loaded);

    let bottom = reader.list().max_scroll_offset();
    assert!(reader.on_scroll(bottom).is_empty());
    assert!(reader.request_next().is_none());

    store.failing.set(false);
    assert!(reader.retry(Edge::Backward).is_none());
    let ticket = reader.retry(Edge::Forward).unwrap();
    assert_eq!(ticket.cursor().prefix(), "Genesis.2");
    assert!(matches!(reader.run(ticket), Completion::Appended { segments: 30 }));
    assert_eq!(reader.state().forward, FetchStatus::Idle);
}

#[test]
fn failed_neighbor_book_lookup_is_not_a_boundary() {
    let store = Flaky::new(corpus());
    let boundaries = Arc::new(Mutex::new(Vec::new()));
    let sink = boundaries.clone();
    let options = ReaderOptions::default().on_boundary_reached(move |edge| {
        sink.lock().unwrap().push(edge);
    });
    let mut reader = Reader::new(&store, options);
    reader.on_viewport_size(600);
    let seed = reader.open("Genesis.2").unwrap();
    assert!(matches!(reader.run(seed), Completion::Seeded { .. }));

    // Genesis.3 is the last chapter, so its page has to look up Exodus.
    store.unreachable_book.set(Some("Exodus"));
    let ticket = reader.request_next().unwrap();
    match reader.run(ticket) {
        Completion::Failed {
            kind: FetchKind::Edge(Edge::Forward),
            error: LoadError::Fetch { section, .. },
        } => assert_eq!(section, "Exodus"),
        other => panic!("unexpected completion: {other:?}"),
    }
    assert_eq!(reader.state().forward, FetchStatus::Error);
    assert!(reader.state().has_next_page);
    assert!(boundaries.lock().unwrap().is_empty());

    store.unreachable_book.set(None);
    let ticket = reader.retry(Edge::Forward).unwrap();
    assert_eq!(ticket.cursor().prefix(), "Genesis.3");
    assert!(matches!(reader.run(ticket), Completion::Appended { segments: 30 }));
    assert_eq!(
        reader.window().edge_cursor(Edge::Forward).map(SectionCursor::prefix),
        Some("Exodus.1".to_owned())
    );
    assert!(boundaries.lock().unwrap().is_empty());
}

#[test]
fn failed_seed_can_be_retried() {
    let store = Flaky::new(corpus());
    store.failing.set(true);
    let mut reader = Reader::new(&store, ReaderOptions::default());
    let ticket = reader.open("Genesis.3.4").unwrap();
    assert!(matches!(
        reader.run(ticket),
        Completion::Failed { kind: FetchKind::Seed, .. }
    ));
    assert_eq!(reader.state().seed, FetchStatus::Error);
    assert!(reader.request_next().is_none());

    store.failing.set(false);
    let ticket = reader.retry_seed().unwrap();
    assert!(reader.retry_seed().is_none());
    assert_eq!(reader.run(ticket), Completion::Seeded { segments: 30 });
    assert!(reader.window().is_seeded());
}

#[test]
fn parse_errors_leave_the_window_alone() {
    let corpus = corpus();
    let mut reader = seeded(&corpus, "Genesis.1", 600);
    let generation = reader.state().generation;

    assert!(matches!(
        reader.open("Genesis.x"),
        Err(ReaderError::Reference(ReferenceError::InvalidOrdinal { .. }))
    ));
    assert!(matches!(
        reader.open("Genesis.1.1.1"),
        Err(ReaderError::Reference(ReferenceError::StructureMismatch { .. }))
    ));
    assert!(matches!(
        reader.open("Numbers.1"),
        Err(ReaderError::Reference(ReferenceError::UnknownBook { .. }))
    ));
    assert_eq!(reader.state().generation, generation);
    assert_eq!(reader.segments().len(), 30);
}

#[test]
fn scrolling_near_the_end_requests_exactly_one_page() {
    let corpus = corpus();
    let mut reader = seeded(&corpus, "Genesis.1", 600);
    let total = reader.list().total_size();

    let tickets = reader.on_scroll(total * 85 / 100);
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].kind(), FetchKind::Edge(Edge::Forward));
    assert_eq!(tickets[0].cursor().prefix(), "Genesis.2");

    // A second trigger while the first is in flight.
    let offset = reader.list().scroll_offset();
    assert!(reader.on_scroll(offset - 10).is_empty());
    assert!(reader.prefetch().is_empty());

    let ticket = tickets.into_iter().next().unwrap();
    assert!(matches!(reader.run(ticket), Completion::Appended { .. }));
    assert_eq!(reader.list().count(), 60);
}

#[test]
fn scrolling_near_the_top_requests_the_previous_page() {
    let corpus = corpus();
    let mut reader = seeded(&corpus, "Genesis.3", 600);
    assert!(reader.on_scroll(400).is_empty());
    let tickets = reader.on_scroll(120);
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].kind(), FetchKind::Edge(Edge::Backward));
    assert_eq!(tickets[0].cursor().prefix(), "Genesis.2");
}

#[test]
fn prepend_keeps_the_first_visible_segment_in_place() {
    let corpus = corpus();
    let mut reader = seeded(&corpus, "Genesis.2", 600);

    let tickets = reader.on_scroll(150);
    let backward = tickets
        .into_iter()
        .find(|t| t.kind() == FetchKind::Edge(Edge::Backward))
        .unwrap();
    let anchor = reader.visible_reference().cloned().unwrap();
    let before = screen_position(&reader, &anchor);
    let offset_before = reader.list().scroll_offset();

    assert_eq!(reader.run(backward), Completion::Prepended { segments: 30 });
    assert_eq!(reader.visible_reference(), Some(&anchor));
    assert_eq!(screen_position(&reader, &anchor), before);
    let prepended = reader.list().item_start(30).unwrap();
    assert_eq!(reader.list().scroll_offset(), offset_before + prepended);
}

#[test]
fn prepend_without_a_viewport_keeps_the_top_segment() {
    let corpus = corpus();
    let mut reader = Reader::new(&corpus, ReaderOptions::default());
    let seed = reader.open("Genesis.2").unwrap();
    reader.run(seed);
    let top = reader.segments()[0].reference.clone();

    let prev = reader.request_previous().unwrap();
    reader.run(prev);
    assert_eq!(screen_position(&reader, &top), 0);
}

#[test]
fn anchor_capture_without_a_viewport_uses_the_top_item() {
    let mut list = folio::VirtualList::new(folio::ListOptions::new(5, |_| 10));
    let anchor = capture_first_visible_anchor(&list, |index| Some(index)).unwrap();
    assert_eq!((anchor.key, anchor.offset_in_viewport), (0, 0));

    list.set_viewport_and_scroll_clamped(20, 15);
    let anchor = capture_first_visible_anchor(&list, |index| Some(index)).unwrap();
    assert_eq!((anchor.key, anchor.offset_in_viewport), (1, 5));

    // The item grew; the anchor still lands 5 px into it.
    list.measure(1, 40);
    assert!(apply_anchor(&mut list, &anchor, |&key| Some(key)));
    assert_eq!(list.scroll_offset(), 15);

    let empty = folio::VirtualList::new(folio::ListOptions::new(0, |_| 10));
    assert!(capture_first_visible_anchor(&empty, |index| Some(index)).is_none());
}

#[test]
fn prepend_keeps_measured_rows_in_place() {
    let corpus = corpus();
    let mut reader = seeded(&corpus, "Genesis.2", 600);
    for index in 0..4 {
        reader.measure(index, 400);
    }
    let tickets = reader.on_scroll(150);
    let backward = tickets
        .into_iter()
        .find(|t| t.kind() == FetchKind::Edge(Edge::Backward))
        .unwrap();

    let top = reference(&corpus, "Genesis.2.1");
    let below = reference(&corpus, "Genesis.2.2");
    assert_eq!(reader.visible_reference(), Some(&top));
    let top_before = screen_position(&reader, &top);
    let below_before = screen_position(&reader, &below);
    assert_eq!((top_before, below_before), (-150, 250));

    assert_eq!(reader.run(backward), Completion::Prepended { segments: 30 });
    assert_eq!(screen_position(&reader, &top), top_before);
    assert_eq!(screen_position(&reader, &below), below_before);
    for index in 30..34 {
        assert!(reader.list().is_measured(index));
        assert_eq!(reader.list().item_size(index), Some(400));
    }
    assert!(!reader.list().is_measured(0));
}

#[test]
fn opening_a_segment_scrolls_it_into_view() {
    let corpus = corpus();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let options = ReaderOptions::default()
        .on_visible_ref_changed(move |r| sink.lock().unwrap().push(r.serialize()));
    let mut reader = Reader::new(&corpus, options);
    reader.on_viewport_size(600);

    let ticket = reader.open("Genesis.2.10").unwrap();
    assert_eq!(ticket.cursor().prefix(), "Genesis.2");
    reader.run(ticket);
    let target = reference(&corpus, "Genesis.2.10");
    assert_eq!(reader.visible_reference(), Some(&target));
    assert_eq!(screen_position(&reader, &target), 0);
    assert_eq!(*seen.lock().unwrap(), ["Genesis.2.10"]);

    let first = reference(&corpus, "Genesis.2.1");
    assert_eq!(reader.scroll_to_reference(&first, Align::Start), Some(0));
    assert_eq!(*seen.lock().unwrap(), ["Genesis.2.10", "Genesis.2.1"]);
    assert_eq!(
        reader.scroll_to_reference(&reference(&corpus, "Exodus.1.1"), Align::Start),
        None
    );
}

#[test]
fn boundary_is_reported_once_per_window() {
    let corpus = corpus();
    let edges = Arc::new(Mutex::new(Vec::new()));
    let sink = edges.clone();
    let options = ReaderOptions::default().on_boundary_reached(move |e| sink.lock().unwrap().push(e));
    let mut reader = Reader::new(&corpus, options);
    reader.on_viewport_size(600);

    let seed = reader.open("Introduction").unwrap();
    reader.run(seed);
    assert_eq!(*edges.lock().unwrap(), [Edge::Backward]);
    assert!(!reader.state().has_prev_page);

    // Three short segments do not fill the viewport.
    let tickets = reader.prefetch();
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].kind(), FetchKind::Edge(Edge::Forward));
    for ticket in tickets {
        reader.run(ticket);
    }
    assert_eq!(*edges.lock().unwrap(), [Edge::Backward]);

    let seed = reader.open("Introduction").unwrap();
    reader.run(seed);
    assert_eq!(*edges.lock().unwrap(), [Edge::Backward, Edge::Backward]);

    let seed = reader.open("Berakhot.3a").unwrap();
    reader.run(seed);
    assert_eq!(
        *edges.lock().unwrap(),
        [Edge::Backward, Edge::Backward, Edge::Forward]
    );
}

#[test]
fn daf_pages_follow_amud_order() {
    let corpus = corpus();
    let mut reader = seeded(&corpus, "Berakhot.2a", 600);
    while let Some(ticket) = reader.request_next() {
        reader.run(ticket);
    }
    let sections: Vec<_> = reader.window().sections().map(|(p, _)| p.to_owned()).collect();
    assert_eq!(sections, ["Berakhot.2a", "Berakhot.2b", "Berakhot.3a"]);
    assert_eq!(reader.segments()[5].id, "Berakhot.2b.1");
    assert_eq!(reader.segments()[5].c1, 4);
    assert!(reader.window().is_strictly_ordered());

    let prev = reader.request_previous().unwrap();
    assert_eq!(prev.cursor().prefix(), "Exodus.2");
    reader.run(prev);
    assert!(reader.window().is_strictly_ordered());
    assert_eq!(reader.segments()[0].id, "Exodus.2.1");
}

#[test]
fn font_size_change_resets_the_whole_size_cache() {
    let corpus = corpus();
    let mut reader = seeded(&corpus, "Genesis.1", 600);
    reader.measure(0, 500);
    reader.measure(3, 10);
    let epoch = reader.list().layout_epoch();

    let larger = reader.settings().with_font_size(24);
    assert!(reader.apply_settings(larger));
    assert!(reader.list().layout_epoch() > epoch);

    let estimator = SizeEstimator::new(EstimatorConfig::default(), LayoutMode::SingleColumn, 24);
    for (i, segment) in reader.segments().iter().enumerate() {
        let (primary, secondary) = segment.text_chars();
        assert!(!reader.list().is_measured(i));
        assert_eq!(
            reader.list().item_size(i),
            Some(estimator.estimate(primary, secondary))
        );
    }
    let epoch = reader.list().layout_epoch();
    assert!(!reader.apply_settings(larger));
    assert_eq!(reader.list().layout_epoch(), epoch);
}

#[test]
fn layout_and_theme_changes_keep_the_reading_position() {
    let corpus = corpus();
    let mut reader = seeded(&corpus, "Genesis.1", 600);
    reader.on_scroll(700);
    let anchor = reader.visible_reference().cloned().unwrap();
    let before = screen_position(&reader, &anchor);
    let single_total = reader.list().total_size();

    let dual = reader.settings().with_layout_mode(LayoutMode::DualColumn);
    assert!(reader.apply_settings(dual));
    assert!(reader.list().total_size() >= single_total);
    assert_eq!(reader.visible_reference(), Some(&anchor));
    assert_eq!(screen_position(&reader, &anchor), before);

    let epoch = reader.list().layout_epoch();
    assert!(reader.apply_settings(dual.with_theme(Theme::Dark)));
    assert!(reader.list().layout_epoch() > epoch);
}

#[test]
fn reset_after_index_keeps_the_reading_position() {
    let corpus = corpus();
    let mut reader = seeded(&corpus, "Genesis.1", 600);
    reader.on_scroll(500);
    for index in 0..3 {
        reader.measure(index, 200);
    }
    let anchor = reader.visible_reference().cloned().unwrap();
    let before = screen_position(&reader, &anchor);

    reader.reset_after_index(0);
    assert!(!reader.list().is_measured(0));
    assert_eq!(reader.visible_reference(), Some(&anchor));
    assert_eq!(screen_position(&reader, &anchor), before);
}

#[test]
fn visible_slice_covers_viewport_plus_overscan() {
    let corpus = corpus();
    let mut reader = seeded(&corpus, "Genesis.1", 300);
    reader.on_scroll(600);
    let visible = reader.list().visible_range();

    let mut seen = Vec::new();
    reader.for_each_visible_segment(|item, segment| {
        assert_eq!(reader.segments()[item.index].id, segment.id);
        seen.push(item.index);
    });
    assert_eq!(seen.first().copied(), Some(visible.start_index.saturating_sub(4)));
    assert_eq!(seen.last().copied(), Some((visible.end_index + 4).min(30) - 1));
    assert!(seen.windows(2).all(|w| w[1] == w[0] + 1));

    let state = reader.viewport_state();
    assert_eq!(state.visible_start_index, visible.start_index);
    assert_eq!(state.scroll_offset, 600);
}

#[test]
fn random_scrolling_and_navigation_keep_the_window_consistent() {
    let corpus = corpus();
    let starts = [
        "Introduction",
        "Genesis.1",
        "Genesis.2.15",
        "Genesis.3",
        "Exodus.1",
        "Exodus.2.20",
        "Berakhot.2b",
    ];
    let mut rng = Lcg::new(42);
    let mut reader = Reader::new(&corpus, ReaderOptions::default());
    reader.on_viewport_size(500);
    let mut pending: Vec<(FetchTicket, Result<Page, LoadError>)> = Vec::new();

    let seed = reader.open("Genesis.2").unwrap();
    let page = reader.fetch(&seed);
    pending.push((seed, page));

    for _ in 0..500 {
        match rng.gen_range_u64(0, 20) {
            0 => {
                let ticket = reader.open(starts[rng.gen_index(starts.len())]).unwrap();
                let page = reader.fetch(&ticket);
                pending.push((ticket, page));
            }
            1..=8 if !pending.is_empty() => {
                let (ticket, page) = pending.swap_remove(rng.gen_index(pending.len()));
                let stale = ticket.generation() != reader.state().generation;
                let completion = reader.complete(ticket, page);
                if stale {
                    assert_eq!(completion, Completion::Discarded);
                }
            }
            _ => {
                let offset = rng.gen_range_u64(0, reader.list().max_scroll_offset() + 1);
                for ticket in reader.on_scroll(offset) {
                    let page = reader.fetch(&ticket);
                    pending.push((ticket, page));
                }
            }
        }

        let window = reader.window();
        assert!(window.is_strictly_ordered());
        let mut sections: Vec<_> = window.sections().map(|(p, _)| p).collect();
        let loaded: usize = window.sections().map(|(_, n)| n).sum();
        assert_eq!(loaded, window.len());
        sections.sort_unstable();
        sections.dedup();
        assert_eq!(sections.len(), window.sections().count());
        assert_eq!(reader.list().count(), window.len());
    }
}

#[cfg(feature = "serde")]
#[test]
fn settings_serialize_with_defaults() {
    let settings = ReaderSettings::default()
        .with_theme(Theme::Sepia)
        .with_layout_mode(LayoutMode::DualColumn)
        .with_font_size(24);
    let json = serde_json::to_string(&settings).unwrap();
    assert_eq!(
        json,
        r#"{"theme":"sepia","layout_mode":"dual_column","font_size":24}"#
    );
    let back: ReaderSettings = serde_json::from_str(&json).unwrap();
    assert_eq!(back, settings);

    let partial: ReaderSettings = serde_json::from_str(r#"{"font_size":18}"#).unwrap();
    assert_eq!(partial, ReaderSettings::default().with_font_size(18));
}
