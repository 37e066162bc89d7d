use std::sync::Arc;

use folio::{
    Align, EstimatorConfig, ListOptions, Location, SectionCursor, SizeEstimator,
    StructuredReference, ViewportState, VirtualItem, VirtualList,
};

use crate::{
    Completion, CorpusStore, Edge, FetchKind, FetchTicket, LoadError, Page, PageLoader,
    PrefetchPolicy, ReaderError, ReaderSettings, ScrollAnchor, Segment, WindowController,
    WindowState, apply_anchor, capture_first_visible_anchor,
};

/// Called with the first visible segment's reference whenever it changes.
pub type VisibleRefCallback = Arc<dyn Fn(&StructuredReference) + Send + Sync>;

/// Called once per window and edge when that edge turns out to be the corpus boundary.
pub type BoundaryCallback = Arc<dyn Fn(Edge) + Send + Sync>;

pub struct ReaderOptions {
    pub settings: ReaderSettings,
    pub estimator: EstimatorConfig,
    pub overscan: usize,
    pub prefetch: PrefetchPolicy,
    pub on_visible_ref_changed: Option<VisibleRefCallback>,
    pub on_boundary_reached: Option<BoundaryCallback>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            settings: ReaderSettings::default(),
            estimator: EstimatorConfig::default(),
            overscan: 4,
            prefetch: PrefetchPolicy::default(),
            on_visible_ref_changed: None,
            on_boundary_reached: None,
        }
    }
}

impl Clone for ReaderOptions {
    fn clone(&self) -> Self {
        Self {
            settings: self.settings,
            estimator: self.estimator,
            overscan: self.overscan,
            prefetch: self.prefetch,
            on_visible_ref_changed: self.on_visible_ref_changed.clone(),
            on_boundary_reached: self.on_boundary_reached.clone(),
        }
    }
}

impl ReaderOptions {
    pub fn with_settings(mut self, settings: ReaderSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_estimator(mut self, estimator: EstimatorConfig) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_overscan(mut self, overscan: usize) -> Self {
        self.overscan = overscan;
        self
    }

    pub fn with_prefetch(mut self, prefetch: PrefetchPolicy) -> Self {
        self.prefetch = prefetch;
        self
    }

    pub fn on_visible_ref_changed(
        mut self,
        f: impl Fn(&StructuredReference) + Send + Sync + 'static,
    ) -> Self {
        self.on_visible_ref_changed = Some(Arc::new(f));
        self
    }

    pub fn on_boundary_reached(mut self, f: impl Fn(Edge) + Send + Sync + 'static) -> Self {
        self.on_boundary_reached = Some(Arc::new(f));
        self
    }
}

impl core::fmt::Debug for ReaderOptions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ReaderOptions")
            .field("settings", &self.settings)
            .field("estimator", &self.estimator)
            .field("overscan", &self.overscan)
            .field("prefetch", &self.prefetch)
            .field(
                "on_visible_ref_changed",
                &self.on_visible_ref_changed.is_some(),
            )
            .field("on_boundary_reached", &self.on_boundary_reached.is_some())
            .finish()
    }
}

/// The imperative handle a host UI drives.
///
/// The reader ties the window, the size cache and the prefetch policy together. It holds
/// no UI objects and never blocks: every method that wants content returns
/// [`FetchTicket`]s, and content arrives through [`complete`](Self::complete).
///
/// A host with a blocking store can simply feed each ticket to [`run`](Self::run). An async
/// host clones the store, loads `ticket.cursor()` with its own [`PageLoader`], and calls
/// `complete` when the page is ready; by then the user may have navigated elsewhere, in
/// which case the page is dropped.
pub struct Reader<S> {
    loader: PageLoader<S>,
    window: WindowController,
    list: VirtualList,
    settings: ReaderSettings,
    estimator: EstimatorConfig,
    prefetch: PrefetchPolicy,
    on_visible_ref_changed: Option<VisibleRefCallback>,
    on_boundary_reached: Option<BoundaryCallback>,
    visible_ref: Option<StructuredReference>,
    focus: Option<StructuredReference>,
    /// `(forward, backward)` boundary already reported for the current generation.
    reported: (bool, bool),
}

impl<S: CorpusStore> Reader<S> {
    pub fn new(store: S, options: ReaderOptions) -> Self {
        let estimator = SizeEstimator::new(
            options.estimator,
            options.settings.layout_mode,
            options.settings.font_size,
        );
        let fallback = estimator.estimate(0, 0);
        let list = VirtualList::new(
            ListOptions::new(0, move |_| fallback).with_overscan(options.overscan),
        );
        Self {
            loader: PageLoader::new(store),
            window: WindowController::new(),
            list,
            settings: options.settings,
            estimator: options.estimator,
            prefetch: options.prefetch,
            on_visible_ref_changed: options.on_visible_ref_changed,
            on_boundary_reached: options.on_boundary_reached,
            visible_ref: None,
            focus: None,
            reported: (false, false),
        }
    }

    pub fn loader(&self) -> &PageLoader<S> {
        &self.loader
    }

    pub fn window(&self) -> &WindowController {
        &self.window
    }

    pub fn list(&self) -> &VirtualList {
        &self.list
    }

    pub fn settings(&self) -> &ReaderSettings {
        &self.settings
    }

    pub fn state(&self) -> WindowState {
        self.window.state()
    }

    pub fn viewport_state(&self) -> ViewportState {
        self.list.viewport_state()
    }

    pub fn segments(&self) -> &[Segment] {
        self.window.segments()
    }

    pub fn estimator(&self) -> SizeEstimator {
        SizeEstimator::new(
            self.estimator,
            self.settings.layout_mode,
            self.settings.font_size,
        )
    }

    /// Parses `raw` (a segment reference or a section address) and starts a new window there.
    ///
    /// Parse failures leave the current window untouched.
    pub fn open(&mut self, raw: &str) -> Result<FetchTicket, ReaderError> {
        let location = Location::parse(raw, self.loader.store())?;
        Ok(self.open_location(location))
    }

    pub fn open_section(&mut self, cursor: SectionCursor) -> FetchTicket {
        self.open_location(Location::Section(cursor))
    }

    /// Starts a new window. A segment location is scrolled into view once its page arrives.
    pub fn open_location(&mut self, location: Location) -> FetchTicket {
        self.focus = location.focus().cloned();
        let ticket = self.window.navigate(location.cursor());
        self.reported = (false, false);
        self.sync_list(0);
        self.list.set_scroll_offset(0);
        self.refresh_visible();
        ticket
    }

    /// Loads the ticket's page. Does not touch reader state.
    pub fn fetch(&self, ticket: &FetchTicket) -> Result<Page, LoadError> {
        self.loader.load_page(ticket.cursor())
    }

    /// Fetches and completes a ticket in one go.
    pub fn run(&mut self, ticket: FetchTicket) -> Completion {
        let result = self.fetch(&ticket);
        self.complete(ticket, result)
    }

    /// Merges a fetch result into the window and brings the size cache up to date.
    ///
    /// After a prepend the scroll offset is moved so the first visible segment stays where
    /// it was on screen.
    pub fn complete(&mut self, ticket: FetchTicket, result: Result<Page, LoadError>) -> Completion {
        let anchor = match ticket.kind() {
            FetchKind::Edge(Edge::Backward) => self.capture_anchor(),
            _ => None,
        };
        let completion = self.window.complete(ticket, result);
        match completion {
            Completion::Seeded { .. } => {
                self.sync_list(0);
                self.list.set_scroll_offset(0);
                let focus = self.focus.take();
                if let Some(index) = focus.and_then(|r| self.window.index_of(&r)) {
                    self.list.scroll_to_item(index, Align::Start);
                }
            }
            Completion::Appended { .. } => {
                let loaded = self.list.count();
                self.sync_list(loaded);
            }
            Completion::Prepended { segments } => {
                self.prepend_list(segments);
                if let Some(anchor) = anchor {
                    apply_anchor(&mut self.list, &anchor, |r| self.window.index_of(r));
                }
            }
            Completion::AlreadyLoaded { .. }
            | Completion::Failed { .. }
            | Completion::Discarded => {}
        }
        self.report_boundaries();
        self.refresh_visible();
        completion
    }

    pub fn on_viewport_size(&mut self, viewport_size: u32) -> Vec<FetchTicket> {
        let offset = self.list.scroll_offset();
        self.list.set_viewport_and_scroll_clamped(viewport_size, offset);
        self.refresh_visible();
        self.prefetch()
    }

    /// Call when the UI reports a scroll offset change. Returns the fetches this scroll
    /// position calls for.
    pub fn on_scroll(&mut self, scroll_offset: u64) -> Vec<FetchTicket> {
        self.list.set_scroll_offset_clamped(scroll_offset);
        self.refresh_visible();
        self.prefetch()
    }

    /// Requests whatever the current scroll position calls for.
    ///
    /// Edges that are loading, failed, or at the corpus boundary yield nothing, so calling this
    /// repeatedly is harmless. Nothing is requested before the viewport has a size.
    pub fn prefetch(&mut self) -> Vec<FetchTicket> {
        let mut tickets = Vec::new();
        let viewport = self.list.viewport_size();
        if viewport == 0 {
            return tickets;
        }
        let offset = self.list.scroll_offset();
        if self
            .prefetch
            .wants_forward(offset, viewport, self.list.total_size())
        {
            tickets.extend(self.window.request_next());
        }
        if self.prefetch.wants_backward(offset) {
            tickets.extend(self.window.request_previous());
        }
        tickets
    }

    /// Requests the next page regardless of scroll position.
    pub fn request_next(&mut self) -> Option<FetchTicket> {
        self.window.request_next()
    }

    pub fn request_previous(&mut self) -> Option<FetchTicket> {
        self.window.request_previous()
    }

    /// Re-arms an edge stuck in the error state.
    pub fn retry(&mut self, edge: Edge) -> Option<FetchTicket> {
        self.window.retry(edge)
    }

    pub fn retry_seed(&mut self) -> Option<FetchTicket> {
        self.window.retry_seed()
    }

    /// Jumps to an item without animation. Returns the applied offset.
    pub fn scroll_to_item(&mut self, index: usize, align: Align) -> u64 {
        let offset = self.list.scroll_to_item(index, align);
        self.refresh_visible();
        offset
    }

    /// Jumps to a loaded segment. Returns `None` if it is not in the window.
    pub fn scroll_to_reference(
        &mut self,
        reference: &StructuredReference,
        align: Align,
    ) -> Option<u64> {
        let index = self.window.index_of(reference)?;
        Some(self.scroll_to_item(index, align))
    }

    /// Drops cached sizes from `index` onward, keeping the first visible segment in place.
    pub fn reset_after_index(&mut self, index: usize) {
        let anchor = self.capture_anchor();
        self.list.reset_after_index(index);
        self.restore(anchor);
    }

    /// Feeds a rendered height back. Returns the scroll adjustment the host should apply.
    pub fn measure(&mut self, index: usize, size: u32) -> i64 {
        let adjustment = self.list.measure(index, size);
        self.refresh_visible();
        adjustment
    }

    /// Applies new presentation settings. Returns `false` if nothing changed.
    ///
    /// Any change re-estimates every item from index 0; the first visible segment keeps its
    /// position.
    pub fn apply_settings(&mut self, settings: ReaderSettings) -> bool {
        if settings == self.settings {
            return false;
        }
        vdebug!(?settings, previous = ?self.settings, "settings changed");
        let anchor = self.capture_anchor();
        self.settings = settings;
        self.sync_list(0);
        self.restore(anchor);
        true
    }

    /// Reference of the first visible segment.
    pub fn visible_reference(&self) -> Option<&StructuredReference> {
        self.visible_ref.as_ref()
    }

    /// Calls `f` for every segment the host should materialize (visible plus overscan).
    pub fn for_each_visible_segment(&self, mut f: impl FnMut(VirtualItem, &Segment)) {
        self.list.for_each_virtual_item(|item| {
            if let Some(segment) = self.window.segment(item.index) {
                f(item, segment);
            }
        });
    }

    fn capture_anchor(&self) -> Option<ScrollAnchor<StructuredReference>> {
        capture_first_visible_anchor(&self.list, |index| {
            self.window.segment(index).map(|s| s.reference.clone())
        })
    }

    fn restore(&mut self, anchor: Option<ScrollAnchor<StructuredReference>>) {
        if let Some(anchor) = anchor {
            apply_anchor(&mut self.list, &anchor, |r| self.window.index_of(r));
        }
        self.refresh_visible();
    }

    /// Rebuilds the list's item source from the window. Cached sizes below `valid_prefix`
    /// survive.
    fn sync_list(&mut self, valid_prefix: usize) {
        let estimate = self.window_estimates();
        self.list.set_items(self.window.len(), estimate, valid_prefix);
    }

    /// Brings the list up to date after `added` segments landed at the front of the window.
    /// Sizes already cached, including measured ones, move along with their segments.
    fn prepend_list(&mut self, added: usize) {
        if self.list.count() + added != self.window.len() {
            self.sync_list(0);
            return;
        }
        let estimate = self.window_estimates();
        self.list.prepend_items(added, estimate);
    }

    /// Estimated height of every segment in the window, by window index.
    fn window_estimates(&self) -> impl Fn(usize) -> u32 + Send + Sync + 'static {
        let estimator = self.estimator();
        let sizes: Arc<[u32]> = self
            .window
            .segments()
            .iter()
            .map(|segment| {
                let (primary, secondary) = segment.text_chars();
                estimator.estimate(primary, secondary)
            })
            .collect();
        let fallback = estimator.estimate(0, 0);
        move |index| sizes.get(index).copied().unwrap_or(fallback)
    }

    fn refresh_visible(&mut self) {
        let visible = self.list.visible_range();
        let current = (!visible.is_empty())
            .then(|| self.window.segment(visible.start_index))
            .flatten()
            .map(|segment| &segment.reference);
        if current == self.visible_ref.as_ref() {
            return;
        }
        self.visible_ref = current.cloned();
        if let (Some(reference), Some(callback)) =
            (self.visible_ref.as_ref(), self.on_visible_ref_changed.as_ref())
        {
            vtrace!(reference = %reference, "visible reference changed");
            callback(reference);
        }
    }

    fn report_boundaries(&mut self) {
        if !self.window.is_seeded() {
            return;
        }
        for edge in [Edge::Forward, Edge::Backward] {
            let (at_boundary, reported) = match edge {
                Edge::Forward => (!self.window.has_next_page(), &mut self.reported.0),
                Edge::Backward => (!self.window.has_prev_page(), &mut self.reported.1),
            };
            if !at_boundary || *reported {
                continue;
            }
            *reported = true;
            vdebug!(?edge, "corpus boundary reached");
            if let Some(callback) = &self.on_boundary_reached {
                callback(edge);
            }
        }
    }
}
