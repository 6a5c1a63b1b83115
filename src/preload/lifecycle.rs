//! Per-image lazy-load state machine
//!
//! ```text
//! Idle -> InView -> UrlResolved -> Loaded
//!                              \-> Errored
//! ```
//!
//! An element enters view when a visibility event reports it within the
//! root margin, or immediately when marked priority. An unavailable URL or
//! a failed load ends in `Errored`, which shows the placeholder and is never
//! retried.

use std::collections::HashMap;
use std::sync::Mutex;

use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use futures::{Stream, StreamExt};
use log::{debug, trace};
use serde::Serialize;

use super::ImageFetcher;
use crate::client::SettingsStore;
use crate::delivery::ImageDelivery;
use crate::image::{ImageReference, Placeholder, ResolveOptions, Resolved};

/// Smallest accepted root margin in pixels
pub const MIN_ROOT_MARGIN_PX: u32 = 20;

/// Largest accepted root margin in pixels, also the default
pub const MAX_ROOT_MARGIN_PX: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "url", rename_all = "snake_case")]
pub enum LoadState {
    Idle,
    InView,
    UrlResolved(String),
    Loaded(String),
    Errored,
}

impl LoadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoadState::Loaded(_) | LoadState::Errored)
    }
}

/// State holder for one image element.
///
/// Every transition returns whether it was applied. Out-of-order events
/// leave the state untouched.
#[derive(Debug, Clone)]
pub struct ImageSlot {
    state: LoadState,
}

impl Default for ImageSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageSlot {
    pub fn new() -> Self {
        Self {
            state: LoadState::Idle,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn enter_view(&mut self) -> bool {
        if self.state != LoadState::Idle {
            return false;
        }
        self.state = LoadState::InView;
        true
    }

    /// Record the builder's answer. `Unavailable` goes straight to `Errored`.
    pub fn url_resolved(&mut self, resolved: Resolved) -> bool {
        if self.state != LoadState::InView {
            return false;
        }
        self.state = match resolved {
            Resolved::Url(url) => LoadState::UrlResolved(url),
            Resolved::Unavailable => LoadState::Errored,
        };
        true
    }

    pub fn loaded(&mut self) -> bool {
        match std::mem::replace(&mut self.state, LoadState::Idle) {
            LoadState::UrlResolved(url) => {
                self.state = LoadState::Loaded(url);
                true
            }
            other => {
                self.state = other;
                false
            }
        }
    }

    pub fn failed(&mut self) -> bool {
        if !matches!(self.state, LoadState::UrlResolved(_)) {
            return false;
        }
        self.state = LoadState::Errored;
        true
    }

    /// What to render in place of the image, if anything
    pub fn placeholder(&self) -> Option<Placeholder> {
        match self.state {
            LoadState::Errored => Some(Placeholder::unavailable()),
            _ => None,
        }
    }
}

/// Distance report for an observed element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityEvent {
    /// Pixels between the element and the viewport edge; zero or less when
    /// the element intersects the viewport
    pub distance_px: i64,
}

impl VisibilityEvent {
    pub fn intersecting() -> Self {
        Self { distance_px: 0 }
    }

    pub fn at(distance_px: i64) -> Self {
        Self { distance_px }
    }

    pub fn within(&self, margin_px: u32) -> bool {
        self.distance_px <= i64::from(margin_px)
    }
}

/// Platform visibility primitive.
///
/// Dropping the returned stream disconnects the subscription.
pub trait Visibility {
    type Events: Stream<Item = VisibilityEvent> + Unpin;

    fn subscribe(&self, element: &str) -> Self::Events;
}

/// Visibility source fed by explicit notifications
#[derive(Default)]
pub struct ChannelVisibility {
    subscribers: Mutex<HashMap<String, Vec<UnboundedSender<VisibilityEvent>>>>,
}

impl ChannelVisibility {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every live subscription of `element`.
    /// Returns how many subscribers received it.
    pub fn notify(&self, element: &str, event: VisibilityEvent) -> usize {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            return 0;
        };
        let Some(senders) = subscribers.get_mut(element) else {
            return 0;
        };
        senders.retain(|tx| tx.unbounded_send(event).is_ok());
        senders.len()
    }

    /// End every subscription of `element`, as when it is unmounted
    pub fn disconnect(&self, element: &str) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.remove(element);
        }
    }

    pub fn subscriber_count(&self, element: &str) -> usize {
        self.subscribers
            .lock()
            .map(|s| {
                s.get(element)
                    .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }
}

impl Visibility for ChannelVisibility {
    type Events = UnboundedReceiver<VisibilityEvent>;

    fn subscribe(&self, element: &str) -> Self::Events {
        let (tx, rx) = unbounded();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.entry(element.to_string()).or_default().push(tx);
        }
        rx
    }
}

/// One lazily loaded image element
pub struct LazyImage {
    element: String,
    reference: ImageReference,
    options: ResolveOptions,
    root_margin_px: u32,
    priority: bool,
    slot: ImageSlot,
}

impl LazyImage {
    pub fn new(element: impl Into<String>, reference: ImageReference) -> Self {
        Self {
            element: element.into(),
            reference,
            options: ResolveOptions::default(),
            root_margin_px: MAX_ROOT_MARGIN_PX,
            priority: false,
            slot: ImageSlot::new(),
        }
    }

    pub fn options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    /// Margin is clamped to 20..=50 px
    pub fn root_margin(mut self, px: u32) -> Self {
        self.root_margin_px = px.clamp(MIN_ROOT_MARGIN_PX, MAX_ROOT_MARGIN_PX);
        self
    }

    /// Load without waiting for visibility
    pub fn priority(mut self) -> Self {
        self.priority = true;
        self
    }

    pub fn state(&self) -> &LoadState {
        self.slot.state()
    }

    pub fn placeholder(&self) -> Option<Placeholder> {
        self.slot.placeholder()
    }

    /// Drive the image to a terminal state.
    ///
    /// Returns `Idle` if the visibility stream ends before the element
    /// comes into view.
    pub async fn run<S, V, Fe>(
        &mut self,
        delivery: &ImageDelivery<S>,
        visibility: &V,
        loader: &Fe,
    ) -> LoadState
    where
        S: SettingsStore,
        V: Visibility + ?Sized,
        Fe: ImageFetcher + ?Sized,
    {
        if self.priority {
            self.slot.enter_view();
        } else if !self.wait_for_view(visibility).await {
            debug!("{} unmounted before coming into view", self.element);
            return self.slot.state().clone();
        }

        let resolved = delivery
            .resolve_image_url(&self.reference, &self.options)
            .await;
        self.slot.url_resolved(resolved);

        let url = match self.slot.state() {
            LoadState::UrlResolved(url) => url.clone(),
            _ => {
                debug!("{} has no URL, showing placeholder", self.element);
                return self.slot.state().clone();
            }
        };

        match loader.fetch(&url).await {
            Ok(_) => {
                self.slot.loaded();
            }
            Err(e) => {
                debug!("{} failed to load {}: {}", self.element, url, e);
                self.slot.failed();
            }
        }
        self.slot.state().clone()
    }

    async fn wait_for_view<V: Visibility + ?Sized>(&mut self, visibility: &V) -> bool {
        let mut events = visibility.subscribe(&self.element);
        while let Some(event) = events.next().await {
            trace!("{} at {}px", self.element, event.distance_px);
            if event.within(self.root_margin_px) {
                return self.slot.enter_view();
            }
        }
        false
    }
}
