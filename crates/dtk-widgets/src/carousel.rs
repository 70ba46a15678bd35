#![forbid(unsafe_code)]

//! Carousel: a set of slides with one active at a time.
//!
//! Two patterns are supported:
//!
//! - **Tabbed**: `fast-tab` / `fast-tab-panel` children are paired in document
//!   order. Arrow keys, `Home` and `End` move between tabs.
//! - **Basic**: every non-flipper child is a slide. A previous and a next
//!   [`Flipper`] are appended to the host and navigate on click.
//!
//! # Invariants
//!
//! 1. `active_index() < len()` whenever `len() > 0`; an empty carousel reports
//!    index 0.
//! 2. Exactly the active item carries the `active` attribute; every other
//!    panel or slide carries `hidden`.
//! 3. With looping on, `previous()` from the first item lands on the last and
//!    `next()` from the last lands on the first. With looping off both clamp.
//!
//! The active index is an [`Observable`], so token derivations and other
//! observers can read it and re-run when navigation happens.
//!
//! # Example
//!
//! ```
//! use dtk_dom::Document;
//! use dtk_widgets::{Carousel, CarouselPattern};
//!
//! let doc = Document::new();
//! let host = doc.create_element("fast-carousel");
//! for _ in 0..3 {
//!     host.append_child(&doc.create_element("section")).unwrap();
//! }
//! doc.body().append_child(&host).unwrap();
//!
//! let carousel = Carousel::from_element(&host, CarouselPattern::Basic).unwrap();
//! assert_eq!(carousel.previous(), 2);
//! assert_eq!(carousel.next(), 0);
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use dtk_dom::{Document, Element, TreeMutation};
use dtk_runtime::{Observable, Subscription};
use dtk_token::{BindingState, DesignToken, TokenError};
use tracing::{debug, warn};

use crate::WidgetError;
use crate::flipper::{FLIPPER_TAG, FlipDirection, Flipper};

pub const CAROUSEL_TAG: &str = "fast-carousel";
pub const TAB_TAG: &str = "fast-tab";
pub const TAB_PANEL_TAG: &str = "fast-tab-panel";

/// Gap between slides, in pixels, when nothing above the carousel sets one.
pub const DEFAULT_SLIDE_GAP: f64 = 8.0;

/// How a carousel discovers and navigates its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CarouselPattern {
    #[default]
    Tabbed,
    Basic,
}

impl CarouselPattern {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tabbed => "tabbed",
            Self::Basic => "basic",
        }
    }
}

impl fmt::Display for CarouselPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keys a tabbed carousel responds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavKey {
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Home,
    End,
}

impl NavKey {
    /// Parse a DOM `KeyboardEvent.key` name.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "ArrowLeft" => Self::ArrowLeft,
            "ArrowRight" => Self::ArrowRight,
            "ArrowUp" => Self::ArrowUp,
            "ArrowDown" => Self::ArrowDown,
            "Home" => Self::Home,
            "End" => Self::End,
            _ => return None,
        })
    }
}

/// Design tokens a carousel emits on its host element.
#[derive(Debug, Clone)]
pub struct CarouselTokens {
    /// Space between adjacent slides (`--carousel-slide-gap`).
    pub slide_gap: DesignToken<f64>,
}

impl CarouselTokens {
    /// # Errors
    ///
    /// Only if a token name is rejected, which the built-in names never are.
    pub fn new() -> Result<Self, TokenError> {
        Ok(Self {
            slide_gap: DesignToken::create("carousel-slide-gap")?,
        })
    }
}

/// Tokens bound on the host, shared with the listener that rebinds them
/// when the host is moved.
#[derive(Debug)]
struct HostTokens {
    tokens: CarouselTokens,
    /// The host carries [`DEFAULT_SLIDE_GAP`] as its own value.
    owns_default: bool,
}

impl HostTokens {
    /// Put the default gap (when owned) and the CSS binding on `host`.
    fn bind(&self, host: &Element) -> Result<(), TokenError> {
        let gap = &self.tokens.slide_gap;
        if self.owns_default && !gap.has_value_for(host) {
            gap.set_value_for(host, DEFAULT_SLIDE_GAP);
        }
        match gap.add_custom_property_for(host) {
            Err(TokenError::NoValue { .. }) if !self.owns_default => {
                debug!(carousel = %host.id(), "shared slide gap has no value yet");
                Ok(())
            }
            other => other,
        }
    }

    fn is_bound(&self, host: &Element) -> bool {
        let gap = &self.tokens.slide_gap;
        (!self.owns_default || gap.has_value_for(host))
            && gap.binding_state_for(host) != BindingState::Inactive
    }
}

/// Detaching the host drops its token state; restore it on re-insertion.
fn rebind(host: &Element, tokens: &HostTokens) {
    if tokens.is_bound(host) {
        return;
    }
    match tokens.bind(host) {
        Ok(()) => debug!(carousel = %host.id(), "carousel tokens rebound"),
        Err(err) => warn!(carousel = %host.id(), error = %err, "carousel token rebind failed"),
    }
}

#[derive(Debug, Clone)]
struct Item {
    /// The tab for tabbed carousels.
    control: Option<Element>,
    /// The panel or slide.
    content: Element,
}

/// A carousel bound to a `fast-carousel` host element.
pub struct Carousel {
    element: Element,
    pattern: CarouselPattern,
    looping: bool,
    items: Rc<RefCell<Vec<Item>>>,
    flippers: Vec<Flipper>,
    active: Observable<usize>,
    host_tokens: Rc<RefCell<HostTokens>>,
    _reflect: Subscription,
    _rebind: Subscription,
}

impl Carousel {
    /// Create a detached, empty tabbed carousel in `doc`.
    ///
    /// # Errors
    ///
    /// Propagates token or tree failures from setting up the host.
    pub fn new(doc: &Document) -> Result<Self, WidgetError> {
        Self::build(doc.create_element(CAROUSEL_TAG), CarouselPattern::default())
    }

    /// Adopt an existing `fast-carousel` element and discover its items.
    ///
    /// # Errors
    ///
    /// [`WidgetError::WrongElement`] for any other tag.
    pub fn from_element(element: &Element, pattern: CarouselPattern) -> Result<Self, WidgetError> {
        let found = element.tag_name();
        if found != CAROUSEL_TAG {
            return Err(WidgetError::WrongElement {
                expected: CAROUSEL_TAG,
                found,
            });
        }
        Self::build(element.clone(), pattern)
    }

    fn build(element: Element, pattern: CarouselPattern) -> Result<Self, WidgetError> {
        let host_tokens = HostTokens {
            tokens: CarouselTokens::new()?,
            owns_default: true,
        };
        host_tokens.bind(&element)?;
        let host_tokens = Rc::new(RefCell::new(host_tokens));
        let rebind = {
            let host = element.clone();
            let host_tokens = Rc::clone(&host_tokens);
            element.document().on_mutation(move |mutation| {
                if let TreeMutation::Inserted { elements, .. } = mutation {
                    if elements.contains(&host.id()) {
                        rebind(&host, &host_tokens.borrow());
                    }
                }
            })
        };

        let items: Rc<RefCell<Vec<Item>>> = Rc::new(RefCell::new(Vec::new()));
        let active = Observable::new(0usize);
        let reflect = {
            let items = Rc::clone(&items);
            active.subscribe(move |index| reflect(&items.borrow(), *index))
        };

        let mut carousel = Self {
            element,
            pattern,
            looping: true,
            items,
            flippers: Vec::new(),
            active,
            host_tokens,
            _reflect: reflect,
            _rebind: rebind,
        };
        carousel.refresh()?;
        Ok(carousel)
    }

    /// Switch pattern and rediscover items.
    ///
    /// # Errors
    ///
    /// Propagates tree failures while adding or removing flippers.
    pub fn with_pattern(mut self, pattern: CarouselPattern) -> Result<Self, WidgetError> {
        self.pattern = pattern;
        self.refresh()?;
        Ok(self)
    }

    /// Enable or disable wrap-around navigation (on by default).
    #[must_use]
    pub fn with_loop(mut self, looping: bool) -> Self {
        self.looping = looping;
        if looping {
            self.element.set_attribute("loop", "");
        } else {
            self.element.remove_attribute("loop");
        }
        self
    }

    /// Use shared tokens instead of this carousel's own.
    ///
    /// The built-in default gap is dropped so values set on ancestors for the
    /// shared tokens apply. A token with no value anywhere yet is bound anyway
    /// and emits once one is set.
    ///
    /// # Errors
    ///
    /// Token failures other than a missing value.
    pub fn with_tokens(self, tokens: CarouselTokens) -> Result<Self, WidgetError> {
        {
            let mut host = self.host_tokens.borrow_mut();
            host.tokens.slide_gap.remove_custom_property_for(&self.element);
            if host.owns_default {
                host.tokens.slide_gap.delete_value_for(&self.element);
                host.owns_default = false;
            }
            host.tokens = tokens;
        }
        self.host_tokens.borrow().bind(&self.element)?;
        Ok(self)
    }

    /// Re-scan the host's children for items.
    ///
    /// # Errors
    ///
    /// Propagates tree failures while adding or removing flippers.
    pub fn refresh(&mut self) -> Result<(), WidgetError> {
        self.element.set_attribute("pattern", self.pattern.as_str());
        let children = self.element.children();
        let items: Vec<Item> = match self.pattern {
            CarouselPattern::Tabbed => {
                self.remove_flippers()?;
                let tabs = children.iter().filter(|c| c.tag_name() == TAB_TAG);
                let panels = children.iter().filter(|c| c.tag_name() == TAB_PANEL_TAG);
                tabs.zip(panels)
                    .enumerate()
                    .map(|(i, (tab, panel))| pair_tab(i + 1, tab, panel))
                    .collect()
            }
            CarouselPattern::Basic => {
                self.ensure_flippers()?;
                children
                    .iter()
                    .filter(|c| c.tag_name() != FLIPPER_TAG)
                    .enumerate()
                    .map(|(i, slide)| label_slide(i + 1, slide))
                    .collect()
            }
        };

        let len = items.len();
        *self.items.borrow_mut() = items;
        let current = self.active.with(|i| *i);
        let clamped = current.min(len.saturating_sub(1));
        if clamped == current {
            reflect(&self.items.borrow(), current);
        } else {
            self.active.set(clamped);
        }
        debug!(carousel = %self.element.id(), pattern = %self.pattern, items = len, "carousel refreshed");
        Ok(())
    }

    fn ensure_flippers(&mut self) -> Result<(), WidgetError> {
        if !self.flippers.is_empty() {
            return Ok(());
        }
        let existing: Vec<Flipper> = self
            .element
            .children()
            .iter()
            .filter_map(Flipper::from_element)
            .collect();
        if !existing.is_empty() {
            self.flippers = existing;
            return Ok(());
        }
        let doc = self.element.document().clone();
        for direction in [FlipDirection::Previous, FlipDirection::Next] {
            let flipper = Flipper::new(&doc, direction);
            self.element.append_child(flipper.element())?;
            self.flippers.push(flipper);
        }
        Ok(())
    }

    fn remove_flippers(&mut self) -> Result<(), WidgetError> {
        for flipper in self.flippers.drain(..) {
            flipper.element().remove()?;
        }
        Ok(())
    }

    #[must_use]
    pub fn element(&self) -> &Element {
        &self.element
    }

    #[must_use]
    pub fn pattern(&self) -> CarouselPattern {
        self.pattern
    }

    #[must_use]
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Tokens currently bound on the host.
    #[must_use]
    pub fn tokens(&self) -> CarouselTokens {
        self.host_tokens.borrow().tokens.clone()
    }

    #[must_use]
    pub fn flippers(&self) -> &[Flipper] {
        &self.flippers
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of the active item. Tracked when read inside a derivation.
    #[must_use]
    pub fn active_index(&self) -> usize {
        self.active.get()
    }

    /// The observable behind [`active_index`](Self::active_index).
    #[must_use]
    pub fn active_signal(&self) -> &Observable<usize> {
        &self.active
    }

    /// The active panel or slide.
    #[must_use]
    pub fn active_item(&self) -> Option<Element> {
        let index = self.active.with(|i| *i);
        self.items.borrow().get(index).map(|item| item.content.clone())
    }

    /// Panels (tabbed) or slides (basic), in order.
    #[must_use]
    pub fn items(&self) -> Vec<Element> {
        self.items
            .borrow()
            .iter()
            .map(|item| item.content.clone())
            .collect()
    }

    /// Tabs paired with [`items`](Self::items); empty for the basic pattern.
    #[must_use]
    pub fn tabs(&self) -> Vec<Element> {
        self.items
            .borrow()
            .iter()
            .filter_map(|item| item.control.clone())
            .collect()
    }

    /// Activate item `index`. Out-of-range indices are ignored.
    pub fn set_active_index(&self, index: usize) -> bool {
        if index >= self.len() {
            return false;
        }
        let from = self.active.with(|i| *i);
        if from != index {
            debug!(carousel = %self.element.id(), from, to = index, "carousel navigated");
            self.active.set(index);
        }
        true
    }

    /// Move forward one item; returns the new active index.
    pub fn next(&self) -> usize {
        self.step(true)
    }

    /// Move back one item; returns the new active index.
    pub fn previous(&self) -> usize {
        self.step(false)
    }

    fn step(&self, forward: bool) -> usize {
        let len = self.len();
        let current = self.active.with(|i| *i);
        if len == 0 {
            return current;
        }
        let last = len - 1;
        let target = match (forward, self.looping) {
            (true, _) if current < last => current + 1,
            (true, true) => 0,
            (true, false) => last,
            (false, _) if current > 0 => current - 1,
            (false, true) => last,
            (false, false) => 0,
        };
        self.set_active_index(target);
        target
    }

    /// Keyboard navigation for the tabbed pattern. Returns whether the key
    /// was handled.
    pub fn handle_key(&self, key: NavKey) -> bool {
        if self.pattern != CarouselPattern::Tabbed || self.is_empty() {
            return false;
        }
        match key {
            NavKey::ArrowRight | NavKey::ArrowDown => {
                self.next();
            }
            NavKey::ArrowLeft | NavKey::ArrowUp => {
                self.previous();
            }
            NavKey::Home => {
                self.set_active_index(0);
            }
            NavKey::End => {
                self.set_active_index(self.len() - 1);
            }
        }
        true
    }

    /// Navigate as if the flipper for `direction` was clicked.
    pub fn click_flipper(&self, direction: FlipDirection) -> usize {
        match direction {
            FlipDirection::Previous => self.previous(),
            FlipDirection::Next => self.next(),
        }
    }

    /// Route a click on `target`: flippers navigate, tabs select themselves.
    /// Returns whether the click changed or confirmed the active item.
    pub fn handle_click(&self, target: &Element) -> bool {
        if let Some(flipper) = self.flippers.iter().find(|f| f.hit(target)) {
            self.click_flipper(flipper.direction());
            return true;
        }
        let hit = self.items.borrow().iter().position(|item| {
            item.control
                .as_ref()
                .is_some_and(|control| control.contains(target))
        });
        match hit {
            Some(index) => self.set_active_index(index),
            None => false,
        }
    }
}

impl fmt::Debug for Carousel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Carousel")
            .field("element", &self.element.id())
            .field("pattern", &self.pattern)
            .field("looping", &self.looping)
            .field("len", &self.len())
            .field("active", &self.active.with(|i| *i))
            .finish()
    }
}

fn pair_tab(n: usize, tab: &Element, panel: &Element) -> Item {
    if tab.html_id().is_none() {
        tab.set_html_id(format!("tab-{n}"));
    }
    if panel.html_id().is_none() {
        panel.set_html_id(format!("panel-{n}"));
    }
    Item {
        control: Some(tab.clone()),
        content: panel.clone(),
    }
}

fn label_slide(n: usize, slide: &Element) -> Item {
    if slide.html_id().is_none() {
        slide.set_html_id(format!("slide-{n}"));
    }
    Item {
        control: None,
        content: slide.clone(),
    }
}

fn reflect(items: &[Item], active: usize) {
    for (i, item) in items.iter().enumerate() {
        let on = i == active;
        if let Some(control) = &item.control {
            set_flag(control, "active", on);
        }
        set_flag(&item.content, "active", on);
        set_flag(&item.content, "hidden", !on);
    }
}

fn set_flag(element: &Element, name: &str, on: bool) {
    if on {
        element.set_attribute(name, "");
    } else {
        element.remove_attribute(name);
    }
}
