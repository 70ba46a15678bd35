#![forbid(unsafe_code)]

//! Carousel navigation in both patterns, driven the way a page would.

use dtk_dom::{Document, Element};
use dtk_runtime::flush;
use dtk_token::{BindingState, DesignToken, TokenValue};
use dtk_widgets::carousel::{CAROUSEL_TAG, DEFAULT_SLIDE_GAP, TAB_PANEL_TAG, TAB_TAG};
use dtk_widgets::{Carousel, CarouselPattern, CarouselTokens, FlipDirection, NavKey};
use proptest::prelude::*;
use tracing_test::traced_test;

const SLIDES: usize = 6;

fn test_slide(doc: &Document, i: usize) -> Element {
    let slide = doc.create_element("fast-carousel-test-slide");
    slide.set_text_content(format!("Slide {i}"));
    if i % 2 == 0 {
        slide.set_attribute("even", "true");
    }
    slide
}

/// Six tab/panel pairs, each panel wrapping a test slide, under a provider.
fn tabbed_fixture(doc: &Document) -> Carousel {
    let provider = doc.create_element("fast-design-system-provider");
    provider.set_html_id("root");
    doc.body().append_child(&provider).expect("provider");

    let element = doc.create_element(CAROUSEL_TAG);
    for i in 1..=SLIDES {
        let tab = doc.create_element(TAB_TAG);
        let panel = doc.create_element(TAB_PANEL_TAG);
        panel.append_child(&test_slide(doc, i)).expect("slide");
        element.append_child(&tab).expect("tab");
        element.append_child(&panel).expect("panel");
    }
    provider.append_child(&element).expect("carousel");
    Carousel::from_element(&element, CarouselPattern::Tabbed).expect("carousel")
}

fn basic_fixture(doc: &Document) -> Carousel {
    let provider = doc.create_element("fast-design-system-provider");
    provider.set_html_id("root");
    doc.body().append_child(&provider).expect("provider");

    let mut carousel = Carousel::new(doc)
        .expect("carousel")
        .with_pattern(CarouselPattern::Basic)
        .expect("basic");
    for i in 1..=SLIDES {
        carousel
            .element()
            .append_child(&test_slide(doc, i))
            .expect("slide");
    }
    provider.append_child(carousel.element()).expect("carousel");
    carousel.refresh().expect("refresh");
    carousel
}

fn by_class(doc: &Document, class: &str) -> Element {
    doc.body()
        .descendants()
        .into_iter()
        .find(|el| el.attribute("class").as_deref() == Some(class))
        .expect("element with class")
}

// ============================================================================
// Tabbed pattern
// ============================================================================

#[test]
fn tabbed_renders_to_the_page() {
    let doc = Document::new();
    let carousel = tabbed_fixture(&doc);
    assert_eq!(doc.query_by_tag("fast-carousel").len(), 1);
    assert_eq!(carousel.len(), SLIDES);
    assert_eq!(carousel.pattern(), CarouselPattern::Tabbed);
    assert_eq!(carousel.element().attribute("pattern").as_deref(), Some("tabbed"));
    assert!(carousel.flippers().is_empty());
}

#[test]
fn tabs_and_panels_are_labelled_in_order() {
    let doc = Document::new();
    let carousel = tabbed_fixture(&doc);
    for n in 1..=SLIDES {
        let tab = doc.query_by_id(&format!("tab-{n}")).expect("tab id");
        let panel = doc.query_by_id(&format!("panel-{n}")).expect("panel id");
        assert_eq!(tab.parent(), panel.parent());
        assert_eq!(tab.tag_name(), TAB_TAG);
        assert_eq!(panel.tag_name(), TAB_PANEL_TAG);
    }
    assert_eq!(carousel.tabs().len(), SLIDES);
}

#[test]
fn right_arrow_shows_next_tab() {
    let doc = Document::new();
    let carousel = tabbed_fixture(&doc);
    assert!(doc.query_by_id("tab-1").is_some());

    assert!(carousel.handle_key(NavKey::ArrowRight));
    assert_eq!(carousel.active_index(), 1);
}

#[test]
fn left_arrow_shows_previous_tab() {
    let doc = Document::new();
    let carousel = tabbed_fixture(&doc);

    assert!(carousel.handle_key(NavKey::ArrowLeft));
    assert_eq!(carousel.active_index(), SLIDES - 1);
}

#[test]
fn home_and_end_jump_to_bounds() {
    let doc = Document::new();
    let carousel = tabbed_fixture(&doc);
    carousel.handle_key(NavKey::End);
    assert_eq!(carousel.active_index(), SLIDES - 1);
    carousel.handle_key(NavKey::Home);
    assert_eq!(carousel.active_index(), 0);
    carousel.handle_key(NavKey::ArrowDown);
    carousel.handle_key(NavKey::ArrowDown);
    carousel.handle_key(NavKey::ArrowUp);
    assert_eq!(carousel.active_index(), 1);
}

#[test]
fn only_active_panel_is_visible() {
    let doc = Document::new();
    let carousel = tabbed_fixture(&doc);
    carousel.handle_key(NavKey::ArrowRight);

    let panels = carousel.items();
    for (i, panel) in panels.iter().enumerate() {
        assert_eq!(panel.has_attribute("active"), i == 1);
        assert_eq!(panel.has_attribute("hidden"), i != 1);
    }
    let tab = doc.query_by_id("tab-2").expect("tab");
    assert!(tab.has_attribute("active"));
    assert!(!doc.query_by_id("tab-1").expect("tab").has_attribute("active"));
    assert_eq!(carousel.active_item(), Some(panels[1].clone()));
}

#[test]
fn clicking_a_tab_selects_it() {
    let doc = Document::new();
    let carousel = tabbed_fixture(&doc);
    let tab = doc.query_by_id("tab-4").expect("tab");
    assert!(carousel.handle_click(&tab));
    assert_eq!(carousel.active_index(), 3);
    assert!(!carousel.handle_click(&doc.body()));
}

// ============================================================================
// Basic pattern
// ============================================================================

#[test]
fn basic_renders_with_pattern_and_flippers() {
    let doc = Document::new();
    let carousel = basic_fixture(&doc);
    assert_eq!(carousel.pattern(), CarouselPattern::Basic);
    assert_eq!(carousel.element().attribute("pattern").as_deref(), Some("basic"));
    assert_eq!(carousel.len(), SLIDES);
    assert_eq!(carousel.flippers().len(), 2);
    assert!(doc.query_by_id("slide-1").is_some());
}

#[test]
fn next_flipper_shows_next_slide() {
    let doc = Document::new();
    let carousel = basic_fixture(&doc);
    let next = by_class(&doc, "next-flipper-container");

    assert!(carousel.handle_click(&next));
    assert_eq!(carousel.active_index(), 1);
}

#[test]
fn previous_flipper_shows_previous_slide() {
    let doc = Document::new();
    let carousel = basic_fixture(&doc);
    let previous = by_class(&doc, "previous-flipper-container");

    assert!(carousel.handle_click(&previous));
    assert_eq!(carousel.active_index(), SLIDES - 1);
}

#[test]
fn basic_pattern_ignores_tab_keys() {
    let doc = Document::new();
    let carousel = basic_fixture(&doc);
    assert!(!carousel.handle_key(NavKey::ArrowRight));
    assert_eq!(carousel.click_flipper(FlipDirection::Next), 1);
}

#[test]
fn switching_back_to_tabbed_removes_flippers() {
    let doc = Document::new();
    let carousel = basic_fixture(&doc)
        .with_pattern(CarouselPattern::Tabbed)
        .expect("tabbed");
    assert!(carousel.flippers().is_empty());
    assert!(doc.query_by_tag("fast-flipper").is_empty());
    assert!(carousel.is_empty(), "test slides are not tab pairs");
}

// ============================================================================
// Tokens
// ============================================================================

#[test]
fn slide_gap_is_emitted_and_inherited() {
    let doc = Document::new();
    let carousel = basic_fixture(&doc);
    let property = carousel.tokens().slide_gap.css_custom_property().to_owned();
    let expected = DEFAULT_SLIDE_GAP.to_string();

    assert_eq!(
        carousel.element().property(&property).as_deref(),
        Some(expected.as_str())
    );
    let slide = doc.query_by_id("slide-3").expect("slide");
    assert_eq!(
        slide.computed_style().property_value(&property),
        Some(expected.as_str())
    );
}

#[test]
fn shared_tokens_follow_theme_values() {
    let doc = Document::new();
    let shared = CarouselTokens::new().expect("tokens");
    shared.slide_gap.set_value_for(&doc.body(), 16.0);

    let carousel = tabbed_fixture(&doc)
        .with_tokens(shared.clone())
        .expect("shared tokens");
    assert_eq!(carousel.element().property("--carousel-slide-gap").as_deref(), Some("16"));

    shared.slide_gap.set_value_for(&doc.body(), 24.0);
    flush().expect("flush");
    assert_eq!(carousel.element().property("--carousel-slide-gap").as_deref(), Some("24"));
}

#[test]
fn tokens_can_derive_from_active_index() {
    let doc = Document::new();
    let carousel = tabbed_fixture(&doc);
    let offset: DesignToken<f64> = DesignToken::create("carousel-offset").expect("name");

    let active = carousel.active_signal().clone();
    let gap = carousel.tokens().slide_gap.clone();
    let host = carousel.element().clone();
    offset.set_value_for(
        carousel.element(),
        TokenValue::derived(move |_| Ok(active.get() as f64 * gap.get_value_for(&host)?)),
    );
    offset.add_custom_property_for(carousel.element()).expect("emit");
    assert_eq!(carousel.element().property("--carousel-offset").as_deref(), Some("0"));

    carousel.next();
    carousel.next();
    flush().expect("flush");
    assert_eq!(
        carousel.element().property("--carousel-offset").as_deref(),
        Some((2.0 * DEFAULT_SLIDE_GAP).to_string().as_str())
    );
}

#[test]
#[traced_test]
fn moved_host_keeps_its_slide_gap() {
    let doc = Document::new();
    let (a, b) = (doc.create_element("div"), doc.create_element("div"));
    doc.body().append_child(&a).expect("a");
    doc.body().append_child(&b).expect("b");

    let host = doc.create_element(CAROUSEL_TAG);
    for i in 1..=3 {
        host.append_child(&test_slide(&doc, i)).expect("slide");
    }
    a.append_child(&host).expect("attach");
    let carousel = Carousel::from_element(&host, CarouselPattern::Basic).expect("carousel");
    let expected = DEFAULT_SLIDE_GAP.to_string();
    assert_eq!(
        host.property("--carousel-slide-gap").as_deref(),
        Some(expected.as_str())
    );

    b.append_child(&host).expect("move");
    flush().expect("flush");

    let gap = carousel.tokens().slide_gap;
    assert_eq!(
        host.property("--carousel-slide-gap").as_deref(),
        Some(expected.as_str())
    );
    assert_eq!(gap.get_value_for(&host).expect("value"), DEFAULT_SLIDE_GAP);
    assert_eq!(gap.binding_state_for(&host), BindingState::Active);
    assert_eq!(carousel.len(), 3);
    assert!(logs_contain("carousel tokens rebound"));
}

#[test]
fn moved_host_rebinds_shared_tokens() {
    let doc = Document::new();
    let shared = CarouselTokens::new().expect("tokens");
    shared.slide_gap.set_value_for(&doc.body(), 16.0);
    let carousel = tabbed_fixture(&doc)
        .with_tokens(shared.clone())
        .expect("shared tokens");

    let elsewhere = doc.create_element("section");
    doc.body().append_child(&elsewhere).expect("section");
    elsewhere.append_child(carousel.element()).expect("move");
    assert_eq!(carousel.element().property("--carousel-slide-gap").as_deref(), Some("16"));
    assert!(!shared.slide_gap.has_value_for(carousel.element()));

    shared.slide_gap.set_value_for(&doc.body(), 20.0);
    flush().expect("flush");
    assert_eq!(carousel.element().property("--carousel-slide-gap").as_deref(), Some("20"));
}

#[test]
#[traced_test]
fn navigation_is_logged() {
    let doc = Document::new();
    let carousel = tabbed_fixture(&doc);
    carousel.next();
    assert!(logs_contain("carousel refreshed"));
    assert!(logs_contain("carousel navigated"));
}

#[cfg(feature = "serde")]
#[test]
fn pattern_serializes_lowercase() {
    let json = serde_json::to_string(&CarouselPattern::Basic).expect("serialize");
    assert_eq!(json, "\"basic\"");
    let back: CarouselPattern = serde_json::from_str("\"tabbed\"").expect("deserialize");
    assert_eq!(back, CarouselPattern::Tabbed);
}

proptest! {
    #[test]
    fn navigation_wraps_or_clamps(
        len in 0usize..10,
        looping in any::<bool>(),
        steps in prop::collection::vec(any::<bool>(), 0..24),
    ) {
        let doc = Document::new();
        let mut carousel = Carousel::new(&doc)
            .expect("carousel")
            .with_pattern(CarouselPattern::Basic)
            .expect("basic")
            .with_loop(looping);
        for i in 1..=len {
            carousel.element().append_child(&test_slide(&doc, i)).expect("slide");
        }
        doc.body().append_child(carousel.element()).expect("attach");
        carousel.refresh().expect("refresh");

        let mut expected = 0usize;
        for forward in steps {
            let got = if forward { carousel.next() } else { carousel.previous() };
            if len > 0 {
                expected = match (forward, looping) {
                    (true, true) => (expected + 1) % len,
                    (true, false) => (expected + 1).min(len - 1),
                    (false, true) => (expected + len - 1) % len,
                    (false, false) => expected.saturating_sub(1),
                };
            }
            prop_assert_eq!(got, expected);
            prop_assert_eq!(carousel.active_index(), expected);
            for (i, item) in carousel.items().iter().enumerate() {
                prop_assert_eq!(item.has_attribute("active"), i == expected);
                prop_assert_eq!(item.has_attribute("hidden"), i != expected);
            }
        }
    }
}
