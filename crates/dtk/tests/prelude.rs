#![forbid(unsafe_code)]

//! A themed page wired together through the facade.

use dtk::prelude::*;
use tracing_test::traced_test;

#[test]
fn theme_switch_reaches_every_binding_in_one_flush() {
    let doc = Document::new();
    let dark = Observable::new(false);
    let fill: DesignToken<String> = DesignToken::create("neutral-fill").expect("name");
    let d = dark.clone();
    fill.set_value_for(
        &doc.body(),
        TokenValue::computed(move |_| (if d.get() { "#1f1f1f" } else { "#ffffff" }).to_string()),
    );

    let cards: Vec<Element> = (0..4)
        .map(|_| {
            let card = doc.create_element("div");
            doc.body().append_child(&card).expect("append");
            fill.add_custom_property_for(&card).expect("emit");
            card
        })
        .collect();

    BatchScope::run(|| dark.set(true));
    let report = flush().expect("flush");
    assert_eq!(report.tasks_run, cards.len());
    for card in &cards {
        assert_eq!(card.property("--neutral-fill").as_deref(), Some("#1f1f1f"));
    }
}

#[cfg(feature = "widgets")]
#[test]
fn carousel_from_prelude() {
    let doc = Document::new();
    let carousel = Carousel::new(&doc).expect("carousel");
    doc.body().append_child(carousel.element()).expect("append");
    assert_eq!(carousel.pattern(), CarouselPattern::Tabbed);
    assert!(!carousel.handle_key(NavKey::Home));
}

#[test]
#[traced_test]
fn facade_logs_come_from_inner_crates() {
    let doc = Document::new();
    let el = doc.create_element("div");
    doc.body().append_child(&el).expect("append");
    assert!(logs_contain("element inserted"));
}
