use pretty_assertions::assert_eq;
use serde_json::json;

use spanlight::{locate_text_json, Document, Locator, LocatorConfig, MatchResult, Page, Query};
use spanlight::{Rect, StrategyId};

mod common;
use common::PageBuilder;

fn mixed_geometry_page() -> serde_json::Value {
    json!({
        "text": "alpha beta\ngamma",
        "bounds": { "width": 200.0, "height": 100.0 },
        "words": [
            { "bbox": [10.0, 10.0, 35.0, 20.0], "text": "alpha" },
            {
                "quad": {
                    "ul": { "x": 40.0, "y": 10.0 },
                    "ur": { "x": 60.0, "y": 10.0 },
                    "ll": { "x": 40.0, "y": 20.0 },
                    "lr": { "x": 60.0, "y": 20.0 }
                },
                "text": "beta"
            },
            { "rect": { "x": 10.0, "y": 25.0, "width": 25.0, "height": 10.0 }, "text": "gamma" }
        ]
    })
}

#[test]
fn test_page_json_accepts_every_geometry_shape() {
    let page = Page::from_json_str(&mixed_geometry_page().to_string()).unwrap();

    assert_eq!(page.words.len(), 3);
    assert_eq!(page.words[0].rect, Rect::new(10.0, 10.0, 25.0, 10.0));
    assert_eq!(page.words[1].rect, Rect::new(40.0, 10.0, 20.0, 10.0));
    assert_eq!(page.words[2].rect, Rect::new(10.0, 25.0, 25.0, 10.0));

    let offsets: Vec<(usize, usize)> = page
        .words
        .iter()
        .map(|w| (w.char_start, w.char_end))
        .collect();
    assert_eq!(offsets, vec![(0, 5), (6, 10), (11, 16)]);
}

#[test]
fn test_locate_text_json_round_trip() {
    let page_json = mixed_geometry_page().to_string();
    let out = locate_text_json(&page_json, "beta gamma", &LocatorConfig::default()).unwrap();
    let result: MatchResult = serde_json::from_str(&out).unwrap();

    assert_eq!(result.strategy, Some(StrategyId::NormalizedWhitespace));
    assert_eq!(
        result.rectangles,
        vec![
            Rect::new(40.0, 10.0, 20.0, 10.0),
            Rect::new(10.0, 25.0, 25.0, 10.0)
        ]
    );

    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["strategy"], "normalized_whitespace");
    assert_eq!(value["rectangles"][0]["width"], 20.0);
}

#[test]
fn test_missing_bounds_are_derived_from_words() {
    let mut value = mixed_geometry_page();
    value.as_object_mut().unwrap().remove("bounds");
    let page = Page::from_json_str(&value.to_string()).unwrap();

    assert_eq!(page.bounds.width, 60.0);
    assert_eq!(page.bounds.height, 35.0);
}

#[test]
fn test_mixed_offsets_rejected() {
    let value = json!({
        "text": "one two",
        "words": [
            { "bbox": [0.0, 0.0, 15.0, 10.0], "text": "one", "charStart": 0, "charEnd": 3 },
            { "bbox": [20.0, 0.0, 35.0, 10.0], "text": "two" }
        ]
    });
    let err = Page::from_json_str(&value.to_string()).unwrap_err();
    assert!(err.is_input_error());
    assert!(err.to_string().contains("word 1 differs"), "{err}");
}

#[test]
fn test_supplied_offsets_are_kept() {
    let value = json!({
        "text": "one two",
        "words": [
            { "bbox": [0.0, 0.0, 15.0, 10.0], "text": "one", "char_start": 0, "char_end": 3 },
            { "bbox": [20.0, 0.0, 35.0, 10.0], "text": "two", "char_start": 4, "char_end": 7 }
        ]
    });
    let page = Page::from_json_str(&value.to_string()).unwrap();
    assert_eq!(page.words[1].char_start, 4);

    let result = Locator::default().locate(&page, "two").unwrap();
    assert_eq!(result.rectangles, vec![Rect::new(20.0, 0.0, 15.0, 10.0)]);
}

#[test]
fn test_document_json_with_pages() {
    let first = PageBuilder::new("cover page").build();
    let second = PageBuilder::new("the appendix lists sources").build();
    let json = serde_json::to_string(&Document::new(vec![first, second])).unwrap();

    let doc = Document::from_json_str(&json).unwrap();
    assert_eq!(doc.pages.len(), 2);

    let locator = Locator::default();
    let found = locator
        .locate_in_document(&doc, &Query::new("appendix", 2))
        .unwrap();
    assert_eq!(found.strategy, Some(StrategyId::Exact));

    let missing = locator
        .locate_in_document(&doc, &Query::new("appendix", 1))
        .unwrap();
    assert!(missing.is_empty());

    assert!(locator
        .locate_in_document(&doc, &Query::new("appendix", 0))
        .is_err());
}

#[test]
fn test_single_page_document_json() {
    let doc = Document::from_json_str(&mixed_geometry_page().to_string()).unwrap();
    assert_eq!(doc.pages.len(), 1);
    assert!(doc.page(1).is_ok());
}

#[test]
fn test_query_page_defaults_to_first() {
    let query: Query = serde_json::from_str(r#"{"text": "alpha"}"#).unwrap();
    assert_eq!(query, Query::new("alpha", 1));
}

#[test]
fn test_invalid_bounds_rejected() {
    let mut value = mixed_geometry_page();
    value["bounds"] = json!({ "width": 0.0, "height": 100.0 });
    assert!(Page::from_json_str(&value.to_string()).is_err());
}
