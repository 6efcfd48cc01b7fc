//! Caller-supplied page content: text, positioned words and page size.
//!
//! Pages arrive as JSON from an upstream extractor. Geometry is normalized to [`Rect`] here and
//! word offsets are filled in when the extractor did not provide them, so the rest of the crate
//! only sees one shape.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geo::{deserialize_geometry, PageBounds, Rect};

/// A positioned word. `char_start..char_end` is its range in the space where words are joined
/// by exactly one synthetic space.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    pub rect: Rect,
    pub text: String,
    pub char_start: usize,
    pub char_end: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl Word {
    pub fn new(rect: Rect, text: impl Into<String>, char_start: usize, char_end: usize) -> Self {
        Self {
            rect,
            text: text.into(),
            char_start,
            char_end,
            block: None,
            line: None,
        }
    }

    /// Tag the word with extractor block and line numbers.
    pub fn with_line(mut self, block: u32, line: u32) -> Self {
        self.block = Some(block);
        self.line = Some(line);
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WordInput {
    #[serde(alias = "bbox", alias = "quad", deserialize_with = "deserialize_geometry")]
    rect: Rect,
    text: String,
    #[serde(default, alias = "char_start")]
    char_start: Option<usize>,
    #[serde(default, alias = "char_end")]
    char_end: Option<usize>,
    #[serde(default, alias = "block_no")]
    block: Option<u32>,
    #[serde(default, alias = "line_no")]
    line: Option<u32>,
}

/// Assign offsets with the single-space join convention.
pub fn assign_offsets<'a, I>(texts: I) -> Vec<(usize, usize)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut cursor = 0;
    texts
        .into_iter()
        .map(|text| {
            let start = cursor;
            let end = start + text.chars().count();
            cursor = end + 1;
            (start, end)
        })
        .collect()
}

fn resolve_words(inputs: Vec<WordInput>) -> Result<Vec<Word>> {
    let supplied = inputs
        .first()
        .map(|w| w.char_start.is_some() && w.char_end.is_some())
        .unwrap_or(true);

    if let Some(index) = inputs
        .iter()
        .position(|w| (w.char_start.is_some() && w.char_end.is_some()) != supplied)
    {
        return Err(Error::MixedOffsets(index));
    }

    let offsets: Vec<(usize, usize)> = if supplied {
        inputs
            .iter()
            .map(|w| (w.char_start.unwrap_or_default(), w.char_end.unwrap_or_default()))
            .collect()
    } else {
        assign_offsets(inputs.iter().map(|w| w.text.as_str()))
    };

    Ok(inputs
        .into_iter()
        .zip(offsets)
        .map(|(w, (char_start, char_end))| Word {
            rect: w.rect,
            text: w.text,
            char_start,
            char_end,
            block: w.block,
            line: w.line,
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct PageInput {
    text: String,
    #[serde(default)]
    words: Vec<WordInput>,
    #[serde(default)]
    bounds: Option<PageBounds>,
}

/// One page of a document. Immutable for the duration of a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PageInput")]
pub struct Page {
    pub text: String,
    pub words: Vec<Word>,
    pub bounds: PageBounds,
}

impl TryFrom<PageInput> for Page {
    type Error = Error;

    fn try_from(input: PageInput) -> Result<Self> {
        let words = resolve_words(input.words)?;
        match input.bounds {
            Some(bounds) => Page::new(input.text, words, bounds),
            None => Page::with_derived_bounds(input.text, words),
        }
    }
}

impl Page {
    pub fn new(text: impl Into<String>, words: Vec<Word>, bounds: PageBounds) -> Result<Self> {
        if !bounds.is_valid() {
            return Err(Error::InvalidBounds(format!(
                "{} x {}",
                bounds.width, bounds.height
            )));
        }
        Ok(Self {
            text: text.into(),
            words,
            bounds,
        })
    }

    /// Page whose bounds are the union of its word boxes.
    pub fn with_derived_bounds(text: impl Into<String>, words: Vec<Word>) -> Result<Self> {
        let bounds = PageBounds::covering(words.iter().map(|w| &w.rect)).ok_or_else(|| {
            Error::InvalidBounds("no bounds given and no words to derive them from".to_string())
        })?;
        Self::new(text, words, bounds)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// An ordered set of pages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub pages: Vec<Page>,
}

impl Document {
    pub fn new(pages: Vec<Page>) -> Self {
        Self { pages }
    }

    /// Look up a page by its 1-indexed number.
    pub fn page(&self, number: usize) -> Result<&Page> {
        number
            .checked_sub(1)
            .and_then(|i| self.pages.get(i))
            .ok_or(Error::PageOutOfRange {
                page: number,
                count: self.pages.len(),
            })
    }

    /// Parse either a single page object or `{"pages": [...]}`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if value.get("pages").is_some() {
            Ok(serde_json::from_value(value)?)
        } else {
            Ok(Self::new(vec![serde_json::from_value(value)?]))
        }
    }
}

fn first_page() -> usize {
    1
}

/// A passage to locate on a 1-indexed page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    #[serde(default = "first_page")]
    pub page: usize,
}

impl Query {
    pub fn new(text: impl Into<String>, page: usize) -> Self {
        Self {
            text: text.into(),
            page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_with_supplied_offsets() {
        let json = r#"{
            "text": "Hello world",
            "words": [
                {"rect": {"x": 72, "y": 72, "width": 25, "height": 12}, "text": "Hello", "charStart": 0, "charEnd": 5},
                {"rect": {"x": 102, "y": 72, "width": 25, "height": 12}, "text": "world", "charStart": 6, "charEnd": 11}
            ],
            "bounds": {"width": 612, "height": 792}
        }"#;
        let page = Page::from_json_str(json).unwrap();
        assert_eq!(page.words.len(), 2);
        assert_eq!(page.words[1].char_start, 6);
        assert_eq!(page.bounds, PageBounds::new(612.0, 792.0));
    }

    #[test]
    fn test_page_assigns_offsets_and_bounds() {
        let json = r#"{
            "text": "Hello world",
            "words": [
                {"bbox": [72, 72, 97, 84], "text": "Hello", "block_no": 0, "line_no": 0},
                {"bbox": [102, 72, 127, 84], "text": "world", "block_no": 0, "line_no": 0}
            ]
        }"#;
        let page = Page::from_json_str(json).unwrap();
        assert_eq!((page.words[0].char_start, page.words[0].char_end), (0, 5));
        assert_eq!((page.words[1].char_start, page.words[1].char_end), (6, 11));
        assert_eq!(page.words[1].rect, Rect::new(102.0, 72.0, 25.0, 12.0));
        assert_eq!(page.words[0].line, Some(0));
        assert_eq!(page.bounds, PageBounds::new(127.0, 84.0));
    }

    #[test]
    fn test_mixed_offsets_rejected() {
        let json = r#"{
            "text": "a b",
            "words": [
                {"rect": [0, 0, 5, 5], "text": "a", "charStart": 0, "charEnd": 1},
                {"rect": [6, 0, 11, 5], "text": "b"}
            ],
            "bounds": {"width": 100, "height": 100}
        }"#;
        let err = Page::from_json_str(json).unwrap_err();
        assert!(err.to_string().contains("word 1"), "{err}");
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        let err = Page::new("x", Vec::new(), PageBounds::new(0.0, 792.0)).unwrap_err();
        assert!(matches!(err, Error::InvalidBounds(_)));
        assert!(Page::with_derived_bounds("x", Vec::new()).is_err());
    }

    #[test]
    fn test_document_single_or_many() {
        let single = r#"{"text": "", "words": [], "bounds": {"width": 10, "height": 10}}"#;
        let doc = Document::from_json_str(single).unwrap();
        assert_eq!(doc.pages.len(), 1);

        let many = format!(r#"{{"pages": [{single}, {single}]}}"#);
        let doc = Document::from_json_str(&many).unwrap();
        assert_eq!(doc.pages.len(), 2);
        assert!(doc.page(2).is_ok());
        assert!(matches!(
            doc.page(0),
            Err(Error::PageOutOfRange { page: 0, count: 2 })
        ));
        assert!(doc.page(3).is_err());
    }

    #[test]
    fn test_query_defaults_to_first_page() {
        let query: Query = serde_json::from_str(r#"{"text": "needle"}"#).unwrap();
        assert_eq!(query, Query::new("needle", 1));
    }

    #[test]
    fn test_assign_offsets_counts_chars() {
        assert_eq!(
            assign_offsets(["caf\u{00E9}", "au", "lait"]),
            vec![(0, 4), (5, 7), (8, 12)]
        );
    }
}
