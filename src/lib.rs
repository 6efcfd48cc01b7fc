pub mod anchors;
pub mod cascade;
pub mod config;
pub mod error;
pub mod expand;
pub mod geo;
pub mod layout;
pub mod logging;
pub mod normalize;
pub mod page;
pub mod search;
pub mod similarity;

#[cfg(test)]
pub(crate) mod test_support;

pub use cascade::{Locator, MatchResult, StrategyId};
pub use config::{LocatorConfig, Mode};
pub use error::{Error, Result};
pub use geo::{PageBounds, Rect};
pub use page::{Document, Page, Query, Word};

#[cfg(feature = "extension-module")]
use pyo3::prelude::*;

/// Locate `query` on a page given as JSON and return the full match result as JSON.
///
/// # Arguments
/// * `page_json` - A page object: `text`, `words` and optionally `bounds`
/// * `query` - The passage to locate
pub fn locate_text_json(page_json: &str, query: &str, config: &LocatorConfig) -> Result<String> {
    let page = Page::from_json_str(page_json)?;
    let result = Locator::new(config.clone())?.locate(&page, query)?;
    Ok(serde_json::to_string(&result)?)
}

/// Locate `query` on a page given as JSON and return its rectangles as a JSON array.
///
/// `mode` is `"full"` or `"selection"`; see [`Mode`].
#[cfg(feature = "extension-module")]
#[pyfunction]
#[pyo3(signature = (page_json, query, extended = false, mode = "full"))]
fn locate_text(page_json: String, query: String, extended: bool, mode: &str) -> PyResult<String> {
    let to_py = |e: Error| {
        if e.is_input_error() {
            PyErr::new::<pyo3::exceptions::PyValueError, _>(e.to_string())
        } else {
            PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(e.to_string())
        }
    };

    let mode: Mode = mode.parse().map_err(to_py)?;
    let locator = Locator::new(LocatorConfig::new().with_mode(mode)).map_err(to_py)?;
    let page = Page::from_json_str(&page_json).map_err(to_py)?;
    let result = locator.locate(&page, &query).map_err(to_py)?;
    let json = if extended {
        serde_json::to_string(&result)
    } else {
        serde_json::to_string(&result.rectangles)
    };
    json.map_err(|e| to_py(Error::Json(e)))
}

/// A Python module implemented in Rust
#[cfg(feature = "extension-module")]
#[pymodule(name = "spanlight")]
fn spanlight(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(locate_text, m)?)?;
    Ok(())
}
