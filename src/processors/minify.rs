use super::{Mode, Processor};
use crate::{page::PageId, site::Site, utils::minify::minify};
use anyhow::Result;
use std::borrow::Cow;

/// Picks the minifier from the output path, so it belongs after any
/// processor that produces the final markup.
pub struct Minify;

impl Processor for Minify {
    fn description(&self) -> &'static str {
        "minify HTML, XML and JSON output (chosen by extension)"
    }

    fn mode(&self) -> Mode {
        Mode::POST
    }

    fn process(&self, site: &mut Site, page: PageId, _args: &[String]) -> Result<()> {
        let current = site.page(page);
        let minified = match minify(&current.path, current.content()?) {
            Cow::Borrowed(_) => return Ok(()),
            Cow::Owned(text) => text,
        };
        site.page_mut(page).set_content(minified);
        Ok(())
    }
}
