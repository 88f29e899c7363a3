use super::{Mode, Processor, expect_args};
use crate::{page::PageId, site::Site};
use anyhow::Result;

/// Generates one page per tag, e.g. `tags tags/*.tag` makes `tags/rust.tag`
/// for a page tagged `rust`. Tag pages have no content of their own and
/// the oldest possible mtime, so they only rebuild when a dependency does.
pub struct Tags;

impl Processor for Tags {
    fn description(&self) -> &'static str {
        "generate tag pages for tags mentioned in page header (argument: tag page path pattern)"
    }

    fn mode(&self) -> Mode {
        Mode::PRE
    }

    fn process(&self, site: &mut Site, page: PageId, args: &[String]) -> Result<()> {
        expect_args("tags", args, 1)?;
        for tag in site.page(page).header.tags.clone() {
            site.add_tag(page, &args[0], &tag)?;
        }
        Ok(())
    }
}
