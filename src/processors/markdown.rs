use super::Processor;
use crate::{page::PageId, site::Site, utils::markdown::to_html};
use anyhow::Result;

pub struct Markdown;

impl Processor for Markdown {
    fn description(&self) -> &'static str {
        "process content as Markdown"
    }

    fn process(&self, site: &mut Site, page: PageId, _args: &[String]) -> Result<()> {
        let html = to_html(site.page(page).content()?);
        site.page_mut(page).set_content(html);
        Ok(())
    }
}
