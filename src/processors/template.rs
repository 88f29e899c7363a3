use super::{Processor, expect_args};
use crate::{page::PageId, site::Site};
use anyhow::Result;

/// `template <name>`: render a named template with the page context.
pub struct Template;

impl Processor for Template {
    fn description(&self) -> &'static str {
        "put content in a template (argument: template name)"
    }

    fn process(&self, site: &mut Site, page: PageId, args: &[String]) -> Result<()> {
        expect_args("template", args, 1)?;
        let ctx = site.template_context(page)?;
        let html = site.templates().render(&args[0], ctx)?;
        site.page_mut(page).set_content(html);
        Ok(())
    }
}

/// Render the page content itself as a template.
pub struct InnerTemplate;

impl Processor for InnerTemplate {
    fn description(&self) -> &'static str {
        "render page content as a template"
    }

    fn process(&self, site: &mut Site, page: PageId, _args: &[String]) -> Result<()> {
        let ctx = site.template_context(page)?;
        let current = site.page(page);
        let html = site
            .templates()
            .render_str(&current.source, current.content()?, ctx)?;
        site.page_mut(page).set_content(html);
        Ok(())
    }
}
