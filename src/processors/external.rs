use super::Processor;
use crate::{
    page::PageId,
    site::Site,
    utils::exec::{resolve_program, run_filter},
};
use anyhow::{Context, Result, bail};

/// `external prog args...`, or `:prog args...` in a rule.
pub struct External;

impl Processor for External {
    fn description(&self) -> &'static str {
        "run an external command to process content (shortcut ':')"
    }

    fn process(&self, site: &mut Site, page: PageId, args: &[String]) -> Result<()> {
        let Some((program, rest)) = args.split_first() else {
            bail!("external needs a command name");
        };

        let base = site.config().base.clone();
        let program = resolve_program(program, &base)?;
        let input = site.page(page).content_handle()?;

        let output = run_filter(&program, rest, &base, input.as_bytes(), site.timeout())
            .with_context(|| format!("'{}' failed", args.join(" ")))?;
        let text = String::from_utf8(output)
            .with_context(|| format!("'{}' produced invalid UTF-8", args.join(" ")))?;

        site.page_mut(page).set_content(text);
        Ok(())
    }
}
