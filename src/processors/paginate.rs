use super::{Mode, Processor, expect_args};
use crate::{page::PageId, site::Site};
use anyhow::{Context, Result};

/// Name of the hidden step prepended to every generated list page.
pub const COLLECT_PAGES: &str = "paginate-collect-pages";

fn parse_size(arg: &str) -> Result<usize> {
    let size: usize = arg
        .parse()
        .with_context(|| format!("page size must be a positive number, got '{arg}'"))?;
    anyhow::ensure!(size > 0, "page size must be a positive number, got '{arg}'");
    Ok(size)
}

/// `paginate <size> <pattern>`: adds the page to the group for `pattern`
/// and generates list pages (`*` replaced by 1, 2, ...) as the group grows.
pub struct Paginate;

impl Processor for Paginate {
    fn description(&self) -> &'static str {
        "add page to a paginated list (arguments: page size, list page path pattern)"
    }

    fn mode(&self) -> Mode {
        Mode::PRE
    }

    fn process(&self, site: &mut Site, page: PageId, args: &[String]) -> Result<()> {
        expect_args("paginate", args, 2)?;
        let size = parse_size(&args[0])?;
        site.paginate(page, size, &args[1])
    }
}

/// Binds a generated list page to its window of the group.
pub struct CollectPages;

impl Processor for CollectPages {
    fn description(&self) -> &'static str {
        "collect pages for a list page generated by paginate"
    }

    fn mode(&self) -> Mode {
        Mode::PRE | Mode::HIDDEN
    }

    fn process(&self, site: &mut Site, page: PageId, args: &[String]) -> Result<()> {
        expect_args(COLLECT_PAGES, args, 1)?;
        let size = parse_size(&args[0])?;
        site.bind_window(page, size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("10").unwrap(), 10);
        assert!(parse_size("0").is_err());
        assert!(parse_size("-1").is_err());
        assert!(parse_size("ten").is_err());
    }
}
