use super::{Mode, Processor};
use crate::{page::PageId, site::Site};
use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc};

pub struct Ignore;

impl Processor for Ignore {
    fn description(&self) -> &'static str {
        "ignore file"
    }

    fn mode(&self) -> Mode {
        Mode::PRE
    }

    fn process(&self, site: &mut Site, page: PageId, _args: &[String]) -> Result<()> {
        site.page_mut(page).ignore();
        Ok(())
    }
}

pub struct IgnoreFuture;

impl Processor for IgnoreFuture {
    fn description(&self) -> &'static str {
        "ignore file dated in the future"
    }

    fn mode(&self) -> Mode {
        Mode::PRE
    }

    fn process(&self, site: &mut Site, page: PageId, _args: &[String]) -> Result<()> {
        let page = site.page_mut(page);
        if is_future(page.header.date, Utc::now()) {
            page.ignore();
        }
        Ok(())
    }
}

fn is_future(date: Option<DateTime<FixedOffset>>, now: DateTime<Utc>) -> bool {
    date.is_some_and(|date| date > now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::header::parse_date;

    #[test]
    fn test_is_future() {
        let now = parse_date("2024-06-01 12:00").unwrap().to_utc();
        assert!(is_future(parse_date("2024-06-02"), now));
        assert!(!is_future(parse_date("2024-05-31"), now));
        assert!(!is_future(None, now));
    }

    #[test]
    fn test_is_future_respects_offset() {
        let now = parse_date("2024-06-01 12:00").unwrap().to_utc();
        // 13:30 at +02:00 is 11:30 UTC
        assert!(!is_future(parse_date("2024-06-01 13:30:00 +0200"), now));
        assert!(is_future(parse_date("2024-06-01 13:30:00 +0000"), now));
    }
}
