//! Pagination groups.
//!
//! Every `paginate <size> <pattern>` with the same pattern feeds one group.
//! List page `n` shows members `[(n-1)*size, n*size)` of the group in site
//! order. The group is sorted the first time any of its windows is asked
//! for, which only happens once all pages have been peeked.

use super::Site;
use crate::{
    config::Command,
    page::{Page, PageId, site_order},
    processors::COLLECT_PAGES,
};
use anyhow::{Result, anyhow, bail};
use rustc_hash::FxHashMap;
use std::{
    collections::BTreeMap,
    sync::Arc,
    time::{Duration, SystemTime},
};

#[derive(Debug)]
struct Group {
    size: usize,
    members: Vec<PageId>,
    /// List page `n` is `lists[n - 1]`
    lists: Vec<PageId>,
    sorted: bool,
}

/// One list page's slice of its group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub number: usize,
    /// Number of list pages in the group
    pub total: usize,
    pub pages: Vec<PageId>,
    pub prev: Option<PageId>,
    pub next: Option<PageId>,
}

#[derive(Debug, Default)]
pub(super) struct Paginations {
    groups: BTreeMap<String, Group>,
    /// List page → (group pattern, page number)
    lists: FxHashMap<PageId, (String, usize)>,
}

impl Paginations {
    /// Append `page` to the group for `pattern`. Returns the number of the
    /// list page it lands on, and whether that list page is still missing.
    fn add(&mut self, pattern: &str, size: usize, page: PageId) -> Result<(usize, bool)> {
        let group = self
            .groups
            .entry(pattern.to_owned())
            .or_insert_with(|| Group {
                size,
                members: Vec::new(),
                lists: Vec::new(),
                sorted: false,
            });
        if group.size != size {
            bail!(
                "pagination '{pattern}' uses page size {} and {size}",
                group.size
            );
        }

        group.members.push(page);
        let number = group.members.len().div_ceil(size);
        Ok((number, group.lists.len() < number))
    }

    fn register_list(&mut self, pattern: &str, number: usize, list: PageId) {
        if let Some(group) = self.groups.get_mut(pattern) {
            group.lists.push(list);
        }
        self.lists.insert(list, (pattern.to_owned(), number));
    }

    fn check_size(&self, list: PageId, size: usize) -> Result<()> {
        let (pattern, _) = self
            .lists
            .get(&list)
            .ok_or_else(|| anyhow!("not a list page generated by paginate"))?;
        let group = self
            .groups
            .get(pattern)
            .ok_or_else(|| anyhow!("pagination '{pattern}' has no pages"))?;
        if group.size != size {
            bail!(
                "list page size {size} does not match pagination '{pattern}' size {}",
                group.size
            );
        }
        Ok(())
    }

    /// Drop ignored members and return the list pages left with nothing to
    /// show. Runs once every page is peeked, before any window is cut.
    pub fn surplus_lists(&mut self, pages: &[Page]) -> Vec<PageId> {
        let mut surplus = Vec::new();
        for group in self.groups.values_mut() {
            group.members.retain(|id| !pages[id.0].is_ignored());
            let needed = group.members.len().div_ceil(group.size);
            if group.lists.len() > needed {
                surplus.extend(group.lists.split_off(needed));
            }
        }
        for list in &surplus {
            self.lists.remove(list);
        }
        surplus
    }

    /// Resolve the window of a list page, sorting its group on first use.
    pub fn window(&mut self, list: PageId, pages: &[Page]) -> Option<Window> {
        let (pattern, number) = self.lists.get(&list)?;
        let number = *number;
        let group = self.groups.get_mut(pattern)?;

        if !group.sorted {
            group.members.retain(|id| !pages[id.0].is_ignored());
            group
                .members
                .sort_by(|a, b| site_order(&pages[a.0], &pages[b.0]));
            group.sorted = true;
        }

        let start = ((number - 1) * group.size).min(group.members.len());
        let end = (number * group.size).min(group.members.len());
        Some(Window {
            number,
            total: group.lists.len(),
            pages: group.members[start..end].to_vec(),
            prev: number.checked_sub(2).and_then(|i| group.lists.get(i).copied()),
            next: group.lists.get(number).copied(),
        })
    }
}

impl Site {
    /// Add `page` to the paginated list for `pattern`, generating the list
    /// page it lands on if this is its first member.
    pub fn paginate(&mut self, page: PageId, size: usize, pattern: &str) -> Result<()> {
        let (number, missing) = self.paginations.add(pattern, size, page)?;
        if !missing {
            return Ok(());
        }

        let source = pattern.replacen('*', &number.to_string(), 1);
        let (matched, rule) = self
            .rules()
            .matches(&source)
            .map(|(p, rule)| (p.to_owned(), rule))
            .ok_or_else(|| anyhow!("list page path '{source}' does not match any rule"))?;
        let rule = Arc::new(rule.with_leading(Command::new(
            COLLECT_PAGES,
            vec![size.to_string()],
        )));

        let mod_time = SystemTime::UNIX_EPOCH + Duration::from_secs(number as u64);
        let list = Page::synthetic(source, number.to_string(), mod_time, &matched, rule);
        let id = self.inject(page, list)?;
        self.paginations.register_list(pattern, number, id);
        Ok(())
    }

    /// Check that `list` is a generated list page of a group with `size`.
    pub fn bind_window(&mut self, list: PageId, size: usize) -> Result<()> {
        self.paginations.check_size(list, size)
    }

    pub(crate) fn paginator(&mut self, list: PageId) -> Option<Window> {
        self.paginations.window(list, &self.pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::header::parse_date;
    use std::path::PathBuf;

    fn pages(count: usize) -> Vec<Page> {
        (1..=count)
            .map(|i| {
                let mut page = Page::new(
                    format!("blog/{i}.md"),
                    PathBuf::new(),
                    SystemTime::UNIX_EPOCH,
                    None,
                );
                page.header.date = parse_date(&format!("2020-01-{i:02}"));
                page
            })
            .collect()
    }

    /// Group of `count` members, `size` per page, with list page ids after them.
    fn group(count: usize, size: usize) -> Paginations {
        let mut p = Paginations::default();
        for i in 0..count {
            let (number, missing) = p.add("page/*", size, PageId(i)).unwrap();
            if missing {
                p.register_list("page/*", number, PageId(100 + number));
            }
        }
        p
    }

    #[test]
    fn test_list_count_is_ceiling() {
        assert_eq!(group(5, 2).groups["page/*"].lists.len(), 3);
        assert_eq!(group(4, 2).groups["page/*"].lists.len(), 2);
        assert_eq!(group(1, 10).groups["page/*"].lists.len(), 1);
    }

    #[test]
    fn test_windows_cover_members_once() {
        let all = pages(7);
        let mut p = group(7, 3);

        let mut seen: Vec<PageId> = Vec::new();
        for n in 1..=3 {
            let window = p.window(PageId(100 + n), &all).unwrap();
            assert_eq!(window.number, n);
            assert_eq!(window.total, 3);
            seen.extend(window.pages);
        }
        // Newest first
        assert_eq!(seen.first(), Some(&PageId(6)));
        seen.sort();
        assert_eq!(seen, (0..7).map(PageId).collect::<Vec<_>>());
    }

    #[test]
    fn test_prev_next() {
        let all = pages(5);
        let mut p = group(5, 2);
        let first = p.window(PageId(101), &all).unwrap();
        assert_eq!((first.prev, first.next), (None, Some(PageId(102))));
        let last = p.window(PageId(103), &all).unwrap();
        assert_eq!((last.prev, last.next), (Some(PageId(102)), None));
    }

    #[test]
    fn test_ignored_members_dropped() {
        let mut all = pages(3);
        all[2].ignore();
        let mut p = group(3, 5);
        let window = p.window(PageId(101), &all).unwrap();
        assert_eq!(window.pages, vec![PageId(1), PageId(0)]);
    }

    #[test]
    fn test_surplus_lists() {
        let mut all = pages(5);
        all[3].ignore();
        all[4].ignore();
        let mut p = group(5, 2);

        // 3 members left need 2 list pages out of 3
        assert_eq!(p.surplus_lists(&all), vec![PageId(103)]);
        assert!(p.window(PageId(103), &all).is_none());
        let last = p.window(PageId(102), &all).unwrap();
        assert_eq!((last.total, last.next), (2, None));
        assert_eq!(last.pages, vec![PageId(0)]);

        assert!(p.surplus_lists(&all).is_empty());
    }

    #[test]
    fn test_size_mismatch() {
        let mut p = group(1, 2);
        assert!(p.add("page/*", 3, PageId(9)).is_err());
        assert!(p.check_size(PageId(101), 2).is_ok());
        assert!(p.check_size(PageId(101), 3).is_err());
        assert!(p.check_size(PageId(0), 2).is_err());
    }

    #[test]
    fn test_not_a_list_page() {
        let mut p = group(2, 2);
        assert!(p.window(PageId(0), &pages(2)).is_none());
    }
}
