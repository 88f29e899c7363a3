use super::Site;
use crate::{
    page::{Page, PageId},
    template::PageView,
};
use anyhow::Result;
use minijinja::{Value, context};
use std::sync::Arc;

/// View of a page other than the one being rendered. Static files and
/// unreadable sources show up with empty text.
fn view(page: &Page) -> Value {
    if page.is_static() {
        return PageView::new(page, Arc::from(""), Arc::from("")).into_value();
    }
    let raw = page.raw_handle().unwrap_or_else(|_| Arc::from(""));
    let content = page.content_handle().unwrap_or_else(|_| Arc::clone(&raw));
    PageView::new(page, raw, content).into_value()
}

impl Site {
    /// Everything a template sees while rendering `id`.
    pub fn template_context(&mut self, id: PageId) -> Result<Value> {
        let window = self.paginator(id);

        let page = &self.pages[id.0];
        let content = page.content_handle()?;
        let current = PageView::new(page, page.raw_handle()?, Arc::clone(&content)).into_value();

        let pages: Vec<Value> = self
            .order
            .iter()
            .map(|&other| {
                if other == id {
                    current.clone()
                } else {
                    view(&self.pages[other.0])
                }
            })
            .collect();

        let url = |id: PageId| format!("/{}", self.pages[id.0].url());
        let paginator = window.map(|w| {
            context! {
                number => w.number,
                total => w.total,
                pages => w.pages.iter().map(|&p| view(&self.pages[p.0])).collect::<Vec<_>>(),
                prev => w.prev.map(url),
                next => w.next.map(url),
            }
        });

        Ok(context! {
            page => current,
            content => Value::from(content),
            site => context! {
                pages => pages,
                vars => &self.config.vars,
                source => self.config.source.to_string_lossy(),
                output => self.config.output.to_string_lossy(),
            },
            paginator => paginator,
        })
    }
}
