use super::{Link, LinkBuilder, Pageable};
use crate::paging::{Order, PageQuery};
use serde::Serialize;

/// Navigation links of a page
#[derive(Debug, Clone, Serialize)]
pub struct PageLinks {
    /// This page
    #[serde(rename = "self")]
    pub self_: Link,
    /// The page after the last record
    pub next: Link,
    /// The page before the first record, in reverse order
    pub prev: Link,
}

#[derive(Debug, Clone, Serialize)]
struct Embedded<R> {
    records: Vec<R>,
}

/// One page of a collection response
#[derive(Debug, Clone, Serialize)]
pub struct Page<R> {
    #[serde(rename = "_links")]
    links: PageLinks,
    #[serde(rename = "_embedded")]
    embedded: Embedded<R>,
    #[serde(skip)]
    cursor: String,
    #[serde(skip)]
    limit: u64,
    #[serde(skip)]
    order: Order,
}

fn page_url(
    links: &LinkBuilder,
    path: &str,
    extra: &[(String, String)],
    cursor: &str,
    order: Order,
    limit: u64,
) -> Link {
    let mut query = format!("cursor={}&limit={}&order={}", cursor, limit, order);
    for (key, value) in extra {
        query.push_str(&format!("&{}={}", key, value));
    }
    links.link(&format!("{}?{}", path, query))
}

impl<R: Pageable> Page<R> {
    /// Assemble a page for the collection at `path`
    ///
    /// `extra` holds the request's filter parameters so the navigation links
    /// keep them.
    pub fn new(
        records: Vec<R>,
        page: &PageQuery,
        links: &LinkBuilder,
        path: &str,
        extra: &[(String, String)],
    ) -> Self {
        let next_cursor = records
            .last()
            .map(|r| r.paging_token().to_string())
            .unwrap_or_else(|| page.cursor.clone());
        let prev_cursor = records
            .first()
            .map(|r| r.paging_token().to_string())
            .unwrap_or_else(|| page.cursor.clone());

        let page_links = PageLinks {
            self_: page_url(links, path, extra, &page.cursor, page.order, page.limit),
            next: page_url(links, path, extra, &next_cursor, page.order, page.limit),
            prev: page_url(links, path, extra, &prev_cursor, page.order.invert(), page.limit),
        };

        Self {
            links: page_links,
            embedded: Embedded { records },
            cursor: page.cursor.clone(),
            limit: page.limit,
            order: page.order,
        }
    }

    /// Records on this page
    pub fn records(&self) -> &[R] {
        &self.embedded.records
    }

    /// Navigation links
    pub fn links(&self) -> &PageLinks {
        &self.links
    }

    /// Cursor the page was requested with
    pub fn cursor(&self) -> &str {
        &self.cursor
    }

    /// Requested limit
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Requested order
    pub fn order(&self) -> Order {
        self.order
    }
}
