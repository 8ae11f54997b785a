//! Cursor pagination
//!
//! A [`PageQuery`] turns (cursor, order, limit) into an exclusive range
//! predicate plus a matching ORDER BY. Because the boundary is strict and the
//! ordering column is unique, requesting the next page from the last returned
//! cursor never repeats or skips a record.

use crate::error::{Error, Result};
use crate::query::Select;
use serde::Serialize;
use std::fmt;

/// Page size used when none is given
pub const DEFAULT_LIMIT: u64 = 10;

/// Largest page size accepted
pub const MAX_LIMIT: u64 = 200;

/// Sort order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    /// Ascending
    Asc,
    /// Descending
    Desc,
}

impl Order {
    /// Parse `asc` / `desc`; empty means ascending
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "" | "asc" => Ok(Order::Asc),
            "desc" => Ok(Order::Desc),
            other => Err(Error::invalid_field(
                "order",
                format!("`{}` is not one of asc, desc", other),
            )),
        }
    }

    /// Query-string form
    pub fn as_str(self) -> &'static str {
        match self {
            Order::Asc => "asc",
            Order::Desc => "desc",
        }
    }

    /// The opposite order
    pub fn invert(self) -> Self {
        match self {
            Order::Asc => Order::Desc,
            Order::Desc => Order::Asc,
        }
    }

    fn comparator(self) -> &'static str {
        match self {
            Order::Asc => ">",
            Order::Desc => "<",
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated paging parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    /// Opaque cursor; empty means "from the start" in the requested order
    pub cursor: String,
    /// Sort order
    pub order: Order,
    /// Maximum records per page
    pub limit: u64,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            cursor: String::new(),
            order: Order::Asc,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageQuery {
    /// Build with an explicit limit bound
    pub fn new(
        cursor: impl Into<String>,
        order: Order,
        limit: u64,
        max_limit: u64,
    ) -> Result<Self> {
        if limit == 0 {
            return Err(Error::invalid_field("limit", "must be positive"));
        }
        if limit > max_limit {
            return Err(Error::invalid_field(
                "limit",
                format!("must not exceed {}", max_limit),
            ));
        }
        Ok(Self {
            cursor: cursor.into(),
            order,
            limit,
        })
    }

    /// Build from raw request strings
    pub fn from_params(
        cursor: Option<&str>,
        order: Option<&str>,
        limit: Option<&str>,
        default_limit: u64,
        max_limit: u64,
    ) -> Result<Self> {
        let order = Order::parse(order.unwrap_or_default())?;
        let limit = match limit {
            None | Some("") => default_limit,
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| Error::invalid_field("limit", format!("`{}` is not a number", raw)))?,
        };
        PageQuery::new(cursor.unwrap_or_default(), order, limit, max_limit)
    }

    /// Cursor as an i64; an empty cursor starts at the edge of the order
    pub fn cursor_i64(&self) -> Result<i64> {
        if self.cursor.is_empty() {
            return Ok(match self.order {
                Order::Asc => 0,
                Order::Desc => i64::MAX,
            });
        }
        let value: i64 = self
            .cursor
            .parse()
            .map_err(|_| Error::InvalidCursor(format!("`{}` is not an integer", self.cursor)))?;
        if value < 0 {
            return Err(Error::InvalidCursor(format!("`{}` is negative", self.cursor)));
        }
        Ok(value)
    }

    /// Same position, opposite order
    pub fn invert(&self) -> Self {
        Self {
            order: self.order.invert(),
            ..self.clone()
        }
    }

    /// Same order and limit, starting after `cursor`
    pub fn with_cursor(&self, cursor: impl Into<String>) -> Self {
        Self {
            cursor: cursor.into(),
            ..self.clone()
        }
    }

    /// Push `column <op> cursor`, `ORDER BY column`, and `LIMIT` onto a select
    pub fn apply(&self, select: &mut Select<'_>, column: &str) -> Result<()> {
        let cursor = self.cursor_i64()?;
        select
            .and_where()
            .push(format!("{} {} ", column, self.order.comparator()))
            .push_bind(cursor);
        select
            .push(format!(" ORDER BY {} {} LIMIT ", column, self.order.keyword()))
            .push_bind(self.limit as i64);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_params_defaults() {
        let page = PageQuery::from_params(None, None, None, 10, 200).unwrap();
        assert_eq!(page, PageQuery::default());
        assert_eq!(page.cursor_i64().unwrap(), 0);
    }

    #[test]
    fn test_desc_default_cursor_is_max() {
        let page = PageQuery::from_params(None, Some("desc"), Some("5"), 10, 200).unwrap();
        assert_eq!(page.cursor_i64().unwrap(), i64::MAX);
        assert_eq!(page.limit, 5);
    }

    #[test]
    fn test_rejects_bad_limits_and_order() {
        assert!(matches!(
            PageQuery::from_params(None, None, Some("0"), 10, 200),
            Err(Error::Validation { .. })
        ));
        assert!(PageQuery::from_params(None, None, Some("201"), 10, 200).is_err());
        assert!(PageQuery::from_params(None, None, Some("ten"), 10, 200).is_err());
        assert!(PageQuery::from_params(None, Some("sideways"), None, 10, 200).is_err());
    }

    #[test]
    fn test_invalid_cursor() {
        let page = PageQuery::default().with_cursor("12abc");
        assert!(matches!(page.cursor_i64(), Err(Error::InvalidCursor(_))));
        let page = PageQuery::default().with_cursor("-4");
        assert!(matches!(page.cursor_i64(), Err(Error::InvalidCursor(_))));
    }

    #[test]
    fn test_apply_asc_and_desc() {
        let mut asc = Select::new("SELECT co.offerid FROM offers co");
        PageQuery::default().with_cursor("7").apply(&mut asc, "co.offerid").unwrap();
        assert_eq!(
            asc.sql(),
            "SELECT co.offerid FROM offers co WHERE co.offerid > ? ORDER BY co.offerid ASC LIMIT ?"
        );

        let mut desc = Select::new("SELECT co.offerid FROM offers co");
        desc.and_where().push("co.sellerid = ?");
        PageQuery::default().invert().apply(&mut desc, "co.offerid").unwrap();
        assert_eq!(
            desc.sql(),
            "SELECT co.offerid FROM offers co WHERE co.sellerid = ? AND co.offerid < ? ORDER BY co.offerid DESC LIMIT ?"
        );
    }
}
