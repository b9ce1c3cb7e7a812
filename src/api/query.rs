use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

const SOQL_TIMESTAMP: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "ASC"),
            Self::Desc => write!(f, "DESC"),
        }
    }
}

/// A half-open date window over one timestamp column, rendered as SoQL.
#[derive(Debug, Clone, PartialEq)]
pub struct SoqlQuery {
    field: String,
    start: NaiveDateTime,
    end: NaiveDateTime,
    direction: SortDirection,
    tiebreaker: Option<String>,
}

impl SoqlQuery {
    /// Records with `start <= field < end`, newest first.
    pub fn between(field: &str, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            field: field.to_string(),
            start,
            end,
            direction: SortDirection::Desc,
            tiebreaker: None,
        }
    }

    pub fn order_by(mut self, direction: SortDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Secondary ascending sort key. Crash timestamps are not unique, and
    /// offset paging over a non-total order can skip or repeat rows at page
    /// boundaries.
    pub fn with_tiebreaker(mut self, field: Option<&str>) -> Self {
        self.tiebreaker = field.filter(|f| !f.trim().is_empty()).map(str::to_string);
        self
    }

    /// `$where` value
    pub fn where_clause(&self) -> String {
        format!(
            "{field} >= '{}' AND {field} < '{}'",
            self.start.format(SOQL_TIMESTAMP),
            self.end.format(SOQL_TIMESTAMP),
            field = self.field
        )
    }

    /// `$order` value
    pub fn order_clause(&self) -> String {
        match &self.tiebreaker {
            Some(tiebreaker) => format!("{} {}, {} ASC", self.field, self.direction, tiebreaker),
            None => format!("{} {}", self.field, self.direction),
        }
    }

    /// Query-string pairs for one page.
    pub fn page_params(&self, limit: usize, offset: usize) -> Vec<(&'static str, String)> {
        vec![
            ("$limit", limit.to_string()),
            ("$offset", offset.to_string()),
            ("$where", self.where_clause()),
            ("$order", self.order_clause()),
        ]
    }
}
