//! Identity-based Range pagination.
//!
//! Clients ask for a page with `Range: id ]<id>..; max=<n>` (exclusive
//! boundary) or `Range: id <id>..` (inclusive). Responses describe the page
//! with `Content-Range: id <first>..<last>` and, when more records remain,
//! hand back the request for the following page in `Next-Range`.

use super::models::Notification;

pub const ACCEPT_RANGES: &str = "id";
pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

const RANGE_UNIT: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    /// Used when the client gives no usable `max`.
    pub default_size: usize,
    /// Ceiling applied to the client's `max`.
    pub max_size: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_size: DEFAULT_PAGE_SIZE,
            max_size: MAX_PAGE_SIZE,
        }
    }
}

/// A parsed `Range` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeHeader {
    pub id: Option<i64>,
    pub inclusive: bool,
    pub max: usize,
}

impl RangeHeader {
    pub fn from_top(max: usize) -> Self {
        Self {
            id: None,
            inclusive: true,
            max,
        }
    }

    /// Parses a `Range` header value. Never fails: anything that can't be
    /// understood falls back to the first page with the default size.
    pub fn parse(value: &str, limits: PageLimits) -> Self {
        let mut range = Self::from_top(limits.default_size);

        let Some(rest) = value.trim().strip_prefix(RANGE_UNIT) else {
            return range;
        };
        let mut parts = rest.split(';');

        let boundary = parts.next().unwrap_or_default().trim();
        let (boundary, inclusive) = match boundary.strip_prefix(']') {
            Some(rest) => (rest.trim(), false),
            None => (boundary, true),
        };
        let boundary = boundary.strip_suffix("..").unwrap_or(boundary).trim();
        if let Ok(id) = boundary.parse::<i64>() {
            range.id = Some(id);
            range.inclusive = inclusive;
        }

        for param in parts {
            let Some((name, value)) = param.split_once('=') else {
                continue;
            };
            if name.trim() != "max" {
                continue;
            }
            range.max = match value.trim().parse::<usize>() {
                Ok(max) if max > 0 => max.min(limits.max_size),
                _ => limits.default_size,
            };
        }
        range
    }
}

/// One page of a feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub notifications: Vec<Notification>,
    /// Whether records remain after the last one in the page.
    pub has_more: bool,
}

impl Page {
    pub fn first_id(&self) -> Option<i64> {
        self.notifications.first().and_then(|n| n.id)
    }

    pub fn last_id(&self) -> Option<i64> {
        self.notifications.last().and_then(|n| n.id)
    }

    /// `Content-Range` value. An empty page reports the feed size instead.
    pub fn content_range(&self, feed_size: usize) -> String {
        match (self.first_id(), self.last_id()) {
            (Some(first), Some(last)) => format!("{} {}..{}", RANGE_UNIT, first, last),
            _ => format!("{} */{}", RANGE_UNIT, feed_size),
        }
    }

    /// `Next-Range` value, present only while more records remain.
    pub fn next_range(&self, max: usize) -> Option<String> {
        if !self.has_more {
            return None;
        }
        self.last_id()
            .map(|last| format!("{} ]{}..; max={}", RANGE_UNIT, last, max))
    }
}

/// Walks notifications in descending identity order, starting at `start_id`
/// and taking at most `max` records.
pub fn skip<'a>(
    notifications: impl IntoIterator<Item = &'a Notification>,
    start_id: i64,
    inclusive: bool,
    max: usize,
) -> Page {
    let mut remaining = notifications.into_iter().skip_while(|n| {
        n.id.is_some_and(|id| if inclusive { id > start_id } else { id >= start_id })
    });
    let notifications: Vec<Notification> = remaining.by_ref().take(max).cloned().collect();
    Page {
        notifications,
        has_more: remaining.next().is_some(),
    }
}

/// Applies a range request to a descending list of notifications. A boundary
/// that is not in the list restarts from the highest identity.
pub fn paginate(notifications: &[Notification], range: &RangeHeader) -> Page {
    debug_assert!(
        notifications
            .windows(2)
            .all(|pair| pair[0].cmp_by_id(&pair[1]).is_lt()),
        "notifications must be in feed order"
    );
    let boundary = range
        .id
        .filter(|id| notifications.iter().any(|n| n.id == Some(*id)));

    match boundary {
        Some(id) => skip(notifications, id, range.inclusive, range.max),
        None => match notifications.first().and_then(|n| n.id) {
            Some(top) => skip(notifications, top, true, range.max),
            None => Page::default(),
        },
    }
}
