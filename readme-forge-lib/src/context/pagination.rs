//! Page-count inference from web-linking headers.
//!
//! The provider advertises pagination as `<url>; rel="next", <url>; rel="last"`. Reading
//! the `page` query parameter of the `last` relation tells us how many pages exist without
//! walking them, which in turn lets us jump straight to the middle and final pages.

use url::Url;

/// Derived page counts for a paginated listing. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageInfo {
    pub last_page: Option<u32>,
    pub middle_page: Option<u32>,
}

impl PageInfo {
    /// Exactly one page exists.
    pub const SINGLE: Self = Self {
        last_page: Some(1),
        middle_page: Some(1),
    };

    /// Whether only the first page is worth fetching.
    ///
    /// Undetermined counts are treated as a single page.
    #[must_use]
    pub const fn is_single_page(&self) -> bool {
        match (self.last_page, self.middle_page) {
            (Some(last), Some(middle)) => last <= 1 || last == middle,
            _ => true,
        }
    }
}

/// Infer the last page and the midpoint page from a link header.
///
/// No header or no `last` relation means a single page. A `last` relation whose page is
/// missing, unparseable, or below 1 yields an undetermined [`PageInfo`]. The midpoint is
/// the ceiling of half, so odd counts favor the later half.
#[must_use]
pub fn infer_last_and_middle(link_header: Option<&str>) -> PageInfo {
    let Some(last_url) = link_header.and_then(|header| find_relation(header, "last")) else {
        return PageInfo::SINGLE;
    };

    match page_number(last_url) {
        Some(last) if last >= 1 => {
            let last = u32::try_from(last).unwrap_or(u32::MAX);
            PageInfo {
                last_page: Some(last),
                middle_page: Some(last / 2 + last % 2),
            }
        }
        _ => PageInfo::default(),
    }
}

/// Find the URL tagged with relation `rel` in a link header.
fn find_relation<'a>(header: &'a str, rel: &str) -> Option<&'a str> {
    header.split(',').find_map(|token| {
        let mut parts = token.split(';');
        let target = parts.next()?.trim().strip_prefix('<')?.strip_suffix('>')?;

        let matches = parts.any(|param| {
            param
                .trim()
                .strip_prefix("rel=")
                .is_some_and(|value| value.trim_matches('"').split_whitespace().any(|r| r == rel))
        });

        matches.then_some(target)
    })
}

fn page_number(url: &str) -> Option<i64> {
    let url = Url::parse(url).ok()?;
    url.query_pairs()
        .find(|(name, _)| name == "page")
        .and_then(|(_, value)| value.parse::<i64>().ok())
}
