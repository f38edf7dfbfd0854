//! Product listing query builder.
//!
//! Turns the raw `search`/`sort`/`page`/`limit` request parameters into a
//! normalized [`ProductQuery`] and renders its filter and ordering as SQL
//! for the products table.

/// Default number of products per page.
pub const DEFAULT_LIMIT: i64 = 12;
/// Maximum number of products per page.
pub const MAX_LIMIT: i64 = 100;

/// Character used to escape `LIKE` wildcards.
const LIKE_ESCAPE: char = '\\';

/// Raw listing parameters as they arrive in the query string.
///
/// Everything is text so malformed numbers degrade to defaults instead of
/// rejecting the request.
#[derive(Debug, Default, Clone)]
pub struct ListParams {
    pub search: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl ListParams {
    /// Collect from decoded query pairs. The first occurrence of a key wins;
    /// unknown keys are ignored.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "search" => &mut params.search,
                "sort" => &mut params.sort,
                "page" => &mut params.page,
                "limit" => &mut params.limit,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        params
    }
}

/// Result ordering for product listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    PriceAsc,
    PriceDesc,
}

impl SortOrder {
    /// Unrecognized values fall back to [`SortOrder::Newest`].
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "oldest" => SortOrder::Oldest,
            "price_asc" => SortOrder::PriceAsc,
            "price_desc" => SortOrder::PriceDesc,
            _ => SortOrder::Newest,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Newest => "newest",
            SortOrder::Oldest => "oldest",
            SortOrder::PriceAsc => "price_asc",
            SortOrder::PriceDesc => "price_desc",
        }
    }

    /// `ORDER BY` body. Insertion order breaks ties so pages never overlap.
    pub fn order_by(&self) -> &'static str {
        match self {
            SortOrder::Newest => "created_at DESC, rowid DESC",
            SortOrder::Oldest => "created_at ASC, rowid ASC",
            SortOrder::PriceAsc => "price ASC, rowid ASC",
            SortOrder::PriceDesc => "price DESC, rowid DESC",
        }
    }
}

/// A normalized listing request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductQuery {
    /// Trimmed search text; `None` when blank.
    pub search: Option<String>,
    pub sort: SortOrder,
    /// 1-based page number
    pub page: i64,
    /// Page size in `[1, MAX_LIMIT]`
    pub limit: i64,
}

impl ProductQuery {
    pub fn from_params(params: &ListParams) -> Self {
        let search = params
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let sort = params
            .sort
            .as_deref()
            .map(SortOrder::parse)
            .unwrap_or_default();

        let page = parse_int(params.page.as_deref()).unwrap_or(1).max(1);
        let limit = parse_int(params.limit.as_deref())
            .unwrap_or(DEFAULT_LIMIT)
            .clamp(1, MAX_LIMIT);

        Self {
            search,
            sort,
            page,
            limit,
        }
    }

    /// Rows to skip before the requested page.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// The `LIKE` pattern for the search text: lower-cased to match the
    /// folded search column, wildcards escaped.
    pub fn like_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(|s| format!("%{}%", escape_like(&s.to_lowercase())))
    }

    /// `WHERE` clause (possibly empty) and the number of times
    /// [`ProductQuery::like_pattern`] must be bound into it.
    pub fn where_clause(&self) -> (&'static str, usize) {
        if self.search.is_none() {
            return ("", 0);
        }
        (r#"WHERE search_text LIKE ? ESCAPE '\'"#, 1)
    }
}

/// Separator between fields in the folded search column. Never typed by
/// users, so a match cannot straddle two fields.
pub const SEARCH_SEPARATOR: &str = "\u{1f}";

/// Fold searchable fields (name, brand, category, description, sku, tags)
/// into the lower-cased text stored alongside each product.
pub fn search_text<'a>(fields: impl IntoIterator<Item = &'a str>) -> String {
    fields
        .into_iter()
        .collect::<Vec<_>>()
        .join(SEARCH_SEPARATOR)
        .to_lowercase()
}

/// Escape `LIKE` wildcards so user text matches literally.
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '%' || c == '_' || c == LIKE_ESCAPE {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// Parse a query-string integer. Fractions truncate; garbage yields `None`.
fn parse_int(raw: Option<&str>) -> Option<i64> {
    let raw = raw?.trim();
    raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(|n| n.trunc() as i64)
    })
}
