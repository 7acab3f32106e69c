use async_stream::try_stream;
use futures::Stream;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

use super::{ApiRequest, GatewayError, GatewayResult, SharedGateway};

/// Query parameter carrying the page number.
pub const PAGE_PARAM: &str = "page";
/// Query parameter carrying the page size.
pub const PAGE_SIZE_PARAM: &str = "page_size";

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Page<T> {
    /// Total number of items across pages.
    #[serde(default)]
    pub count: u64,
    /// Link to the next page.
    #[serde(default)]
    pub next: Option<String>,
    /// Link to the previous page.
    #[serde(default)]
    pub previous: Option<String>,
    /// Items of this page.
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Page number referenced by the `next` link, if any.
    pub fn next_page(&self) -> Option<u32> {
        self.next.as_deref().and_then(page_number)
    }

    /// Whether another page follows.
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

/// Fetch a single page of `request`.
pub async fn fetch_page<T>(
    gateway: &SharedGateway,
    mut request: ApiRequest,
    page: u32,
    page_size: u32,
) -> GatewayResult<Page<T>>
where
    T: DeserializeOwned,
{
    request.set_query(PAGE_PARAM, page);
    request.set_query(PAGE_SIZE_PARAM, page_size);
    let path = request.path.clone();
    let body = gateway.send(request).await?;
    serde_json::from_value(body).map_err(|source| GatewayError::Decode { path, source })
}

/// Stream every page of `request`, starting at page 1 and following `next` links until the
/// listing is exhausted. The stream ends after the first error.
pub fn paginate(
    gateway: SharedGateway,
    request: ApiRequest,
    page_size: u32,
) -> impl Stream<Item = GatewayResult<Page<Value>>> {
    try_stream! {
        let mut page = 1;
        loop {
            let current: Page<Value> =
                fetch_page(&gateway, request.clone(), page, page_size).await?;
            let next = current.next_page();
            yield current;
            match next {
                Some(number) if number > page => page = number,
                _ => break,
            }
        }
    }
}

/// Extract the `page` query parameter from a `next`/`previous` link.
pub fn page_number(link: &str) -> Option<u32> {
    let (_, query) = link.split_once('?')?;
    let query = query.split('#').next().unwrap_or_default();
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == PAGE_PARAM)
        .and_then(|(_, value)| value.parse().ok())
}
