//! Page reader: transport + retry + paginator
//!
//! A [`PageReader`] is the lazy, finite sequence of decoded pages for one
//! stream instance. It stops when the paginator reports no further page,
//! when the page limit is reached, or (with an error) when the run is
//! cancelled before the next request is issued.

use super::types::{NextPage, PageRequest, PaginationState, Paginator, ResponseFormat};
use crate::error::{Error, Result};
use crate::http::{HttpResponse, RetryPolicy, Transport};
use futures::Stream;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One decoded page
#[derive(Debug, Clone)]
pub struct Page {
    /// 1-based page number within this instance
    pub number: usize,
    /// Decoded records in server order
    pub records: Vec<Value>,
    /// Whether another page will be requested
    pub has_more: bool,
}

/// Drives the HTTP calls for one paginated resource
pub struct PageReader {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    paginator: Box<dyn Paginator>,
    format: ResponseFormat,
    request: PageRequest,
    state: PaginationState,
    max_pages: usize,
    cancel: CancellationToken,
    truncated: bool,
}

impl PageReader {
    /// Create a reader for the first page of `request`
    pub fn new(
        transport: Arc<dyn Transport>,
        retry: RetryPolicy,
        paginator: Box<dyn Paginator>,
        request: PageRequest,
    ) -> Self {
        Self {
            transport,
            retry,
            paginator,
            format: ResponseFormat::Json,
            request,
            state: PaginationState::new(),
            max_pages: usize::MAX,
            cancel: CancellationToken::new(),
            truncated: false,
        }
    }

    /// Set the hard page limit
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Set how response bodies are decoded
    #[must_use]
    pub fn with_format(mut self, format: ResponseFormat) -> Self {
        self.format = format;
        self
    }

    /// Observe a run-wide cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Pages fetched so far
    pub fn pages_fetched(&self) -> usize {
        self.state.pages
    }

    /// Whether the page limit cut the sequence short
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Fetch the next page, or `None` once exhausted
    pub async fn next_page(&mut self) -> Result<Option<Page>> {
        if self.state.done {
            return Ok(None);
        }
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut query = self.request.query.clone();
        query.extend(self.paginator.page_params(self.request.page_token.as_deref()));

        let url = self.request.url.clone();
        let transport = &self.transport;
        let response = self
            .retry
            .execute(&url, || transport.get(&url, &query))
            .await?;

        let records = self.format.decode(&response)?;
        let number = self.state.pages + 1;
        debug!(
            url = %url,
            page = number,
            records = records.len(),
            "Fetched page"
        );

        let next = self
            .paginator
            .process_response(&response, &mut self.state);

        match next {
            NextPage::Continue { token } => {
                if self.state.pages >= self.max_pages {
                    warn!(
                        url = %url,
                        max_pages = self.max_pages,
                        "Page limit reached, stopping before page {}",
                        token
                    );
                    self.truncated = true;
                    self.state.mark_done();
                } else {
                    self.request = self.request.with_page(token);
                }
            }
            NextPage::Done => self.state.mark_done(),
        }

        Ok(Some(Page {
            number,
            records,
            has_more: !self.state.done,
        }))
    }

    /// Expose the pages as a `futures::Stream`
    pub fn into_stream(self) -> impl Stream<Item = Result<Page>> + Send {
        futures::stream::try_unfold(self, |mut reader| async move {
            let page = reader.next_page().await?;
            Ok(page.map(|page| (page, reader)))
        })
    }
}

impl std::fmt::Debug for PageReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageReader")
            .field("format", &self.format)
            .field("request", &self.request)
            .field("state", &self.state)
            .field("max_pages", &self.max_pages)
            .field("truncated", &self.truncated)
            .finish_non_exhaustive()
    }
}

/// Decode a body holding an array of objects, a single object, or nothing
pub fn decode_records(response: &HttpResponse) -> Result<Vec<Value>> {
    if response.body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let value: Value = serde_json::from_str(&response.body)
        .map_err(|e| Error::decode(format!("invalid JSON body: {e}")))?;

    match value {
        Value::Array(items) => Ok(items),
        Value::Object(_) => Ok(vec![value]),
        Value::Null => Ok(Vec::new()),
        other => Err(Error::decode(format!(
            "expected an array or object, got {other}"
        ))),
    }
}
