//! Pagination strategy implementations

use super::types::{NextPage, PaginationState, Paginator};
use crate::http::HttpResponse;

// ============================================================================
// Next-Page Header Pagination
// ============================================================================

/// GitLab page-number pagination driven by the `X-Next-Page` header.
///
/// `X-Total-Pages` is not always present on large collections, so the only
/// continuation signal is a non-empty `X-Next-Page`. A page with zero records
/// but a next-page header still continues.
#[derive(Debug, Clone)]
pub struct NextPageHeaderPaginator {
    /// Value sent as `per_page`
    pub page_size: u32,
}

impl NextPageHeaderPaginator {
    /// Header carrying the next page number
    pub const NEXT_PAGE_HEADER: &'static str = "x-next-page";

    /// Create a new paginator
    pub fn new(page_size: u32) -> Self {
        Self { page_size }
    }
}

impl Default for NextPageHeaderPaginator {
    fn default() -> Self {
        Self::new(100)
    }
}

impl Paginator for NextPageHeaderPaginator {
    fn page_params(&self, token: Option<&str>) -> Vec<(String, String)> {
        vec![
            ("page".to_string(), token.unwrap_or("1").to_string()),
            ("per_page".to_string(), self.page_size.to_string()),
        ]
    }

    fn process_response(&self, response: &HttpResponse, state: &mut PaginationState) -> NextPage {
        state.add_page();

        match response
            .header(Self::NEXT_PAGE_HEADER)
            .map(str::trim)
            .filter(|next| !next.is_empty())
        {
            Some(next) => NextPage::token(next),
            None => {
                state.mark_done();
                NextPage::Done
            }
        }
    }
}

// ============================================================================
// No Pagination
// ============================================================================

/// No pagination - single request
#[derive(Debug, Clone, Default)]
pub struct NoPaginator;

impl Paginator for NoPaginator {
    fn page_params(&self, _token: Option<&str>) -> Vec<(String, String)> {
        Vec::new()
    }

    fn process_response(&self, _response: &HttpResponse, state: &mut PaginationState) -> NextPage {
        state.add_page();
        state.mark_done();
        NextPage::Done
    }
}
