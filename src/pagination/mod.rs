//! Pagination module
//!
//! Supports: GitLab `X-Next-Page` header pagination and single-request endpoints
//!
//! # Overview
//!
//! A [`PageRequest`] describes one request. A [`Paginator`] turns response
//! headers into the next page token, and a [`PageReader`] drives the
//! transport and retry policy to produce a lazy, finite sequence of pages.

mod pages;
mod strategies;
mod types;

pub use pages::{decode_records, Page, PageReader};
pub use strategies::{NextPageHeaderPaginator, NoPaginator};
pub use types::{
    NextPage, PageRequest, PaginationConfig, PaginationState, Paginator, ResponseFormat,
};

#[cfg(test)]
mod tests;
