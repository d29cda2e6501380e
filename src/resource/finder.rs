//! Finder helpers
//!
//! Drives token-based pagination for list calls and folds remote
//! not-found codes into the `Option`/`Ok(())` shapes the handlers need.

use crate::error::{ProviderError, Result};
use std::future::Future;

/// One page of a list call
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_token: Option<String>) -> Self {
        // Some services return "" instead of omitting the token on the last page
        let next_token = next_token.filter(|t| !t.is_empty());
        Self { items, next_token }
    }
}

/// Fetch all pages (auto-paginate)
pub async fn list_all<T, F, Fut>(mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut all_items = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = fetch_page(page_token.take()).await?;
        all_items.extend(page.items);

        if page.next_token.is_none() {
            break;
        }
        page_token = page.next_token;
    }

    Ok(all_items)
}

/// Return the first item matching `predicate`, stopping at the page that
/// contains it. `NotFound` when every page is exhausted.
pub async fn find_first<T, F, Fut, P>(what: &str, mut fetch_page: F, predicate: P) -> Result<T>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
    P: Fn(&T) -> bool,
{
    let mut page_token: Option<String> = None;

    loop {
        let page = fetch_page(page_token.take()).await?;
        if let Some(item) = page.items.into_iter().find(|item| predicate(item)) {
            return Ok(item);
        }

        match page.next_token {
            Some(token) => page_token = Some(token),
            None => return Err(ProviderError::not_found(what)),
        }
    }
}

/// Turn a not-found error into `None`
pub fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Treat "already gone" as success
pub fn ignore_not_found(result: Result<()>) -> Result<()> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

/// Map any remote not-found code onto a local `NotFound` naming the object
pub fn normalize_not_found<T>(result: Result<T>, what: &str) -> Result<T> {
    result.map_err(|e| {
        if e.is_not_found() {
            ProviderError::not_found(what)
        } else {
            e
        }
    })
}
