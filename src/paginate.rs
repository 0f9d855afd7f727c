//! Paged fetch-and-merge.
//!
//! Upstream inventory APIs return result sets in pages. The [`gather`] driver
//! fetches the first page, asks the adapter-supplied [`Paginator`] how many
//! records exist in total, fans the remaining windows out through the
//! dispatcher, and splices every page's record array into the first page's
//! body in window order. The caller gets back one aggregate plus a
//! `partial_failure` flag; a failed follow-up page degrades the aggregate
//! instead of failing the operation.
//!
//! Three window shapes cover every upstream this engine talks to: offset
//! plus limit, half-open index ranges, and opaque continuation tokens.
//! Offset and range windows are computable up front and fetched as one
//! concurrent batch; token chains are walked sequentially because each token
//! only exists on the page before it.

use serde::Serialize;
use serde_json::Value;

use crate::descriptor::RequestDescriptor;
use crate::dispatch::{dispatch_many, dispatch_one};
use crate::error::{MotorcadeError, Result};
use crate::response::FetchResult;
use crate::transport::Transport;

/// One follow-up page to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PageWindow {
    /// Skip `offset` records, return at most `limit`.
    Offset { offset: u64, limit: u64 },
    /// Records in the half-open index range `[begin, end)`.
    Range { begin: u64, end: u64 },
    /// Opaque continuation token from the previous page.
    Token(String),
}

/// How the follow-up pages get fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagePlan {
    /// Every window is known up front; fetch them as one concurrent batch.
    Batch(Vec<PageWindow>),
    /// Each window is discovered on the page before it; fetch one at a time,
    /// starting from this window.
    Sequential(PageWindow),
}

/// What the first page says about the size of the result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCount {
    /// The upstream reported this many records in total.
    Total(u64),
    /// The upstream's explicit "no matching inventory" sentinel. Not an
    /// error: callers broadcast an empty result set.
    Empty,
}

/// Merged result set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    /// The first page's full body with the record array extended in place.
    pub body: Value,
    /// True when at least one follow-up page failed or was unusable.
    pub partial_failure: bool,
}

/// Terminal outcome of a paged fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PageOutcome {
    /// Upstream explicitly reported no matching inventory.
    Empty,
    Merged(AggregateResult),
}

impl PageOutcome {
    pub fn is_empty(&self) -> bool {
        matches!(self, PageOutcome::Empty)
    }

    pub fn merged(self) -> Option<AggregateResult> {
        match self {
            PageOutcome::Empty => None,
            PageOutcome::Merged(aggregate) => Some(aggregate),
        }
    }
}

/// Adapter-supplied pagination strategy.
///
/// Implementations describe one upstream's paging protocol: how to ask for
/// the first page, how to read the total, how to address the remaining
/// windows and where the record array lives. The driver owns everything
/// else.
pub trait Paginator: Send + Sync {
    /// Descriptor for the first page of the result set.
    fn first_page(&self) -> RequestDescriptor;

    /// Records the first page may contain. Defaults to [`page_size`].
    ///
    /// [`page_size`]: Paginator::page_size
    fn first_page_size(&self) -> u64 {
        self.page_size()
    }

    /// Ceiling on records per follow-up request.
    fn page_size(&self) -> u64;

    /// Read the total record count, or the upstream's explicit empty
    /// sentinel, out of the decoded first page.
    fn total_count(&self, first_page: &Value) -> Result<PageCount>;

    /// Plan the follow-up fetches. Defaults to one concurrent batch of
    /// contiguous index ranges covering `[first_page_size, total)`.
    fn plan(&self, _first_page: &Value, total: u64) -> PagePlan {
        PagePlan::Batch(range_windows(self.first_page_size(), total, self.page_size()))
    }

    /// Next window of a sequential plan, read from the page just fetched.
    /// `None` ends the walk.
    fn next_window(&self, _page: &Value) -> Option<PageWindow> {
        None
    }

    /// Descriptor for one follow-up window.
    fn descriptor(&self, window: &PageWindow) -> RequestDescriptor;

    /// JSON pointer to the record array spliced across pages.
    fn records_pointer(&self) -> &str;

    /// Fold one follow-up page into the aggregate. The default extends the
    /// aggregate's record array with the page's.
    fn merge(&self, aggregate: &mut Value, mut page: Value) -> Result<()> {
        merge_records(aggregate, &mut page, self.records_pointer())
    }
}

/// Contiguous `[begin, end)` windows covering `[fetched, total)`, each at
/// most `page_size` wide, the last clamped to `total`.
///
/// Every record index lands in exactly one window. A zero page size or a
/// fully fetched range yields no windows.
pub fn range_windows(fetched: u64, total: u64, page_size: u64) -> Vec<PageWindow> {
    if page_size == 0 || fetched >= total {
        return Vec::new();
    }
    let mut windows = Vec::with_capacity(((total - fetched).div_ceil(page_size)) as usize);
    let mut begin = fetched;
    while begin < total {
        let end = (begin + page_size).min(total);
        windows.push(PageWindow::Range { begin, end });
        begin = end;
    }
    windows
}

/// Same coverage as [`range_windows`], expressed as offset/limit pairs.
pub fn offset_windows(fetched: u64, total: u64, page_size: u64) -> Vec<PageWindow> {
    range_windows(fetched, total, page_size)
        .into_iter()
        .map(|window| match window {
            PageWindow::Range { begin, end } => PageWindow::Offset {
                offset: begin,
                limit: end - begin,
            },
            other => other,
        })
        .collect()
}

/// Move the record array at `pointer` from `page` onto the end of the
/// aggregate's array at the same pointer.
pub fn merge_records(aggregate: &mut Value, page: &mut Value, pointer: &str) -> Result<()> {
    let incoming = match page.pointer_mut(pointer).map(Value::take) {
        Some(Value::Array(records)) => records,
        Some(other) => {
            return Err(MotorcadeError::Malformed(format!(
                "expected an array at {pointer}, found {other}"
            )));
        }
        None => {
            return Err(MotorcadeError::Malformed(format!(
                "page body has nothing at {pointer}"
            )));
        }
    };
    match aggregate.pointer_mut(pointer) {
        Some(Value::Array(records)) => {
            records.extend(incoming);
            Ok(())
        }
        _ => Err(MotorcadeError::Malformed(format!(
            "aggregate has no array at {pointer}"
        ))),
    }
}

/// Fetch a complete paged result set and merge it into one aggregate.
///
/// Short-circuits, in order: a failed first page is
/// [`MotorcadeError::Upstream`] with zero follow-up calls; an undecodable
/// first page is [`MotorcadeError::Malformed`]; the empty sentinel is
/// [`PageOutcome::Empty`]; a total within the first page is a complete
/// aggregate after exactly one upstream call.
pub async fn gather<T, P>(transport: &T, pager: &P) -> Result<PageOutcome>
where
    T: Transport + ?Sized,
    P: Paginator + ?Sized,
{
    let first = match dispatch_one(transport, &pager.first_page()).await {
        FetchResult::Success(success) => success,
        FetchResult::Failure(failure) => return Err(MotorcadeError::Upstream(failure)),
    };
    let mut aggregate = first
        .json()
        .map_err(|e| MotorcadeError::Malformed(format!("first page was not valid JSON: {e}")))?;

    let total = match pager.total_count(&aggregate)? {
        PageCount::Empty => {
            tracing::debug!("Upstream reported no matching inventory");
            return Ok(PageOutcome::Empty);
        }
        PageCount::Total(total) => total,
    };

    let first_size = pager.first_page_size();
    if total <= first_size {
        return Ok(PageOutcome::Merged(AggregateResult {
            body: aggregate,
            partial_failure: false,
        }));
    }

    let mut partial_failure = false;
    match pager.plan(&aggregate, total) {
        PagePlan::Batch(windows) => {
            let descriptors: Vec<_> = windows.iter().map(|w| pager.descriptor(w)).collect();
            tracing::debug!(
                total,
                pages = descriptors.len(),
                "Fanning out follow-up pages"
            );
            for result in dispatch_many(transport, &descriptors).await {
                match result {
                    FetchResult::Success(page) => match page.json() {
                        Ok(body) => {
                            if let Err(e) = pager.merge(&mut aggregate, body) {
                                tracing::warn!(error = %e, "Dropping unmergeable page");
                                partial_failure = true;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Dropping undecodable page");
                            partial_failure = true;
                        }
                    },
                    // Already classified, logged and reported at the transport.
                    FetchResult::Failure(_) => partial_failure = true,
                }
            }
        }
        PagePlan::Sequential(first_window) => {
            let page_size = pager.page_size().max(1);
            let max_pages = (total - first_size).div_ceil(page_size);
            tracing::debug!(total, max_pages, "Walking follow-up pages sequentially");
            let mut window = Some(first_window);
            for _ in 0..max_pages {
                let Some(current) = window.take() else { break };
                match dispatch_one(transport, &pager.descriptor(&current)).await {
                    FetchResult::Success(page) => match page.json() {
                        Ok(body) => {
                            window = pager.next_window(&body);
                            if let Err(e) = pager.merge(&mut aggregate, body) {
                                tracing::warn!(error = %e, "Dropping unmergeable page");
                                partial_failure = true;
                            }
                        }
                        Err(e) => {
                            // Without a decoded page there is no next token.
                            tracing::warn!(error = %e, "Page chain broken by undecodable page");
                            partial_failure = true;
                            break;
                        }
                    },
                    FetchResult::Failure(_) => {
                        partial_failure = true;
                        break;
                    }
                }
            }
        }
    }

    if partial_failure {
        tracing::warn!("Aggregate is missing one or more pages");
        metrics::counter!("motorcade_partial_aggregates_total").increment(1);
    }
    Ok(PageOutcome::Merged(AggregateResult {
        body: aggregate,
        partial_failure,
    }))
}
