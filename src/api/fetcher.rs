use crate::api::client::PageSource;
use crate::error::ProcessingError;
use crate::models::RecordSet;
use crate::utils::progress::ProgressReporter;
use tracing::{error, info};

/// Result of a pagination run.
///
/// A failed run still carries every record from the pages that succeeded, so
/// the caller can persist them and mark them as partial.
#[derive(Debug)]
pub struct FetchOutcome {
    pub records: RecordSet,
    pub pages: usize,
    pub failure: Option<ProcessingError>,
}

impl FetchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Offset/limit pagination over a [`PageSource`].
pub struct Fetcher<S: PageSource> {
    source: S,
    page_size: usize,
}

impl<S: PageSource> Fetcher<S> {
    pub fn new(source: S, page_size: usize) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Request pages until one comes back empty.
    ///
    /// The offset is the running count of records received. A short page is
    /// not taken as the end because portals may cap `$limit` silently.
    pub fn fetch_all(&self, progress: &ProgressReporter) -> FetchOutcome {
        let mut records = RecordSet::new();
        let mut offset = 0;
        let mut pages = 0;

        loop {
            let page = match self.source.fetch_page(self.page_size, offset) {
                Ok(page) => page,
                Err(e) => {
                    error!(
                        offset,
                        fetched = records.len(),
                        "Fetch aborted, results are partial: {}",
                        e
                    );
                    return FetchOutcome {
                        records,
                        pages,
                        failure: Some(e),
                    };
                }
            };

            if page.is_empty() {
                break;
            }

            pages += 1;
            offset += page.len();
            records.extend_page(page);
            info!(page = pages, offset, "Fetched {} records...", records.len());
            progress.set_message(&format!("Fetched {} records...", records.len()));
        }

        FetchOutcome {
            records,
            pages,
            failure: None,
        }
    }
}
