pub mod client;
pub mod fetcher;
pub mod query;
pub mod retry;

pub use client::{PageSource, SodaClient};
pub use fetcher::{FetchOutcome, Fetcher};
pub use query::{SoqlQuery, SortDirection};
pub use retry::RetryPolicy;
