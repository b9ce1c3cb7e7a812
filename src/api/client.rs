use crate::api::query::SoqlQuery;
use crate::api::retry::RetryPolicy;
use crate::error::{ProcessingError, Result};
use crate::models::CrashRecord;
use crate::settings::FetchConfig;
use crate::utils::constants::{APP_TOKEN_HEADER, USER_AGENT};
use std::io::ErrorKind;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Anything that can hand out one page of records at a given offset.
pub trait PageSource {
    fn fetch_page(&self, limit: usize, offset: usize) -> Result<Vec<CrashRecord>>;
}

/// Blocking client for a Socrata (SODA) resource endpoint.
pub struct SodaClient {
    agent: ureq::Agent,
    base_url: String,
    query: SoqlQuery,
    app_token: Option<String>,
    retry: RetryPolicy,
}

impl SodaClient {
    pub fn new(base_url: &str, query: SoqlQuery, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .user_agent(USER_AGENT)
            .build();

        Self {
            agent,
            base_url: base_url.to_string(),
            query,
            app_token: None,
            retry: RetryPolicy::none(),
        }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(&config.api_url, config.query(), config.timeout())
            .with_retry(config.retry_policy())
            .with_app_token(config.app_token.clone())
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_app_token(mut self, token: Option<String>) -> Self {
        self.app_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn query(&self) -> &SoqlQuery {
        &self.query
    }

    /// One round-trip, no retries.
    fn request_page(&self, limit: usize, offset: usize) -> Result<Vec<CrashRecord>> {
        let mut request = self.agent.get(&self.base_url);
        for (key, value) in self.query.page_params(limit, offset) {
            request = request.query(key, &value);
        }
        if let Some(ref token) = self.app_token {
            request = request.set(APP_TOKEN_HEADER, token);
        }

        debug!(offset, limit, url = %self.base_url, "Requesting page");

        match request.call() {
            Ok(response) => response.into_json::<Vec<CrashRecord>>().map_err(|e| {
                if e.kind() == ErrorKind::InvalidData {
                    ProcessingError::InvalidFormat(format!(
                        "Response at offset {} is not a JSON array of records: {}",
                        offset, e
                    ))
                } else {
                    ProcessingError::Transport {
                        offset,
                        message: e.to_string(),
                    }
                }
            }),
            Err(ureq::Error::Status(status, _)) => Err(ProcessingError::HttpStatus {
                status,
                url: self.base_url.clone(),
                offset,
            }),
            Err(ureq::Error::Transport(transport)) => Err(ProcessingError::Transport {
                offset,
                message: transport.to_string(),
            }),
        }
    }
}

impl PageSource for SodaClient {
    fn fetch_page(&self, limit: usize, offset: usize) -> Result<Vec<CrashRecord>> {
        let mut delays = self.retry.delays();
        let mut attempt = 1;

        loop {
            match self.request_page(limit, offset) {
                Ok(page) => return Ok(page),
                Err(e) if e.is_transient() => match delays.next() {
                    Some(delay) => {
                        warn!(
                            "{} (attempt {}/{}), retrying in {:?}",
                            e,
                            attempt,
                            self.retry.max_retries() + 1,
                            delay
                        );
                        thread::sleep(delay);
                        attempt += 1;
                    }
                    None => return Err(e),
                },
                Err(e) => return Err(e),
            }
        }
    }
}
