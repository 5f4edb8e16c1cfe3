use std::time::Duration;

use bytes::Bytes;
use log::{debug, warn};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, USER_AGENT};
use select::document::Document;

use crate::article::ArticleRecord;
use crate::error::KioskError;
use crate::extract::{DefaultExtractor, Extractor};
use crate::query::QueryState;
use crate::storage::ResultStore;

/// Retrieves raw page bytes for a session.
///
/// The session never talks to the network itself; everything i/o goes
/// through this seam, which also makes whole sessions drivable from canned
/// pages in tests.
pub trait Fetcher {
    /// Fetch `url` with the prepared request `headers`.
    fn fetch(&self, url: &str, headers: &HeaderMap) -> Result<Bytes, KioskError>;
}

/// Default [`Fetcher`] on top of a blocking [`reqwest`] client.
#[derive(Debug)]
pub struct HttpFetcher {
    client: Client,
    http_success_only: bool,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, http_success_only: bool) -> Result<Self, KioskError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| KioskError::HttpRequestFailure { error })?;
        Ok(HttpFetcher {
            client,
            http_success_only,
        })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, headers: &HeaderMap) -> Result<Bytes, KioskError> {
        let response = self
            .client
            .get(url)
            .headers(headers.clone())
            .send()
            .map_err(|error| KioskError::HttpRequestFailure { error })?;

        if self.http_success_only && !response.status().is_success() {
            return Err(KioskError::NoHttpSuccessResponse {
                status: response.status(),
            });
        }

        response
            .bytes()
            .map_err(|error| KioskError::HttpRequestFailure { error })
    }
}

/// Configuration for a [`Kiosk`] session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// The user-agent used for requests.
    browser_user_agent: String,
    /// Timeout for requests.
    request_timeout: Duration,
    /// Whether to accept only 2XX responses or failures as well.
    http_success_only: bool,
    /// Whether page and fragment failures propagate instead of being logged.
    strict: bool,
}

impl Config {
    /// Default timeout for requests made inside `kiosk`.
    pub const DEFAULT_REQ_TIMEOUT_SEC: u64 = 7;

    /// Default browser user agent.
    pub const DEFAULT_USER_AGENT: &'static str =
        "Mozilla/5.0 (X11; Ubuntu; Linux i686; rv:64.0) Gecko/20100101 Firefox/64.0";

    /// Convenience method to create a [`ConfigBuilder`]
    #[inline]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::builder().build()
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    browser_user_agent: Option<String>,
    request_timeout: Option<Duration>,
    http_success_only: Option<bool>,
    strict: Option<bool>,
}

impl ConfigBuilder {
    pub fn browser_user_agent<T: ToString>(mut self, browser_user_agent: T) -> Self {
        self.browser_user_agent = Some(browser_user_agent.to_string());
        self
    }

    pub fn request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = Some(request_timeout);
        self
    }

    pub fn http_success_only(mut self, http_success_only: bool) -> Self {
        self.http_success_only = Some(http_success_only);
        self
    }

    /// Propagate page and fragment failures to the caller instead of
    /// logging them and returning best-effort partial results.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    pub fn build(self) -> Config {
        Config {
            browser_user_agent: self
                .browser_user_agent
                .unwrap_or_else(|| Config::DEFAULT_USER_AGENT.to_string()),
            request_timeout: self
                .request_timeout
                .unwrap_or_else(|| Duration::from_secs(Config::DEFAULT_REQ_TIMEOUT_SEC)),
            http_success_only: self.http_success_only.unwrap_or(true),
            strict: self.strict.unwrap_or(false),
        }
    }
}

/// A scraping session over the news search and aggregator pages.
///
/// One session owns its [`QueryState`] and [`ResultStore`] exclusively;
/// parallel scraping means independent sessions. All i/o is blocking and
/// goes through the session's [`Fetcher`].
pub struct Kiosk<TExtractor: Extractor = DefaultExtractor> {
    fetcher: Box<dyn Fetcher>,
    /// The extractor used for fragment retrieval.
    pub extractor: TExtractor,
    query: QueryState,
    store: ResultStore,
    config: Config,
}

impl Kiosk {
    /// Convenience method for creating a new [`KioskBuilder`]
    ///
    /// Same as calling [`KioskBuilder::new`]
    #[inline]
    pub fn builder() -> KioskBuilder {
        KioskBuilder::new()
    }
}

impl<TExtractor: Extractor> Kiosk<TExtractor> {
    pub fn set_language<T: ToString>(&mut self, language: T) {
        self.query.set_language(language)
    }

    pub fn set_period<T: ToString>(&mut self, period: T) {
        self.query.set_period(period)
    }

    pub fn set_date_range<S: ToString, E: ToString>(&mut self, start: S, end: E) {
        self.query.set_date_range(start, end)
    }

    pub fn set_topic<T: ToString>(&mut self, topic: T) {
        self.query.set_topic(topic)
    }

    pub fn set_topic_section<T: ToString>(&mut self, section: T) {
        self.query.set_topic_section(section)
    }

    pub fn clear_topic(&mut self) {
        self.query.clear_topic()
    }

    pub fn set_user_agent<T: ToString>(&mut self, user_agent: T) {
        self.config.browser_user_agent = user_agent.to_string();
    }

    /// Switches between fail-fast and best-effort behavior at runtime.
    pub fn set_strict(&mut self, strict: bool) {
        self.config.strict = strict;
    }

    pub fn query(&self) -> &QueryState {
        &self.query
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Stores `keyword` for this session and retrieves the first result
    /// page into the store.
    pub fn search<T: ToString>(&mut self, keyword: T) -> Result<(), KioskError> {
        self.query.set_keyword(keyword);
        self.get_page(1)
    }

    /// Retrieves result page `page` and returns the fresh records without
    /// appending them to the store. The total count is refreshed from the
    /// page statistics.
    ///
    /// Fails with [`KioskError::InvalidState`] unless a keyword was set via
    /// [`Kiosk::search`] first; in strict mode any fetch or parse failure is
    /// returned as well, otherwise it is logged and an empty list returned.
    pub fn page_at(&mut self, page: usize) -> Result<Vec<ArticleRecord>, KioskError> {
        match self.fetch_search_page(page) {
            Ok(records) => Ok(records),
            Err(error @ KioskError::InvalidState { .. }) => Err(error),
            Err(error) => {
                if self.config.strict {
                    return Err(error);
                }
                warn!("skipping search page {}: {}", page, error);
                Ok(Vec::new())
            }
        }
    }

    /// Like [`Kiosk::page_at`], but appends the records to the store.
    pub fn get_page(&mut self, page: usize) -> Result<(), KioskError> {
        let records = self.page_at(page)?;
        self.store.extend(records);
        Ok(())
    }

    /// Retrieves the aggregator page for `keyword` under the active filter
    /// (topic beats date range beats period) and appends every extracted
    /// record to the store.
    ///
    /// Fragments that cannot be resolved are skipped individually; in
    /// strict mode the first page- or fragment-level failure is returned
    /// instead.
    pub fn get_news(&mut self, keyword: &str, deamplify: bool) -> Result<(), KioskError> {
        let url = self.query.news_url(keyword);
        let doc = match self.get_document(&url) {
            Ok(doc) => doc,
            Err(error) => {
                if self.config.strict {
                    return Err(error);
                }
                warn!("skipping aggregator page: {}", error);
                return Ok(());
            }
        };

        for node in self.extractor.news_fragments(&doc) {
            match self.extractor.news_record(node, deamplify) {
                Ok(record) => self.store.push(record),
                Err(error) => {
                    if self.config.strict {
                        return Err(error);
                    }
                    warn!("skipping article fragment: {}", error);
                }
            }
        }

        Ok(())
    }

    /// The records collected so far, optionally sorted newest first.
    pub fn results(&mut self, sort_by_date: bool) -> &[ArticleRecord] {
        if sort_by_date {
            self.store.sort_by_date();
        }
        self.store.records()
    }

    /// The titles of all collected records.
    pub fn titles(&self) -> Vec<String> {
        self.store.titles()
    }

    /// The links of all collected records.
    pub fn links(&self) -> Vec<String> {
        self.store.links()
    }

    /// Result count reported by the last fetched search page, `None` when
    /// its statistics were unavailable.
    pub fn total_count(&self) -> Option<u64> {
        self.store.total_count()
    }

    /// Drops all collected records and the total count. The query state,
    /// including a stored keyword, stays untouched.
    pub fn clear(&mut self) {
        self.store.clear()
    }

    fn fetch_search_page(&mut self, page: usize) -> Result<Vec<ArticleRecord>, KioskError> {
        let url = self.query.search_url(page)?;
        let doc = self.get_document(&url)?;

        let total = self.extractor.total_count(&doc);
        if total.is_none() {
            debug!("total count is not available, statistics are omitted when sorting by date");
        }
        self.store.set_total_count(total);

        Ok(self
            .extractor
            .search_fragments(&doc)
            .into_iter()
            .map(|node| self.extractor.search_record(node))
            .collect())
    }

    fn get_document(&self, url: &str) -> Result<Document, KioskError> {
        let body = self.fetcher.fetch(url, &self.headers())?;
        Document::from_read(&*body).map_err(|_| KioskError::ReadDocumentError { body })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(2);
        match HeaderValue::from_str(&self.config.browser_user_agent) {
            Ok(value) => {
                headers.insert(USER_AGENT, value);
            }
            Err(_) => warn!(
                "user agent {:?} is not a valid header value",
                self.config.browser_user_agent
            ),
        }
        if let Some(accept) = self.query.accept_language() {
            if let Ok(value) = HeaderValue::from_str(&accept) {
                headers.insert(ACCEPT_LANGUAGE, value);
            }
        }
        headers
    }
}

#[derive(Default)]
pub struct KioskBuilder {
    language: Option<String>,
    period: Option<String>,
    start: Option<String>,
    end: Option<String>,
    config: Option<Config>,
    fetcher: Option<Box<dyn Fetcher>>,
}

impl KioskBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn language<T: ToString>(mut self, language: T) -> Self {
        self.language = Some(language.to_string());
        self
    }

    pub fn period<T: ToString>(mut self, period: T) -> Self {
        self.period = Some(period.to_string());
        self
    }

    pub fn date_range<S: ToString, E: ToString>(mut self, start: S, end: E) -> Self {
        self.start = Some(start.to_string());
        self.end = Some(end.to_string());
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Replaces the default blocking http fetcher.
    pub fn fetcher<F: Fetcher + 'static>(mut self, fetcher: F) -> Self {
        self.fetcher = Some(Box::new(fetcher));
        self
    }

    pub fn build_with_extractor<TExtractor: Extractor>(
        self,
        extractor: TExtractor,
    ) -> Result<Kiosk<TExtractor>, KioskError> {
        let config = self.config.unwrap_or_default();
        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Box::new(HttpFetcher::new(
                config.request_timeout,
                config.http_success_only,
            )?),
        };

        let mut query = QueryState::default();
        if let Some(language) = self.language {
            query.set_language(language);
        }
        if let Some(period) = self.period {
            query.set_period(period);
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            query.set_date_range(start, end);
        }

        Ok(Kiosk {
            fetcher,
            extractor,
            query,
            store: ResultStore::new(),
            config,
        })
    }

    pub fn build(self) -> Result<Kiosk, KioskError> {
        self.build_with_extractor(DefaultExtractor::default())
    }
}
