use crate::error::KioskError;

/// The filter mode a url gets built under.
///
/// Exactly one mode applies per built url. Precedence is fixed: a topic
/// beats an explicit date range, which beats a relative period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Filter<'a> {
    /// Target the aggregator topic endpoint; keyword and date filters are
    /// ignored entirely.
    Topic {
        topic: &'a str,
        section: Option<&'a str>,
    },
    /// Custom date range, both endpoints set.
    DateRange { start: &'a str, end: &'a str },
    /// Relative window token, e.g. `"7d"`.
    Period(&'a str),
    /// No date filtering.
    None,
}

/// Mutable per-session query configuration.
///
/// State is only ever read at url-build time. Note that a topic, once set,
/// stays active until [`QueryState::clear_topic`] is called.
#[derive(Debug, Clone)]
pub struct QueryState {
    language: String,
    keyword: Option<String>,
    period: String,
    start: String,
    end: String,
    topic: Option<String>,
    topic_section: Option<String>,
}

impl Default for QueryState {
    fn default() -> Self {
        QueryState {
            language: "en".to_string(),
            keyword: None,
            period: String::new(),
            start: String::new(),
            end: String::new(),
            topic: None,
            topic_section: None,
        }
    }
}

impl QueryState {
    /// Language tag for results and interface, possibly region qualified
    /// (`"en-US"`).
    pub fn set_language<T: ToString>(&mut self, language: T) {
        self.language = language.to_string();
    }

    pub fn set_keyword<T: ToString>(&mut self, keyword: T) {
        self.keyword = Some(keyword.to_string());
    }

    /// Relative period token (`"7d"`, `"1m"`); an empty token clears it.
    pub fn set_period<T: ToString>(&mut self, period: T) {
        self.period = period.to_string();
    }

    /// Explicit date range in `MM/DD/YYYY` form; empty strings clear it.
    pub fn set_date_range<S: ToString, E: ToString>(&mut self, start: S, end: E) {
        self.start = start.to_string();
        self.end = end.to_string();
    }

    pub fn set_topic<T: ToString>(&mut self, topic: T) {
        self.topic = Some(topic.to_string());
    }

    pub fn set_topic_section<T: ToString>(&mut self, section: T) {
        self.topic_section = Some(section.to_string());
    }

    /// Drops the topic and its section, returning the session to keyword
    /// mode.
    pub fn clear_topic(&mut self) {
        self.topic = None;
        self.topic_section = None;
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref()
    }

    /// The single decision point for the mutually exclusive filter modes.
    pub fn active_filter(&self) -> Filter<'_> {
        if let Some(topic) = self.topic.as_deref() {
            return Filter::Topic {
                topic,
                section: self.topic_section.as_deref(),
            };
        }
        if !self.start.is_empty() && !self.end.is_empty() {
            return Filter::DateRange {
                start: &self.start,
                end: &self.end,
            };
        }
        if !self.period.is_empty() {
            return Filter::Period(&self.period);
        }
        Filter::None
    }

    /// The search-endpoint url for a 1-based `page`.
    ///
    /// Requires a keyword to have been set. The language tag is duplicated
    /// into the results-language filter (`lr`) and the interface language
    /// (`hl`/`gl`); the `tbs` blob keeps the exact layout the backend
    /// expects, quirks included.
    pub fn search_url(&self, page: usize) -> Result<String, KioskError> {
        let keyword = self.keyword.as_deref().ok_or(KioskError::InvalidState {
            operation: "get_page",
        })?;
        let lang = self.language.as_str();
        let offset = 10 * page.saturating_sub(1);

        let tbs = match self.active_filter() {
            Filter::DateRange { start, end } => format!(
                "lr:lang_1{},cdr:1,cd_min:{},cd_max:{},sbd:1",
                lang, start, end
            ),
            Filter::Period(period) => format!("lr:lang_1{},qdr:{},,sbd:1", lang, period),
            _ => format!("lr:lang_1{},sbd:1", lang),
        };

        Ok(format!(
            "https://www.google.com/search?hl={}&gl={}&q={}&lr=lang_{}&biw=1920&bih=976&source=lnt&&tbs={}&tbm=nws&start={}",
            lang,
            lang,
            urlencoding::encode(keyword),
            lang,
            tbs,
            offset
        ))
    }

    /// The aggregator url for `keyword` under the active filter.
    ///
    /// A date range whose endpoints cannot be re-sliced into `YYYY-MM-DD`
    /// (empty, or off the positional layout) degrades to "no date filter"
    /// instead of failing.
    pub fn news_url(&self, keyword: &str) -> String {
        let lang = self.language.as_str();
        match self.active_filter() {
            Filter::Topic { topic, section } => match section {
                Some(section) => format!(
                    "https://news.google.com/topics/{}/sections/{}",
                    topic, section
                ),
                None => format!("https://news.google.com/topics/{}", topic),
            },
            Filter::DateRange { start, end } => {
                match (reformat_range_date(start), reformat_range_date(end)) {
                    (Some(start), Some(end)) => format!(
                        "https://news.google.com/search?q={}+before:{}+after:{}&hl={}",
                        urlencoding::encode(keyword),
                        end,
                        start,
                        lang
                    ),
                    _ => plain_news_url(keyword, lang),
                }
            }
            Filter::Period(period) => {
                let keyword = if keyword.is_empty() {
                    format!("when:{}", period)
                } else {
                    format!("{} when:{}", keyword, period)
                };
                plain_news_url(&keyword, lang)
            }
            Filter::None => plain_news_url(keyword, lang),
        }
    }

    /// `Accept-Language` value for a region-qualified language tag, giving
    /// the full tag priority over the bare base tag.
    pub fn accept_language(&self) -> Option<String> {
        let (base, region) = self.language.split_once('-')?;
        Some(format!("{}-{},{};q=0.9", base, region, base))
    }
}

fn plain_news_url(keyword: &str, lang: &str) -> String {
    format!(
        "https://news.google.com/search?q={}&hl={}",
        urlencoding::encode(keyword),
        lang
    )
}

/// `MM/DD/YYYY` to `YYYY-MM-DD` by fixed character offsets. This is a
/// positional contract, not date parsing: inputs the offsets do not land on
/// cleanly yield `None`.
fn reformat_range_date(date: &str) -> Option<String> {
    let year = date.len().checked_sub(4).and_then(|idx| date.get(idx..))?;
    let month = date.get(0..2)?;
    let day = date.get(3..5)?;
    Some(format!("{}-{}-{}", year, month, day))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn searchable() -> QueryState {
        let mut query = QueryState::default();
        query.set_keyword("rust language");
        query
    }

    #[test]
    fn search_url_requires_a_keyword() {
        let query = QueryState::default();
        assert!(matches!(
            query.search_url(1),
            Err(KioskError::InvalidState { .. })
        ));
    }

    #[test]
    fn pagination_offset() {
        let query = searchable();
        assert!(query.search_url(1).unwrap().ends_with("&start=0"));
        assert!(query.search_url(2).unwrap().ends_with("&start=10"));
        assert!(query.search_url(5).unwrap().ends_with("&start=40"));
        // page 0 is clamped to the first page
        assert!(query.search_url(0).unwrap().ends_with("&start=0"));
    }

    #[test]
    fn keyword_is_percent_encoded() {
        let url = searchable().search_url(1).unwrap();
        assert!(url.contains("q=rust%20language"));
        assert!(url.contains("hl=en&gl=en"));
        assert!(url.contains("lr=lang_en"));
    }

    #[test]
    fn date_range_is_embedded_verbatim_and_excludes_period() {
        let mut query = searchable();
        query.set_period("7d");
        query.set_date_range("01/15/2024", "02/20/2024");

        let url = query.search_url(1).unwrap();
        assert!(url.contains("cdr:1,cd_min:01/15/2024,cd_max:02/20/2024"));
        assert!(!url.contains("qdr:"));
    }

    #[test]
    fn period_filter() {
        let mut query = searchable();
        query.set_period("7d");
        assert!(query.search_url(1).unwrap().contains("qdr:7d"));
    }

    #[test]
    fn filter_precedence() {
        let mut query = QueryState::default();
        assert_eq!(query.active_filter(), Filter::None);

        query.set_period("7d");
        assert_eq!(query.active_filter(), Filter::Period("7d"));

        query.set_date_range("01/15/2024", "02/20/2024");
        assert!(matches!(query.active_filter(), Filter::DateRange { .. }));

        query.set_topic("CAAqJggKIiBDQkFT");
        assert!(matches!(query.active_filter(), Filter::Topic { .. }));

        query.clear_topic();
        assert!(matches!(query.active_filter(), Filter::DateRange { .. }));

        // a half-set range is not a range
        query.set_date_range("01/15/2024", "");
        assert_eq!(query.active_filter(), Filter::Period("7d"));
    }

    #[test]
    fn news_url_reformats_the_range() {
        let mut query = QueryState::default();
        query.set_date_range("01/15/2024", "02/20/2024");
        assert_eq!(
            query.news_url("tech"),
            "https://news.google.com/search?q=tech+before:2024-02-20+after:2024-01-15&hl=en"
        );
    }

    #[test]
    fn news_url_appends_the_period_to_the_keyword() {
        let mut query = QueryState::default();
        query.set_period("7d");
        assert_eq!(
            query.news_url("tech"),
            "https://news.google.com/search?q=tech%20when%3A7d&hl=en"
        );
        assert_eq!(
            query.news_url(""),
            "https://news.google.com/search?q=when%3A7d&hl=en"
        );
    }

    #[test]
    fn news_url_topic_mode_ignores_everything_else() {
        let mut query = QueryState::default();
        query.set_period("7d");
        query.set_date_range("01/15/2024", "02/20/2024");
        query.set_topic("CAAqJggKIiBDQkFT");
        assert_eq!(
            query.news_url("ignored"),
            "https://news.google.com/topics/CAAqJggKIiBDQkFT"
        );

        query.set_topic_section("CAQiS0NCQVNNZ");
        assert_eq!(
            query.news_url("ignored"),
            "https://news.google.com/topics/CAAqJggKIiBDQkFT/sections/CAQiS0NCQVNNZ"
        );
    }

    #[test]
    fn malformed_range_degrades_to_no_filter() {
        let mut query = QueryState::default();
        query.set_date_range("x", "02/20/2024");
        assert_eq!(
            query.news_url("tech"),
            "https://news.google.com/search?q=tech&hl=en"
        );
    }

    #[test]
    fn accept_language_only_for_region_tags() {
        let mut query = QueryState::default();
        assert_eq!(query.accept_language(), None);

        query.set_language("en-US");
        assert_eq!(query.accept_language().as_deref(), Some("en-US,en;q=0.9"));
    }

    #[test]
    fn range_date_reslicing() {
        assert_eq!(
            reformat_range_date("01/15/2024").as_deref(),
            Some("2024-01-15")
        );
        assert_eq!(reformat_range_date(""), None);
        assert_eq!(reformat_range_date("x"), None);
    }
}
