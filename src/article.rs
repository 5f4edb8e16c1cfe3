use chrono::NaiveDateTime;
#[cfg(feature = "serde0")]
use serde::{Deserialize, Serialize};
use url::Url;

/// A single extracted news article.
///
/// Extraction is best effort: the text fields default to an empty string and
/// the optional fields to `None` whenever the page did not contain the node a
/// field is read from. `date_value` is either a properly normalized instant
/// or `None`, never a guessed date.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde0", derive(Serialize, Deserialize))]
pub struct ArticleRecord {
    /// The headline of the article.
    pub title: String,
    /// The outlet that published the article.
    pub outlet: String,
    /// The date exactly as displayed on the page, trimmed.
    pub date_text: String,
    /// `date_text` normalized to an absolute point in time.
    ///
    /// `None` marks an unparseable display date; the display text above is
    /// kept verbatim either way.
    pub date_value: Option<NaiveDateTime>,
    /// Display snippet, cut after the last full sentence.
    pub description: String,
    /// Link to the article with known redirect wrappers unwrapped.
    pub link: String,
    /// Thumbnail image url.
    pub image_url: String,
    /// The hosting site. Only populated for aggregator records.
    pub site: Option<String>,
    /// The reporter byline. Only populated for aggregator records.
    pub reporter: Option<String>,
}

impl ArticleRecord {
    /// The article link parsed as an absolute url, if it is one.
    pub fn link_url(&self) -> Option<Url> {
        Url::parse(&self.link).ok()
    }

    /// The thumbnail parsed as an absolute url, if it is one.
    pub fn image(&self) -> Option<Url> {
        Url::parse(&self.image_url).ok()
    }
}
