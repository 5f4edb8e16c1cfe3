use lazy_static::lazy_static;
use regex::Regex;
use select::document::Document;
use select::node::Node;
use select::predicate::{Attr, Name, Predicate};

use crate::article::ArticleRecord;
use crate::date::DateNormalizer;
use crate::error::KioskError;

/// Tracking wrapper the search engine puts in front of result links.
pub const REDIRECT_WRAPPER_PREFIX: &str = "/url?esrc=s&q=&rct=j&sa=U&url=";

/// Origin that relative aggregator links and images resolve against.
pub const AGGREGATOR_ORIGIN: &str = "https://news.google.com";

/// Watch-url prefix marking video-only entries on the aggregator page.
pub const VIDEO_WATCH_PREFIX: &str = "https://www.youtube.com/watch?v=";

lazy_static! {
    /// First run of digits and thousands separators in the statistics line.
    pub(crate) static ref RE_RESULT_STATS: Regex = Regex::new(r"[\d,]+").unwrap();
}

/// One structural hop on the way to a value-bearing node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Descend to the first descendant with this tag name.
    Tag(&'static str),
    /// Descend to the `n`th (0-based) descendant with this tag name.
    NthTag(&'static str, usize),
    /// Move to the next sibling with this tag name.
    SiblingTag(&'static str),
    /// Move to the parent node.
    Parent,
}

/// What to read off the node a traversal lands on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target {
    /// The concatenated text of the node.
    Text,
    /// The value of the named attribute.
    Attribute(&'static str),
}

/// A fixed traversal path from a fragment root to a single value.
#[derive(Debug, Clone, Copy)]
pub struct TraversalRule {
    pub steps: &'static [Step],
    pub target: Target,
}

impl TraversalRule {
    /// Walks the steps from `node`; a miss anywhere along the path yields
    /// `None` instead of an error.
    pub fn apply(&self, node: Node) -> Option<String> {
        let mut current = node;
        for step in self.steps {
            current = match *step {
                Step::Tag(name) => current.find(Name(name)).next()?,
                Step::NthTag(name, n) => current.find(Name(name)).nth(n)?,
                Step::SiblingTag(name) => next_sibling_tag(current, name)?,
                Step::Parent => current.parent()?,
            };
        }
        match self.target {
            Target::Text => Some(current.text()),
            Target::Attribute(attr) => current.attr(attr).map(str::to_string),
        }
    }
}

/// A named field with an ordered list of extraction attempts.
///
/// The first attempt that lands on a node wins. When every attempt misses
/// the field keeps its documented default; misses never affect sibling
/// fields.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub attempts: &'static [TraversalRule],
}

impl FieldRule {
    pub fn extract(&self, node: Node) -> Option<String> {
        self.attempts.iter().find_map(|rule| rule.apply(node))
    }
}

fn next_sibling_tag<'a>(node: Node<'a>, name: &str) -> Option<Node<'a>> {
    let mut sibling = node.next();
    while let Some(candidate) = sibling {
        if candidate.name() == Some(name) {
            return Some(candidate);
        }
        sibling = candidate.next();
    }
    None
}

/// The per-field rules, one table per source mode.
///
/// The paths mirror the accidental structure of the scraped pages; keeping
/// them declarative keeps the fallback order testable without fabricating
/// whole pages.
pub(crate) mod rules {
    use super::Step::*;
    use super::Target::*;
    use super::{FieldRule, TraversalRule};

    pub const SEARCH_TITLE: FieldRule = FieldRule {
        name: "title",
        attempts: &[TraversalRule {
            steps: &[Tag("h3")],
            target: Text,
        }],
    };

    pub const SEARCH_OUTLET: FieldRule = FieldRule {
        name: "outlet",
        attempts: &[TraversalRule {
            steps: &[Tag("div"), Tag("div"), Tag("div"), SiblingTag("div")],
            target: Text,
        }],
    };

    pub const SEARCH_DATE: FieldRule = FieldRule {
        name: "date",
        attempts: &[TraversalRule {
            steps: &[Tag("div"), SiblingTag("div"), Tag("span")],
            target: Text,
        }],
    };

    pub const SEARCH_DESCRIPTION: FieldRule = FieldRule {
        name: "description",
        attempts: &[TraversalRule {
            steps: &[
                Tag("div"),
                SiblingTag("div"),
                Tag("div"),
                SiblingTag("div"),
                Tag("div"),
                Tag("div"),
                Tag("div"),
            ],
            target: Text,
        }],
    };

    pub const SEARCH_IMAGE: FieldRule = FieldRule {
        name: "image",
        attempts: &[TraversalRule {
            steps: &[Tag("img")],
            target: Attribute("src"),
        }],
    };

    pub const NEWS_TITLE: FieldRule = FieldRule {
        name: "title",
        attempts: &[
            TraversalRule {
                steps: &[NthTag("div", 2), NthTag("a", 0)],
                target: Text,
            },
            TraversalRule {
                steps: &[NthTag("a", 1)],
                target: Text,
            },
        ],
    };

    pub const NEWS_DATE: FieldRule = FieldRule {
        name: "date",
        attempts: &[TraversalRule {
            steps: &[Tag("time")],
            target: Text,
        }],
    };

    pub const NEWS_TIMESTAMP: FieldRule = FieldRule {
        name: "timestamp",
        attempts: &[TraversalRule {
            steps: &[Tag("time")],
            target: Attribute("datetime"),
        }],
    };

    pub const NEWS_LINK: FieldRule = FieldRule {
        name: "link",
        attempts: &[TraversalRule {
            steps: &[Tag("div"), Tag("a")],
            target: Attribute("href"),
        }],
    };

    pub const NEWS_IMAGE: FieldRule = FieldRule {
        name: "image",
        attempts: &[TraversalRule {
            steps: &[Tag("figure"), Tag("img")],
            target: Attribute("src"),
        }],
    };

    pub const NEWS_SITE: FieldRule = FieldRule {
        name: "site",
        attempts: &[TraversalRule {
            steps: &[Tag("time"), Parent, Tag("a")],
            target: Text,
        }],
    };

    pub const NEWS_OUTLET: FieldRule = FieldRule {
        name: "outlet",
        attempts: &[
            TraversalRule {
                steps: &[Tag("div"), NthTag("div", 1), Tag("div"), Tag("div"), Tag("div")],
                target: Text,
            },
            TraversalRule {
                steps: &[NthTag("div", 1), Tag("div"), Tag("div"), Tag("div")],
                target: Text,
            },
        ],
    };

    pub const NEWS_REPORTER: FieldRule = FieldRule {
        name: "reporter",
        attempts: &[TraversalRule {
            steps: &[NthTag("span", 2)],
            target: Text,
        }],
    };
}

/// Turns page fragments into [`ArticleRecord`]s.
///
/// Every method has a canonical default implementation; implementors can
/// override individual pieces, e.g. to follow a markup change on one of the
/// source pages without forking the rest of the pipeline.
pub trait Extractor {
    /// All candidate result fragments on a search results page.
    fn search_fragments<'a>(&self, doc: &'a Document) -> Vec<Node<'a>> {
        doc.find(Name("a").and(Attr("data-ved", ()))).collect()
    }

    /// All candidate article fragments on an aggregator page.
    fn news_fragments<'a>(&self, doc: &'a Document) -> Vec<Node<'a>> {
        doc.find(Name("article")).collect()
    }

    /// Total result count from the page statistics node.
    ///
    /// `None` when the page carries no statistics node at all, which the
    /// backend omits when results are sorted by date. That is "unavailable",
    /// not zero.
    fn total_count(&self, doc: &Document) -> Option<u64> {
        let stats = doc
            .find(Name("div").and(Attr("id", "result-stats")))
            .next()?;
        let text = stats.text();
        let digits = RE_RESULT_STATS.find(&text)?;
        digits.as_str().replace(',', "").parse().ok()
    }

    /// Extracts one record from a search result fragment.
    ///
    /// Never fails: each field that cannot be reached keeps its default.
    fn search_record(&self, node: Node) -> ArticleRecord {
        let title = rules::SEARCH_TITLE
            .extract(node)
            .map(|title| title.replace('\n', ""))
            .unwrap_or_default();
        let link = node
            .attr("href")
            .map(|href| href.replace(REDIRECT_WRAPPER_PREFIX, ""))
            .unwrap_or_default();
        let outlet = rules::SEARCH_OUTLET.extract(node).unwrap_or_default();
        let raw_date = rules::SEARCH_DATE.extract(node).unwrap_or_default();
        let date_value = DateNormalizer::normalize(&raw_date);
        let description = rules::SEARCH_DESCRIPTION
            .extract(node)
            .map(|desc| cut_after_last_fullstop(&desc).replace('\n', ""))
            .unwrap_or_default();
        let image_url = rules::SEARCH_IMAGE.extract(node).unwrap_or_default();

        ArticleRecord {
            title,
            outlet,
            date_text: raw_date.trim().to_string(),
            date_value,
            description,
            link,
            image_url,
            ..ArticleRecord::default()
        }
    }

    /// Extracts one record from an aggregator article fragment.
    ///
    /// A fragment without any resolvable link is rejected as a whole; all
    /// other fields fall back to their defaults individually. In `deamplify`
    /// mode a failed link lookup falls back to the canonical destination
    /// embedded in the fragment's structured-log attribute.
    fn news_record(&self, node: Node, deamplify: bool) -> Result<ArticleRecord, KioskError> {
        let title = rules::NEWS_TITLE.extract(node).unwrap_or_default();
        let date_text = rules::NEWS_DATE.extract(node).unwrap_or_default();
        let date_value = rules::NEWS_TIMESTAMP
            .extract(node)
            .and_then(|stamp| DateNormalizer::parse_timestamp(&stamp))
            .or_else(|| DateNormalizer::normalize(&date_text));

        let mut link = rules::NEWS_LINK.extract(node).and_then(|href| {
            href.get(2..)
                .map(|rest| format!("{}/{}", AGGREGATOR_ORIGIN, rest))
        });
        if link.is_none() && deamplify {
            link = node.attr("jslog").and_then(deamplified_link);
        }
        let link = link.ok_or(KioskError::FragmentExtraction { field: "link" })?;

        let description = if link.starts_with(VIDEO_WATCH_PREFIX) {
            "video".to_string()
        } else {
            String::new()
        };
        let image_url = rules::NEWS_IMAGE
            .extract(node)
            .map(|src| format!("{}{}", AGGREGATOR_ORIGIN, src))
            .unwrap_or_default();
        let site = rules::NEWS_SITE.extract(node);
        let outlet = rules::NEWS_OUTLET.extract(node).unwrap_or_default();
        let reporter = rules::NEWS_REPORTER.extract(node);

        Ok(ArticleRecord {
            title,
            outlet,
            date_text: date_text.trim().to_string(),
            date_value,
            description,
            link,
            image_url,
            site,
            reporter,
        })
    }
}

/// The vanilla [`Extractor`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExtractor;

impl Extractor for DefaultExtractor {}

/// Pulls the canonical destination out of an accelerated-page wrapper's
/// structured-log attribute, e.g. `"85008; 2:https://example.com/story;23"`.
fn deamplified_link(jslog: &str) -> Option<String> {
    let (_, rest) = jslog.split_once("2:")?;
    rest.split(';').next().map(str::to_string)
}

/// Cuts the text after the last sentence-terminating period; text without a
/// period is returned unchanged.
fn cut_after_last_fullstop(text: &str) -> &str {
    match text.rfind('.') {
        Some(idx) => &text[..=idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_FRAGMENT: &str = r#"
    <html><body>
      <a data-ved="0ahUKE1" href="/url?esrc=s&amp;q=&amp;rct=j&amp;sa=U&amp;url=https://www.example.com/story">
        <h3>Example
headline</h3>
        <div>
          <div>
            <div>thumb</div>
            <div>The Example Times</div>
          </div>
        </div>
        <div>
          <span>3 days ago</span>
          <div>meta row</div>
          <div>
            <div>
              <div>
                <div>A short description of the story. Read more</div>
              </div>
            </div>
          </div>
        </div>
        <img src="https://img.example.com/thumb.png">
      </a>
    </body></html>"#;

    const NEWS_FRAGMENT: &str = r#"
    <html><body>
      <article jslog="85008; 2:https://www.example.com/full-story;23">
        <div>
          <a href="./articles/abc123"></a>
          <div>
            <div>
              <div>
                <div>Example Media</div>
              </div>
            </div>
          </div>
        </div>
        <a href="./articles/abc123">Aggregator headline</a>
        <figure><img src="/api/attachments/img42.png"></figure>
        <div>
          <time datetime="2024-03-15T10:30:00Z">Yesterday</time>
          <a href="./publications/example">Example Site</a>
        </div>
        <span>by</span><span>-</span><span>Jane Reporter</span>
      </article>
    </body></html>"#;

    const AMP_FRAGMENT: &str = r##"
    <html><body>
      <article jslog="85008; 2:https://www.youtube.com/watch?v=dQw4w9;23">
        <div><span>video teaser</span></div>
        <a href="#one">one</a>
        <a href="#two">Watch: launch event</a>
        <div><time datetime="2024-03-14T08:00:00Z">2 days ago</time></div>
      </article>
    </body></html>"##;

    fn search_node(doc: &Document) -> Node {
        doc.find(Name("a").and(Attr("data-ved", ()))).next().unwrap()
    }

    fn article_node(doc: &Document) -> Node {
        doc.find(Name("article")).next().unwrap()
    }

    #[test]
    fn search_record_full_fragment() {
        let doc = Document::from(SEARCH_FRAGMENT);
        let record = DefaultExtractor.search_record(search_node(&doc));

        assert_eq!(record.title, "Exampleheadline");
        assert_eq!(record.link, "https://www.example.com/story");
        assert_eq!(record.outlet, "The Example Times");
        assert_eq!(record.date_text, "3 days ago");
        assert!(record.date_value.is_some());
        assert_eq!(record.description, "A short description of the story.");
        assert_eq!(record.image_url, "https://img.example.com/thumb.png");
        assert_eq!(record.site, None);
        assert_eq!(record.reporter, None);
    }

    #[test]
    fn search_record_empty_fragment_is_all_defaults() {
        let doc = Document::from(r#"<html><body><a data-ved="x"></a></body></html>"#);
        let record = DefaultExtractor.search_record(search_node(&doc));
        assert_eq!(record, ArticleRecord::default());
    }

    #[test]
    fn search_fragments_require_the_marker_attribute() {
        let doc = Document::from(
            r##"<html><body>
                <a href="/preferences">settings</a>
                <a data-ved="a" href="#1"><h3>one</h3></a>
                <a data-ved="b" href="#2"><h3>two</h3></a>
            </body></html>"##,
        );
        assert_eq!(DefaultExtractor.search_fragments(&doc).len(), 2);
    }

    #[test]
    fn news_record_full_fragment() {
        let doc = Document::from(NEWS_FRAGMENT);
        let record = DefaultExtractor.news_record(article_node(&doc), false).unwrap();

        // both title and outlet land on their fallback attempts here
        assert_eq!(record.title, "Aggregator headline");
        assert_eq!(record.outlet, "Example Media");
        assert_eq!(record.link, "https://news.google.com/articles/abc123");
        assert_eq!(record.date_text, "Yesterday");
        assert_eq!(
            record.date_value,
            chrono::NaiveDate::from_ymd_opt(2024, 3, 15)
                .unwrap()
                .and_hms_opt(10, 30, 0)
        );
        assert_eq!(
            record.image_url,
            "https://news.google.com/api/attachments/img42.png"
        );
        assert_eq!(record.site.as_deref(), Some("Example Site"));
        assert_eq!(record.reporter.as_deref(), Some("Jane Reporter"));
        assert_eq!(record.description, "");
    }

    #[test]
    fn news_record_without_link_is_a_fragment_failure() {
        let doc = Document::from(AMP_FRAGMENT);
        let err = DefaultExtractor
            .news_record(article_node(&doc), false)
            .unwrap_err();
        assert!(matches!(err, KioskError::FragmentExtraction { field: "link" }));
    }

    #[test]
    fn deamplify_falls_back_to_the_structured_log() {
        let doc = Document::from(AMP_FRAGMENT);
        let record = DefaultExtractor.news_record(article_node(&doc), true).unwrap();

        assert_eq!(record.link, "https://www.youtube.com/watch?v=dQw4w9");
        assert_eq!(record.description, "video");
        assert_eq!(record.title, "Watch: launch event");
        assert_eq!(record.site, None);
    }

    #[test]
    fn total_count_parses_and_is_absent_without_statistics() {
        let doc = Document::from(
            r#"<html><body><div id="result-stats">About 1,234 results (0.29 seconds)</div></body></html>"#,
        );
        assert_eq!(DefaultExtractor.total_count(&doc), Some(1234));

        let doc = Document::from(r#"<html><body><div>no stats</div></body></html>"#);
        assert_eq!(DefaultExtractor.total_count(&doc), None);
    }

    #[test]
    fn fallback_order_is_first_match_wins() {
        let doc = Document::from(
            r##"<html><body>
              <article>
                <div>x</div><div><a href="#p">Primary</a></div><div></div>
                <a href="#0">zero</a>
              </article>
            </body></html>"##,
        );
        // descendant divs are [x, wrapper, empty]; the third div holds no
        // anchor, so the primary attempt misses and the second anchor wins
        let title = rules::NEWS_TITLE.extract(article_node(&doc));
        assert_eq!(title.as_deref(), Some("zero"));
    }

    #[test]
    fn traversal_misses_are_none() {
        let doc = Document::from(r#"<html><body><article><div></div></article></body></html>"#);
        let node = article_node(&doc);
        assert_eq!(rules::NEWS_SITE.extract(node), None);
        assert_eq!(rules::NEWS_REPORTER.extract(node), None);
        assert_eq!(rules::SEARCH_OUTLET.extract(node), None);
    }

    #[test]
    fn deamplified_link_splits_the_log_entry() {
        assert_eq!(
            deamplified_link("85008; 2:https://example.com/story;23").as_deref(),
            Some("https://example.com/story")
        );
        assert_eq!(deamplified_link("85008; 23"), None);
    }

    #[test]
    fn fullstop_cut() {
        assert_eq!(
            cut_after_last_fullstop("One. Two. Three trailing"),
            "One. Two."
        );
        assert_eq!(cut_after_last_fullstop("no stop"), "no stop");
    }
}
