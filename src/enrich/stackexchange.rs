//! Stack Exchange API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{EnrichError, QaSearch, Question};
use crate::constants::USER_AGENT;

#[derive(Debug, Deserialize)]
struct Wrapper<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct QuestionItem {
    question_id: u64,
    title: String,
    link: String,
    #[serde(default)]
    score: i64,
}

#[derive(Debug, Deserialize)]
struct AnswerItem {
    #[serde(default)]
    body: Option<String>,
}

/// Client for `api.stackexchange.com` against a single site.
pub struct StackExchange {
    client: reqwest::Client,
    api_base: String,
    site: String,
    key: Option<String>,
}

impl StackExchange {
    pub fn new(api_base: &str, site: &str, key: Option<String>, timeout: Duration) -> Result<Self, EnrichError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EnrichError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            site: site.to_string(),
            key,
        })
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, EnrichError> {
        let mut url = Url::parse(&format!("{}/{path}", self.api_base))
            .map_err(|e| EnrichError::Transport(format!("invalid Stack Exchange URL: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.extend_pairs(params);
            query.append_pair("site", &self.site);
            if let Some(key) = &self.key {
                query.append_pair("key", key);
            }
        }
        Ok(url)
    }

    async fn get_items<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, EnrichError> {
        let resp = self
            .client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EnrichError::Timeout
                } else {
                    EnrichError::Transport(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            return Err(EnrichError::Status(resp.status().as_u16()));
        }

        let wrapper: Wrapper<T> = resp
            .json()
            .await
            .map_err(|e| EnrichError::Payload(e.to_string()))?;
        Ok(wrapper.items)
    }
}

#[async_trait]
impl QaSearch for StackExchange {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Question>, EnrichError> {
        let pagesize = max_results.to_string();
        let url = self.url(
            "search/advanced",
            &[
                ("order", "desc"),
                ("sort", "relevance"),
                ("q", query),
                ("pagesize", &pagesize),
            ],
        )?;
        let items: Vec<QuestionItem> = self.get_items(url).await?;
        Ok(items.into_iter().map(into_question).collect())
    }

    async fn top_answer(&self, question_id: u64) -> Result<Option<String>, EnrichError> {
        let url = self.url(
            &format!("questions/{question_id}/answers"),
            &[
                ("order", "desc"),
                ("sort", "votes"),
                ("pagesize", "1"),
                ("filter", "withbody"),
            ],
        )?;
        let items: Vec<AnswerItem> = self.get_items(url).await?;
        Ok(items.into_iter().next().and_then(|a| a.body))
    }
}

fn into_question(item: QuestionItem) -> Question {
    Question {
        id: item.question_id,
        title: decode_entities(&item.title),
        link: item.link,
        score: item.score,
    }
}

/// Titles come back HTML-escaped (`&#39;`, `&quot;`, ...).
fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(key: Option<&str>) -> StackExchange {
        StackExchange::new(
            "https://api.stackexchange.com/2.3/",
            "stackoverflow",
            key.map(String::from),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn search_url_has_required_params() {
        let url = client(None)
            .url("search/advanced", &[("sort", "relevance"), ("q", "sql injection & xss")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.stackexchange.com/2.3/search/advanced?sort=relevance&q=sql+injection+%26+xss&site=stackoverflow"
        );
    }

    #[test]
    fn key_is_appended_when_configured() {
        let url = client(Some("k123")).url("questions/1/answers", &[]).unwrap();
        assert!(url.as_str().ends_with("site=stackoverflow&key=k123"));
    }

    #[test]
    fn parses_search_items() {
        let json = r#"{"items": [
            {"question_id": 42, "title": "Why is &quot;eval&quot; dangerous?", "link": "https://stackoverflow.com/q/42", "score": 17, "tags": ["js"]}
        ], "has_more": false}"#;
        let wrapper: Wrapper<QuestionItem> = serde_json::from_str(json).unwrap();
        let q = into_question(wrapper.items.into_iter().next().unwrap());
        assert_eq!(
            q,
            Question {
                id: 42,
                title: "Why is \"eval\" dangerous?".into(),
                link: "https://stackoverflow.com/q/42".into(),
                score: 17,
            }
        );
    }

    #[test]
    fn missing_items_is_empty() {
        let wrapper: Wrapper<AnswerItem> =
            serde_json::from_str(r#"{"error_id": 502, "error_name": "throttle_violation"}"#).unwrap();
        assert!(wrapper.items.is_empty());
    }

    #[test]
    fn entity_decoding() {
        assert_eq!(decode_entities("a &amp;&amp; b"), "a && b");
        assert_eq!(decode_entities("don&#39;t &lt;T&gt;"), "don't <T>");
        assert_eq!(decode_entities("&amp;lt;"), "&lt;");
        assert_eq!(decode_entities("plain"), "plain");
    }

    #[tokio::test]
    async fn unreachable_api_is_transport_error() {
        let se = StackExchange::new("http://127.0.0.1:1", "stackoverflow", None, Duration::from_secs(5)).unwrap();
        assert!(matches!(se.search("x", 3).await, Err(EnrichError::Transport(_))));
    }
}
