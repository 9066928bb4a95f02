//! Random-article content source.
//!
//! The game core only sees the [`ArticleSource`] contract; the Wikipedia
//! implementation lives behind it. A failed fetch simply leaves the
//! round's article unset, which the ChooseArticle tally treats like a
//! rejection.

use crate::types::Article;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

pub type ArticleResult<T> = Result<T, ArticleError>;

#[derive(Debug, thiserror::Error)]
pub enum ArticleError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Response parsing failed: {0}")]
    ParseError(String),
}

/// Supplies one randomly chosen article. No retry policy here; the
/// caller re-requests on the next round restart.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn random_article(&self) -> ArticleResult<Article>;
}

const RANDOM_ARTICLE_URL: &str = "https://en.wikipedia.org/w/api.php?origin=*&action=query\
     &format=json&prop=info&inprop=url&generator=random&grnnamespace=0\
     &grnfilterredir=nonredirects&grnlimit=1";

/// Wikipedia's MediaWiki API with `generator=random`.
pub struct WikipediaSource {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    query: QueryPages,
}

#[derive(Debug, Deserialize)]
struct QueryPages {
    pages: HashMap<String, RandomPage>,
}

#[derive(Debug, Deserialize)]
struct RandomPage {
    title: String,
    fullurl: String,
}

impl WikipediaSource {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Self { client }
    }
}

impl Default for WikipediaSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArticleSource for WikipediaSource {
    async fn random_article(&self) -> ArticleResult<Article> {
        let response = self
            .client
            .get(RANDOM_ARTICLE_URL)
            .send()
            .await
            .map_err(|e| ArticleError::ApiError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ArticleError::ApiError(format!(
                "unexpected status: {}",
                response.status()
            )));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| ArticleError::ParseError(e.to_string()))?;

        let page = parsed
            .query
            .pages
            .into_values()
            .next()
            .ok_or_else(|| ArticleError::ParseError("no page in response".to_string()))?;

        Ok(Article {
            title: page.title,
            url: page.fullurl,
        })
    }
}
