//! REST client for the content repository

use reqwest::Url;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::time::Duration;

use super::predicate;
use super::types::{ApiInfo, Document, SearchResponse};
use super::CmsError;
use crate::config::CmsConfig;
use crate::content::{NavPost, Post, PostsPagination};

const ORDER_NEWEST_FIRST: &str = "document.first_publication_date desc";
const ORDER_OLDEST_FIRST: &str = "document.first_publication_date";

/// A search query against `documents/search`
#[derive(Debug, Clone)]
pub struct Query {
    pub predicates: Vec<String>,
    pub page_size: usize,
    pub page: usize,
    pub orderings: Vec<String>,
    /// Return only documents that come after this document id in the ordering
    pub after: Option<String>,
}

impl Query {
    pub fn new(predicates: Vec<String>) -> Self {
        Self {
            predicates,
            page_size: 20,
            page: 1,
            orderings: Vec::new(),
            after: None,
        }
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn ordering(mut self, field: &str) -> Self {
        self.orderings.push(field.to_string());
        self
    }

    pub fn after(mut self, document_id: &str) -> Self {
        self.after = Some(document_id.to_string());
        self
    }
}

/// Which neighbour of a post to look up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The post published just before
    Previous,
    /// The post published just after
    Next,
}

/// Client for a Prismic-compatible content API
#[derive(Debug, Clone)]
pub struct PrismicClient {
    http: reqwest::Client,
    endpoint: String,
    search_url: String,
    access_token: Option<String>,
    document_type: String,
    page_size: usize,
}

impl PrismicClient {
    /// Create a client from the `cms` section of the site config
    pub fn new(config: &CmsConfig) -> Result<Self, CmsError> {
        let endpoint = config.endpoint.trim().trim_end_matches('/').to_string();
        match Url::parse(&endpoint) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => return Err(CmsError::InvalidEndpoint(config.endpoint.clone())),
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(concat!("spacetraveling/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            search_url: format!("{}/documents/search", endpoint),
            endpoint,
            access_token: config.access_token.clone().filter(|t| !t.is_empty()),
            document_type: config.document_type.clone(),
            page_size: config.page_size.max(1),
        })
    }

    /// Ref of the currently published content.
    ///
    /// The master ref moves on every publish, so it is looked up again for
    /// each query; cursors returned by a search keep the ref they started with.
    pub async fn master_ref(&self) -> Result<String, CmsError> {
        let mut request = self.http.get(&self.endpoint);
        if let Some(token) = &self.access_token {
            request = request.query(&[("access_token", token)]);
        }
        let info: ApiInfo = self.get_json(request).await?;
        let reference = info
            .master_ref()
            .map(str::to_string)
            .ok_or(CmsError::NoMasterRef)?;
        tracing::debug!("Using master ref {}", reference);
        Ok(reference)
    }

    /// Run a search query against the current master ref
    pub async fn query(&self, query: &Query) -> Result<SearchResponse<Document>, CmsError> {
        let reference = self.master_ref().await?;

        let mut params: Vec<(&str, String)> = vec![
            ("ref", reference),
            ("q", predicate::query(&query.predicates)),
            ("pageSize", query.page_size.to_string()),
            ("page", query.page.to_string()),
        ];
        if !query.orderings.is_empty() {
            params.push(("orderings", predicate::orderings(&query.orderings)));
        }
        if let Some(after) = &query.after {
            params.push(("after", after.clone()));
        }
        if let Some(token) = &self.access_token {
            params.push(("access_token", token.clone()));
        }

        tracing::debug!(
            "CMS query q={} page={} pageSize={}",
            predicate::query(&query.predicates),
            query.page,
            query.page_size
        );
        self.get_json(self.http.get(&self.search_url).query(&params))
            .await
    }

    /// Follow a `next_page` cursor returned by a previous search
    pub async fn follow(&self, next_page: &str) -> Result<SearchResponse<Document>, CmsError> {
        let mut url =
            Url::parse(next_page).map_err(|_| CmsError::InvalidEndpoint(next_page.to_string()))?;

        if let Some(token) = &self.access_token {
            let has_token = url.query_pairs().any(|(k, _)| k == "access_token");
            if !has_token {
                url.query_pairs_mut().append_pair("access_token", token);
            }
        }

        tracing::debug!("Following cursor to page {:?}", page_param(&url));
        self.get_json(self.http.get(url)).await
    }

    /// Fetch a single post by its uid
    pub async fn get_by_uid(&self, uid: &str) -> Result<Post, CmsError> {
        let query = Query::new(vec![predicate::uid(&self.document_type, uid)]).page_size(1);
        let response = self.query(&query).await?;
        let document = response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| CmsError::NotFound(uid.to_string()))?;
        Post::from_document(document)
    }

    /// First page of the listing, newest first
    pub async fn fetch_page(&self, page_size: usize) -> Result<PostsPagination, CmsError> {
        let response = self.query(&self.posts_query(page_size)).await?;
        let results = collect_posts(response.results)
            .iter()
            .map(Post::summary)
            .collect();
        Ok(PostsPagination {
            next_page: response.next_page,
            results,
        })
    }

    /// Every post, following the cursor until the last page
    pub async fn fetch_all(&self) -> Result<Vec<Post>, CmsError> {
        let mut response = self.query(&self.posts_query(self.page_size)).await?;
        let mut posts = Vec::new();
        let mut visited = HashSet::new();

        loop {
            posts.extend(collect_posts(std::mem::take(&mut response.results)));

            let Some(next) = response.next_page.take() else {
                break;
            };
            if !visited.insert(next.clone()) {
                tracing::warn!("Cursor loop detected at {}, stopping", next);
                break;
            }
            response = self.follow(&next).await?;
        }

        tracing::info!("Fetched {} posts from CMS", posts.len());
        Ok(posts)
    }

    /// The post published right before or after the given document
    pub async fn neighbor(
        &self,
        document_id: &str,
        direction: Direction,
    ) -> Result<Option<NavPost>, CmsError> {
        let ordering = match direction {
            Direction::Previous => ORDER_NEWEST_FIRST,
            Direction::Next => ORDER_OLDEST_FIRST,
        };
        let query = Query::new(vec![predicate::document_type(&self.document_type)])
            .page_size(1)
            .ordering(ordering)
            .after(document_id);

        let response = self.query(&query).await?;
        let neighbor = response
            .results
            .into_iter()
            .next()
            .filter(|doc| doc.id != document_id)
            .and_then(|doc| match Post::from_document(doc) {
                Ok(post) => Some(NavPost::from(&post)),
                Err(e) => {
                    tracing::warn!("Ignoring neighbour: {}", e);
                    None
                }
            });
        Ok(neighbor)
    }

    fn posts_query(&self, page_size: usize) -> Query {
        Query::new(vec![predicate::document_type(&self.document_type)])
            .page_size(page_size)
            .ordering(ORDER_NEWEST_FIRST)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, CmsError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            // Never leak the token into logs
            let mut url = response.url().clone();
            url.set_query(None);
            return Err(CmsError::Status {
                status,
                url: url.to_string(),
            });
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

fn collect_posts(documents: Vec<Document>) -> Vec<Post> {
    documents
        .into_iter()
        .filter_map(|doc| match Post::from_document(doc) {
            Ok(post) => Some(post),
            Err(e) => {
                tracing::warn!("Skipping document: {}", e);
                None
            }
        })
        .collect()
}

fn page_param(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == "page")
        .map(|(_, v)| v.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Query as QueryParams, State};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    struct Fixture {
        base: String,
        /// Current master ref
        master: Arc<Mutex<String>>,
        documents: Arc<Vec<Value>>,
        api_calls: Arc<AtomicUsize>,
        token: Option<&'static str>,
    }

    fn doc(id: &str, uid: &str, date: &str) -> Value {
        json!({
            "id": id,
            "uid": uid,
            "type": "post",
            "first_publication_date": date,
            "last_publication_date": date,
            "data": {
                "title": format!("Title {}", uid),
                "subtitle": "Sub",
                "author": "Ana",
                "banner": {"url": "https://img.example/b.png"},
                "content": [{
                    "heading": "Intro",
                    "body": [{"type": "paragraph", "text": "one two", "spans": []}]
                }]
            }
        })
    }

    /// Documents newest first
    fn documents() -> Vec<Value> {
        vec![
            doc("D3", "third", "2021-03-01T10:00:00+0000"),
            doc("D2", "second", "2021-02-01T10:00:00+0000"),
            json!({"id": "BROKEN", "uid": null, "type": "post", "data": {}}),
            doc("D1", "first", "2021-01-01T10:00:00+0000"),
        ]
    }

    fn authorized(fixture: &Fixture, params: &HashMap<String, String>) -> bool {
        match fixture.token {
            Some(token) => params.get("access_token").map(String::as_str) == Some(token),
            None => true,
        }
    }

    async fn api_root(
        State(fixture): State<Fixture>,
        QueryParams(params): QueryParams<HashMap<String, String>>,
    ) -> impl IntoResponse {
        fixture.api_calls.fetch_add(1, Ordering::SeqCst);
        if !authorized(&fixture, &params) {
            return (StatusCode::UNAUTHORIZED, Json(json!({}))).into_response();
        }
        let master = fixture.master.lock().unwrap().clone();
        Json(json!({
            "refs": [
                {"id": "preview", "ref": "PREVIEW", "label": "Preview", "isMasterRef": false},
                {"id": "master", "ref": master, "label": "Master", "isMasterRef": true}
            ]
        }))
        .into_response()
    }

    async fn search(
        State(fixture): State<Fixture>,
        QueryParams(params): QueryParams<HashMap<String, String>>,
    ) -> impl IntoResponse {
        let master = fixture.master.lock().unwrap().clone();
        let reference = params.get("ref").cloned().unwrap_or_default();
        if reference != master || !authorized(&fixture, &params) {
            return (StatusCode::UNAUTHORIZED, Json(json!({}))).into_response();
        }

        let q = params.get("q").cloned().unwrap_or_default();
        let mut docs: Vec<Value> = fixture.documents.as_ref().clone();

        if let Some(start) = q.find("my.post.uid, \"") {
            let rest = &q[start + 14..];
            let uid = &rest[..rest.find('"').unwrap_or(0)];
            docs.retain(|d| d["uid"] == uid);
        }

        if let Some(after) = params.get("after") {
            let ascending = params
                .get("orderings")
                .map(|o| !o.contains("desc"))
                .unwrap_or(false);
            let dated: Vec<Value> = docs.into_iter().filter(|d| !d["uid"].is_null()).collect();
            let mut ordered = dated;
            if ascending {
                ordered.reverse();
            }
            let pos = ordered.iter().position(|d| d["id"] == after.as_str());
            docs = match pos {
                Some(p) => ordered.into_iter().skip(p + 1).collect(),
                None => Vec::new(),
            };
        }

        let page: usize = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
        let size: usize = params
            .get("pageSize")
            .and_then(|p| p.parse().ok())
            .unwrap_or(20);
        let total_pages = docs.len().div_ceil(size).max(1);
        let results: Vec<Value> = docs.into_iter().skip((page - 1) * size).take(size).collect();
        let next_page = if page < total_pages {
            // Cursor carries everything but the token, like the real API
            Value::String(format!(
                "{}/documents/search?ref={}&q={}&pageSize={}&page={}",
                fixture.base,
                reference,
                "%5B%5Bat(document.type%2C+%22post%22)%5D%5D",
                size,
                page + 1
            ))
        } else {
            Value::Null
        };

        Json(json!({
            "page": page,
            "results_per_page": size,
            "results_size": results.len(),
            "total_pages": total_pages,
            "next_page": next_page,
            "prev_page": null,
            "results": results,
        }))
        .into_response()
    }

    async fn spawn_cms(token: Option<&'static str>) -> (String, Fixture) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/api/v2", listener.local_addr().unwrap());
        let fixture = Fixture {
            base: base.clone(),
            master: Arc::new(Mutex::new("MASTER".to_string())),
            documents: Arc::new(documents()),
            api_calls: Arc::new(AtomicUsize::new(0)),
            token,
        };
        let app = Router::new()
            .route("/api/v2", get(api_root))
            .route("/api/v2/documents/search", get(search))
            .with_state(fixture.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (base, fixture)
    }

    fn client_for(endpoint: &str, page_size: usize, token: Option<&str>) -> PrismicClient {
        PrismicClient::new(&CmsConfig {
            endpoint: endpoint.to_string(),
            access_token: token.map(str::to_string),
            page_size,
            ..CmsConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        let config = CmsConfig {
            endpoint: "not a url".to_string(),
            ..CmsConfig::default()
        };
        assert!(matches!(
            PrismicClient::new(&config),
            Err(CmsError::InvalidEndpoint(_))
        ));

        let config = CmsConfig {
            endpoint: "ftp://cms.example/api/v2".to_string(),
            ..CmsConfig::default()
        };
        assert!(PrismicClient::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_master_ref_follows_publishing() {
        let (base, fixture) = spawn_cms(None).await;
        let client = client_for(&base, 10, None);
        assert_eq!(client.master_ref().await.unwrap(), "MASTER");
        assert_eq!(client.fetch_all().await.unwrap().len(), 3);

        // Publishing moves the master ref; the same client must see it
        *fixture.master.lock().unwrap() = "MASTER-2".to_string();
        assert_eq!(client.master_ref().await.unwrap(), "MASTER-2");
        assert_eq!(client.fetch_all().await.unwrap().len(), 3);
        assert_eq!(client.get_by_uid("first").await.unwrap().uid, "first");
    }

    #[tokio::test]
    async fn test_cursor_walk_looks_up_ref_once() {
        let (base, fixture) = spawn_cms(None).await;
        let client = client_for(&base, 1, None);
        assert_eq!(client.fetch_all().await.unwrap().len(), 3);
        assert_eq!(fixture.api_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_all_follows_cursor() {
        let (base, _) = spawn_cms(Some("secret")).await;
        // Two per page forces a cursor hop; the token must survive it
        let client = client_for(&base, 2, Some("secret"));
        let posts = client.fetch_all().await.unwrap();
        let uids: Vec<_> = posts.iter().map(|p| p.uid.as_str()).collect();
        assert_eq!(uids, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_fetch_page_returns_cursor() {
        let (base, _) = spawn_cms(None).await;
        let client = client_for(&base, 100, None);
        let page = client.fetch_page(1).await.unwrap();
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0].uid, "third");
        let next = page.next_page.expect("cursor");
        assert!(next.contains("page=2"));
    }

    #[tokio::test]
    async fn test_get_by_uid() {
        let (base, _) = spawn_cms(None).await;
        let client = client_for(&base, 100, None);
        let post = client.get_by_uid("second").await.unwrap();
        assert_eq!(post.title, "Title second");

        let err = client.get_by_uid("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_neighbors() {
        let (base, _) = spawn_cms(None).await;
        let client = client_for(&base, 100, None);

        let prev = client.neighbor("D2", Direction::Previous).await.unwrap();
        assert_eq!(prev.map(|p| p.uid), Some("first".to_string()));

        let next = client.neighbor("D2", Direction::Next).await.unwrap();
        assert_eq!(next.map(|p| p.uid), Some("third".to_string()));

        assert!(client
            .neighbor("D1", Direction::Previous)
            .await
            .unwrap()
            .is_none());
        assert!(client.neighbor("D3", Direction::Next).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unauthorized_status() {
        let (base, _) = spawn_cms(Some("secret")).await;
        let client = client_for(&base, 100, Some("wrong"));
        match client.master_ref().await {
            Err(CmsError::Status { status, url }) => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert!(!url.contains("wrong"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
