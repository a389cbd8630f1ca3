use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{CommentSource, Reaction};
use crate::model::comment::{Comment, PullRequestRef};

const GITHUB_API_URL: &str = "https://api.github.com";
const PER_PAGE: usize = 100;

pub struct GitHubProvider {
    client: reqwest::Client,
    api_url: String,
}

impl GitHubProvider {
    pub fn new(token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).context("Invalid GitHub token")?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("gitlin/0.1"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url: GITHUB_API_URL.to_string(),
        })
    }

    #[cfg(test)]
    pub fn with_url(token: &str, api_url: &str) -> Result<Self> {
        let mut provider = Self::new(token)?;
        provider.api_url = api_url.to_string();
        Ok(provider)
    }

    fn repo_url(&self, pr: &PullRequestRef) -> String {
        format!("{}/repos/{}/{}", self.api_url, pr.owner, pr.repo)
    }

    /// Walk `?page=N` until a short page comes back.
    async fn get_all_pages<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>> {
        let mut all = Vec::new();
        let mut page = 1usize;
        loop {
            let resp = self
                .client
                .get(url)
                .query(&[("per_page", PER_PAGE), ("page", page)])
                .send()
                .await
                .with_context(|| format!("GitHub request to {url} failed"))?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(anyhow!("GitHub API error: {status} - {body}"));
            }

            let batch: Vec<T> = resp
                .json()
                .await
                .context("Failed to parse GitHub response")?;
            let len = batch.len();
            all.extend(batch);
            if len < PER_PAGE {
                return Ok(all);
            }
            page += 1;
        }
    }

    /// POST a GraphQL query and unwrap `data`, turning `errors` into an error.
    async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T> {
        let url = format!("{}/graphql", self.api_url);
        let body = serde_json::json!({ "query": query, "variables": variables });
        let gql: GqlResponse<T> = self
            .post_json(&url, &body)
            .await?
            .json()
            .await
            .context("Failed to parse GitHub GraphQL response")?;

        if let Some(errors) = gql.errors {
            let messages: Vec<_> = errors.iter().map(|e| e.message.as_str()).collect();
            return Err(anyhow!("GraphQL errors: {}", messages.join(", ")));
        }
        gql.data.context("No data in GitHub GraphQL response")
    }

    /// Comments of one thread beyond the first page embedded in the thread listing.
    async fn remaining_thread_comments(
        &self,
        thread_id: &str,
        mut after: Option<String>,
    ) -> Result<Vec<ThreadComment>> {
        let mut all = Vec::new();
        while let Some(cursor) = after {
            let data: ThreadCommentsData = self
                .graphql(
                    THREAD_COMMENTS_QUERY,
                    serde_json::json!({ "id": thread_id, "after": cursor }),
                )
                .await?;
            let comments = data
                .node
                .and_then(|n| n.comments)
                .with_context(|| format!("Review thread {thread_id} not found"))?;
            all.extend(comments.nodes);
            after = comments.page_info.next_cursor();
        }
        Ok(all)
    }

    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<reqwest::Response> {
        let resp = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("GitHub request to {url} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("GitHub API error: {status} - {body}"));
        }
        Ok(resp)
    }
}

#[derive(Deserialize)]
struct GhIssueComment {
    id: i64,
    body: Option<String>,
}

#[derive(Deserialize)]
struct GhReviewComment {
    id: i64,
    body: Option<String>,
    path: String,
    line: Option<u32>,
    original_line: Option<u32>,
}

const REVIEW_THREADS_QUERY: &str = r"
    query ReviewThreads($owner: String!, $repo: String!, $number: Int!, $after: String) {
        repository(owner: $owner, name: $repo) {
            pullRequest(number: $number) {
                reviewThreads(first: 100, after: $after) {
                    pageInfo {
                        hasNextPage
                        endCursor
                    }
                    nodes {
                        id
                        isResolved
                        comments(first: 100) {
                            pageInfo {
                                hasNextPage
                                endCursor
                            }
                            nodes {
                                databaseId
                            }
                        }
                    }
                }
            }
        }
    }
";

const THREAD_COMMENTS_QUERY: &str = r"
    query ThreadComments($id: ID!, $after: String) {
        node(id: $id) {
            ... on PullRequestReviewThread {
                comments(first: 100, after: $after) {
                    pageInfo {
                        hasNextPage
                        endCursor
                    }
                    nodes {
                        databaseId
                    }
                }
            }
        }
    }
";

#[derive(Deserialize)]
struct GqlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GqlError>>,
}

#[derive(Deserialize)]
struct GqlError {
    message: String,
}

#[derive(Deserialize)]
struct ThreadsData {
    repository: Option<GqlRepository>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlRepository {
    pull_request: Option<GqlPullRequest>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlPullRequest {
    review_threads: ThreadConnection,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadConnection {
    page_info: PageInfo,
    nodes: Vec<ThreadNode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

impl PageInfo {
    fn next_cursor(self) -> Option<String> {
        if self.has_next_page {
            self.end_cursor
        } else {
            None
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadNode {
    id: String,
    is_resolved: bool,
    comments: ThreadComments,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadComments {
    page_info: PageInfo,
    nodes: Vec<ThreadComment>,
}

#[derive(Deserialize)]
struct ThreadCommentsData {
    node: Option<ThreadCommentsNode>,
}

#[derive(Deserialize)]
struct ThreadCommentsNode {
    comments: Option<ThreadComments>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadComment {
    database_id: Option<i64>,
}

#[async_trait]
impl CommentSource for GitHubProvider {
    #[instrument(skip(self, pr), fields(pr = %pr))]
    async fn general_comments(&self, pr: &PullRequestRef) -> Result<Vec<Comment>> {
        let url = format!("{}/issues/{}/comments", self.repo_url(pr), pr.number);
        let raw: Vec<GhIssueComment> = self.get_all_pages(&url).await?;
        debug!(count = raw.len(), "Fetched general comments");

        Ok(raw
            .into_iter()
            .map(|c| Comment::general(c.id, c.body.unwrap_or_default()))
            .collect())
    }

    #[instrument(skip(self, pr), fields(pr = %pr))]
    async fn review_comments(&self, pr: &PullRequestRef) -> Result<Vec<Comment>> {
        let url = format!("{}/pulls/{}/comments", self.repo_url(pr), pr.number);
        let raw: Vec<GhReviewComment> = self.get_all_pages(&url).await?;
        debug!(count = raw.len(), "Fetched review comments");

        Ok(raw
            .into_iter()
            .map(|c| {
                // Outdated comments lose `line` but keep `original_line`.
                let line = c.line.or(c.original_line);
                Comment::located(c.id, c.body.unwrap_or_default(), &c.path, line)
            })
            .collect())
    }

    #[instrument(skip(self, pr), fields(pr = %pr))]
    async fn resolution_map(&self, pr: &PullRequestRef) -> Result<HashMap<i64, bool>> {
        let mut map = HashMap::new();
        let mut after: Option<String> = None;

        loop {
            let data: ThreadsData = self
                .graphql(
                    REVIEW_THREADS_QUERY,
                    serde_json::json!({
                        "owner": pr.owner,
                        "repo": pr.repo,
                        "number": pr.number,
                        "after": after,
                    }),
                )
                .await?;

            let threads = data
                .repository
                .and_then(|r| r.pull_request)
                .map(|p| p.review_threads)
                .with_context(|| format!("Pull request {pr} not found"))?;

            for thread in threads.nodes {
                let mut comments = thread.comments.nodes;
                if let Some(cursor) = thread.comments.page_info.next_cursor() {
                    debug!(thread = %thread.id, "Paging long review thread");
                    comments.extend(self.remaining_thread_comments(&thread.id, Some(cursor)).await?);
                }
                for comment in comments {
                    if let Some(id) = comment.database_id {
                        map.insert(id, thread.is_resolved);
                    }
                }
            }

            after = threads.page_info.next_cursor();
            if after.is_none() {
                break;
            }
        }

        debug!(entries = map.len(), "Built resolution map");
        Ok(map)
    }

    #[instrument(skip(self, pr, body), fields(pr = %pr))]
    async fn post_comment(&self, pr: &PullRequestRef, body: &str) -> Result<()> {
        let url = format!("{}/issues/{}/comments", self.repo_url(pr), pr.number);
        self.post_json(&url, &serde_json::json!({ "body": body }))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, pr), fields(pr = %pr))]
    async fn react_to(
        &self,
        pr: &PullRequestRef,
        comment_id: i64,
        reaction: Reaction,
    ) -> Result<()> {
        let url = format!(
            "{}/issues/comments/{comment_id}/reactions",
            self.repo_url(pr)
        );
        self.post_json(&url, &serde_json::json!({ "content": reaction.as_str() }))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn pr() -> PullRequestRef {
        PullRequestRef::new("acme", "widgets", 7)
    }

    fn thread(id: &str, resolved: bool, ids: &[i64], next: Option<&str>) -> serde_json::Value {
        json!({
            "id": id,
            "isResolved": resolved,
            "comments": {
                "pageInfo": {"hasNextPage": next.is_some(), "endCursor": next},
                "nodes": ids.iter().map(|id| json!({"databaseId": id})).collect::<Vec<_>>()
            }
        })
    }

    #[tokio::test]
    async fn rest_listing_walks_pages_until_a_short_one() {
        let server = MockServer::start().await;
        let full_page: Vec<_> = (1..=100)
            .map(|id| json!({"id": id, "body": format!("comment {id}")}))
            .collect();
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/issues/7/comments"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(full_page)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/issues/7/comments"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 101, "body": "last"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let gh = GitHubProvider::with_url("t", &server.uri()).unwrap();
        let comments = gh.general_comments(&pr()).await.unwrap();

        assert_eq!(comments.len(), 101);
        assert_eq!(comments[100].body, "last");
    }

    #[tokio::test]
    async fn resolution_map_pages_threads_and_long_thread_comments() {
        let server = MockServer::start().await;
        // Remaining comments of the long resolved thread.
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_partial_json(json!({"variables": {"id": "T1", "after": "tc1"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"node": {"comments": {
                    "pageInfo": {"hasNextPage": false, "endCursor": "tc2"},
                    "nodes": [{"databaseId": 201}, {"databaseId": 202}]
                }}}
            })))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        // Second page of threads.
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_partial_json(json!({"variables": {"owner": "acme", "after": "p1"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"repository": {"pullRequest": {"reviewThreads": {
                    "pageInfo": {"hasNextPage": false, "endCursor": null},
                    "nodes": [thread("T2", false, &[300], None)]
                }}}}
            })))
            .with_priority(2)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_partial_json(json!({"variables": {"owner": "acme"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"repository": {"pullRequest": {"reviewThreads": {
                    "pageInfo": {"hasNextPage": true, "endCursor": "p1"},
                    "nodes": [thread("T1", true, &[101], Some("tc1"))]
                }}}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gh = GitHubProvider::with_url("t", &server.uri()).unwrap();
        let map = gh.resolution_map(&pr()).await.unwrap();

        assert_eq!(map.len(), 4);
        assert_eq!(map.get(&101), Some(&true));
        assert_eq!(map.get(&202), Some(&true));
        assert_eq!(map.get(&300), Some(&false));
    }

    #[tokio::test]
    async fn review_comments_fall_back_to_original_line() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/pulls/7/comments"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 11, "body": "tighten this", "path": "src/a.rs", "line": 4, "original_line": 4},
                {"id": 12, "body": "outdated", "path": "src/b.rs", "line": null, "original_line": 9}
            ])))
            .mount(&server)
            .await;

        let gh = GitHubProvider::with_url("t", &server.uri()).unwrap();
        let comments = gh.review_comments(&pr()).await.unwrap();

        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].line, Some(4));
        assert_eq!(comments[1].line, Some(9));
        assert_eq!(comments[1].path.as_deref(), Some("src/b.rs"));
    }

    #[tokio::test]
    async fn general_comments_surface_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/issues/7/comments"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
            .mount(&server)
            .await;

        let gh = GitHubProvider::with_url("t", &server.uri()).unwrap();
        let err = gh.general_comments(&pr()).await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn resolution_map_covers_every_comment_in_a_thread() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"repository": {"pullRequest": {"reviewThreads": {
                    "pageInfo": {"hasNextPage": false, "endCursor": null},
                    "nodes": [
                        thread("T1", true, &[11, 13], None),
                        thread("T2", false, &[12], None)
                    ]
                }}}}
            })))
            .mount(&server)
            .await;

        let gh = GitHubProvider::with_url("t", &server.uri()).unwrap();
        let map = gh.resolution_map(&pr()).await.unwrap();

        assert_eq!(map.get(&11), Some(&true));
        assert_eq!(map.get(&13), Some(&true));
        assert_eq!(map.get(&12), Some(&false));
    }

    #[tokio::test]
    async fn resolution_map_reports_graphql_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": null,
                "errors": [{"message": "Could not resolve to a Repository"}]
            })))
            .mount(&server)
            .await;

        let gh = GitHubProvider::with_url("t", &server.uri()).unwrap();
        let err = gh.resolution_map(&pr()).await.unwrap_err();
        assert!(err.to_string().contains("Could not resolve"));
    }

    #[tokio::test]
    async fn react_to_posts_reaction_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/widgets/issues/comments/99/reactions"))
            .and(body_partial_json(json!({"content": "eyes"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let gh = GitHubProvider::with_url("t", &server.uri()).unwrap();
        gh.react_to(&pr(), 99, Reaction::Eyes).await.unwrap();
    }
}
