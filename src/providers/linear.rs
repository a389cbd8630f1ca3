use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{ItemCreateOutcome, NewItem, Tracker, TrackerIssue, TrackerLabel, TrackerUser};
use crate::model::candidate::NO_PRIORITY_ORDINAL;
use crate::model::tracked::TrackedItem;

const LINEAR_API_URL: &str = "https://api.linear.app/graphql";

pub struct LinearProvider {
    client: reqwest::Client,
    api_url: String,
}

impl LinearProvider {
    /// Personal API keys (`lin_api_*`) go in the header as-is, OAuth tokens
    /// need the `Bearer` prefix.
    pub fn new(api_key: &str) -> Result<Self> {
        let auth_value = if api_key.starts_with("lin_api_") {
            api_key.to_string()
        } else {
            format!("Bearer {api_key}")
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value).context("Invalid Linear API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url: LINEAR_API_URL.to_string(),
        })
    }

    #[cfg(test)]
    pub fn with_url(api_key: &str, api_url: &str) -> Result<Self> {
        let mut provider = Self::new(api_key)?;
        provider.api_url = api_url.to_string();
        Ok(provider)
    }

    async fn execute<V: Serialize, R: DeserializeOwned>(
        &self,
        query: &'static str,
        variables: V,
    ) -> Result<R> {
        let request = GqlRequest { query, variables };

        let resp = self
            .client
            .post(&self.api_url)
            .json(&request)
            .send()
            .await
            .context("Linear API request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Linear API returned error status {status}: {body}"));
        }

        let gql: GqlResponse<R> = resp
            .json()
            .await
            .context("Failed to parse Linear response")?;

        if let Some(errors) = gql.errors {
            let messages: Vec<_> = errors.iter().map(|e| e.message.as_str()).collect();
            return Err(anyhow!("GraphQL errors: {}", messages.join(", ")));
        }

        gql.data.context("No data in Linear response")
    }

    /// Follow a connection's cursor to the end. `field` is the connection's
    /// name in the response; `after` is set in `variables` for each page.
    async fn fetch_all<T: DeserializeOwned>(
        &self,
        query: &'static str,
        field: &str,
        mut variables: serde_json::Value,
    ) -> Result<Vec<T>> {
        let mut all = Vec::new();
        loop {
            let mut data: HashMap<String, Connection<T>> = self.execute(query, &variables).await?;
            let page = data
                .remove(field)
                .with_context(|| format!("Missing {field} in Linear response"))?;
            all.extend(page.nodes);

            match page.page_info {
                PageInfo {
                    has_next_page: true,
                    end_cursor: Some(cursor),
                } => variables["after"] = cursor.into(),
                _ => return Ok(all),
            }
        }
    }
}

/// Linear uses 0 for "no priority" and 1..=4 for urgent..low.
fn linear_priority(ordinal: u8) -> u8 {
    if ordinal >= NO_PRIORITY_ORDINAL {
        0
    } else {
        ordinal + 1
    }
}

#[derive(Serialize)]
struct GqlRequest<V: Serialize> {
    query: &'static str,
    variables: V,
}

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
#[serde(rename_all = "camelCase")]
struct Connection<T> {
    nodes: Vec<T>,
    page_info: PageInfo,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Deserialize)]
struct Issue {
    identifier: String,
    title: String,
    url: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct Label {
    id: String,
    name: String,
    #[serde(default)]
    team: Option<Team>,
}

#[derive(Deserialize)]
struct Team {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct User {
    id: String,
    email: Option<String>,
    name: Option<String>,
    display_name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IssueCreateInput<'a> {
    team_id: &'a str,
    title: &'a str,
    description: &'a str,
    priority: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    label_ids: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assignee_id: Option<&'a str>,
}

const ISSUES_BY_DESCRIPTION: &str = r"
    query IssuesByDescription($text: String!, $after: String) {
        issues(
            filter: { description: { contains: $text } }
            first: 100
            after: $after
            includeArchived: true
        ) {
            pageInfo {
                hasNextPage
                endCursor
            }
            nodes {
                identifier
                title
                url
                description
            }
        }
    }
";

const LIST_LABELS: &str = r"
    query Labels($teamId: ID!, $after: String) {
        issueLabels(
            filter: { or: [{ team: { id: { eq: $teamId } } }, { team: { null: true } }] }
            first: 250
            after: $after
        ) {
            pageInfo {
                hasNextPage
                endCursor
            }
            nodes {
                id
                name
                team {
                    id
                }
            }
        }
    }
";

const CREATE_LABEL: &str = r"
    mutation CreateLabel($name: String!, $color: String!, $teamId: String!) {
        issueLabelCreate(input: { name: $name, color: $color, teamId: $teamId }) {
            success
            issueLabel {
                id
                name
                team {
                    id
                }
            }
        }
    }
";

const LIST_USERS: &str = r"
    query Users($after: String) {
        users(first: 250, after: $after) {
            pageInfo {
                hasNextPage
                endCursor
            }
            nodes {
                id
                email
                name
                displayName
            }
        }
    }
";

const CREATE_ISSUE: &str = r"
    mutation CreateIssue($input: IssueCreateInput!) {
        issueCreate(input: $input) {
            success
            issue {
                identifier
                title
                url
                description
            }
        }
    }
";

#[async_trait]
impl Tracker for LinearProvider {
    fn name(&self) -> &str {
        "Linear"
    }

    #[instrument(skip(self))]
    async fn query_by_substring(&self, text: &str) -> Result<Vec<TrackerIssue>> {
        let issues: Vec<Issue> = self
            .fetch_all(
                ISSUES_BY_DESCRIPTION,
                "issues",
                serde_json::json!({ "text": text, "after": null }),
            )
            .await?;
        debug!(count = issues.len(), "Issues matched marker");

        Ok(issues
            .into_iter()
            .map(|i| TrackerIssue {
                identifier: i.identifier,
                description: i.description,
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn list_labels(&self, team_id: &str) -> Result<Vec<TrackerLabel>> {
        let labels: Vec<Label> = self
            .fetch_all(
                LIST_LABELS,
                "issueLabels",
                serde_json::json!({ "teamId": team_id, "after": null }),
            )
            .await?;
        Ok(labels
            .into_iter()
            .map(|l| TrackerLabel {
                id: l.id,
                name: l.name,
                team_id: l.team.map(|t| t.id),
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn create_label(&self, name: &str, color: &str, team_id: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct Data {
            #[serde(rename = "issueLabelCreate")]
            issue_label_create: LabelCreateResult,
        }

        #[derive(Deserialize)]
        struct LabelCreateResult {
            success: bool,
            #[serde(rename = "issueLabel")]
            issue_label: Option<Label>,
        }

        let data: Data = self
            .execute(
                CREATE_LABEL,
                serde_json::json!({ "name": name, "color": color, "teamId": team_id }),
            )
            .await?;

        let result = data.issue_label_create;
        match result.issue_label {
            Some(label) if result.success => Ok(label.id),
            _ => Err(anyhow!("Linear refused to create label {name}")),
        }
    }

    #[instrument(skip(self))]
    async fn list_users(&self) -> Result<Vec<TrackerUser>> {
        let users: Vec<User> = self
            .fetch_all(LIST_USERS, "users", serde_json::json!({ "after": null }))
            .await?;
        debug!(count = users.len(), "Loaded user directory");
        Ok(users
            .into_iter()
            .map(|u| TrackerUser {
                id: u.id,
                email: u.email,
                name: u.name,
                display_name: u.display_name,
            })
            .collect())
    }

    #[instrument(skip(self, item), fields(title = %item.title))]
    async fn create_item(&self, item: &NewItem) -> Result<ItemCreateOutcome> {
        #[derive(Deserialize)]
        struct Data {
            #[serde(rename = "issueCreate")]
            issue_create: IssueCreateResult,
        }

        #[derive(Deserialize)]
        struct IssueCreateResult {
            success: bool,
            issue: Option<Issue>,
        }

        let input = IssueCreateInput {
            team_id: &item.team_id,
            title: &item.title,
            description: &item.description,
            priority: linear_priority(item.priority_ordinal),
            label_ids: (!item.label_ids.is_empty()).then_some(item.label_ids.as_slice()),
            assignee_id: item.assignee_id.as_deref(),
        };

        let data: Data = self
            .execute(CREATE_ISSUE, serde_json::json!({ "input": input }))
            .await?;

        Ok(ItemCreateOutcome {
            success: data.issue_create.success,
            item: data.issue_create.issue.map(|i| TrackedItem {
                external_id: i.identifier,
                url: i.url,
                title: i.title,
            }),
        })
    }
}
