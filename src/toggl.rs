use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
#[cfg(test)]
use mockall::automock;
use reqwest::Method;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::datetime::{format_iso8601, format_iso8601_query};
use crate::error::TogglError;
use crate::rest_client::RestRequester;
use crate::time_entry::TimeEntry;

/// time entryの作成元としてToggl APIに送信するアプリケーション名。
const CREATED_WITH: &str = "togglcsv";

/// Toggl APIのワークスペース情報をデシリアライズするための構造体。
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct TogglWorkspace {
    pub id: i64,
    pub name: String,
}

/// Toggl APIのクライアント情報。
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct TogglClient {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub id: i64,
    #[serde(rename = "wid")]
    pub workspace_id: i64,
    pub name: String,
}

/// Toggl APIのプロジェクト情報。
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct TogglProject {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub id: i64,
    #[serde(rename = "wid")]
    pub workspace_id: i64,
    /// `None`または`0`はクライアントなしを表す。
    #[serde(rename = "cid", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<i64>,
    pub name: String,
}

impl TogglProject {
    /// クライアントが設定されている場合はそのIDを返す。
    pub fn client(&self) -> Option<i64> {
        self.client_id.filter(|id| *id != 0)
    }
}

/// time entry作成時に送信するペイロード。
#[derive(Debug, Serialize)]
struct NewTimeEntry<'a> {
    wid: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pid: Option<i64>,
    start: String,
    duration: i64,
    billable: bool,
    description: &'a str,
    tags: &'a [String],
    created_with: &'static str,
}

#[derive(Serialize)]
struct ClientRequest<'a> {
    client: &'a TogglClient,
}

#[derive(Serialize)]
struct ProjectRequest<'a> {
    project: &'a TogglProject,
}

#[derive(Serialize)]
struct TimeEntryRequest<'a> {
    time_entry: NewTimeEntry<'a>,
}

/// 作成系APIのレスポンスは`data`で包まれている。
#[derive(Deserialize)]
struct DataResponse<T> {
    data: T,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

/// ワークスペースを取得するためのAPI。
#[cfg_attr(test, automock)]
#[async_trait(?Send)]
pub trait WorkspaceApi {
    /// 現在のユーザーが参加しているすべてのワークスペースを返す。
    async fn get_workspaces(&self) -> Result<Vec<TogglWorkspace>>;
}

/// クライアントを取得・作成するためのAPI。
#[cfg_attr(test, automock)]
#[async_trait(?Send)]
pub trait ClientApi {
    async fn get_clients(&self) -> Result<Vec<TogglClient>>;

    async fn create_client(&self, client: &TogglClient) -> Result<TogglClient>;
}

/// プロジェクトを取得・作成するためのAPI。
#[cfg_attr(test, automock)]
#[async_trait(?Send)]
pub trait ProjectApi {
    /// 指定されたワークスペースのすべてのプロジェクトを返す。
    async fn get_projects(&self, workspace_id: i64) -> Result<Vec<TogglProject>>;

    async fn create_project(&self, project: &TogglProject) -> Result<TogglProject>;
}

/// time entryを取得・作成するためのAPI。
#[cfg_attr(test, automock)]
#[async_trait(?Send)]
pub trait TimeEntryApi {
    /// 指定された期間に開始したtime entryを返す。
    ///
    /// Toggl APIは1リクエストあたりの件数に上限があるため、長い期間を指定してはならない。
    async fn get_time_entries(
        &self,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
    ) -> Result<Vec<TimeEntry>>;

    async fn create_time_entry(&self, time_entry: &TimeEntry) -> Result<TimeEntry>;
}

/// Toggl APIの各リソースへアクセスするためのクライアント。
///
/// すべてのリクエストは同じ`RestRequester`を経由するため、リクエスト間隔が守られる。
///
/// # Examples
///
/// ```
/// let api = TogglApi::new(TogglRestClient::new(&config));
/// let workspaces = api.get_workspaces().await?;
/// ```
pub struct TogglApi<R: RestRequester> {
    requester: R,
}

impl<R: RestRequester> TogglApi<R> {
    /// 新しい`TogglApi`を返す。
    pub fn new(requester: R) -> Self {
        Self { requester }
    }

    async fn get<T: DeserializeOwned>(&self, route: &str, what: &str) -> Result<T> {
        let content = self
            .requester
            .request(Method::GET, route, None)
            .await
            .with_context(|| format!("Failed to retrieve {}", what))?;

        deserialize(&content, what)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        route: &str,
        body: &B,
        what: &str,
    ) -> Result<T> {
        let payload = serde_json::to_string(body).map_err(|source| TogglError::Serialization {
            what: what.to_string(),
            source,
        })?;

        let content = self
            .requester
            .request(Method::POST, route, Some(payload))
            .await
            .with_context(|| format!("Failed to create {}", what))?;

        let response: DataResponse<T> = deserialize(&content, what)?;
        Ok(response.data)
    }
}

fn deserialize<T: DeserializeOwned>(content: &str, what: &str) -> Result<T> {
    let value = serde_json::from_str(content).map_err(|source| TogglError::Serialization {
        what: what.to_string(),
        source,
    })?;

    Ok(value)
}

#[async_trait(?Send)]
impl<R: RestRequester> WorkspaceApi for TogglApi<R> {
    async fn get_workspaces(&self) -> Result<Vec<TogglWorkspace>> {
        self.get("workspaces", "workspaces").await
    }
}

#[async_trait(?Send)]
impl<R: RestRequester> ClientApi for TogglApi<R> {
    async fn get_clients(&self) -> Result<Vec<TogglClient>> {
        // クライアントが1件もない場合、Toggl APIはnullを返す
        let clients: Option<Vec<TogglClient>> = self.get("clients", "clients").await?;
        Ok(clients.unwrap_or_default())
    }

    async fn create_client(&self, client: &TogglClient) -> Result<TogglClient> {
        self.post("clients", &ClientRequest { client }, "client")
            .await
    }
}

#[async_trait(?Send)]
impl<R: RestRequester> ProjectApi for TogglApi<R> {
    async fn get_projects(&self, workspace_id: i64) -> Result<Vec<TogglProject>> {
        let route = format!("workspaces/{}/projects", workspace_id);
        let projects: Option<Vec<TogglProject>> = self.get(&route, "projects").await?;
        Ok(projects.unwrap_or_default())
    }

    async fn create_project(&self, project: &TogglProject) -> Result<TogglProject> {
        self.post("projects", &ProjectRequest { project }, "project")
            .await
    }
}

#[async_trait(?Send)]
impl<R: RestRequester> TimeEntryApi for TogglApi<R> {
    async fn get_time_entries(
        &self,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
    ) -> Result<Vec<TimeEntry>> {
        let route = format!(
            "time_entries?start_date={}&end_date={}",
            urlencoding::encode(&format_iso8601_query(start)),
            urlencoding::encode(&format_iso8601_query(end)),
        );

        let time_entries: Option<Vec<TimeEntry>> = self
            .get(&route, "time entries")
            .await
            .with_context(|| format!("Start: {}, End: {}", start, end))?;
        let time_entries = time_entries.unwrap_or_default();
        info!(
            "Retrieved {} time entries between {} and {}",
            time_entries.len(),
            start,
            end
        );

        Ok(time_entries)
    }

    async fn create_time_entry(&self, time_entry: &TimeEntry) -> Result<TimeEntry> {
        let stop = time_entry
            .stop
            .context("Cannot create a time entry without a stop date")?;
        let request = TimeEntryRequest {
            time_entry: NewTimeEntry {
                wid: time_entry.workspace_id,
                pid: time_entry.project(),
                start: format_iso8601(&time_entry.start),
                duration: (stop - time_entry.start).num_seconds(),
                billable: time_entry.billable,
                description: &time_entry.description,
                tags: &time_entry.tags,
                created_with: CREATED_WITH,
            },
        };

        self.post("time_entries", &request, "time entry").await
    }
}
