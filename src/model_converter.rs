use anyhow::{Context, Result};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::client::ClientProvider;
use crate::error::TogglError;
use crate::project::ProjectProvider;
use crate::time_entry::TimeEntry;
use crate::time_record::TimeRecord;
use crate::workspace::WorkspaceProvider;

/// 名前で参照する`TimeRecord`とIDで参照する`TimeEntry`を相互に変換するためのtrait。
#[cfg_attr(test, automock)]
#[async_trait(?Send)]
pub trait ModelConverter {
    /// `TimeEntry`を`TimeRecord`に変換する。
    async fn to_time_record(&self, time_entry: &TimeEntry) -> Result<TimeRecord>;

    /// `TimeRecord`を`TimeEntry`に変換する。
    ///
    /// ワークスペースやプロジェクトが存在しない場合はエラーを返し、作成は行わない。
    async fn to_time_entry(&self, time_record: &TimeRecord) -> Result<TimeEntry>;
}

/// 各リポジトリを使って名前とIDを解決するコンバーター。
pub struct TogglModelConverter<'a, W: WorkspaceProvider, P: ProjectProvider, C: ClientProvider> {
    workspaces: &'a W,
    projects: &'a P,
    clients: &'a C,
}

impl<'a, W: WorkspaceProvider, P: ProjectProvider, C: ClientProvider>
    TogglModelConverter<'a, W, P, C>
{
    /// 新しい`TogglModelConverter`を返す。
    pub fn new(workspaces: &'a W, projects: &'a P, clients: &'a C) -> Self {
        Self {
            workspaces,
            projects,
            clients,
        }
    }
}

#[async_trait(?Send)]
impl<'a, W: WorkspaceProvider, P: ProjectProvider, C: ClientProvider> ModelConverter
    for TogglModelConverter<'a, W, P, C>
{
    async fn to_time_record(&self, time_entry: &TimeEntry) -> Result<TimeRecord> {
        let stop = time_entry.stop.ok_or_else(|| {
            TogglError::Validation(format!(
                "Cannot convert the running time entry {}",
                time_entry.id
            ))
        })?;

        let workspace = self
            .workspaces
            .get_workspace_by_id(time_entry.workspace_id)
            .await
            .with_context(|| format!("No workspace found with ID {}", time_entry.workspace_id))?;

        let mut project_name = String::new();
        let mut client_name = String::new();
        if let Some(project_id) = time_entry.project() {
            let project = self
                .projects
                .get_project_by_id(project_id)
                .await
                .with_context(|| format!("No project found with ID {}", project_id))?;

            if let Some(client_id) = project.client.as_ref().map(|client| client.id) {
                let client = self
                    .clients
                    .get_client_by_id(client_id)
                    .await
                    .with_context(|| format!("No client found with ID {}", client_id))?;
                client_name = client.name;
            }
            project_name = project.name;
        }

        Ok(TimeRecord {
            start: time_entry.start,
            stop,
            workspace_name: workspace.name,
            project_name,
            client_name,
            description: time_entry.description.clone(),
            tags: time_entry.tags.clone(),
        })
    }

    async fn to_time_entry(&self, time_record: &TimeRecord) -> Result<TimeEntry> {
        let workspace = self
            .workspaces
            .get_workspace_by_name(&time_record.workspace_name)
            .await
            .context("Cannot convert time record to time entry")?;

        let project = self
            .projects
            .get_project_by_name(
                &time_record.project_name,
                &time_record.workspace_name,
                &time_record.client_name,
            )
            .await
            .context("Cannot convert time record to time entry")?;

        Ok(TimeEntry {
            id: 0,
            workspace_id: workspace.id,
            project_id: Some(project.id),
            start: time_record.start,
            stop: Some(time_record.stop),
            billable: false,
            description: time_record.description.clone(),
            tags: time_record.tags.clone(),
        })
    }
}
