use std::cell::RefCell;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::info;
#[cfg(test)]
use mockall::automock;

use crate::error::TogglError;
use crate::toggl::WorkspaceApi;

/// 時間記録をまとめるワークスペース(例: 会社やチーム)。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Workspace {
    pub id: i64,
    pub name: String,
}

/// ワークスペースを参照するためのtrait。
#[cfg_attr(test, automock)]
#[async_trait(?Send)]
pub trait WorkspaceProvider {
    /// ワークスペースを作成する。
    ///
    /// Toggl APIはワークスペースの作成をサポートしていないため、常にエラーを返す。
    async fn create_workspace(&self, name: &str) -> Result<Workspace>;

    /// すべてのワークスペースを返す。
    async fn get_workspaces(&self) -> Result<Vec<Workspace>>;

    /// 指定されたIDのワークスペースを返す。見つからない場合はエラーを返す。
    async fn get_workspace_by_id(&self, workspace_id: i64) -> Result<Workspace>;

    /// 指定された名前のワークスペースを返す。見つからない場合はエラーを返す。
    async fn get_workspace_by_name(&self, workspace_name: &str) -> Result<Workspace>;
}

/// ワークスペースの一覧をキャッシュするリポジトリ。
pub struct WorkspaceRepository<'a, A: WorkspaceApi> {
    api: &'a A,
    cache: RefCell<Option<Vec<Workspace>>>,
}

impl<'a, A: WorkspaceApi> WorkspaceRepository<'a, A> {
    /// 新しい`WorkspaceRepository`を返す。
    pub fn new(api: &'a A) -> Self {
        Self {
            api,
            cache: RefCell::new(None),
        }
    }
}

#[async_trait(?Send)]
impl<'a, A: WorkspaceApi> WorkspaceProvider for WorkspaceRepository<'a, A> {
    async fn create_workspace(&self, name: &str) -> Result<Workspace> {
        Err(TogglError::Unsupported(format!(
            "Creating workspaces is not supported by the Toggl API. You must create the workspace {:?} from the Toggl website.",
            name
        ))
        .into())
    }

    async fn get_workspaces(&self) -> Result<Vec<Workspace>> {
        let cached = self.cache.borrow().clone();
        if let Some(workspaces) = cached {
            return Ok(workspaces);
        }

        let workspaces: Vec<Workspace> = self
            .api
            .get_workspaces()
            .await
            .context("Failed to get workspaces from Toggl")?
            .into_iter()
            .map(|workspace| Workspace {
                id: workspace.id,
                name: workspace.name,
            })
            .collect();
        info!("Loaded {} workspaces", workspaces.len());

        *self.cache.borrow_mut() = Some(workspaces.clone());
        Ok(workspaces)
    }

    async fn get_workspace_by_id(&self, workspace_id: i64) -> Result<Workspace> {
        self.get_workspaces()
            .await?
            .into_iter()
            .find(|workspace| workspace.id == workspace_id)
            .ok_or_else(|| TogglError::not_found("workspace", format!("id {}", workspace_id)).into())
    }

    async fn get_workspace_by_name(&self, workspace_name: &str) -> Result<Workspace> {
        self.get_workspaces()
            .await?
            .into_iter()
            .find(|workspace| workspace.name == workspace_name)
            .ok_or_else(|| TogglError::not_found("workspace", format!("{:?}", workspace_name)).into())
    }
}
