use std::cell::RefCell;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::info;
#[cfg(test)]
use mockall::automock;

use crate::error::TogglError;
use crate::toggl::{ClientApi, TogglClient};
use crate::workspace::{Workspace, WorkspaceProvider};

/// ワークスペースに属する顧客。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub workspace: Workspace,
}

/// クライアントを参照・作成するためのtrait。
#[cfg_attr(test, automock)]
#[async_trait(?Send)]
pub trait ClientProvider {
    /// 指定されたワークスペースにクライアントを作成する。
    async fn create_client(&self, workspace_id: i64, name: &str) -> Result<Client>;

    /// すべてのクライアントを返す。
    async fn get_clients(&self) -> Result<Vec<Client>>;

    /// 指定されたIDのクライアントを返す。見つからない場合はエラーを返す。
    async fn get_client_by_id(&self, client_id: i64) -> Result<Client>;

    /// ワークスペース名とクライアント名が一致するクライアントを返す。見つからない場合はエラーを返す。
    async fn get_client_by_name(&self, workspace_name: &str, client_name: &str) -> Result<Client>;
}

/// クライアントの一覧をキャッシュするリポジトリ。
pub struct ClientRepository<'a, A: ClientApi, W: WorkspaceProvider> {
    api: &'a A,
    workspaces: &'a W,
    cache: RefCell<Option<Vec<Client>>>,
}

impl<'a, A: ClientApi, W: WorkspaceProvider> ClientRepository<'a, A, W> {
    /// 新しい`ClientRepository`を返す。
    pub fn new(api: &'a A, workspaces: &'a W) -> Self {
        Self {
            api,
            workspaces,
            cache: RefCell::new(None),
        }
    }
}

#[async_trait(?Send)]
impl<'a, A: ClientApi, W: WorkspaceProvider> ClientProvider for ClientRepository<'a, A, W> {
    async fn create_client(&self, workspace_id: i64, name: &str) -> Result<Client> {
        let workspace = self
            .workspaces
            .get_workspace_by_id(workspace_id)
            .await
            .with_context(|| format!("Failed to get workspace with id {}", workspace_id))?;

        let created = self
            .api
            .create_client(&TogglClient {
                id: 0,
                workspace_id: workspace.id,
                name: name.to_string(),
            })
            .await?;
        info!("Created client {:?} (id {})", created.name, created.id);

        // 次回の参照で作成したクライアントを含む一覧を取得し直す
        *self.cache.borrow_mut() = None;

        Ok(Client {
            id: created.id,
            name: created.name,
            workspace,
        })
    }

    async fn get_clients(&self) -> Result<Vec<Client>> {
        let cached = self.cache.borrow().clone();
        if let Some(clients) = cached {
            return Ok(clients);
        }

        let toggl_clients = self
            .api
            .get_clients()
            .await
            .context("Failed to get clients from Toggl")?;

        let mut clients = Vec::with_capacity(toggl_clients.len());
        for client in toggl_clients {
            let workspace = self
                .workspaces
                .get_workspace_by_id(client.workspace_id)
                .await
                .with_context(|| format!("Failed to get workspace for client {}", client.id))?;

            clients.push(Client {
                id: client.id,
                name: client.name,
                workspace,
            });
        }
        info!("Loaded {} clients", clients.len());

        *self.cache.borrow_mut() = Some(clients.clone());
        Ok(clients)
    }

    async fn get_client_by_id(&self, client_id: i64) -> Result<Client> {
        self.get_clients()
            .await?
            .into_iter()
            .find(|client| client.id == client_id)
            .ok_or_else(|| TogglError::not_found("client", format!("id {}", client_id)).into())
    }

    async fn get_client_by_name(&self, workspace_name: &str, client_name: &str) -> Result<Client> {
        self.get_clients()
            .await?
            .into_iter()
            .find(|client| client.workspace.name == workspace_name && client.name == client_name)
            .ok_or_else(|| {
                TogglError::not_found(
                    "client",
                    format!("{:?} in workspace {:?}", client_name, workspace_name),
                )
                .into()
            })
    }
}
