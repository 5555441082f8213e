use std::cell::RefCell;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::info;
#[cfg(test)]
use mockall::automock;

use crate::client::{Client, ClientProvider};
use crate::error::TogglError;
use crate::toggl::{ProjectApi, TogglProject};
use crate::workspace::{Workspace, WorkspaceProvider};

/// ワークスペースに属するプロジェクト(例: "Manhattan Project")。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub client: Option<Client>,
    pub workspace: Workspace,
}

impl Project {
    /// クライアント名を返す。クライアントがない場合は空文字列を返す。
    pub fn client_name(&self) -> &str {
        self.client
            .as_ref()
            .map(|client| client.name.as_str())
            .unwrap_or_default()
    }
}

/// プロジェクトを参照・作成するためのtrait。
#[cfg_attr(test, automock)]
#[async_trait(?Send)]
pub trait ProjectProvider {
    /// プロジェクトを作成する。
    ///
    /// `client_name`が空でなく、そのクライアントが存在しない場合はクライアントも作成する。
    async fn create_project(
        &self,
        project_name: &str,
        workspace_name: &str,
        client_name: &str,
    ) -> Result<Project>;

    /// すべてのワークスペースのすべてのプロジェクトを返す。
    async fn get_projects(&self) -> Result<Vec<Project>>;

    /// 指定されたIDのプロジェクトを返す。見つからない場合はエラーを返す。
    async fn get_project_by_id(&self, project_id: i64) -> Result<Project>;

    /// プロジェクト名、ワークスペース名、クライアント名がすべて一致するプロジェクトを返す。
    ///
    /// 空のクライアント名はクライアントのないプロジェクトに一致する。
    async fn get_project_by_name(
        &self,
        project_name: &str,
        workspace_name: &str,
        client_name: &str,
    ) -> Result<Project>;
}

/// プロジェクトの一覧をキャッシュするリポジトリ。
pub struct ProjectRepository<'a, A: ProjectApi, W: WorkspaceProvider, C: ClientProvider> {
    api: &'a A,
    workspaces: &'a W,
    clients: &'a C,
    cache: RefCell<Option<Vec<Project>>>,
}

impl<'a, A: ProjectApi, W: WorkspaceProvider, C: ClientProvider> ProjectRepository<'a, A, W, C> {
    /// 新しい`ProjectRepository`を返す。
    pub fn new(api: &'a A, workspaces: &'a W, clients: &'a C) -> Self {
        Self {
            api,
            workspaces,
            clients,
            cache: RefCell::new(None),
        }
    }

    /// 指定された名前のクライアントを返す。存在しない場合は作成する。
    ///
    /// 一覧の読み込みで発生したエラーは、名前の検索で見つからなかった場合と区別してそのまま返す。
    async fn get_or_create_client(&self, workspace: &Workspace, client_name: &str) -> Result<Client> {
        self.clients
            .get_clients()
            .await
            .context("Failed to load clients")?;

        match self
            .clients
            .get_client_by_name(&workspace.name, client_name)
            .await
        {
            Ok(client) => Ok(client),
            Err(error) if TogglError::is_not_found(&error) => self
                .clients
                .create_client(workspace.id, client_name)
                .await
                .with_context(|| format!("Failed to create client: {}", client_name)),
            Err(error) => Err(error.context(format!("Failed to get client: {}", client_name))),
        }
    }
}

#[async_trait(?Send)]
impl<'a, A: ProjectApi, W: WorkspaceProvider, C: ClientProvider> ProjectProvider
    for ProjectRepository<'a, A, W, C>
{
    async fn create_project(
        &self,
        project_name: &str,
        workspace_name: &str,
        client_name: &str,
    ) -> Result<Project> {
        let workspace = self
            .workspaces
            .get_workspace_by_name(workspace_name)
            .await
            .with_context(|| format!("Failed to get workspace {:?}", workspace_name))?;

        let client = if client_name.is_empty() {
            None
        } else {
            Some(self.get_or_create_client(&workspace, client_name).await?)
        };

        let created = self
            .api
            .create_project(&TogglProject {
                id: 0,
                workspace_id: workspace.id,
                client_id: client.as_ref().map(|client| client.id),
                name: project_name.to_string(),
            })
            .await?;
        info!("Created project {:?} (id {})", created.name, created.id);

        // 次回の参照で作成したプロジェクトを含む一覧を取得し直す
        *self.cache.borrow_mut() = None;

        Ok(Project {
            id: created.id,
            name: created.name,
            client,
            workspace,
        })
    }

    async fn get_projects(&self) -> Result<Vec<Project>> {
        let cached = self.cache.borrow().clone();
        if let Some(projects) = cached {
            return Ok(projects);
        }

        let workspaces = self
            .workspaces
            .get_workspaces()
            .await
            .context("Failed to retrieve workspaces")?;

        let mut projects = Vec::new();
        for workspace in workspaces {
            let toggl_projects = self
                .api
                .get_projects(workspace.id)
                .await
                .with_context(|| {
                    format!("Failed to get projects of workspace {:?} from Toggl", workspace.name)
                })?;

            for project in toggl_projects {
                let client = match project.client() {
                    Some(client_id) => Some(
                        self.clients
                            .get_client_by_id(client_id)
                            .await
                            .with_context(|| format!("Failed to get client {}", client_id))?,
                    ),
                    None => None,
                };

                projects.push(Project {
                    id: project.id,
                    name: project.name,
                    client,
                    workspace: workspace.clone(),
                });
            }
        }
        info!("Loaded {} projects", projects.len());

        *self.cache.borrow_mut() = Some(projects.clone());
        Ok(projects)
    }

    async fn get_project_by_id(&self, project_id: i64) -> Result<Project> {
        self.get_projects()
            .await?
            .into_iter()
            .find(|project| project.id == project_id)
            .ok_or_else(|| TogglError::not_found("project", format!("id {}", project_id)).into())
    }

    async fn get_project_by_name(
        &self,
        project_name: &str,
        workspace_name: &str,
        client_name: &str,
    ) -> Result<Project> {
        self.get_projects()
            .await?
            .into_iter()
            .find(|project| {
                project.name == project_name
                    && project.workspace.name == workspace_name
                    && project.client_name() == client_name
            })
            .ok_or_else(|| {
                TogglError::not_found(
                    "project",
                    format!(
                        "{:?} (Workspace: {:?}, Client: {:?})",
                        project_name, workspace_name, client_name
                    ),
                )
                .into()
            })
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use rstest::rstest;

    use super::{ProjectProvider, ProjectRepository};
    use crate::client::{Client, MockClientProvider};
    use crate::error::TogglError;
    use crate::toggl::{MockProjectApi, TogglProject};
    use crate::workspace::{MockWorkspaceProvider, Workspace};

    fn workspace(id: i64) -> Workspace {
        Workspace {
            id,
            name: format!("Workspace {}", id),
        }
    }

    fn client(id: i64, workspace_id: i64) -> Client {
        Client {
            id,
            name: format!("Client {}", id),
            workspace: workspace(workspace_id),
        }
    }

    fn toggl_project(id: i64, workspace_id: i64, client_id: Option<i64>) -> TogglProject {
        TogglProject {
            id,
            workspace_id,
            client_id,
            name: format!("Project {}", id),
        }
    }

    fn workspaces() -> MockWorkspaceProvider {
        let mut workspaces = MockWorkspaceProvider::new();
        workspaces
            .expect_get_workspaces()
            .returning(|| Ok(vec![workspace(1), workspace(2)]));
        workspaces
            .expect_get_workspace_by_name()
            .returning(|name| match name {
                "Workspace 1" => Ok(workspace(1)),
                "Workspace 2" => Ok(workspace(2)),
                _ => Err(TogglError::not_found("workspace", name).into()),
            });
        workspaces
    }

    fn clients() -> MockClientProvider {
        let mut clients = MockClientProvider::new();
        clients
            .expect_get_client_by_id()
            .returning(|id| Ok(client(id, 1)));
        clients
    }

    /// ワークスペース1に2件(うち1件はクライアントあり)、ワークスペース2に1件のプロジェクトを返すAPI。
    fn api_with_projects(times: usize) -> MockProjectApi {
        let mut api = MockProjectApi::new();
        api.expect_get_projects()
            .times(times * 2)
            .returning(|workspace_id| match workspace_id {
                1 => Ok(vec![
                    toggl_project(10, 1, Some(100)),
                    toggl_project(11, 1, Some(0)),
                ]),
                _ => Ok(vec![toggl_project(20, 2, None)]),
            });
        api
    }

    #[tokio::test]
    async fn test_get_projects_across_workspaces() {
        let api = api_with_projects(1);
        let workspaces = workspaces();
        let clients = clients();
        let repository = ProjectRepository::new(&api, &workspaces, &clients);

        let projects = repository.get_projects().await.unwrap();

        assert_eq!(
            projects.iter().map(|project| project.id).collect::<Vec<_>>(),
            vec![10, 11, 20]
        );
        assert_eq!(projects[0].client, Some(client(100, 1)));
        assert_eq!(projects[1].client, None);
        assert_eq!(projects[2].workspace, workspace(2));
    }

    #[tokio::test]
    async fn test_get_projects_uses_cache() {
        let api = api_with_projects(1);
        let workspaces = workspaces();
        let clients = clients();
        let repository = ProjectRepository::new(&api, &workspaces, &clients);

        repository.get_projects().await.unwrap();
        repository.get_project_by_id(20).await.unwrap();
        repository
            .get_project_by_name("Project 11", "Workspace 1", "")
            .await
            .unwrap();
    }

    /// クライアントを解決できないプロジェクトがあれば全体が失敗することを確認する。
    #[tokio::test]
    async fn test_get_projects_unknown_client() {
        let mut api = MockProjectApi::new();
        api.expect_get_projects()
            .times(1)
            .returning(|_| Ok(vec![toggl_project(10, 1, Some(100))]));
        let workspaces = workspaces();
        let mut clients = MockClientProvider::new();
        clients
            .expect_get_client_by_id()
            .returning(|id| Err(TogglError::not_found("client", format!("id {}", id)).into()));
        let repository = ProjectRepository::new(&api, &workspaces, &clients);

        assert!(repository.get_projects().await.is_err());
    }

    #[tokio::test]
    async fn test_get_projects_api_error() {
        let mut api = MockProjectApi::new();
        api.expect_get_projects()
            .returning(|_| Err(anyhow!("Some error")));
        let workspaces = workspaces();
        let clients = clients();
        let repository = ProjectRepository::new(&api, &workspaces, &clients);

        assert!(repository.get_projects().await.is_err());
    }

    #[rstest]
    #[case::with_client("Project 10", "Workspace 1", "Client 100", Some(10))]
    #[case::without_client("Project 20", "Workspace 2", "", Some(20))]
    #[case::client_mismatch("Project 10", "Workspace 1", "", None)]
    #[case::unexpected_client("Project 20", "Workspace 2", "Client 100", None)]
    #[case::workspace_mismatch("Project 10", "Workspace 2", "Client 100", None)]
    #[case::unknown("Project 99", "Workspace 1", "", None)]
    #[tokio::test]
    async fn test_get_project_by_name(
        #[case] project_name: &str,
        #[case] workspace_name: &str,
        #[case] client_name: &str,
        #[case] expected_id: Option<i64>,
    ) {
        let api = api_with_projects(1);
        let workspaces = workspaces();
        let clients = clients();
        let repository = ProjectRepository::new(&api, &workspaces, &clients);

        let result = repository
            .get_project_by_name(project_name, workspace_name, client_name)
            .await;

        match expected_id {
            Some(id) => assert_eq!(result.unwrap().id, id),
            None => assert!(TogglError::is_not_found(&result.unwrap_err())),
        }
    }

    #[tokio::test]
    async fn test_get_project_by_id_not_found() {
        let api = api_with_projects(1);
        let workspaces = workspaces();
        let clients = clients();
        let repository = ProjectRepository::new(&api, &workspaces, &clients);

        let error = repository.get_project_by_id(99).await.unwrap_err();

        assert!(TogglError::is_not_found(&error));
    }

    #[tokio::test]
    async fn test_create_project_without_client() {
        let mut api = MockProjectApi::new();
        api.expect_create_project()
            .withf(|project| {
                project.name == "New" && project.workspace_id == 2 && project.client_id.is_none()
            })
            .times(1)
            .returning(|project| Ok(TogglProject { id: 30, ..project.clone() }));
        let workspaces = workspaces();
        let clients = MockClientProvider::new();
        let repository = ProjectRepository::new(&api, &workspaces, &clients);

        let project = repository
            .create_project("New", "Workspace 2", "")
            .await
            .unwrap();

        assert_eq!(project.id, 30);
        assert_eq!(project.client, None);
        assert_eq!(project.workspace, workspace(2));
    }

    #[tokio::test]
    async fn test_create_project_with_existing_client() {
        let mut api = MockProjectApi::new();
        api.expect_create_project()
            .withf(|project| project.client_id == Some(100))
            .times(1)
            .returning(|project| Ok(TogglProject { id: 31, ..project.clone() }));
        let workspaces = workspaces();
        let mut clients = MockClientProvider::new();
        clients.expect_get_clients().returning(|| Ok(vec![]));
        clients
            .expect_get_client_by_name()
            .withf(|workspace_name, client_name| {
                workspace_name == "Workspace 1" && client_name == "Client 100"
            })
            .returning(|_, _| Ok(client(100, 1)));
        clients.expect_create_client().never();
        let repository = ProjectRepository::new(&api, &workspaces, &clients);

        let project = repository
            .create_project("New", "Workspace 1", "Client 100")
            .await
            .unwrap();

        assert_eq!(project.client, Some(client(100, 1)));
    }

    /// クライアントが存在しない場合はクライアントを作成してからプロジェクトを作成することを確認する。
    #[tokio::test]
    async fn test_create_project_creates_missing_client() {
        let mut sequence = mockall::Sequence::new();
        let workspaces = workspaces();
        let mut clients = MockClientProvider::new();
        clients.expect_get_clients().returning(|| Ok(vec![]));
        clients
            .expect_get_client_by_name()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, name| Err(TogglError::not_found("client", name).into()));
        clients
            .expect_create_client()
            .withf(|workspace_id, name| *workspace_id == 1 && name == "Client 200")
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(client(200, 1)));
        let mut api = MockProjectApi::new();
        api.expect_create_project()
            .withf(|project| project.client_id == Some(200))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|project| Ok(TogglProject { id: 32, ..project.clone() }));
        let repository = ProjectRepository::new(&api, &workspaces, &clients);

        let project = repository
            .create_project("New", "Workspace 1", "Client 200")
            .await
            .unwrap();

        assert_eq!(project.id, 32);
    }

    /// クライアントの参照が`NotFound`以外で失敗した場合はクライアントを作成しないことを確認する。
    #[tokio::test]
    async fn test_create_project_client_lookup_error() {
        let api = MockProjectApi::new();
        let workspaces = workspaces();
        let mut clients = MockClientProvider::new();
        clients
            .expect_get_clients()
            .returning(|| Err(anyhow!("connection reset")));
        clients.expect_get_client_by_name().never();
        clients.expect_create_client().never();
        let repository = ProjectRepository::new(&api, &workspaces, &clients);

        assert!(repository
            .create_project("New", "Workspace 1", "Client 200")
            .await
            .is_err());
    }

    /// クライアント一覧の読み込み中の`NotFound`は、クライアントが存在しないことを意味しないことを確認する。
    #[tokio::test]
    async fn test_create_project_client_load_not_found() {
        let mut api = MockProjectApi::new();
        api.expect_create_project().never();
        let workspaces = workspaces();
        let mut clients = MockClientProvider::new();
        clients
            .expect_get_clients()
            .returning(|| Err(TogglError::not_found("workspace", "id 9").into()));
        clients.expect_get_client_by_name().never();
        clients.expect_create_client().never();
        let repository = ProjectRepository::new(&api, &workspaces, &clients);

        let error = repository
            .create_project("New", "Workspace 1", "Client 200")
            .await
            .unwrap_err();

        assert!(TogglError::is_not_found(&error));
    }

    #[tokio::test]
    async fn test_create_project_unknown_workspace() {
        let api = MockProjectApi::new();
        let workspaces = workspaces();
        let clients = MockClientProvider::new();
        let repository = ProjectRepository::new(&api, &workspaces, &clients);

        assert!(repository
            .create_project("New", "Workspace 9", "")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_create_project_invalidates_cache() {
        let mut api = api_with_projects(2);
        api.expect_create_project()
            .times(1)
            .returning(|project| Ok(TogglProject { id: 33, ..project.clone() }));
        let workspaces = workspaces();
        let clients = clients();
        let repository = ProjectRepository::new(&api, &workspaces, &clients);

        repository.get_projects().await.unwrap();
        repository
            .create_project("New", "Workspace 1", "")
            .await
            .unwrap();
        repository.get_projects().await.unwrap();
        repository.get_projects().await.unwrap();
    }
}
