use crate::auth::TokenLookup;
use crate::gitlab_models::ProjectItem;
use crate::http::{ApiClient, TokenStyle, next_page_from_header};
use anyhow::Context;
use gugo_core::model::{AccountConfig, SourceKind};
use gugo_core::source::{RepoSource, SourceFuture};
use tokio::sync::OnceCell;
use tracing::debug;

pub const TOKEN_VAR: &str = "GITLAB_TOKEN";
pub const DEFAULT_API_URL: &str = "https://gitlab.com/api/v4";
const PER_PAGE: u32 = 100;

/// Projects owned by a single GitLab user. Repo names are full
/// `namespace/path` strings.
#[derive(Debug)]
pub struct GitLabAccount {
    account: String,
    api_url: String,
    tokens: TokenLookup,
    client: OnceCell<ApiClient>,
}

impl GitLabAccount {
    pub fn new(config: &AccountConfig) -> Self {
        Self::with_tokens(config, TokenLookup::env())
    }

    pub fn with_tokens(config: &AccountConfig, tokens: TokenLookup) -> Self {
        Self {
            account: config.account.trim().to_string(),
            api_url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            tokens,
            client: OnceCell::new(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn client(&self) -> anyhow::Result<&ApiClient> {
        self.client
            .get()
            .context("gitlab source not initialised")
    }

    async fn connect(&self) -> anyhow::Result<ApiClient> {
        if self.account.is_empty() {
            anyhow::bail!("gitlab account is empty");
        }
        let token = self.tokens.require(TOKEN_VAR)?;
        let client = ApiClient::new(&self.api_url, token, TokenStyle::PrivateToken)?;
        debug!(account = %self.account, api = %self.api_url, "gitlab source ready");
        Ok(client)
    }

    async fn fetch_names(&self) -> anyhow::Result<Vec<String>> {
        let client = self.client()?;
        let url = client.endpoint(&["users", &self.account, "projects"])?;
        let mut names = Vec::new();
        let mut page = 1;
        loop {
            let query = [("per_page", PER_PAGE.to_string()), ("page", page.to_string())];
            let response = client
                .get(url.clone(), &query)
                .await
                .with_context(|| format!("listing projects for {}", self.account))?;
            let next = next_page_from_header(response.headers(), "x-next-page");
            let items: Vec<ProjectItem> =
                response.json().await.context("decoding project list")?;
            names.extend(items.into_iter().map(|item| item.path_with_namespace));
            match next {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }
        Ok(names)
    }

    async fn fetch_ssh_url(&self, name: &str) -> anyhow::Result<String> {
        let client = self.client()?;
        // The whole namespaced path is one segment; `/` is sent as %2F.
        let url = client.endpoint(&["projects", name])?;
        let response = client
            .get(url, &[])
            .await
            .with_context(|| format!("getting project {name}"))?;
        let item: ProjectItem = response.json().await.context("decoding project")?;
        if item.ssh_url_to_repo.is_empty() {
            anyhow::bail!("project {name} has no ssh url");
        }
        Ok(item.ssh_url_to_repo)
    }
}

impl RepoSource for GitLabAccount {
    fn kind(&self) -> SourceKind {
        SourceKind::GitLab
    }

    fn account(&self) -> &str {
        &self.account
    }

    fn ensure_ready(&self) -> SourceFuture<'_, ()> {
        Box::pin(async move {
            self.client.get_or_try_init(|| self.connect()).await?;
            Ok(())
        })
    }

    fn list_repos(&self) -> SourceFuture<'_, Vec<String>> {
        Box::pin(self.fetch_names())
    }

    fn get_repo<'a>(&'a self, name: &'a str) -> SourceFuture<'a, String> {
        Box::pin(self.fetch_ssh_url(name))
    }
}
