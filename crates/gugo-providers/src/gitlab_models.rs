use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct ProjectItem {
    pub(crate) path_with_namespace: String,
    pub(crate) ssh_url_to_repo: String,
}
