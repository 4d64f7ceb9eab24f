use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct RepoItem {
    pub(crate) name: String,
    pub(crate) ssh_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn repo_item_ignores_unknown_fields() {
        let value = json!({
            "id": 1,
            "name": "repo",
            "full_name": "me/repo",
            "ssh_url": "git@github.com:me/repo.git",
            "clone_url": "https://github.com/me/repo.git",
            "owner": { "login": "me" }
        });
        let item: RepoItem = serde_json::from_value(value).unwrap();
        assert_eq!(item.name, "repo");
        assert_eq!(item.ssh_url, "git@github.com:me/repo.git");
    }
}
