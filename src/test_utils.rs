//! In-memory stand-ins for the external collaborators of a generation run

use crate::{
    catalog::{RawRole, RoleCatalogClient, RolesPage},
    credentials::CredentialSource,
    utf8path, PathBuf, SiteConfig,
};
use std::cell::Cell;
use time::OffsetDateTime;

/// The timestamp every test run is stamped with
pub fn fixed_now() -> OffsetDateTime {
    time::macros::datetime!(2024-01-03 04:05:06 UTC)
}

pub fn role(name: &str, stage: &str, perms: &[&str]) -> RawRole {
    RawRole {
        name: name.to_owned(),
        title: format!("{} Title", crate::dataset::role_id(name)),
        description: format!("Grants {} permissions", perms.len()),
        stage: stage.to_owned(),
        included_permissions: perms.iter().map(|p| (*p).to_owned()).collect(),
        etag: "BwXhqDE5JZM=".to_owned(),
    }
}

/// The two role scenario used throughout the tests
pub fn viewer_and_admin() -> Vec<RawRole> {
    vec![
        role("roles/viewer", "", &["compute.instances.get"]),
        role(
            "roles/admin",
            "GA",
            &["compute.instances.get", "compute.instances.delete"],
        ),
    ]
}

/// Hands out a fixed token, or fails as if the user had never logged in
pub struct FakeCredentials(pub Option<&'static str>);

impl CredentialSource for FakeCredentials {
    fn token(&self) -> anyhow::Result<String> {
        match self.0 {
            Some(tok) => Ok(tok.to_owned()),
            None => anyhow::bail!("not logged in"),
        }
    }
}

/// Serves a fixed list of roles split into pages of `page_size`
pub struct FakeCatalog {
    pub roles: Vec<RawRole>,
    pub page_size: usize,
    /// When set, the request for this (0 based) page fails
    pub fail_on_page: Option<usize>,
    pub requests: Cell<usize>,
}

impl FakeCatalog {
    pub fn new(roles: Vec<RawRole>, page_size: usize) -> Self {
        Self {
            roles,
            page_size,
            fail_on_page: None,
            requests: Cell::new(0),
        }
    }
}

impl RoleCatalogClient for FakeCatalog {
    fn list_roles(&self, token: &str, page_token: Option<&str>) -> anyhow::Result<RolesPage> {
        self.requests.set(self.requests.get() + 1);

        anyhow::ensure!(token == "test-token", "unexpected token '{token}'");

        let page: usize = match page_token {
            Some(pt) => pt.parse()?,
            None => 0,
        };

        if self.fail_on_page == Some(page) {
            anyhow::bail!("connection reset by peer");
        }

        let start = page * self.page_size;
        let end = (start + self.page_size).min(self.roles.len());
        let roles = self.roles.get(start..end).unwrap_or_default().to_vec();

        let next_page_token = (end < self.roles.len()).then(|| (page + 1).to_string());

        Ok(RolesPage {
            roles,
            next_page_token,
        })
    }
}

/// A config that writes beneath `root` and points at a non-routable catalog
pub fn config(root: &std::path::Path) -> SiteConfig {
    let root: PathBuf = utf8path(root.to_owned()).expect("temp dir is not utf-8");
    SiteConfig::new(
        url::Url::parse("https://gcpiam.com").unwrap(),
        url::Url::parse("https://iam.invalid/v1/roles").unwrap(),
        root,
    )
}
