use crate::catalog::RawRole;
use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use time::OffsetDateTime;

/// The stage recorded for roles that don't state one
pub const DEFAULT_STAGE: &str = "GA";

/// The lifecycle stage of a role.
///
/// Stages are kept verbatim as strings in the dataset, this is only the
/// lenient interpretation of one used for display
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Stage {
    #[default]
    Ga,
    Beta,
    Alpha,
    Deprecated,
}

impl Stage {
    /// Interprets a stage label case-insensitively, anything unrecognized is
    /// treated as [`Stage::Ga`]
    pub fn from_label(label: &str) -> Self {
        label.parse().unwrap_or_default()
    }

    /// The lowercase name, eg. `beta`
    #[inline]
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// A role as published in the dataset
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    /// `roles/<id>`, unique within a dataset
    pub name: String,
    pub title: String,
    pub description: String,
    pub stage: String,
    pub included_permissions: Vec<String>,
    pub etag: String,
    #[serde(default)]
    pub permission_count: usize,
    /// Search terms drawn from the title and description, sorted
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl RoleRecord {
    /// The role name without the `roles/` prefix
    #[inline]
    pub fn id(&self) -> &str {
        role_id(&self.name)
    }
}

/// The part of a role that is attached to each permission it grants
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSummary {
    pub name: String,
    pub title: String,
    pub stage: String,
}

/// A permission and every role that grants it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    /// `service.resource.action`
    pub name: String,
    pub service: String,
    pub resource: String,
    pub action: String,
    /// Roles in the order they were encountered in the catalog
    pub granted_by_roles: Vec<RoleSummary>,
}

/// What changed compared to the previously generated dataset
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changes {
    pub roles_added: Vec<String>,
    pub roles_removed: Vec<String>,
    pub roles_modified: Vec<String>,
    pub permissions_added: Vec<String>,
    pub permissions_removed: Vec<String>,
}

impl Changes {
    /// Diffs two datasets by role and permission name. A role counts as
    /// modified if its etag or its permission list differs.
    pub fn between(previous: &Dataset, current: &Dataset) -> Self {
        let prev_roles: BTreeMap<_, _> = previous
            .roles
            .iter()
            .map(|r| (r.name.as_str(), r))
            .collect();
        let cur_roles: BTreeMap<_, _> = current
            .roles
            .iter()
            .map(|r| (r.name.as_str(), r))
            .collect();

        let mut changes = Self::default();

        for (name, role) in &cur_roles {
            match prev_roles.get(name) {
                None => changes.roles_added.push((*name).to_owned()),
                Some(prev) => {
                    if prev.etag != role.etag
                        || prev.included_permissions != role.included_permissions
                    {
                        changes.roles_modified.push((*name).to_owned());
                    }
                }
            }
        }

        changes.roles_removed = prev_roles
            .keys()
            .filter(|name| !cur_roles.contains_key(*name))
            .map(|name| (*name).to_owned())
            .collect();

        let prev_perms: BTreeSet<_> = previous.permissions.iter().map(|p| &p.name).collect();
        let cur_perms: BTreeSet<_> = current.permissions.iter().map(|p| &p.name).collect();

        changes.permissions_added = cur_perms
            .difference(&prev_perms)
            .map(|p| (*p).clone())
            .collect();
        changes.permissions_removed = prev_perms
            .difference(&cur_perms)
            .map(|p| (*p).clone())
            .collect();

        changes
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn total(&self) -> usize {
        self.roles_added.len()
            + self.roles_removed.len()
            + self.roles_modified.len()
            + self.permissions_added.len()
            + self.permissions_removed.len()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub total_roles: usize,
    pub total_permissions: usize,
    /// RFC 3339, UTC
    pub last_updated: String,
    pub source: String,
    #[serde(default)]
    pub changes_since_last_run: Changes,
}

impl Metadata {
    /// The date portion of [`Self::last_updated`]
    pub fn last_updated_date(&self) -> &str {
        self.last_updated.get(..10).unwrap_or(&self.last_updated)
    }
}

/// Secondary lookups for consumers of the JSON dataset
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Indexes {
    /// Role name -> position in [`Dataset::roles`]
    pub roles_by_name: BTreeMap<String, usize>,
    /// Permission name -> position in [`Dataset::permissions`]
    pub permissions_by_name: BTreeMap<String, usize>,
    /// Stage label -> role names, in catalog order
    pub roles_by_stage: BTreeMap<String, Vec<String>>,
    /// Service -> permission names, sorted
    pub permissions_by_service: BTreeMap<String, Vec<String>>,
}

/// The complete output of one generation run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub roles: Vec<RoleRecord>,
    /// Sorted by name
    pub permissions: Vec<PermissionRecord>,
    pub metadata: Metadata,
    #[serde(default)]
    pub indexes: Indexes,
}

/// Strips the `roles/` prefix from a role name, names without it are
/// returned as is
#[inline]
pub fn role_id(name: &str) -> &str {
    name.strip_prefix("roles/").unwrap_or(name)
}

/// The name a role's page is published under, `roles/a/b` -> `a_b`
pub fn role_slug(name: &str) -> String {
    role_id(name).replace('/', "_")
}

/// The name a permission's page is published under, any `/` becomes `_`
pub fn permission_slug(name: &str) -> String {
    name.replace('/', "_")
}

/// Words that never make useful search terms
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "you", "all", "not", "but", "can", "her", "was", "one", "our", "out",
    "day", "get", "has", "him", "his", "how", "its", "may", "new", "now", "old", "see", "way",
    "who", "boy", "did", "with", "from", "that", "this",
];

/// Extracts the search keywords of a role: the lowercased alphanumeric
/// words of its title and description that are longer than 3 bytes and
/// aren't stop words, deduplicated and sorted
pub fn extract_keywords(title: &str, description: &str) -> Vec<String> {
    let mut keywords = BTreeSet::new();

    for word in title.split_whitespace().chain(description.split_whitespace()) {
        let clean: String = word
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();

        if clean.len() > 3 && !STOP_WORDS.contains(&clean.as_str()) {
            keywords.insert(clean);
        }
    }

    keywords.into_iter().collect()
}

/// Splits `service.resource.action` into its parts. Missing parts are empty,
/// segments past the third are ignored.
pub fn split_permission(name: &str) -> (&str, &str, &str) {
    let mut parts = name.split('.');
    let service = parts.next().unwrap_or_default();
    let resource = parts.next().unwrap_or_default();
    let action = parts.next().unwrap_or_default();
    (service, resource, action)
}

/// Formats a timestamp the way it is recorded in the dataset
pub fn format_timestamp(ts: OffsetDateTime) -> anyhow::Result<String> {
    ts.to_offset(time::UtcOffset::UTC)
        .format(&time::format_description::well_known::Rfc3339)
        .context("failed to format timestamp")
}

/// Builds the dataset from the roles fetched from the catalog.
///
/// Permissions are discovered solely by scanning role grants, so the set of
/// permissions is exactly the union of every role's permissions, and each
/// permission has at least one granting role.
pub fn build_dataset(
    roles: Vec<RawRole>,
    generated_at: OffsetDateTime,
) -> anyhow::Result<Dataset> {
    let roles: Vec<RoleRecord> = roles
        .into_iter()
        .map(|raw| RoleRecord {
            permission_count: raw.included_permissions.len(),
            keywords: extract_keywords(&raw.title, &raw.description),
            stage: if raw.stage.is_empty() {
                DEFAULT_STAGE.to_owned()
            } else {
                raw.stage
            },
            name: raw.name,
            title: raw.title,
            description: raw.description,
            included_permissions: raw.included_permissions,
            etag: raw.etag,
        })
        .collect();

    // permission -> grantors, the map's key order is the sorted permission set
    let mut grantors = BTreeMap::<&str, Vec<RoleSummary>>::new();
    let mut indexes = Indexes::default();

    for (i, role) in roles.iter().enumerate() {
        // A repeated role name points at its last occurrence
        indexes.roles_by_name.insert(role.name.clone(), i);
        indexes
            .roles_by_stage
            .entry(role.stage.clone())
            .or_default()
            .push(role.name.clone());

        for perm in &role.included_permissions {
            let granted_by = grantors.entry(perm.as_str()).or_default();

            // A role listing the same permission twice is still one grant
            if granted_by.last().is_some_and(|last| last.name == role.name) {
                continue;
            }

            granted_by.push(RoleSummary {
                name: role.name.clone(),
                title: role.title.clone(),
                stage: role.stage.clone(),
            });
        }
    }

    let permissions: Vec<_> = grantors
        .into_iter()
        .enumerate()
        .map(|(i, (name, granted_by_roles))| {
            let (service, resource, action) = split_permission(name);

            indexes.permissions_by_name.insert(name.to_owned(), i);

            indexes
                .permissions_by_service
                .entry(service.to_owned())
                .or_default()
                .push(name.to_owned());

            PermissionRecord {
                name: name.to_owned(),
                service: service.to_owned(),
                resource: resource.to_owned(),
                action: action.to_owned(),
                granted_by_roles,
            }
        })
        .collect();

    log::debug!(
        "indexed {} permissions across {} services",
        permissions.len(),
        indexes.permissions_by_service.len()
    );

    let metadata = Metadata {
        total_roles: roles.len(),
        total_permissions: permissions.len(),
        last_updated: format_timestamp(generated_at)?,
        source: crate::cfg::SOURCE_LABEL.to_owned(),
        changes_since_last_run: Changes::default(),
    };

    Ok(Dataset {
        roles,
        permissions,
        metadata,
        indexes,
    })
}
