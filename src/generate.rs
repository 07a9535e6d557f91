use crate::{
    catalog::{self, RoleCatalogClient},
    credentials::CredentialSource,
    dataset::{self, Changes},
    output::{self, Layout},
    render, PathBuf, SiteConfig,
};
use anyhow::Context as _;
use serde::Serialize;
use time::OffsetDateTime;

/// Progress is logged every this many permission pages
const PERMISSION_PROGRESS_STEP: usize = 1000;
/// Progress is logged every this many role pages
const ROLE_PROGRESS_STEP: usize = 500;

/// What a generation run produced
#[derive(Debug, Serialize)]
pub struct Summary {
    pub roles: usize,
    pub permissions: usize,
    pub dataset: PathBuf,
    pub minified_dataset: PathBuf,
    pub roles_dir: PathBuf,
    pub permissions_dir: PathBuf,
    pub sitemap: PathBuf,
    pub index: PathBuf,
    pub changes: Changes,
}

/// Runs the whole pipeline, from authentication to the landing page.
///
/// `now` is stamped into the dataset, the sitemap and the landing page, it is
/// a parameter so that two runs over the same catalog can be compared.
///
/// Files are overwritten in place, a failure part way through leaves a mix
/// of fresh and stale files behind. The JSON dataset is only written once
/// the catalog has been fetched completely.
pub fn run(
    cfg: &SiteConfig,
    credentials: &dyn CredentialSource,
    catalog: &dyn RoleCatalogClient,
    now: OffsetDateTime,
) -> anyhow::Result<Summary> {
    let layout = Layout::new(cfg.output_dir.clone());
    layout.create_dirs()?;

    log::info!("authenticating...");
    let token = credentials
        .token()
        .context("unable to obtain an access token")?;

    log::info!("fetching roles from {}...", cfg.catalog_url);
    let roles = catalog::fetch_all_roles(catalog, &token)?;
    log::info!("fetched {} roles", roles.len());

    log::info!("building dataset...");
    let mut dataset = dataset::build_dataset(roles, now)?;
    log::info!(
        "{} roles, {} permissions",
        dataset.metadata.total_roles,
        dataset.metadata.total_permissions
    );

    let dataset_path = layout.dataset_path();
    if let Some(previous) = output::read_previous_dataset(&dataset_path)? {
        let changes = Changes::between(&previous, &dataset);
        if changes.is_empty() {
            log::info!("no changes since the previous run");
        } else {
            log::info!(
                "changes since the previous run: roles +{} -{} ~{}, permissions +{} -{}",
                changes.roles_added.len(),
                changes.roles_removed.len(),
                changes.roles_modified.len(),
                changes.permissions_added.len(),
                changes.permissions_removed.len(),
            );
        }
        dataset.metadata.changes_since_last_run = changes;
    }

    output::write_dataset(&dataset_path, &dataset)?;
    let minified_path = layout.minified_dataset_path();
    output::write_minified_dataset(&minified_path, &dataset)?;
    log::info!("saved dataset to {dataset_path}");

    log::info!("generating permission pages...");
    let total = dataset.permissions.len();
    for (i, perm) in dataset.permissions.iter().enumerate() {
        let page = render::permission_page(&cfg.base_url, perm);
        output::write(&layout.permission_page_path(&perm.name), page)?;

        if (i + 1) % PERMISSION_PROGRESS_STEP == 0 {
            log::info!("  {}/{total} permissions", i + 1);
        }
    }
    log::info!("generated {total} permission pages");

    log::info!("generating role pages...");
    let total = dataset.roles.len();
    for (i, role) in dataset.roles.iter().enumerate() {
        let page = render::role_page(&cfg.base_url, role);
        output::write(&layout.role_page_path(&role.name), page)?;

        if (i + 1) % ROLE_PROGRESS_STEP == 0 {
            log::info!("  {}/{total} roles", i + 1);
        }
    }
    log::info!("generated {total} role pages");

    let sitemap_path = layout.sitemap_path();
    let sitemap = render::generate_sitemap(
        &cfg.base_url,
        &dataset.roles,
        &dataset.permissions,
        now.to_offset(time::UtcOffset::UTC).date(),
    );
    output::write(&sitemap_path, sitemap)?;
    log::info!("saved sitemap to {sitemap_path}");

    let index_path = layout.index_path();
    output::write(
        &index_path,
        render::index_page(&cfg.base_url, &dataset.metadata),
    )?;
    log::info!("saved landing page to {index_path}");

    Ok(Summary {
        roles: dataset.roles.len(),
        permissions: dataset.permissions.len(),
        dataset: dataset_path,
        minified_dataset: minified_path,
        roles_dir: layout.roles_dir,
        permissions_dir: layout.permissions_dir,
        sitemap: sitemap_path,
        index: index_path,
        changes: dataset.metadata.changes_since_last_run,
    })
}
