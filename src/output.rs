use crate::{
    dataset::{permission_slug, role_slug},
    Dataset, Path, PathBuf,
};
use anyhow::Context as _;

/// Where every generated file lives beneath the output root
///
/// ```text
/// <root>/iam-data.json
/// <root>/iam-data.min.json
/// <root>/static/index.html
/// <root>/static/sitemap.xml
/// <root>/static/roles/<role-id>.html
/// <root>/static/permissions/<permission>.html
/// ```
#[derive(Clone, Debug)]
pub struct Layout {
    pub root: PathBuf,
    pub static_dir: PathBuf,
    pub roles_dir: PathBuf,
    pub permissions_dir: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let static_dir = root.join("static");

        Self {
            roles_dir: static_dir.join("roles"),
            permissions_dir: static_dir.join("permissions"),
            static_dir,
            root,
        }
    }

    /// Creates every output directory, existing ones are left untouched
    pub fn create_dirs(&self) -> anyhow::Result<()> {
        for dir in [
            &self.root,
            &self.static_dir,
            &self.roles_dir,
            &self.permissions_dir,
        ] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory '{dir}'"))?;
        }

        Ok(())
    }

    #[inline]
    pub fn dataset_path(&self) -> PathBuf {
        self.root.join("iam-data.json")
    }

    #[inline]
    pub fn minified_dataset_path(&self) -> PathBuf {
        self.root.join("iam-data.min.json")
    }

    #[inline]
    pub fn sitemap_path(&self) -> PathBuf {
        self.static_dir.join("sitemap.xml")
    }

    #[inline]
    pub fn index_path(&self) -> PathBuf {
        self.static_dir.join("index.html")
    }

    #[inline]
    pub fn role_page_path(&self, role_name: &str) -> PathBuf {
        self.roles_dir.join(role_file_name(role_name))
    }

    #[inline]
    pub fn permission_page_path(&self, permission: &str) -> PathBuf {
        self.permissions_dir.join(permission_file_name(permission))
    }
}

/// `roles/compute.admin` -> `compute.admin.html`, any `/` left after the
/// prefix is stripped becomes `_`
pub fn role_file_name(role_name: &str) -> String {
    format!("{}.html", role_slug(role_name))
}

/// `compute.instances.get` -> `compute.instances.get.html`, with `/`
/// replaced by `_`
pub fn permission_file_name(permission: &str) -> String {
    format!("{}.html", permission_slug(permission))
}

/// Writes a file, replacing whatever was there before
pub fn write(path: &Path, contents: impl AsRef<[u8]>) -> anyhow::Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write '{path}'"))?;
    log::trace!("wrote {path}");
    Ok(())
}

/// Writes the dataset, pretty-printed with a 2 space indent
pub fn write_dataset(path: &Path, dataset: &Dataset) -> anyhow::Result<()> {
    let json = serde_json::to_vec_pretty(dataset).context("failed to serialize dataset")?;
    write(path, json)
}

/// Writes the dataset without any whitespace
pub fn write_minified_dataset(path: &Path, dataset: &Dataset) -> anyhow::Result<()> {
    let json = serde_json::to_vec(dataset).context("failed to serialize dataset")?;
    write(path, json)
}

/// Reads the dataset written by a previous run.
///
/// Returns `None` if there is no previous dataset, or if it can't be
/// understood, eg. because it was written by an incompatible version
pub fn read_previous_dataset(path: &Path) -> anyhow::Result<Option<Dataset>> {
    let contents = match std::fs::read(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read previous dataset '{path}'"))
        }
    };

    match serde_json::from_slice(&contents) {
        Ok(dataset) => Ok(Some(dataset)),
        Err(err) => {
            log::warn!("ignoring previous dataset '{path}', it could not be decoded: {err}");
            Ok(None)
        }
    }
}
