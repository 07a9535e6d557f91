use crate::PathBuf;
use std::time::Duration;
use url::Url;

/// The public root of the generated site, used for canonical links and the
/// sitemap
pub const DEFAULT_BASE_URL: &str = "https://gcpiam.com";
/// The role listing endpoint of the IAM API
pub const DEFAULT_CATALOG_URL: &str = "https://iam.googleapis.com/v1/roles";
/// The largest page the catalog will hand out
pub const DEFAULT_PAGE_SIZE: u32 = 1000;
/// The label recorded in the dataset metadata
pub const SOURCE_LABEL: &str = "Google Cloud IAM API";

/// Everything a generation run needs to know about where to read from and
/// where to write to.
///
/// The library never reads the environment itself, the binary (or a test)
/// builds one of these and hands it to [`crate::generate::run`]
#[derive(Clone, Debug)]
pub struct SiteConfig {
    /// Public root of the site, eg. `https://gcpiam.com`
    pub base_url: Url,
    /// The role catalog endpoint that is paged through
    pub catalog_url: Url,
    /// The directory all output is written beneath
    pub output_dir: PathBuf,
    /// Number of roles requested per catalog page
    pub page_size: u32,
    /// Upper bound for each catalog request
    pub http_timeout: Duration,
}

impl SiteConfig {
    /// Creates a config with the default catalog settings
    pub fn new(base_url: Url, catalog_url: Url, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url,
            catalog_url,
            output_dir: output_dir.into(),
            page_size: DEFAULT_PAGE_SIZE,
            http_timeout: Duration::from_secs(30),
        }
    }

    /// Creates a config pointing at the public site and the real IAM API
    pub fn with_defaults(output_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        use anyhow::Context as _;

        let base_url = Url::parse(DEFAULT_BASE_URL).context("invalid default base url")?;
        let catalog_url =
            Url::parse(DEFAULT_CATALOG_URL).context("invalid default catalog url")?;

        Ok(Self::new(base_url, catalog_url, output_dir))
    }

    /// Joins a site-relative path (which must start with `/`) onto the base
    /// url, without doubling the separator
    pub fn absolute(&self, path: &str) -> String {
        absolute_url(&self.base_url, path)
    }
}

/// Joins a site-relative path onto `base`.
///
/// [`Url`] always serializes a bare host with a trailing `/`, so that is
/// trimmed before appending
pub fn absolute_url(base: &Url, path: &str) -> String {
    format!("{}{path}", base.as_str().trim_end_matches('/'))
}
