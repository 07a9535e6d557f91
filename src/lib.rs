//! Builds a static, crawlable reference site for cloud IAM roles and the
//! permissions they grant.
//!
//! A generation run is a straight pipeline:
//!
//! 1. obtain a bearer token from a [`credentials::CredentialSource`]
//! 2. page through the role catalog with a [`catalog::RoleCatalogClient`]
//! 3. invert the role → permission relation with [`dataset::build_dataset`]
//! 4. write the JSON dataset, one HTML page per role and per permission, a
//!    sitemap and a landing page, see [`generate::run`]

#![deny(unsafe_code)]
#![warn(clippy::all, rust_2018_idioms)]

pub mod catalog;
pub mod cfg;
pub mod credentials;
pub mod dataset;
pub mod escape;
pub mod generate;
pub mod output;
pub mod render;

#[doc(hidden)]
pub mod test_utils;

pub use camino::{Utf8Path as Path, Utf8PathBuf as PathBuf};
pub use cfg::SiteConfig;
pub use dataset::{Dataset, PermissionRecord, RoleRecord, RoleSummary, Stage};

/// Converts a std path into a utf-8 one, all output paths are utf-8 so they
/// can be logged and interpolated without lossy conversions
#[inline]
pub fn utf8path(pb: std::path::PathBuf) -> anyhow::Result<PathBuf> {
    use anyhow::Context;
    PathBuf::try_from(pb).context("non-utf8 path")
}
