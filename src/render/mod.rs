//! Rendering of the generated documents. Every function in here is pure, the
//! same records and timestamp always produce the same bytes.

pub mod page;
pub mod sitemap;

pub use page::{index_page, permission_page, role_page, stage_badge};
pub use sitemap::generate_sitemap;

use crate::{
    dataset::{permission_slug, role_slug},
    escape,
};

/// Site-relative path of a role's page, eg. `/roles/compute.admin`. The
/// segment is the same slug the page's file is named after.
pub fn role_path(role_name: &str) -> String {
    format!("/roles/{}", escape::path_segment(&role_slug(role_name)))
}

/// Site-relative path of a permission's page
pub fn permission_path(permission: &str) -> String {
    format!(
        "/permissions/{}",
        escape::path_segment(&permission_slug(permission))
    )
}

/// Formats a count with `,` thousands separators
pub(crate) fn thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }

    out
}
