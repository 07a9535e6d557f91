use super::{permission_path, role_path};
use crate::{
    cfg::absolute_url,
    dataset::{PermissionRecord, RoleRecord},
    escape::html,
};
use std::fmt::Write;
use time::Date;
use url::Url;

/// How often a crawler is told to revisit a page
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
enum ChangeFreq {
    Daily,
    Weekly,
}

fn push_url(xml: &mut String, loc: &str, lastmod: &str, freq: ChangeFreq, priority: &str) {
    let freq: &'static str = freq.into();

    write!(
        xml,
        "    <url>
        <loc>{loc}</loc>
        <lastmod>{lastmod}</lastmod>
        <changefreq>{freq}</changefreq>
        <priority>{priority}</priority>
    </url>
",
        loc = html(loc),
    )
    .unwrap();
}

/// Renders `sitemap.xml`: the landing page, then every role, then every
/// permission, in the order given
pub fn generate_sitemap(
    base_url: &Url,
    roles: &[RoleRecord],
    permissions: &[PermissionRecord],
    lastmod: Date,
) -> String {
    let lastmod = format!(
        "{:04}-{:02}-{:02}",
        lastmod.year(),
        u8::from(lastmod.month()),
        lastmod.day()
    );

    // Each entry is roughly 200 bytes
    let mut xml = String::with_capacity((1 + roles.len() + permissions.len()) * 200);

    xml.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
"#,
    );

    push_url(
        &mut xml,
        &absolute_url(base_url, "/"),
        &lastmod,
        ChangeFreq::Daily,
        "1.0",
    );

    for role in roles {
        push_url(
            &mut xml,
            &absolute_url(base_url, &role_path(&role.name)),
            &lastmod,
            ChangeFreq::Weekly,
            "0.8",
        );
    }

    for perm in permissions {
        push_url(
            &mut xml,
            &absolute_url(base_url, &permission_path(&perm.name)),
            &lastmod,
            ChangeFreq::Weekly,
            "0.7",
        );
    }

    xml.push_str("</urlset>\n");
    xml
}
