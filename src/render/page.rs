use super::{permission_path, role_path, thousands};
use crate::{
    cfg::absolute_url,
    dataset::{Metadata, PermissionRecord, RoleRecord, Stage, DEFAULT_STAGE},
    escape::html,
};
use std::fmt::Write;
use url::Url;

/// Meta descriptions of role pages are cut off after this many characters
const DESCRIPTION_LIMIT: usize = 150;

const STYLESHEET: &str = r#"    <style>
        :root {
            --bg-primary: #ffffff;
            --bg-secondary: #f5f5f5;
            --text-primary: #1a1a1a;
            --text-secondary: #666666;
            --border-color: #e0e0e0;
            --accent: #1a73e8;
        }
        @media (prefers-color-scheme: dark) {
            :root {
                --bg-primary: #1a1a1a;
                --bg-secondary: #2d2d2d;
                --text-primary: #e0e0e0;
                --text-secondary: #b0b0b0;
                --border-color: #404040;
                --accent: #8ab4f8;
            }
        }
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: var(--bg-primary);
            color: var(--text-primary);
            line-height: 1.6;
            padding: 2rem;
            max-width: 1000px;
            margin: 0 auto;
        }
        h1 { color: var(--accent); margin-bottom: 0.5rem; word-break: break-word; }
        h2 { margin-top: 2rem; margin-bottom: 1rem; border-bottom: 2px solid var(--border-color); padding-bottom: 0.5rem; }
        .subtitle { color: var(--text-secondary); margin-bottom: 1rem; }
        .description { background: var(--bg-secondary); padding: 1rem; border-radius: 8px; margin-bottom: 1.5rem; }
        .badge { display: inline-block; padding: 2px 8px; border-radius: 4px; font-size: 0.85rem; margin-right: 0.5rem; }
        .badge-ga { background: #e8f5e9; color: #2e7d32; }
        .badge-beta { background: #fff3e0; color: #e65100; }
        .badge-alpha { background: #e3f2fd; color: #1565c0; }
        .badge-deprecated { background: #ffebee; color: #c62828; }
        .list { list-style: none; }
        .list li { padding: 0.75rem 1rem; border-bottom: 1px solid var(--border-color); }
        .list li:hover { background: var(--bg-secondary); }
        .list a { color: var(--accent); text-decoration: none; }
        .list a:hover { text-decoration: underline; }
        .role-title { color: var(--text-secondary); font-size: 0.9rem; }
        .count { color: var(--text-secondary); font-size: 0.9rem; }
        .empty { color: var(--text-secondary); }
        .back-link { display: inline-block; margin-bottom: 1rem; color: var(--accent); text-decoration: none; }
        .back-link:hover { text-decoration: underline; }
        @media (prefers-color-scheme: dark) {
            .badge-ga { background: #1b3d20; color: #81c784; }
            .badge-beta { background: #3d2f1f; color: #ffb74d; }
            .badge-alpha { background: #1e3a5f; color: #90caf9; }
            .badge-deprecated { background: #3d1f1f; color: #ef9a9a; }
        }
    </style>
"#;

const FOOTER: &str = r#"
    <footer style="margin-top: 3rem; padding-top: 1rem; border-top: 1px solid var(--border-color); color: var(--text-secondary); font-size: 0.85rem;">
        <p>Data sourced from <a href="https://cloud.google.com/iam/docs/understanding-roles" style="color: var(--accent);">Google Cloud IAM API</a>.
        Updated daily.</p>
    </footer>
</body>
</html>
"#;

/// Everything up to and including the opening of `<body>` and the link back
/// to the search page
fn head(base_url: &Url, title: &str, description: &str, canonical_path: &str) -> String {
    let title = html(title);
    let description = html(description);
    let canonical = absolute_url(base_url, canonical_path);
    let canonical = html(&canonical);

    let mut doc = String::with_capacity(STYLESHEET.len() + 1024);

    write!(
        doc,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title} | GCP IAM Reference</title>
    <meta name="description" content="{description}">
    <link rel="canonical" href="{canonical}">
    <meta property="og:title" content="{title}">
    <meta property="og:description" content="{description}">
    <meta property="og:url" content="{canonical}">
    <meta property="og:type" content="website">
"#
    )
    .unwrap();

    doc.push_str(STYLESHEET);
    doc.push_str(
        r#"</head>
<body>
    <a href="/" class="back-link">&larr; Back to Search</a>
"#,
    );

    doc
}

/// Renders the badge for a stage label. Unrecognized labels are styled as GA
/// but still display their own text, an empty label displays as `GA`.
pub fn stage_badge(stage: &str) -> String {
    let class = Stage::from_label(stage).as_str();
    let label = if stage.is_empty() { DEFAULT_STAGE } else { stage };

    format!(r#"<span class="badge badge-{class}">{}</span>"#, html(label))
}

/// Renders the page of a single permission, listing every role granting it
pub fn permission_page(base_url: &Url, perm: &PermissionRecord) -> String {
    let roles = &perm.granted_by_roles;

    let description = format!(
        "GCP IAM permission {} - granted by {} roles. Service: {}, Resource: {}, Action: {}.",
        perm.name,
        roles.len(),
        perm.service,
        perm.resource,
        perm.action
    );

    let mut doc = head(
        base_url,
        &perm.name,
        &description,
        &permission_path(&perm.name),
    );

    write!(
        doc,
        r#"
    <h1>{name}</h1>
    <p class="subtitle">GCP IAM Permission</p>

    <div class="description">
        <p><strong>Service:</strong> {service}</p>
        <p><strong>Resource:</strong> {resource}</p>
        <p><strong>Action:</strong> {action}</p>
    </div>

    <h2>Roles that grant this permission <span class="count">({count})</span></h2>
"#,
        name = html(&perm.name),
        service = html(&perm.service),
        resource = html(&perm.resource),
        action = html(&perm.action),
        count = roles.len(),
    )
    .unwrap();

    if roles.is_empty() {
        doc.push_str(
            "    <p class=\"empty\">No predefined roles grant this permission directly.</p>\n",
        );
    } else {
        let mut sorted: Vec<_> = roles.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));

        doc.push_str("    <ul class=\"list\">\n");
        for role in sorted {
            write!(
                doc,
                r#"        <li>
            <a href="{href}">{name}</a>
            {badge}
            <span class="role-title">{title}</span>
        </li>
"#,
                href = html(&role_path(&role.name)),
                name = html(&role.name),
                badge = stage_badge(&role.stage),
                title = html(&role.title),
            )
            .unwrap();
        }
        doc.push_str("    </ul>\n");
    }

    doc.push_str(FOOTER);
    doc
}

/// The meta description of a role, its title followed by its description,
/// truncated
fn role_meta_description(role: &RoleRecord) -> String {
    let mut chars = role.description.char_indices();

    match chars.nth(DESCRIPTION_LIMIT) {
        Some((cut, _)) => format!("{} - {}...", role.title, &role.description[..cut]),
        None => format!("{} - {}", role.title, role.description),
    }
}

/// Renders the page of a single role, listing every permission it includes
pub fn role_page(base_url: &Url, role: &RoleRecord) -> String {
    let mut doc = head(
        base_url,
        &format!("{} ({})", role.title, role.name),
        &role_meta_description(role),
        &role_path(&role.name),
    );

    let perms = &role.included_permissions;

    write!(
        doc,
        r#"
    <h1>{name}</h1>
    <p class="subtitle">{title} {badge}</p>

    <div class="description">
        <p>{description}</p>
    </div>

    <h2>Included Permissions <span class="count">({count})</span></h2>
"#,
        name = html(&role.name),
        title = html(&role.title),
        badge = stage_badge(&role.stage),
        description = html(&role.description),
        count = perms.len(),
    )
    .unwrap();

    if perms.is_empty() {
        doc.push_str("    <p class=\"empty\">This role has no permissions.</p>\n");
    } else {
        let mut sorted: Vec<_> = perms.iter().collect();
        sorted.sort();

        doc.push_str("    <ul class=\"list\">\n");
        for perm in sorted {
            writeln!(
                doc,
                r#"        <li><a href="{}">{}</a></li>"#,
                html(&permission_path(perm)),
                html(perm),
            )
            .unwrap();
        }
        doc.push_str("    </ul>\n");
    }

    doc.push_str(FOOTER);
    doc
}

/// Renders the landing page, which hosts the client side search app
pub fn index_page(base_url: &Url, metadata: &Metadata) -> String {
    // The meta description carries the plain counts, only the body groups digits
    let mut doc = head(
        base_url,
        "GCP IAM Permissions & Roles Search",
        &format!(
            "Search {} GCP IAM permissions across {} roles. Find which roles grant specific permissions.",
            metadata.total_permissions, metadata.total_roles,
        ),
        "/",
    );

    let permissions = thousands(metadata.total_permissions);
    let roles = thousands(metadata.total_roles);

    write!(
        doc,
        r#"
    <h1>GCP IAM Search</h1>
    <p class="subtitle">Search Google Cloud IAM roles and permissions</p>

    <div class="description">
        <p><strong>{permissions}</strong> permissions across <strong>{roles}</strong> predefined roles</p>
        <p>Last updated: {updated}</p>
    </div>

    <div id="app">
        <noscript>
            <p>Enable JavaScript for interactive search, or browse:</p>
            <ul>
                <li><a href="/roles/">Browse all roles</a></li>
                <li><a href="/permissions/">Browse all permissions</a></li>
            </ul>
        </noscript>
    </div>

    <script src="/app.js" type="module"></script>
"#,
        updated = html(metadata.last_updated_date()),
    )
    .unwrap();

    doc.push_str(FOOTER);
    doc
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dataset::{Changes, RoleSummary};

    fn base() -> Url {
        Url::parse("https://gcpiam.com").unwrap()
    }

    fn summary(name: &str, stage: &str) -> RoleSummary {
        RoleSummary {
            name: name.to_owned(),
            title: format!("{name} title"),
            stage: stage.to_owned(),
        }
    }

    #[test]
    fn badges() {
        assert_eq!(
            stage_badge("BETA"),
            r#"<span class="badge badge-beta">BETA</span>"#
        );
        assert_eq!(
            stage_badge("deprecated"),
            r#"<span class="badge badge-deprecated">deprecated</span>"#
        );
        assert_eq!(stage_badge(""), r#"<span class="badge badge-ga">GA</span>"#);
        assert_eq!(
            stage_badge("<EAP>"),
            r#"<span class="badge badge-ga">&lt;EAP&gt;</span>"#
        );
    }

    #[test]
    fn permission_roles_are_sorted() {
        let perm = PermissionRecord {
            name: "compute.instances.get".to_owned(),
            service: "compute".to_owned(),
            resource: "instances".to_owned(),
            action: "get".to_owned(),
            granted_by_roles: vec![summary("roles/viewer", "GA"), summary("roles/admin", "BETA")],
        };

        let doc = permission_page(&base(), &perm);

        let admin = doc.find(r#"<a href="/roles/admin">"#).unwrap();
        let viewer = doc.find(r#"<a href="/roles/viewer">"#).unwrap();
        assert!(admin < viewer);

        assert!(doc.contains("<title>compute.instances.get | GCP IAM Reference</title>"));
        assert!(doc.contains(
            r#"<link rel="canonical" href="https://gcpiam.com/permissions/compute.instances.get">"#
        ));
        assert!(doc.contains("granted by 2 roles. Service: compute, Resource: instances, Action: get."));
        assert!(doc.contains(r#"<span class="count">(2)</span>"#));
        assert!(doc.contains("badge-beta"));
        assert!(doc.contains(r#"<a href="/" class="back-link">"#));
        assert!(doc.trim_end().ends_with("</html>"));
    }

    #[test]
    fn permission_without_grantors() {
        let perm = PermissionRecord {
            name: "iam".to_owned(),
            service: "iam".to_owned(),
            resource: String::new(),
            action: String::new(),
            granted_by_roles: Vec::new(),
        };

        let doc = permission_page(&base(), &perm);
        assert!(doc.contains("No predefined roles grant this permission directly."));
        assert!(!doc.contains("<ul class=\"list\">"));
    }

    #[test]
    fn role_page_escapes_everything() {
        let role = RoleRecord {
            name: "roles/evil".to_owned(),
            title: "<script>alert(1)</script>".to_owned(),
            description: r#"Says "hi" & leaves"#.to_owned(),
            stage: "ALPHA".to_owned(),
            included_permissions: vec!["z.y.x".to_owned(), "a.b.<c>".to_owned()],
            ..Default::default()
        };

        let doc = role_page(&base(), &role);

        assert!(!doc.contains("<script>"));
        assert!(doc.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(doc.contains("Says &quot;hi&quot; &amp; leaves"));
        assert!(doc.contains(r#"<a href="/permissions/a.b.%3Cc%3E">a.b.&lt;c&gt;</a>"#));

        let first = doc.find("/permissions/a.b.").unwrap();
        let second = doc.find("/permissions/z.y.x").unwrap();
        assert!(first < second);
        assert!(doc.contains("badge-alpha"));
    }

    #[test]
    fn role_meta_description_truncates() {
        let mut role = RoleRecord {
            name: "roles/long".to_owned(),
            title: "Long".to_owned(),
            description: "é".repeat(200),
            ..Default::default()
        };

        let desc = role_meta_description(&role);
        assert_eq!(desc, format!("Long - {}...", "é".repeat(150)));

        role.description = "x".repeat(150);
        assert_eq!(role_meta_description(&role), format!("Long - {}", "x".repeat(150)));
    }

    #[test]
    fn role_without_permissions() {
        let role = RoleRecord {
            name: "roles/nothing".to_owned(),
            title: "Nothing".to_owned(),
            stage: "GA".to_owned(),
            ..Default::default()
        };

        let doc = role_page(&base(), &role);
        assert!(doc.contains("This role has no permissions."));
        assert!(doc.contains("<title>Nothing (roles/nothing) | GCP IAM Reference</title>"));
        assert!(doc.contains(r#"href="https://gcpiam.com/roles/nothing""#));
    }

    #[test]
    fn index_page_stats() {
        let metadata = Metadata {
            total_roles: 1_503,
            total_permissions: 12_087,
            last_updated: "2024-01-03T04:05:06Z".to_owned(),
            source: "Google Cloud IAM API".to_owned(),
            changes_since_last_run: Changes::default(),
        };

        let doc = index_page(&base(), &metadata);

        assert!(doc.contains("<strong>12,087</strong> permissions across <strong>1,503</strong>"));
        assert!(doc.contains(
            r#"<meta name="description" content="Search 12087 GCP IAM permissions across 1503 roles. Find which roles grant specific permissions.">"#
        ));
        assert!(doc.contains("Last updated: 2024-01-03</p>"));
        assert!(doc.contains("GCP IAM Permissions &amp; Roles Search"));
        assert!(doc.contains(r#"<link rel="canonical" href="https://gcpiam.com/">"#));
        assert!(doc.contains(r#"<div id="app">"#));
        assert!(doc.contains("<noscript>"));
        assert!(doc.contains(r#"<script src="/app.js" type="module"></script>"#));
    }
}
