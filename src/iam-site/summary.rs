use crate::{Color, Format};
use iam_site::generate::Summary;
use nu_ansi_term::Color as Paint;
use std::{fmt::Write as _, time::Duration};

pub(crate) fn print_summary(summary: &Summary, elapsed: Duration, format: Format, color: Color) {
    // In the case of human, we print to stdout, to distinguish it from the rest
    // of the output, but for JSON we still go to stderr since presumably computers
    // will be looking at that output and we don't want to confuse them
    match format {
        Format::Human => {
            let color = crate::should_colorize(color, std::io::stdout());
            let text = human_summary(summary, elapsed, color);

            print!("{text}");
        }
        Format::Json => {
            let ssummary = serde_json::json!({
                "type": "summary",
                "fields": {
                    "elapsed_secs": elapsed.as_secs_f64(),
                    "summary": summary,
                },
            });

            use std::io::Write as _;
            let stderr = std::io::stderr();
            let mut el = stderr.lock();
            let _ = writeln!(el, "{ssummary}");
        }
    }
}

fn human_summary(summary: &Summary, elapsed: Duration, color: bool) -> String {
    let mut s = String::new();

    let done = if color {
        Paint::Green.paint("done").to_string()
    } else {
        "done".to_owned()
    };

    writeln!(s, "{done} in {:.2}s", elapsed.as_secs_f64()).unwrap();
    writeln!(s, "  - {}", summary.dataset).unwrap();
    writeln!(s, "  - {}", summary.minified_dataset).unwrap();
    writeln!(
        s,
        "  - {} permission pages in {}",
        summary.permissions, summary.permissions_dir
    )
    .unwrap();
    writeln!(s, "  - {} role pages in {}", summary.roles, summary.roles_dir).unwrap();
    writeln!(s, "  - {}", summary.sitemap).unwrap();
    writeln!(s, "  - {}", summary.index).unwrap();

    let changes = &summary.changes;
    if !changes.is_empty() {
        let mut line = |label: &str, added: usize, removed: usize, modified: Option<usize>| {
            let added = format!("+{added}");
            let removed = format!("-{removed}");

            let (added, removed) = if color {
                (
                    Paint::Green.paint(added).to_string(),
                    Paint::Red.paint(removed).to_string(),
                )
            } else {
                (added, removed)
            };

            write!(s, "{label}: {added} {removed}").unwrap();
            if let Some(modified) = modified {
                let modified = format!("~{modified}");
                if color {
                    write!(s, " {}", Paint::Yellow.paint(modified)).unwrap();
                } else {
                    write!(s, " {modified}").unwrap();
                }
            }
            s.push('\n');
        };

        line(
            "roles",
            changes.roles_added.len(),
            changes.roles_removed.len(),
            Some(changes.roles_modified.len()),
        );
        line(
            "permissions",
            changes.permissions_added.len(),
            changes.permissions_removed.len(),
            None,
        );
    }

    s
}
