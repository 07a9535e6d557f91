#![deny(unsafe_code)]
#![warn(clippy::all, rust_2018_idioms)]

use anyhow::{Context as _, Error};
use clap::{Parser, ValueEnum};
use iam_site::{
    catalog::HttpCatalog,
    cfg,
    credentials::{CommandCredentials, CredentialSource, StaticToken},
    SiteConfig,
};
use std::{path::PathBuf, time::Duration};
use url::Url;

mod summary;

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum Format {
    Human,
    Json,
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum Color {
    Auto,
    Always,
    Never,
}

fn parse_level(s: &str) -> Result<log::LevelFilter, Error> {
    s.parse::<log::LevelFilter>()
        .with_context(|| format!("failed to parse level '{s}'"))
}

/// Generates a static reference site for GCP IAM roles and permissions
#[derive(Parser)]
#[command(author, version, about, long_about = None, rename_all = "kebab-case", max_term_width = 80)]
struct Opts {
    /// The log level for messages
    #[arg(
        short = 'L',
        long,
        env = "IAM_SITE_LOG",
        default_value = "info",
        value_parser = parse_level,
        long_help = "The log level for messages

Only log messages at or above the level will be emitted.

Possible values:
* off
* error
* warn
* info
* debug
* trace
"
    )]
    log_level: log::LevelFilter,
    /// Specify the format of log messages and the summary
    #[arg(short, long, value_enum, default_value_t = Format::Human)]
    format: Format,
    /// Colorize output
    #[arg(short, long, value_enum, default_value_t = Color::Auto)]
    color: Color,
    /// The directory the dataset and the static site are written to
    #[arg(short, long, env = "IAM_SITE_OUTPUT_DIR", default_value = "data")]
    output_dir: PathBuf,
    /// The public url the site is served from, used for canonical links and
    /// the sitemap
    #[arg(long, env = "IAM_SITE_BASE_URL", default_value = cfg::DEFAULT_BASE_URL)]
    base_url: Url,
    /// The role listing endpoint
    #[arg(long, env = "IAM_SITE_CATALOG_URL", default_value = cfg::DEFAULT_CATALOG_URL)]
    catalog_url: Url,
    /// The number of roles requested per page
    #[arg(long, env = "IAM_SITE_PAGE_SIZE", default_value_t = cfg::DEFAULT_PAGE_SIZE)]
    page_size: u32,
    /// An access token to use instead of asking `gcloud` for one
    #[arg(long, env = "GCP_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,
    /// Seconds to wait for `gcloud auth print-access-token`
    #[arg(long, env = "IAM_SITE_CREDENTIAL_TIMEOUT", default_value_t = 30)]
    credential_timeout: u64,
    /// Seconds to wait for each catalog request
    #[arg(long, env = "IAM_SITE_HTTP_TIMEOUT", default_value_t = 30)]
    http_timeout: u64,
}

fn human_timestamp() -> String {
    time::OffsetDateTime::now_utc()
        .format(time::macros::format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .unwrap_or_default()
}

fn setup_logger(
    level: log::LevelFilter,
    format: Format,
    color: bool,
) -> Result<(), fern::InitError> {
    use log::Level::{Debug, Error, Info, Trace, Warn};
    use nu_ansi_term::Color::{Blue, Green, Purple, Red, Yellow};

    match format {
        Format::Human => {
            if color {
                fern::Dispatch::new()
                    .level(level)
                    .format(move |out, message, record| {
                        out.finish(format_args!(
                            "{date} [{level}] {message}\x1B[0m",
                            date = human_timestamp(),
                            level = match record.level() {
                                Error => Red.paint("ERROR"),
                                Warn => Yellow.paint("WARN"),
                                Info => Green.paint("INFO"),
                                Debug => Blue.paint("DEBUG"),
                                Trace => Purple.paint("TRACE"),
                            },
                            message = message,
                        ));
                    })
                    .chain(std::io::stderr())
                    .apply()?;
            } else {
                fern::Dispatch::new()
                    .level(level)
                    .format(move |out, message, record| {
                        out.finish(format_args!(
                            "{date} [{level}] {message}",
                            date = human_timestamp(),
                            level = match record.level() {
                                Error => "ERROR",
                                Warn => "WARN",
                                Info => "INFO",
                                Debug => "DEBUG",
                                Trace => "TRACE",
                            },
                            message = message,
                        ));
                    })
                    .chain(std::io::stderr())
                    .apply()?;
            }
        }
        Format::Json => {
            fern::Dispatch::new()
                .level(level)
                .format(move |out, message, record| {
                    let line = serde_json::json!({
                        "type": "log",
                        "fields": {
                            "timestamp": iam_site::dataset::format_timestamp(time::OffsetDateTime::now_utc())
                                .unwrap_or_default(),
                            "level": record.level().as_str(),
                            "message": message.to_string(),
                        },
                    });
                    out.finish(format_args!("{line}"));
                })
                .chain(std::io::stderr())
                .apply()?;
        }
    }

    Ok(())
}

pub(crate) fn should_colorize(color: Color, stream: impl std::io::IsTerminal) -> bool {
    match color {
        Color::Auto => stream.is_terminal(),
        Color::Always => true,
        Color::Never => false,
    }
}

fn real_main() -> Result<(), Error> {
    let args = Opts::parse();

    setup_logger(
        args.log_level,
        args.format,
        should_colorize(args.color, std::io::stderr()),
    )?;

    let output_dir = iam_site::utf8path(args.output_dir)?;

    let mut site_cfg = SiteConfig::new(args.base_url, args.catalog_url, output_dir);
    site_cfg.page_size = args.page_size;
    site_cfg.http_timeout = Duration::from_secs(args.http_timeout);

    let credentials: Box<dyn CredentialSource> = match args.access_token {
        Some(token) => {
            log::debug!("using the access token from the command line/environment");
            Box::new(StaticToken::new(token))
        }
        None => Box::new(CommandCredentials::gcloud(Duration::from_secs(
            args.credential_timeout,
        ))),
    };

    let catalog = HttpCatalog::new(
        site_cfg.catalog_url.clone(),
        site_cfg.page_size,
        site_cfg.http_timeout,
    )?;

    let started = std::time::Instant::now();
    let summary = iam_site::generate::run(
        &site_cfg,
        credentials.as_ref(),
        &catalog,
        time::OffsetDateTime::now_utc(),
    )?;

    summary::print_summary(&summary, started.elapsed(), args.format, args.color);

    Ok(())
}

fn main() {
    match real_main() {
        Ok(_) => {}
        Err(e) => {
            log::error!("{:#}", e);
            std::process::exit(1);
        }
    }
}
