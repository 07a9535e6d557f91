use crate::credentials::LOGIN_HINT;
use anyhow::{bail, Context as _};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// A role as returned by the catalog.
///
/// Every field is optional on the wire, missing values are defaulted rather
/// than treated as errors
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct RawRole {
    pub name: String,
    pub title: String,
    pub description: String,
    pub stage: String,
    pub included_permissions: Vec<String>,
    pub etag: String,
}

/// One page of a role listing
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RolesPage {
    pub roles: Vec<RawRole>,
    pub next_page_token: Option<String>,
}

/// A source of role listing pages
pub trait RoleCatalogClient {
    /// Retrieves a single page of roles, `page_token` is `None` for the
    /// first page
    fn list_roles(&self, token: &str, page_token: Option<&str>) -> anyhow::Result<RolesPage>;
}

/// Pages through the entire catalog, returning every role in the order the
/// catalog yielded them.
///
/// Paging continues as long as the catalog returns a non-empty
/// `nextPageToken`. Any failure aborts the whole fetch, nothing is retried.
pub fn fetch_all_roles(
    client: &dyn RoleCatalogClient,
    token: &str,
) -> anyhow::Result<Vec<RawRole>> {
    let mut roles = Vec::new();
    let mut page_token: Option<String> = None;
    let mut page_num = 0usize;

    loop {
        page_num += 1;

        let page = client
            .list_roles(token, page_token.as_deref())
            .with_context(|| format!("failed to fetch role page {page_num}"))?;

        let count = page.roles.len();
        roles.extend(page.roles);

        log::info!(
            "fetched page {page_num}: {count} roles (total: {})",
            roles.len()
        );

        match page.next_page_token {
            Some(next) if !next.is_empty() => page_token = Some(next),
            _ => break,
        }
    }

    Ok(roles)
}

/// [`RoleCatalogClient`] backed by the IAM REST API
pub struct HttpCatalog {
    client: reqwest::blocking::Client,
    endpoint: Url,
    page_size: u32,
}

impl HttpCatalog {
    pub fn new(endpoint: Url, page_size: u32, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build http client")?;

        Ok(Self {
            client,
            endpoint,
            page_size,
        })
    }

    /// `<endpoint>?pageSize=<n>&view=FULL[&pageToken=<token>]`
    pub fn page_url(&self, page_token: Option<&str>) -> Url {
        let mut url = self.endpoint.clone();

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("pageSize", &self.page_size.to_string())
                .append_pair("view", "FULL");

            if let Some(pt) = page_token {
                query.append_pair("pageToken", pt);
            }
        }

        url
    }
}

impl RoleCatalogClient for HttpCatalog {
    fn list_roles(&self, token: &str, page_token: Option<&str>) -> anyhow::Result<RolesPage> {
        let url = self.page_url(page_token);
        log::debug!("GET {url}");

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .with_context(|| format!("failed to send request to {}", self.endpoint))?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            bail!("the role catalog rejected the access token ({status}), {LOGIN_HINT}");
        }

        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_err| "<unreadable body>".to_owned());
            bail!("role catalog request failed ({status}): {}", body.trim());
        }

        response
            .json::<RolesPage>()
            .context("failed to decode role catalog response")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use anyhow::Context as _;
    use std::{
        cell::RefCell,
        io::{Read as _, Write as _},
        net::TcpListener,
        thread::JoinHandle,
    };

    /// Serves canned pages, recording every page token it was asked for
    struct Pages {
        pages: Vec<RolesPage>,
        requested: RefCell<Vec<Option<String>>>,
    }

    impl RoleCatalogClient for Pages {
        fn list_roles(&self, token: &str, page_token: Option<&str>) -> anyhow::Result<RolesPage> {
            assert_eq!(token, "tok");
            let mut requested = self.requested.borrow_mut();
            let i = requested.len();
            requested.push(page_token.map(String::from));

            let page = self.pages.get(i).context("asked for a page past the end")?;
            Ok(RolesPage {
                roles: page.roles.clone(),
                next_page_token: page.next_page_token.clone(),
            })
        }
    }

    fn role(name: &str) -> RawRole {
        RawRole {
            name: name.to_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn follows_page_tokens() {
        let client = Pages {
            pages: vec![
                RolesPage {
                    roles: vec![role("roles/a"), role("roles/b")],
                    next_page_token: Some("p2".into()),
                },
                RolesPage {
                    roles: vec![],
                    next_page_token: Some("p3".into()),
                },
                RolesPage {
                    roles: vec![role("roles/c")],
                    next_page_token: Some(String::new()),
                },
            ],
            requested: RefCell::default(),
        };

        let roles = fetch_all_roles(&client, "tok").unwrap();
        let names: Vec<_> = roles.iter().map(|r| r.name.as_str()).collect();

        assert_eq!(names, ["roles/a", "roles/b", "roles/c"]);
        assert_eq!(
            *client.requested.borrow(),
            [None, Some("p2".to_owned()), Some("p3".to_owned())]
        );
    }

    #[test]
    fn page_failure_is_fatal() {
        let client = Pages {
            pages: vec![RolesPage {
                roles: vec![role("roles/a")],
                next_page_token: Some("p2".into()),
            }],
            requested: RefCell::default(),
        };

        let err = fetch_all_roles(&client, "tok").unwrap_err();
        assert!(format!("{err:#}").contains("role page 2"));
    }

    #[test]
    fn decodes_sparse_payload() {
        let page: RolesPage = serde_json::from_str(
            r#"{"roles":[{"name":"roles/viewer","includedPermissions":["a.b.c"]},{"name":"roles/x","title":"X","stage":"BETA","etag":"AA=="}]}"#,
        )
        .unwrap();

        assert!(page.next_page_token.is_none());
        assert_eq!(page.roles[0].included_permissions, ["a.b.c"]);
        assert_eq!(page.roles[0].stage, "");
        assert_eq!(page.roles[1].stage, "BETA");
        assert_eq!(page.roles[1].etag, "AA==");

        let empty: RolesPage = serde_json::from_str("{}").unwrap();
        assert!(empty.roles.is_empty());
    }

    #[test]
    fn page_urls() {
        let catalog = HttpCatalog::new(
            Url::parse("https://iam.example.com/v1/roles").unwrap(),
            1000,
            Duration::from_secs(1),
        )
        .unwrap();

        assert_eq!(
            catalog.page_url(None).as_str(),
            "https://iam.example.com/v1/roles?pageSize=1000&view=FULL"
        );
        assert_eq!(
            catalog.page_url(Some("a+b/c=")).as_str(),
            "https://iam.example.com/v1/roles?pageSize=1000&view=FULL&pageToken=a%2Bb%2Fc%3D"
        );
    }

    /// Answers a single request with the given status line and body, handing
    /// back the raw request head once it has been served
    fn serve_once(status: &'static str, body: &'static str) -> (HttpCatalog, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();

            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let read = stream.read(&mut buf).unwrap();
                if read == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..read]);
            }

            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            // The client may hang up without reading the body on errors
            let _ = stream.write_all(response.as_bytes());

            String::from_utf8(head).unwrap()
        });

        let catalog = HttpCatalog::new(
            Url::parse(&format!("http://{addr}/v1/roles")).unwrap(),
            1000,
            Duration::from_secs(10),
        )
        .unwrap();

        (catalog, server)
    }

    #[test]
    fn http_page_is_decoded() {
        let (catalog, server) = serve_once(
            "200 OK",
            r#"{"roles":[{"name":"roles/viewer","stage":"GA","includedPermissions":["a.b.c"]}],"nextPageToken":"p3"}"#,
        );

        let page = catalog.list_roles("ya29.token", Some("p2")).unwrap();
        assert_eq!(page.roles.len(), 1);
        assert_eq!(page.roles[0].name, "roles/viewer");
        assert_eq!(page.roles[0].included_permissions, ["a.b.c"]);
        assert_eq!(page.next_page_token.as_deref(), Some("p3"));

        let head = server.join().unwrap();
        assert!(
            head.starts_with("GET /v1/roles?pageSize=1000&view=FULL&pageToken=p2 HTTP/1.1\r\n"),
            "{head}"
        );
        assert!(
            head.to_ascii_lowercase()
                .contains("\r\nauthorization: bearer ya29.token\r\n"),
            "{head}"
        );
    }

    #[test]
    fn http_rejected_token_hints_at_login() {
        for status in ["401 Unauthorized", "403 Forbidden"] {
            let (catalog, server) = serve_once(status, r#"{"error":{}}"#);

            let err = format!("{:#}", catalog.list_roles("expired", None).unwrap_err());
            assert!(err.contains(&status[..3]), "{err}");
            assert!(err.contains(LOGIN_HINT), "{err}");

            let head = server.join().unwrap();
            assert!(!head.contains("pageToken"), "{head}");
        }
    }

    #[test]
    fn http_failure_carries_status_and_body() {
        let (catalog, server) = serve_once("500 Internal Server Error", "backend unavailable");

        let err = format!("{:#}", catalog.list_roles("tok", None).unwrap_err());
        assert!(err.contains("500 Internal Server Error"), "{err}");
        assert!(err.contains("backend unavailable"), "{err}");
        assert!(!err.contains(LOGIN_HINT), "{err}");

        server.join().unwrap();
    }

    #[test]
    fn http_garbage_is_a_decode_error() {
        let (catalog, server) = serve_once("200 OK", "<html>not json</html>");

        let err = format!("{:#}", catalog.list_roles("tok", None).unwrap_err());
        assert!(err.contains("failed to decode role catalog response"), "{err}");

        server.join().unwrap();
    }
}
