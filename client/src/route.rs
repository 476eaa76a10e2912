//! Player routes.
//!
//! `/remote?url=<encoded>` selects remote mode; every other path is local.

use reqwest::Url;

const REMOTE_PATH: &str = "/remote";

/// Where recordings come from for this session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Local,
    Remote,
}

/// A parsed application route (path plus query string).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    path: String,
    params: Vec<(String, String)>,
}

impl Route {
    /// Parse a route such as `/remote?url=https%3A%2F%2Fhost%2Fa.guac`.
    ///
    /// A leading `#` (hash routing) and a missing leading `/` are tolerated.
    pub fn parse(route: &str) -> Route {
        let route = route.trim().trim_start_matches('#');
        let route = if route.starts_with('/') {
            route.to_string()
        } else {
            format!("/{route}")
        };

        // The host is a placeholder; only path and query matter.
        match Url::parse("http://player.invalid").and_then(|base| base.join(&route)) {
            Ok(url) => Route {
                path: url.path().to_string(),
                params: url
                    .query_pairs()
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect(),
            },
            Err(_) => Route {
                path: route,
                params: Vec::new(),
            },
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// First value of a query parameter, if present.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn mode(&self) -> Mode {
        if self.path.trim_end_matches('/') == REMOTE_PATH {
            Mode::Remote
        } else {
            Mode::Local
        }
    }
}
