//! Request URI reconstruction from a synthetic [`Environment`].

use crate::environment::{
    Environment, HTTP_HOST, HTTPS, QUERY_STRING, REQUEST_URI, SCRIPT_NAME, SERVER_NAME,
    SERVER_PORT,
};

const DEFAULT_PORT: u16 = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri {
    scheme: String,
    user: String,
    password: String,
    host: String,
    port: Option<u16>,
    base_path: String,
    path: String,
    query: String,
}

impl Uri {
    /// Rebuild the request URI exactly as the environment declares it.
    ///
    /// * scheme is `https` when `HTTPS` is set to anything but empty or `off`
    /// * host and port come from `HTTP_HOST` (`host:port` is split), falling back
    ///   to `SERVER_NAME` and `SERVER_PORT`
    /// * path and query are split from `REQUEST_URI`; a non-empty `QUERY_STRING`
    ///   takes precedence over the query embedded in the URI
    /// * the base path is `SCRIPT_NAME` when the URI starts with it, otherwise
    ///   the script directory when that is not `/`. The routed path is relative
    ///   to the base path.
    #[must_use]
    pub fn from_environment(env: &Environment) -> Self {
        let scheme = match env.get_string(HTTPS) {
            Some(https) if !https.is_empty() && !https.eq_ignore_ascii_case("off") => "https",
            _ => "http",
        };

        let user = env.get_string("PHP_AUTH_USER").unwrap_or_default();
        let password = env.get_string("PHP_AUTH_PW").unwrap_or_default();

        let mut port = env
            .get_string(SERVER_PORT)
            .and_then(|x| x.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let host = env.get_string(HTTP_HOST).map_or_else(
            || env.get_string(SERVER_NAME).unwrap_or_default(),
            |host| {
                let (host, host_port) = split_host_port(&host);
                if let Some(host_port) = host_port {
                    port = host_port;
                }
                host.to_string()
            },
        );

        let request_uri = env.get_string(REQUEST_URI).unwrap_or_default();
        let (request_path, embedded_query) = request_uri
            .split_once('?')
            .map_or((request_uri.as_str(), ""), |(path, query)| (path, query));
        let request_path = request_path
            .split_once('#')
            .map_or(request_path, |(path, _)| path);

        let script_name = env.get_string(SCRIPT_NAME).unwrap_or_default();
        let base_path = base_path(request_path, &script_name);
        let virtual_path = if base_path.is_empty() {
            request_path
        } else {
            &request_path[base_path.len()..]
        };

        let query = match env.get_string(QUERY_STRING) {
            Some(query) if !query.is_empty() => query,
            _ => embedded_query
                .split_once('#')
                .map_or(embedded_query, |(query, _)| query)
                .to_string(),
        };

        Self {
            scheme: scheme.to_string(),
            user,
            password,
            host,
            port: Some(port),
            base_path: base_path.to_string(),
            path: format!("/{}", virtual_path.trim_start_matches('/')),
            query,
        }
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    #[must_use]
    pub fn user_info(&self) -> String {
        if self.password.is_empty() {
            self.user.clone()
        } else {
            format!("{}:{}", self.user, self.password)
        }
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port, or `None` when it is the scheme's standard port.
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.port.filter(|port| {
            !matches!((self.scheme.as_str(), port), ("http", 80) | ("https", 443))
        })
    }

    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Routed path, relative to the base path. Always starts with `/`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }
}

impl std::fmt::Display for Uri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://", self.scheme)?;
        let user_info = self.user_info();
        if !user_info.is_empty() {
            write!(f, "{user_info}@")?;
        }
        f.write_str(&self.host)?;
        if let Some(port) = self.port() {
            write!(f, ":{port}")?;
        }
        write!(f, "{}{}", self.base_path, self.path)?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        Ok(())
    }
}

fn split_host_port(host: &str) -> (&str, Option<u16>) {
    // bracketed IPv6 literal, optionally followed by a port
    if host.starts_with('[') {
        return host.find(']').map_or((host, None), |end| {
            let port = host[end + 1..]
                .strip_prefix(':')
                .and_then(|x| x.parse().ok());
            (&host[..=end], port)
        });
    }

    host.split_once(':')
        .map_or((host, None), |(name, port)| (name, port.parse().ok()))
}

fn script_dir(script_name: &str) -> &str {
    match script_name.rfind('/') {
        Some(0) => "/",
        Some(i) => &script_name[..i],
        None => ".",
    }
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn base_path<'a>(request_path: &str, script_name: &'a str) -> &'a str {
    if script_name.is_empty() {
        return "";
    }
    if starts_with_ignore_case(request_path, script_name) {
        return script_name;
    }
    let dir = script_dir(script_name);
    if dir != "/" && dir != "." && starts_with_ignore_case(request_path, dir) {
        return dir;
    }
    ""
}
