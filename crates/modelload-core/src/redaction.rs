use serde::Serialize;

/// Connection target with secrets removed, safe to put in log records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedactedConnection {
    pub user: Option<String>,
    pub host: Option<String>,
    pub database: Option<String>,
    pub redacted: String,
}

/// Redact the password and sensitive query parameters of a connection URI.
///
/// Strings that are not URIs are returned unchanged apart from query
/// parameter redaction.
pub fn redact_connection_string(conn: &str) -> RedactedConnection {
    let (base, query) = match conn.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (conn, None),
    };

    let mut user = None;
    let mut host = None;
    let mut database = None;
    let mut redacted = base.to_string();

    if let Some((scheme, rest)) = base.split_once("://") {
        let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
        let host_port = match authority.rsplit_once('@') {
            Some((credentials, host_port)) => {
                let name = match credentials.split_once(':') {
                    Some((name, _)) => {
                        redacted = format!("{scheme}://{name}:***@{host_port}");
                        if !path.is_empty() {
                            redacted.push('/');
                            redacted.push_str(path);
                        }
                        name
                    }
                    None => credentials,
                };
                user = Some(name.to_string()).filter(|name| !name.is_empty());
                host_port
            }
            None => authority,
        };

        let host_name = host_port
            .rsplit_once(':')
            .filter(|(_, port)| port.parse::<u16>().is_ok())
            .map(|(host, _)| host)
            .unwrap_or(host_port);
        host = Some(host_name.to_string()).filter(|host| !host.is_empty());
        database = Some(path.to_string()).filter(|path| !path.is_empty());
    }

    if let Some(query) = query {
        let params: Vec<String> = query
            .split('&')
            .map(|pair| match pair.split_once('=') {
                Some((key, _)) if is_sensitive_key(key) => format!("{key}=***"),
                _ => pair.to_string(),
            })
            .collect();
        redacted.push('?');
        redacted.push_str(&params.join("&"));
    }

    RedactedConnection {
        user,
        host,
        database,
        redacted,
    }
}

fn is_sensitive_key(key: &str) -> bool {
    matches!(
        key.to_ascii_lowercase().as_str(),
        "password" | "pass" | "passwd" | "token" | "sslpassword"
    )
}
