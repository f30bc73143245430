// Wire transports for the command API.
//
// Four interchangeable byte channels sit behind one `roundtrip` call:
// a local unix socket (on-device only), loopback HTTP, remote HTTP, and
// remote HTTPS. Channels carry opaque request/response payloads -- command
// semantics live entirely in the session layer.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;

pub const DEFAULT_HTTP_PORT: u16 = 80;
pub const DEFAULT_HTTPS_PORT: u16 = 443;
pub const DEFAULT_HTTP_LOCAL_PORT: u16 = 8080;
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/command-api.sock";

const API_PATH: &str = "/command-api";

/// Which wire transport a session speaks.
///
/// Selected by symbolic name at session construction; an unknown name is a
/// [`Error::Configuration`] at construction time, never at first use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Local interprocess channel, available only on the device itself.
    Socket,
    /// Loopback HTTP on 127.0.0.1, no credentials.
    HttpLocal,
    /// Remote plaintext HTTP with basic auth.
    Http,
    /// Remote HTTPS with basic auth. Self-signed device certificates are
    /// accepted by default (no pinning).
    Https,
}

impl TransportKind {
    /// Resolve a transport kind from its symbolic name.
    pub fn from_name(name: &str) -> Result<Self, Error> {
        match name {
            "socket" => Ok(Self::Socket),
            "http_local" => Ok(Self::HttpLocal),
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            other => Err(Error::Configuration {
                message: format!("unknown transport kind {other:?}"),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Socket => "socket",
            Self::HttpLocal => "http_local",
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    /// The port used when the caller does not supply one.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::Socket => None,
            Self::HttpLocal => Some(DEFAULT_HTTP_LOCAL_PORT),
            Self::Http => Some(DEFAULT_HTTP_PORT),
            Self::Https => Some(DEFAULT_HTTPS_PORT),
        }
    }

    fn scheme(&self) -> Option<&'static str> {
        match self {
            Self::Socket => None,
            Self::HttpLocal | Self::Http => Some("http"),
            Self::Https => Some("https"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Username/password pair for the web transports.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<SecretString>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Connection parameters for building a [`Channel`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub kind: TransportKind,
    pub host: String,
    /// Overrides the kind-specific default port.
    pub port: Option<u16>,
    /// Overrides the default unix socket path (socket kind only).
    pub socket_path: Option<PathBuf>,
    /// Per round trip deadline.
    pub timeout: Duration,
    /// Verify the device TLS certificate. Off by default: switches almost
    /// always present self-signed certificates.
    pub verify_tls: bool,
}

impl TransportConfig {
    pub fn new(kind: TransportKind, host: impl Into<String>) -> Self {
        Self {
            kind,
            host: host.into(),
            port: None,
            socket_path: None,
            timeout: Duration::from_secs(30),
            verify_tls: false,
        }
    }

    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The endpoint URL for the web transport kinds.
    ///
    /// The loopback kind always targets 127.0.0.1 regardless of `host`.
    pub(crate) fn endpoint_url(&self) -> Result<Url, Error> {
        let scheme = self.kind.scheme().ok_or_else(|| Error::Configuration {
            message: "socket transport has no endpoint URL".into(),
        })?;
        let host = match self.kind {
            TransportKind::HttpLocal => "127.0.0.1",
            _ => self.host.as_str(),
        };
        let port = self
            .port
            .or_else(|| self.kind.default_port())
            .unwrap_or_default();
        let full = format!("{scheme}://{host}:{port}{API_PATH}");
        Url::parse(&full).map_err(|e| Error::Configuration {
            message: format!("invalid endpoint URL {full:?}: {e}"),
        })
    }

    /// Build the byte channel for this configuration.
    ///
    /// Credentials are ignored by the socket and loopback kinds; those
    /// channels are only reachable from the device itself.
    pub fn build_channel(&self, credentials: Option<Credentials>) -> Result<Channel, Error> {
        match self.kind {
            TransportKind::Socket => Ok(Channel::Socket(SocketChannel {
                path: self
                    .socket_path
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH)),
                timeout: self.timeout,
            })),
            TransportKind::HttpLocal | TransportKind::Http | TransportKind::Https => {
                let url = self.endpoint_url()?;
                let mut builder = reqwest::Client::builder().timeout(self.timeout);
                if !self.verify_tls {
                    builder = builder.danger_accept_invalid_certs(true);
                }
                let http = builder.build().map_err(|e| Error::Configuration {
                    message: format!("failed to build HTTP client: {e}"),
                })?;
                let credentials = match self.kind {
                    TransportKind::HttpLocal => None,
                    _ => credentials,
                };
                Ok(Channel::Http(HttpChannel {
                    http,
                    url,
                    credentials,
                    timeout_secs: self.timeout.as_secs(),
                }))
            }
        }
    }
}

/// One of the four interchangeable byte channels.
///
/// `roundtrip` sends a single request payload and returns the raw response
/// body. Connection failures, resets, and deadline overruns surface as the
/// corresponding transport error kinds -- never as command faults.
#[derive(Debug)]
pub enum Channel {
    Http(HttpChannel),
    Socket(SocketChannel),
}

impl Channel {
    pub async fn roundtrip(&self, body: String) -> Result<String, Error> {
        match self {
            Self::Http(ch) => ch.roundtrip(body).await,
            Self::Socket(ch) => ch.roundtrip(body).await,
        }
    }
}

/// HTTP/S channel backed by `reqwest`, shared by the three web kinds.
#[derive(Debug)]
pub struct HttpChannel {
    http: reqwest::Client,
    url: Url,
    credentials: Option<Credentials>,
    timeout_secs: u64,
}

impl HttpChannel {
    async fn roundtrip(&self, body: String) -> Result<String, Error> {
        debug!("POST {}", self.url);

        let mut request = self
            .http
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json-rpc")
            .body(body);
        if let Some(creds) = &self.credentials {
            request = request.basic_auth(&creds.username, Some(creds.password.expose_secret()));
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "device rejected the supplied credentials".into(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Protocol {
                message: format!("unexpected HTTP status {status}"),
                body,
            });
        }

        response.text().await.map_err(|e| self.classify(e))
    }

    fn classify(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            Error::Transport(err)
        }
    }
}

/// Local interprocess channel over a unix stream socket.
///
/// One request per connection: write the payload, half-close the write
/// side, read the reply to EOF. The endpoint only exists when running on
/// the device itself.
#[derive(Debug)]
pub struct SocketChannel {
    path: PathBuf,
    timeout: Duration,
}

impl SocketChannel {
    async fn roundtrip(&self, body: String) -> Result<String, Error> {
        debug!("connecting to {}", self.path.display());

        let exchange = async {
            let mut stream = tokio::net::UnixStream::connect(&self.path).await?;
            stream.write_all(body.as_bytes()).await?;
            stream.shutdown().await?;
            let mut reply = String::new();
            stream.read_to_string(&mut reply).await?;
            Ok::<String, std::io::Error>(reply)
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(reply)) => {
                trace!(bytes = reply.len(), "socket reply received");
                Ok(reply)
            }
            Ok(Err(e)) => Err(Error::Io(e)),
            Err(_) => Err(Error::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn kind_resolves_from_symbolic_name() {
        assert_eq!(TransportKind::from_name("socket").unwrap(), TransportKind::Socket);
        assert_eq!(
            TransportKind::from_name("http_local").unwrap(),
            TransportKind::HttpLocal
        );
        assert_eq!(TransportKind::from_name("http").unwrap(), TransportKind::Http);
        assert_eq!(TransportKind::from_name("https").unwrap(), TransportKind::Https);
    }

    #[test]
    fn unknown_kind_is_a_configuration_error() {
        let err = TransportKind::from_name("telnet").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }), "got: {err:?}");
    }

    #[test]
    fn default_ports_per_kind() {
        assert_eq!(TransportKind::Http.default_port(), Some(80));
        assert_eq!(TransportKind::Https.default_port(), Some(443));
        assert_eq!(TransportKind::HttpLocal.default_port(), Some(8080));
        assert_eq!(TransportKind::Socket.default_port(), None);
    }

    #[test]
    fn endpoint_url_uses_kind_defaults() {
        // The url crate normalizes a port equal to the scheme default away.
        let config = TransportConfig::new(TransportKind::Https, "sw01.example.net");
        let url = config.endpoint_url().unwrap();
        assert_eq!(url.as_str(), "https://sw01.example.net/command-api");
    }

    #[test]
    fn endpoint_url_honors_port_override() {
        let config = TransportConfig::new(TransportKind::Http, "sw01").with_port(Some(8443));
        let url = config.endpoint_url().unwrap();
        assert_eq!(url.as_str(), "http://sw01:8443/command-api");
    }

    #[test]
    fn loopback_kind_ignores_host() {
        let config = TransportConfig::new(TransportKind::HttpLocal, "sw01.example.net");
        let url = config.endpoint_url().unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/command-api");
    }
}
