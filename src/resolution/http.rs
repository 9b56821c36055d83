use chrono::{DateTime, Utc};
use iref::{Uri, UriBuf};
use log::{debug, warn};
use percent_encoding::{utf8_percent_encode, CONTROLS};
use reqwest::{header, StatusCode};
use serde::Deserialize;

use crate::{Document, DIDResolver, DID};

use super::{Error, Meta, Output};

pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Accepted representations, DID JSON first.
pub const ACCEPT: &str = "application/did+json, application/did+ld+json;q=0.7, application/json;q=0.1";

/// Default upper boundary for the byte size of a DID document download.
pub const DOWNLOAD_MAX_DEFAULT: u64 = 1 << 16;

/// Hard upper boundary for the byte size of a DID document download.
pub const DOWNLOAD_MAX_CEILING: u64 = 1 << 30;

/// A DID Resolver implementing a client for the [DID Resolution HTTP(S)
/// Binding](https://w3c-ccg.github.io/did-resolution/#bindings-https).
///
/// The same client fetches DID documents from any other URL, such as the
/// ones of `did:web`, with [`fetch`](Self::fetch).
#[derive(Debug, Clone)]
pub struct HTTPDIDResolver {
    /// HTTP(S) URL for DID resolver HTTP(S) endpoint.
    endpoint: UriBuf,

    client: Option<reqwest::Client>,

    download_max: i64,
}

impl HTTPDIDResolver {
    /// Construct a new HTTP DID Resolver with a given [endpoint][Self::endpoint] URL.
    pub fn new(url: &Uri) -> Self {
        Self {
            endpoint: url.to_owned(),
            client: None,
            download_max: 0,
        }
    }

    /// Sets the upper boundary for the byte size of downloads. Zero means
    /// [`DOWNLOAD_MAX_DEFAULT`], and negative values mean
    /// [`DOWNLOAD_MAX_CEILING`].
    pub fn with_download_max(mut self, max: i64) -> Self {
        self.download_max = max;
        self
    }

    /// Uses `client` instead of a default one.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }

    /// Effective upper boundary for the byte size of downloads.
    pub fn download_max(&self) -> u64 {
        match self.download_max {
            0 => DOWNLOAD_MAX_DEFAULT,
            max if max < 0 => DOWNLOAD_MAX_CEILING,
            max => (max as u64).min(DOWNLOAD_MAX_CEILING),
        }
    }

    /// Fetches the DID document at `url`.
    ///
    /// The `Last-Modified` header, when present, provides
    /// [`Meta::updated`] on a best-effort basis.
    pub async fn fetch(&self, url: &str) -> Result<Output, Error> {
        let client = match &self.client {
            Some(client) => client.clone(),
            None => reqwest::Client::builder()
                .build()
                .map_err(|_| Error::internal(InternalError::Initialization))?,
        };

        debug!("fetching DID document {url}");
        let mut response = client
            .get(url)
            .header(header::ACCEPT, ACCEPT)
            .header(header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| Error::internal(InternalError::Reqwest(e)))?;

        let max = self.download_max();
        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => return Err(Error::NotFound),
            StatusCode::NOT_ACCEPTABLE => return Err(Error::MediaTypeNotSupported),
            status if !status.is_success() => {
                let body = read_body(&mut response, url, max).await.unwrap_or_default();
                return Err(error_from_body(&body, url).unwrap_or(Error::UnexpectedStatus {
                    status: status.to_string(),
                    url: url.to_string(),
                }));
            }
            _ => (),
        }

        let mut metadata = Meta::default();
        if let Some(value) = response.headers().get(header::LAST_MODIFIED) {
            match value
                .to_str()
                .ok()
                .and_then(|s| DateTime::parse_from_rfc2822(s).ok())
            {
                Some(time) => metadata.updated = Some(time.with_timezone(&Utc)),
                None => warn!("unusable Last-Modified {value:?} for DID document {url}"),
            }
        }

        let body = read_body(&mut response, url, max).await?;
        let document = Document::from_json(&body).map_err(|e| {
            // error bodies may come with any status
            error_from_body(&body, url).unwrap_or_else(|| {
                Error::internal(InternalError::Decode {
                    url: url.to_string(),
                    source: e,
                })
            })
        })?;

        Ok(Output::new(document, metadata))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InternalError {
    #[error("unable to initialize HTTP client")]
    Initialization,

    #[error("HTTP error: {0}")]
    Reqwest(reqwest::Error),

    #[error("DID document {url:?} unavailable: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },
}

/// Reads the response body, up to `max` bytes.
async fn read_body(response: &mut reqwest::Response, url: &str, max: u64) -> Result<Vec<u8>, Error> {
    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| Error::internal(InternalError::Reqwest(e)))?
    {
        if (body.len() + chunk.len()) as u64 > max {
            return Err(Error::DownloadTooLarge {
                url: url.to_string(),
                max,
            });
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

/// Error body of the DID Resolution HTTP(S) Binding.
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

fn error_from_body(body: &[u8], url: &str) -> Option<Error> {
    let ErrorBody { error } = serde_json::from_slice(body).ok()?;
    match error.as_str() {
        "invalidDid" => Some(Error::InvalidDid(format!("rejected by {url}"))),
        "notFound" => Some(Error::NotFound),
        "representationNotSupported" => Some(Error::MediaTypeNotSupported),
        _ => None,
    }
}

impl DIDResolver for HTTPDIDResolver {
    /// Resolve a DID over HTTP(S), using the [DID Resolution HTTP(S) Binding](https://w3c-ccg.github.io/did-resolution/#bindings-https).
    async fn resolve(&self, did: &DID) -> Result<Output, Error> {
        let did = did.to_string();
        let url = self.endpoint.to_string() + &utf8_percent_encode(&did, CONTROLS).to_string();
        self.fetch(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use hyper::header::{HeaderValue, CONTENT_TYPE, LAST_MODIFIED};
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Response, Server};
    use pretty_assertions::assert_eq;

    const DID_JSON: &str = r#"{
        "@context": "https://www.w3.org/ns/did/v1",
        "id": "did:example:123",
        "controller": "did:example:456"
    }"#;

    fn respond(status: u16, body: impl Into<Body>) -> Response<Body> {
        let mut response = Response::new(body.into());
        *response.status_mut() = hyper::StatusCode::from_u16(status).unwrap();
        response
    }

    fn resolver_server() -> Result<(String, impl FnOnce() -> Result<(), ()>), hyper::Error> {
        let addr = ([127, 0, 0, 1], 0).into();
        let make_svc = make_service_fn(|_| async move {
            Ok::<_, hyper::Error>(service_fn(|req| async move {
                let response = match req.uri().path() {
                    "/1.0/identifiers/did:example:123" => {
                        assert_eq!(req.headers()[hyper::header::ACCEPT], ACCEPT);
                        let mut response = respond(200, DID_JSON);
                        let headers = response.headers_mut();
                        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/did+json"));
                        headers.insert(
                            LAST_MODIFIED,
                            HeaderValue::from_static("Tue, 15 Nov 1994 08:12:31 GMT"),
                        );
                        response
                    }
                    "/garbled" => {
                        let mut response = respond(200, DID_JSON);
                        response
                            .headers_mut()
                            .insert(LAST_MODIFIED, HeaderValue::from_static("yesterday"));
                        response
                    }
                    "/large" => respond(200, vec![b' '; 70_000]),
                    "/not-acceptable" => respond(406, "arbitrary"),
                    "/gone" => respond(410, "arbitrary"),
                    "/invalid" => respond(400, r#"{"error": "invalidDid"}"#),
                    "/invalid-ok" => respond(200, r#"{"error": "invalidDid"}"#),
                    "/other-ok" => respond(200, r#"{"error": "internalError"}"#),
                    "/unsupported" => respond(400, r#"{"error": "representationNotSupported"}"#),
                    _ => respond(404, "arbitrary"),
                };
                Ok::<_, hyper::Error>(response)
            }))
        });
        let server = Server::try_bind(&addr)?.serve(make_svc);
        let url = "http://".to_string() + &server.local_addr().to_string();
        let (shutdown_tx, shutdown_rx) = futures::channel::oneshot::channel();
        let graceful = server.with_graceful_shutdown(async {
            shutdown_rx.await.ok();
        });
        tokio::task::spawn(async move {
            graceful.await.ok();
        });
        let shutdown = || shutdown_tx.send(());
        Ok((url, shutdown))
    }

    fn resolver(base: &str) -> HTTPDIDResolver {
        let endpoint = UriBuf::new(format!("{base}/1.0/identifiers/").into_bytes()).unwrap();
        HTTPDIDResolver::new(&endpoint)
    }

    #[test_log::test(tokio::test)]
    async fn resolve() {
        let (base, shutdown) = resolver_server().unwrap();

        let output = resolver(&base)
            .resolve(&DID::parse("did:example:123").unwrap())
            .await
            .unwrap();
        assert_eq!(output.document.subject.to_string(), "did:example:123");
        assert!(output.document.controllers.contains("did:example:456"));
        assert_eq!(
            output.metadata.updated,
            Some("1994-11-15T08:12:31Z".parse().unwrap())
        );

        let output = resolver(&base)
            .fetch(&format!("{base}/garbled"))
            .await
            .unwrap();
        assert_eq!(output.metadata.updated, None);

        let err = resolver(&base)
            .resolve(&DID::parse("did:example:456").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound));

        shutdown().ok();
    }

    #[tokio::test]
    async fn status_errors() {
        let (base, shutdown) = resolver_server().unwrap();
        let resolver = resolver(&base);

        let err = resolver.fetch(&format!("{base}/not-acceptable")).await.unwrap_err();
        assert!(matches!(err, Error::MediaTypeNotSupported));

        let url = format!("{base}/gone");
        let err = resolver.fetch(&url).await.unwrap_err();
        assert_eq!(err.to_string(), format!("HTTP \"410 Gone\" for DID document {url}"));

        let err = resolver.fetch(&format!("{base}/invalid")).await.unwrap_err();
        assert_eq!(err.code(), "invalidDid");

        let err = resolver.fetch(&format!("{base}/unsupported")).await.unwrap_err();
        assert!(matches!(err, Error::MediaTypeNotSupported));

        let err = resolver.fetch(&format!("{base}/invalid-ok")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidDid(_)));
        assert_eq!(err.code(), "invalidDid");

        let err = resolver.fetch(&format!("{base}/other-ok")).await.unwrap_err();
        assert_eq!(err.code(), "internalError");

        shutdown().ok();
    }

    #[tokio::test]
    async fn download_max() {
        let (base, shutdown) = resolver_server().unwrap();
        let url = format!("{base}/large");

        let err = resolver(&base).fetch(&url).await.unwrap_err();
        assert!(matches!(err, Error::DownloadTooLarge { max: DOWNLOAD_MAX_DEFAULT, .. }));

        let err = resolver(&base)
            .with_download_max(100)
            .fetch(&format!("{base}/1.0/identifiers/did:example:123"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DownloadTooLarge { max: 100, .. }));

        // Whitespace only: within limits, yet no document.
        let err = resolver(&base)
            .with_download_max(-1)
            .fetch(&url)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));

        shutdown().ok();
    }

    #[test]
    fn download_max_convention() {
        let endpoint = UriBuf::new(b"https://resolver.example.com/".to_vec()).unwrap();
        let resolver = HTTPDIDResolver::new(&endpoint);
        assert_eq!(resolver.download_max(), DOWNLOAD_MAX_DEFAULT);
        assert_eq!(resolver.clone().with_download_max(-1).download_max(), DOWNLOAD_MAX_CEILING);
        assert_eq!(resolver.clone().with_download_max(10).download_max(), 10);
        assert_eq!(resolver.with_download_max(i64::MAX).download_max(), DOWNLOAD_MAX_CEILING);
    }
}
