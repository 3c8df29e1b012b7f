//! HTTPS submission of normalized QSOs to the LdA confirmation service.
//!
//! One GET per QSO, credentials and fields URL-encoded into the query
//! string. LdA reports failures in the response body text rather than the
//! status code, so the body is inspected for its error markers. The
//! submitter never retries; retry policy belongs to the caller.

use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::Credentials;
use crate::record::QsoRecord;

/// Fixed LdA confirmation endpoint.
pub const LDA_SUBMIT_URL: &str = "https://www.lda.ar/php/subeqso.php";

/// Client identifier sent with every request.
pub const CLIENT_USER_AGENT: &str = "LdA-Uploader/1.0";

/// Bound on the whole request, connect included.
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);

/// QSL message sent when the record carried no comment.
pub const DEFAULT_QSL_MESSAGE: &str = "73 & DX";

/// Propagation-mode sentinel that must not be forwarded.
const PROP_MODE_NONE: &str = "N/A";

/// Substrings marking a rejection in an otherwise 200 response body.
const REJECTION_MARKERS: &[&str] = &["Error", "Falta", "no existe"];

/// Errors from a submission attempt.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// LdA answered but rejected the record; carries the response text.
    #[error("LdA rejected the QSO: {0}")]
    Rejected(String),

    /// The request failed at the transport level (timeout, connection
    /// refused, non-2xx status).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// HTTP client for the LdA confirmation service.
pub struct Submitter {
    client: Client,
    url: String,
}

impl Submitter {
    /// Create a submitter targeting the production endpoint.
    pub fn new() -> reqwest::Result<Self> {
        Self::with_url(LDA_SUBMIT_URL)
    }

    /// Create a submitter targeting an arbitrary endpoint (test servers).
    pub fn with_url(url: impl Into<String>) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(CLIENT_USER_AGENT)
            .timeout(SUBMIT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Submit one QSO. Returns the service's response text on success.
    pub async fn submit(
        &self,
        qso: &QsoRecord,
        credentials: &Credentials,
    ) -> Result<String, SubmitError> {
        let params = query_params(qso, credentials);
        debug!("submitting QSO with {} to {}", qso.call, self.url);

        let response = self
            .client
            .get(&self.url)
            .query(&params)
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?.trim().to_string();

        if is_rejection(&body) {
            return Err(SubmitError::Rejected(body));
        }
        Ok(body)
    }
}

/// Build the query parameter list for one submission.
fn query_params<'a>(qso: &'a QsoRecord, credentials: &'a Credentials) -> Vec<(&'static str, &'a str)> {
    let message = if qso.comment.is_empty() {
        DEFAULT_QSL_MESSAGE
    } else {
        qso.comment.as_str()
    };

    let mut params = vec![
        ("user", credentials.username.as_str()),
        ("pass", credentials.password.as_str()),
        ("micall", qso.station_callsign.as_str()),
        ("sucall", qso.call.as_str()),
        ("banda", qso.band.as_str()),
        ("modo", qso.mode.as_str()),
        ("fecha", qso.date.as_str()),
        ("hora", qso.time.as_str()),
        ("rst", qso.rst_sent.as_str()),
        ("x_qslMSG", message),
    ];

    if let Some(prop) = qso.prop_mode.as_deref()
        && !prop.is_empty()
        && prop != PROP_MODE_NONE
    {
        params.push(("prop", prop));
    }

    params
}

/// LdA reports failures in the body text, not the status code.
fn is_rejection(body: &str) -> bool {
    REJECTION_MARKERS.iter().any(|marker| body.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_qso() -> QsoRecord {
        QsoRecord {
            call: "LU5WSO".to_string(),
            band: "40m".to_string(),
            mode: "CW".to_string(),
            date: "15/01/2024".to_string(),
            time: "1430".to_string(),
            rst_sent: "59".to_string(),
            comment: String::new(),
            station_callsign: "LU9XYZ".to_string(),
            prop_mode: None,
        }
    }

    fn test_credentials() -> Credentials {
        Credentials {
            username: "lu9xyz".to_string(),
            password: "secret".to_string(),
            callsign: "LU9XYZ".to_string(),
        }
    }

    #[test]
    fn test_rejection_markers() {
        assert!(is_rejection("Falta usuario"));
        assert!(is_rejection("Error en los datos"));
        assert!(is_rejection("El usuario no existe"));
        assert!(!is_rejection("OK"));
        assert!(!is_rejection("QSO agregado"));
        assert!(!is_rejection(""));
    }

    #[test]
    fn test_query_params_fixed_names() {
        let qso = test_qso();
        let creds = test_credentials();
        let params = query_params(&qso, &creds);

        assert_eq!(params[0], ("user", "lu9xyz"));
        assert_eq!(params[1], ("pass", "secret"));
        assert_eq!(params[2], ("micall", "LU9XYZ"));
        assert_eq!(params[3], ("sucall", "LU5WSO"));
        assert_eq!(params[4], ("banda", "40m"));
        assert_eq!(params[5], ("modo", "CW"));
        assert_eq!(params[6], ("fecha", "15/01/2024"));
        assert_eq!(params[7], ("hora", "1430"));
        assert_eq!(params[8], ("rst", "59"));
    }

    #[test]
    fn test_empty_comment_gets_default_message() {
        let qso = test_qso();
        let creds = test_credentials();
        let params = query_params(&qso, &creds);
        assert!(params.contains(&("x_qslMSG", DEFAULT_QSL_MESSAGE)));

        let qso = QsoRecord {
            comment: "gran señal".to_string(),
            ..test_qso()
        };
        let params = query_params(&qso, &creds);
        assert!(params.contains(&("x_qslMSG", "gran señal")));
    }

    #[test]
    fn test_prop_mode_included_when_meaningful() {
        let qso = QsoRecord {
            prop_mode: Some("ES".to_string()),
            ..test_qso()
        };
        let creds = test_credentials();
        let params = query_params(&qso, &creds);
        assert!(params.contains(&("prop", "ES")));
    }

    #[test]
    fn test_prop_mode_sentinel_omitted() {
        for prop in [None, Some("N/A".to_string()), Some(String::new())] {
            let qso = QsoRecord {
                prop_mode: prop,
                ..test_qso()
            };
            let creds = test_credentials();
            let params = query_params(&qso, &creds);
            assert!(!params.iter().any(|(name, _)| *name == "prop"));
        }
    }

    #[tokio::test]
    async fn test_submit_classifies_body_rejection() {
        // Minimal local HTTP server answering with an LdA-style error body.
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let body = "Falta usuario";
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-length: {}\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
        });

        let submitter = Submitter::with_url(format!("http://{}/subeqso.php", addr)).unwrap();
        let err = submitter
            .submit(&test_qso(), &test_credentials())
            .await
            .expect_err("body should classify as rejection");

        match err {
            SubmitError::Rejected(body) => assert_eq!(body, "Falta usuario"),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_submit_success_returns_body() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let body = "OK";
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-length: {}\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
        });

        let submitter = Submitter::with_url(format!("http://{}/subeqso.php", addr)).unwrap();
        let body = submitter
            .submit(&test_qso(), &test_credentials())
            .await
            .expect("OK body is a success");
        assert_eq!(body, "OK");
    }

    #[tokio::test]
    async fn test_submit_connection_refused_is_transport_error() {
        // Reserved port nothing listens on.
        let submitter = Submitter::with_url("http://127.0.0.1:1/subeqso.php").unwrap();
        let err = submitter
            .submit(&test_qso(), &test_credentials())
            .await
            .expect_err("nothing listens on port 1");
        assert!(matches!(err, SubmitError::Transport(_)));
    }
}
