use thiserror::Error;

use crate::event::{EdgeResponse, EventError};
use crate::provider::ExchangeError;

/// Everything that can stop a callback short of setting a session.
///
/// Each variant is terminal and rendered as a 400 page; none are retried.
#[derive(Error, Debug)]
pub enum CallbackError {
    #[error("Malformed event: {0}")]
    InvalidEvent(String),
    #[error("Malformed CloudFront record: {0}")]
    InvalidCfRecord(String),
    #[error("Identity provider returned {code}: {}", .description.as_deref().unwrap_or("no description"))]
    OAuth {
        code: String,
        description: Option<String>,
    },
    #[error("No authorization code in callback")]
    MissingCode,
    #[error("No sign-in in progress for this browser")]
    MissingPkce,
    #[error("Sign-in state cookie is unreadable: {0}")]
    InvalidPkce(#[source] serde_json::Error),
    #[error("Returned state does not match this sign-in")]
    StateMismatch,
    #[error("Token exchange failed: {0}")]
    TokenExchange(#[from] ExchangeError),
}

impl From<EventError> for CallbackError {
    fn from(err: EventError) -> Self {
        match err {
            EventError::InvalidEvent(msg) => Self::InvalidEvent(msg),
            EventError::InvalidCfRecord(msg) => Self::InvalidCfRecord(msg),
            EventError::Serialize(e) => Self::InvalidEvent(e.to_string()),
        }
    }
}

impl CallbackError {
    /// Stable machine-readable code shown on the error page and in logs
    pub fn kind(&self) -> &str {
        match self {
            Self::OAuth { code, .. } if !code.is_empty() => code.as_str(),
            _ => self.outcome(),
        }
    }

    /// Like [`kind`](Self::kind), but every provider-reported error collapses
    /// to `oauth_error` so the set of values stays fixed
    pub const fn outcome(&self) -> &'static str {
        match self {
            Self::InvalidEvent(_) => "invalid_event",
            Self::InvalidCfRecord(_) => "invalid_cf_record",
            Self::OAuth { .. } => "oauth_error",
            Self::MissingCode => "missing_code",
            Self::MissingPkce => "missing_pkce",
            Self::InvalidPkce(_) => "invalid_pkce",
            Self::StateMismatch => "state_mismatch",
            Self::TokenExchange(_) => "token_exchange_failed",
        }
    }

    /// Human-readable explanation for the error page
    pub fn description(&self) -> String {
        match self {
            Self::OAuth {
                description: Some(description),
                ..
            } if !description.is_empty() => description.clone(),
            Self::OAuth { code, .. } if !code.is_empty() => {
                format!("The identity provider reported an error ({code}).")
            }
            Self::MissingPkce => {
                "Your sign-in session was not found. It may have expired or cookies may be disabled."
                    .to_string()
            }
            Self::StateMismatch => {
                "The sign-in response did not match the request that started it.".to_string()
            }
            other => other.to_string(),
        }
    }

    /// The self-contained HTML page returned to the browser
    pub fn to_response(&self) -> EdgeResponse {
        EdgeResponse::html(400, "Bad Request", render_error_page(self.kind(), &self.description()))
            .no_cache()
    }
}

/// A standalone error page offering a fresh start at `/signin`
pub fn render_error_page(kind: &str, description: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Sign-in failed</title>
<style>
body {{ font-family: system-ui, sans-serif; max-width: 36rem; margin: 4rem auto; padding: 0 1rem; color: #222; }}
code {{ background: #f3f3f3; padding: 0.1rem 0.3rem; border-radius: 3px; }}
a {{ color: #0b5fff; }}
</style>
</head>
<body>
<h1>Sign-in failed</h1>
<p>{description}</p>
<p>Error code: <code>{kind}</code></p>
<p><a href="/signin">Try signing in again</a></p>
</body>
</html>
"#,
        description = escape_html(description),
        kind = escape_html(kind),
    )
}

fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(CallbackError::MissingCode.kind(), "missing_code");
        assert_eq!(CallbackError::MissingPkce.kind(), "missing_pkce");
        assert_eq!(CallbackError::StateMismatch.kind(), "state_mismatch");
        assert_eq!(
            CallbackError::InvalidEvent("x".to_string()).kind(),
            "invalid_event"
        );
        assert_eq!(
            CallbackError::InvalidCfRecord("x".to_string()).kind(),
            "invalid_cf_record"
        );
        assert_eq!(
            CallbackError::TokenExchange(ExchangeError::Status {
                status: 400,
                body: "{}".to_string()
            })
            .kind(),
            "token_exchange_failed"
        );
    }

    #[test]
    fn test_provider_error_uses_its_own_code() {
        let err = CallbackError::OAuth {
            code: "access_denied".to_string(),
            description: Some("User cancelled".to_string()),
        };
        assert_eq!(err.kind(), "access_denied");
        assert_eq!(err.description(), "User cancelled");

        let blank = CallbackError::OAuth {
            code: String::new(),
            description: None,
        };
        assert_eq!(blank.kind(), "oauth_error");
    }

    #[test]
    fn test_outcome_ignores_provider_code() {
        let err = CallbackError::OAuth {
            code: "attacker_chosen".to_string(),
            description: None,
        };
        assert_eq!(err.kind(), "attacker_chosen");
        assert_eq!(err.outcome(), "oauth_error");
        assert_eq!(CallbackError::StateMismatch.outcome(), CallbackError::StateMismatch.kind());
    }

    #[test]
    fn test_invalid_pkce_description_includes_cause() {
        let cause = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err = CallbackError::InvalidPkce(cause);
        assert_eq!(err.kind(), "invalid_pkce");
        assert!(err.description().starts_with("Sign-in state cookie is unreadable"));
    }

    #[test]
    fn test_error_response_shape() {
        let response = CallbackError::MissingCode.to_response();

        assert_eq!(response.status, 400);
        assert_eq!(
            response.headers.get("content-type"),
            Some("text/html; charset=utf-8")
        );
        assert_eq!(response.set_cookies().count(), 0);

        let body = response.body.expect("error page body");
        assert!(body.contains("missing_code"));
        assert!(body.contains(r#"href="/signin""#));
    }

    #[test]
    fn test_error_page_escapes_provider_text() {
        let err = CallbackError::OAuth {
            code: "invalid_request".to_string(),
            description: Some("<script>alert('x')</script>".to_string()),
        };

        let body = err.to_response().body.expect("error page body");
        assert!(!body.contains("<script>alert"));
        assert!(body.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
    }
}
