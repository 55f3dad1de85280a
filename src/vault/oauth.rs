use async_trait::async_trait;
use serde::Deserialize;

const AUTH_BASE_URL: &str = "https://www.linkedin.com/oauth/v2";
const SCOPES: &str = "openid profile email";

/// Successful response of the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("token endpoint returned {status}: {}", rejection_detail(.code, .description))]
    Rejected {
        status: u16,
        code: Option<String>,
        description: Option<String>,
    },

    #[error("token endpoint request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid OAuth URL: {0}")]
    InvalidUrl(String),
}

fn rejection_detail<'a>(code: &'a Option<String>, description: &'a Option<String>) -> &'a str {
    description
        .as_deref()
        .or(code.as_deref())
        .unwrap_or("no details")
}

impl OAuthError {
    /// Whether the grant itself is dead (expired, revoked or malformed) as
    /// opposed to the endpoint being temporarily unavailable.
    pub fn is_invalid_grant(&self) -> bool {
        match self {
            OAuthError::Rejected { status, code, .. } => {
                matches!(code.as_deref(), Some("invalid_grant" | "invalid_token"))
                    || matches!(status, 400 | 401)
            }
            OAuthError::Transport(_) | OAuthError::InvalidUrl(_) => false,
        }
    }
}

/// The two grant exchanges the vault needs from an OAuth provider.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, OAuthError>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, OAuthError>;
}

/// LinkedIn OAuth 2.0 client.
#[derive(Debug, Clone)]
pub struct LinkedInOAuth {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    base_url: String,
}

impl LinkedInOAuth {
    pub fn new(
        client: reqwest::Client,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            base_url: AUTH_BASE_URL.to_string(),
        }
    }

    /// URL the user is sent to in order to grant access.
    pub fn authorization_url(&self, state: &str) -> Result<String, OAuthError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/authorization", self.base_url),
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", SCOPES),
                ("state", state),
            ],
        )
        .map_err(|e| OAuthError::InvalidUrl(e.to_string()))?;
        Ok(url.to_string())
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, OAuthError> {
        let resp = self
            .client
            .post(format!("{}/accessToken", self.base_url))
            .form(form)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json().await?);
        }

        let body: TokenErrorBody = resp.json().await.unwrap_or(TokenErrorBody {
            error: None,
            error_description: None,
        });
        tracing::error!(
            "LinkedIn token endpoint error {status}: {:?} {:?}",
            body.error,
            body.error_description
        );
        Err(OAuthError::Rejected {
            status: status.as_u16(),
            code: body.error,
            description: body.error_description,
        })
    }
}

#[async_trait]
impl TokenEndpoint for LinkedInOAuth {
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, OAuthError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, OAuthError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ])
        .await
    }
}
