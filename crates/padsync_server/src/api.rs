//! HTTP endpoints: file open, secure save/open, simulated login, status
//! and shutdown.
//!
//! Every reply is a JSON object with `status` set to `"success"` or
//! `"error"`; failures carry a human-readable `message` and are local to
//! the request.

use crate::error::{ServerError, ServerResult};
use crate::server::AppState;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Query, State};
use axum::Json;
use padsync_core::EngineStats;
use padsync_crypto::open_text;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Suggested filename for plain saves.
pub const PLAIN_FILENAME: &str = "notepad_content.txt";
/// Suggested filename for secure saves.
pub const SECURE_FILENAME: &str = "notepad_secure.txt";

/// Envelope of every API reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Reply<T> {
    /// The request succeeded; fields of `T` sit next to `status`.
    Success(T),
    /// The request failed.
    Error {
        /// What went wrong.
        message: String,
    },
}

impl<T> Reply<T> {
    fn from_result(result: ServerResult<T>, what: &'static str) -> Json<Self> {
        match result {
            Ok(value) => Json(Reply::Success(value)),
            Err(e) => {
                warn!(error = %e, client_error = e.is_client_error(), "{what} failed");
                Json(Reply::Error {
                    message: e.to_string(),
                })
            }
        }
    }
}

/// Reply body with no fields besides `status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Done {}

/// A file read back to the editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenedFile {
    /// File text.
    pub content: String,
    /// Name the client uploaded it under.
    pub filename: String,
}

/// Body of secure save and secure open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecureRequest {
    /// Plain text (save) or encrypted text (open).
    pub content: String,
    /// Password.
    pub password: String,
}

/// Result of a secure save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedFile {
    /// Transport-safe encrypted text.
    pub encrypted_data: String,
    /// Suggested download name.
    pub filename: String,
}

/// Result of a secure open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenedText {
    /// Decrypted text.
    pub content: String,
}

/// Body of the simulated login.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Site name.
    pub site: Option<String>,
    /// User name.
    pub user: Option<String>,
}

/// Where the client should go after login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    /// Relative URL.
    pub url: String,
}

/// `POST /api/open`: reads the multipart field `file` as UTF-8 text.
pub(crate) async fn open_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Json<Reply<OpenedFile>> {
    let result = match multipart {
        Ok(mut multipart) => read_upload(&mut multipart, state.config.max_upload_bytes).await,
        Err(rejection) => Err(ServerError::InvalidRequest(rejection.body_text())),
    };
    if let Ok(file) = &result {
        info!(filename = %file.filename, bytes = file.content.len(), "file opened");
    }
    Reply::from_result(result, "open")
}

async fn read_upload(multipart: &mut Multipart, max_bytes: usize) -> ServerResult<OpenedFile> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::UploadFailed(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or(PLAIN_FILENAME).to_owned();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::UploadFailed(e.body_text()))?;
        if bytes.len() > max_bytes {
            return Err(ServerError::UploadFailed(format!(
                "{filename} is {} bytes, limit is {max_bytes}",
                bytes.len()
            )));
        }
        let content = String::from_utf8(bytes.to_vec())
            .map_err(|_| ServerError::UploadFailed(format!("{filename} is not UTF-8 text")))?;

        return Ok(OpenedFile { content, filename });
    }

    Err(ServerError::InvalidRequest("missing `file` field".into()))
}

/// `POST /api/secure/save`: encrypts `content` under `password`.
pub(crate) async fn secure_save(
    State(state): State<AppState>,
    request: Result<Json<SecureRequest>, JsonRejection>,
) -> Json<Reply<SealedFile>> {
    let result = match request {
        Ok(Json(request)) => {
            let cipher = state.cipher.clone();
            run_blocking(move || Ok(cipher.seal_text(&request.content, &request.password)?))
                .await
                .map(|encrypted_data| SealedFile {
                    encrypted_data,
                    filename: SECURE_FILENAME.to_owned(),
                })
        }
        Err(rejection) => Err(ServerError::InvalidRequest(rejection.body_text())),
    };
    Reply::from_result(result, "secure save")
}

/// `POST /api/secure/open`: decrypts `content` with `password`.
pub(crate) async fn secure_open(
    request: Result<Json<SecureRequest>, JsonRejection>,
) -> Json<Reply<OpenedText>> {
    let result = match request {
        Ok(Json(request)) => {
            run_blocking(move || Ok(open_text(&request.content, &request.password)?))
                .await
                .map(|content| OpenedText { content })
        }
        Err(rejection) => Err(ServerError::InvalidRequest(rejection.body_text())),
    };
    Reply::from_result(result, "secure open")
}

/// Runs CPU-heavy key derivation off the async workers.
async fn run_blocking<T, F>(f: F) -> ServerResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> ServerResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
}

/// `POST /api/login`: stamps `{site, user}` into a redirect URL.
///
/// Purely cosmetic: no credentials are checked or stored.
pub(crate) async fn login(
    request: Result<Json<LoginRequest>, JsonRejection>,
) -> Json<Reply<Redirect>> {
    let result = request
        .map_err(|rejection| ServerError::InvalidRequest(rejection.body_text()))
        .and_then(|Json(request)| redirect_for(&request));
    Reply::from_result(result, "login")
}

fn redirect_for(request: &LoginRequest) -> ServerResult<Redirect> {
    let non_empty = |value: &Option<String>, name: &str| -> ServerResult<String> {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| ServerError::InvalidRequest(format!("`{name}` is required")))
    };
    let site = non_empty(&request.site, "site")?;
    let user = non_empty(&request.user, "user")?;

    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("user", &user)
        .append_pair("site", &site)
        .finish();
    info!(%user, %site, "simulated login");
    Ok(Redirect {
        url: format!("/success?{query}"),
    })
}

/// `GET /success`: plain-text landing page for the login redirect.
pub(crate) async fn landing(Query(request): Query<LoginRequest>) -> String {
    let user = request.user.as_deref().unwrap_or("guest");
    let site = request.site.as_deref().unwrap_or("padsync");
    format!("Signed in as {user} on {site}.")
}

/// `GET /api/status`: engine counters.
pub(crate) async fn status(State(state): State<AppState>) -> Json<Reply<EngineStats>> {
    Json(Reply::Success(state.engine.stats()))
}

/// `POST /api/exit`: asks the server to stop. Safe to call repeatedly.
pub(crate) async fn exit(State(state): State<AppState>) -> Json<Reply<Done>> {
    state.shutdown.trigger();
    Json(Reply::Success(Done {}))
}
