//! Firestore adapter implementing the `UserRepository` port.
//!
//! Talks to the Firestore REST API v1 with `reqwest`.
//! - Creates documents in the configured collection without a document id so
//!   Firestore assigns one.
//! - Reads single documents by id; a 404 maps to `Ok(None)`.
//! - Scans the collection page by page (`listDocuments`), fetching the next page
//!   only when the previous one is consumed.
//! - Provides `from_env()` wiring using `GOOGLE_APPLICATION_CREDENTIALS`,
//!   `FIRESTORE_PROJECT_ID`, `FIRESTORE_DATABASE_ID`, `FIRESTORE_COLLECTION` and
//!   `FIRESTORE_EMULATOR_HOST`.
//!
//! Notes:
//! - The domain `UserRepository` trait is synchronous. We bridge to async
//!   `reqwest` using `block_in_place` on the caller's runtime, or an owned
//!   `tokio::runtime::Runtime` when called outside one.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use domain::{CoreError, StoredUser, UserId, UserRecord, UserRepository, UserScan};
use google_auth::{ServiceAccountKey, TokenSource, DATASTORE_SCOPE};
use serde::Deserialize;
use serde_json::{json, Value};

const PRODUCTION_HOST: &str = "https://firestore.googleapis.com";
const DEFAULT_DATABASE: &str = "(default)";
const DEFAULT_COLLECTION: &str = "users";
const PAGE_SIZE: u32 = 300;
// The emulator accepts this fixed bearer token and bypasses security rules.
const EMULATOR_TOKEN: &str = "owner";

/// Where and how to reach Firestore.
#[derive(Clone, Debug)]
pub struct FirestoreConfig {
    /// Falls back to the credentials file's `project_id` when unset.
    pub project_id: Option<String>,
    pub database_id: String,
    pub collection: String,
    pub credentials_file: Option<PathBuf>,
    /// `host:port` of a local emulator; disables OAuth when set.
    pub emulator_host: Option<String>,
}

impl FirestoreConfig {
    /// Build from environment variables.
    pub fn from_env() -> Self {
        let non_empty = |name: &str| std::env::var(name).ok().filter(|s| !s.trim().is_empty());
        Self {
            project_id: non_empty("FIRESTORE_PROJECT_ID"),
            database_id: non_empty("FIRESTORE_DATABASE_ID")
                .unwrap_or_else(|| DEFAULT_DATABASE.into()),
            collection: non_empty("FIRESTORE_COLLECTION")
                .unwrap_or_else(|| DEFAULT_COLLECTION.into()),
            credentials_file: non_empty("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from),
            emulator_host: non_empty("FIRESTORE_EMULATOR_HOST"),
        }
    }
}

/// How requests are authorized.
pub enum Credentials {
    ServiceAccount(TokenSource),
    Emulator,
}

impl Credentials {
    async fn bearer(&self) -> Result<String, CoreError> {
        match self {
            Credentials::ServiceAccount(source) => source
                .access_token()
                .await
                .map_err(|e| CoreError::Repository(format!("firestore auth: {e}"))),
            Credentials::Emulator => Ok(EMULATOR_TOKEN.to_string()),
        }
    }
}

/// Repository backed by Google Cloud Firestore.
///
/// Supports both standalone mode (creates its own Tokio runtime) and server mode
/// (reuses the existing runtime via `Handle::current()`).
pub struct FirestoreRepo {
    /// `.../projects/{p}/databases/{d}/documents`
    documents_url: String,
    collection: String,
    credentials: Credentials,
    http: reqwest::Client,
    // Optional runtime - None when already running inside Tokio
    rt: Option<Arc<tokio::runtime::Runtime>>,
}

impl FirestoreRepo {
    /// Resolve credentials and project from `cfg` and build the client.
    ///
    /// Fails when no usable credentials or project id can be found; nothing is
    /// sent over the network here.
    pub fn new(cfg: FirestoreConfig) -> Result<Self, CoreError> {
        let (host, credentials, key_project) = match &cfg.emulator_host {
            Some(emu) => (format!("http://{emu}"), Credentials::Emulator, None),
            None => {
                let path = cfg.credentials_file.as_ref().ok_or_else(|| {
                    CoreError::Repository("missing GOOGLE_APPLICATION_CREDENTIALS".into())
                })?;
                let key = ServiceAccountKey::from_file(path)
                    .map_err(|e| CoreError::Repository(format!("firestore credentials: {e}")))?;
                let project = key.project_id.clone();
                let source = TokenSource::new(key, DATASTORE_SCOPE)
                    .map_err(|e| CoreError::Repository(format!("firestore credentials: {e}")))?;
                (
                    PRODUCTION_HOST.to_string(),
                    Credentials::ServiceAccount(source),
                    project,
                )
            }
        };
        let project = cfg
            .project_id
            .clone()
            .or(key_project)
            .ok_or_else(|| CoreError::Repository("missing FIRESTORE_PROJECT_ID".into()))?;
        let documents_url = format!(
            "{host}/v1/projects/{project}/databases/{}/documents",
            cfg.database_id
        );
        Self::with_credentials(documents_url, cfg.collection, credentials)
    }

    /// Construct from environment variables expected by the server (see `FirestoreConfig::from_env`).
    pub fn from_env() -> Result<Self, CoreError> {
        Self::new(FirestoreConfig::from_env())
    }

    /// Create a repo against an explicit documents root URL.
    pub fn with_credentials(
        documents_url: impl Into<String>,
        collection: impl Into<String>,
        credentials: Credentials,
    ) -> Result<Self, CoreError> {
        let collection = collection.into();
        if collection.is_empty() || collection.contains('/') {
            return Err(CoreError::Repository(format!(
                "invalid collection name '{collection}'"
            )));
        }
        Ok(Self {
            documents_url: documents_url.into().trim_end_matches('/').to_string(),
            collection,
            credentials,
            http: reqwest::Client::new(),
            rt: Self::maybe_create_runtime()?,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Check if we're inside a Tokio runtime. If yes, return None (reuse existing).
    /// If no, create a new runtime.
    fn maybe_create_runtime() -> Result<Option<Arc<tokio::runtime::Runtime>>, CoreError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            Ok(None)
        } else {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .map_err(|e| CoreError::Repository(format!("tokio runtime init: {e}")))?;
            Ok(Some(Arc::new(rt)))
        }
    }

    /// Run an async future, using either our owned runtime or the current runtime.
    fn block_on<F: std::future::Future>(&self, fut: F) -> F::Output {
        match &self.rt {
            Some(rt) => rt.block_on(fut),
            None => tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(fut)),
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.documents_url, self.collection)
    }

    fn document_url(&self, id: &UserId) -> String {
        format!(
            "{}/{}",
            self.collection_url(),
            urlencoding::encode(id.as_str())
        )
    }

    /// Fetch one page of the collection listing.
    fn fetch_page(&self, page_token: Option<&str>) -> Result<ListDocumentsPage, CoreError> {
        let url = self.collection_url();
        let fut = async {
            let bearer = self.credentials.bearer().await?;
            let mut req = self
                .http
                .get(url)
                .bearer_auth(bearer)
                .query(&[("pageSize", PAGE_SIZE.to_string())]);
            if let Some(token) = page_token {
                req = req.query(&[("pageToken", token)]);
            }
            let resp = req.send().await.map_err(map_http_err)?;
            let resp = ensure_success(resp).await?;
            resp.json::<ListDocumentsPage>().await.map_err(map_http_err)
        };
        self.block_on(fut)
    }
}

impl UserRepository for FirestoreRepo {
    fn create(&self, record: UserRecord) -> Result<UserId, CoreError> {
        let url = self.collection_url();
        let body = record_to_document(&record);
        let fut = async {
            let bearer = self.credentials.bearer().await?;
            let resp = self
                .http
                .post(url)
                .bearer_auth(bearer)
                .json(&body)
                .send()
                .await
                .map_err(map_http_err)?;
            let resp = ensure_success(resp).await?;
            resp.json::<Document>().await.map_err(map_http_err)
        };
        let doc = self.block_on(fut)?;
        document_id(&doc.name)
    }

    fn get(&self, id: &UserId) -> Result<Option<UserRecord>, CoreError> {
        let url = self.document_url(id);
        let fut = async {
            let bearer = self.credentials.bearer().await?;
            let resp = self
                .http
                .get(url)
                .bearer_auth(bearer)
                .send()
                .await
                .map_err(map_http_err)?;
            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                return Ok(None);
            }
            let resp = ensure_success(resp).await?;
            resp.json::<Document>().await.map(Some).map_err(map_http_err)
        };
        Ok(self.block_on(fut)?.map(|doc| fields_to_record(&doc.fields)))
    }

    fn scan(&self) -> UserScan<'_> {
        Box::new(DocumentScan::new(self))
    }
}

/// Lazy, paged enumeration of the collection. Ends after the last page or at
/// the first failed page fetch, which is yielded as an `Err`.
pub struct DocumentScan<'a> {
    repo: &'a FirestoreRepo,
    buffered: VecDeque<Document>,
    page_token: Option<String>,
    exhausted: bool,
}

impl<'a> DocumentScan<'a> {
    fn new(repo: &'a FirestoreRepo) -> Self {
        Self {
            repo,
            buffered: VecDeque::new(),
            page_token: None,
            exhausted: false,
        }
    }
}

impl Iterator for DocumentScan<'_> {
    type Item = Result<StoredUser, CoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(doc) = self.buffered.pop_front() {
                return Some(document_to_user(&doc));
            }
            if self.exhausted {
                return None;
            }
            match self.repo.fetch_page(self.page_token.as_deref()) {
                Ok(page) => {
                    self.buffered.extend(page.documents);
                    self.page_token = page.next_page_token.filter(|t| !t.is_empty());
                    if self.page_token.is_none() {
                        self.exhausted = true;
                    }
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct Document {
    /// Full resource name; the document id is the last path segment.
    name: String,
    #[serde(default)]
    fields: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsPage {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn map_http_err(e: reqwest::Error) -> CoreError {
    CoreError::Repository(format!("firestore error: {e}"))
}

/// Turn a non-2xx response into a repository error carrying Firestore's status.
async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, CoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let detail = match resp.json::<ErrorEnvelope>().await {
        Ok(env) => format!(
            "{} {}",
            env.error.status.unwrap_or_default(),
            env.error.message.unwrap_or_default()
        ),
        Err(_) => String::new(),
    };
    Err(CoreError::Repository(format!(
        "firestore error: HTTP {} {}",
        status.as_u16(),
        detail.trim()
    )))
}

fn document_id(name: &str) -> Result<UserId, CoreError> {
    let id = name.rsplit('/').next().unwrap_or_default();
    UserId::new(id).map_err(|e| CoreError::Repository(format!("bad document name '{name}': {e}")))
}

fn document_to_user(doc: &Document) -> Result<StoredUser, CoreError> {
    Ok(StoredUser {
        id: document_id(&doc.name)?,
        record: fields_to_record(&doc.fields),
    })
}

fn record_to_document(record: &UserRecord) -> Value {
    json!({
        "fields": {
            "name": { "stringValue": record.name },
            "email": { "stringValue": record.email },
        }
    })
}

/// Map Firestore fields onto a record. Missing or non-string fields read as
/// empty. Capitalized keys are accepted for documents written by clients that
/// store struct field names verbatim.
fn fields_to_record(fields: &HashMap<String, Value>) -> UserRecord {
    let text = |lower: &str, upper: &str| {
        fields
            .get(lower)
            .or_else(|| fields.get(upper))
            .and_then(|v| v.get("stringValue"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    UserRecord {
        name: text("name", "Name"),
        email: text("email", "Email"),
    }
}
