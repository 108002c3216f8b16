//! HTTP client for the snippet host REST surface.

#![allow(missing_docs)]

use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use smol_str::SmolStr;

use phpad_session::RemoteSnippetRef;

use crate::error::RemoteError;
use crate::payload::SnippetPayload;

const ACCEPT_HEADER: &str = "application/vnd.github+json";
const API_VERSION_HEADER: &str = "2022-11-28";

/// Identity the credential authorizes, fetched at authentication time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub login: SmolStr,
    #[serde(default)]
    pub avatar_url: String,
}

/// One entry of the caller's snippet listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetSummary {
    pub id: SmolStr,
    pub description: String,
    /// Non-reserved file names in host key order.
    pub file_names: Vec<SmolStr>,
    pub updated_at: Option<String>,
    /// True when the snippet carries the reserved metadata file (it was
    /// saved by this playground).
    pub has_metadata: bool,
}

/// A fetched snippet together with its resolved revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedSnippet {
    pub reference: RemoteSnippetRef,
    pub payload: SnippetPayload,
}

/// Bearer-authenticated client for snippet create/update/fetch/list.
pub struct GistClient {
    agent: ureq::Agent,
    api_base: String,
    metadata_file: String,
    credential: Option<String>,
}

impl std::fmt::Debug for GistClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GistClient")
            .field("api_base", &self.api_base)
            .field("authenticated", &self.credential.is_some())
            .finish()
    }
}

impl GistClient {
    #[must_use]
    pub fn new(api_base: impl Into<String>, metadata_file: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .timeout_read(Duration::from_secs(15))
            .build();
        Self {
            agent,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            metadata_file: metadata_file.into(),
            credential: None,
        }
    }

    /// Restore a previously persisted credential without re-validating it.
    pub fn set_credential(&mut self, token: impl Into<String>) {
        self.credential = Some(token.into());
    }

    pub fn clear_credential(&mut self) {
        self.credential = None;
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    /// Validate a user-supplied access credential by fetching the identity it
    /// authorizes. On success the credential is kept for subsequent calls;
    /// the caller persists it.
    pub fn authenticate(&mut self, token: &str) -> Result<Identity, RemoteError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(RemoteError::InvalidCredential);
        }
        let url = format!("{}/user", self.api_base);
        let response = self
            .agent
            .get(&url)
            .set("Authorization", &format!("Bearer {token}"))
            .set("Accept", ACCEPT_HEADER)
            .call();
        let body = match response {
            Ok(response) => read_body(response)?,
            Err(ureq::Error::Status(401 | 403, _)) => return Err(RemoteError::InvalidCredential),
            Err(err) => return Err(map_error(err)),
        };
        let identity: Identity = serde_json::from_str(&body)
            .map_err(|err| RemoteError::MalformedResponse(err.to_string()))?;
        tracing::info!(login = %identity.login, "authenticated against snippet host");
        self.credential = Some(token.to_string());
        Ok(identity)
    }

    /// Create a new snippet. Requires a stored credential.
    pub fn create(&self, payload: &SnippetPayload) -> Result<RemoteSnippetRef, RemoteError> {
        let token = self.require_credential()?;
        let url = format!("{}/gists", self.api_base);
        let body = upload_body(payload);
        let response = self
            .authorized(self.agent.post(&url), token)
            .send_string(&body.to_string());
        let text = unwrap_response(response, None)?;
        parse_reference(&text)
    }

    /// Update an existing snippet in place, creating a new revision.
    pub fn update(
        &self,
        reference: &RemoteSnippetRef,
        payload: &SnippetPayload,
    ) -> Result<RemoteSnippetRef, RemoteError> {
        let token = self.require_credential()?;
        let url = format!("{}/gists/{}", self.api_base, reference.id);
        let body = upload_body(payload);
        let response = self
            .authorized(self.agent.request("PATCH", &url), token)
            .send_string(&body.to_string());
        let text = unwrap_response(response, Some(&reference.id))?;
        parse_reference(&text)
    }

    /// Fetch a snippet by id and optional revision. Works unauthenticated;
    /// the credential, when present, also grants access to secret snippets.
    pub fn fetch(
        &self,
        id: &str,
        revision: Option<&str>,
    ) -> Result<FetchedSnippet, RemoteError> {
        let url = match revision {
            Some(revision) => format!("{}/gists/{id}/{revision}", self.api_base),
            None => format!("{}/gists/{id}", self.api_base),
        };
        let mut request = self.agent.get(&url).set("Accept", ACCEPT_HEADER);
        if let Some(token) = &self.credential {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
        let text = unwrap_response(request.call(), Some(id))?;
        let record: GistRecord = serde_json::from_str(&text)
            .map_err(|err| RemoteError::MalformedResponse(err.to_string()))?;

        let reference = RemoteSnippetRef::new(
            record.id.as_str(),
            record
                .history
                .first()
                .map(|entry| SmolStr::new(&entry.version)),
        );
        let payload = SnippetPayload {
            description: record.description.unwrap_or_default(),
            public: record.public,
            files: record
                .files
                .into_iter()
                .map(|(name, file)| (SmolStr::new(name), file.content))
                .collect(),
        };
        Ok(FetchedSnippet { reference, payload })
    }

    /// List the caller's snippets, newest first as returned by the host.
    pub fn list(&self) -> Result<Vec<SnippetSummary>, RemoteError> {
        let token = self.require_credential()?;
        let url = format!("{}/gists?per_page=100", self.api_base);
        let response = self.authorized(self.agent.get(&url), token).call();
        let text = unwrap_response(response, None)?;
        let records: Vec<GistRecord> = serde_json::from_str(&text)
            .map_err(|err| RemoteError::MalformedResponse(err.to_string()))?;
        Ok(records
            .into_iter()
            .map(|record| {
                let has_metadata = record.files.contains_key(self.metadata_file.as_str());
                SnippetSummary {
                    id: SmolStr::new(&record.id),
                    description: record.description.unwrap_or_default(),
                    file_names: record
                        .files
                        .keys()
                        .filter(|name| name.as_str() != self.metadata_file)
                        .map(|name| SmolStr::new(name))
                        .collect(),
                    updated_at: record.updated_at,
                    has_metadata,
                }
            })
            .collect())
    }

    fn require_credential(&self) -> Result<&str, RemoteError> {
        self.credential
            .as_deref()
            .ok_or(RemoteError::NotAuthenticated)
    }

    fn authorized(&self, request: ureq::Request, token: &str) -> ureq::Request {
        request
            .set("Authorization", &format!("Bearer {token}"))
            .set("Accept", ACCEPT_HEADER)
            .set("X-GitHub-Api-Version", API_VERSION_HEADER)
            .set("Content-Type", "application/json")
    }
}

#[derive(Debug, Deserialize)]
struct GistRecord {
    id: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    public: bool,
    #[serde(default)]
    files: IndexMap<String, GistFileBody>,
    #[serde(default)]
    history: Vec<GistHistoryEntry>,
    #[serde(default)]
    updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GistFileBody {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct GistHistoryEntry {
    version: String,
}

fn upload_body(payload: &SnippetPayload) -> serde_json::Value {
    let files: serde_json::Map<String, serde_json::Value> = payload
        .files
        .iter()
        .map(|(name, content)| (name.to_string(), json!({ "content": content })))
        .collect();
    json!({
        "description": payload.description,
        "public": payload.public,
        "files": files,
    })
}

fn parse_reference(text: &str) -> Result<RemoteSnippetRef, RemoteError> {
    let record: GistRecord =
        serde_json::from_str(text).map_err(|err| RemoteError::MalformedResponse(err.to_string()))?;
    Ok(RemoteSnippetRef::new(
        record.id.as_str(),
        record
            .history
            .first()
            .map(|entry| SmolStr::new(&entry.version)),
    ))
}

fn unwrap_response(
    response: Result<ureq::Response, ureq::Error>,
    id: Option<&str>,
) -> Result<String, RemoteError> {
    match response {
        Ok(response) => read_body(response),
        Err(ureq::Error::Status(404, _)) => Err(RemoteError::NotFound {
            id: SmolStr::new(id.unwrap_or("")),
        }),
        Err(err) => Err(map_error(err)),
    }
}

fn read_body(response: ureq::Response) -> Result<String, RemoteError> {
    response
        .into_string()
        .map_err(|err| RemoteError::Network(err.to_string()))
}

fn map_error(err: ureq::Error) -> RemoteError {
    match err {
        ureq::Error::Status(status, response) => {
            let message = response
                .into_string()
                .ok()
                .and_then(|body| {
                    serde_json::from_str::<serde_json::Value>(&body)
                        .ok()
                        .and_then(|value| {
                            value
                                .get("message")
                                .and_then(|m| m.as_str())
                                .map(str::to_string)
                        })
                })
                .unwrap_or_default();
            RemoteError::Api { status, message }
        }
        other => RemoteError::Network(other.to_string()),
    }
}
