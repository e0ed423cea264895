use color_eyre::{eyre::eyre, Result};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::resource::TodoResource;
use super::types::{NewTodo, OwnerId, Todo, TodoPatch};
use crate::config::ApiConfig;
use crate::error::{SyncError, SyncResult};

/// HTTP client for the remote `/todos` collection
#[derive(Clone)]
pub struct TodoClient {
  http: reqwest::Client,
  base_url: Url,
}

/// Body of a PUT: the patch plus the owner it belongs to.
#[derive(Serialize)]
struct UpdateBody<'a> {
  #[serde(rename = "userId")]
  owner_id: &'a OwnerId,
  #[serde(flatten)]
  patch: &'a TodoPatch,
}

impl TodoClient {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let base_url = parse_base_url(&config.base_url)?;

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .user_agent(concat!("todo-sync/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base_url })
  }
}

/// Parse the configured base URL, making sure relative joins land under it.
pub fn parse_base_url(raw: &str) -> Result<Url> {
  let mut raw = raw.trim().to_string();
  if !raw.ends_with('/') {
    raw.push('/');
  }
  let url = Url::parse(&raw).map_err(|e| eyre!("Invalid API base URL {}: {}", raw, e))?;
  if url.cannot_be_a_base() {
    return Err(eyre!("Invalid API base URL {}: not a base URL", raw));
  }
  Ok(url)
}

fn join(base: &Url, path: &str) -> SyncResult<Url> {
  base
    .join(path)
    .map_err(|e| SyncError::network(format!("Invalid request URL {}: {}", path, e)))
}

/// `GET todos?userId={owner}`
pub fn list_url(base: &Url, owner: &OwnerId) -> SyncResult<Url> {
  let mut url = join(base, "todos")?;
  url.query_pairs_mut().append_pair("userId", owner.as_str());
  Ok(url)
}

/// `todos`
pub fn collection_url(base: &Url) -> SyncResult<Url> {
  join(base, "todos")
}

/// `todos/{id}`
pub fn item_url(base: &Url, id: u64) -> SyncResult<Url> {
  join(base, &format!("todos/{}", id))
}

/// Map non-success statuses onto the error taxonomy.
///
/// A 404 on an item request means the todo does not exist server-side.
fn check_status(response: Response, id: Option<u64>) -> SyncResult<Response> {
  let status = response.status();
  if status == StatusCode::NOT_FOUND {
    if let Some(id) = id {
      return Err(SyncError::NotFound { id });
    }
  }
  if !status.is_success() {
    return Err(SyncError::Network {
      message: format!("{} returned {}", response.url(), status),
      status: Some(status.as_u16()),
    });
  }
  Ok(response)
}

async fn decode<T: DeserializeOwned>(response: Response) -> SyncResult<T> {
  let bytes = response.bytes().await?;
  serde_json::from_slice(&bytes).map_err(|e| SyncError::Decode(e.to_string()))
}

impl TodoResource for TodoClient {
  async fn list(&self, owner: &OwnerId) -> SyncResult<Vec<Todo>> {
    let url = list_url(&self.base_url, owner)?;
    debug!(%url, "GET");

    let response = self.http.get(url).send().await?;
    decode(check_status(response, None)?).await
  }

  async fn list_all(&self) -> SyncResult<Vec<Todo>> {
    let url = collection_url(&self.base_url)?;
    debug!(%url, "GET");

    let response = self.http.get(url).send().await?;
    decode(check_status(response, None)?).await
  }

  async fn create(&self, todo: &NewTodo) -> SyncResult<Todo> {
    let url = collection_url(&self.base_url)?;
    debug!(%url, "POST");

    let response = self.http.post(url).json(todo).send().await?;
    decode(check_status(response, None)?).await
  }

  async fn update(&self, owner: &OwnerId, patch: &TodoPatch) -> SyncResult<Todo> {
    let url = item_url(&self.base_url, patch.id)?;
    debug!(%url, "PUT");

    let body = UpdateBody {
      owner_id: owner,
      patch,
    };
    let response = self.http.put(url).json(&body).send().await?;
    decode(check_status(response, Some(patch.id))?).await
  }

  async fn delete(&self, id: u64) -> SyncResult<()> {
    let url = item_url(&self.base_url, id)?;
    debug!(%url, "DELETE");

    let response = self.http.delete(url).send().await?;
    check_status(response, Some(id))?;
    Ok(())
  }
}
