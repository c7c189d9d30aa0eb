//! HTTP client implementing [`StorageGateway`] against the JSON API.

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use slicefold_core::{ObjectPath, ObjectRef};
use tracing::{debug, trace};

use super::config::GcsConfig;
use super::model::{ComposeRequest, Destination, ErrorResponse, ListResponse, ObjectResource};
use crate::error::{StorageError, StorageResult};
use crate::gateway::StorageGateway;

/// Characters left unescaped in a bucket or object path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Cloud Storage gateway over the JSON API.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct GcsGateway {
    client: Client,
    config: GcsConfig,
}

impl GcsGateway {
    /// Create a gateway from an explicit configuration.
    ///
    /// # Errors
    /// Returns [`StorageError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: GcsConfig) -> StorageResult<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        debug!(endpoint = %config.endpoint, "created GcsGateway");
        Ok(Self { client, config })
    }

    /// Returns a reference to the gateway configuration.
    #[must_use]
    pub fn config(&self) -> &GcsConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // URL construction
    // -----------------------------------------------------------------------

    fn endpoint(&self) -> &str {
        self.config.endpoint.trim_end_matches('/')
    }

    fn parse_url(&self, raw: &str) -> StorageResult<Url> {
        let mut url = Url::parse(raw)
            .map_err(|e| anyhow::anyhow!("invalid storage URL {raw}: {e}"))?;
        if let Some(project) = &self.config.user_project {
            url.query_pairs_mut().append_pair("userProject", project);
        }
        Ok(url)
    }

    pub(crate) fn object_url(&self, path: &ObjectPath, suffix: &str) -> StorageResult<Url> {
        self.parse_url(&format!(
            "{}/storage/v1/b/{}/o/{}{suffix}",
            self.endpoint(),
            utf8_percent_encode(path.bucket(), PATH_SEGMENT),
            utf8_percent_encode(path.name(), PATH_SEGMENT),
        ))
    }

    pub(crate) fn list_url(
        &self,
        prefix: &ObjectPath,
        page_token: Option<&str>,
    ) -> StorageResult<Url> {
        let mut url = self.parse_url(&format!(
            "{}/storage/v1/b/{}/o",
            self.endpoint(),
            utf8_percent_encode(prefix.bucket(), PATH_SEGMENT),
        ))?;
        {
            let mut query = url.query_pairs_mut();
            if !prefix.name().is_empty() {
                query.append_pair("prefix", prefix.name());
            }
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }
        Ok(url)
    }

    pub(crate) fn upload_url(&self, path: &ObjectPath) -> StorageResult<Url> {
        let mut url = self.parse_url(&format!(
            "{}/upload/storage/v1/b/{}/o",
            self.endpoint(),
            utf8_percent_encode(path.bucket(), PATH_SEGMENT),
        ))?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", path.name());
        Ok(url)
    }

    // -----------------------------------------------------------------------
    // Request plumbing
    // -----------------------------------------------------------------------

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        trace!(%method, %url, "storage request");
        let builder = self.client.request(method, url);
        match &self.config.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, path: &ObjectPath) -> StorageResult<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(map_status(status, &body, path))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        path: &ObjectPath,
    ) -> StorageResult<T> {
        let response = self.send(builder, path).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Translate a non-success response into a [`StorageError`].
pub(crate) fn map_status(status: StatusCode, body: &str, path: &ObjectPath) -> StorageError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_owned());

    match status {
        StatusCode::NOT_FOUND => StorageError::NotFound { path: path.clone() },
        StatusCode::TOO_MANY_REQUESTS => StorageError::RateLimited { path: path.clone() },
        _ => StorageError::Status {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl StorageGateway for GcsGateway {
    fn max_compose_inputs(&self) -> usize {
        self.config.max_compose_inputs
    }

    async fn create_empty(&self, path: &ObjectPath) -> StorageResult<ObjectRef> {
        let builder = self
            .request(Method::POST, self.upload_url(path)?)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(Vec::new());
        let resource: ObjectResource = self.send_json(builder, path).await?;
        let object = ObjectRef::try_from(resource)?;
        debug!(path = %path, generation = ?object.generation, "created empty object");
        Ok(object)
    }

    async fn compose(
        &self,
        target: &ObjectPath,
        inputs: &[ObjectRef],
    ) -> StorageResult<ObjectRef> {
        if inputs.len() > self.config.max_compose_inputs {
            return Err(StorageError::InvalidInputCount {
                target: target.clone(),
                count: inputs.len(),
                limit: self.config.max_compose_inputs,
            });
        }
        if let Some(foreign) = inputs.iter().find(|i| i.path.bucket() != target.bucket()) {
            return Err(StorageError::CrossBucket {
                target: target.clone(),
                source_path: foreign.path.clone(),
            });
        }

        let body = ComposeRequest {
            source_objects: inputs.iter().map(Into::into).collect(),
            destination: Destination::default(),
        };
        let builder = self
            .request(Method::POST, self.object_url(target, "/compose")?)
            .json(&body);
        let resource: ObjectResource = self.send_json(builder, target).await?;
        let object = ObjectRef::try_from(resource)?;
        debug!(
            object = %target,
            inputs = inputs.len(),
            size = object.size,
            "composed object"
        );
        Ok(object)
    }

    async fn delete(&self, object: &ObjectRef) -> StorageResult<()> {
        let builder = self.request(Method::DELETE, self.object_url(&object.path, "")?);
        self.send(builder, &object.path).await?;
        trace!(path = %object.path, "deleted object");
        Ok(())
    }

    async fn list(&self, prefix: &ObjectPath) -> StorageResult<Vec<ObjectRef>> {
        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let url = self.list_url(prefix, page_token.as_deref())?;
            let page: ListResponse = self
                .send_json(self.request(Method::GET, url), prefix)
                .await?;
            for item in page.items {
                objects.push(ObjectRef::try_from(item)?);
            }
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        debug!(prefix = %prefix, count = objects.len(), "listed objects");
        Ok(objects)
    }
}
