//! reqwest-backed API client.

use async_trait::async_trait;
use bytes::BytesMut;
use edgehold_types::{
    ApiError, KindDescriptor, ResourceKind, ResourceObject, WatchEvent, WatchEventType,
};
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::{ListParams, ObjectList, ResourceApi, WatchStream};
use crate::error::{AppError, AppResult};

const REQUEST_TIMEOUT_SECS: u64 = 30;
const WATCH_TIMEOUT_SECS: u64 = 300;

pub struct HttpResourceApi {
    client: Client,
    base_url: String,
    bearer_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StatusBody {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: u16,
}

#[derive(Debug, Deserialize)]
struct ListBody {
    #[serde(default)]
    metadata: ListMeta,
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListMeta {
    #[serde(default)]
    resource_version: String,
}

#[derive(Debug, Deserialize)]
struct RawWatchEvent {
    #[serde(rename = "type")]
    event_type: String,
    object: Value,
}

impl HttpResourceApi {
    pub fn new(
        base_url: impl Into<String>,
        bearer_token: Option<String>,
        connect_timeout: Duration,
    ) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;
        Ok(Self::with_client(client, base_url, bearer_token))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, bearer_token: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url, bearer_token }
    }

    fn path(&self, desc: &KindDescriptor, namespace: Option<&str>, name: Option<&str>) -> String {
        let prefix = if desc.group.is_empty() {
            format!("{}/api/{}", self.base_url, desc.version)
        } else {
            format!("{}/apis/{}/{}", self.base_url, desc.group, desc.version)
        };
        let mut url = match namespace {
            Some(ns) if desc.namespaced => format!("{prefix}/namespaces/{ns}/{}", desc.plural),
            _ => format!("{prefix}/{}", desc.plural),
        };
        if let Some(name) = name {
            url.push('/');
            url.push_str(name);
        }
        url
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.bearer_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn selector_query(params: &ListParams) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(labels) = &params.label_selector {
            query.push(("labelSelector", labels.clone()));
        }
        if let Some(fields) = &params.field_selector {
            query.push(("fieldSelector", fields.clone()));
        }
        query
    }

    /// Turn a non-success response into a typed error.
    async fn check(resp: Response, kind: ResourceKind, name: &str) -> AppResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body: StatusBody = resp.json().await.unwrap_or_default();
        let message = if body.message.is_empty() { status.to_string() } else { body.message };
        Err(ApiError::from_status(status.as_u16(), &body.reason, message, kind.as_str(), name).into())
    }

    async fn decode_object(resp: Response, kind: ResourceKind) -> AppResult<ResourceObject> {
        let value: Value = resp.json().await?;
        let mut obj = ResourceObject::try_from(value)?;
        obj.stamp_type_meta(kind);
        Ok(obj)
    }

    async fn write(
        &self,
        req: RequestBuilder,
        kind: ResourceKind,
        obj: &ResourceObject,
    ) -> AppResult<ResourceObject> {
        let resp = self
            .authorized(req)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .json(obj.as_value())
            .send()
            .await?;
        let resp = Self::check(resp, kind, obj.name()).await?;
        Self::decode_object(resp, kind).await
    }
}

/// Decode one newline-delimited watch frame. Bookmarks yield `None`.
fn decode_watch_line(line: &[u8], kind: ResourceKind) -> AppResult<Option<WatchEvent>> {
    let raw: RawWatchEvent = serde_json::from_slice(line)?;
    let event_type = match raw.event_type.as_str() {
        "ADDED" => WatchEventType::Added,
        "MODIFIED" => WatchEventType::Modified,
        "DELETED" => WatchEventType::Deleted,
        "BOOKMARK" => return Ok(None),
        "ERROR" => {
            let status: StatusBody = serde_json::from_value(raw.object).unwrap_or_default();
            return Err(ApiError::Status { code: status.code, message: status.message }.into());
        },
        other => {
            return Err(ApiError::Decode { message: format!("unknown watch event type {other}") }.into())
        },
    };
    let mut object = ResourceObject::try_from(raw.object)?;
    object.stamp_type_meta(kind);
    Ok(Some(WatchEvent { event_type, object }))
}

#[async_trait]
impl ResourceApi for HttpResourceApi {
    async fn list(&self, kind: ResourceKind, params: &ListParams) -> AppResult<ObjectList> {
        let desc = kind.descriptor();
        let resp = self
            .authorized(self.client.get(self.path(desc, None, None)))
            .query(&Self::selector_query(params))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .send()
            .await?;
        let resp = Self::check(resp, kind, desc.plural).await?;
        let body: ListBody = resp.json().await?;

        let mut items = Vec::with_capacity(body.items.len());
        for raw in body.items {
            match ResourceObject::try_from(raw) {
                Ok(mut obj) => {
                    obj.stamp_type_meta(kind);
                    items.push(obj);
                },
                Err(e) => tracing::warn!(%kind, "Skipping malformed list item: {}", e),
            }
        }
        Ok(ObjectList { items, resource_version: body.metadata.resource_version })
    }

    async fn watch(
        &self,
        kind: ResourceKind,
        params: &ListParams,
        resource_version: &str,
    ) -> AppResult<WatchStream> {
        let desc = kind.descriptor();
        let mut query = Self::selector_query(params);
        query.push(("watch", "1".to_string()));
        query.push(("allowWatchBookmarks", "true".to_string()));
        query.push(("timeoutSeconds", WATCH_TIMEOUT_SECS.to_string()));
        if !resource_version.is_empty() {
            query.push(("resourceVersion", resource_version.to_string()));
        }

        let resp = self
            .authorized(self.client.get(self.path(desc, None, None)))
            .query(&query)
            .send()
            .await?;
        let resp = Self::check(resp, kind, desc.plural).await?;
        let mut bytes = resp.bytes_stream();

        let stream = async_stream::stream! {
            let mut buf = BytesMut::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(AppError::from(e));
                        return;
                    }
                };
                buf.extend_from_slice(&chunk);
                while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                    let line = buf.split_to(pos + 1);
                    let line = &line[..pos];
                    if line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    match decode_watch_line(line, kind) {
                        Ok(Some(event)) => yield Ok(event),
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }

    async fn get(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> AppResult<ResourceObject> {
        let url = self.path(kind.descriptor(), namespace, Some(name));
        let resp = self
            .authorized(self.client.get(url))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .send()
            .await?;
        let resp = Self::check(resp, kind, name).await?;
        Self::decode_object(resp, kind).await
    }

    async fn create(&self, kind: ResourceKind, obj: &ResourceObject) -> AppResult<ResourceObject> {
        let url = self.path(kind.descriptor(), obj.namespace(), None);
        self.write(self.client.post(url), kind, obj).await
    }

    async fn replace(&self, kind: ResourceKind, obj: &ResourceObject) -> AppResult<ResourceObject> {
        let url = self.path(kind.descriptor(), obj.namespace(), Some(obj.name()));
        self.write(self.client.put(url), kind, obj).await
    }

    async fn replace_status(
        &self,
        kind: ResourceKind,
        obj: &ResourceObject,
    ) -> AppResult<ResourceObject> {
        let url = format!("{}/status", self.path(kind.descriptor(), obj.namespace(), Some(obj.name())));
        self.write(self.client.put(url), kind, obj).await
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> AppResult<()> {
        let url = self.path(kind.descriptor(), namespace, Some(name));
        let resp = self
            .authorized(self.client.delete(url))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .send()
            .await?;
        Self::check(resp, kind, name).await?;
        Ok(())
    }
}
