//! Kubernetes-compatible API client.
//!
//! The edge pulls from the central API through [`ResourceApi`]; the center writes its
//! datastore through the same trait. Two implementations:
//!
//! - [`HttpResourceApi`] - reqwest client speaking the REST + watch protocol
//! - [`MemoryResourceApi`] - in-process API server with resourceVersions, UIDs,
//!   optimistic concurrency, status subresources and watch fan-out

mod http;
mod memory;
mod selector;

pub use http::HttpResourceApi;
pub use memory::MemoryResourceApi;
pub use selector::{Requirement, Selector};

use async_trait::async_trait;
use edgehold_types::{ResourceKind, ResourceObject, WatchEvent};
use futures::stream::BoxStream;

use crate::error::AppResult;

/// Label and field selectors for list and watch calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    pub label_selector: Option<String>,
    pub field_selector: Option<String>,
}

impl ListParams {
    pub fn labels(mut self, selector: impl Into<String>) -> Self {
        self.label_selector = Some(selector.into());
        self
    }

    pub fn fields(mut self, selector: impl Into<String>) -> Self {
        self.field_selector = Some(selector.into());
        self
    }

    /// Whether `obj` satisfies both selectors. Unparsable selectors match nothing.
    pub fn matches(&self, obj: &ResourceObject) -> bool {
        let labels_ok = match &self.label_selector {
            Some(raw) => Selector::parse(raw).is_some_and(|s| s.matches_labels(obj)),
            None => true,
        };
        let fields_ok = match &self.field_selector {
            Some(raw) => Selector::parse(raw).is_some_and(|s| s.matches_fields(obj)),
            None => true,
        };
        labels_ok && fields_ok
    }
}

/// Result of a list call.
#[derive(Debug, Clone, Default)]
pub struct ObjectList {
    pub items: Vec<ResourceObject>,
    /// Collection resourceVersion to start a watch from
    pub resource_version: String,
}

/// A live watch. Ends on server timeout or error; callers re-list.
pub type WatchStream = BoxStream<'static, AppResult<WatchEvent>>;

#[async_trait]
pub trait ResourceApi: Send + Sync {
    async fn list(&self, kind: ResourceKind, params: &ListParams) -> AppResult<ObjectList>;

    async fn watch(
        &self,
        kind: ResourceKind,
        params: &ListParams,
        resource_version: &str,
    ) -> AppResult<WatchStream>;

    async fn get(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
        name: &str,
    ) -> AppResult<ResourceObject>;

    async fn create(&self, kind: ResourceKind, obj: &ResourceObject) -> AppResult<ResourceObject>;

    /// Update the main resource. A set resourceVersion makes the write conditional.
    async fn replace(&self, kind: ResourceKind, obj: &ResourceObject) -> AppResult<ResourceObject>;

    /// Update the `status` subresource only.
    async fn replace_status(
        &self,
        kind: ResourceKind,
        obj: &ResourceObject,
    ) -> AppResult<ResourceObject>;

    async fn delete(&self, kind: ResourceKind, namespace: Option<&str>, name: &str)
        -> AppResult<()>;
}
