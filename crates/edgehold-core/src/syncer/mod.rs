//! Resource syncer.
//!
//! Mirrors the central API into the [`LocalStore`](crate::store::LocalStore) while attached
//! and fans every change out through the
//! [`SubscriberRegistry`](crate::watch::SubscriberRegistry).
//!
//! ```text
//!  ResourceApi ──list/watch──▶ Informer ──InformerEvent──▶ KindAdapter ──▶ LocalStore
//!                              (per kind)      (mpsc)        (per kind)  └─▶ SubscriberRegistry
//! ```
//!
//! A [`SyncSession`] owns all informers and adapters of one attachment plus their stop
//! signal. It is built from scratch on every attach and discarded on detach.

mod adapter;
mod catalog;
mod informer;
mod session;


pub use adapter::{Applied, KindAdapter};
pub use catalog::{build_factories, probe, resolve_kinds, InformerFactory};
pub use informer::{DeletedObject, Informer, InformerEvent, InformerTiming};
pub use session::{SessionConfig, SyncSession};
