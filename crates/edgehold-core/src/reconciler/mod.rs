//! Upstream reconciler (central side).
//!
//! Merges reports from many edge clusters into one central datastore. Each edge object is
//! stored as `{name}-{cluster}` and labelled with its cluster and edge version; a report
//! only overwrites the stored copy when its edge version is strictly newer.

mod gate;
mod report;
mod upstream;


pub use gate::{
    adapt, central_address, composite_name, edge_key, edge_name, edge_version, status_supersedes,
    supersedes, to_central, CLUSTER_ID_LABEL, EDGE_VERSION_LABEL,
};
pub use upstream::{Outcome, UpstreamReconciler};
