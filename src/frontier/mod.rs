//! Frontier discovery: finding item URLs on an infinitely scrolling listing
//!
//! A [`RenderSession`] drives a scriptable browser; the [`DiscoveryLoop`]
//! scrolls it, watches the rendered item count and page extent, and
//! enqueues every item URL the [`DedupCache`] has not seen before.

mod chromium;
mod dedup;
mod discovery;
mod session;

pub use chromium::ChromiumSession;
pub use dedup::DedupCache;
pub use discovery::{DiscoveryLoop, DiscoveryReport, TerminationReason};
pub use session::{within, RenderSession};
