//! lc-channel: the segmentation-and-broadcast pipeline.
//!
//! Data flows leaf to root:
//!
//! ```text
//! ContentSelector -> Segmenter -> SourceChain -> PrefetchStream
//!     -> BroadcastScheduler -> ClientRegistry queues -> HTTP delivery
//! ```
//!
//! - [`ContentSelector`] picks a random file from an allow-listed group of the
//!   content library, retrying until one is found.
//! - [`Segmenter`] plans fixed-duration cuts of a source and converts them in
//!   bounded waves with a per-conversion timeout.
//! - [`SourceChain`] flattens "select, segment, repeat" into an endless
//!   sequence, abandoning a source on the first failed conversion.
//! - [`PrefetchStream`] hides transcode latency behind a lookahead cache with
//!   a single-flight background refill.
//! - [`ClientRegistry`] owns the per-session delivery queues and the latest
//!   broadcast segment.
//! - [`BroadcastScheduler`] is the master clock: one segment per tick, paced
//!   by the segment's real duration.

pub mod channel;
pub mod prefetch;
pub mod registry;
pub mod scheduler;
pub mod segmenter;
pub mod selector;
pub mod source_chain;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use channel::Channel;
pub use prefetch::PrefetchStream;
pub use registry::{ClientRegistry, SessionQueue};
pub use scheduler::BroadcastScheduler;
pub use segmenter::{segment_offsets, Fragmentation, Segmenter};
pub use selector::ContentSelector;
pub use source_chain::SourceChain;
