//! The registry decides which concrete model serves each capability class.
//!
//! Every capability class ([`CapabilityClass`](crate::capability::CapabilityClass)) has a
//! priority table: an ordered list of patterns over model identifiers, where index 0 is the
//! least preferred and the last index is the most preferred. Candidates come either from the
//! platform catalog (listing) or from a fixed list of identifiers that are called one by one
//! until one answers (probing). Listed candidates are ranked against the table; a candidate
//! takes the highest rank of any pattern it matches, and when several candidates share the
//! winning rank the first one listed wins.
//!
//! The selection is cached per capability for a fixed window and recomputed lazily on the
//! first request after it expires. When neither listing nor probing confirms a model, a
//! known-good fallback identifier is used instead, so resolution always yields something
//! callable.

mod default_priority;
pub(crate) mod model_info;
pub(crate) mod populate;
pub(crate) mod priority;
pub(crate) mod probe;
pub(crate) mod resolver;
