//! Recursive, exclusion-aware, debounced filesystem watcher (spec.md §4.7),
//! built on `notify`. The exclusion policy (`ignore`/`globset`) is the same
//! one the indexer applies during a full walk, so a file excluded from
//! indexing never reaches the debounce queue in the first place.

mod exclude;
mod notify_watcher;

pub use exclude::ExclusionPolicy;
pub use notify_watcher::NotifyWatcher;
