pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::engine::{CacheStats, EVICTION_REASON, FreqCache};
pub use crate::error::CacheError;
pub use crate::event::{CacheEvent, EventBus, EventKind, SubscriberId};
pub use crate::freq_index::{EntryId, FreqIndex};
pub use crate::processor::{Request, RequestProcessor, Response};
