//! Shared State Plane: memory-mapped Host Status, Job Cache, Queue Buffer,
//! and Directory Name Buffer tables with byte-range locks (§3, §4.1).

pub mod dir_name_buffer;
pub mod host_status;
pub mod job_cache;
pub mod lock;
pub mod queue_buffer;
pub mod table;

pub use dir_name_buffer::{DirNameBuffer, DirNameBufferError};
pub use host_status::{
    Clock, ConnectStatus, HostStatusEntry, HostStatusError, HostStatusFlags, HostStatusTable,
    JobStatusSlot, SpecialFlags, SystemClock, UnsetErrorCounterOutcome,
};
pub use job_cache::{JobCache, JobCacheEntry, ProtocolType};
pub use lock::{LockError, LockGuard, LockRegion};
pub use queue_buffer::{QueueBuffer, QueueBufferEntry, PENDING};
pub use table::{MmapTable, TableError, AFD_WORD_OFFSET, TABLE_VERSION};
