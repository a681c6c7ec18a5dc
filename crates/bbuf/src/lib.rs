//! Cluster-wide bounded buffer.
//!
//! [`BoundedBuffer`] is a fixed-capacity circular queue whose mutual exclusion,
//! blocking waits and state are all provided by a coordination service
//! ([`bbuf_coord::Coordinator`]). Producers and consumers in independent
//! processes hand values off through it without sharing memory, and a producer
//! never overruns the capacity.
//!
//! ```text
//! put(v):  lock → while full  { await notFull  } → signal notEmpty → push → unlock
//! take():  lock → while empty { await notEmpty } → signal notFull  → pop  → unlock
//! ```
//!
//! The ring update is the last coordination call, and the release always
//! happens in the drop of a scoped guard. A failing call therefore leaves the
//! lock free and the ring as it was.
//!
//! # Example
//!
//! ```rust
//! use bbuf::BoundedBuffer;
//! use bbuf_coord_mem::MemCoordinator;
//!
//! let coord = MemCoordinator::new();
//! let buffer = BoundedBuffer::<&str, _>::new(&coord, 2)?;
//! buffer.put("espresso")?;
//! buffer.put("lungo")?;
//! assert!(buffer.is_full()?);
//! assert_eq!(buffer.take()?, "espresso");
//! # Ok::<(), bbuf::BufferError>(())
//! ```

mod buffer;
mod config;
mod error;
pub mod ring;

pub use buffer::*;
pub use config::*;
pub use error::*;
pub use ring::{Occupancy, Ring, RingStatus};
