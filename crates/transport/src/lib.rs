//! # Transport
//!
//! In-memory reference implementation of the stream transport: a sharded
//! log with asynchronous put delivery, per-shard readers, and a checkpoint
//! store with lease semantics.
//!
//! The real engineering content of this workspace (rate-governed emission,
//! checkpointed shard processing) treats the transport as an external
//! collaborator; this crate exists so the whole system can run and be
//! tested in one process, with fault injection where the tests need it.

mod checkpoint_store;
mod reader;
mod stream;

pub use checkpoint_store::{InMemoryCheckpointStore, StoreCheckpointer};
pub use reader::{ReaderOptions, ShardReader, ShardReaderHandle};
pub use stream::{InMemoryStream, InMemoryStreamBuilder, StreamFaults};
