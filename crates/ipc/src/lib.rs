//! Host-interface wire contracts.
//!
//! The command transport itself lives outside the processing core;
//! this crate pins down only the formats both sides must agree on:
//! the 8-byte command header, the reply frame carrying a negative
//! errno, the configuration-blob ABI header, and the packed trace
//! entry the host-side log reader decodes.

#![cfg_attr(not(test), no_std)]

pub mod abi;
pub mod header;
pub mod trace;

pub use abi::{AbiVersion, BlobHeader};
pub use header::{errno, CommandHeader, Reply, COMMAND_HEADER_BYTES, REPLY_BYTES};
pub use trace::{DictEntry, TraceEntry, TraceLevel, MAX_TRACE_PARAMS, TRACE_ENTRY_MAX_BYTES};
