/*
 * Copyright 2024 Luc Lenôtre
 *
 * This file is part of Maestro.
 *
 * Maestro is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * Maestro is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
 * A PARTICULAR PURPOSE. See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * Maestro. If not, see <https://www.gnu.org/licenses/>.
 */

//! Errors a [`crate::BlockServerApi`] implementation may return.
//!
//! Per the design, only *transport*-level trouble (an unreachable peer, a
//! malformed reply) is recoverable here: an out-of-range block index is a
//! programming error and the implementation asserts instead of returning
//! one of these.

use std::io;

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, BlockServerError>;

/// Failure talking to a block server, either locally (channel closed) or
/// over the wire (connection refused, reset, malformed frame).
#[derive(Debug, thiserror::Error)]
pub enum BlockServerError {
    /// The underlying transport failed (connect/read/write).
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
    /// The peer replied with something that does not fit the protocol.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// The peer's `(de)serialize` step failed.
    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}
