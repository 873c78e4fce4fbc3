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

//! The block server's public contract (six procedures, see spec §4.1/§6).
//!
//! Both the in-process [`crate::local::LocalBlockServer`] and the
//! wire-backed [`crate::remote::RemoteBlockServer`] implement this trait,
//! so [`stripe_client`](../stripe_client) can drive either one without
//! caring which.

use crate::error::Result;

/// A single shard of the logical disk, addressed by shard-local block
/// index (not the logical block number — the caller, [`stripe_client`],
/// owns that mapping).
pub trait BlockServerApi: Send + Sync {
    /// Returns the current bytes of shard block `b`.
    fn get(&self, b: u32) -> Result<Vec<u8>>;

    /// Replaces shard block `b` with `data`. `data` is assumed to already
    /// be padded to the server's block size; the implementation does not
    /// re-pad it.
    fn put(&self, b: u32, data: &[u8]) -> Result<()>;

    /// Returns the stored checksum for shard block `b`.
    fn get_checksum(&self, b: u32) -> Result<String>;

    /// Stores `checksum` as the digest for shard block `b`.
    fn put_checksum(&self, b: u32, checksum: &str) -> Result<()>;

    /// Reads the one-shot init flag.
    fn get_flag(&self) -> Result<bool>;

    /// Sets the init flag. Monotonic: once set, stays set.
    fn set_flag(&self) -> Result<()>;

    /// Atomically swaps `data` into shard block `b` and returns the
    /// previous bytes. The only test-and-set primitive this interface
    /// exposes; used by the cluster lock (§4.7) directly against the
    /// designated lock server, bypassing striping entirely.
    fn read_set_block(&self, b: u32, data: &[u8]) -> Result<Vec<u8>>;
}
