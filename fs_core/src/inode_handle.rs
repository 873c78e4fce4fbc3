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

//! Component C5: binds an inode number to the block layer (spec §4.5).
//!
//! Unlike the teacher's `Ext2INode`, which is a long-lived handle cached
//! by the VFS, this layer has no identity of its own beyond the inode
//! number: every operation is a fresh load-mutate-store, matching the
//! original's "load, act, store" pattern directly (there is no
//! in-memory cache to invalidate).

use crate::cluster::DfsCluster;
use crate::error::Result;
use crate::inode::{Inode, INODE_RECORD_SIZE};

/// Asserts `n` is a plausible inode number. Out-of-range is a
/// programming error (spec §7), not a recoverable condition.
fn check_range(cluster: &DfsCluster, n: u32) {
    assert!(
        n < cluster.layout().max_num_inodes,
        "inode number {n} out of range (max {})",
        cluster.layout().max_num_inodes
    );
}

/// Loads and decodes inode `n` (spec §4.5 `Load`).
pub fn load(cluster: &DfsCluster, n: u32) -> Result<Inode> {
    check_range(cluster, n);
    let (block, byte) = cluster.layout().inode_location(n);
    let bytes = cluster.read_block(block)?;
    Ok(Inode::decode(&bytes[byte..byte + INODE_RECORD_SIZE]))
}

/// Read-modify-write of inode `n`'s containing block (spec §4.5 `Store`).
pub fn store(cluster: &DfsCluster, n: u32, inode: &Inode) -> Result<()> {
    check_range(cluster, n);
    let (block, byte) = cluster.layout().inode_location(n);
    let mut bytes = cluster.read_block(block)?;
    bytes[byte..byte + INODE_RECORD_SIZE].copy_from_slice(&inode.encode());
    cluster.write_block(block, &bytes)
}

/// Logical data block holding byte `off` of `inode`'s content, i.e.
/// `inode.blocks[off / BLOCK_SIZE]` (spec §4.5 `BlockAtOffset`). Returns
/// `0` ("unallocated") verbatim rather than allocating.
pub fn block_at_offset(cluster: &DfsCluster, inode: &Inode, off: u32) -> u32 {
    let idx = (off / cluster.layout().block_size) as usize;
    inode.blocks[idx]
}
