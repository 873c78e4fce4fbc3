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

//! On-disk layout: the fixed regions of the logical address space (spec
//! §3) and the four constants serialized into the superblock at logical
//! block 1. `FREEBITMAP_BLOCKS`/`INODE_TABLE_BLOCKS` and the region
//! offsets derived from them are computed, never stored — every client
//! computes them identically from the same four constants.

use serde::{Deserialize, Serialize};

/// Logical block holding the instance UUID and, at runtime, the cluster
/// lock byte (spec §3, §4.7).
pub const BOOT_BLOCK: u32 = 0;
/// Logical block holding the serialized [`DiskLayout`].
pub const SUPERBLOCK_BLOCK: u32 = 1;
/// First logical block of the free bitmap region.
pub const FREEBITMAP_BLOCK_OFFSET: u32 = 2;

/// Width in bytes of a directory entry's inode-number field.
pub const DIRENT_INODE_FIELD_WIDTH: usize = 4;
/// Number of direct block pointers an inode carries; there are no
/// indirect pointers in this design (spec §3).
pub const MAX_INODE_BLOCK_NUMBERS: usize = 2;

/// The four constants that make up the on-disk contract, serialized as
/// the superblock. Every other offset in the layout is derived from
/// these (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskLayout {
    pub block_size: u32,
    pub total_num_blocks: u32,
    pub max_num_inodes: u32,
    pub inode_size: u32,
}

impl Default for DiskLayout {
    /// The defaults named throughout spec.md: 128-byte blocks, 256
    /// blocks total, 16 inodes of 16 bytes each, 12-byte filenames.
    fn default() -> Self {
        Self {
            block_size: 128,
            total_num_blocks: 256,
            max_num_inodes: 16,
            inode_size: 16,
        }
    }
}

impl DiskLayout {
    /// Maximum filename length in bytes. Not part of the serialized
    /// superblock (spec §3 calls out only "the four layout constants"),
    /// but needed by the directory layer; fixed at the value spec.md
    /// gives rather than made configurable, since `MAX_FILENAME` is
    /// baked into the on-disk directory-entry width (`MAX_FILENAME + 4`).
    pub const MAX_FILENAME: usize = 12;

    /// Number of blocks occupied by the free bitmap.
    pub fn freebitmap_blocks(&self) -> u32 {
        self.total_num_blocks / self.block_size
    }

    /// Number of blocks occupied by the inode table.
    pub fn inode_table_blocks(&self) -> u32 {
        (self.max_num_inodes * self.inode_size) / self.block_size
    }

    /// First logical block of the inode table.
    pub fn inode_table_block_offset(&self) -> u32 {
        FREEBITMAP_BLOCK_OFFSET + self.freebitmap_blocks()
    }

    /// First logical block of the data region.
    pub fn data_blocks_offset(&self) -> u32 {
        self.inode_table_block_offset() + self.inode_table_blocks()
    }

    /// Logical bitmap block containing the bit for block `b`, and the
    /// byte position of that bit within the block. Implementers must
    /// preserve this exact addressing to stay on-disk compatible (spec
    /// §4.3).
    pub fn bitmap_location(&self, b: u32) -> (u32, usize) {
        let block = FREEBITMAP_BLOCK_OFFSET + b / self.block_size;
        let byte = (b % self.block_size) as usize;
        (block, byte)
    }

    /// Logical block of the inode table holding inode `n`, and the byte
    /// offset within that block where its 16-byte record starts.
    pub fn inode_location(&self, n: u32) -> (u32, usize) {
        let bytes_per_block = self.block_size / self.inode_size;
        let block = self.inode_table_block_offset() + n / bytes_per_block;
        let byte = ((n % bytes_per_block) * self.inode_size) as usize;
        (block, byte)
    }

    /// Serializes the four constants into a block-sized buffer (zero
    /// padded) for writing to [`SUPERBLOCK_BLOCK`].
    pub fn to_block_bytes(self) -> Vec<u8> {
        let json = serde_json::to_vec(&self).expect("DiskLayout always serializes");
        assert!(
            json.len() <= self.block_size as usize,
            "serialized superblock does not fit in one block"
        );
        let mut buf = vec![0u8; self.block_size as usize];
        buf[..json.len()].copy_from_slice(&json);
        buf
    }

    /// Reverse of [`Self::to_block_bytes`]: trailing zero padding is
    /// trimmed before parsing.
    pub fn from_block_bytes(bytes: &[u8]) -> Self {
        let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        serde_json::from_slice(&bytes[..end]).expect("superblock block holds a valid DiskLayout")
    }

    /// Width in bytes of one directory entry: the name field plus the
    /// 4-byte inode number (spec §3).
    pub fn dirent_width(&self) -> usize {
        Self::MAX_FILENAME + DIRENT_INODE_FIELD_WIDTH
    }

    /// Maximum number of directory entries that fit in one data block.
    pub fn file_entries_per_block(&self) -> usize {
        self.block_size as usize / self.dirent_width()
    }

    /// Maximum file size in bytes: `MAX_INODE_BLOCK_NUMBERS` direct
    /// pointers, each addressing one full block (spec §3). This doubles
    /// as the maximum directory size in bytes, since directories use the
    /// same direct-pointer inode shape as files.
    pub fn max_file_size(&self) -> u32 {
        MAX_INODE_BLOCK_NUMBERS as u32 * self.block_size
    }

    /// Filename for a persisted dump of a cluster with this layout and
    /// `uuid_hex` (spec §6): `"<uuid_hex>_BS_<BS>_NB_<NB>_IS_<IS>_MI_<MI>.dump"`.
    pub fn dump_filename(&self, uuid_hex: &str) -> String {
        format!(
            "{}_BS_{}_NB_{}_IS_{}_MI_{}.dump",
            uuid_hex, self.block_size, self.total_num_blocks, self.inode_size, self.max_num_inodes
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_layout_matches_spec_defaults() {
        let l = DiskLayout::default();
        assert_eq!(l.freebitmap_blocks(), 2);
        assert_eq!(l.inode_table_blocks(), 2);
        assert_eq!(l.inode_table_block_offset(), 4);
        assert_eq!(l.data_blocks_offset(), 6);
    }

    #[test]
    fn superblock_round_trips() {
        let l = DiskLayout::default();
        let bytes = l.to_block_bytes();
        assert_eq!(bytes.len(), l.block_size as usize);
        assert_eq!(DiskLayout::from_block_bytes(&bytes), l);
    }

    #[test]
    fn dump_filename_matches_pattern() {
        let l = DiskLayout::default();
        assert_eq!(
            l.dump_filename("12345678"),
            "12345678_BS_128_NB_256_IS_16_MI_16.dump"
        );
    }

    #[test]
    fn dirent_and_max_file_size_match_defaults() {
        let l = DiskLayout::default();
        assert_eq!(l.dirent_width(), 16);
        assert_eq!(l.file_entries_per_block(), 8);
        assert_eq!(l.max_file_size(), 256);
    }

    #[test]
    fn bitmap_addressing_matches_spec_formula() {
        let l = DiskLayout::default();
        assert_eq!(l.bitmap_location(0), (2, 0));
        assert_eq!(l.bitmap_location(127), (2, 127));
        assert_eq!(l.bitmap_location(128), (3, 0));
        assert_eq!(l.bitmap_location(255), (3, 127));
    }
}
