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

//! The fixed 16-byte big-endian inode record.
//!
//! Encoding and decoding are total: there is no invalid byte pattern,
//! only an invalid [`InodeType`] tag, which decodes to
//! [`InodeType::Invalid`] rather than erroring. This struct wraps the
//! fixed-width on-disk record as a typed value rather than a raw byte
//! range.

use crate::layout::MAX_INODE_BLOCK_NUMBERS;

/// Size in bytes of one on-disk inode record.
pub const INODE_RECORD_SIZE: usize = 16;

/// An inode's type tag. `SymlinkReserved` exists in the wire format but
/// is never produced: symlinks are out of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InodeType {
    #[default]
    Invalid,
    File,
    Directory,
    SymlinkReserved,
}

impl InodeType {
    fn from_u16(v: u16) -> Self {
        match v {
            1 => InodeType::File,
            2 => InodeType::Directory,
            3 => InodeType::SymlinkReserved,
            _ => InodeType::Invalid,
        }
    }

    fn to_u16(self) -> u16 {
        match self {
            InodeType::Invalid => 0,
            InodeType::File => 1,
            InodeType::Directory => 2,
            InodeType::SymlinkReserved => 3,
        }
    }
}

/// One in-memory inode: size, type, reference count, and direct block
/// pointers. `0` in a pointer slot means unallocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Inode {
    pub itype: InodeType,
    pub size: u32,
    pub refcnt: u16,
    pub blocks: [u32; MAX_INODE_BLOCK_NUMBERS],
}

impl Inode {
    /// Fresh inode of the given type, no blocks allocated, refcnt 1.
    pub fn new(itype: InodeType) -> Self {
        Self {
            itype,
            size: 0,
            refcnt: 1,
            blocks: [0; MAX_INODE_BLOCK_NUMBERS],
        }
    }

    pub fn is_file(&self) -> bool {
        self.itype == InodeType::File
    }

    pub fn is_directory(&self) -> bool {
        self.itype == InodeType::Directory
    }

    /// Encodes this record into 16 big-endian bytes.
    pub fn encode(&self) -> [u8; INODE_RECORD_SIZE] {
        let mut buf = [0u8; INODE_RECORD_SIZE];
        buf[0..4].copy_from_slice(&self.size.to_be_bytes());
        buf[4..6].copy_from_slice(&self.itype.to_u16().to_be_bytes());
        buf[6..8].copy_from_slice(&self.refcnt.to_be_bytes());
        buf[8..12].copy_from_slice(&self.blocks[0].to_be_bytes());
        buf[12..16].copy_from_slice(&self.blocks[1].to_be_bytes());
        buf
    }

    /// Decodes a 16-byte record. Total: any input of the right length
    /// decodes to *some* [`Inode`] (an all-zero record decodes to the
    /// default, all-invalid inode). A slice of the wrong length is a
    /// programming error and panics rather than returning an error.
    pub fn decode(bytes: &[u8]) -> Self {
        assert_eq!(bytes.len(), INODE_RECORD_SIZE, "inode record must be exactly 16 bytes");
        let size = u32::from_be_bytes(bytes[0..4].try_into().unwrap());
        let itype = InodeType::from_u16(u16::from_be_bytes(bytes[4..6].try_into().unwrap()));
        let refcnt = u16::from_be_bytes(bytes[6..8].try_into().unwrap());
        let block0 = u32::from_be_bytes(bytes[8..12].try_into().unwrap());
        let block1 = u32::from_be_bytes(bytes[12..16].try_into().unwrap());
        Self {
            itype,
            size,
            refcnt,
            blocks: [block0, block1],
        }
    }
}
