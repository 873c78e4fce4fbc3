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

//! Recoverable errors for C3-C7 (spec §7).
//!
//! Out-of-range block/inode indices and other structural impossibilities
//! are not part of this enum: those assert and abort, matching the
//! "fatal" rows of spec §7's error taxonomy, the same way the teacher's
//! `unlikely(...)` guards in `ext2/dirent.rs` treat a corrupt record as a
//! kernel bug rather than a value to propagate.

pub type Result<T> = std::result::Result<T, DfsError>;

/// The recoverable half of spec §7's error taxonomy: every case a caller
/// is expected to handle rather than a bug to fix.
#[derive(Debug, thiserror::Error)]
pub enum DfsError {
    /// Directory operation attempted on a non-directory inode.
    #[error("inode {0} is not a directory")]
    NotADirectory(u32),
    /// File operation (Read/Write) attempted on a non-file inode.
    #[error("inode {0} is not a regular file")]
    NotAFile(u32),
    /// `Create`/`InsertFilenameInodeNumber` with a name over `MAX_FILENAME`.
    #[error("name is {len} bytes, longer than the {max}-byte limit")]
    NameTooLong { len: usize, max: usize },
    /// A directory's `size` already equals `MAX_FILE_SIZE`.
    #[error("directory has no free entry slot")]
    DirectoryFull,
    /// No inode slot has `type == invalid`.
    #[error("no free inode available")]
    NoFreeInode,
    /// `Create`/`Link` target name already present in the directory.
    #[error("name already exists in this directory")]
    AlreadyExists,
    /// `Link` target resolved to something other than a file.
    #[error("link target is not a regular file")]
    LinkTargetNotAFile,
    /// `Link`/path resolution could not find the target.
    #[error("path does not resolve to an existing inode")]
    NotFound,
    /// `Read`/`Write` offset outside `[0, size]`.
    #[error("offset {offset} is out of range for size {size}")]
    OffsetOutOfRange { offset: u32, size: u32 },
    /// `Write` would push the file past `MAX_FILE_SIZE`.
    #[error("write of {len} bytes at offset {offset} exceeds the {max}-byte file size limit")]
    WriteExceedsMaxFileSize { offset: u32, len: usize, max: u32 },
    /// Propagated from the block layer (transport failure during an
    /// otherwise-valid operation; structural corruption is fatal, not this).
    #[error(transparent)]
    BlockServer(#[from] block_server::BlockServerError),
}
