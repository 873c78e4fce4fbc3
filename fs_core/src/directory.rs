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

//! Component C6: the directory/name layer (spec §4.6) — fixed-width
//! directory entries, lookup, create, read/write of file content, hard
//! links, and path resolution. This is the layer the shell (an external
//! collaborator, spec §1) would sit on top of.

use crate::cluster::DfsCluster;
use crate::error::{DfsError, Result};
use crate::inode::{Inode, InodeType};
use crate::inode_handle;
use crate::layout::DiskLayout;

/// One decoded directory entry: its name (padding already trimmed) and
/// the inode number it points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub inode: u32,
}

/// Encodes `name` (already checked `<= MAX_FILENAME` bytes) zero-padded,
/// followed by `inode` as 4 big-endian bytes (spec §3).
fn encode_entry(name: &str, inode: u32) -> Vec<u8> {
    let mut buf = vec![0u8; DiskLayout::MAX_FILENAME + 4];
    let bytes = name.as_bytes();
    buf[..bytes.len()].copy_from_slice(bytes);
    buf[DiskLayout::MAX_FILENAME..].copy_from_slice(&inode.to_be_bytes());
    buf
}

/// Decodes one entry from a `dirent_width()`-byte slice. Name bytes are
/// compared/trimmed literally: zero bytes are not part of the name, no
/// other normalization (spec §4.6 `Lookup`).
fn decode_entry(bytes: &[u8]) -> DirEntry {
    let name_bytes = &bytes[..DiskLayout::MAX_FILENAME];
    let end = name_bytes.iter().position(|&b| b == 0).unwrap_or(name_bytes.len());
    let name = String::from_utf8_lossy(&name_bytes[..end]).into_owned();
    let inode = u32::from_be_bytes(bytes[DiskLayout::MAX_FILENAME..].try_into().unwrap());
    DirEntry { name, inode }
}

/// Logical block and byte offset holding directory entry index `i`
/// within `inode`'s content (direct pointers only, spec §3/§4.6).
fn entry_location(cluster: &DfsCluster, inode: &Inode, i: u32) -> (u32, usize) {
    let width = cluster.layout().dirent_width() as u32;
    let byte_off = i * width;
    let block_idx = (byte_off / cluster.layout().block_size) as usize;
    let logical_block = inode.blocks[block_idx];
    let in_block = (byte_off % cluster.layout().block_size) as usize;
    (logical_block, in_block)
}

fn read_entry(cluster: &DfsCluster, inode: &Inode, i: u32) -> Result<DirEntry> {
    let (block, off) = entry_location(cluster, inode, i);
    let width = cluster.layout().dirent_width();
    let bytes = cluster.read_block(block)?;
    Ok(decode_entry(&bytes[off..off + width]))
}

/// Number of valid entries currently stored in `inode` (spec §4.6: the
/// directory's size is entries × entry width, counted contiguously).
fn entry_count(cluster: &DfsCluster, inode: &Inode) -> u32 {
    inode.size / cluster.layout().dirent_width() as u32
}

/// `Lookup(name, dir_inode_number)` (spec §4.6). `Ok(None)` is the
/// not-found case (spec's `-1`); a non-directory `dir` is a recoverable
/// [`DfsError::NotADirectory`].
pub fn lookup(cluster: &DfsCluster, name: &str, dir: u32) -> Result<Option<u32>> {
    let dir_inode = inode_handle::load(cluster, dir)?;
    if !dir_inode.is_directory() {
        return Err(DfsError::NotADirectory(dir));
    }
    for i in 0..entry_count(cluster, &dir_inode) {
        let entry = read_entry(cluster, &dir_inode, i)?;
        if entry.name == name {
            return Ok(Some(entry.inode));
        }
    }
    Ok(None)
}

/// Lists every entry in directory `dir`, in on-disk order (used by the
/// shell's `ls` per spec §6; not itself part of the six core C6
/// operations, but a thin wrapper around the same scan as [`lookup`]).
pub fn list(cluster: &DfsCluster, dir: u32) -> Result<Vec<DirEntry>> {
    let dir_inode = inode_handle::load(cluster, dir)?;
    if !dir_inode.is_directory() {
        return Err(DfsError::NotADirectory(dir));
    }
    (0..entry_count(cluster, &dir_inode))
        .map(|i| read_entry(cluster, &dir_inode, i))
        .collect()
}

/// First inode number whose decoded type is `Invalid` (spec §4.6
/// `FindAvailableInode`).
pub fn find_available_inode(cluster: &DfsCluster) -> Result<Option<u32>> {
    for n in 0..cluster.layout().max_num_inodes {
        if inode_handle::load(cluster, n)?.itype == InodeType::Invalid {
            return Ok(Some(n));
        }
    }
    Ok(None)
}

/// Whether `dir` has room for one more entry (spec §4.6
/// `FindAvailableFileEntry`): true iff its current size is below
/// `MAX_FILE_SIZE`. The next insertion index is always the current size.
pub fn has_available_file_entry(cluster: &DfsCluster, dir_inode: &Inode) -> bool {
    dir_inode.size < cluster.layout().max_file_size()
}

/// `InsertFilenameInodeNumber(parent, name, ino)` (spec §4.6). Appends at
/// offset `parent.size`, allocating a new data block when the insertion
/// crosses a block boundary.
pub fn insert_filename_inode_number(
    cluster: &DfsCluster,
    parent: u32,
    name: &str,
    ino: u32,
) -> Result<()> {
    if name.len() > DiskLayout::MAX_FILENAME {
        return Err(DfsError::NameTooLong {
            len: name.len(),
            max: DiskLayout::MAX_FILENAME,
        });
    }
    let mut parent_inode = inode_handle::load(cluster, parent)?;
    if !parent_inode.is_directory() {
        return Err(DfsError::NotADirectory(parent));
    }
    if !has_available_file_entry(cluster, &parent_inode) {
        return Err(DfsError::DirectoryFull);
    }

    let index = parent_inode.size;
    let block_size = cluster.layout().block_size;
    let block_idx = (index / block_size) as usize;
    if index % block_size == 0 && index != 0 {
        let new_block = cluster.allocate_data_block()?;
        parent_inode.blocks[block_idx] = new_block;
    }

    let target_block = parent_inode.blocks[block_idx];
    let byte_off = (index % block_size) as usize;
    let width = cluster.layout().dirent_width();
    let mut bytes = cluster.read_block(target_block)?;
    bytes[byte_off..byte_off + width].copy_from_slice(&encode_entry(name, ino));
    cluster.write_block(target_block, &bytes)?;

    parent_inode.size += width as u32;
    inode_handle::store(cluster, parent, &parent_inode)
}

/// `Create(dir, name, type)` (spec §4.6). `type` must be
/// [`InodeType::File`] or [`InodeType::Directory`]; returns the new
/// inode number.
pub fn create(cluster: &DfsCluster, dir: u32, name: &str, itype: InodeType) -> Result<u32> {
    assert!(
        matches!(itype, InodeType::File | InodeType::Directory),
        "create() only makes files or directories"
    );
    let dir_inode = inode_handle::load(cluster, dir)?;
    if !dir_inode.is_directory() {
        return Err(DfsError::NotADirectory(dir));
    }
    if !has_available_file_entry(cluster, &dir_inode) {
        return Err(DfsError::DirectoryFull);
    }
    if lookup(cluster, name, dir)?.is_some() {
        return Err(DfsError::AlreadyExists);
    }
    let new_ino = find_available_inode(cluster)?.ok_or(DfsError::NoFreeInode)?;

    match itype {
        InodeType::Directory => {
            let mut new_inode = Inode::new(InodeType::Directory);
            let data_block = cluster.allocate_data_block()?;
            new_inode.blocks[0] = data_block;
            inode_handle::store(cluster, new_ino, &new_inode)?;
            insert_filename_inode_number(cluster, dir, name, new_ino)?;
            insert_filename_inode_number(cluster, new_ino, ".", new_ino)?;
            insert_filename_inode_number(cluster, new_ino, "..", dir)?;
        }
        InodeType::File => {
            let new_inode = Inode::new(InodeType::File);
            inode_handle::store(cluster, new_ino, &new_inode)?;
            insert_filename_inode_number(cluster, dir, name, new_ino)?;
        }
        _ => unreachable!(),
    }

    let mut parent = inode_handle::load(cluster, dir)?;
    parent.refcnt += 1;
    inode_handle::store(cluster, dir, &parent)?;

    Ok(new_ino)
}

/// `Write(ino, offset, data)` (spec §4.6). Size is incremented by the
/// number of bytes written, not clamped to `max(size, offset+len)` —
/// spec §9/§4.6 calls this out explicitly as load-bearing behavior an
/// overwrite must reproduce.
pub fn write(cluster: &DfsCluster, ino: u32, offset: u32, data: &[u8]) -> Result<()> {
    let mut inode = inode_handle::load(cluster, ino)?;
    if !inode.is_file() {
        return Err(DfsError::NotAFile(ino));
    }
    if offset > inode.size {
        return Err(DfsError::OffsetOutOfRange {
            offset,
            size: inode.size,
        });
    }
    let max_size = cluster.layout().max_file_size();
    let total_end = offset + data.len() as u32;
    if total_end > max_size {
        return Err(DfsError::WriteExceedsMaxFileSize {
            offset,
            len: data.len(),
            max: max_size,
        });
    }

    let block_size = cluster.layout().block_size;
    let mut cur = offset;
    let mut written = 0usize;
    while cur < total_end {
        let idx = (cur / block_size) as usize;
        let block_start = idx as u32 * block_size;
        let block_end = block_start + block_size;
        let write_start = (cur - block_start) as usize;
        let chunk_end = total_end.min(block_end);
        let write_end = (chunk_end - block_start) as usize;

        if inode.blocks[idx] == 0 {
            inode.blocks[idx] = cluster.allocate_data_block()?;
        }
        let mut bytes = cluster.read_block(inode.blocks[idx])?;
        let n = write_end - write_start;
        bytes[write_start..write_end].copy_from_slice(&data[written..written + n]);
        cluster.write_block(inode.blocks[idx], &bytes)?;

        written += n;
        cur = chunk_end;
    }

    inode.size += written as u32;
    inode_handle::store(cluster, ino, &inode)
}

/// `Read(ino, offset, count)` (spec §4.6). Clamps `count` to what
/// remains in the file; never reads past `size`.
pub fn read(cluster: &DfsCluster, ino: u32, offset: u32, count: u32) -> Result<Vec<u8>> {
    let inode = inode_handle::load(cluster, ino)?;
    if !inode.is_file() {
        return Err(DfsError::NotAFile(ino));
    }
    if offset > inode.size {
        return Err(DfsError::OffsetOutOfRange {
            offset,
            size: inode.size,
        });
    }
    let to_read = count.min(inode.size - offset);
    let block_size = cluster.layout().block_size;
    let mut out = Vec::with_capacity(to_read as usize);
    let total_end = offset + to_read;
    let mut cur = offset;
    while cur < total_end {
        let idx = (cur / block_size) as usize;
        let block_start = idx as u32 * block_size;
        let block_end = block_start + block_size;
        let read_start = (cur - block_start) as usize;
        let chunk_end = total_end.min(block_end);
        let read_end = (chunk_end - block_start) as usize;

        let bytes = cluster.read_block(inode.blocks[idx])?;
        out.extend_from_slice(&bytes[read_start..read_end]);
        cur = chunk_end;
    }
    Ok(out)
}

/// `Link(target_path, name, cwd)` (spec §4.6). Hard links to directories
/// are rejected ([`DfsError::LinkTargetNotAFile`]).
pub fn link(cluster: &DfsCluster, target_path: &str, name: &str, cwd: u32) -> Result<()> {
    let target_ino = general_path_to_inode_number(cluster, target_path, cwd)?.ok_or(DfsError::NotFound)?;
    let mut target_inode = inode_handle::load(cluster, target_ino)?;
    if !target_inode.is_file() {
        return Err(DfsError::LinkTargetNotAFile);
    }
    let cwd_inode = inode_handle::load(cluster, cwd)?;
    if !cwd_inode.is_directory() {
        return Err(DfsError::NotADirectory(cwd));
    }
    if !has_available_file_entry(cluster, &cwd_inode) {
        return Err(DfsError::DirectoryFull);
    }
    if lookup(cluster, name, cwd)?.is_some() {
        return Err(DfsError::AlreadyExists);
    }

    insert_filename_inode_number(cluster, cwd, name, target_ino)?;
    target_inode.refcnt += 1;
    inode_handle::store(cluster, target_ino, &target_inode)
}

/// `PathToInodeNumber(path, dir)` (spec §4.6): splits on the first `/`
/// and recurses; a path with no `/` is exactly a [`lookup`].
pub fn path_to_inode_number(cluster: &DfsCluster, path: &str, dir: u32) -> Result<Option<u32>> {
    match path.split_once('/') {
        Some((head, rest)) => match lookup(cluster, head, dir)? {
            Some(next) => path_to_inode_number(cluster, rest, next),
            None => Ok(None),
        },
        None => lookup(cluster, path, dir),
    }
}

/// `GeneralPathToInodeNumber(path, cwd)` (spec §4.6): absolute paths
/// resolve from root, `"/"` alone is root itself, relative paths resolve
/// from `cwd`.
pub fn general_path_to_inode_number(cluster: &DfsCluster, path: &str, cwd: u32) -> Result<Option<u32>> {
    if path == "/" {
        return Ok(Some(DfsCluster::ROOT_INODE));
    }
    if let Some(rest) = path.strip_prefix('/') {
        path_to_inode_number(cluster, rest, DfsCluster::ROOT_INODE)
    } else {
        path_to_inode_number(cluster, path, cwd)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::layout::DiskLayout;
    use block_server::{BlockServerApi, LocalBlockServer};
    use std::sync::Arc;

    fn fresh_cluster() -> DfsCluster {
        let layout = DiskLayout::default();
        let n = 3usize;
        let shards = (layout.total_num_blocks as usize) / (n - 1);
        let servers: Vec<Arc<dyn BlockServerApi>> = (0..n)
            .map(|_| Arc::new(LocalBlockServer::new(shards, layout.block_size as usize)) as Arc<dyn BlockServerApi>)
            .collect();
        DfsCluster::bootstrap(servers, layout, [0x12, 0x34, 0x56, 0x78]).unwrap()
    }

    /// Scenario 1: fresh init + mkdir.
    #[test]
    fn mkdir_updates_root_and_self_links() {
        let cluster = fresh_cluster();
        let foo = create(&cluster, DfsCluster::ROOT_INODE, "foo", InodeType::Directory).unwrap();
        assert_eq!(lookup(&cluster, "foo", DfsCluster::ROOT_INODE).unwrap(), Some(foo));
        assert_eq!(lookup(&cluster, ".", foo).unwrap(), Some(foo));
        assert_eq!(lookup(&cluster, "..", foo).unwrap(), Some(DfsCluster::ROOT_INODE));
        let root = inode_handle::load(&cluster, DfsCluster::ROOT_INODE).unwrap();
        assert_eq!(root.refcnt, 2);
        let entries = list(&cluster, DfsCluster::ROOT_INODE).unwrap();
        assert_eq!(entries[0], DirEntry { name: ".".into(), inode: DfsCluster::ROOT_INODE });
        assert_eq!(entries[1], DirEntry { name: "foo".into(), inode: foo });
    }

    /// Scenario 2: append + cat round trip, I4.
    #[test]
    fn write_then_read_round_trips() {
        let cluster = fresh_cluster();
        let f = create(&cluster, DfsCluster::ROOT_INODE, "f", InodeType::File).unwrap();
        write(&cluster, f, 0, b"hello").unwrap();
        write(&cluster, f, 5, b"world").unwrap();
        let inode = inode_handle::load(&cluster, f).unwrap();
        assert_eq!(inode.size, 10);
        let data = read(&cluster, f, 0, 10).unwrap();
        assert_eq!(data, b"helloworld");
    }

    /// Size grows by bytes written even on an in-range overwrite (spec
    /// §4.6/§9's deliberately-preserved behavior).
    #[test]
    fn overwrite_grows_size_by_bytes_written_not_clamped() {
        let cluster = fresh_cluster();
        let f = create(&cluster, DfsCluster::ROOT_INODE, "f", InodeType::File).unwrap();
        write(&cluster, f, 0, b"hello").unwrap();
        write(&cluster, f, 0, b"HE").unwrap();
        let inode = inode_handle::load(&cluster, f).unwrap();
        assert_eq!(inode.size, 7);
    }

    /// Scenario 3: hard link.
    #[test]
    fn link_increments_refcnt_and_is_visible_by_new_name() {
        let cluster = fresh_cluster();
        let a = create(&cluster, DfsCluster::ROOT_INODE, "a", InodeType::File).unwrap();
        write(&cluster, a, 0, b"xyz").unwrap();
        link(&cluster, "a", "b", DfsCluster::ROOT_INODE).unwrap();
        let b = lookup(&cluster, "b", DfsCluster::ROOT_INODE).unwrap().unwrap();
        assert_eq!(b, a);
        assert_eq!(read(&cluster, b, 0, 3).unwrap(), b"xyz");
        let a_inode = inode_handle::load(&cluster, a).unwrap();
        assert_eq!(a_inode.refcnt, 2);
    }

    #[test]
    fn link_to_directory_is_rejected() {
        let cluster = fresh_cluster();
        create(&cluster, DfsCluster::ROOT_INODE, "d", InodeType::Directory).unwrap();
        let err = link(&cluster, "d", "alias", DfsCluster::ROOT_INODE).unwrap_err();
        assert!(matches!(err, DfsError::LinkTargetNotAFile));
    }

    /// Scenario 4: max file size.
    #[test]
    fn writes_past_max_file_size_are_rejected() {
        let cluster = fresh_cluster();
        let f = create(&cluster, DfsCluster::ROOT_INODE, "f", InodeType::File).unwrap();
        write(&cluster, f, 0, &vec![b'x'; 200]).unwrap();
        write(&cluster, f, 200, &vec![b'y'; 56]).unwrap();
        let inode = inode_handle::load(&cluster, f).unwrap();
        assert_eq!(inode.size, 256);
        let err = write(&cluster, f, 256, b"!").unwrap_err();
        assert!(matches!(err, DfsError::WriteExceedsMaxFileSize { .. }));
    }

    /// Scenario 4 continued: directory entry slots exhaust the same way.
    #[test]
    fn directory_fills_up_and_rejects_further_creates() {
        let cluster = fresh_cluster();
        let entries_capacity = cluster.layout().max_file_size() / cluster.layout().dirent_width() as u32;
        for i in 0..entries_capacity - 1 {
            create(&cluster, DfsCluster::ROOT_INODE, &format!("f{i}"), InodeType::File).unwrap();
        }
        // root already holds "." so it is now exactly full.
        let err = create(&cluster, DfsCluster::ROOT_INODE, "overflow", InodeType::File).unwrap_err();
        assert!(matches!(err, DfsError::DirectoryFull));
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let cluster = fresh_cluster();
        create(&cluster, DfsCluster::ROOT_INODE, "dup", InodeType::File).unwrap();
        let err = create(&cluster, DfsCluster::ROOT_INODE, "dup", InodeType::File).unwrap_err();
        assert!(matches!(err, DfsError::AlreadyExists));
    }

    /// I3: root invariant after clean-slate init.
    #[test]
    fn root_invariant_holds_after_init() {
        let cluster = fresh_cluster();
        assert_eq!(lookup(&cluster, ".", DfsCluster::ROOT_INODE).unwrap(), Some(0));
        assert_eq!(lookup(&cluster, "nope", DfsCluster::ROOT_INODE).unwrap(), None);
    }

    #[test]
    fn general_path_resolution_handles_absolute_and_relative() {
        let cluster = fresh_cluster();
        let foo = create(&cluster, DfsCluster::ROOT_INODE, "foo", InodeType::Directory).unwrap();
        let bar = create(&cluster, foo, "bar", InodeType::File).unwrap();
        assert_eq!(
            general_path_to_inode_number(&cluster, "/foo/bar", DfsCluster::ROOT_INODE).unwrap(),
            Some(bar)
        );
        assert_eq!(general_path_to_inode_number(&cluster, "bar", foo).unwrap(), Some(bar));
        assert_eq!(general_path_to_inode_number(&cluster, "/", foo).unwrap(), Some(0));
    }

    #[test]
    fn create_on_non_directory_fails() {
        let cluster = fresh_cluster();
        let f = create(&cluster, DfsCluster::ROOT_INODE, "f", InodeType::File).unwrap();
        let err = create(&cluster, f, "x", InodeType::File).unwrap_err();
        assert!(matches!(err, DfsError::NotADirectory(_)));
    }
}
