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

//! In-process block server: an array of raw shard-blocks plus their
//! checksums and a one-shot init flag, guarded one [`Mutex`] per block so
//! that [`LocalBlockServer::read_set_block`] is atomic with respect to
//! every other operation on that same block.

use crate::api::BlockServerApi;
use crate::error::Result;
use md5::{Digest, Md5};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// One shard-block and its digest, updated together.
struct Slot {
    data: Vec<u8>,
    checksum: String,
}

fn md5_hex(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Holds `num_blocks` shard-blocks of `block_size` bytes, zero-initialized,
/// plus the matching checksums (the digest of the zero buffer) and the
/// init flag.
///
/// A server may be constructed with `damaged_block` set, which seeds that
/// one shard-block with non-zero bytes up front (the block's checksum is
/// still the digest of the *zero* buffer, so the corruption is detectable
/// by the usual checksum comparison — see spec §4.1's fault-injection
/// note). The server itself never suppresses writes to a damaged block;
/// it just starts out inconsistent and answers normally from then on.
pub struct LocalBlockServer {
    block_size: usize,
    slots: Vec<Mutex<Slot>>,
    flag: AtomicBool,
}

impl LocalBlockServer {
    /// Creates a fresh, zero-filled server holding `num_blocks` shard
    /// blocks of `block_size` bytes each.
    pub fn new(num_blocks: usize, block_size: usize) -> Self {
        Self::with_damaged_block(num_blocks, block_size, None)
    }

    /// Like [`Self::new`], but `damaged_block`, if given, is born with
    /// non-zero content so its checksum verification fails until rebuilt.
    pub fn with_damaged_block(
        num_blocks: usize,
        block_size: usize,
        damaged_block: Option<usize>,
    ) -> Self {
        let zero = vec![0u8; block_size];
        let zero_sum = md5_hex(&zero);
        let slots = (0..num_blocks)
            .map(|i| {
                let data = if Some(i) == damaged_block {
                    let mut corrupt = zero.clone();
                    if let Some(first) = corrupt.first_mut() {
                        *first = 0xff;
                    }
                    corrupt
                } else {
                    zero.clone()
                };
                Mutex::new(Slot {
                    data,
                    checksum: zero_sum.clone(),
                })
            })
            .collect();
        Self {
            block_size,
            slots,
            flag: AtomicBool::new(false),
        }
    }

    /// Number of shard-blocks this server holds.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot(&self, b: u32) -> &Mutex<Slot> {
        self.slots
            .get(b as usize)
            .unwrap_or_else(|| panic!("shard block {b} out of range (have {})", self.slots.len()))
    }
}

impl BlockServerApi for LocalBlockServer {
    fn get(&self, b: u32) -> Result<Vec<u8>> {
        Ok(self.slot(b).lock().unwrap().data.clone())
    }

    fn put(&self, b: u32, data: &[u8]) -> Result<()> {
        assert_eq!(
            data.len(),
            self.block_size,
            "put of block {b} with wrong length"
        );
        self.slot(b).lock().unwrap().data = data.to_vec();
        Ok(())
    }

    fn get_checksum(&self, b: u32) -> Result<String> {
        Ok(self.slot(b).lock().unwrap().checksum.clone())
    }

    fn put_checksum(&self, b: u32, checksum: &str) -> Result<()> {
        self.slot(b).lock().unwrap().checksum = checksum.to_string();
        Ok(())
    }

    fn get_flag(&self) -> Result<bool> {
        Ok(self.flag.load(Ordering::SeqCst))
    }

    fn set_flag(&self) -> Result<()> {
        self.flag.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn read_set_block(&self, b: u32, data: &[u8]) -> Result<Vec<u8>> {
        assert_eq!(
            data.len(),
            self.block_size,
            "read_set_block of block {b} with wrong length"
        );
        let mut slot = self.slot(b).lock().unwrap();
        let prev = std::mem::replace(&mut slot.data, data.to_vec());
        Ok(prev)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fresh_server_is_zeroed_and_consistent() {
        let srv = LocalBlockServer::new(4, 8);
        for i in 0..4 {
            let bytes = srv.get(i).unwrap();
            assert_eq!(bytes, vec![0u8; 8]);
            assert_eq!(srv.get_checksum(i).unwrap(), md5_hex(&vec![0u8; 8]));
        }
    }

    #[test]
    fn damaged_block_fails_its_own_checksum() {
        let srv = LocalBlockServer::with_damaged_block(2, 8, Some(1));
        let zero_sum = md5_hex(&vec![0u8; 8]);
        assert_eq!(srv.get_checksum(0).unwrap(), zero_sum);
        assert_eq!(srv.get_checksum(1).unwrap(), zero_sum);
        assert_ne!(srv.get(1).unwrap(), vec![0u8; 8]);
    }

    #[test]
    fn flag_is_monotonic() {
        let srv = LocalBlockServer::new(1, 8);
        assert!(!srv.get_flag().unwrap());
        srv.set_flag().unwrap();
        assert!(srv.get_flag().unwrap());
        srv.set_flag().unwrap();
        assert!(srv.get_flag().unwrap());
    }

    #[test]
    fn read_set_block_returns_previous_value() {
        let srv = LocalBlockServer::new(1, 4);
        let prev = srv.read_set_block(0, &[1, 2, 3, 4]).unwrap();
        assert_eq!(prev, vec![0, 0, 0, 0]);
        let prev2 = srv.read_set_block(0, &[9, 9, 9, 9]).unwrap();
        assert_eq!(prev2, vec![1, 2, 3, 4]);
    }

    #[test]
    #[should_panic]
    fn out_of_range_panics() {
        let srv = LocalBlockServer::new(1, 4);
        let _ = srv.get(5);
    }
}
