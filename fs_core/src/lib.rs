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

//! Components C3-C7: on-disk layout, inode codec, inode handles, the
//! directory/name layer, and the cluster lock, all built on top of
//! [`stripe_client::StripeClient`].

pub mod cluster;
pub mod config;
pub mod directory;
pub mod error;
pub mod inode;
pub mod inode_handle;
pub mod layout;
pub mod lock;

pub use cluster::{generate_uuid, DfsCluster};
pub use config::ClusterConfig;
pub use error::{DfsError, Result};
pub use inode::{Inode, InodeType};
pub use layout::DiskLayout;
pub use lock::{with_lock, ClusterLock, ClusterLockGuard};
