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

//! `dfs-init`: bootstraps a cluster from argv and runs exactly one
//! operation against it (SPEC_FULL §12). This is not the interactive
//! shell spec.md §1/§6 scopes out: no command loop, no prompt, and no
//! `cd`-relative state survives between invocations — every run starts
//! from root. Invocations are chained across process restarts only
//! through `--dump`, which replays the prior run's state before the
//! operation and persists it again afterward.

use block_server::{BlockServerApi, LocalBlockServer, RemoteBlockServer};
use clap::{Parser, Subcommand};
use fs_core::directory;
use fs_core::inode::InodeType;
use fs_core::{with_lock, ClusterConfig, ClusterLock, DfsCluster, DiskLayout};
use log::info;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use stripe_client::StripeClient;

#[derive(Parser, Debug)]
#[command(name = "dfs-init", version, about)]
struct Args {
    /// `host:port` of a running `block_serverd`; repeat once per server.
    /// When omitted, `--servers` in-process fake servers are used
    /// instead (handy for one-shot exercising without daemons).
    #[arg(long = "server")]
    servers_remote: Vec<String>,

    /// Loads the server list, instance UUID and layout constants from a
    /// `ClusterConfig` TOML file (SPEC_FULL §10), overriding `--server`
    /// and the individual layout flags below.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of in-process fake servers to use when `--server` is not
    /// given at all.
    #[arg(long, default_value_t = 3)]
    servers: usize,

    #[arg(long, default_value_t = DiskLayout::default().block_size)]
    block_size: u32,
    #[arg(long, default_value_t = DiskLayout::default().total_num_blocks)]
    total_blocks: u32,
    #[arg(long, default_value_t = DiskLayout::default().max_num_inodes)]
    max_inodes: u32,
    #[arg(long, default_value_t = DiskLayout::default().inode_size)]
    inode_size: u32,

    /// If given, cluster state is loaded from this file before the
    /// operation (when it exists) and saved back to it afterward.
    #[arg(long)]
    dump: Option<PathBuf>,

    #[command(subcommand)]
    op: Op,
}

#[derive(Subcommand, Debug)]
enum Op {
    /// Creates a directory.
    Mkdir { path: String },
    /// Creates an empty file.
    Create { path: String },
    /// Appends bytes to a file's current end (spec §6 `append F S`).
    Append { path: String, data: String },
    /// Prints a file's full contents.
    Cat { path: String },
    /// Lists a directory's entries as `[<refcnt>]:<name>`, trailing `/`
    /// for directories (spec §6 `ls`).
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Hard-links an existing file under a new name.
    Ln { target: String, name: String },
    /// Prints the per-server put/get counters (SPEC_FULL §11).
    Counters,
}

fn build_cluster(args: &Args) -> anyhow::Result<DfsCluster> {
    let config = args
        .config
        .as_ref()
        .map(|path| ClusterConfig::read(path))
        .transpose()?;

    let layout = config.as_ref().map(|c| c.layout).unwrap_or(DiskLayout {
        block_size: args.block_size,
        total_num_blocks: args.total_blocks,
        max_num_inodes: args.max_inodes,
        inode_size: args.inode_size,
    });
    let remote_servers: &[String] = config
        .as_ref()
        .map(|c| c.servers.as_slice())
        .unwrap_or(&args.servers_remote);

    let n = if remote_servers.is_empty() {
        args.servers
    } else {
        remote_servers.len()
    };
    let shards = layout.total_num_blocks as usize / (n - 1);

    let existing_dump = args
        .dump
        .as_ref()
        .map(|p| p.exists())
        .unwrap_or(false);

    let servers: Vec<Arc<dyn BlockServerApi>> = if !remote_servers.is_empty() {
        remote_servers
            .iter()
            .map(|addr| -> anyhow::Result<Arc<dyn BlockServerApi>> {
                Ok(Arc::new(RemoteBlockServer::connect(addr.clone())?))
            })
            .collect::<anyhow::Result<_>>()?
    } else {
        (0..n)
            .map(|_| Arc::new(LocalBlockServer::new(shards, layout.block_size as usize)) as Arc<dyn BlockServerApi>)
            .collect()
    };

    if existing_dump {
        let path = args.dump.as_ref().unwrap();
        info!("loading cluster state from {}", path.display());
        let stripe = StripeClient::new(servers.clone(), layout.block_size as usize);
        let mut reader = BufReader::new(File::open(path)?);
        stripe.load_from_disk(layout.total_num_blocks, &mut reader)?;
        drop(stripe);
        Ok(DfsCluster::attach(servers, layout))
    } else {
        info!("bootstrapping a fresh cluster ({n} servers)");
        let uuid = config.as_ref().map(|c| c.uuid).unwrap_or_else(fs_core::generate_uuid);
        Ok(DfsCluster::bootstrap(servers, layout, uuid)?)
    }
}

fn persist_dump(args: &Args, cluster: &DfsCluster) -> anyhow::Result<()> {
    if let Some(path) = &args.dump {
        let mut file = File::create(path)?;
        cluster.stripe().dump_to_disk(cluster.layout().total_num_blocks, &mut file)?;
    }
    Ok(())
}

fn run_op(cluster: &DfsCluster, op: &Op) -> anyhow::Result<()> {
    match op {
        Op::Mkdir { path } => {
            let (parent, name) = split_parent(cluster, path)?;
            directory::create(cluster, parent, &name, InodeType::Directory)?;
        }
        Op::Create { path } => {
            let (parent, name) = split_parent(cluster, path)?;
            directory::create(cluster, parent, &name, InodeType::File)?;
        }
        Op::Append { path, data } => {
            let ino = directory::general_path_to_inode_number(cluster, path, DfsCluster::ROOT_INODE)?
                .ok_or_else(|| anyhow::anyhow!("{path}: no such file"))?;
            let inode = fs_core::inode_handle::load(cluster, ino)?;
            directory::write(cluster, ino, inode.size, data.as_bytes())?;
        }
        Op::Cat { path } => {
            let ino = directory::general_path_to_inode_number(cluster, path, DfsCluster::ROOT_INODE)?
                .ok_or_else(|| anyhow::anyhow!("{path}: no such file"))?;
            let inode = fs_core::inode_handle::load(cluster, ino)?;
            let data = directory::read(cluster, ino, 0, inode.size)?;
            println!("{}", String::from_utf8_lossy(&data));
        }
        Op::Ls { path } => {
            let dir = directory::general_path_to_inode_number(cluster, path, DfsCluster::ROOT_INODE)?
                .ok_or_else(|| anyhow::anyhow!("{path}: no such directory"))?;
            for entry in directory::list(cluster, dir)? {
                let target = fs_core::inode_handle::load(cluster, entry.inode)?;
                let suffix = if target.is_directory() { "/" } else { "" };
                println!("[{}]:{}{}", target.refcnt, entry.name, suffix);
            }
        }
        Op::Ln { target, name } => {
            directory::link(cluster, target, name, DfsCluster::ROOT_INODE)?;
        }
        Op::Counters => {
            print!("{}", cluster.stripe().counters());
        }
    }
    Ok(())
}

/// Splits `path` into `(parent_inode, final_component)`, resolving the
/// parent via [`directory::general_path_to_inode_number`]. Used by
/// `mkdir`/`create`, which (unlike `Link`) always act relative to root
/// since this binary keeps no cwd across invocations.
fn split_parent(cluster: &DfsCluster, path: &str) -> anyhow::Result<(u32, String)> {
    match path.rsplit_once('/') {
        Some(("", name)) => Ok((DfsCluster::ROOT_INODE, name.to_string())),
        Some((parent, name)) => {
            let parent_ino = directory::general_path_to_inode_number(cluster, parent, DfsCluster::ROOT_INODE)?
                .ok_or_else(|| anyhow::anyhow!("{parent}: no such directory"))?;
            Ok((parent_ino, name.to_string()))
        }
        None => Ok((DfsCluster::ROOT_INODE, path.to_string())),
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let result = (|| -> anyhow::Result<()> {
        let cluster = build_cluster(&args)?;
        with_lock(&ClusterLock::new(cluster.stripe().lock_server(), cluster.layout().block_size as usize), || {
            run_op(&cluster, &args.op)
        })??;
        persist_dump(&args, &cluster)?;
        Ok(())
    })();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("dfs-init: error: {e}");
            ExitCode::FAILURE
        }
    }
}
