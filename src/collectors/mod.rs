//! Collectors for kernel-exported system counters.
//!
//! Every reader takes the `/proc` or `/sys` root it reads from, so the
//! same code runs against the live system and against fixture trees.

pub mod block;
pub mod diskstats;
pub mod netdev;
pub mod thermal;

pub use block::{list_disks, DiskInfo};
pub use diskstats::{read_diskstats, DiskCounters};
pub use netdev::{physical_interfaces, read_netdev_stats, NetDevCounters};
pub use thermal::collect_temperatures;
