//! # Grenverk Access Lists
//!
//! Allow/deny decisions for client addresses, resolved by longest prefix
//! match over CIDR rules.

pub mod access_list;

pub use access_list::{radix_options, AccessList, AclError, Policy};
