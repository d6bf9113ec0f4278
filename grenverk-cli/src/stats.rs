use grenverk_acl::radix_options;
use grenverk_config::GrenverkConfig;
use grenverk_core::alloc::{Arena, StatsSnapshot};
use grenverk_core::radix::RadixTree;
use grenverk_core::rbtree::RbTree;
use grenverk_core::RadixError;
use grenverk_telemetry::metrics::IndexMetrics;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::commands::StatsArgs;

/// Scratch space for the inserted prefixes, far above what the default run needs.
const SCRATCH_LIMIT: usize = 16 * 1024 * 1024;

pub fn run_stats(
    args: StatsArgs,
    config: &GrenverkConfig,
    metrics: &IndexMetrics,
) -> anyhow::Result<()> {
    let mut rng = SmallRng::seed_from_u64(args.seed);
    let scratch = Arena::with_limit(SCRATCH_LIMIT);

    let mut trie: RadixTree<u32, usize> = RadixTree::with_options(radix_options(&config.arena))?;
    let mut inserted = scratch.array_with_capacity(args.prefixes)?;
    let mut conflicts = 0usize;

    for value in 0..args.prefixes {
        let key: u32 = rng.random();
        let prefix_len = rng.random_range(8..=32);
        match trie.insert_prefix(key, prefix_len, value) {
            Ok(()) => {
                metrics.radix_inserts.inc();
                inserted.push((key, prefix_len))?;
            }
            Err(RadixError::KeyConflict) => {
                metrics.radix_conflicts.inc();
                conflicts += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }
    let filled = trie.stats();
    let filled_nodes = trie.node_count();

    for (key, prefix_len) in inserted.iter().step_by(2) {
        trie.delete_prefix(*key, *prefix_len)?;
        metrics.radix_deletes.inc();
    }
    let pruned_nodes = trie.node_count();

    for (key, prefix_len) in inserted.iter().step_by(2) {
        trie.insert_prefix(*key, *prefix_len, 0)?;
    }
    let refilled = trie.stats();

    println!("radix trie (page {} bytes)", config.arena.page_size);
    println!("  prefixes   {}\tconflicts {conflicts}", trie.len());
    println!("  nodes      filled {filled_nodes}\tafter deleting half {pruned_nodes}\trefilled {}", trie.node_count());
    print_snapshot("filled", &filled);
    print_snapshot("refilled", &refilled);

    let mut tree: RbTree<u32, ()> = RbTree::new();
    for _ in 0..args.keys {
        tree.insert(rng.random(), ());
    }
    let black_height = tree
        .check_invariants()
        .map_err(|violation| anyhow::anyhow!("red-black tree corrupted: {violation}"))?;

    println!("red-black tree");
    println!("  keys       {}\tblack height {black_height}", tree.len());
    println!(
        "scratch arena: {} bytes for {} entries",
        scratch.allocated_bytes(),
        inserted.len()
    );
    Ok(())
}

fn print_snapshot(label: &str, stats: &StatsSnapshot) {
    println!(
        "  {label:<10} slabs {}\tfresh {}\treused {}\treleased {}",
        stats.slabs_reserved, stats.fresh_allocations, stats.reused_allocations, stats.releases
    );
}
