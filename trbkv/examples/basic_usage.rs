//! Basic usage examples for trbkv and the trb-rs containers.

use trb_rs::{OrdCompare, SubtreeSize, TrbHashMap, TrbMap, TrbMultiMap};
use trbkv::{Config, TrbKV};

fn main() {
    example_trbkv();
    example_ordered_map();
    example_multimap();
    example_hash_map();
}

fn example_trbkv() {
    println!("=== TrbKV (Thread-Safe Wrapper) ===\n");

    let kv = TrbKV::with_config(Config {
        auto_compact: true,
        compaction_threshold: 64,
        ..Config::default()
    });

    // Insert data
    kv.insert(b"user:1001", 1001);
    kv.insert(b"user:1002", 1002);
    kv.insert(b"user:1003", 1003);
    kv.insert(b"post:1001", 1);

    // Lookups
    println!("user:1001 = {:?}", kv.get(b"user:1001"));
    println!("user:9999 = {:?}", kv.get(b"user:9999"));
    println!("Contains user:1002: {}", kv.contains(b"user:1002"));
    println!("Count: {}", kv.len());

    // Prefix scan
    for (key, value) in kv.prefix(b"user:") {
        println!("  {} = {}", String::from_utf8_lossy(&key), value);
    }

    let stats = kv.memory_usage();
    println!("Bytes per key: {:.1}\n", stats.bytes_per_key);
}

fn example_ordered_map() {
    println!("=== TrbMap with order statistics ===\n");

    let mut map: TrbMap<&str, u32, OrdCompare, SubtreeSize> = TrbMap::default();
    for (i, word) in ["cherry", "apple", "elderberry", "banana", "date"].into_iter().enumerate() {
        map.insert(word, i as u32);
    }

    println!("Median: {:?}", map.select(map.len() / 2));
    println!("Rank of date: {}", map.rank(&"date"));

    println!("Range [b, d):");
    for (key, value) in map.range("b".."d") {
        println!("  {} = {}", key, value);
    }
    println!();
}

fn example_multimap() {
    println!("=== TrbMultiMap ===\n");

    let mut tags = TrbMultiMap::new();
    tags.insert("rust", "ownership");
    tags.insert("c", "pointers");
    tags.insert("rust", "traits");

    let rust: Vec<_> = tags.get_all(&"rust").collect();
    println!("rust -> {:?}", rust);
    println!("Count: {}\n", tags.count(&"rust"));
}

fn example_hash_map() {
    println!("=== TrbHashMap ===\n");

    let mut map = TrbHashMap::new();
    for i in 0..100u32 {
        map.insert(i, i * i);
    }
    println!("9^2 = {:?}", map.get(&9));
    println!("Buckets: {}", map.bucket_count());
    println!("Load factor: {:.2}", map.load_factor());
}
