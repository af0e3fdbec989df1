mod test_support;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use test_support::{pg_engine, unique_id, with_pool};

#[test]
fn concurrent_counter_increments_have_no_gaps_or_duplicates() {
    with_pool(|pool| {
        let key = format!("TEST-{}", unique_id());
        let engine = Arc::new(pg_engine(pool, &key));
        let handles: Vec<_> = (0..16).map(|_| {
                                         let engine = engine.clone();
                                         let key = key.clone();
                                         thread::spawn(move || engine.next_number(&key, 2025).unwrap())
                                     })
                                     .collect();
        let got: BTreeSet<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(got, (1..=16).collect::<BTreeSet<i64>>());
        // años independientes
        assert_eq!(engine.next_number(&key, 2026).unwrap(), 1);
    });
}
