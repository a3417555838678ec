use seldb::engine::{execute_query, Database, EngineOptions};
use seldb::parser::parse_select;
use seldb::storage::StorageEngine;
use std::sync::Arc;
use std::thread;

fn populated_storage() -> StorageEngine {
    let mut db = Database::new_in_memory();
    db.execute("CREATE TABLE accounts (id INTEGER PRIMARY KEY, owner TEXT, balance INTEGER)")
        .expect("create accounts");
    db.execute("CREATE TABLE transfers (account INTEGER, amount INTEGER)")
        .expect("create transfers");
    for i in 0..200 {
        db.execute(&format!(
            "INSERT INTO accounts VALUES ({}, 'owner{}', {})",
            i,
            i % 10,
            i * 3
        ))
        .expect("insert account");
        db.execute(&format!("INSERT INTO transfers VALUES ({}, {})", i % 50, i))
            .expect("insert transfer");
    }
    db.into_storage()
}

#[test]
fn readers_share_one_catalog() {
    let storage = Arc::new(populated_storage());
    let queries = [
        "SELECT owner, count(*) FROM accounts GROUP BY owner ORDER BY owner",
        "SELECT a.id, t.amount FROM accounts a JOIN transfers t ON a.id = t.account WHERE a.balance > 30 ORDER BY a.id, t.amount",
        "SELECT DISTINCT owner FROM accounts WHERE balance >= 300 ORDER BY owner DESC",
    ];
    let expected: Vec<_> = queries
        .iter()
        .map(|sql| {
            let query = parse_select(sql).expect("parse");
            execute_query(storage.as_ref(), &query, &EngineOptions::default()).expect("execute")
        })
        .collect();

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let storage = Arc::clone(&storage);
            thread::spawn(move || {
                let options = EngineOptions {
                    predicate_pushdown: worker % 2 == 0,
                };
                (0..20)
                    .map(|round| {
                        let sql = queries[(worker + round) % queries.len()];
                        let query = parse_select(sql).expect("parse");
                        let result = execute_query(storage.as_ref(), &query, &options).expect("execute");
                        (sql, result)
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for handle in handles {
        for (sql, result) in handle.join().expect("reader thread panicked") {
            let idx = queries.iter().position(|q| *q == sql).expect("known query");
            assert_eq!(result, expected[idx], "divergent result for {}", sql);
        }
    }
}

#[test]
fn grouped_counts_are_stable_under_parallel_reads() {
    let storage = Arc::new(populated_storage());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let storage = Arc::clone(&storage);
            thread::spawn(move || {
                let query = parse_select("SELECT count(*) FROM transfers WHERE amount < 100").expect("parse");
                execute_query(storage.as_ref(), &query, &EngineOptions::default())
                    .expect("execute")
                    .to_text_rows()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().expect("reader thread"), vec![vec!["100".to_string()]]);
    }
}
