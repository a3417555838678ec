//! seldb: a miniature relational query engine.
//!
//! Commands are parsed into a [`ast::Query`], resolved against a
//! [`storage::Catalog`], and evaluated through joins, WHERE filtering,
//! grouping, HAVING, ordering, projection and DISTINCT.
//!
//! ```no_run
//! use seldb::engine::Database;
//!
//! let mut db = Database::new_in_memory();
//! db.execute("CREATE TABLE students (id INTEGER PRIMARY KEY, name TEXT, grade INTEGER)").unwrap();
//! db.execute("INSERT INTO students VALUES (1, 'Ann', 90), (2, 'Bo', 70)").unwrap();
//! let result = db.query("SELECT name FROM students WHERE grade > 80").unwrap();
//! assert_eq!(result.to_text_rows(), vec![vec!["Ann".to_string()]]);
//! ```

use sqllogictest::Normalizer;

pub mod aggregate;
pub mod ast;
pub mod engine;
pub mod error;
pub mod join;
pub mod parser;
pub mod pipeline;
pub mod predicate;
pub mod relation;
pub mod storage;

use engine::{Database, EngineOptions, QueryError};

/// Compare query output with the expected block of a test record.
///
/// Expected values may be laid out one row per line or, for multi-column
/// results, one value per line.
fn rows_match(normalizer: Normalizer, actual: &[Vec<String>], expected: &[String]) -> bool {
    let expected: Vec<String> = expected
        .iter()
        .map(|line| normalizer(line))
        .filter(|line| !line.trim().is_empty())
        .collect();
    if actual.is_empty() {
        return expected.is_empty();
    }

    let total_values: usize = actual.iter().map(|row| row.len()).sum();
    let is_valuewise = expected.len() == total_values && actual[0].len() > 1;
    if is_valuewise {
        return actual
            .iter()
            .flatten()
            .zip(&expected)
            .all(|(value, line)| normalizer(value).trim() == line.trim());
    }

    actual.len() == expected.len()
        && actual.iter().zip(&expected).all(|(row, line)| {
            let values: Vec<String> = row.iter().map(|v| normalizer(v)).collect();
            values.join(" ") == line.split_ascii_whitespace().collect::<Vec<_>>().join(" ")
        })
}

/// Run one sqllogictest file against a fresh in-memory database.
pub async fn run_test_file(test_file: &str) -> Result<(), Box<dyn std::error::Error>> {
    run_test_file_with_options(test_file, EngineOptions::default()).await
}

pub async fn run_test_file_with_options(
    test_file: &str,
    options: EngineOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut tester = sqllogictest::Runner::new(move || async move {
        Ok::<_, QueryError>(Database::with_options(options))
    });
    tester.with_validator(rows_match);
    tester.run_file_async(test_file).await?;
    Ok(())
}
