#![cfg(feature = "test-utils")]

use etl_sync::definition::EtlDefinition;
use etl_sync::destination::Destination;
use etl_sync::destination::postgres::PgDestination;
use etl_sync::error::ErrorKind;
use etl_sync::executor::EtlExecutor;
use etl_sync::extractor::{ExtractorSettings, FingerprintExtractor};
use etl_sync::loader::{HashIndexLoader, Loader, LoaderSettings};
use etl_sync::source::Source;
use etl_sync::source::postgres::PgSource;
use etl_sync::test_utils::database::TestDatabase;
use etl_sync::types::{Cell, Fingerprint, TableName};
use etl_telemetry::tracing::init_test_tracing;

const SCHEMA: &str = r#"
    create table source_products (
        id integer primary key,
        title text not null,
        score bigint,
        updated_at bigint not null
    );
    create table products (
        id integer primary key,
        title text not null,
        score bigint,
        updated_at bigint not null
    );
"#;

fn table() -> TableName {
    "products".parse().unwrap()
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn definition(
    database: &TestDatabase,
    chunk_size: usize,
    batch_size: usize,
) -> EtlDefinition<FingerprintExtractor<PgSource>, HashIndexLoader<PgDestination>> {
    let source = PgSource::new(
        database.pool.clone(),
        "select id, title, score, updated_at from source_products",
    );
    let extractor = FingerprintExtractor::new(
        source,
        ExtractorSettings::new(columns(&["id"])).with_chunk_size(chunk_size),
    )
    .unwrap();

    let settings = LoaderSettings::new(table(), columns(&["id", "title", "score", "updated_at"]))
        .with_batch_size(batch_size);
    let loader = HashIndexLoader::new(PgDestination::new(database.pool.clone()), settings).unwrap();

    EtlDefinition::new("products", extractor, loader)
}

async fn seed_source(database: &TestDatabase, count: i32) {
    database
        .run(&format!(
            "insert into source_products (id, title, score, updated_at)
             select i, 'product ' || i, i * 10, i * 100 from generate_series(1, {count}) as i"
        ))
        .await;
}

async fn destination_titles(database: &TestDatabase) -> Vec<(i32, String)> {
    sqlx::query_as::<_, (i32, String)>("select id, title from products order by id")
        .fetch_all(&database.pool)
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn database_fingerprints_match_computed_ones() {
    init_test_tracing();

    let database = TestDatabase::new().await;
    database.run(SCHEMA).await;
    database
        .run("insert into products (id, title, score, updated_at) values (1, 'a', null, 1), (42, 'b', 7, 2)")
        .await;

    let mut destination = PgDestination::new(database.pool.clone());
    let mut fingerprints = destination
        .load_fingerprints(&table(), &columns(&["id", "score"]))
        .await
        .unwrap();
    fingerprints.sort();

    let mut expected = vec![
        Fingerprint::compute([&Cell::I32(1), &Cell::Null]),
        Fingerprint::compute([&Cell::I32(42), &Cell::I64(7)]),
    ];
    expected.sort();

    assert_eq!(fingerprints, expected);

    database.cleanup().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn source_is_reconciled_into_destination() {
    init_test_tracing();

    let database = TestDatabase::new().await;
    database.run(SCHEMA).await;
    seed_source(&database, 23).await;

    let mut definition = definition(&database, 5, 10);
    let mut executor = EtlExecutor::new();

    let first = executor.execute(&mut definition, false).await.unwrap();
    assert_eq!(first.extractor.extracted_rows, 23);
    assert_eq!(first.loader.insert_count, 23);
    assert_eq!(first.loader.index_count, 0);
    assert_eq!(definition.extractor().source().count().await.unwrap(), 23);

    database
        .run("update source_products set title = 'renamed' where id = 7")
        .await;

    let second = executor.execute(&mut definition, false).await.unwrap();
    assert_eq!(second.loader.insert_count, 0);
    assert_eq!(second.loader.update_count, 23);
    assert_eq!(second.loader.index_count, 23);

    let titles = destination_titles(&database).await;
    assert_eq!(titles.len(), 23);
    assert_eq!(titles[6], (7, "renamed".to_string()));

    database.cleanup().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn incremental_run_reads_rows_from_watermark() {
    init_test_tracing();

    let database = TestDatabase::new().await;
    database.run(SCHEMA).await;
    seed_source(&database, 10).await;
    database
        .run(
            "insert into products (id, title, score, updated_at)
             select id, title, score, updated_at from source_products where id <= 4",
        )
        .await;

    let mut definition = definition(&database, 3, 100);
    assert_eq!(
        definition
            .loader_mut()
            .incremental_last_value()
            .await
            .unwrap(),
        Some(Cell::I64(400))
    );

    let info = EtlExecutor::new()
        .execute(&mut definition, true)
        .await
        .unwrap();

    assert_eq!(info.extractor.extracted_rows, 7);
    assert_eq!(info.loader.update_count, 1);
    assert_eq!(info.loader.insert_count, 6);
    assert_eq!(destination_titles(&database).await.len(), 10);

    database.cleanup().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn nullable_columns_load_into_wider_destination_types() {
    init_test_tracing();

    let database = TestDatabase::new().await;
    database
        .run(
            "create table source_readings (id integer primary key, score integer, price integer);
             create table readings (id integer primary key, score bigint, price numeric);",
        )
        .await;

    // The first record loaded carries NULLs.
    let first = (1..=10)
        .min_by_key(|id| Fingerprint::compute([&Cell::I32(*id)]))
        .unwrap();
    let rows = (1..=10)
        .map(|id| {
            if id == first || id % 2 == 0 {
                format!("({id}, null, null)")
            } else {
                format!("({id}, {}, {})", id * 10, id * 3)
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    database
        .run(&format!(
            "insert into source_readings (id, score, price) values {rows}"
        ))
        .await;

    let source = PgSource::new(
        database.pool.clone(),
        "select id, score, price from source_readings",
    );
    let extractor = FingerprintExtractor::new(
        source,
        ExtractorSettings::new(columns(&["id"])).with_chunk_size(4),
    )
    .unwrap();
    let settings = LoaderSettings::new(
        "readings".parse().unwrap(),
        columns(&["id", "score", "price"]),
    )
    .with_batch_size(3);
    let loader = HashIndexLoader::new(PgDestination::new(database.pool.clone()), settings).unwrap();
    let mut definition = EtlDefinition::new("readings", extractor, loader);

    let first_run = EtlExecutor::new()
        .execute(&mut definition, false)
        .await
        .unwrap();
    assert_eq!(first_run.loader.insert_count, 10);

    let second_run = EtlExecutor::new()
        .execute(&mut definition, false)
        .await
        .unwrap();
    assert_eq!(second_run.loader.update_count, 10);

    let loaded = sqlx::query_as::<_, (i32, Option<i64>, Option<String>)>(
        "select id, score, price::text from readings order by id",
    )
    .fetch_all(&database.pool)
    .await
    .unwrap();

    assert_eq!(loaded.len(), 10);
    for (id, score, price) in loaded {
        if id == first || id % 2 == 0 {
            assert_eq!((score, price), (None, None));
        } else {
            assert_eq!(score, Some(i64::from(id) * 10));
            assert_eq!(price, Some((id * 3).to_string()));
        }
    }

    database.cleanup().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn rerun_after_failed_write_discards_aborted_transaction() {
    init_test_tracing();

    let database = TestDatabase::new().await;
    database.run(SCHEMA).await;
    database
        .run("alter table products add constraint score_is_positive check (score >= 0)")
        .await;
    seed_source(&database, 10).await;
    database
        .run("update source_products set score = -1 where id = 5")
        .await;

    let mut definition = definition(&database, 4, 100);
    let mut executor = EtlExecutor::new();

    let err = executor.execute(&mut definition, false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DestinationQueryFailed);
    assert!(destination_titles(&database).await.is_empty());

    database
        .run("update source_products set score = 50 where id = 5")
        .await;

    let info = executor.execute(&mut definition, false).await.unwrap();
    assert_eq!(info.loader.insert_count, 10);

    let titles = destination_titles(&database).await;
    assert_eq!(titles.len(), 10);
    assert_eq!(
        titles.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
        (1..=10).collect::<Vec<_>>()
    );

    database.cleanup().await;
}
