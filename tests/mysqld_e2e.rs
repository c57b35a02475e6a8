//! E2E tests against a real mysqld on PATH
//!
//! Run with `cargo test -- --ignored` on a machine with MySQL installed.

use mysqltest::{Server, ServerState, load, new_server_db, new_started_server};

#[tokio::test]
#[ignore = "requires a local mysqld installation"]
async fn test_e2e_server_db_and_load() {
    let (mut server, pool) = new_server_db("mysqltest_e2e").await;
    assert_eq!(server.state(), ServerState::Ready);

    let script: &[u8] = b"
        CREATE TABLE t (a INT PRIMARY KEY);
        ;
        INSERT INTO t VALUES (1);
        INSERT INTO t VALUES (2);
    ";
    load(&pool, script).await.unwrap();

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM t")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 2);

    let err = load(&pool, &b"INSERT INTO t VALUES (1);"[..])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("INSERT INTO t VALUES (1)"));

    pool.close().await;
    server.stop().await;
}

#[tokio::test]
#[ignore = "requires a local mysqld installation"]
async fn test_e2e_two_servers_are_isolated() {
    let mut a = new_started_server().await;
    let mut b = new_started_server().await;
    assert_ne!(a.port(), b.port());
    assert_ne!(a.data_dir(), b.data_dir());

    let pool: sqlx::MySqlPool = a.db("");
    let (one,): (i64,) = sqlx::query_as("SELECT 1").fetch_one(&pool).await.unwrap();
    assert_eq!(one, 1);
    pool.close().await;

    stop_all([&mut a, &mut b]).await;
}

async fn stop_all<const N: usize>(servers: [&mut Server; N]) {
    for server in servers {
        server.stop().await;
    }
}
