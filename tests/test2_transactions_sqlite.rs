use legacy_qb::prelude::*;
use tempfile::tempdir;

fn unique_db_path(prefix: &str) -> String {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join(format!("{prefix}.db"));
    std::mem::forget(dir);
    path.to_string_lossy().into_owned()
}

async fn accounts(prefix: &str) -> Result<LegacyDb, BridgeError> {
    let cap = ConfigAndPool::sqlite_builder(unique_db_path(prefix))
        .build()
        .await?;
    let mut db = cap.legacy().await?;
    db.connection()
        .execute_batch(
            "CREATE TABLE accounts (
                id INTEGER PRIMARY KEY,
                owner TEXT NOT NULL UNIQUE,
                balance INTEGER NOT NULL
             );
             INSERT INTO accounts (owner, balance) VALUES ('ann', 100), ('bob', 50);",
        )
        .await?;
    Ok(db)
}

async fn balance(db: &mut LegacyDb, owner: &str) -> Result<Option<i64>, BridgeError> {
    let mut result = db
        .select("balance")
        .get_where("accounts", Some(RowMap::new().with("owner", owner)), None, None)
        .await?;
    Ok(result
        .first_row()
        .and_then(|row| row.get("balance"))
        .and_then(RowValues::as_int)
        .copied())
}

#[tokio::test]
async fn completed_group_commits() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = accounts("commit").await?;

    assert!(db.trans_start(false).await?);
    db.set_unescaped("balance", "balance - 30")
        .update("accounts", None, Some(RowMap::new().with("owner", "ann")), None)
        .await?;
    db.set_unescaped("balance", "balance + 30")
        .update("accounts", None, Some(RowMap::new().with("owner", "bob")), None)
        .await?;
    assert!(db.trans_complete().await?);
    assert!(db.trans_status());

    assert_eq!(balance(&mut db, "ann").await?, Some(70));
    assert_eq!(balance(&mut db, "bob").await?, Some(80));
    Ok(())
}

#[tokio::test]
async fn failed_statement_rolls_the_group_back() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = accounts("rollback").await?;

    db.trans_start(false).await?;
    assert!(
        db.insert(
            "accounts",
            Some(RowMap::new().with("owner", "cy").with("balance", 10)),
            None
        )
        .await?
    );
    // duplicate owner: reported as a failed write, not an error
    assert!(
        !db.insert(
            "accounts",
            Some(RowMap::new().with("owner", "ann").with("balance", 1)),
            None
        )
        .await?
    );
    assert!(!db.trans_status());
    assert!(db.is_clean());
    assert!(!db.trans_complete().await?);

    assert_eq!(balance(&mut db, "cy").await?, None);
    assert_eq!(db.count_all("accounts").await?, 2);

    // strict mode carries the failure into the next group
    db.trans_start(false).await?;
    db.set("balance", 0)
        .update("accounts", None, Some(RowMap::new().with("owner", "bob")), None)
        .await?;
    assert!(!db.trans_complete().await?);
    assert_eq!(balance(&mut db, "bob").await?, Some(50));
    Ok(())
}

#[tokio::test]
async fn relaxed_mode_clears_the_failure() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = accounts("relaxed").await?;
    db.trans_strict(false);

    db.trans_start(false).await?;
    let outcome = db
        .query("INSERT INTO accounts (owner, balance) VALUES (?, ?)", &[RowValues::from("bob"), RowValues::Int(5)], None)
        .await?;
    assert!(matches!(outcome, QueryOutcome::Failed));
    assert!(!db.trans_complete().await?);
    assert!(db.trans_status());

    db.trans_start(false).await?;
    db.set("balance", 0)
        .update("accounts", None, Some(RowMap::new().with("owner", "bob")), None)
        .await?;
    assert!(db.trans_complete().await?);
    assert_eq!(balance(&mut db, "bob").await?, Some(0));
    Ok(())
}

#[tokio::test]
async fn test_mode_never_commits() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = accounts("testmode").await?;

    db.trans_start(true).await?;
    db.where_("owner", "ann").delete("accounts", None, None, true).await?;
    assert_eq!(db.count_all("accounts").await?, 1);
    assert!(!db.trans_complete().await?);

    assert_eq!(db.count_all("accounts").await?, 2);
    Ok(())
}

#[tokio::test]
async fn manual_transactions_and_nesting() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = accounts("manual").await?;

    assert!(db.trans_begin(false).await?);
    assert!(db.trans_begin(false).await?);
    db.empty_table("accounts").await?;
    // the inner commit only unwinds a level
    assert!(db.trans_commit().await?);
    assert!(db.trans_rollback().await?);
    assert_eq!(db.count_all("accounts").await?, 2);

    assert!(!db.trans_commit().await?);
    Ok(())
}

#[tokio::test]
async fn writes_fail_loudly_outside_a_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = accounts("loud").await?;

    let err = db
        .insert(
            "accounts",
            Some(RowMap::new().with("owner", "ann").with("balance", 1)),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::SqliteError(_) | BridgeError::ExecutionError(_)));
    assert!(db.is_clean());

    db.trans_off();
    assert!(!db.trans_start(false).await?);
    db.set("balance", 1)
        .update("accounts", None, Some(RowMap::new().with("owner", "bob")), None)
        .await?;
    assert!(!db.trans_complete().await?);
    assert_eq!(balance(&mut db, "bob").await?, Some(1));
    Ok(())
}

#[tokio::test]
async fn dropped_handle_does_not_leak_its_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let cap = ConfigAndPool::sqlite_builder(unique_db_path("dropped"))
        .max_connections(1)
        .build()
        .await?;
    {
        let mut db = cap.legacy().await?;
        db.connection()
            .execute_batch("CREATE TABLE t (a INTEGER NOT NULL)")
            .await?;
        db.trans_start(false).await?;
        db.insert("t", Some(RowMap::new().with("a", 1)), None).await?;
        // dropped without trans_complete
    }

    let mut db = cap.legacy().await?;
    assert!(db.trans_start(false).await?);
    assert_eq!(db.count_all("t").await?, 0);
    db.insert("t", Some(RowMap::new().with("a", 2)), None).await?;
    assert!(db.trans_complete().await?);
    assert_eq!(db.count_all("t").await?, 1);
    Ok(())
}
