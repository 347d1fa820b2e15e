use std::io::Write;

use sawitdb::wal::record::WalOp;
use sawitdb::wal::writer::WalWriter;
use sawitdb::{
    Command, Criteria, Database, Options, Projection, QueryOutput, Record, SyncPolicy, Value,
};
use tempfile::TempDir;

fn select_all(table: &str) -> Command {
    Command::Select {
        table: table.into(),
        cols: Projection::All,
        criteria: None,
        sort: None,
        limit: None,
        offset: None,
        joins: vec![],
        distinct: false,
    }
}

fn rows_of(out: QueryOutput) -> Vec<Record> {
    match out {
        QueryOutput::Rows(rows) => rows,
        other => panic!("expected rows, got {:?}", other),
    }
}

fn wal_len(dir: &TempDir) -> u64 {
    std::fs::metadata(dir.path().join("test.db.wal"))
        .map(|m| m.len())
        .unwrap_or(0)
}

#[test]
fn test_crash_recovery_of_100_inserts() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.db");

    {
        let mut db =
            Database::open_with(&path, Options::with_wal(SyncPolicy::Normal)).unwrap();
        db.execute(&Command::CreateTable { table: "t".into() }, "")
            .unwrap();
        for i in 0..100 {
            db.execute(
                &Command::Insert {
                    table: "t".into(),
                    data: vec![Record::from_pairs([("id", Value::Int(i))])],
                },
                "",
            )
            .unwrap();
        }
        // Crash: the handle goes away without close().
        drop(db);
    }

    {
        let mut db =
            Database::open_with(&path, Options::with_wal(SyncPolicy::Normal)).unwrap();
        let rows = rows_of(db.execute(&select_all("t"), "").unwrap());
        assert_eq!(rows.len(), 100);
        assert_eq!(wal_len(&dir), 0);
    }
}

#[test]
fn test_wal_is_checkpointed_after_each_query() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.db");

    let mut db = Database::open_with(&path, Options::with_wal(SyncPolicy::Full)).unwrap();
    db.execute(&Command::CreateTable { table: "t".into() }, "")
        .unwrap();
    assert_eq!(wal_len(&dir), 0);
    db.execute(
        &Command::Insert {
            table: "t".into(),
            data: vec![Record::from_pairs([("id", Value::Int(1))])],
        },
        "",
    )
    .unwrap();
    assert_eq!(wal_len(&dir), 0);
    db.close().unwrap();
    assert_eq!(wal_len(&dir), 0);
}

/// A crash between WAL logging and the page writes leaves a pending log;
/// opening the database rolls the logged command forward.
#[test]
fn test_pending_log_is_rolled_forward_on_open() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.db");
    let wal_path = dir.path().join("test.db.wal");

    {
        let mut db = Database::open(&path).unwrap();
        db.execute(&Command::CreateTable { table: "t".into() }, "")
            .unwrap();
        db.execute(
            &Command::Insert {
                table: "t".into(),
                data: vec![Record::from_pairs([("id", Value::Int(1)), ("v", Value::from("a"))])],
            },
            "",
        )
        .unwrap();
        db.close().unwrap();
    }

    // Simulate a crash mid-INSERT: the operations reached the log but
    // never the heap pages.
    {
        let mut writer = WalWriter::open(&wal_path, SyncPolicy::Full).unwrap();
        writer
            .append(&WalOp::Insert {
                table: "t".into(),
                record: Record::from_pairs([("id", Value::Int(2)), ("v", Value::from("b"))]),
            })
            .unwrap();
        writer
            .append(&WalOp::Insert {
                table: "t".into(),
                record: Record::from_pairs([("id", Value::Int(3)), ("v", Value::from("c"))]),
            })
            .unwrap();
    }

    {
        let mut db = Database::open(&path).unwrap();
        let rows = rows_of(db.execute(&select_all("t"), "").unwrap());
        assert_eq!(rows.len(), 3);
        assert_eq!(wal_len(&dir), 0);
    }
}

/// A pending UPDATE whose page writes already landed must not be applied
/// twice.
#[test]
fn test_pending_log_already_applied_is_skipped() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.db");
    let wal_path = dir.path().join("test.db.wal");

    let old = Record::from_pairs([("id", Value::Int(1)), ("v", Value::from("a"))]);
    let mut new = old.clone();
    new.set("v".into(), Value::from("z"));

    {
        let mut db = Database::open(&path).unwrap();
        db.execute(&Command::CreateTable { table: "t".into() }, "")
            .unwrap();
        db.execute(
            &Command::Insert {
                table: "t".into(),
                data: vec![old.clone()],
            },
            "",
        )
        .unwrap();
        let mut updates = Record::new();
        updates.set("v".into(), Value::from("z"));
        db.execute(
            &Command::Update {
                table: "t".into(),
                updates,
                criteria: Some(Criteria::eq("id", Value::Int(1))),
            },
            "",
        )
        .unwrap();
        db.close().unwrap();
    }

    // The update's log survived even though its pages are down.
    {
        let mut writer = WalWriter::open(&wal_path, SyncPolicy::Full).unwrap();
        writer
            .append(&WalOp::Update {
                table: "t".into(),
                old,
                new: new.clone(),
            })
            .unwrap();
    }

    {
        let mut db = Database::open(&path).unwrap();
        let rows = rows_of(db.execute(&select_all("t"), "").unwrap());
        assert_eq!(rows, vec![new]);
    }
}

#[test]
fn test_recovery_covers_updates_and_deletes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.db");

    {
        let mut db =
            Database::open_with(&path, Options::with_wal(SyncPolicy::Normal)).unwrap();
        db.execute(&Command::CreateTable { table: "t".into() }, "")
            .unwrap();
        db.execute(
            &Command::Insert {
                table: "t".into(),
                data: vec![
                    Record::from_pairs([("id", Value::Int(1)), ("v", Value::from("a"))]),
                    Record::from_pairs([("id", Value::Int(2)), ("v", Value::from("b"))]),
                ],
            },
            "",
        )
        .unwrap();

        let mut updates = Record::new();
        updates.set("v".into(), Value::from("z"));
        db.execute(
            &Command::Update {
                table: "t".into(),
                updates,
                criteria: Some(Criteria::eq("id", Value::Int(1))),
            },
            "",
        )
        .unwrap();
        db.execute(
            &Command::Delete {
                table: "t".into(),
                criteria: Some(Criteria::eq("id", Value::Int(2))),
            },
            "",
        )
        .unwrap();
        drop(db);
    }

    {
        let mut db = Database::open(&path).unwrap();
        let rows = rows_of(db.execute(&select_all("t"), "").unwrap());
        assert_eq!(
            rows,
            vec![Record::from_pairs([
                ("id", Value::Int(1)),
                ("v", Value::from("z"))
            ])]
        );
    }
}

#[test]
fn test_garbage_wal_tail_is_tolerated() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.db");
    let wal_path = dir.path().join("test.db.wal");

    {
        let mut db = Database::open(&path).unwrap();
        db.execute(&Command::CreateTable { table: "t".into() }, "")
            .unwrap();
        db.close().unwrap();
    }

    // A valid frame followed by a torn one (header promising more bytes
    // than exist).
    {
        let mut writer = WalWriter::open(&wal_path, SyncPolicy::Full).unwrap();
        writer
            .append(&WalOp::Insert {
                table: "t".into(),
                record: Record::from_pairs([("id", Value::Int(7))]),
            })
            .unwrap();
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&wal_path)
            .unwrap();
        file.write_all(&900u32.to_le_bytes()).unwrap();
        file.write_all(&[0xAB; 12]).unwrap();
    }

    {
        let mut db = Database::open(&path).unwrap();
        let rows = rows_of(db.execute(&select_all("t"), "").unwrap());
        assert_eq!(rows.len(), 1);
        assert_eq!(wal_len(&dir), 0);
    }
}

#[test]
fn test_recovery_keeps_operations_before_a_corrupt_record() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.db");
    let wal_path = dir.path().join("test.db.wal");

    {
        let mut db = Database::open(&path).unwrap();
        db.execute(&Command::CreateTable { table: "t".into() }, "")
            .unwrap();
        db.close().unwrap();
    }

    {
        let mut writer = WalWriter::open(&wal_path, SyncPolicy::Full).unwrap();
        for i in 0..3 {
            writer
                .append(&WalOp::Insert {
                    table: "t".into(),
                    record: Record::from_pairs([("id", Value::Int(i))]),
                })
                .unwrap();
        }
    }

    // Flip a byte inside the last frame's payload: the first two inserts
    // must still be recovered.
    {
        let mut bytes = std::fs::read(&wal_path).unwrap();
        let n = bytes.len();
        bytes[n - 10] ^= 0xFF;
        std::fs::write(&wal_path, &bytes).unwrap();
    }

    {
        let mut db = Database::open(&path).unwrap();
        let rows = rows_of(db.execute(&select_all("t"), "").unwrap());
        assert_eq!(rows.len(), 2);
        assert_eq!(wal_len(&dir), 0);
    }
}

#[test]
fn test_wal_disabled_still_persists_synced_pages() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.db");

    {
        let mut db = Database::open(&path).unwrap();
        db.execute(&Command::CreateTable { table: "t".into() }, "")
            .unwrap();
        db.execute(
            &Command::Insert {
                table: "t".into(),
                data: vec![Record::from_pairs([("id", Value::Int(1))])],
            },
            "",
        )
        .unwrap();
        assert_eq!(wal_len(&dir), 0);
        drop(db);
    }

    let mut db = Database::open(&path).unwrap();
    assert_eq!(rows_of(db.execute(&select_all("t"), "").unwrap()).len(), 1);
}
