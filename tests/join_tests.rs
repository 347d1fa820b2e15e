use sawitdb::{
    CmpOp, Command, Criteria, Database, JoinSpec, JoinType, OnClause, Projection, QueryOutput,
    Record, Value,
};
use tempfile::TempDir;

fn open_db() -> (Database, TempDir) {
    let dir = TempDir::new().unwrap();
    let db = Database::open(dir.path().join("test.db")).unwrap();
    (db, dir)
}

fn rows_of(out: QueryOutput) -> Vec<Record> {
    match out {
        QueryOutput::Rows(rows) => rows,
        other => panic!("expected rows, got {:?}", other),
    }
}

fn join_select(table: &str, joins: Vec<JoinSpec>, criteria: Option<Criteria>) -> Command {
    Command::Select {
        table: table.into(),
        cols: Projection::All,
        criteria,
        sort: None,
        limit: None,
        offset: None,
        joins,
        distinct: false,
    }
}

fn equi_join(table: &str, join_type: JoinType, left: &str, right: &str) -> JoinSpec {
    JoinSpec {
        table: table.into(),
        join_type,
        on: Some(OnClause {
            left: left.into(),
            op: CmpOp::Eq,
            right: right.into(),
        }),
    }
}

fn seed_emp_dept(db: &mut Database) {
    db.execute(&Command::CreateTable { table: "emp".into() }, "")
        .unwrap();
    db.execute(&Command::CreateTable { table: "dept".into() }, "")
        .unwrap();

    let emps = vec![
        Record::from_pairs([("id", Value::Int(1)), ("name", Value::from("A")), ("dept_id", Value::Int(1))]),
        Record::from_pairs([("id", Value::Int(2)), ("name", Value::from("B")), ("dept_id", Value::Int(2))]),
        Record::from_pairs([("id", Value::Int(3)), ("name", Value::from("C")), ("dept_id", Value::Int(999))]),
    ];
    db.execute(&Command::Insert { table: "emp".into(), data: emps }, "")
        .unwrap();

    let depts = vec![
        Record::from_pairs([("id", Value::Int(1)), ("name", Value::from("E"))]),
        Record::from_pairs([("id", Value::Int(2)), ("name", Value::from("S"))]),
        Record::from_pairs([("id", Value::Int(3)), ("name", Value::from("H"))]),
    ];
    db.execute(&Command::Insert { table: "dept".into(), data: depts }, "")
        .unwrap();
}

#[test]
fn test_left_join_emits_null_padded_unmatched_left() {
    let (mut db, _dir) = open_db();
    seed_emp_dept(&mut db);

    let cmd = join_select(
        "emp",
        vec![equi_join("dept", JoinType::Left, "emp.dept_id", "dept.id")],
        None,
    );
    let rows = rows_of(db.execute(&cmd, "").unwrap());
    assert_eq!(rows.len(), 3);

    let c_row = rows
        .iter()
        .find(|r| r.get("emp.name") == Some(&Value::Str("C".into())))
        .unwrap();
    assert_eq!(c_row.get("dept.name"), Some(&Value::Null));

    let a_row = rows
        .iter()
        .find(|r| r.get("emp.name") == Some(&Value::Str("A".into())))
        .unwrap();
    assert_eq!(a_row.get("dept.name"), Some(&Value::Str("E".into())));
}

#[test]
fn test_right_join_emits_null_padded_unmatched_right() {
    let (mut db, _dir) = open_db();
    seed_emp_dept(&mut db);

    let cmd = join_select(
        "emp",
        vec![equi_join("dept", JoinType::Right, "emp.dept_id", "dept.id")],
        None,
    );
    let rows = rows_of(db.execute(&cmd, "").unwrap());
    assert_eq!(rows.len(), 3);

    let h_row = rows
        .iter()
        .find(|r| r.get("dept.name") == Some(&Value::Str("H".into())))
        .unwrap();
    assert_eq!(h_row.get("emp.name"), Some(&Value::Null));
}

#[test]
fn test_inner_join_drops_unmatched_rows() {
    let (mut db, _dir) = open_db();
    seed_emp_dept(&mut db);

    let cmd = join_select(
        "emp",
        vec![equi_join("dept", JoinType::Inner, "emp.dept_id", "dept.id")],
        None,
    );
    let rows = rows_of(db.execute(&cmd, "").unwrap());
    assert_eq!(rows.len(), 2);
    assert!(rows
        .iter()
        .all(|r| r.get("emp.name") != Some(&Value::Str("C".into()))));
}

#[test]
fn test_full_join_pads_both_sides() {
    let (mut db, _dir) = open_db();
    seed_emp_dept(&mut db);

    let cmd = join_select(
        "emp",
        vec![equi_join("dept", JoinType::Full, "emp.dept_id", "dept.id")],
        None,
    );
    let rows = rows_of(db.execute(&cmd, "").unwrap());
    // A-E, B-S, C-null, null-H.
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().any(|r| r.get("emp.name") == Some(&Value::Null)
        && r.get("dept.name") == Some(&Value::Str("H".into()))));
    assert!(rows.iter().any(|r| r.get("emp.name") == Some(&Value::Str("C".into()))
        && r.get("dept.name") == Some(&Value::Null)));
}

#[test]
fn test_cross_join_cartesian_product() {
    let (mut db, _dir) = open_db();
    db.execute(&Command::CreateTable { table: "colors".into() }, "")
        .unwrap();
    db.execute(&Command::CreateTable { table: "sizes".into() }, "")
        .unwrap();
    db.execute(
        &Command::Insert {
            table: "colors".into(),
            data: vec![
                Record::from_pairs([("color", Value::from("R"))]),
                Record::from_pairs([("color", Value::from("B"))]),
            ],
        },
        "",
    )
    .unwrap();
    db.execute(
        &Command::Insert {
            table: "sizes".into(),
            data: vec![
                Record::from_pairs([("size", Value::from("S"))]),
                Record::from_pairs([("size", Value::from("M"))]),
                Record::from_pairs([("size", Value::from("L"))]),
            ],
        },
        "",
    )
    .unwrap();

    let cmd = join_select(
        "colors",
        vec![JoinSpec {
            table: "sizes".into(),
            join_type: JoinType::Cross,
            on: None,
        }],
        None,
    );
    let rows = rows_of(db.execute(&cmd, "").unwrap());
    assert_eq!(rows.len(), 6);
}

#[test]
fn test_where_runs_over_the_joined_row() {
    let (mut db, _dir) = open_db();
    seed_emp_dept(&mut db);

    // Qualified reference into the right table.
    let cmd = join_select(
        "emp",
        vec![equi_join("dept", JoinType::Inner, "emp.dept_id", "dept.id")],
        Some(Criteria::eq("dept.name", Value::from("S"))),
    );
    let rows = rows_of(db.execute(&cmd, "").unwrap());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("emp.name"), Some(&Value::Str("B".into())));

    // Bare reference still resolves (left-side column not shadowed).
    let cmd = join_select(
        "emp",
        vec![equi_join("dept", JoinType::Inner, "emp.dept_id", "dept.id")],
        Some(Criteria::eq("dept_id", Value::Int(1))),
    );
    let rows = rows_of(db.execute(&cmd, "").unwrap());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("emp.name"), Some(&Value::Str("A".into())));
}

#[test]
fn test_projection_of_qualified_columns() {
    let (mut db, _dir) = open_db();
    seed_emp_dept(&mut db);

    let cmd = Command::Select {
        table: "emp".into(),
        cols: Projection::Cols(vec!["emp.name".into(), "dept.name".into()]),
        criteria: None,
        sort: None,
        limit: None,
        offset: None,
        joins: vec![equi_join("dept", JoinType::Inner, "emp.dept_id", "dept.id")],
        distinct: false,
    };
    let rows = rows_of(db.execute(&cmd, "").unwrap());
    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[0],
        Record::from_pairs([
            ("emp.name", Value::from("A")),
            ("dept.name", Value::from("E"))
        ])
    );
}

#[test]
fn test_chained_joins_fold_left() {
    let (mut db, _dir) = open_db();
    seed_emp_dept(&mut db);

    db.execute(&Command::CreateTable { table: "site".into() }, "")
        .unwrap();
    db.execute(
        &Command::Insert {
            table: "site".into(),
            data: vec![
                Record::from_pairs([("dept", Value::Int(1)), ("city", Value::from("Oslo"))]),
                Record::from_pairs([("dept", Value::Int(2)), ("city", Value::from("Lima"))]),
            ],
        },
        "",
    )
    .unwrap();

    let cmd = join_select(
        "emp",
        vec![
            equi_join("dept", JoinType::Inner, "emp.dept_id", "dept.id"),
            equi_join("site", JoinType::Left, "dept.id", "site.dept"),
        ],
        None,
    );
    let rows = rows_of(db.execute(&cmd, "").unwrap());
    assert_eq!(rows.len(), 2);
    let a_row = rows
        .iter()
        .find(|r| r.get("emp.name") == Some(&Value::Str("A".into())))
        .unwrap();
    assert_eq!(a_row.get("site.city"), Some(&Value::Str("Oslo".into())));
}
