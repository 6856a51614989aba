#[macro_use]
mod support;

use pretty_assertions::assert_eq;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use strata::{
    driver::{
        logging::{row, LoggingConnection},
        Backend, Connection,
    },
    schema::Builder,
    sql::Order,
    Db, Error, Instance, Model, Result, Value,
};
use support::*;

// A post whose author column is maintained by the database
model!(Byline, |model| {
    model.table("posts");
    model.primary_key("id");
    model.column("users_id").computed();
    model.belongs_to::<User>("author");
});

#[test]
fn unknown_connection_is_an_error() {
    let db = Db::builder().build();

    let err = db.connection(Some("reports")).unwrap_err();
    assert!(err.is_connection());
    assert!(db.default_connection().unwrap_err().is_connection());
}

#[test]
fn connections_open_on_first_use() {
    let opened = Arc::new(AtomicUsize::new(0));
    let counter = opened.clone();

    let db = Db::builder()
        .connection("primary", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(LoggingConnection::sqlite(Backend::Sqlite)?) as Arc<dyn Connection>)
        })
        .default_connection("primary")
        .build();

    assert!(db.is_registered("primary"));
    assert_eq!(opened.load(Ordering::SeqCst), 0);

    let a = db.default_connection().unwrap();
    let b = db.connection(Some("primary")).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(opened.load(Ordering::SeqCst), 1);
    assert_eq!(a.backend(), Backend::Sqlite);
}

#[test]
fn failed_connections_are_retried() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();

    let db = Db::builder().build();
    db.register("default", move || {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(Error::connection("server not ready"));
        }
        Ok(Arc::new(LoggingConnection::sqlite(Backend::MySql)?) as Arc<dyn Connection>)
    });

    let err = db.default_connection().unwrap_err();
    assert_eq!(
        err.to_string(),
        "connection error: cannot open connection `default`: connection error: server not ready"
    );
    assert!(db.default_connection().is_ok());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn unregister_removes_the_connection() {
    let conn = blog();
    let db = db(&conn);

    assert!(db.unregister("default"));
    assert!(!db.unregister("default"));
    assert!(db.find::<Tag>(1).unwrap_err().is_connection());
}

#[test]
fn find_by_primary_key() {
    let conn = blog();
    let db = db(&conn);

    let tag = db.find::<Tag>(2).unwrap();
    assert_eq!(tag.get("name").unwrap(), Value::from("sql"));

    assert!(db.find::<Tag>(99).unwrap_err().is_not_found());
    assert!(db.find::<Tag>(vec![Value::from(1), Value::from(2)]).unwrap_err().is_query());
}

#[test]
fn soft_deleted_rows_are_not_found() {
    let conn = blog();
    let db = db(&conn);

    assert!(db.find::<Post>(4).unwrap_err().is_not_found());
    assert_eq!(db.all::<Post>().unwrap().len(), 3);
}

#[test]
fn insert_assigns_the_generated_key() {
    let conn = blog();
    let db = db(&conn);

    let mut tag = Tag::new().unwrap();
    tag.set("name", "orm").unwrap();
    db.save(&mut tag).unwrap();

    assert_eq!(tag.get("id").unwrap(), Value::from(3));
    assert!(tag.instance().is_persisted());
    assert!(!tag.instance().is_dirty());

    let log = conn.log();
    assert_eq!(log.last().unwrap().sql, r#"insert into "tags" ("name") values (?)"#);
    assert_eq!(db.find::<Tag>(3).unwrap().get("name").unwrap(), Value::from("orm"));
}

#[test]
fn update_writes_changed_columns_only() {
    let conn = blog();
    let db = db(&conn);

    let mut ann = db.find::<User>(1).unwrap();
    ann.set("username", "anna").unwrap();
    db.save(&mut ann).unwrap();

    let log = conn.log();
    let update = log.last().unwrap();
    assert_eq!(
        update.sql,
        r#"update "users" set "name" = ? where "users"."id" = ?"#
    );
    assert_eq!(update.params, vec![Value::from("anna"), Value::from(1)]);
    assert_eq!(conn.rows("users").unwrap()[0]["name"], Value::from("anna"));

    // Nothing changed since the save
    let statements = conn.log().len();
    db.save(&mut ann).unwrap();
    assert_eq!(conn.log().len(), statements);
}

#[test]
fn update_without_writable_columns_is_skipped() {
    let conn = blog();
    let db = db(&conn);

    let bob = db.find::<User>(2).unwrap();
    let mut byline = db.find::<Byline>(1).unwrap();
    byline.instance_mut().associate("author", bob.instance()).unwrap();
    assert!(byline.instance().is_modified("users_id"));

    let statements = conn.log().len();
    db.save(&mut byline).unwrap();

    assert_eq!(conn.log().len(), statements);
    assert!(!byline.instance().is_dirty());
    assert_eq!(conn.rows("posts").unwrap()[0]["users_id"], Value::from(1));
}

#[test]
fn update_uses_numbered_placeholders_on_postgres() {
    let conn = Arc::new(LoggingConnection::sqlite(Backend::Postgresql).unwrap());
    conn.execute_batch("create table tags (id integer primary key, name text not null)")
        .unwrap();
    conn.insert("tags", row([("id", Value::from(1)), ("name", "rust".into())]))
        .unwrap();
    let db = db(&conn);

    let mut tag = db.find::<Tag>(1).unwrap();
    tag.set("name", "ferris").unwrap();
    db.save(&mut tag).unwrap();

    let log = conn.log();
    let update = log.last().unwrap();
    assert_eq!(
        update.sql,
        r#"update "tags" set "name" = $1 where "tags"."id" = $2"#
    );
    assert_eq!(update.params, vec![Value::from("ferris"), Value::from(1)]);
    assert_eq!(conn.rows("tags").unwrap()[0]["name"], Value::from("ferris"));
}

#[test]
fn upsert_on_mysql() {
    let conn = Arc::new(LoggingConnection::sqlite(Backend::MySql).unwrap());
    let db = db(&conn);
    // SQLite cannot run the MySQL clause, so the statement is only rendered
    conn.fail_next(Error::connection("not sent"));

    let mut setting = Setting::new().unwrap();
    setting.set("name", "theme").unwrap();
    setting.set("value", "light").unwrap();
    assert!(db.save(&mut setting).unwrap_err().is_connection());

    assert_eq!(
        conn.log().last().unwrap().sql,
        "insert into `settings` (`name`, `value`) values (?, ?) on duplicate key update `value` = values(`value`)"
    );
}

#[test]
fn upsert_clause_is_dropped_without_backend_support() {
    let conn = blog();
    let db = db(&conn);

    let mut setting = Setting::new().unwrap();
    setting.set("name", "font").unwrap();
    setting.set("value", "mono").unwrap();
    db.save(&mut setting).unwrap();

    assert_eq!(
        conn.log().last().unwrap().sql,
        r#"insert into "settings" ("name", "value") values (?, ?)"#
    );
    assert_eq!(setting.get("id").unwrap(), Value::from(2));
}

#[test]
fn hard_delete() {
    let conn = blog();
    let db = db(&conn);

    let mut tag = db.find::<Tag>(1).unwrap();
    db.delete(&mut tag).unwrap();

    assert!(!tag.instance().is_persisted());
    assert_eq!(conn.rows("tags").unwrap().len(), 1);
    assert!(db.find::<Tag>(1).unwrap_err().is_not_found());

    let mut unsaved = Tag::new().unwrap();
    assert!(db.delete(&mut unsaved).unwrap_err().is_query());
}

#[test]
fn soft_delete_marks_the_row() {
    let conn = blog();
    let db = db(&conn);

    let mut post = db.find::<Post>(2).unwrap();
    db.delete(&mut post).unwrap();

    assert_eq!(post.get("deleted_at").unwrap().type_name(), "Timestamp");
    assert!(db.find::<Post>(2).unwrap_err().is_not_found());

    // The row is kept, with the timestamp stored as text
    let row = &conn.rows("posts").unwrap()[1];
    assert_eq!(row["deleted_at"].type_name(), "String");
}

#[test]
fn transaction_commits_on_success() {
    let conn = blog();
    let db = db(&conn);

    let id = db
        .transaction(|db| {
            let mut tag = Tag::new()?;
            tag.set("name", "orm")?;
            db.save(&mut tag)?;
            tag.get("id")
        })
        .unwrap();

    assert_eq!(id, Value::from(3));
    assert_eq!(conn.transaction_events(), vec!["begin", "commit"]);
    assert_eq!(conn.rows("tags").unwrap().len(), 3);
}

#[test]
fn transaction_rolls_back_on_error() {
    let conn = blog();
    let db = db(&conn);

    let err = db
        .transaction(|db| {
            let mut tag = Tag::new()?;
            tag.set("name", "orm")?;
            db.save(&mut tag)?;
            db.find::<Tag>(42).map(|_| ())
        })
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(conn.transaction_events(), vec!["begin", "rollback"]);
    assert_eq!(conn.rows("tags").unwrap().len(), 2);
}

#[test]
fn save_errors_name_the_model() {
    let conn = blog();
    let db = db(&conn);
    conn.fail_next(Error::execution_sqlstate("23000", "duplicate entry"));

    let mut tag = Tag::new().unwrap();
    tag.set("name", "rust").unwrap();
    let err = db.save(&mut tag).unwrap_err();

    assert!(err.to_string().starts_with("saving Tag: "), "{err}");
    assert!(!tag.instance().is_persisted());
}

#[test]
fn single_and_first() {
    let conn = blog();
    let db = db(&conn);

    let rust = db
        .query::<Tag>()
        .unwrap()
        .where_eq("name", "rust")
        .single()
        .unwrap();
    assert_eq!(rust.get("id").unwrap(), Value::from(1));

    let err = db.query::<Post>().unwrap().where_eq("users_id", 1).single().unwrap_err();
    assert!(err.is_query());

    let err = db.query::<Post>().unwrap().where_eq("users_id", 3).single().unwrap_err();
    assert!(err.is_not_found());

    let last = db
        .query::<Post>()
        .unwrap()
        .order_by("id", Order::Desc)
        .first()
        .unwrap()
        .unwrap();
    assert_eq!(last.get("title").unwrap(), Value::from("third"));
}

#[test]
fn where_in_and_null() {
    let conn = blog();
    let db = db(&conn);

    let tags = db.query::<Tag>().unwrap().where_in("id", [2, 3]).all().unwrap();
    assert_eq!(tags.len(), 1);

    let orphans = db.query::<Profile>().unwrap().where_null("users_id").all().unwrap();
    assert_eq!(orphans[0].get("bio").unwrap(), Value::from("orphan"));
}

#[test]
fn unknown_filter_property_fails_the_query() {
    let conn = blog();
    let db = db(&conn);

    let err = db
        .query::<Tag>()
        .unwrap()
        .where_eq("colour", "red")
        .limit(5)
        .all()
        .unwrap_err();

    assert!(err.is_structure());
    assert_eq!(conn.query_count(), 0);
}
