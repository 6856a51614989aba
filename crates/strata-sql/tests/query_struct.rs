use pretty_assertions::assert_eq;
use std::sync::Arc;
use strata_core::{
    driver::{logging::LoggingConnection, Backend, Connection},
    stmt::Value,
};
use strata_sql::{
    query_struct::{Compile, MatchAgainst, SubQuery},
    ColumnLiteral, Condition, Grammar, Literal, Query, QueryStruct, QueryValue,
};

fn connection(backend: Backend) -> Arc<dyn Connection> {
    Arc::new(LoggingConnection::sqlite(backend).unwrap())
}

fn compile(fragment: QueryStruct) -> String {
    let mut query = Query::new(connection(Backend::MySql));
    fragment.compile(&mut query).unwrap();
    query.to_sql().unwrap()
}

// ---------------------------------------------------------------------------
// Inline values
// ---------------------------------------------------------------------------

#[test]
fn in_list_of_numbers() {
    assert_eq!(compile(QueryStruct::in_list([1, 2, 3])), "in(1, 2, 3)");
}

#[test]
fn not_in_list_quotes_strings() {
    assert_eq!(
        compile(QueryStruct::not_in(["a", "it's"])),
        "not in('a', 'it''s')"
    );
}

#[test]
fn enum_constants_are_not_quoted() {
    assert_eq!(
        compile(QueryStruct::in_list([
            Value::Enum("draft".into()),
            Value::Enum("published".into()),
        ])),
        "in(draft, published)"
    );
}

#[test]
fn between_numbers() {
    assert_eq!(compile(QueryStruct::between(1, 10)), "between 1 and 10");
}

#[test]
fn inline_values_carry_no_params() {
    let mut query = Query::new(connection(Backend::MySql));
    QueryStruct::in_list([1, 2, 3]).compile(&mut query).unwrap();
    assert!(query.params().is_empty());
}

#[test]
fn literal_values() {
    assert_eq!(compile(QueryStruct::literal(Value::Null)), "null");
    assert_eq!(compile(QueryStruct::literal(true)), "1");
    assert_eq!(compile(QueryStruct::literal(Literal::now())), "now()");
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

#[test]
fn coalesce_greatest_least() {
    let score = ColumnLiteral::of(Grammar::MYSQL, "score", Some("users"), None);

    assert_eq!(
        compile(QueryStruct::coalesce([
            QueryValue::from(score),
            QueryValue::from(0)
        ])),
        "coalesce(`users`.`score`, 0)"
    );
    assert_eq!(compile(QueryStruct::greatest([1, 5])), "greatest(1, 5)");
    assert_eq!(compile(QueryStruct::least([1, 5])), "least(1, 5)");
}

#[test]
fn function_name_is_validated() {
    let mut query = Query::new(connection(Backend::MySql));
    let err = QueryStruct::function("drop table x;--", [1])
        .compile(&mut query)
        .unwrap_err();
    assert!(err.is_query());
}

// ---------------------------------------------------------------------------
// Nested queries
// ---------------------------------------------------------------------------

#[test]
fn exists_sub_query() {
    let conn = connection(Backend::MySql);
    let inner = Query::new(conn.clone())
        .select([Literal::new("1")])
        .from("posts")
        .where_(Condition::eq(Literal::new("`posts`.`user_id`"), 9));

    let stmt = Query::new(conn)
        .select(["id"])
        .from("users")
        .where_(Condition::fragment(QueryStruct::exists(inner)))
        .build()
        .unwrap();

    assert_eq!(
        stmt.sql,
        "select `id` from `users` where exists (select 1 from `posts` where `posts`.`user_id` = ?)"
    );
    assert_eq!(stmt.params, vec![Value::I64(9)]);
}

#[test]
fn aliased_sub_query() {
    let conn = connection(Backend::SqlServer);
    let inner = Query::new(conn.clone()).select(["id"]).from("users");

    let mut query = Query::new(conn);
    SubQuery::new(inner).alias("u").compile(&mut query).unwrap();

    assert_eq!(query.to_sql().unwrap(), "(select [id] from [users]) as [u]");
}

#[test]
fn nested_error_surfaces() {
    let conn = connection(Backend::MySql);
    let broken = Query::new(conn.clone()).group_by(Vec::<QueryValue>::new());

    let err = Query::new(conn)
        .select(["id"])
        .from("users")
        .where_(Condition::fragment(QueryStruct::exists(broken)))
        .build()
        .unwrap_err();
    assert!(err.is_query());
}

// ---------------------------------------------------------------------------
// Full-text search
// ---------------------------------------------------------------------------

#[test]
fn match_against_plain() {
    let title = ColumnLiteral::of(Grammar::MYSQL, "title", Some("posts"), None);

    assert_eq!(
        compile(QueryStruct::match_against([title], "rust")),
        "match(`posts`.`title`) against ('rust')"
    );
}

#[test]
fn match_against_with_modifier() {
    let title = ColumnLiteral::new(Grammar::MYSQL, "title");
    let body = ColumnLiteral::new(Grammar::MYSQL, "body");

    let fragment = QueryStruct::MatchAgainst(
        MatchAgainst::new([title, body], "+rust -java").boolean_mode(),
    );

    assert_eq!(
        compile(fragment),
        "match(`title`, `body`) against ('+rust -java' in boolean mode)"
    );
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn empty_in_list_is_a_query_error() {
    let mut query = Query::new(connection(Backend::MySql));
    let err = QueryStruct::in_list(Vec::<i64>::new())
        .compile(&mut query)
        .unwrap_err();
    assert!(err.is_query());
}

#[test]
fn quoting_failure_is_a_query_error() {
    let conn = LoggingConnection::sqlite(Backend::MySql).unwrap();
    conn.fail_quoting();

    let mut query = Query::new(Arc::new(conn));
    let err = QueryStruct::in_list(["a"]).compile(&mut query).unwrap_err();

    assert!(err.is_query());
    assert!(err.is_connection());
    assert_eq!(
        err.to_string(),
        "query error: failed to quote String value: connection error: quoting rejected by the connection"
    );
}

#[test]
fn numbers_do_not_need_quoting() {
    let conn = LoggingConnection::sqlite(Backend::MySql).unwrap();
    conn.fail_quoting();

    let mut query = Query::new(Arc::new(conn));
    QueryStruct::between(1, 2).compile(&mut query).unwrap();
    assert_eq!(query.sql(), "between 1 and 2");
}
