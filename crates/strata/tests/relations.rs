#[macro_use]
mod support;

use pretty_assertions::assert_eq;
use strata::{schema::Builder, Instance, Model, ModelList, Related, Result, Structure, Value};
use support::*;

// The pivot table declares its owner column in upper case, so rows come back
// without a `posts_id` column.
model!(LabelledPost, |model| {
    model.table("posts");
    model.primary_key("id");
    model
        .belongs_to_many::<Tag>("labels")
        .pivot("posts_labels")
        .pivot_keys("posts_id", "tags_id");
});

fn names(list: &ModelList<Instance>, key: &str) -> Vec<Value> {
    list.iter().map(|instance| instance.get(key).unwrap()).collect()
}

fn many<'a>(instance: &'a Instance, relation: &str) -> &'a ModelList<Instance> {
    instance
        .related(relation)
        .and_then(Related::as_many)
        .unwrap_or_else(|| panic!("`{relation}` is not loaded"))
}

fn one<'a>(instance: &'a Instance, relation: &str) -> Option<&'a Instance> {
    match instance.related(relation) {
        Some(Related::One(related)) => related.as_ref(),
        other => panic!("`{relation}` is not a loaded single relation: {other:?}"),
    }
}

#[test]
fn has_many_fetch_skips_soft_deleted_targets() {
    let conn = blog();
    let db = db(&conn);

    let ann = db.find::<User>(1).unwrap();
    let posts = ann.instance().fetch(&db, "posts").unwrap();

    let posts = posts.as_many().unwrap();
    assert_eq!(names(posts, "title"), vec![Value::from("first"), Value::from("second")]);
}

#[test]
fn has_many_eager_load_is_one_query() {
    let conn = blog();
    let db = db(&conn);

    let users = db.query::<User>().unwrap().with(&["posts"]).all().unwrap();
    assert_eq!(conn.query_count(), 2);

    assert_eq!(
        names(many(users[0].instance(), "posts"), "id"),
        vec![Value::from(1), Value::from(2)]
    );
    assert_eq!(names(many(users[1].instance(), "posts"), "id"), vec![Value::from(3)]);
    assert!(many(users[2].instance(), "posts").is_empty());

    assert_eq!(
        conn.queries()[1],
        r#"select "posts".* from "posts" where "posts"."deleted_at" is null and "posts"."users_id" in(1, 2, 3)"#
    );
}

#[test]
fn eager_load_matches_fetch() {
    let conn = blog();
    let db = db(&conn);

    let users = db.query::<User>().unwrap().with(&["posts", "profile"]).all().unwrap();

    for user in &users {
        for relation in ["posts", "profile"] {
            let fetched = user.instance().fetch(&db, relation).unwrap();
            assert_eq!(user.instance().related(relation), Some(&fetched));
        }
    }
}

#[test]
fn has_one_leaves_unmatched_owners_empty() {
    let conn = blog();
    let db = db(&conn);

    let users = db.query::<User>().unwrap().with(&["profile"]).all().unwrap();

    let profile = one(users[0].instance(), "profile").unwrap();
    assert_eq!(profile.get("bio").unwrap(), Value::from("hi"));
    assert_eq!(one(users[1].instance(), "profile"), None);
}

#[test]
fn belongs_to_eager_load() {
    let conn = blog();
    let db = db(&conn);

    let comments = db.all::<Comment>().unwrap();
    assert_eq!(conn.query_count(), 2);

    let post = one(comments[2].instance(), "post").unwrap();
    assert_eq!(post.get("title").unwrap(), Value::from("third"));
    assert!(post.structure().is::<Post>());
}

#[test]
fn eager_default_can_be_disabled() {
    let conn = blog();
    let db = db(&conn);

    let comments = db.query::<Comment>().unwrap().without(&["post"]).all().unwrap();

    assert_eq!(conn.query_count(), 1);
    assert!(!comments[0].instance().is_loaded("post"));
}

#[test]
fn null_keys_issue_no_query() {
    let conn = blog();
    let db = db(&conn);

    let orphans = db
        .query::<Profile>()
        .unwrap()
        .where_eq("id", 2)
        .with(&["user"])
        .all()
        .unwrap();

    assert_eq!(conn.query_count(), 1);
    assert_eq!(one(orphans[0].instance(), "user"), None);
}

#[test]
fn eager_load_of_nothing_issues_no_query() {
    let conn = blog();
    let db = db(&conn);

    let structure = Structure::of::<User>().unwrap();
    structure
        .eager_load_relations(&db, &mut [], &["posts"], &[])
        .unwrap();

    assert_eq!(conn.query_count(), 0);
}

#[test]
fn belongs_to_many_keeps_pivot_order() {
    let conn = blog();
    let db = db(&conn);

    let post = db.find::<Post>(1).unwrap();
    conn.clear_log();

    let tags = post.instance().fetch(&db, "tags").unwrap();
    assert_eq!(conn.query_count(), 2);
    assert_eq!(
        names(tags.as_many().unwrap(), "name"),
        vec![Value::from("sql"), Value::from("rust")]
    );
}

#[test]
fn belongs_to_many_eager_load_is_two_queries() {
    let conn = blog();
    let db = db(&conn);

    let posts = db.query::<Post>().unwrap().with(&["tags"]).all().unwrap();
    assert_eq!(conn.query_count(), 3);

    assert_eq!(
        names(many(posts[0].instance(), "tags"), "name"),
        vec![Value::from("sql"), Value::from("rust")]
    );
    assert!(many(posts[1].instance(), "tags").is_empty());
    // Post 3 is linked to rust twice
    assert_eq!(names(many(posts[2].instance(), "tags"), "name"), vec![Value::from("rust")]);

    for post in &posts {
        let fetched = post.instance().fetch(&db, "tags").unwrap();
        assert_eq!(post.instance().related("tags"), Some(&fetched));
    }
}

#[test]
fn missing_pivot_column_is_a_relation_error() {
    let conn = blog();
    conn.execute_batch(
        "create table posts_labels (POSTS_ID integer not null, tags_id integer not null);
         insert into posts_labels values (1, 1);",
    )
    .unwrap();
    let db = db(&conn);

    let post = db.find::<LabelledPost>(1).unwrap();
    let err = post.instance().fetch(&db, "labels").unwrap_err();

    assert!(err.is_relation());
    assert!(err.to_string().contains("`posts_id`"), "{err}");
    assert!(err.to_string().contains("posts_labels"), "{err}");
}

#[test]
fn belongs_to_many_query_uses_a_sub_query() {
    let conn = blog();
    let db = db(&conn);

    let post = db.find::<Post>(3).unwrap();
    let relation = Structure::of::<Post>().unwrap().get_relation("tags").unwrap();
    let query = relation.query(&db, post.instance()).unwrap();

    assert_eq!(
        query.query().to_sql().unwrap(),
        r#"select "tags".* from "tags" where "tags"."id" in(select "posts_tags"."tags_id" from "posts_tags" where "posts_tags"."posts_id" = ?)"#
    );
}

#[test]
fn nested_relations_load_on_children() {
    let conn = blog();
    let db = db(&conn);

    let users = db
        .query::<User>()
        .unwrap()
        .with(&["posts.comments"])
        .all()
        .unwrap();
    assert_eq!(conn.query_count(), 3);

    let posts = many(users[0].instance(), "posts");
    assert_eq!(
        names(many(&posts[0], "comments"), "body"),
        vec![Value::from("nice"), Value::from("meh")]
    );
    assert!(many(&posts[1], "comments").is_empty());
}

#[test]
fn morph_to_queries_once_per_type() {
    let conn = blog();
    let db = db(&conn);

    let images = db.query::<Image>().unwrap().with(&["imageable"]).all().unwrap();
    assert_eq!(conn.query_count(), 3);

    let first = one(images[0].instance(), "imageable").unwrap();
    assert!(first.structure().is::<User>());
    assert_eq!(first.get("name").unwrap(), Value::from("ann"));

    let second = one(images[1].instance(), "imageable").unwrap();
    assert!(second.structure().is::<Post>());
    assert_eq!(second.get("title").unwrap(), Value::from("third"));

    let third = one(images[2].instance(), "imageable").unwrap();
    assert_eq!(third.get("name").unwrap(), Value::from("bob"));
}

#[test]
fn morph_to_has_no_unscoped_query() {
    let conn = blog();
    let db = db(&conn);

    let relation = Structure::of::<Image>().unwrap().get_relation("imageable").unwrap();
    let err = relation.raw_query(&db).unwrap_err();
    assert!(err.is_relation());
}

#[test]
fn custom_relation_fetch_and_eager_load() {
    let conn = blog();
    let db = db(&conn);

    let users = db.query::<User>().unwrap().with(&["first_post"]).all().unwrap();
    // One query for the users, then one per user
    assert_eq!(conn.query_count(), 4);

    let first = one(users[0].instance(), "first_post").unwrap();
    assert_eq!(first.get("title").unwrap(), Value::from("first"));
    assert_eq!(one(users[2].instance(), "first_post"), None);
}

#[test]
fn relations_are_built_once() {
    let structure = Structure::of::<Post>().unwrap();
    let a = structure.get_relation("comments").unwrap();
    let b = structure.get_relation("comments").unwrap();

    assert!(std::sync::Arc::ptr_eq(&a, &b));
    assert_eq!(a.keys(), ("id", "posts_id"));
}

#[test]
fn default_relation_keys() {
    let post = Structure::of::<Post>().unwrap();
    assert_eq!(post.get_relation("author").unwrap().keys(), ("users_id", "id"));

    let user = Structure::of::<User>().unwrap();
    assert_eq!(user.get_relation("profile").unwrap().keys(), ("id", "users_id"));

    let image = Structure::of::<Image>().unwrap();
    assert_eq!(
        image.get_relation("imageable").unwrap().keys(),
        ("imageable_id", "imageable_type")
    );
}

#[test]
fn unknown_relation_is_an_error() {
    let structure = Structure::of::<User>().unwrap();

    assert!(structure.get_relation("friends").unwrap_err().is_structure());
    assert!(structure.get_relation("name").unwrap_err().is_relation());
}

#[test]
fn loaded_list_eager_loads_relations() {
    let conn = blog();
    let db = db(&conn);

    let users = db.all::<User>().unwrap();
    let users = users.load_relations(&db, &["posts"]).unwrap();

    assert_eq!(conn.query_count(), 2);
    assert_eq!(many(users[1].instance(), "posts").len(), 1);
}
