#![allow(dead_code, unused_macros)]

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use strata::{
    caster::DateTimeCaster,
    driver::{logging::LoggingConnection, Backend},
    schema::Builder,
    sql::Order,
    Db, Instance, Model, ModelQuery, Related, RelationHandler, Result, Value,
};

/// Declares a model wrapping an [`Instance`].
macro_rules! model {
    ($name:ident, |$model:ident| $define:block) => {
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name(pub Instance);

        impl Model for $name {
            fn define($model: &mut Builder) $define

            fn from_instance(instance: Instance) -> Result<Self> {
                Ok($name(instance))
            }

            fn into_instance(self) -> Instance {
                self.0
            }

            fn instance(&self) -> &Instance {
                &self.0
            }

            fn instance_mut(&mut self) -> &mut Instance {
                &mut self.0
            }
        }
    };
}

/// Number of times the `shout` macro of [`User`] ran.
pub static SHOUTS: AtomicUsize = AtomicUsize::new(0);

model!(User, |model| {
    model.primary_key("id");
    model.column("name").alias("username");
    model.column("email").hidden();
    model.has_many::<Post>("posts");
    model.has_one::<Profile>("profile");
    model.custom_relation("first_post", FirstPost);
    model
        .macro_("name_length", |user| {
            let name = user.get("name")?.into_string()?;
            Ok(Value::from(name.len() as i64))
        })
        .visible();
    model.cached_macro("shout", |user| {
        SHOUTS.fetch_add(1, Ordering::SeqCst);
        Ok(Value::from(user.get("name")?.into_string()?.to_uppercase()))
    });
    model.declare_macro("rank");
});

model!(Profile, |model| {
    model.primary_key("id");
    model.column("users_id");
    model.column("bio");
    model.belongs_to::<User>("user");
});

model!(Post, |model| {
    model.primary_key("id");
    model.column("users_id");
    model.column("title");
    model.column("deleted_at").caster(DateTimeCaster::new());
    model.soft_delete("deleted_at");
    model.belongs_to::<User>("author");
    model.has_many::<Comment>("comments");
    model.belongs_to_many::<Tag>("tags");
});

model!(Comment, |model| {
    model.primary_key("id");
    model.column("posts_id");
    model.column("body");
    model.belongs_to::<Post>("post").eager();
});

model!(Tag, |model| {
    model.primary_key("id");
    model.column("name");
});

model!(Image, |model| {
    model.primary_key("id");
    model.column("imageable_id");
    model.column("imageable_type");
    model
        .morph_to("imageable")
        .morph::<User>("user")
        .morph::<Post>("post");
});

model!(Vehicle, |model| {
    model.primary_key("id");
    model.column("kind");
    model.column("wheels");
    model
        .polymorphic("type", "kind")
        .subtype::<Car>("car")
        .subtype::<Bike>("bike");
});

model!(Car, |model| {
    model.parent::<Vehicle>();
    model.column("doors");
});

model!(Bike, |model| {
    model.parent::<Vehicle>();
});

model!(Setting, |model| {
    model.primary_key("id");
    model.column("name");
    model.column("value");
    model.on_duplicate_key_update(&["value"]);
});

/// The oldest post of a user, by id.
#[derive(Debug)]
pub struct FirstPost;

impl RelationHandler for FirstPost {
    fn fetch(&self, db: &Db, owner: &Instance) -> Result<Related> {
        let first = self.query(db, owner)?.first()?;
        Ok(Related::One(first))
    }

    fn query(&self, db: &Db, owner: &Instance) -> Result<ModelQuery<Instance>> {
        Ok(ModelQuery::instances(db, Post::structure()?)?
            .where_eq("users_id", owner.get("id")?)
            .order_by("id", Order::Asc))
    }
}

const SCHEMA: &str = "
    create table users (id integer primary key, name text not null, email text);
    create table profiles (id integer primary key, users_id integer, bio text);
    create table posts (
        id integer primary key,
        users_id integer not null,
        title text not null,
        deleted_at text
    );
    create table comments (id integer primary key, posts_id integer not null, body text);
    create table tags (id integer primary key, name text not null unique);
    create table posts_tags (posts_id integer not null, tags_id integer not null);
    create table images (
        id integer primary key,
        imageable_id integer not null,
        imageable_type text not null
    );
    create table vehicles (id integer primary key, kind text, wheels integer, doors integer);
    create table settings (id integer primary key, name text not null unique, value text);
";

const SEED: &str = "
    insert into users (id, name, email) values
        (1, 'ann', 'ann@example.com'),
        (2, 'bob', 'bob@example.com'),
        (3, 'cid', 'cid@example.com');

    insert into profiles (id, users_id, bio) values (1, 1, 'hi'), (2, null, 'orphan');

    insert into posts (id, users_id, title, deleted_at) values
        (1, 1, 'first', null),
        (2, 1, 'second', null),
        (3, 2, 'third', null),
        (4, 1, 'gone', '2024-01-01 00:00:00');

    insert into comments (id, posts_id, body) values (1, 1, 'nice'), (2, 1, 'meh'), (3, 3, 'ok');

    insert into tags (id, name) values (1, 'rust'), (2, 'sql');

    insert into posts_tags (posts_id, tags_id) values (1, 2), (1, 1), (3, 1), (3, 1);

    insert into images (id, imageable_id, imageable_type) values
        (1, 1, 'user'),
        (2, 3, 'post'),
        (3, 2, 'user');

    insert into vehicles (id, kind, wheels, doors) values (1, 'car', 4, 5), (2, 'bike', 2, null);

    insert into settings (id, name, value) values (1, 'theme', 'dark');
";

/// An in-memory SQLite database holding a small blog.
///
/// - users: ann (1), bob (2), cid (3)
/// - profiles: ann's (1) and one without a user (2)
/// - posts: ann has 1 and 2, bob has 3; post 4 of ann is soft deleted
/// - comments: two on post 1, one on post 3
/// - tags: rust (1), sql (2); post 1 is tagged sql then rust, post 3 is
///   tagged rust twice
/// - images: of ann, of post 3, of bob
/// - vehicles: a car (1) and a bike (2)
pub fn blog() -> Arc<LoggingConnection> {
    let conn = LoggingConnection::sqlite(Backend::Sqlite).unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    conn.execute_batch(SEED).unwrap();
    Arc::new(conn)
}

/// A `Db` whose default connection is `conn`.
pub fn db(conn: &Arc<LoggingConnection>) -> Db {
    let db = Db::builder().build();
    db.register_connection("default", conn.clone());
    db
}
