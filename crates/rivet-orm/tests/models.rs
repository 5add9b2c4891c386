//! Integration tests for models, persistence policies and relations against
//! in-memory SQLite.

use std::sync::Mutex;

use rivet_core::{row, SqlValue};
use rivet_db::{Connection, ConnectionConfig, RuntimeMode};
use rivet_orm::{
    Cast, Entity, Model, ModelEvent, OrmError, PersistencePolicy, Related, Relation,
};
use serde_json::json;

// =============================================================================
// Models
// =============================================================================

struct User;

impl Model for User {
    const TABLE: &'static str = "users";

    fn casts() -> Vec<(&'static str, Cast)> {
        vec![("is_admin", Cast::Bool), ("settings", Cast::Json)]
    }

    fn hidden() -> Vec<&'static str> {
        vec!["password"]
    }

    fn fillable() -> Vec<&'static str> {
        vec!["name", "email", "password", "is_admin"]
    }

    fn policy() -> PersistencePolicy {
        PersistencePolicy::new().with_timestamps().with_soft_deletes()
    }

    fn relations() -> Vec<Relation> {
        vec![
            Relation::has_one::<Profile>("profile", "user_id"),
            Relation::has_many::<Post>("posts", "user_id"),
            Relation::belongs_to_many::<Role>("roles", "role_user", "user_id", "role_id")
                .with_pivot(&["granted_by"]),
        ]
    }
}

struct Profile;

impl Model for Profile {
    const TABLE: &'static str = "profiles";
}

struct Post;

impl Model for Post {
    const TABLE: &'static str = "posts";

    fn casts() -> Vec<(&'static str, Cast)> {
        vec![("published", Cast::Bool)]
    }

    fn relations() -> Vec<Relation> {
        vec![
            Relation::belongs_to::<User>("author", "user_id"),
            Relation::has_many::<Comment>("comments", "post_id"),
        ]
    }
}

struct Comment;

impl Model for Comment {
    const TABLE: &'static str = "comments";

    fn policy() -> PersistencePolicy {
        PersistencePolicy::new().observe(|event: ModelEvent, comment: &mut Entity| {
            let body = comment.get("body");
            match event {
                ModelEvent::Creating => body != json!(""),
                ModelEvent::Deleting => body != json!("pinned"),
                _ => true,
            }
        })
    }
}

struct Role;

impl Model for Role {
    const TABLE: &'static str = "roles";
}

static TAG_EVENTS: Mutex<Vec<ModelEvent>> = Mutex::new(Vec::new());

struct Tag;

impl Model for Tag {
    const TABLE: &'static str = "tags";

    fn policy() -> PersistencePolicy {
        PersistencePolicy::new().observe(|event: ModelEvent, _tag: &mut Entity| {
            TAG_EVENTS.lock().unwrap().push(event);
            true
        })
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn connection() -> Connection {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut conn =
        Connection::new(ConnectionConfig::sqlite_memory().with_mode(RuntimeMode::Testing))
            .unwrap();
    let mut schema = conn.schema();
    schema
        .create("users", |t| {
            t.id();
            t.string("name");
            t.string("email");
            t.string("password").nullable();
            t.boolean("is_admin").default_value(false);
            t.text("settings").nullable();
            t.timestamps();
            t.soft_deletes();
        })
        .unwrap();
    schema
        .create("profiles", |t| {
            t.id();
            t.foreign_id("user_id");
            t.string("bio");
        })
        .unwrap();
    schema
        .create("posts", |t| {
            t.id();
            t.foreign_id("user_id");
            t.string("title");
            t.boolean("published");
        })
        .unwrap();
    schema
        .create("comments", |t| {
            t.id();
            t.foreign_id("post_id");
            t.string("body");
        })
        .unwrap();
    schema
        .create("roles", |t| {
            t.id();
            t.string("name");
        })
        .unwrap();
    schema
        .create("role_user", |t| {
            t.foreign_id("user_id");
            t.foreign_id("role_id");
            t.string("granted_by").nullable();
        })
        .unwrap();
    schema
        .create("tags", |t| {
            t.id();
            t.string("name");
        })
        .unwrap();
    conn
}

fn create_user(conn: &mut Connection, name: &str) -> Entity {
    User::create(
        conn,
        row! {
            "name" => name,
            "email" => format!("{}@example.com", name.to_lowercase()),
            "password" => "hunter2",
        },
    )
    .unwrap()
}

fn key(entity: &Entity) -> i64 {
    entity.key().and_then(SqlValue::as_i64).unwrap()
}

/// Three users with two posts each; the second post of every user has one
/// comment.
fn seed_blog(conn: &mut Connection) -> Vec<i64> {
    let mut ids = Vec::new();
    for name in ["Ada", "Brian", "Chloe"] {
        let user = create_user(conn, name);
        let user_id = key(&user);
        for n in 1..=2 {
            let post = Post::create(
                conn,
                row! {
                    "user_id" => user_id,
                    "title" => format!("{name} #{n}"),
                    "published" => n == 1,
                },
            )
            .unwrap();
            if n == 2 {
                Comment::create(conn, row! { "post_id" => key(&post), "body" => "nice" }).unwrap();
            }
        }
        ids.push(user_id);
    }
    ids
}

// =============================================================================
// Persistence
// =============================================================================

#[test]
fn create_sets_key_and_timestamps() {
    let mut conn = connection();
    let user = create_user(&mut conn, "Ada");

    assert!(user.exists());
    assert_eq!(user.key(), Some(&SqlValue::Int(1)));
    assert!(!user.is_dirty());
    assert!(matches!(user.get_raw("created_at"), Some(SqlValue::Timestamp(_))));
    assert_eq!(user.get_raw("created_at"), user.get_raw("updated_at"));
    assert_eq!(conn.table("users").count().unwrap(), 1);
}

#[test]
fn clean_save_issues_no_statements() {
    let mut conn = connection();
    create_user(&mut conn, "Ada");
    let mut user = User::find_or_fail(&mut conn, 1).unwrap();

    conn.enable_query_log();
    assert!(user.save(&mut conn).unwrap());
    assert!(conn.query_log().is_empty());

    user.set("name", "Ada Lovelace");
    assert!(user.save(&mut conn).unwrap());
    let log = conn.query_log();
    assert_eq!(log.len(), 1);
    assert!(log[0].sql.starts_with("UPDATE \"users\" SET"));
    assert!(log[0].sql.contains("\"name\" = ?"));
    assert!(!log[0].sql.contains("\"email\""));
    assert!(!user.is_dirty());

    user.refresh(&mut conn).unwrap();
    assert_eq!(user.get("name"), "Ada Lovelace");
}

#[test]
fn hydrated_rows_serialize_visible_columns() {
    let mut conn = connection();
    let mut user = create_user(&mut conn, "Ada");
    user.set_json("settings", &json!({"theme": "dark"})).unwrap();
    user.save(&mut conn).unwrap();

    let user = User::find(&mut conn, 1).unwrap().unwrap();
    let array = user.to_array();
    assert!(!array.contains_key("password"));
    assert_eq!(array["is_admin"], json!(false));
    assert_eq!(array["settings"], json!({"theme": "dark"}));
    assert_eq!(array["name"], json!("Ada"));
    assert_eq!(array["deleted_at"], json!(null));

    let rehydrated = User::hydrate(user.attributes().clone());
    assert_eq!(rehydrated.to_array(), array);
}

#[test]
fn update_and_hard_delete() {
    let mut conn = connection();
    seed_blog(&mut conn);
    let mut post = Post::find_or_fail(&mut conn, 1).unwrap();
    assert_eq!(post.get("published"), json!(true));

    post.update(&mut conn, row! { "published" => false }).unwrap();
    assert_eq!(
        Post::find_or_fail(&mut conn, 1).unwrap().get("published"),
        json!(false)
    );

    assert!(post.delete(&mut conn).unwrap());
    assert!(!post.exists());
    assert!(Post::find(&mut conn, 1).unwrap().is_none());
    assert!(matches!(post.delete(&mut conn), Err(OrmError::NotPersisted(_))));
}

#[test]
fn mass_assignment_is_rejected() {
    let mut conn = connection();
    let err = User::create(&mut conn, row! { "name" => "Eve", "deleted_at" => SqlValue::Null })
        .unwrap_err();
    assert!(matches!(err, OrmError::MassAssignment { attribute, .. } if attribute == "deleted_at"));
    assert_eq!(conn.table("users").count().unwrap(), 0);
}

#[test]
fn find_or_fail_reports_the_key() {
    let mut conn = connection();
    let err = User::find_or_fail(&mut conn, 42).unwrap_err();
    assert!(matches!(
        err,
        OrmError::ModelNotFound { ref model, ref key } if model == "User" && key == "42"
    ));
}

// =============================================================================
// Soft deletes
// =============================================================================

#[test]
fn soft_delete_hides_rows_until_restored() {
    let mut conn = connection();
    create_user(&mut conn, "Ada");
    let mut brian = create_user(&mut conn, "Brian");

    assert!(brian.delete(&mut conn).unwrap());
    assert!(brian.trashed());
    assert!(brian.exists());
    assert_eq!(conn.table("users").count().unwrap(), 2);

    assert_eq!(User::query(&mut conn).count().unwrap(), 1);
    assert!(User::find(&mut conn, 2).unwrap().is_none());
    assert_eq!(User::query(&mut conn).with_trashed().count().unwrap(), 2);
    let trashed = User::query(&mut conn).only_trashed().get().unwrap();
    assert_eq!(trashed.len(), 1);
    assert_eq!(trashed[0].get("name"), "Brian");

    assert!(brian.restore(&mut conn).unwrap());
    assert!(!brian.trashed());
    assert_eq!(User::query(&mut conn).count().unwrap(), 2);

    assert!(brian.force_delete(&mut conn).unwrap());
    assert_eq!(conn.table("users").count().unwrap(), 1);
}

#[test]
fn soft_delete_scope_wraps_disjunctions() {
    let mut conn = connection();
    create_user(&mut conn, "Ada");
    create_user(&mut conn, "Brian").delete(&mut conn).unwrap();

    let mut query = User::query(&mut conn)
        .where_eq("name", "Ada")
        .or_where_eq("name", "Brian");
    assert_eq!(
        query.to_sql().unwrap(),
        "SELECT * FROM \"users\" WHERE (\"name\" = ? OR \"name\" = ?) AND \"users\".\"deleted_at\" IS NULL"
    );
    assert_eq!(query.get().unwrap().len(), 1);
}

#[test]
fn restore_requires_soft_deletes() {
    let mut conn = connection();
    seed_blog(&mut conn);
    let mut post = Post::find_or_fail(&mut conn, 1).unwrap();
    assert!(matches!(post.restore(&mut conn), Err(OrmError::NotSoftDeletable(_))));
}

// =============================================================================
// Lifecycle hooks
// =============================================================================

#[test]
fn hooks_cancel_the_step() {
    let mut conn = connection();
    seed_blog(&mut conn);

    let blank = Comment::create(&mut conn, row! { "post_id" => 1, "body" => "" }).unwrap();
    assert!(!blank.exists());
    assert_eq!(conn.table("comments").count().unwrap(), 3);

    let mut pinned = Comment::create(&mut conn, row! { "post_id" => 1, "body" => "pinned" }).unwrap();
    assert!(pinned.exists());
    assert!(!pinned.delete(&mut conn).unwrap());
    assert!(pinned.exists());
    assert_eq!(conn.table("comments").count().unwrap(), 4);
}

#[test]
fn events_fire_in_order() {
    let mut conn = connection();
    let mut tag = Tag::create(&mut conn, row! { "name" => "rust" }).unwrap();
    tag.save(&mut conn).unwrap();
    tag.update(&mut conn, row! { "name" => "sql" }).unwrap();
    tag.delete(&mut conn).unwrap();

    use ModelEvent::*;
    assert_eq!(
        *TAG_EVENTS.lock().unwrap(),
        vec![
            Saving, Creating, Created, Saved, // create
            Saving, Saved, // clean save
            Saving, Updating, Updated, Saved, // update
            Deleting, Deleted,
        ]
    );
}

// =============================================================================
// Relations
// =============================================================================

#[test]
fn eager_loading_uses_one_query_per_relation() {
    let mut conn = connection();
    seed_blog(&mut conn);

    conn.enable_query_log();
    let users = User::query(&mut conn).with(&["posts"]).get().unwrap();
    assert_eq!(conn.query_log().len(), 2);
    assert!(conn.query_log()[1]
        .sql
        .contains("\"posts\".\"user_id\" IN (?, ?, ?)"));

    for user in &users {
        let posts = user.relation("posts").unwrap();
        assert_eq!(posts.len(), 2);
        assert!(posts
            .as_many()
            .iter()
            .all(|post| post.get("user_id") == user.get("id")));
    }
}

#[test]
fn lazy_loading_queries_once_per_entity() {
    let mut conn = connection();
    seed_blog(&mut conn);
    let mut users = User::all(&mut conn).unwrap();

    conn.enable_query_log();
    for user in &mut users {
        assert_eq!(user.related(&mut conn, "posts").unwrap().len(), 2);
    }
    assert_eq!(conn.query_log().len(), 3);

    conn.flush_query_log();
    for user in &mut users {
        user.related(&mut conn, "posts").unwrap();
    }
    assert!(conn.query_log().is_empty());
}

#[test]
fn nested_eager_loading_adds_one_query_per_level() {
    let mut conn = connection();
    seed_blog(&mut conn);

    conn.enable_query_log();
    let users = User::query(&mut conn)
        .with(&["posts.comments"])
        .order_by_desc("id")
        .get()
        .unwrap();
    assert_eq!(conn.query_log().len(), 3);

    let chloe = &users[0];
    assert_eq!(chloe.get("name"), "Chloe");
    let posts = chloe.relation("posts").unwrap().as_many();
    let comments: Vec<usize> = posts
        .iter()
        .map(|post| post.relation("comments").unwrap().len())
        .collect();
    assert_eq!(comments, vec![0, 1]);
}

#[test]
fn belongs_to_and_has_one() {
    let mut conn = connection();
    seed_blog(&mut conn);
    Profile::create(&mut conn, row! { "user_id" => 2, "bio" => "Engineer" }).unwrap();

    let mut post = Post::find_or_fail(&mut conn, 3).unwrap();
    let author = post.related(&mut conn, "author").unwrap().as_one().unwrap();
    assert_eq!(author.get("name"), "Brian");

    let users = User::query(&mut conn).with(&["profile"]).get().unwrap();
    let bios: Vec<Option<String>> = users
        .iter()
        .map(|user| {
            user.relation("profile")
                .and_then(Related::as_one)
                .map(|profile| profile.get("bio").as_str().unwrap_or_default().to_string())
        })
        .collect();
    assert_eq!(bios, vec![None, Some(String::from("Engineer")), None]);
}

#[test]
fn soft_deleted_parents_are_not_loaded() {
    let mut conn = connection();
    seed_blog(&mut conn);
    User::find_or_fail(&mut conn, 1).unwrap().delete(&mut conn).unwrap();

    let posts = Post::query(&mut conn).with(&["author"]).get().unwrap();
    assert_eq!(posts.len(), 6);
    assert!(matches!(posts[0].relation("author"), Some(Related::One(None))));
    assert_eq!(
        posts[2].relation("author").and_then(Related::as_one).map(|a| a.get("name")),
        Some(json!("Brian"))
    );
}

#[test]
fn many_to_many_with_pivot_columns() {
    let mut conn = connection();
    seed_blog(&mut conn);
    for name in ["admin", "editor", "viewer"] {
        conn.table("roles").insert(row! { "name" => name }).unwrap();
    }
    conn.table("role_user")
        .insert_many(&[
            row! { "user_id" => 1, "role_id" => 1, "granted_by" => "root" },
            row! { "user_id" => 1, "role_id" => 2, "granted_by" => "root" },
            row! { "user_id" => 2, "role_id" => 2, "granted_by" => "ada" },
        ])
        .unwrap();

    conn.enable_query_log();
    let users = User::query(&mut conn).with(&["roles"]).get().unwrap();
    assert_eq!(conn.query_log().len(), 2);

    let mut ada_roles: Vec<String> = users[0]
        .relation("roles")
        .unwrap()
        .as_many()
        .iter()
        .map(|role| role.get("name").as_str().unwrap_or_default().to_string())
        .collect();
    ada_roles.sort();
    assert_eq!(ada_roles, vec!["admin", "editor"]);

    let brian_roles = users[1].relation("roles").unwrap().as_many();
    assert_eq!(brian_roles.len(), 1);
    let pivot = brian_roles[0].pivot().unwrap();
    assert_eq!(pivot.get("granted_by"), Some(&SqlValue::Text("ada".into())));
    assert_eq!(pivot.get("user_id").and_then(SqlValue::as_i64), Some(2));
    assert!(!brian_roles[0].attributes().contains_key("pivot_granted_by"));
    assert_eq!(brian_roles[0].to_array()["pivot"]["granted_by"], json!("ada"));

    assert!(users[2].relation("roles").unwrap().is_empty());
}

#[test]
fn unknown_relation_is_an_error() {
    let mut conn = connection();
    seed_blog(&mut conn);
    let err = User::query(&mut conn).with(&["followers"]).get().unwrap_err();
    assert!(matches!(
        err,
        OrmError::UnknownRelation { ref relation, .. } if relation == "followers"
    ));
}

#[test]
fn paginate_eager_loads_the_page() {
    let mut conn = connection();
    seed_blog(&mut conn);

    let page = User::query(&mut conn)
        .with(&["posts"])
        .order_by_desc("id")
        .paginate(2, 1)
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.last_page, 2);
    assert_eq!(page.data.len(), 2);
    assert!(page.data.iter().all(|user| user.relation_loaded("posts")));

    let value = serde_json::to_value(&page).unwrap();
    assert_eq!(value["data"][0]["name"], json!("Chloe"));
    assert_eq!(value["data"][0]["posts"][0]["title"], json!("Chloe #1"));
    assert!(value["data"][0].get("password").is_none());
}
