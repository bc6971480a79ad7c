//! Round trips against a live server. Skipped when `DATABASE_URL` is unset.

use pgschema::prelude::*;
use pgschema::{CreateAllOptions, MigrateToOptions, create_all};

async fn try_connect() -> Option<tokio_postgres::Client> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").ok()?;
    let (client, connection) = tokio_postgres::connect(&database_url, tokio_postgres::NoTls)
        .await
        .expect("Failed to connect to DATABASE_URL with NoTls");
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            eprintln!("tokio-postgres connection error: {e}");
        }
    });
    Some(client)
}

/// A catalog rooted in a freshly emptied schema.
async fn fresh_catalog(client: &tokio_postgres::Client, schema: &str) -> Catalog {
    client
        .batch_execute(&format!("DROP SCHEMA IF EXISTS {schema} CASCADE"))
        .await
        .unwrap();
    Catalog::new(CatalogConfig::new().default_schema(schema))
}

async fn drop_schema(client: &tokio_postgres::Client, schema: &str) {
    client
        .batch_execute(&format!("DROP SCHEMA IF EXISTS {schema} CASCADE"))
        .await
        .unwrap();
}

sql_enum! {
    enum Mood as "mood" in "pgschema_it_enum" {
        Happy => "happy",
        Sad => "sad",
    }
}

sql_enum! {
    enum Weather as "weather" in "pgschema_it_enum_twice" {
        Sunny => "sunny",
        Rainy => "rainy",
    }
}

#[tokio::test]
async fn table_lifecycle() {
    let Some(client) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let catalog = fresh_catalog(&client, "pgschema_it_basic").await;
    let t = catalog
        .table("t")
        .column::<i32>("a", Column::new().primary_key())
        .field::<i32>("b")
        .build()
        .unwrap();

    t.create(&client, &CreateOptions::default()).await.unwrap();
    assert!(t.exists(&client).await.unwrap());

    t.insert(&client, &record! { "a" => 1, "b" => 2 }, &InsertOptions::default())
        .await
        .unwrap();
    t.insert_many(
        &client,
        vec![record! { "a" => 2, "b" => 4 }, record! { "a" => 3, "b" => 6 }].into(),
        &InsertOptions::default(),
    )
    .await
    .unwrap();

    let rows = t
        .fetch(
            &client,
            &record! { "b__ge" => 4 },
            &FetchOptions::new().order_by("a", Direction::Asc),
        )
        .await
        .unwrap();
    let ids: Vec<i32> = rows.iter().map(|r| r.try_get("a").unwrap()).collect();
    assert_eq!(ids, [2, 3]);

    let rows = t
        .fetch(&client, &record! { "a__in" => vec![1, 3] }, &FetchOptions::default())
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);

    let upserted = t
        .insert(
            &client,
            &record! { "a" => 1, "b" => 20 },
            &InsertOptions::new().update_on_conflict(["b"]).returning_all(),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(upserted.try_get::<i32>("b").unwrap(), 20);

    let row = t.fetch_row(&client, &record! { "a" => 1 }).await.unwrap().unwrap();
    t.update_record(&client, &row, &record! { "b" => Value::Null })
        .await
        .unwrap();
    let nulls = t
        .fetch(&client, &record! { "b" => Value::Null }, &FetchOptions::default())
        .await
        .unwrap();
    assert_eq!(nulls.len(), 1);

    let deleted = t.delete(&client, &record! { "b__gt" => 5 }).await.unwrap();
    assert_eq!(deleted, 1);

    t.drop(&client, &DropOptions::default()).await.unwrap();
    assert!(!t.exists(&client).await.unwrap());
    drop_schema(&client, "pgschema_it_basic").await;
}

#[tokio::test]
async fn joined_tables_fetch() {
    let Some(client) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let catalog = fresh_catalog(&client, "pgschema_it_join").await;
    let users = catalog
        .table("users")
        .column::<i32>("user_id", Column::new().primary_key())
        .field::<String>("name")
        .build()
        .unwrap();
    let orders = catalog
        .table("orders")
        .column::<i32>("order_id", Column::new().primary_key())
        .column::<i32>("user_id", Column::new().references(users.reference("user_id").unwrap()))
        .field::<i64>("total")
        .build()
        .unwrap();

    create_all(&client, &[&users, &orders], CreateAllOptions::default())
        .await
        .unwrap();
    users
        .insert(&client, &record! { "user_id" => 1, "name" => "ada" }, &InsertOptions::default())
        .await
        .unwrap();
    orders
        .insert_many(
            &client,
            vec![
                record! { "order_id" => 10, "user_id" => 1, "total" => 5 },
                record! { "order_id" => 11, "user_id" => 1, "total" => 7 },
            ]
            .into(),
            &InsertOptions::default(),
        )
        .await
        .unwrap();

    let join = users.inner_join(&orders, ("user_id", "user_id")).unwrap();
    let rows = join
        .fetch(&client, &record! { "name" => "ada" }, &FetchOptions::default())
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.contains("total") && r.contains("name")));
    drop_schema(&client, "pgschema_it_join").await;
}

#[tokio::test]
async fn enum_columns_round_trip() {
    let Some(client) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let catalog = fresh_catalog(&client, "pgschema_it_enum").await;
    let mood = catalog.enum_type::<Mood>();
    let people = catalog
        .table("people")
        .column::<i32>("id", Column::new().primary_key())
        .field_as("mood", FieldType::enumeration::<Mood>())
        .build()
        .unwrap();

    create_all(&client, &[&mood, &people], CreateAllOptions::default())
        .await
        .unwrap();
    mood.create(&client, &CreateOptions::default()).await.unwrap();

    people
        .insert(&client, &record! { "id" => 1, "mood" => Mood::Sad }, &InsertOptions::default())
        .await
        .unwrap();
    let row = people
        .fetch_row(&client, &record! { "mood" => Mood::Sad })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.get("mood"), Some(&Value::from(Mood::Sad)));
    drop_schema(&client, "pgschema_it_enum").await;
}

#[tokio::test]
async fn cached_table_reads_through() {
    let Some(client) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let catalog = fresh_catalog(&client, "pgschema_it_cache").await;
    let table = catalog
        .table("kv")
        .column::<String>("k", Column::new().primary_key())
        .field::<String>("v")
        .build()
        .unwrap();
    let cached = catalog.cached(table).unwrap();
    cached.create(&client, &CreateOptions::default()).await.unwrap();

    cached
        .insert(&client, &record! { "k" => "a", "v" => "1" }, &InsertOptions::default())
        .await
        .unwrap();
    assert_eq!(cached.cached_len(), 1);

    // Out-of-band writes stay invisible to keyed reads until the cache is cleared.
    client
        .batch_execute("UPDATE pgschema_it_cache.kv SET v = '2'")
        .await
        .unwrap();
    let row = cached.fetch_row(&client, &record! { "k" => "a" }).await.unwrap().unwrap();
    assert_eq!(row.try_get::<String>("v").unwrap(), "1");

    cached.clear_cache();
    let row = cached.fetch_row(&client, &record! { "k" => "a" }).await.unwrap().unwrap();
    assert_eq!(row.try_get::<String>("v").unwrap(), "2");

    cached.delete_record(&client, &row).await.unwrap();
    assert_eq!(cached.cached_len(), 0);
    drop_schema(&client, "pgschema_it_cache").await;
}

#[tokio::test]
async fn migrations_follow_the_declaration() {
    let Some(client) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let catalog = fresh_catalog(&client, "pgschema_it_migrate").await;
    let v1 = catalog
        .table("items")
        .column::<i32>("id", Column::new().primary_key())
        .field::<String>("old")
        .build()
        .unwrap();
    v1.create(&client, &CreateOptions::default()).await.unwrap();
    v1.insert(&client, &record! { "id" => 1, "old" => "x" }, &InsertOptions::default())
        .await
        .unwrap();

    let v2 = catalog
        .table("items")
        .column::<i32>("id", Column::new().primary_key())
        .field::<i64>("fresh")
        .build()
        .unwrap();
    v2.create(&client, &CreateOptions::new().automatic_migrations(true))
        .await
        .unwrap();
    let row = v2.fetch_row(&client, &record! { "id" => 1 }).await.unwrap().unwrap();
    assert!(!row.contains("old"));
    assert_eq!(row.get("fresh"), Some(&Value::Null));

    let copy = catalog
        .table("items_copy")
        .column::<i32>("id", Column::new().primary_key())
        .field::<i64>("fresh")
        .build()
        .unwrap();
    v2.migrate_to(
        &client,
        &copy,
        |mut r| {
            r.insert("fresh", 42);
            r
        },
        MigrateToOptions {
            create_new_table: true,
            drop_table: true,
        },
    )
    .await
    .unwrap();
    assert!(!v2.exists(&client).await.unwrap());
    let row = copy.fetch_row(&client, &record! { "id" => 1 }).await.unwrap().unwrap();
    assert_eq!(row.try_get::<i64>("fresh").unwrap(), 42);
    drop_schema(&client, "pgschema_it_migrate").await;
}

#[tokio::test]
async fn create_all_twice_with_an_enum() {
    let Some(client) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let catalog = fresh_catalog(&client, "pgschema_it_enum_twice").await;
    let weather = catalog.enum_type::<Weather>();
    let people = catalog
        .table("people")
        .column::<i32>("id", Column::new().primary_key())
        .field_as("weather", FieldType::enumeration::<Weather>())
        .build()
        .unwrap();

    for _ in 0..2 {
        create_all(&client, &[&weather, &people], CreateAllOptions::default())
            .await
            .unwrap();
    }
    assert!(people.exists(&client).await.unwrap());
    drop_schema(&client, "pgschema_it_enum_twice").await;
}

#[tokio::test]
async fn create_all_respects_the_callers_transaction() {
    let Some(mut client) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let catalog = fresh_catalog(&client, "pgschema_it_tx").await;
    let t = catalog
        .table("t")
        .column::<i32>("a", Column::new().primary_key())
        .build()
        .unwrap();

    let tx = client.transaction().await.unwrap();
    create_all(&tx, &[&t], CreateAllOptions::default())
        .await
        .unwrap();
    assert!(t.exists(&tx).await.unwrap());
    tx.rollback().await.unwrap();

    assert!(!t.exists(&client).await.unwrap());
    drop_schema(&client, "pgschema_it_tx").await;
}
