use super::*;
use crate::column::Column;
use crate::record;
use crate::table::Table;
use crate::test_support::RecordingClient;
use crate::types::TypeRegistry;

fn t(registry: &TypeRegistry) -> Table {
    Table::builder(registry, "t")
        .column::<i32>("a", Column::new().primary_key())
        .field::<i32>("b")
        .field::<String>("c")
        .build()
        .unwrap()
}

#[test]
fn insert_statement_shapes() {
    let registry = TypeRegistry::with_defaults();
    let table = t(&registry);

    assert_eq!(
        table.query_insert(&["a", "b"], &InsertOptions::default()).unwrap(),
        "INSERT INTO public.t (a, b) VALUES ($1, $2)"
    );
    assert_eq!(
        table.query_insert(&[], &InsertOptions::default()).unwrap(),
        "INSERT INTO public.t DEFAULT VALUES"
    );
    assert_eq!(
        table
            .query_insert(&["a"], &InsertOptions::new().ignore_on_conflict())
            .unwrap(),
        "INSERT INTO public.t (a) VALUES ($1) ON CONFLICT DO NOTHING"
    );
    assert_eq!(
        table
            .query_insert(
                &["a", "b", "c"],
                &InsertOptions::new()
                    .update_on_conflict(["b", "c"])
                    .returning_all()
            )
            .unwrap(),
        "INSERT INTO public.t (a, b, c) VALUES ($1, $2, $3) ON CONFLICT (a) DO UPDATE SET b = EXCLUDED.b, c = EXCLUDED.c RETURNING *"
    );
    assert_eq!(
        table
            .query_insert(
                &["a", "b"],
                &InsertOptions::new()
                    .update_on_conflict_raw("b = t.b + 1")
                    .returning(["a"])
            )
            .unwrap(),
        "INSERT INTO public.t (a, b) VALUES ($1, $2) ON CONFLICT (a) DO UPDATE SET b = t.b + 1 RETURNING a"
    );
}

#[test]
fn conflicting_conflict_options_are_rejected() {
    let registry = TypeRegistry::with_defaults();
    let table = t(&registry);
    let options = InsertOptions::new()
        .ignore_on_conflict()
        .update_on_conflict(["b"]);
    let err = table.query_insert(&["a"], &options).unwrap_err();
    assert!(matches!(err, OrmError::InvalidArgument(_)));
}

#[test]
fn unknown_columns_are_rejected() {
    let registry = TypeRegistry::with_defaults();
    let table = t(&registry);
    assert!(
        table
            .query_insert(&["zzz"], &InsertOptions::default())
            .unwrap_err()
            .is_unknown_column()
    );
    assert!(
        table
            .query_insert(&["a"], &InsertOptions::new().returning(["zzz"]))
            .unwrap_err()
            .is_unknown_column()
    );
    assert!(
        table
            .query_update("a = $1", 2, &["zzz"], None)
            .unwrap_err()
            .is_unknown_column()
    );
}

#[test]
fn update_numbers_set_after_where() {
    let registry = TypeRegistry::with_defaults();
    let table = t(&registry);
    assert_eq!(
        table.query_update("a = $1", 2, &["b", "c"], None).unwrap(),
        "UPDATE public.t SET b = $2, c = $3 WHERE a = $1"
    );
    assert_eq!(
        table
            .query_update("", 1, &["b"], Some(&Returning::All))
            .unwrap(),
        "UPDATE public.t SET b = $1 RETURNING *"
    );
    assert!(table.query_update("a = $1", 2, &[], None).is_err());
}

#[test]
fn delete_statement_shapes() {
    let registry = TypeRegistry::with_defaults();
    let table = t(&registry);
    assert_eq!(table.query_delete(None, None).unwrap(), "DELETE FROM public.t");
    assert_eq!(
        table
            .query_delete(Some("b > $1"), Some(&Returning::Columns(vec!["a".into()])))
            .unwrap(),
        "DELETE FROM public.t WHERE b > $1 RETURNING a"
    );
}

#[test]
fn primary_key_values_need_every_key() {
    let registry = TypeRegistry::with_defaults();
    let table = t(&registry);
    let keys = table
        .primary_key_values(&record! { "b" => 2, "a" => 1 })
        .unwrap();
    assert_eq!(keys, record! { "a" => 1 });
    assert!(table.primary_key_values(&record! { "b" => 2 }).is_err());
}

#[tokio::test]
async fn insert_binds_values_in_record_order() {
    let registry = TypeRegistry::with_defaults();
    let table = t(&registry);
    let client = RecordingClient::new();

    let returned = table
        .insert(&client, &record! { "c" => "x", "a" => 1 }, &InsertOptions::default())
        .await
        .unwrap();
    assert!(returned.is_none());

    client.respond(vec![record! { "a" => 2, "b" => Value::Null, "c" => "y" }]);
    let returned = table
        .insert(
            &client,
            &record! { "a" => 2, "c" => "y" },
            &InsertOptions::new().returning_all(),
        )
        .await
        .unwrap();
    assert_eq!(returned.unwrap().get("c"), Some(&Value::from("y")));

    let statements = client.statements();
    assert_eq!(statements[0].0, "INSERT INTO public.t (c, a) VALUES ($1, $2)");
    assert_eq!(statements[0].1, [Value::from("x"), Value::Int(1)]);
    assert_eq!(
        statements[1].0,
        "INSERT INTO public.t (a, c) VALUES ($1, $2) RETURNING *"
    );
}

#[tokio::test]
async fn insert_many_runs_one_statement_per_row() {
    let registry = TypeRegistry::with_defaults();
    let table = t(&registry);
    let client = RecordingClient::new();

    table
        .insert_many(
            &client,
            InsertRows::Positional {
                columns: vec!["a".into(), "b".into()],
                rows: vec![
                    vec![Value::Int(1), Value::Int(10)],
                    vec![Value::Int(2), Value::Int(20)],
                ],
            },
            &InsertOptions::new().ignore_on_conflict().returning_all(),
        )
        .await
        .unwrap();

    let statements = client.statements();
    assert_eq!(statements.len(), 2);
    assert_eq!(
        statements[0].0,
        "INSERT INTO public.t (a, b) VALUES ($1, $2) ON CONFLICT DO NOTHING"
    );
    assert_eq!(statements[1].1, [Value::Int(2), Value::Int(20)]);
}

#[tokio::test]
async fn insert_many_infers_columns_from_first_record() {
    let registry = TypeRegistry::with_defaults();
    let table = t(&registry);
    let client = RecordingClient::new();

    let rows = vec![
        record! { "a" => 1, "c" => "x" },
        record! { "c" => "y", "a" => 2, "b" => 5 },
    ];
    table
        .insert_many(&client, rows.into(), &InsertOptions::default())
        .await
        .unwrap();
    let statements = client.statements();
    assert_eq!(statements[0].0, "INSERT INTO public.t (a, c) VALUES ($1, $2)");
    assert_eq!(statements[1].1, [Value::Int(2), Value::from("y")]);

    let err = table
        .insert_many(
            &client,
            vec![record! { "a" => 1, "c" => "x" }, record! { "a" => 2 }].into(),
            &InsertOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::InvalidArgument(_)));

    let inserted = table
        .insert_many(&client, Vec::<Record>::new().into(), &InsertOptions::default())
        .await
        .unwrap();
    assert_eq!(inserted, 0);
}

#[tokio::test]
async fn update_and_delete_by_record() {
    let registry = TypeRegistry::with_defaults();
    let table = t(&registry);
    let client = RecordingClient::new();
    let row = record! { "a" => 4, "b" => 1, "c" => "z" };

    table
        .update_record(&client, &row, &record! { "b" => 2 })
        .await
        .unwrap();
    table.delete_record(&client, &row).await.unwrap();
    table
        .delete(&client, &record! { "c" => Value::Null, "or_b__gt" => 3 })
        .await
        .unwrap();

    let statements = client.statements();
    assert_eq!(statements[0].0, "UPDATE public.t SET b = $2 WHERE a = $1");
    assert_eq!(statements[0].1, [Value::Int(4), Value::Int(2)]);
    assert_eq!(statements[1].0, "DELETE FROM public.t WHERE a = $1");
    assert_eq!(
        statements[2].0,
        "DELETE FROM public.t WHERE (c IS NULL OR b > $1)"
    );
    assert_eq!(statements[2].1, [Value::Int(3)]);
}

#[tokio::test]
async fn update_where_returning_queries_rows() {
    let registry = TypeRegistry::with_defaults();
    let table = t(&registry);
    let client = RecordingClient::new();
    client.respond(vec![record! { "a" => 1, "b" => 9, "c" => "q" }]);

    let rows = table
        .update_where_returning(&client, "c = $1", &[Value::from("q")], &record! { "b" => 9 })
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        client.sql(),
        ["UPDATE public.t SET b = $2 WHERE c = $1 RETURNING *"]
    );
}
