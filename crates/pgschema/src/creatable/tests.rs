use super::*;
use crate::test_support::RecordingClient;

struct Stub {
    kind: ObjectKind,
    schema: &'static str,
    name: &'static str,
    qualified: String,
    extra: Vec<String>,
}

impl Stub {
    fn new(kind: ObjectKind, schema: &'static str, name: &'static str) -> Self {
        Self {
            kind,
            schema,
            name,
            qualified: format!("{schema}.{name}"),
            extra: Vec::new(),
        }
    }

    fn table(schema: &'static str, name: &'static str) -> Self {
        Self::new(ObjectKind::Table, schema, name)
    }
}

impl Creatable for Stub {
    fn kind(&self) -> ObjectKind {
        self.kind
    }

    fn schema(&self) -> &str {
        self.schema
    }

    fn local_name(&self) -> &str {
        self.name
    }

    fn qualified_name(&self) -> &str {
        &self.qualified
    }

    fn query_create(&self, if_not_exists: bool) -> OrmResult<String> {
        let guard = if if_not_exists { "IF NOT EXISTS " } else { "" };
        Ok(format!("CREATE {} {guard}{}", self.kind.as_sql(), self.qualified))
    }

    fn query_create_extra(&self) -> Vec<String> {
        self.extra.clone()
    }
}

#[test]
fn option_defaults() {
    let create = CreateOptions::default();
    assert!(create.if_not_exists);
    assert!(create.create_schema);
    assert!(!create.automatic_migrations);

    let drop = DropOptions::default();
    assert!(drop.if_exists);
    assert!(!drop.cascade);

    let export = ExportOptions::default();
    assert!(!export.if_not_exists);
    assert!(export.export_schema);

    assert!(CreateAllOptions::default().with_transaction);
}

#[test]
fn drop_statements() {
    let stub = Stub::new(ObjectKind::View, "app", "totals");
    assert_eq!(stub.query_drop(true, false), "DROP VIEW IF EXISTS app.totals");
    assert_eq!(stub.query_drop(false, true), "DROP VIEW app.totals CASCADE");
    assert_eq!(stub.query_create_schema(false), "CREATE SCHEMA app");
    assert_eq!(stub.export_schema(true), "CREATE SCHEMA IF NOT EXISTS app;");
}

#[test]
fn exists_queries_take_schema_then_name() {
    for kind in [ObjectKind::Table, ObjectKind::View, ObjectKind::Type] {
        let sql = kind.exists_query();
        assert!(sql.starts_with("SELECT EXISTS"), "{sql}");
        assert!(sql.contains("$1") && sql.contains("$2"), "{sql}");
    }
    assert!(ObjectKind::Type.exists_query().contains("pg_type"));
}

#[test]
fn export_appends_extra_statements() {
    let mut stub = Stub::table("public", "t");
    stub.extra = vec!["CREATE INDEX IF NOT EXISTS t_a_idx ON public.t (a)".to_string()];
    assert_eq!(
        stub.export(ExportOptions::default()).unwrap(),
        "CREATE TABLE public.t;\nCREATE INDEX IF NOT EXISTS t_a_idx ON public.t (a);"
    );
}

#[test]
fn export_all_emits_each_schema_once() {
    let a = Stub::table("app", "a");
    let b = Stub::table("app", "b");
    let c = Stub::table("public", "c");
    let output = export_all(&[&a, &b, &c], ExportOptions::default()).unwrap();
    assert_eq!(
        output,
        "CREATE SCHEMA app;\n\nCREATE TABLE app.a;\n\nCREATE TABLE app.b;\n\nCREATE TABLE public.c;\n\n"
    );
}

#[test]
fn export_to_file_writes_the_export() {
    let stub = Stub::table("app", "t");
    let path = std::env::temp_dir().join(format!("pgschema-export-{}.sql", std::process::id()));
    stub.export_to_file(&path, ExportOptions::default()).unwrap();
    let written = std::fs::read_to_string(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(written, "CREATE SCHEMA app;\n\nCREATE TABLE app.t;");
}

#[tokio::test]
async fn exists_reads_the_first_column() {
    let stub = Stub::new(ObjectKind::Type, "public", "mood");
    let client = RecordingClient::new();
    client.respond(vec![crate::record! { "exists" => true }]);

    assert!(stub.exists(&client).await.unwrap());
    assert!(!stub.exists(&client).await.unwrap());
    let statements = client.statements();
    assert_eq!(
        statements[0].1,
        [Value::from("public"), Value::from("mood")]
    );
}

#[tokio::test]
async fn create_all_runs_in_one_transaction() {
    let a = Stub::table("app", "a");
    let b = Stub::table("app", "b");
    let c = Stub::table("public", "c");
    let client = RecordingClient::new();

    create_all(&client, &[&a, &b, &c], CreateAllOptions::default())
        .await
        .unwrap();
    assert_eq!(
        client.sql(),
        [
            "BEGIN",
            "CREATE SCHEMA IF NOT EXISTS app",
            "CREATE SCHEMA IF NOT EXISTS public",
            "CREATE TABLE IF NOT EXISTS app.a",
            "CREATE TABLE IF NOT EXISTS app.b",
            "CREATE TABLE IF NOT EXISTS public.c",
            "COMMIT",
        ]
    );
}

#[tokio::test]
async fn create_all_rolls_back_on_failure() {
    let a = Stub::table("public", "a");
    let b = Stub::table("public", "b");
    let c = Stub::table("public", "c");
    let client = RecordingClient::new();
    client
        .respond(Vec::new())
        .respond(Vec::new())
        .respond(Vec::new())
        .fail_next("relation exists");

    let options = CreateAllOptions::default();
    let err = create_all(&client, &[&a, &b, &c], options)
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::Other(ref m) if m == "relation exists"));
    assert_eq!(
        client.sql(),
        [
            "BEGIN",
            "CREATE SCHEMA IF NOT EXISTS public",
            "CREATE TABLE IF NOT EXISTS public.a",
            "CREATE TABLE IF NOT EXISTS public.b",
            "ROLLBACK",
        ]
    );
}

#[tokio::test]
async fn failed_rollback_reports_both_errors() {
    let a = Stub::table("public", "a");
    let client = RecordingClient::new();
    client
        .respond(Vec::new())
        .respond(Vec::new())
        .fail_next("first")
        .fail_next("second");

    let err = create_all(&client, &[&a], CreateAllOptions::default())
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("first"), "{message}");
    assert!(message.contains("rollback failed"), "{message}");
}

#[tokio::test]
async fn create_all_without_transaction_or_schemas() {
    let a = Stub::table("app", "a");
    let client = RecordingClient::new();
    let options = CreateAllOptions {
        create: CreateOptions::new().create_schema(false).if_not_exists(false),
        with_transaction: false,
    };

    create_all(&client, &[&a], options).await.unwrap();
    assert_eq!(client.sql(), ["CREATE TABLE app.a"]);
}

#[tokio::test]
async fn create_and_drop_single_objects() {
    let stub = Stub::new(ObjectKind::View, "app", "v");
    let client = RecordingClient::new();

    stub.create(&client, &CreateOptions::default()).await.unwrap();
    stub.drop(&client, &DropOptions::new().cascade()).await.unwrap();
    assert_eq!(
        client.sql(),
        [
            "CREATE SCHEMA IF NOT EXISTS app",
            "CREATE VIEW IF NOT EXISTS app.v",
            "DROP VIEW IF EXISTS app.v CASCADE",
        ]
    );
}

#[tokio::test]
async fn create_all_skips_existing_types() {
    let mood = Stub::new(ObjectKind::Type, "public", "mood");
    let t = Stub::table("public", "t");
    let client = RecordingClient::new();
    client
        .respond(Vec::new())
        .respond(Vec::new())
        .respond(vec![crate::record! { "exists" => true }]);

    create_all(&client, &[&mood, &t], CreateAllOptions::default())
        .await
        .unwrap();
    assert_eq!(
        client.sql(),
        [
            "BEGIN",
            "CREATE SCHEMA IF NOT EXISTS public",
            ObjectKind::Type.exists_query(),
            "CREATE TABLE IF NOT EXISTS public.t",
            "COMMIT",
        ]
    );
}

#[tokio::test]
async fn create_all_nests_in_a_savepoint_inside_transactions() {
    let a = Stub::table("public", "a");
    let client = RecordingClient::inside_transaction();

    create_all(&client, &[&a], CreateAllOptions::default())
        .await
        .unwrap();
    let sql = client.sql();
    let savepoint = sql[0].strip_prefix("SAVEPOINT ").unwrap();
    assert_eq!(
        sql[1..],
        [
            "CREATE SCHEMA IF NOT EXISTS public".to_string(),
            "CREATE TABLE IF NOT EXISTS public.a".to_string(),
            format!("RELEASE SAVEPOINT {savepoint}"),
        ]
    );
    assert!(!sql.iter().any(|s| s == "BEGIN" || s == "COMMIT"));
}

#[tokio::test]
async fn failed_create_all_rolls_back_to_its_savepoint() {
    let a = Stub::table("public", "a");
    let client = RecordingClient::inside_transaction();
    client
        .respond(Vec::new())
        .respond(Vec::new())
        .fail_next("boom");

    let err = create_all(&client, &[&a], CreateAllOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::Other(ref m) if m == "boom"));
    let sql = client.sql();
    let savepoint = sql[0].strip_prefix("SAVEPOINT ").unwrap();
    assert_eq!(
        sql.last().unwrap(),
        &format!("ROLLBACK TO SAVEPOINT {savepoint}")
    );
    assert!(!sql.iter().any(|s| s == "ROLLBACK"));
}

#[tokio::test]
async fn savepoint_names_are_unique() {
    let client = RecordingClient::inside_transaction();
    let first = begin_scope(&client, true).await.unwrap();
    let second = begin_scope(&client, true).await.unwrap();
    assert_ne!(first, second);
    assert!(matches!(first, Scope::Savepoint(_)));
    assert_eq!(begin_scope(&client, false).await.unwrap(), Scope::Unwrapped);
    assert_eq!(client.count(), 2);
}
