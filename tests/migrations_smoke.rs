use sqlx::Row;

fn database_url() -> String {
    // Load .env so POSTGRES_* from .env are available (integration tests don't use app config)
    dotenvy::dotenv().ok();

    if let Ok(url) = std::env::var("DATABASE_URL") {
        if !url.trim().is_empty() {
            return url;
        }
    }

    let server = std::env::var("POSTGRES_SERVER").unwrap_or_else(|_| "localhost".into());
    let port = std::env::var("POSTGRES_PORT").unwrap_or_else(|_| "5432".into());
    let user = std::env::var("POSTGRES_USER").unwrap_or_else(|_| "examroom".into());
    let password = std::env::var("POSTGRES_PASSWORD").unwrap_or_default();
    let db = std::env::var("POSTGRES_DB").unwrap_or_else(|_| "examroom_db".into());

    format!("postgresql://{user}:{password}@{server}:{port}/{db}")
}

#[tokio::test]
async fn migrations_apply_and_tables_exist() -> anyhow::Result<()> {
    let database_url = database_url();

    let pool = match sqlx::postgres::PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
    {
        Ok(pool) => pool,
        Err(err) => {
            eprintln!("skipping migrations smoke test, database unreachable: {err}");
            return Ok(());
        }
    };

    let migrations_dir =
        std::env::var("EXAMROOM_MIGRATIONS_DIR").unwrap_or_else(|_| "migrations".to_string());
    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(&migrations_dir)).await?;
    migrator.run(&pool).await?;

    let tables = ["users", "courses", "questions", "exams", "attempts"];

    for table in tables {
        let row = sqlx::query("SELECT to_regclass($1)::text").bind(table).fetch_one(&pool).await?;
        let regclass: Option<String> = row.try_get(0)?;
        assert!(regclass.is_some(), "expected table {table} to exist after migrations");
    }

    Ok(())
}
