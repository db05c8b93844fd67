#![allow(dead_code)]

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Sqlite, SqlitePool};
use stockroom_data::prelude::*;
use stockroom_data_sqlx::SqlxRepository;

const SCHEMA: &[&str] = &[
    "CREATE TABLE companies (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL
    )",
    "CREATE TABLE items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        code TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        description TEXT,
        amount INTEGER NOT NULL DEFAULT 0,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        company_id INTEGER REFERENCES companies(id),
        created_at DATETIME NOT NULL,
        updated_at DATETIME,
        created_by TEXT,
        updated_by TEXT
    )",
];

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Item {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub amount: i64,
    pub is_active: bool,
    pub company_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

impl Entity for Item {
    type Id = i64;

    fn table() -> Table {
        Table::new("items")
            .searchable(["items.name", "items.code"])
            .sort_field("name", "items.name")
            .sort_field("amount", "items.amount")
            .filter(FilterField::new("amount", "items.amount", ValueKind::Integer))
            .filter(FilterField::new("is_active", "items.is_active", ValueKind::Bool))
            .filter(FilterField::new("code", "items.code", ValueKind::Text))
            .filter(
                FilterField::new("company_id", "items.company_id", ValueKind::Integer)
                    .mode(FilterMode::Equality),
            )
            .filter(
                FilterField::new("description", "items.description", ValueKind::Text)
                    .mode(FilterMode::Contains),
            )
            .audit(AuditColumns::default().with_actors())
    }

    fn id(&self) -> &i64 {
        &self.id
    }
}

/// `items` read together with the owning company's name.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ItemView {
    pub id: i64,
    pub name: String,
    pub company_id: Option<i64>,
    #[sqlx(default)]
    pub company_name: Option<String>,
}

impl Entity for ItemView {
    type Id = i64;

    fn table() -> Table {
        Table::new("items")
            .join(
                "items LEFT JOIN companies ON companies.id = items.company_id",
                "items.*, companies.name AS company_name",
            )
            .searchable(["items.name", "companies.name"])
            .sort_field("name", "items.name")
            .filter(FilterField::new("company", "companies.name", ValueKind::Text))
    }

    fn id(&self) -> &i64 {
        &self.id
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Company {
    pub id: i64,
    pub name: String,
}

impl Entity for Company {
    type Id = i64;

    fn table() -> Table {
        Table::new("companies").audit(AuditColumns::none())
    }

    fn id(&self) -> &i64 {
        &self.id
    }
}

#[derive(Debug, Clone)]
pub struct NewItem {
    pub code: String,
    pub name: String,
    pub amount: i64,
    pub description: Option<String>,
    pub company_id: Option<i64>,
}

impl NewItem {
    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn company(mut self, company_id: i64) -> Self {
        self.company_id = Some(company_id);
        self
    }
}

pub fn new_item(code: &str, name: &str, amount: i64) -> NewItem {
    NewItem {
        code: code.to_string(),
        name: name.to_string(),
        amount,
        description: None,
        company_id: None,
    }
}

impl IntoRow for NewItem {
    fn into_row(self) -> RowValues {
        RowValues::new()
            .set("code", self.code)
            .set("name", self.name)
            .set("amount", self.amount)
            .set_opt("description", self.description)
            .set_opt("company_id", self.company_id)
    }
}

/// Partial update; `description: Some(None)` clears the column.
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub amount: Option<i64>,
    pub is_active: Option<bool>,
    pub description: Option<Option<String>>,
}

impl IntoRow for ItemPatch {
    fn into_row(self) -> RowValues {
        RowValues::new()
            .set_opt("name", self.name)
            .set_opt("amount", self.amount)
            .set_opt("is_active", self.is_active)
            .set_nullable("description", self.description)
    }
}

pub struct NewCompany(pub &'static str);

impl IntoRow for NewCompany {
    fn into_row(self) -> RowValues {
        RowValues::new().set("name", self.0)
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A single-connection in-memory database with the schema applied.
pub async fn pool() -> SqlitePool {
    init_tracing();
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    for statement in SCHEMA {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }
    pool
}

pub async fn items() -> SqlxRepository<Item, Sqlite> {
    SqlxRepository::new(pool().await).unwrap()
}

/// Insert rows one by one so ids follow the listed order.
pub async fn seed(repo: &SqlxRepository<Item, Sqlite>, rows: Vec<NewItem>) -> Vec<Item> {
    let mut created = Vec::new();
    for row in rows {
        created.push(repo.create(row).await.unwrap());
    }
    created
}

pub fn ids(items: &[Item]) -> Vec<i64> {
    items.iter().map(|i| i.id).collect()
}
