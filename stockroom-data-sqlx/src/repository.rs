use std::marker::PhantomData;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use sqlx::{ColumnIndex, Database, Decode, Executor, FromRow, IntoArguments, Pool, Type};
use stockroom_data::{
    DataError, DataSettings, Entity, IntoRow, ListQuery, Page, QueryBuilder, QueryError,
    RowValues, SqlValue, Statement, Table,
};

use crate::backend::{bind_all, SqlxBackend};
use crate::error::{SqlxErrorExt, SqlxResult};
use crate::tx::{self, HasPool, Tx};

/// The generic repository engine over one entity table.
///
/// Holds the pool, the validated [`Table`] configuration and the list
/// defaults; no per-request state. Every operation exists in two forms: one
/// that borrows a fresh connection from the pool, and an `_in` form that runs
/// on a caller-supplied connection (typically [`Tx::as_mut`]).
///
/// Writes use `RETURNING *`. For tables read through a join, the written row
/// is read back through the join, and the entity's `FromRow` must tolerate the
/// joined columns being absent (e.g. `#[sqlx(default)]`).
///
/// # Example
///
/// ```ignore
/// let repo = SqlxRepository::<Drug, Postgres>::new(pool.clone())?;
/// let page = repo.list(&ListQuery::new().search("para").limit(20)).await?;
/// ```
pub struct SqlxRepository<E, DB: Database> {
    pool: Pool<DB>,
    table: Arc<Table>,
    settings: Arc<DataSettings>,
    _marker: PhantomData<E>,
}

impl<E, DB: Database> Clone for SqlxRepository<E, DB> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            table: Arc::clone(&self.table),
            settings: Arc::clone(&self.settings),
            _marker: PhantomData,
        }
    }
}

impl<E, DB: Database> HasPool<DB> for SqlxRepository<E, DB> {
    fn pool(&self) -> &Pool<DB> {
        &self.pool
    }
}

impl<E: Entity, DB: Database> SqlxRepository<E, DB> {
    /// Build a repository with default list settings.
    ///
    /// Fails when the entity's table configuration holds an invalid identifier.
    pub fn new(pool: Pool<DB>) -> Result<Self, DataError> {
        Self::with_settings(pool, DataSettings::default())
    }

    pub fn with_settings(pool: Pool<DB>, settings: DataSettings) -> Result<Self, DataError> {
        let table = E::table().validate()?;
        Ok(Self {
            pool,
            table: Arc::new(table),
            settings: Arc::new(settings),
            _marker: PhantomData,
        })
    }

    /// Get the underlying pool reference.
    pub fn pool(&self) -> &Pool<DB> {
        &self.pool
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn settings(&self) -> &DataSettings {
        &self.settings
    }

    /// Run `f` in a transaction on this repository's pool.
    ///
    /// See [`tx::with_transaction`].
    pub async fn with_transaction<F, R, X>(&self, f: F) -> Result<R, X>
    where
        F: for<'t> FnOnce(&'t mut Tx<'static, DB>) -> BoxFuture<'t, Result<R, X>>,
        X: From<DataError>,
    {
        tx::with_transaction(&self.pool, f).await
    }
}

impl<E, DB> SqlxRepository<E, DB>
where
    E: Entity + for<'r> FromRow<'r, DB::Row>,
    DB: SqlxBackend,
    for<'q> <DB as Database>::Arguments<'q>: IntoArguments<'q, DB>,
    for<'c> &'c mut <DB as Database>::Connection: Executor<'c, Database = DB>,
    i64: Type<DB> + for<'r> Decode<'r, DB>,
    usize: ColumnIndex<DB::Row>,
{
    /// A builder over the read source (the join, when configured).
    pub fn query(&self) -> QueryBuilder {
        self.table.query(DB::DIALECT)
    }

    fn writes(&self) -> QueryBuilder {
        self.table.base_query(DB::DIALECT)
    }

    async fn acquire(&self) -> SqlxResult<sqlx::pool::PoolConnection<DB>> {
        self.pool
            .acquire()
            .await
            .map_err(SqlxErrorExt::into_data_error)
    }

    async fn begin(&self) -> SqlxResult<Tx<'static, DB>> {
        Tx::begin(&self.pool).await
    }

    fn trace(&self, operation: &'static str, stmt: &Statement) {
        tracing::debug!(
            table = self.table.name(),
            operation,
            sql = %stmt.sql,
            params = stmt.params.len(),
            "Executing statement"
        );
    }

    async fn fetch_optional(
        &self,
        conn: &mut DB::Connection,
        operation: &'static str,
        stmt: Statement,
    ) -> SqlxResult<Option<E>> {
        self.trace(operation, &stmt);
        let args = bind_all::<DB>(stmt.params)?;
        sqlx::query_as_with::<DB, E, _>(&stmt.sql, args)
            .fetch_optional(&mut *conn)
            .await
            .map_err(SqlxErrorExt::into_data_error)
    }

    async fn fetch_all(
        &self,
        conn: &mut DB::Connection,
        operation: &'static str,
        stmt: Statement,
    ) -> SqlxResult<Vec<E>> {
        self.trace(operation, &stmt);
        let args = bind_all::<DB>(stmt.params)?;
        sqlx::query_as_with::<DB, E, _>(&stmt.sql, args)
            .fetch_all(&mut *conn)
            .await
            .map_err(SqlxErrorExt::into_data_error)
    }

    async fn fetch_one(
        &self,
        conn: &mut DB::Connection,
        operation: &'static str,
        stmt: Statement,
    ) -> SqlxResult<E> {
        self.trace(operation, &stmt);
        let args = bind_all::<DB>(stmt.params)?;
        sqlx::query_as_with::<DB, E, _>(&stmt.sql, args)
            .fetch_one(&mut *conn)
            .await
            .map_err(SqlxErrorExt::into_data_error)
    }

    async fn execute(
        &self,
        conn: &mut DB::Connection,
        operation: &'static str,
        stmt: Statement,
    ) -> SqlxResult<u64> {
        self.trace(operation, &stmt);
        let args = bind_all::<DB>(stmt.params)?;
        let result = sqlx::query_with::<DB, _>(&stmt.sql, args)
            .execute(&mut *conn)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        Ok(DB::rows_affected(&result))
    }

    async fn fetch_count(&self, conn: &mut DB::Connection, stmt: Statement) -> SqlxResult<u64> {
        self.trace("count", &stmt);
        let args = bind_all::<DB>(stmt.params)?;
        let total: i64 = sqlx::query_scalar_with::<DB, i64, _>(&stmt.sql, args)
            .fetch_one(&mut *conn)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    /// Re-read written rows through the join so denormalized columns are filled.
    async fn reload(&self, conn: &mut DB::Connection, rows: Vec<E>) -> SqlxResult<Vec<E>> {
        if !self.table.has_join() {
            return Ok(rows);
        }
        let mut reloaded = Vec::with_capacity(rows.len());
        for row in rows {
            let fresh = self.find_by_id_in(&mut *conn, row.id()).await?;
            reloaded.push(fresh.unwrap_or(row));
        }
        Ok(reloaded)
    }

    fn id_value(id: &E::Id) -> SqlValue {
        id.clone().into()
    }

    // --- reads ---

    pub async fn find_by_id(&self, id: &E::Id) -> SqlxResult<Option<E>> {
        let mut conn = self.acquire().await?;
        self.find_by_id_in(&mut *conn, id).await
    }

    pub async fn find_by_id_in(
        &self,
        conn: &mut DB::Connection,
        id: &E::Id,
    ) -> SqlxResult<Option<E>> {
        let stmt = self
            .query()
            .where_eq(&self.table.qualified_id(), Self::id_value(id))
            .limit(1)
            .build_select();
        self.fetch_optional(conn, "find_by_id", stmt).await
    }

    /// First row whose `field` equals `value`.
    ///
    /// `field` is the id column or a declared filter name; anything else is
    /// rejected rather than used as a column reference.
    pub async fn find_one_by(&self, field: &str, value: SqlValue) -> SqlxResult<Option<E>> {
        let mut conn = self.acquire().await?;
        self.find_one_by_in(&mut *conn, field, value).await
    }

    pub async fn find_one_by_in(
        &self,
        conn: &mut DB::Connection,
        field: &str,
        value: SqlValue,
    ) -> SqlxResult<Option<E>> {
        let column = if field == "id" || field == self.table.id_column_name() {
            self.table.qualified_id()
        } else {
            match self.table.filters().get(field) {
                Some(filter) => filter.column.clone(),
                None => {
                    return Err(DataError::InvalidInput(format!(
                        "'{field}' is not a lookup field of {}",
                        self.table.name()
                    )))
                }
            }
        };
        let stmt = self.query().where_eq(&column, value).limit(1).build_select();
        self.fetch_optional(conn, "find_one_by", stmt).await
    }

    pub async fn list(&self, query: &ListQuery) -> SqlxResult<Page<E>> {
        let mut conn = self.acquire().await?;
        self.list_in(&mut *conn, query).await
    }

    /// Filtered, searched, sorted page plus the total of the filtered set.
    ///
    /// Outside a transaction the count and the page are separate statements
    /// and may observe different snapshots under concurrent writes.
    pub async fn list_in(&self, conn: &mut DB::Connection, query: &ListQuery) -> SqlxResult<Page<E>> {
        let plan = query.plan(&self.table, &self.settings)?;
        let q = plan.query(&self.table, DB::DIALECT);
        let total = self.fetch_count(&mut *conn, q.build_count()).await?;
        let data = self.fetch_all(&mut *conn, "list", q.build_select()).await?;
        Ok(Page::new(data, plan.page, plan.limit, total))
    }

    pub async fn exists(&self, id: &E::Id) -> SqlxResult<bool> {
        let mut conn = self.acquire().await?;
        self.exists_in(&mut *conn, id).await
    }

    pub async fn exists_in(&self, conn: &mut DB::Connection, id: &E::Id) -> SqlxResult<bool> {
        let stmt = self
            .writes()
            .where_eq(self.table.id_column_name(), Self::id_value(id))
            .build_exists();
        self.trace("exists", &stmt);
        let args = bind_all::<DB>(stmt.params)?;
        let row = sqlx::query_with::<DB, _>(&stmt.sql, args)
            .fetch_optional(&mut *conn)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        Ok(row.is_some())
    }

    pub async fn count(&self, query: &ListQuery) -> SqlxResult<u64> {
        let mut conn = self.acquire().await?;
        self.count_in(&mut *conn, query).await
    }

    /// Number of rows matching `query`'s search and filters.
    pub async fn count_in(&self, conn: &mut DB::Connection, query: &ListQuery) -> SqlxResult<u64> {
        let plan = query.plan(&self.table, &self.settings)?;
        let stmt = plan.query(&self.table, DB::DIALECT).build_count();
        self.fetch_count(conn, stmt).await
    }

    // --- single-row writes ---

    pub async fn create<D: IntoRow>(&self, dto: D) -> SqlxResult<E> {
        let mut conn = self.acquire().await?;
        self.create_in(&mut *conn, dto).await
    }

    /// Like [`create`](Self::create), also stamping the actor columns.
    pub async fn create_as<D: IntoRow>(&self, dto: D, actor: impl Into<SqlValue>) -> SqlxResult<E> {
        let mut conn = self.acquire().await?;
        self.create_as_in(&mut *conn, dto, actor).await
    }

    pub async fn create_in<D: IntoRow>(&self, conn: &mut DB::Connection, dto: D) -> SqlxResult<E> {
        self.insert_one(conn, dto.into_row(), None).await
    }

    pub async fn create_as_in<D: IntoRow>(
        &self,
        conn: &mut DB::Connection,
        dto: D,
        actor: impl Into<SqlValue>,
    ) -> SqlxResult<E> {
        self.insert_one(conn, dto.into_row(), Some(actor.into())).await
    }

    async fn insert_one(
        &self,
        conn: &mut DB::Connection,
        mut row: RowValues,
        actor: Option<SqlValue>,
    ) -> SqlxResult<E> {
        self.table.stamp_create(&mut row, actor.as_ref());
        let stmt = self.writes().build_insert(std::slice::from_ref(&row))?;
        let created = self.fetch_one(&mut *conn, "create", stmt).await?;
        let mut reloaded = self.reload(conn, vec![created]).await?;
        reloaded
            .pop()
            .ok_or_else(|| DataError::Other("insert returned no row".into()))
    }

    pub async fn update<D: IntoRow>(&self, id: &E::Id, dto: D) -> SqlxResult<Option<E>> {
        let mut conn = self.acquire().await?;
        self.update_in(&mut *conn, id, dto).await
    }

    /// Like [`update`](Self::update), also stamping `updated_by`.
    pub async fn update_as<D: IntoRow>(
        &self,
        id: &E::Id,
        dto: D,
        actor: impl Into<SqlValue>,
    ) -> SqlxResult<Option<E>> {
        let mut conn = self.acquire().await?;
        self.update_as_in(&mut *conn, id, dto, actor).await
    }

    /// Partial update: only the columns present in the DTO row are written,
    /// plus `updated_at`. `None` when no row has this id.
    pub async fn update_in<D: IntoRow>(
        &self,
        conn: &mut DB::Connection,
        id: &E::Id,
        dto: D,
    ) -> SqlxResult<Option<E>> {
        self.update_one(conn, id, dto.into_row(), None).await
    }

    pub async fn update_as_in<D: IntoRow>(
        &self,
        conn: &mut DB::Connection,
        id: &E::Id,
        dto: D,
        actor: impl Into<SqlValue>,
    ) -> SqlxResult<Option<E>> {
        self.update_one(conn, id, dto.into_row(), Some(actor.into())).await
    }

    async fn update_one(
        &self,
        conn: &mut DB::Connection,
        id: &E::Id,
        mut row: RowValues,
        actor: Option<SqlValue>,
    ) -> SqlxResult<Option<E>> {
        self.table.stamp_update(&mut row, actor.as_ref());
        if row.is_empty() {
            tracing::debug!(table = self.table.name(), id = %id, "Empty update, reading current row");
            return self.find_by_id_in(conn, id).await;
        }
        let stmt = self
            .writes()
            .where_eq(self.table.id_column_name(), Self::id_value(id))
            .build_update(&row, true)?;
        match self.fetch_optional(&mut *conn, "update", stmt).await? {
            Some(updated) => Ok(self.reload(conn, vec![updated]).await?.pop()),
            None => Ok(None),
        }
    }

    pub async fn delete(&self, id: &E::Id) -> SqlxResult<bool> {
        let mut conn = self.acquire().await?;
        self.delete_in(&mut *conn, id).await
    }

    /// `true` when a row was removed, `false` when none had this id.
    pub async fn delete_in(&self, conn: &mut DB::Connection, id: &E::Id) -> SqlxResult<bool> {
        let stmt = self
            .writes()
            .where_eq(self.table.id_column_name(), Self::id_value(id))
            .build_delete();
        Ok(self.execute(conn, "delete", stmt).await? > 0)
    }

    // --- bulk writes ---
    //
    // The pool forms run in their own transaction so a failure leaves no
    // partial effect.

    pub async fn create_many<D: IntoRow>(&self, dtos: Vec<D>) -> SqlxResult<Vec<E>> {
        if dtos.is_empty() {
            return Ok(Vec::new());
        }
        let mut tx = self.begin().await?;
        let created = self.create_many_in(tx.as_mut(), dtos).await?;
        tx.commit().await?;
        Ok(created)
    }

    /// Insert every DTO; one multi-row statement when all rows share their
    /// columns, one statement per row otherwise.
    pub async fn create_many_in<D: IntoRow>(
        &self,
        conn: &mut DB::Connection,
        dtos: Vec<D>,
    ) -> SqlxResult<Vec<E>> {
        if dtos.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<RowValues> = dtos
            .into_iter()
            .map(|dto| {
                let mut row = dto.into_row();
                self.table.stamp_create(&mut row, None);
                row
            })
            .collect();

        let created = match self.writes().build_insert(&rows) {
            Ok(stmt) => self.fetch_all(&mut *conn, "create_many", stmt).await?,
            Err(QueryError::RowShapeMismatch) => {
                let mut created = Vec::with_capacity(rows.len());
                for row in &rows {
                    let stmt = self.writes().build_insert(std::slice::from_ref(row))?;
                    created.push(self.fetch_one(&mut *conn, "create_many", stmt).await?);
                }
                created
            }
            Err(err) => return Err(err.into()),
        };
        self.reload(conn, created).await
    }

    pub async fn update_many<D: IntoRow>(&self, ids: &[E::Id], dto: D) -> SqlxResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut tx = self.begin().await?;
        let affected = self.update_many_in(tx.as_mut(), ids, dto).await?;
        tx.commit().await?;
        Ok(affected)
    }

    /// Apply the same partial update to every listed id. Returns rows affected.
    pub async fn update_many_in<D: IntoRow>(
        &self,
        conn: &mut DB::Connection,
        ids: &[E::Id],
        dto: D,
    ) -> SqlxResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut row = dto.into_row();
        self.table.stamp_update(&mut row, None);
        if row.is_empty() {
            return Ok(0);
        }
        let stmt = self
            .writes()
            .where_in(self.table.id_column_name(), ids.iter().map(Self::id_value))
            .build_update(&row, false)?;
        self.execute(conn, "update_many", stmt).await
    }

    pub async fn delete_many(&self, ids: &[E::Id]) -> SqlxResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.acquire().await?;
        self.delete_many_in(&mut *conn, ids).await
    }

    pub async fn delete_many_in(&self, conn: &mut DB::Connection, ids: &[E::Id]) -> SqlxResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let stmt = self
            .writes()
            .where_in(self.table.id_column_name(), ids.iter().map(Self::id_value))
            .build_delete();
        self.execute(conn, "delete_many", stmt).await
    }
}

macro_rules! impl_repository {
    ($db:ty) => {
        impl<E> stockroom_data::Repository<E> for SqlxRepository<E, $db>
        where
            E: Entity + for<'r> FromRow<'r, <$db as Database>::Row>,
        {
            fn find_by_id(
                &self,
                id: &E::Id,
            ) -> impl std::future::Future<Output = SqlxResult<Option<E>>> + Send {
                SqlxRepository::find_by_id(self, id)
            }

            fn find_one_by(
                &self,
                field: &str,
                value: SqlValue,
            ) -> impl std::future::Future<Output = SqlxResult<Option<E>>> + Send {
                SqlxRepository::find_one_by(self, field, value)
            }

            fn create<D: IntoRow + Send>(
                &self,
                dto: D,
            ) -> impl std::future::Future<Output = SqlxResult<E>> + Send {
                SqlxRepository::create(self, dto)
            }

            fn update<D: IntoRow + Send>(
                &self,
                id: &E::Id,
                dto: D,
            ) -> impl std::future::Future<Output = SqlxResult<Option<E>>> + Send {
                SqlxRepository::update(self, id, dto)
            }

            fn delete(
                &self,
                id: &E::Id,
            ) -> impl std::future::Future<Output = SqlxResult<bool>> + Send {
                SqlxRepository::delete(self, id)
            }

            fn list(
                &self,
                query: &ListQuery,
            ) -> impl std::future::Future<Output = SqlxResult<Page<E>>> + Send {
                SqlxRepository::list(self, query)
            }

            fn exists(
                &self,
                id: &E::Id,
            ) -> impl std::future::Future<Output = SqlxResult<bool>> + Send {
                SqlxRepository::exists(self, id)
            }

            fn count(
                &self,
                query: &ListQuery,
            ) -> impl std::future::Future<Output = SqlxResult<u64>> + Send {
                SqlxRepository::count(self, query)
            }

            fn create_many<D: IntoRow + Send>(
                &self,
                dtos: Vec<D>,
            ) -> impl std::future::Future<Output = SqlxResult<Vec<E>>> + Send {
                SqlxRepository::create_many(self, dtos)
            }

            fn update_many<D: IntoRow + Send>(
                &self,
                ids: &[E::Id],
                dto: D,
            ) -> impl std::future::Future<Output = SqlxResult<u64>> + Send {
                SqlxRepository::update_many(self, ids, dto)
            }

            fn delete_many(
                &self,
                ids: &[E::Id],
            ) -> impl std::future::Future<Output = SqlxResult<u64>> + Send {
                SqlxRepository::delete_many(self, ids)
            }
        }
    };
}

#[cfg(feature = "sqlite")]
impl_repository!(sqlx::Sqlite);

#[cfg(feature = "postgres")]
impl_repository!(sqlx::Postgres);
