use std::future::Future;

use crate::entity::Entity;
use crate::error::DataError;
use crate::list::ListQuery;
use crate::page::Page;
use crate::row::IntoRow;
use crate::value::SqlValue;

/// Generic async repository over one entity table.
///
/// Uses RPITIT (return-position `impl Trait` in traits), no `async-trait`.
/// Lookups that miss return `None`/`false`/`0`; only driver failures and
/// constraint violations are errors.
pub trait Repository<E: Entity>: Send + Sync {
    fn find_by_id(&self, id: &E::Id) -> impl Future<Output = Result<Option<E>, DataError>> + Send;

    /// First row whose `field` (a declared filter name or the id column) equals `value`.
    fn find_one_by(
        &self,
        field: &str,
        value: SqlValue,
    ) -> impl Future<Output = Result<Option<E>, DataError>> + Send;

    fn create<D: IntoRow + Send>(&self, dto: D) -> impl Future<Output = Result<E, DataError>> + Send;

    /// Partial update. `None` when no row has this id.
    fn update<D: IntoRow + Send>(
        &self,
        id: &E::Id,
        dto: D,
    ) -> impl Future<Output = Result<Option<E>, DataError>> + Send;

    fn delete(&self, id: &E::Id) -> impl Future<Output = Result<bool, DataError>> + Send;

    fn list(&self, query: &ListQuery) -> impl Future<Output = Result<Page<E>, DataError>> + Send;

    fn exists(&self, id: &E::Id) -> impl Future<Output = Result<bool, DataError>> + Send;

    /// Count rows matching `query`'s search and filters; sort and pagination
    /// are ignored.
    fn count(&self, query: &ListQuery) -> impl Future<Output = Result<u64, DataError>> + Send;

    fn create_many<D: IntoRow + Send>(
        &self,
        dtos: Vec<D>,
    ) -> impl Future<Output = Result<Vec<E>, DataError>> + Send;

    /// Apply the same partial update to every listed id; returns rows affected.
    fn update_many<D: IntoRow + Send>(
        &self,
        ids: &[E::Id],
        dto: D,
    ) -> impl Future<Output = Result<u64, DataError>> + Send;

    fn delete_many(&self, ids: &[E::Id]) -> impl Future<Output = Result<u64, DataError>> + Send;
}
