//! In-process store implementing every store trait.
//!
//! All tables live behind one async mutex. A reconciliation transaction holds
//! the lock and works on a staged copy, so concurrent readers observe either
//! the state before the transaction or the committed state, never a partial
//! one. The failure knobs let tests drive the error branches of the jobs.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use sources_core::error::AppError;
use sources_core::result::AppResult;
use sources_entity::{
    Application, ApplicationAuthentication, ApplicationWithRelations, Authentication, Endpoint,
    RetryCandidate, RhcConnection, Source, Tenant,
};

use crate::store::{
    ApplicationCascade, ApplicationStore, AuthenticationStore, CascadeStore, RetryTransaction,
    SourceCascade,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    tenants: HashMap<i64, Tenant>,
    sources: BTreeMap<i64, Source>,
    applications: BTreeMap<i64, Application>,
    application_authentications: BTreeMap<i64, ApplicationAuthentication>,
    authentications: BTreeMap<i64, Authentication>,
    endpoints: BTreeMap<i64, Endpoint>,
    rhc_connections: BTreeMap<i64, RhcConnection>,
    /// `(tenant_id, source_id, rhc_connection_id)`
    source_rhc_connections: Vec<(i64, i64, i64)>,
    retry_opt_ins: HashSet<i64>,
}

#[derive(Debug, Default)]
struct Failures {
    next_commit: bool,
    list_for_source: bool,
    opt_in_lookup: HashSet<i64>,
    find_with_relations: HashSet<i64>,
}

#[derive(Debug, Default)]
struct State {
    tables: Tables,
    failures: Failures,
}

/// Store keeping every table in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a tenant.
    pub async fn insert_tenant(&self, tenant: Tenant) {
        self.state.lock().await.tables.tenants.insert(tenant.id, tenant);
    }

    /// Insert or replace a source.
    pub async fn insert_source(&self, source: Source) {
        self.state.lock().await.tables.sources.insert(source.id, source);
    }

    /// Insert or replace an application.
    pub async fn insert_application(&self, application: Application) {
        self.state
            .lock()
            .await
            .tables
            .applications
            .insert(application.id, application);
    }

    /// Insert or replace an endpoint.
    pub async fn insert_endpoint(&self, endpoint: Endpoint) {
        self.state.lock().await.tables.endpoints.insert(endpoint.id, endpoint);
    }

    /// Insert a connector connection and link it to a source.
    pub async fn insert_rhc_connection(
        &self,
        connection: RhcConnection,
        tenant_id: i64,
        source_id: i64,
    ) {
        let mut state = self.state.lock().await;
        let tables = &mut state.tables;
        tables
            .source_rhc_connections
            .push((tenant_id, source_id, connection.id));
        tables.rhc_connections.insert(connection.id, connection);
    }

    /// Insert or replace an authentication.
    pub async fn insert_authentication(&self, authentication: Authentication) {
        self.state
            .lock()
            .await
            .tables
            .authentications
            .insert(authentication.id, authentication);
    }

    /// Insert or replace an application/authentication link.
    pub async fn insert_application_authentication(&self, link: ApplicationAuthentication) {
        self.state
            .lock()
            .await
            .tables
            .application_authentications
            .insert(link.id, link);
    }

    /// Mark an application type as opted into create retries.
    pub async fn opt_into_retry(&self, application_type_id: i64) {
        self.state
            .lock()
            .await
            .tables
            .retry_opt_ins
            .insert(application_type_id);
    }

    /// Make the next reconciliation commit fail.
    pub async fn fail_next_commit(&self) {
        self.state.lock().await.failures.next_commit = true;
    }

    /// Make every `list_for_source` call fail.
    pub async fn fail_list_for_source(&self) {
        self.state.lock().await.failures.list_for_source = true;
    }

    /// Make the opt-in lookup fail for an application type.
    pub async fn fail_opt_in_lookup(&self, application_type_id: i64) {
        self.state
            .lock()
            .await
            .failures
            .opt_in_lookup
            .insert(application_type_id);
    }

    /// Make loading an application with its relations fail.
    pub async fn fail_find_with_relations(&self, application_id: i64) {
        self.state
            .lock()
            .await
            .failures
            .find_with_relations
            .insert(application_id);
    }

    /// Snapshot of an application row.
    pub async fn application(&self, id: i64) -> Option<Application> {
        self.state.lock().await.tables.applications.get(&id).cloned()
    }

    /// Snapshot of a source row.
    pub async fn source(&self, id: i64) -> Option<Source> {
        self.state.lock().await.tables.sources.get(&id).cloned()
    }

    /// Ids of every stored authentication.
    pub async fn authentication_ids(&self) -> Vec<i64> {
        self.state
            .lock()
            .await
            .tables
            .authentications
            .keys()
            .copied()
            .collect()
    }

    /// Ids of every stored endpoint.
    pub async fn endpoint_ids(&self) -> Vec<i64> {
        self.state.lock().await.tables.endpoints.keys().copied().collect()
    }

    /// Ids of every stored connector connection.
    pub async fn rhc_connection_ids(&self) -> Vec<i64> {
        self.state
            .lock()
            .await
            .tables
            .rhc_connections
            .keys()
            .copied()
            .collect()
    }
}

#[async_trait]
impl ApplicationStore for MemoryStore {
    async fn begin_retry(&self) -> AppResult<Box<dyn RetryTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.tables.clone();
        Ok(Box::new(MemoryRetryTransaction { guard, staged }))
    }

    async fn find_with_relations(
        &self,
        tenant_id: i64,
        application_id: i64,
    ) -> AppResult<ApplicationWithRelations> {
        let state = self.state.lock().await;
        if state.failures.find_with_relations.contains(&application_id) {
            return Err(AppError::database(format!(
                "injected failure loading application {application_id}"
            )));
        }
        let tables = &state.tables;

        let application = tables
            .applications
            .get(&application_id)
            .filter(|a| a.tenant_id == tenant_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("application {application_id} not found")))?;
        let source = tables
            .sources
            .get(&application.source_id)
            .filter(|s| s.tenant_id == tenant_id)
            .cloned()
            .ok_or_else(|| {
                AppError::not_found(format!("source {} not found", application.source_id))
            })?;
        let tenant = tables
            .tenants
            .get(&tenant_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("tenant {tenant_id} not found")))?;
        let application_authentications = tables
            .application_authentications
            .values()
            .filter(|l| l.application_id == application_id && l.tenant_id == tenant_id)
            .cloned()
            .collect();

        Ok(ApplicationWithRelations {
            application,
            source,
            tenant,
            application_authentications,
        })
    }

    async fn list_for_source(
        &self,
        tenant_id: i64,
        source_id: i64,
    ) -> AppResult<Vec<Application>> {
        let state = self.state.lock().await;
        if state.failures.list_for_source {
            return Err(AppError::database("injected failure listing applications"));
        }
        Ok(state
            .tables
            .applications
            .values()
            .filter(|a| a.source_id == source_id && a.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn application_opted_into_retry(&self, application_type_id: i64) -> AppResult<bool> {
        let state = self.state.lock().await;
        if state.failures.opt_in_lookup.contains(&application_type_id) {
            return Err(AppError::database(format!(
                "injected failure checking opt-in for type {application_type_id}"
            )));
        }
        Ok(state.tables.retry_opt_ins.contains(&application_type_id))
    }
}

/// Reconciliation transaction over a staged copy of the tables.
///
/// The store stays locked until the transaction is committed, rolled back,
/// or dropped.
#[derive(Debug)]
pub struct MemoryRetryTransaction {
    guard: OwnedMutexGuard<State>,
    staged: Tables,
}

#[async_trait]
impl RetryTransaction for MemoryRetryTransaction {
    async fn pin_available(&mut self, retry_max: i32) -> AppResult<u64> {
        let mut updated = 0;
        for application in self.staged.applications.values_mut() {
            if application.is_available() && application.retry_counter < retry_max {
                application.retry_counter = retry_max;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn find_retry_candidates(
        &mut self,
        created_after: DateTime<Utc>,
        retry_max: i32,
    ) -> AppResult<Vec<RetryCandidate>> {
        Ok(self
            .staged
            .applications
            .values()
            .filter(|a| {
                !a.is_available() && a.created_at > created_after && a.retry_counter < retry_max
            })
            .map(|a| RetryCandidate {
                id: a.id,
                tenant_id: a.tenant_id,
                application_type_id: a.application_type_id,
            })
            .collect())
    }

    async fn increment_retry_counters(&mut self, ids: &[i64]) -> AppResult<u64> {
        let mut updated = 0;
        for id in ids {
            if let Some(application) = self.staged.applications.get_mut(id) {
                application.retry_counter += 1;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let Self { mut guard, staged } = *self;
        if std::mem::take(&mut guard.failures.next_commit) {
            return Err(AppError::database("injected commit failure"));
        }
        guard.tables = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl AuthenticationStore for MemoryStore {
    async fn list_for_application(
        &self,
        tenant_id: i64,
        application_id: i64,
    ) -> AppResult<Vec<Authentication>> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .authentications
            .values()
            .filter(|a| {
                a.tenant_id == tenant_id
                    && a.resource_type == "Application"
                    && a.resource_id == application_id
            })
            .take(100)
            .cloned()
            .collect())
    }

    async fn list_ids_for_resources(
        &self,
        tenant_id: i64,
        resource_type: &str,
        resource_ids: &[i64],
    ) -> AppResult<Vec<i64>> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .authentications
            .values()
            .filter(|a| {
                a.tenant_id == tenant_id
                    && a.resource_type == resource_type
                    && resource_ids.contains(&a.resource_id)
            })
            .map(|a| a.id)
            .collect())
    }

    async fn bulk_delete(&self, tenant_id: i64, ids: &[i64]) -> AppResult<Vec<Authentication>> {
        let mut state = self.state.lock().await;
        let authentications = &mut state.tables.authentications;
        let mut deleted = Vec::new();
        for id in ids {
            if authentications.get(id).is_some_and(|a| a.tenant_id == tenant_id) {
                if let Some(authentication) = authentications.remove(id) {
                    deleted.push(authentication);
                }
            }
        }
        Ok(deleted)
    }
}

#[async_trait]
impl CascadeStore for MemoryStore {
    async fn delete_source_cascade(
        &self,
        tenant_id: i64,
        source_id: i64,
    ) -> AppResult<SourceCascade> {
        let mut state = self.state.lock().await;
        let tables = &mut state.tables;

        let owned = tables
            .sources
            .get(&source_id)
            .is_some_and(|s| s.tenant_id == tenant_id);
        if !owned {
            return Err(AppError::not_found(format!("source {source_id} not found")));
        }

        let application_ids: Vec<i64> = tables
            .applications
            .values()
            .filter(|a| a.source_id == source_id && a.tenant_id == tenant_id)
            .map(|a| a.id)
            .collect();

        let application_authentications = drain_where(&mut tables.application_authentications, |l| {
            l.tenant_id == tenant_id && application_ids.contains(&l.application_id)
        });
        let applications = drain_where(&mut tables.applications, |a| {
            a.source_id == source_id && a.tenant_id == tenant_id
        });
        let endpoints = drain_where(&mut tables.endpoints, |e| {
            e.source_id == source_id && e.tenant_id == tenant_id
        });

        let mut linked = Vec::new();
        tables.source_rhc_connections.retain(|&(tenant, source, connection)| {
            let matches = tenant == tenant_id && source == source_id;
            if matches {
                linked.push(connection);
            }
            !matches
        });
        let rhc_connections = drain_where(&mut tables.rhc_connections, |c| linked.contains(&c.id));

        let source = tables
            .sources
            .remove(&source_id)
            .ok_or_else(|| AppError::not_found(format!("source {source_id} not found")))?;

        Ok(SourceCascade {
            application_authentications,
            applications,
            endpoints,
            rhc_connections,
            source,
        })
    }

    async fn delete_application_cascade(
        &self,
        tenant_id: i64,
        application_id: i64,
    ) -> AppResult<ApplicationCascade> {
        let mut state = self.state.lock().await;
        let tables = &mut state.tables;

        let owned = tables
            .applications
            .get(&application_id)
            .is_some_and(|a| a.tenant_id == tenant_id);
        if !owned {
            return Err(AppError::not_found(format!(
                "application {application_id} not found"
            )));
        }

        let application_authentications = drain_where(&mut tables.application_authentications, |l| {
            l.tenant_id == tenant_id && l.application_id == application_id
        });
        let application = tables
            .applications
            .remove(&application_id)
            .ok_or_else(|| AppError::not_found(format!("application {application_id} not found")))?;

        Ok(ApplicationCascade {
            application_authentications,
            application,
        })
    }
}

fn drain_where<T>(table: &mut BTreeMap<i64, T>, predicate: impl Fn(&T) -> bool) -> Vec<T> {
    let ids: Vec<i64> = table
        .iter()
        .filter(|(_, row)| predicate(row))
        .map(|(id, _)| *id)
        .collect();
    ids.iter().filter_map(|id| table.remove(id)).collect()
}

/// Row constructors with sensible defaults, for seeding a [`MemoryStore`].
pub mod fixtures {
    use chrono::{Duration, Utc};

    use sources_entity::{
        Application, ApplicationAuthentication, Authentication, Endpoint, RhcConnection, Source,
        Tenant,
    };

    /// A tenant with both an account number and an org id.
    pub fn tenant(id: i64) -> Tenant {
        Tenant {
            id,
            external_tenant: Some(format!("acct{id}")),
            org_id: Some(format!("org{id}")),
        }
    }

    /// A source of type 1.
    pub fn source(id: i64, tenant_id: i64) -> Source {
        let now = Utc::now();
        Source {
            id,
            tenant_id,
            source_type_id: 1,
            name: format!("source-{id}"),
            uid: None,
            availability_status: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// An application of type 1 created `age_minutes` ago with no status.
    pub fn application(id: i64, tenant_id: i64, source_id: i64, age_minutes: i64) -> Application {
        let created = Utc::now() - Duration::minutes(age_minutes);
        Application {
            id,
            tenant_id,
            source_id,
            application_type_id: 1,
            availability_status: None,
            availability_status_error: None,
            retry_counter: 0,
            superkey_data: None,
            extra: None,
            created_at: created,
            updated_at: created,
        }
    }

    /// An endpoint of a source.
    pub fn endpoint(id: i64, tenant_id: i64, source_id: i64) -> Endpoint {
        let now = Utc::now();
        Endpoint {
            id,
            tenant_id,
            source_id,
            host: Some("example.com".to_string()),
            scheme: Some("https".to_string()),
            port: Some(443),
            created_at: now,
            updated_at: now,
        }
    }

    /// An available connector connection.
    pub fn rhc_connection(id: i64) -> RhcConnection {
        let now = Utc::now();
        RhcConnection {
            id,
            rhc_id: format!("rhc-{id}"),
            extra: None,
            availability_status: Some("available".to_string()),
            availability_status_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// An authentication owned by a resource of the given model.
    pub fn authentication(
        id: i64,
        tenant_id: i64,
        resource_type: &str,
        resource_id: i64,
    ) -> Authentication {
        let now = Utc::now();
        Authentication {
            id,
            tenant_id,
            resource_type: resource_type.to_string(),
            resource_id,
            authtype: "arn".to_string(),
            username: None,
            name: None,
            availability_status: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A link between an application and an authentication.
    pub fn application_authentication(
        id: i64,
        tenant_id: i64,
        application_id: i64,
        authentication_id: i64,
    ) -> ApplicationAuthentication {
        let now = Utc::now();
        ApplicationAuthentication {
            id,
            tenant_id,
            application_id,
            authentication_id,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_tenant(tenant(1)).await;
        store.insert_source(source(10, 1)).await;
        store
    }

    #[tokio::test]
    async fn test_pin_available_sets_counter_to_max() {
        let store = seeded().await;
        let mut app = application(100, 1, 10, 5);
        app.availability_status = Some("available".to_string());
        app.retry_counter = 2;
        store.insert_application(app).await;

        let mut tx = store.begin_retry().await.unwrap();
        assert_eq!(tx.pin_available(5).await.unwrap(), 1);
        tx.commit().await.unwrap();

        assert_eq!(store.application(100).await.unwrap().retry_counter, 5);
    }

    #[tokio::test]
    async fn test_candidates_respect_age_and_counter() {
        let store = seeded().await;
        store.insert_application(application(100, 1, 10, 5)).await;
        store.insert_application(application(101, 1, 10, 45)).await;
        let mut exhausted = application(102, 1, 10, 5);
        exhausted.retry_counter = 5;
        store.insert_application(exhausted).await;

        let mut tx = store.begin_retry().await.unwrap();
        let candidates = tx
            .find_retry_candidates(Utc::now() - chrono::Duration::minutes(30), 5)
            .await
            .unwrap();
        let ids: Vec<i64> = candidates.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![100]);
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_changes() {
        let store = seeded().await;
        store.insert_application(application(100, 1, 10, 5)).await;

        {
            let mut tx = store.begin_retry().await.unwrap();
            tx.increment_retry_counters(&[100]).await.unwrap();
        }

        assert_eq!(store.application(100).await.unwrap().retry_counter, 0);
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_previous_state() {
        let store = seeded().await;
        store.insert_application(application(100, 1, 10, 5)).await;
        store.fail_next_commit().await;

        let mut tx = store.begin_retry().await.unwrap();
        tx.increment_retry_counters(&[100]).await.unwrap();
        assert!(tx.commit().await.is_err());

        assert_eq!(store.application(100).await.unwrap().retry_counter, 0);
    }

    #[tokio::test]
    async fn test_source_cascade_removes_dependents() {
        let store = seeded().await;
        store.insert_application(application(100, 1, 10, 5)).await;
        store.insert_application(application(101, 1, 10, 5)).await;
        store.insert_endpoint(endpoint(50, 1, 10)).await;
        store.insert_authentication(authentication(7, 1, "Application", 100)).await;
        store
            .insert_application_authentication(application_authentication(70, 1, 100, 7))
            .await;
        store.insert_rhc_connection(rhc_connection(30), 1, 10).await;
        store.insert_rhc_connection(rhc_connection(31), 1, 11).await;

        let deleted = store.delete_source_cascade(1, 10).await.unwrap();

        assert_eq!(deleted.applications.len(), 2);
        assert_eq!(deleted.application_authentications.len(), 1);
        assert_eq!(deleted.endpoints.len(), 1);
        assert_eq!(deleted.rhc_connections.len(), 1);
        assert_eq!(deleted.rhc_connections[0].id, 30);
        assert_eq!(deleted.source.id, 10);
        assert!(store.source(10).await.is_none());
        assert!(store.endpoint_ids().await.is_empty());
        assert_eq!(store.rhc_connection_ids().await, vec![31]);
        // Authentications are removed separately by the deleter.
        assert_eq!(store.authentication_ids().await, vec![7]);
    }

    #[tokio::test]
    async fn test_missing_source_cascade_is_not_found_and_deletes_nothing() {
        let store = seeded().await;
        store.insert_application(application(100, 1, 99, 5)).await;
        store.insert_endpoint(endpoint(50, 1, 99)).await;

        let err = store.delete_source_cascade(1, 99).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(store.application(100).await.is_some());
        assert_eq!(store.endpoint_ids().await, vec![50]);

        let err = store.delete_source_cascade(2, 10).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(store.source(10).await.is_some());
    }

    #[tokio::test]
    async fn test_application_cascade_of_other_tenant_is_not_found() {
        let store = seeded().await;
        store.insert_application(application(100, 1, 10, 5)).await;

        let err = store.delete_application_cascade(2, 100).await.unwrap_err();
        assert_eq!(err.kind, sources_core::error::ErrorKind::NotFound);
        assert!(store.application(100).await.is_some());
    }

    #[tokio::test]
    async fn test_bulk_delete_scoped_to_tenant() {
        let store = seeded().await;
        store.insert_authentication(authentication(7, 1, "Source", 10)).await;
        store.insert_authentication(authentication(8, 2, "Source", 10)).await;

        let ids = store.list_ids_for_resources(1, "Source", &[10]).await.unwrap();
        assert_eq!(ids, vec![7]);

        let deleted = store.bulk_delete(1, &[7, 8]).await.unwrap();
        assert_eq!(deleted.len(), 1);
        assert_eq!(store.authentication_ids().await, vec![8]);
    }
}
