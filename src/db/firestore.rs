// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper implementing the storage traits.
//!
//! Collections:
//! - `positions` (current fix, keyed by user_id)
//! - `tours` (tour definitions, keyed by tour id)
//! - `tour_executions` (keyed by execution id)
//! - `active_executions` (one slot per user_id pointing at the active execution)

use crate::db::collections;
use crate::db::store::{ExecutionStore, PositionStore, TourStore};
use crate::error::AppError;
use crate::models::{Position, Tour, TourExecution};
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

/// Active-execution slot, keyed by user_id. It is written in the same
/// transaction as the execution it names, create-only unless it is being
/// reclaimed from a finished execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ActiveSlot {
    user_id: u64,
    execution_id: String,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client for testing.
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// The underlying client, or an error if offline.
    ///
    /// Direct writes bypass the slot bookkeeping; use for maintenance only.
    pub fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }


    // ─── Active Slot Helpers ─────────────────────────────────────

    async fn get_active_slot(&self, user_id: u64) -> Result<Option<ActiveSlot>, AppError> {
        read_slot(self.get_client()?, user_id).await
    }
}

/// What a start may do with the user's active slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotClaim {
    /// No slot exists; create it.
    Create,
    /// The slot points at a stored terminal execution; overwrite it.
    Reclaim,
    /// The slot is held by an active execution, or by one not yet readable.
    Occupied,
}

fn classify_slot(slot: Option<&ActiveSlot>, holder: Option<&TourExecution>) -> SlotClaim {
    match (slot, holder) {
        (None, _) => SlotClaim::Create,
        (Some(_), Some(holder)) if !holder.is_active() => SlotClaim::Reclaim,
        (Some(_), _) => SlotClaim::Occupied,
    }
}

/// A terminal write releases the slot only if the slot still names it.
fn releases_slot(slot: Option<&ActiveSlot>, execution: &TourExecution) -> bool {
    !execution.is_active() && slot.is_some_and(|s| s.execution_id == execution.id)
}

/// A view of `client` whose reads take part in `transaction`.
fn transactional_reads(
    client: &firestore::FirestoreDb,
    transaction: &firestore::FirestoreTransaction<'_>,
) -> firestore::FirestoreDb {
    client.clone_with_consistency_selector(firestore::FirestoreConsistencySelector::Transaction(
        transaction.transaction_id().clone(),
    ))
}

async fn read_slot(
    db: &firestore::FirestoreDb,
    user_id: u64,
) -> Result<Option<ActiveSlot>, AppError> {
    db.fluent()
        .select()
        .by_id_in(collections::ACTIVE_EXECUTIONS)
        .obj()
        .one(&user_id.to_string())
        .await
        .map_err(|e| AppError::Database(format!("Failed to read active slot: {}", e)))
}

async fn read_execution(
    db: &firestore::FirestoreDb,
    execution_id: &str,
) -> Result<Option<TourExecution>, AppError> {
    db.fluent()
        .select()
        .by_id_in(collections::TOUR_EXECUTIONS)
        .obj()
        .one(execution_id)
        .await
        .map_err(|e| AppError::Database(format!("Failed to read execution: {}", e)))
}

/// Commit, reporting lost races as `Conflict`.
async fn commit(
    transaction: firestore::FirestoreTransaction<'_>,
    conflict: String,
) -> Result<(), AppError> {
    match transaction.commit().await {
        Ok(_) => Ok(()),
        Err(firestore::errors::FirestoreError::DataConflictError(e)) => {
            tracing::debug!(error = %e, "Transaction lost a race");
            Err(AppError::Conflict(conflict))
        }
        Err(e) => Err(AppError::Database(format!("Transaction commit failed: {}", e))),
    }
}

#[async_trait]
impl PositionStore for FirestoreDb {
    async fn put_position(&self, position: &Position) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::POSITIONS)
            .document_id(position.user_id.to_string())
            .object(position)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn latest_position(&self, user_id: u64) -> Result<Option<Position>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::POSITIONS)
            .obj()
            .one(&user_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn clear_positions(&self, user_id: u64) -> Result<u64, AppError> {
        if self.latest_position(user_id).await?.is_none() {
            return Ok(0);
        }

        self.get_client()?
            .fluent()
            .delete()
            .from(collections::POSITIONS)
            .document_id(user_id.to_string())
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(1)
    }

    async fn all_latest_positions(&self) -> Result<Vec<Position>, AppError> {
        let mut positions: Vec<Position> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::POSITIONS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        positions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(positions)
    }
}

#[async_trait]
impl TourStore for FirestoreDb {
    async fn get_tour(&self, tour_id: &str) -> Result<Option<Tour>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::TOURS)
            .obj()
            .one(tour_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_tours(&self) -> Result<Vec<Tour>, AppError> {
        let mut tours: Vec<Tour> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::TOURS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        tours.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(tours)
    }

    async fn save_tour(&self, tour: &Tour) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::TOURS)
            .document_id(&tour.id)
            .object(tour)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ExecutionStore for FirestoreDb {
    async fn insert_active(&self, execution: &TourExecution) -> Result<(), AppError> {
        let client = self.get_client()?;
        let conflict = format!("User {} already has an active tour", execution.user_id);

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;
        let reads = transactional_reads(client, &transaction);

        // 1. Read the slot and whatever it points at
        let slot = read_slot(&reads, execution.user_id).await?;
        let holder = match &slot {
            Some(slot) => read_execution(&reads, &slot.execution_id).await?,
            None => None,
        };

        // 2. Decide
        let new_slot = ActiveSlot {
            user_id: execution.user_id,
            execution_id: execution.id.clone(),
        };
        let precondition = match classify_slot(slot.as_ref(), holder.as_ref()) {
            SlotClaim::Create => firestore::FirestoreWritePrecondition::Exists(false),
            SlotClaim::Reclaim => {
                tracing::warn!(
                    user_id = execution.user_id,
                    stale_execution_id = slot.as_ref().map_or("", |s| s.execution_id.as_str()),
                    "Reclaiming active slot of a finished execution"
                );
                firestore::FirestoreWritePrecondition::Exists(true)
            }
            SlotClaim::Occupied => {
                let _ = transaction.rollback().await;
                return Err(AppError::Conflict(conflict));
            }
        };

        // 3. Slot and execution commit together
        client
            .fluent()
            .update()
            .in_col(collections::ACTIVE_EXECUTIONS)
            .precondition(precondition)
            .document_id(execution.user_id.to_string())
            .object(&new_slot)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add slot to transaction: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::TOUR_EXECUTIONS)
            .precondition(firestore::FirestoreWritePrecondition::Exists(false))
            .document_id(&execution.id)
            .object(execution)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add execution to transaction: {}", e))
            })?;

        commit(transaction, conflict).await
    }


    async fn get_execution(&self, execution_id: &str) -> Result<Option<TourExecution>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::TOUR_EXECUTIONS)
            .obj()
            .one(execution_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn get_active(&self, user_id: u64) -> Result<Option<TourExecution>, AppError> {
        let Some(slot) = self.get_active_slot(user_id).await? else {
            return Ok(None);
        };
        Ok(self
            .get_execution(&slot.execution_id)
            .await?
            .filter(|e| e.is_active()))
    }


    async fn update_execution(
        &self,
        execution: &TourExecution,
        expected_revision: u64,
    ) -> Result<(), AppError> {
        let client = self.get_client()?;
        let conflict = format!("Tour execution {} was modified concurrently", execution.id);

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;
        let reads = transactional_reads(client, &transaction);

        // 1. Read the stored record through the transaction so a concurrent
        //    write to it fails our commit
        let Some(current) = read_execution(&reads, &execution.id).await? else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound(format!(
                "Tour execution {} not found",
                execution.id
            )));
        };

        // 2. Compare-and-set check
        if !current.is_active() || current.revision != expected_revision {
            let _ = transaction.rollback().await;
            return Err(AppError::Conflict(conflict));
        }

        // 3. Record write
        client
            .fluent()
            .update()
            .in_col(collections::TOUR_EXECUTIONS)
            .document_id(&execution.id)
            .object(execution)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add execution to transaction: {}", e))
            })?;

        // 4. Terminal transitions release the slot in the same commit, but
        //    only while it still names this execution
        if !execution.is_active() {
            let slot = read_slot(&reads, execution.user_id).await?;
            if releases_slot(slot.as_ref(), execution) {
                client
                    .fluent()
                    .delete()
                    .from(collections::ACTIVE_EXECUTIONS)
                    .document_id(execution.user_id.to_string())
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add slot release to transaction: {}",
                            e
                        ))
                    })?;
            }
        }

        commit(transaction, conflict).await
    }


    async fn list_for_user(&self, user_id: u64) -> Result<Vec<TourExecution>, AppError> {
        let stream = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::TOUR_EXECUTIONS)
            .filter(move |q| q.for_all([q.field("user_id").eq(user_id)]))
            .obj::<TourExecution>()
            .stream_query_with_errors()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut executions: Vec<TourExecution> = stream
            .filter_map(|record| async move {
                match record {
                    Ok(execution) => Some(execution),
                    Err(e) => {
                        tracing::warn!(user_id, error = %e, "Skipping undecodable execution record");
                        None
                    }
                }
            })
            .collect()
            .await;

        executions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(executions)
    }
}
