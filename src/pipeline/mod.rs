//! Admission of heartbeat batches.
//!
//! A batch is normalized record by record, in submission order, then each
//! record gets its branch resolved, is validated and fingerprinted. The
//! first bad record rejects the whole batch; nothing is stored unless every
//! record passed.

pub mod branch;
pub mod fingerprint;
pub mod normalize;
pub mod response;
pub mod validate;

use chrono::{DateTime, Utc};

use crate::config::HeartBeatLimits;
use crate::db::{HeartBeatRepository, UserRepository};
use crate::error::IngestError;
use crate::iterext::IterExt;
use crate::model::{HeartBeat, User};

pub use normalize::BatchDefaults;
pub use response::HeartBeatResponse;

/// Request-level client metadata, taken from the `User-Agent` and
/// `X-Machine-Name` headers.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub user_agent: String,
    pub machine: String,
}

pub struct Pipeline<H, U> {
    heartbeats: H,
    users: U,
    limits: HeartBeatLimits,
}

impl<H, U> Pipeline<H, U>
where
    H: HeartBeatRepository,
    U: UserRepository,
{
    pub fn new(heartbeats: H, users: U, limits: HeartBeatLimits) -> Self {
        Self {
            heartbeats,
            users,
            limits,
        }
    }

    pub fn users(&self) -> &U {
        &self.users
    }

    /// Normalizes, validates and fingerprints `batch` on behalf of `user`.
    /// Absent records and records failing validation reject the batch.
    pub async fn prepare_batch(
        &self,
        user: &User,
        batch: Vec<Option<HeartBeat>>,
        ctx: &RequestContext,
        now: DateTime<Utc>,
    ) -> Result<Vec<HeartBeat>, IngestError> {
        let defaults = BatchDefaults::new(&user.id, &ctx.user_agent, &ctx.machine);
        let batch: Vec<Option<HeartBeat>> = batch
            .into_iter()
            .edit_with(defaults, |defaults, slot| {
                if let Some(hb) = slot {
                    defaults.apply(hb);
                }
            })
            .collect();

        let mut admitted = Vec::with_capacity(batch.len());

        for (index, slot) in batch.into_iter().enumerate() {
            let mut hb = match slot {
                Some(hb) => hb,
                None => {
                    tracing::warn!(user_id = %user.id, index, "rejected batch with absent heartbeat");
                    return Err(IngestError::InvalidHeartBeat);
                }
            };

            branch::resolve(&self.heartbeats, &mut hb).await;

            if !validate::is_valid(&hb) {
                tracing::warn!(user_id = %user.id, index, "rejected batch with malformed heartbeat");
                return Err(IngestError::InvalidHeartBeat);
            }
            if !validate::is_timely(&hb, self.limits, now) {
                tracing::warn!(
                    user_id = %user.id,
                    index,
                    time = ?hb.time,
                    "rejected batch with out-of-window heartbeat"
                );
                return Err(IngestError::InvalidHeartBeat);
            }

            fingerprint::hashed(&mut hb);
            admitted.push(hb);
        }

        Ok(admitted)
    }

    /// Admits the batch and returns how many heartbeats were stored.
    pub async fn admit(
        &self,
        mut user: User,
        batch: Vec<Option<HeartBeat>>,
        ctx: &RequestContext,
        now: DateTime<Utc>,
    ) -> Result<usize, IngestError> {
        let admitted = self.prepare_batch(&user, batch, ctx, now).await?;
        let count = admitted.len();

        if count == 0 {
            return Ok(0);
        }

        if let Err(e) = self.heartbeats.insert_batch(admitted).await {
            tracing::error!(user_id = %user.id, error = %format!("{:#}", e), "failed to batch-insert heartbeats");
            return Err(IngestError::Persistence(e));
        }

        if !user.has_data {
            user.has_data = true;
            if let Err(e) = self.users.update(user.clone()).await {
                tracing::error!(user_id = %user.id, error = %format!("{:#}", e), "failed to update user");
                return Err(IngestError::UserUpdate {
                    user_id: user.id,
                    error: e,
                });
            }
        }

        tracing::debug!(user_id = %user.id, count, "admitted heartbeats");

        Ok(count)
    }
}
