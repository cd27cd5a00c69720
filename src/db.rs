use crate::model::{HeartBeat, User};
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait HeartBeatRepository: Send + Sync {
    /// Latest heartbeat of `user_id` for `project`, by event time.
    async fn most_recent(&self, user_id: &str, project: &str) -> Result<Option<HeartBeat>>;

    /// Stores the whole batch in one call. Heartbeats whose hash is already
    /// stored are skipped.
    async fn insert_batch(&self, heartbeats: Vec<HeartBeat>) -> Result<()>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_api_key(&self, api_key: &str) -> Result<Option<User>>;

    async fn update(&self, user: User) -> Result<User>;
}

pub mod mongo {
    use super::*;
    use anyhow::{Context as _, Result};
    use bson::{doc, Document};
    use mongodb::error::{ErrorKind, Error as MongoError};
    use mongodb::options::{ClientOptions, FindOneOptions, IndexOptions, InsertManyOptions};
    use mongodb::{Client, Collection, IndexModel};

    use crate::model::EntityType;

    const DUPLICATE_KEY: i32 = 11000;

    #[derive(Clone)]
    pub struct MongoDb {
        heartbeats: Collection<MongoHeartBeat>,
        users: Collection<User>,
    }

    impl MongoDb {
        const HEARTBEAT_COLLECTION: &'static str = "heartbeats";
        const USER_COLLECTION: &'static str = "users";

        pub async fn new(url: &str, database: &str) -> Result<Self> {
            let opt = ClientOptions::parse(url)
                .await
                .context("failed to parse mongodb url")?;

            let database = Client::with_options(opt)
                .context("failed to create mongodb client")?
                .database(database);

            let db = Self {
                heartbeats: database.collection(Self::HEARTBEAT_COLLECTION),
                users: database.collection(Self::USER_COLLECTION),
            };
            db.ensure_indexes().await?;

            Ok(db)
        }

        async fn ensure_indexes(&self) -> Result<()> {
            let by_hash = IndexModel::builder()
                .keys(doc! { "hash": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build();
            let by_project = IndexModel::builder()
                .keys(doc! { "user_id": 1, "project": 1, "time": -1 })
                .build();

            self.heartbeats
                .create_indexes([by_hash, by_project], None)
                .await
                .context("failed to create heartbeat indexes")?;

            Ok(())
        }
    }

    #[async_trait]
    impl HeartBeatRepository for MongoDb {
        async fn most_recent(&self, user_id: &str, project: &str) -> Result<Option<HeartBeat>> {
            let opt = FindOneOptions::builder().sort(doc! { "time": -1 }).build();

            let found = self
                .heartbeats
                .find_one(doc! { "user_id": user_id, "project": project }, opt)
                .await
                .context("failed to get latest heartbeat from mongodb")?;

            Ok(found.map(MongoHeartBeat::into_heartbeat))
        }

        async fn insert_batch(&self, heartbeats: Vec<HeartBeat>) -> Result<()> {
            if heartbeats.is_empty() {
                return Ok(());
            }

            let heartbeats = heartbeats.into_iter().map(MongoHeartBeat::from_heartbeat);
            let opt = InsertManyOptions::builder().ordered(false).build();

            match self.heartbeats.insert_many(heartbeats, opt).await {
                Ok(_) => Ok(()),
                Err(e) if only_duplicates(&e) => {
                    tracing::debug!("skipped already stored heartbeats");
                    Ok(())
                }
                Err(e) => Err(e).context("failed to put heartbeats to mongodb"),
            }
        }
    }

    #[async_trait]
    impl UserRepository for MongoDb {
        async fn find_by_api_key(&self, api_key: &str) -> Result<Option<User>> {
            self.users
                .find_one(doc! { "api_key": api_key }, None)
                .await
                .context("failed to get user from mongodb")
        }

        async fn update(&self, user: User) -> Result<User> {
            self.users
                .update_one(doc! { "_id": user.id.as_str() }, user_changes(&user), None)
                .await
                .context("failed to put user to mongodb")?;

            Ok(user)
        }
    }

    /// Only the fields this service owns; the rest of the user document is
    /// maintained elsewhere and must survive the write.
    fn user_changes(user: &User) -> Document {
        doc! { "$set": { "has_data": user.has_data } }
    }

    fn only_duplicates(e: &MongoError) -> bool {
        match e.kind.as_ref() {
            ErrorKind::BulkWrite(failure) => {
                failure.write_concern_error.is_none()
                    && failure
                        .write_errors
                        .as_ref()
                        .map_or(false, |errs| errs.iter().all(|w| w.code == DUPLICATE_KEY))
            }
            _ => false,
        }
    }

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub(crate) struct MongoHeartBeat {
        pub(crate) hash: Option<String>,
        pub(crate) user_id: String,
        pub(crate) entity: String,
        #[serde(rename = "type")]
        pub(crate) entity_type: EntityType,
        pub(crate) category: Option<String>,
        pub(crate) project: String,
        pub(crate) branch: String,
        pub(crate) language: String,
        pub(crate) is_write: bool,
        pub(crate) lines: Option<i32>,
        pub(crate) lineno: Option<i32>,
        pub(crate) cursorpos: Option<i32>,
        pub(crate) time: Option<bson::DateTime>,
        pub(crate) user_agent: String,
        pub(crate) machine: String,
        pub(crate) operating_system: String,
        pub(crate) editor: String,
        pub(crate) created_at: bson::DateTime,
    }

    impl MongoHeartBeat {
        fn from_heartbeat(origin: HeartBeat) -> MongoHeartBeat {
            MongoHeartBeat {
                hash: origin.hash,
                user_id: origin.user_id,
                entity: origin.entity,
                entity_type: origin.entity_type,
                category: origin.category,
                project: origin.project,
                branch: origin.branch,
                language: origin.language,
                is_write: origin.is_write,
                lines: origin.lines,
                lineno: origin.line_number,
                cursorpos: origin.cursor_position,
                time: origin.time.map(bson::DateTime::from_chrono),
                user_agent: origin.user_agent,
                machine: origin.machine,
                operating_system: origin.operating_system,
                editor: origin.editor,
                created_at: bson::DateTime::now(),
            }
        }

        fn into_heartbeat(self) -> HeartBeat {
            HeartBeat {
                user_id: self.user_id,
                entity: self.entity,
                entity_type: self.entity_type,
                category: self.category,
                project: self.project,
                branch: self.branch,
                language: self.language,
                is_write: self.is_write,
                lines: self.lines,
                line_number: self.lineno,
                cursor_position: self.cursorpos,
                time: self.time.map(|t| t.to_chrono()),
                user_agent: self.user_agent,
                machine: self.machine,
                operating_system: self.operating_system,
                editor: self.editor,
                hash: self.hash,
            }
        }
    }

}

/// Process-local store, handy for tests and local runs. Failures can be
/// switched on to exercise the error paths of the pipeline.
pub mod memory {
    use super::*;
    use anyhow::bail;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex, MutexGuard};

    #[derive(Default)]
    struct State {
        heartbeats: Vec<HeartBeat>,
        hashes: HashSet<String>,
        users: HashMap<String, User>,
        fail_inserts: bool,
        fail_lookups: bool,
        fail_user_updates: bool,
        lookups: usize,
    }

    #[derive(Clone, Default)]
    pub struct MemoryDb {
        inner: Arc<Mutex<State>>,
    }

    impl MemoryDb {
        pub fn new() -> Self {
            Self::default()
        }

        fn state(&self) -> MutexGuard<'_, State> {
            self.inner.lock().unwrap_or_else(|e| e.into_inner())
        }

        pub fn add_user(&self, user: User) {
            self.state().users.insert(user.id.clone(), user);
        }

        pub fn user(&self, id: &str) -> Option<User> {
            self.state().users.get(id).cloned()
        }

        /// Seeds a heartbeat as if it had been stored by an earlier request.
        pub fn add_heartbeat(&self, heartbeat: HeartBeat) {
            let mut state = self.state();
            if let Some(hash) = &heartbeat.hash {
                state.hashes.insert(hash.clone());
            }
            state.heartbeats.push(heartbeat);
        }

        pub fn heartbeats(&self) -> Vec<HeartBeat> {
            self.state().heartbeats.clone()
        }

        /// Number of `most_recent` calls served so far.
        pub fn lookups(&self) -> usize {
            self.state().lookups
        }

        pub fn fail_inserts(&self, fail: bool) {
            self.state().fail_inserts = fail;
        }

        pub fn fail_lookups(&self, fail: bool) {
            self.state().fail_lookups = fail;
        }

        pub fn fail_user_updates(&self, fail: bool) {
            self.state().fail_user_updates = fail;
        }
    }

    #[async_trait]
    impl HeartBeatRepository for MemoryDb {
        async fn most_recent(&self, user_id: &str, project: &str) -> Result<Option<HeartBeat>> {
            let mut state = self.state();
            state.lookups += 1;
            if state.fail_lookups {
                bail!("heartbeat lookup failed");
            }

            Ok(state
                .heartbeats
                .iter()
                .filter(|hb| hb.user_id == user_id && hb.project == project)
                .max_by_key(|hb| hb.time)
                .cloned())
        }

        async fn insert_batch(&self, heartbeats: Vec<HeartBeat>) -> Result<()> {
            let mut state = self.state();
            if state.fail_inserts {
                bail!("heartbeat insert failed");
            }

            for hb in heartbeats {
                if let Some(hash) = &hb.hash {
                    if !state.hashes.insert(hash.clone()) {
                        continue;
                    }
                }
                state.heartbeats.push(hb);
            }

            Ok(())
        }
    }

    #[async_trait]
    impl UserRepository for MemoryDb {
        async fn find_by_api_key(&self, api_key: &str) -> Result<Option<User>> {
            Ok(self
                .state()
                .users
                .values()
                .find(|u| u.api_key == api_key)
                .cloned())
        }

        async fn update(&self, user: User) -> Result<User> {
            let mut state = self.state();
            if state.fail_user_updates {
                bail!("user update failed");
            }
            state.users.insert(user.id.clone(), user.clone());
            Ok(user)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use chrono::{TimeZone, Utc};

        fn hb(project: &str, branch: &str, secs: i64, hash: &str) -> HeartBeat {
            HeartBeat {
                user_id: "alice".into(),
                project: project.into(),
                branch: branch.into(),
                time: Utc.timestamp_opt(secs, 0).single(),
                hash: Some(hash.into()),
                ..Default::default()
            }
        }

        #[tokio::test]
        async fn most_recent_picks_latest_of_project() {
            let db = MemoryDb::new();
            db.add_heartbeat(hb("wk", "main", 100, "a"));
            db.add_heartbeat(hb("wk", "feature", 200, "b"));
            db.add_heartbeat(hb("other", "dev", 300, "c"));

            let latest = db.most_recent("alice", "wk").await.unwrap().unwrap();
            assert_eq!(latest.branch, "feature");
            assert!(db.most_recent("bob", "wk").await.unwrap().is_none());
        }

        #[tokio::test]
        async fn duplicate_hashes_are_skipped() {
            let db = MemoryDb::new();
            db.insert_batch(vec![hb("wk", "main", 100, "a")]).await.unwrap();
            db.insert_batch(vec![hb("wk", "main", 100, "a"), hb("wk", "main", 101, "b")])
                .await
                .unwrap();

            assert_eq!(db.heartbeats().len(), 2);
        }
    }
}
