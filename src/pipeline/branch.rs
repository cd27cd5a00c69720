use anyhow::Result;

use crate::db::HeartBeatRepository;
use crate::model::{HeartBeat, LAST_BRANCH_MARKER};

/// Branch of the latest stored heartbeat of `user_id` for `project`.
pub async fn last_branch<H>(repo: &H, user_id: &str, project: &str) -> Result<Option<String>>
where
    H: HeartBeatRepository + ?Sized,
{
    Ok(repo
        .most_recent(user_id, project)
        .await?
        .map(|latest| latest.branch))
}

/// Replaces the last-branch marker with the branch actually last reported.
///
/// A failed lookup is logged and treated like a project without history,
/// so the heartbeat ends up with an empty branch instead of failing the
/// request.
pub async fn resolve<H>(repo: &H, hb: &mut HeartBeat)
where
    H: HeartBeatRepository + ?Sized,
{
    if hb.branch != LAST_BRANCH_MARKER {
        return;
    }

    hb.branch = match last_branch(repo, &hb.user_id, &hb.project).await {
        Ok(branch) => branch.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(
                user_id = %hb.user_id,
                project = %hb.project,
                error = %format!("{:#}", e),
                "failed to look up last branch"
            );
            String::new()
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryDb;
    use chrono::{TimeZone, Utc};

    fn hb(project: &str, branch: &str) -> HeartBeat {
        HeartBeat {
            user_id: "alice".into(),
            project: project.into(),
            branch: branch.into(),
            time: Utc.timestamp_opt(1_700_000_000, 0).single(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn marker_resolves_to_stored_branch() {
        let db = MemoryDb::new();
        db.add_heartbeat(hb("wk", "main"));

        let mut fresh = hb("wk", LAST_BRANCH_MARKER);
        resolve(&db, &mut fresh).await;

        assert_eq!(fresh.branch, "main");
    }

    #[tokio::test]
    async fn marker_without_history_resolves_to_empty() {
        let db = MemoryDb::new();
        db.add_heartbeat(hb("other", "main"));

        let mut fresh = hb("wk", LAST_BRANCH_MARKER);
        resolve(&db, &mut fresh).await;

        assert_eq!(fresh.branch, "");
    }

    #[tokio::test]
    async fn failed_lookup_resolves_to_empty() {
        let db = MemoryDb::new();
        db.add_heartbeat(hb("wk", "main"));
        db.fail_lookups(true);

        assert!(last_branch(&db, "alice", "wk").await.is_err());

        let mut fresh = hb("wk", LAST_BRANCH_MARKER);
        resolve(&db, &mut fresh).await;

        assert_eq!(fresh.branch, "");
    }

    #[tokio::test]
    async fn plain_branches_skip_the_lookup() {
        let db = MemoryDb::new();

        let mut fresh = hb("wk", "feature");
        resolve(&db, &mut fresh).await;

        assert_eq!(fresh.branch, "feature");
        assert_eq!(db.lookups(), 0);
    }
}
