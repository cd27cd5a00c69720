use chrono::Utc;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::{self, Reply, Response};
use warp::{Filter, Rejection};

use crate::auth;
use crate::db::{HeartBeatRepository, UserRepository};
use crate::error::IngestError;
use crate::model::{HeartBeat, HeartBeatJson};
use crate::pipeline::{HeartBeatResponse, Pipeline, RequestContext};

/// Largest accepted request body.
pub const MAX_BODY_BYTES: u64 = 2 * 1024 * 1024;

pub fn inject<T>(t: T) -> impl Filter<Extract = (T,), Error = Infallible> + Clone
where
    T: Send + Sync + Clone,
{
    warp::any().map(move || t.clone())
}

/// `POST` on every heartbeat path WakaTime clients are known to use.
pub fn routes<H, U>(
    pipeline: Arc<Pipeline<H, U>>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone
where
    H: HeartBeatRepository + 'static,
    U: UserRepository + 'static,
{
    warp::post()
        .and(heartbeat_path())
        .and(warp::filters::header::optional::<String>("authorization"))
        .and(warp::filters::header::optional::<String>("user-agent"))
        .and(warp::filters::header::optional::<String>("x-machine-name"))
        .and(warp::filters::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::filters::body::bytes())
        .and(inject(pipeline))
        .and_then(on_heartbeat::<H, U>)
}

/// Extracts the `{user}` segment, if the path has one.
fn heartbeat_path() -> impl Filter<Extract = (Option<String>,), Error = Rejection> + Clone {
    let own = warp::path!("heartbeat")
        .or(warp::path!("heartbeats"))
        .unify()
        .map(|| None::<String>);

    let users = warp::path!("users" / String / "heartbeats")
        .or(warp::path!("users" / String / "heartbeats.bulk"))
        .unify()
        .or(warp::path!("v1" / "users" / String / "heartbeats"))
        .unify()
        .or(warp::path!("v1" / "users" / String / "heartbeats.bulk"))
        .unify()
        .or(warp::path!("compat" / "wakatime" / "v1" / "users" / String / "heartbeats"))
        .unify()
        .or(warp::path!("compat" / "wakatime" / "v1" / "users" / String / "heartbeats.bulk"))
        .unify()
        .map(Some);

    own.or(users).unify()
}

async fn on_heartbeat<H, U>(
    requested_user: Option<String>,
    authorization: Option<String>,
    user_agent: Option<String>,
    machine: Option<String>,
    body: Bytes,
    pipeline: Arc<Pipeline<H, U>>,
) -> Result<Response, Infallible>
where
    H: HeartBeatRepository,
    U: UserRepository,
{
    let ctx = RequestContext {
        user_agent: user_agent.unwrap_or_default(),
        machine: machine.unwrap_or_default(),
    };

    let result = ingest(
        &pipeline,
        requested_user.as_deref(),
        authorization.as_deref(),
        &body,
        &ctx,
    )
    .await;

    Ok(match result {
        Ok(n) => reply::with_status(reply::json(&HeartBeatResponse::created(n)), StatusCode::CREATED)
            .into_response(),
        Err(e) => reply::with_status(e.public_message(), e.status()).into_response(),
    })
}

async fn ingest<H, U>(
    pipeline: &Pipeline<H, U>,
    requested_user: Option<&str>,
    authorization: Option<&str>,
    body: &[u8],
    ctx: &RequestContext,
) -> Result<usize, IngestError>
where
    H: HeartBeatRepository,
    U: UserRepository,
{
    let user = auth::authenticate(pipeline.users(), authorization).await?;
    auth::check_effective_user(&user, requested_user)?;

    let batch = parse_heartbeats(body).map_err(|e| {
        tracing::warn!(user_id = %user.id, error = %e, "failed to parse heartbeats");
        e
    })?;

    pipeline.admit(user, batch, ctx, Utc::now()).await
}

/// Accepts a single heartbeat object or an array of them. `null` entries
/// are kept as absent records.
pub fn parse_heartbeats(body: &[u8]) -> Result<Vec<Option<HeartBeat>>, IngestError> {
    let is_array = body
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .map_or(false, |b| *b == b'[');

    let parsed: Result<Vec<Option<HeartBeatJson>>, _> = if is_array {
        serde_json::from_slice(body)
    } else {
        serde_json::from_slice::<Option<HeartBeatJson>>(body).map(|hb| vec![hb])
    };

    parsed
        .map(|batch| batch.into_iter().map(|hb| hb.map(HeartBeat::from)).collect())
        .map_err(|e| IngestError::MalformedBatch(e.to_string()))
}
