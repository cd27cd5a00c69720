use serde::Serialize;

const CREATED: u16 = 201;

/// Success body understood by WakaTime clients:
/// `{"responses": [[null, 201], ...]}`, one pair per admitted heartbeat.
///
/// The pairs do not describe the individual heartbeats. Clients only look
/// for the 201 to consider a heartbeat delivered, so the shape must stay
/// exactly like this.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct HeartBeatResponse {
    responses: Vec<(Option<()>, u16)>,
}

impl HeartBeatResponse {
    pub fn created(n: usize) -> Self {
        Self {
            responses: vec![(None, CREATED); n],
        }
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}
