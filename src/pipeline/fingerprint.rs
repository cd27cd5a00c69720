use sha2::{Digest, Sha256};

use crate::model::HeartBeat;

/// Hex SHA-256 over every field that describes the activity itself.
/// The user agent and the hash are left out.
pub fn compute_hash(hb: &HeartBeat) -> String {
    let mut fp = Fingerprint::default();

    fp.str(&hb.user_id);
    fp.str(&hb.entity);
    fp.str(hb.entity_type.as_str());
    fp.opt_str(hb.category.as_deref());
    fp.str(&hb.project);
    fp.str(&hb.branch);
    fp.str(&hb.language);
    fp.str(if hb.is_write { "1" } else { "0" });
    fp.opt_int(hb.lines.map(i64::from));
    fp.opt_int(hb.line_number.map(i64::from));
    fp.opt_int(hb.cursor_position.map(i64::from));
    fp.opt_int(hb.time.map(|t| t.timestamp_millis()));
    fp.str(&hb.machine);
    fp.str(&hb.operating_system);
    fp.str(&hb.editor);

    hex::encode(fp.0.finalize())
}

/// Stores the fingerprint on the heartbeat.
pub fn hashed(hb: &mut HeartBeat) {
    hb.hash = Some(compute_hash(hb));
}

#[derive(Default)]
struct Fingerprint(Sha256);

impl Fingerprint {
    // Length-prefixed so adjacent fields cannot bleed into each other.
    fn str(&mut self, s: &str) {
        self.0.update((s.len() as u64).to_be_bytes());
        self.0.update(s.as_bytes());
    }

    fn opt_str(&mut self, s: Option<&str>) {
        match s {
            Some(s) => {
                self.0.update([1]);
                self.str(s);
            }
            None => self.0.update([0]),
        }
    }

    fn opt_int(&mut self, v: Option<i64>) {
        match v {
            Some(v) => {
                self.0.update([1]);
                self.0.update(v.to_be_bytes());
            }
            None => self.0.update([0]),
        }
    }
}
