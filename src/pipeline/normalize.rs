use crate::model::HeartBeat;
use crate::useragent;

/// Client metadata of a batch, resolved once from the request headers and
/// then carried from record to record.
///
/// A record that brings its own user agent becomes the default for the
/// records after it, but an operating system or editor that cannot be read
/// from it never replaces one that is already known. The machine name is
/// fixed by the request and only overridden per record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchDefaults {
    user_id: String,
    user_agent: String,
    operating_system: String,
    editor: String,
    machine: String,
}

impl BatchDefaults {
    pub fn new(user_id: &str, user_agent: &str, machine: &str) -> Self {
        let ua = useragent::parse(user_agent);

        Self {
            user_id: user_id.to_string(),
            user_agent: user_agent.to_string(),
            operating_system: ua.operating_system,
            editor: ua.editor,
            machine: machine.to_string(),
        }
    }

    pub fn apply(&mut self, hb: &mut HeartBeat) {
        if !hb.user_agent.is_empty() {
            let ua = useragent::parse(&hb.user_agent);
            self.user_agent = hb.user_agent.clone();
            if !ua.operating_system.is_empty() {
                self.operating_system = ua.operating_system;
            }
            if !ua.editor.is_empty() {
                self.editor = ua.editor;
            }
        }

        if hb.machine.is_empty() {
            hb.machine = self.machine.clone();
        }

        hb.user_id = self.user_id.clone();
        hb.user_agent = self.user_agent.clone();
        hb.operating_system = self.operating_system.clone();
        hb.editor = self.editor.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterext::IterExt;

    const VSCODE: &str =
        "wakatime/v1.73.0 (linux-6.1.0-generic-x86_64) go1.20.3 vscode/1.80.0 vscode-wakatime/24.2.0";
    const VIM_MAC: &str = "wakatime/v1.73.0 (darwin-22.5.0-arm64) go1.20.3 vim/9.0 vim-wakatime/11.1.0";

    fn hb(user_agent: &str, machine: &str) -> HeartBeat {
        HeartBeat {
            entity: "main.rs".into(),
            user_agent: user_agent.into(),
            machine: machine.into(),
            ..Default::default()
        }
    }

    fn normalize(defaults: BatchDefaults, batch: Vec<HeartBeat>) -> Vec<HeartBeat> {
        batch
            .into_iter()
            .edit_with(defaults, |d, hb| d.apply(hb))
            .collect()
    }

    #[test]
    fn header_defaults_are_stamped() {
        let out = normalize(BatchDefaults::new("alice", VSCODE, "desk"), vec![hb("", "")]);

        assert_eq!(out[0].user_id, "alice");
        assert_eq!(out[0].user_agent, VSCODE);
        assert_eq!(out[0].operating_system, "Linux");
        assert_eq!(out[0].editor, "vscode");
        assert_eq!(out[0].machine, "desk");
    }

    #[test]
    fn record_user_agent_flows_to_later_records() {
        let out = normalize(
            BatchDefaults::new("alice", VSCODE, ""),
            vec![hb(VIM_MAC, ""), hb("", ""), hb("", "")],
        );

        for hb in &out {
            assert_eq!(hb.operating_system, "Darwin");
            assert_eq!(hb.editor, "vim");
            assert_eq!(hb.user_agent, VIM_MAC);
        }
    }

    #[test]
    fn earlier_records_keep_their_metadata() {
        let out = normalize(
            BatchDefaults::new("alice", VSCODE, ""),
            vec![hb("", ""), hb(VIM_MAC, "")],
        );

        assert_eq!(out[0].editor, "vscode");
        assert_eq!(out[1].editor, "vim");
    }

    #[test]
    fn unreadable_user_agent_keeps_known_defaults() {
        let out = normalize(
            BatchDefaults::new("alice", VSCODE, ""),
            vec![hb("curl/8.0.1", ""), hb("", "")],
        );

        for hb in &out {
            assert_eq!(hb.user_agent, "curl/8.0.1");
            assert_eq!(hb.operating_system, "Linux");
            assert_eq!(hb.editor, "vscode");
        }
    }

    #[test]
    fn machine_override_stays_on_its_record() {
        let out = normalize(
            BatchDefaults::new("alice", "", "desk"),
            vec![hb("", "laptop"), hb("", "")],
        );

        assert_eq!(out[0].machine, "laptop");
        assert_eq!(out[1].machine, "desk");
    }

    #[test]
    fn empty_header_resolves_to_empty_fields() {
        let out = normalize(BatchDefaults::new("alice", "", ""), vec![hb("", "")]);

        assert_eq!(out[0].operating_system, "");
        assert_eq!(out[0].editor, "");
        assert_eq!(out[0].machine, "");
    }
}
