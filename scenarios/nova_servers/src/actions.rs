use std::fmt::{Display, Formatter};
use std::str::FromStr;

use cloudstorm_client::prelude::Resource;
use cloudstorm_runner::prelude::Args;
use serde_json::Value;

use crate::utils::Nova;

/// Something `boot_and_bounce_server` can do to a running server, leaving it ACTIVE again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BounceAction {
    HardReboot,
    SoftReboot,
    StopStart,
    RescueUnrescue,
}

impl BounceAction {
    pub const ALL: [BounceAction; 4] = [
        Self::HardReboot,
        Self::SoftReboot,
        Self::StopStart,
        Self::RescueUnrescue,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HardReboot => "hard_reboot",
            Self::SoftReboot => "soft_reboot",
            Self::StopStart => "stop_start",
            Self::RescueUnrescue => "rescue_unrescue",
        }
    }

    pub fn apply(self, nova: &Nova, server: &Resource) -> anyhow::Result<()> {
        match self {
            Self::HardReboot => {
                nova.reboot(server, false)?;
            }
            Self::SoftReboot => {
                nova.reboot(server, true)?;
            }
            Self::StopStart => {
                nova.stop(server)?;
                nova.start(server)?;
            }
            Self::RescueUnrescue => {
                nova.rescue(server)?;
                nova.unrescue(server)?;
            }
        }
        Ok(())
    }
}

impl Display for BounceAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BounceAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "unknown action `{s}`, expected one of {}",
                    Self::ALL.map(BounceAction::as_str).join(", ")
                )
            })
    }
}

/// Parse `actions`, a list of single-key maps such as `[{"stop_start": 2}, {"hard_reboot": 1}]`,
/// into the actions to perform, in order.
pub fn parse_actions(actions: &Value) -> Result<Vec<BounceAction>, String> {
    let entries = actions
        .as_array()
        .ok_or_else(|| "actions must be a list".to_string())?;

    let mut parsed = Vec::new();
    for entry in entries {
        let map = entry
            .as_object()
            .filter(|map| map.len() == 1)
            .ok_or_else(|| format!("each action must be a map with a single key, got {entry}"))?;
        for (name, count) in map {
            let action = name.parse::<BounceAction>()?;
            let count = count
                .as_u64()
                .filter(|count| *count > 0)
                .ok_or_else(|| {
                    format!("the count of {action} must be a positive integer, got {count}")
                })?;
            parsed.extend(std::iter::repeat(action).take(count as usize));
        }
    }

    Ok(parsed)
}

/// The actions from the workload args. No `actions` means nothing to do.
pub fn actions_from_args(args: &Args) -> anyhow::Result<Vec<BounceAction>> {
    match args.get("actions") {
        None => Ok(Vec::new()),
        Some(actions) => parse_actions(actions).map_err(|error| {
            anyhow::anyhow!(
                "Invalid server actions configuration `{actions}` due to: {error}"
            )
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn actions_expand_in_order() {
        let actions = parse_actions(&json!([{"stop_start": 2}, {"hard_reboot": 1}])).unwrap();

        assert_eq!(
            vec![
                BounceAction::StopStart,
                BounceAction::StopStart,
                BounceAction::HardReboot
            ],
            actions
        );
    }

    #[test]
    fn unknown_actions_are_rejected() {
        let err = parse_actions(&json!([{"reboot": 1}])).unwrap_err();

        assert!(err.contains("unknown action `reboot`"));
    }

    #[test]
    fn counts_must_be_positive_integers() {
        assert!(parse_actions(&json!([{"soft_reboot": 0}])).is_err());
        assert!(parse_actions(&json!([{"soft_reboot": -1}])).is_err());
        assert!(parse_actions(&json!([{"soft_reboot": 1.5}])).is_err());
    }

    #[test]
    fn entries_hold_exactly_one_action() {
        assert!(parse_actions(&json!([{"soft_reboot": 1, "hard_reboot": 1}])).is_err());
        assert!(parse_actions(&json!({"soft_reboot": 1})).is_err());
    }

    #[test]
    fn missing_actions_mean_none() {
        assert!(actions_from_args(&Args::new()).unwrap().is_empty());
    }
}
