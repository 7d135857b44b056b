use std::time::Duration;

use crate::config::Settings;

/// Idle handling derived from the current settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdlePolicy {
    pub timeout: Duration,
    pub disconnect_on_idle: bool,
    pub reset_elapsed_time: bool,
}

/// What to do once the window has stayed unfocused for the whole timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleAction {
    /// Disable the session; optionally forget the elapsed-time origin.
    Disconnect { reset_elapsed_time: bool },
    /// Keep the session and send an idle-flavoured activity.
    Dispatch,
}

impl IdlePolicy {
    /// `None` when a zero timeout switches idle detection off.
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        let timeout = settings.idle_timeout();
        if timeout.is_zero() {
            return None;
        }
        Some(Self {
            timeout,
            disconnect_on_idle: settings.disconnect_on_idle,
            reset_elapsed_time: settings.reset_elapsed_time,
        })
    }

    pub fn on_elapsed(&self) -> IdleAction {
        if self.disconnect_on_idle {
            IdleAction::Disconnect {
                reset_elapsed_time: self.reset_elapsed_time,
            }
        } else {
            IdleAction::Dispatch
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeout_disables_idle_detection() {
        let settings = Settings {
            idle_timeout_secs: 0,
            ..Settings::default()
        };
        assert_eq!(IdlePolicy::from_settings(&settings), None);
    }

    #[test]
    fn disconnect_policy_carries_reset_flag() {
        let settings = Settings {
            idle_timeout_secs: 30,
            disconnect_on_idle: true,
            reset_elapsed_time: true,
            ..Settings::default()
        };
        let Some(policy) = IdlePolicy::from_settings(&settings) else {
            panic!("idle policy should be active");
        };

        assert_eq!(policy.timeout, Duration::from_secs(30));
        assert_eq!(
            policy.on_elapsed(),
            IdleAction::Disconnect {
                reset_elapsed_time: true
            }
        );
    }

    #[test]
    fn reset_flag_alone_keeps_dispatching() {
        let settings = Settings {
            reset_elapsed_time: true,
            ..Settings::default()
        };
        let policy = IdlePolicy::from_settings(&settings);

        assert_eq!(policy.map(|p| p.on_elapsed()), Some(IdleAction::Dispatch));
    }
}
