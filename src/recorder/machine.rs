//! Session transition table
//!
//! Every state change in the recorder goes through [`SessionState::next`].

use super::state::SessionState;

/// Inputs that can move a session between states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// User asked for a new session
    Start,
    /// Stream granted and encoder running
    Activated,
    /// Denied, unsupported, or encoder init failure
    StartFailed,
    /// User stop while acquisition is still pending
    Cancel,
    /// User stop, host revoke, or countdown expiry
    Stop,
    /// Encoder gave up mid-session
    Fault,
    /// User acknowledged a finished or failed session
    Reset,
}

impl SessionState {
    /// Returns the state `trigger` leads to, or `None` if the transition
    /// is not allowed from `self`.
    pub fn next(self, trigger: Trigger) -> Option<SessionState> {
        use SessionState::*;
        use Trigger::*;

        match (self, trigger) {
            (Idle, Start) => Some(AwaitingPermission),
            (AwaitingPermission, Activated) => Some(Active),
            (AwaitingPermission, StartFailed) => Some(Error),
            (AwaitingPermission, Cancel) => Some(Idle),
            (Active, Stop) => Some(Stopped),
            (Active, Fault) => Some(Error),
            (Stopped, Reset) | (Error, Reset) => Some(Idle),
            _ => None,
        }
    }

    /// Whether a session currently holds (or is acquiring) capture resources
    pub fn is_busy(self) -> bool {
        matches!(self, SessionState::AwaitingPermission | SessionState::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionState::*;

    #[test]
    fn test_happy_path() {
        let s = Idle.next(Trigger::Start).unwrap();
        assert_eq!(s, AwaitingPermission);
        let s = s.next(Trigger::Activated).unwrap();
        assert_eq!(s, Active);
        let s = s.next(Trigger::Stop).unwrap();
        assert_eq!(s, Stopped);
        assert_eq!(s.next(Trigger::Reset), Some(Idle));
    }

    #[test]
    fn test_failures_lead_to_error() {
        assert_eq!(AwaitingPermission.next(Trigger::StartFailed), Some(Error));
        assert_eq!(Active.next(Trigger::Fault), Some(Error));
        assert_eq!(Error.next(Trigger::Reset), Some(Idle));
    }

    #[test]
    fn test_rejected_transitions() {
        assert_eq!(Idle.next(Trigger::Stop), None);
        assert_eq!(Active.next(Trigger::Start), None);
        assert_eq!(AwaitingPermission.next(Trigger::Start), None);
        assert_eq!(Stopped.next(Trigger::Activated), None);
        assert_eq!(Active.next(Trigger::Reset), None);
        assert_eq!(Idle.next(Trigger::Fault), None);
    }

    #[test]
    fn test_cancel_only_while_pending() {
        assert_eq!(AwaitingPermission.next(Trigger::Cancel), Some(Idle));
        assert_eq!(Active.next(Trigger::Cancel), None);
    }
}
