//! Startup selection.

use crate::services::ServiceKind;

/// What the process was asked to do, resolved from flags before any state
/// exists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub bot: bool,
    pub web: bool,
    pub reddit: bool,
    pub stats: bool,
    pub all: bool,
    pub action: Option<String>,
}

/// How the selection resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Nothing selected.
    Idle,
    /// Run one action and exit. Service flags are ignored.
    Action(String),
    /// Launch these services and park.
    Services(Vec<ServiceKind>),
}

impl Selection {
    /// True when no service flag and no action was given.
    pub fn is_empty(&self) -> bool {
        !(self.bot || self.web || self.reddit || self.stats || self.all) && self.action.is_none()
    }

    /// Whether `kind` should be launched.
    pub fn wants(&self, kind: ServiceKind) -> bool {
        self.all
            || match kind {
                ServiceKind::ClientLoop => self.bot,
                ServiceKind::HttpListener => self.web,
                ServiceKind::Poller => self.reddit,
                ServiceKind::StatsLoop => self.stats,
            }
    }

    /// Services to launch, in catalog order.
    pub fn services(&self) -> Vec<ServiceKind> {
        ServiceKind::ALL.into_iter().filter(|k| self.wants(*k)).collect()
    }

    pub fn mode(&self) -> Mode {
        if let Some(action) = &self.action {
            return Mode::Action(action.clone());
        }
        match self.services() {
            kinds if kinds.is_empty() => Mode::Idle,
            kinds => Mode::Services(kinds),
        }
    }
}
