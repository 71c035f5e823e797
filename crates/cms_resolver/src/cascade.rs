//! The ordered backend cascade and the runner that walks it.

use cms_core::{ContentKind, ContentMode, Error, SourceKind};
use std::fmt;
use std::future::Future;
use tracing::{debug, warn};

use crate::config::MissingItemPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    BlogService,
    WorkspaceDatabase,
    Relational,
    StaticFallback,
}

impl Step {
    pub fn source(&self) -> SourceKind {
        match self {
            Step::BlogService => SourceKind::BlogService,
            Step::WorkspaceDatabase => SourceKind::WorkspaceDatabase,
            Step::Relational => SourceKind::Relational,
            Step::StaticFallback => SourceKind::StaticFallback,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source().as_str())
    }
}

/// What one step produced.
#[derive(Debug)]
pub enum Outcome<T> {
    Hit(T),
    /// Not found in a backend that is not the system of record.
    Miss,
    /// Transport or query failure; the cascade moves on.
    Failed(Error),
    /// The system of record has no such item. Ends the cascade.
    AuthoritativeEmpty,
}

#[derive(Debug)]
pub enum Resolution<T> {
    Answered { step: Step, value: T },
    Empty { step: Step },
    Exhausted,
}

/// Which optional backends take part for a given call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Participation {
    pub mode: ContentMode,
    pub blog_serves_kind: bool,
    pub workspace_enabled: bool,
}

impl Participation {
    fn live_steps(&self) -> Vec<Step> {
        let mut steps = Vec::with_capacity(4);
        if self.mode == ContentMode::BlogPublishing && self.blog_serves_kind {
            steps.push(Step::BlogService);
        }
        if self.workspace_enabled {
            steps.push(Step::WorkspaceDatabase);
        }
        steps.push(Step::Relational);
        steps
    }

    pub fn list_plan(&self) -> Vec<Step> {
        let mut steps = self.live_steps();
        steps.push(Step::StaticFallback);
        steps
    }

    pub fn get_plan(&self, policy: MissingItemPolicy) -> Vec<Step> {
        let mut steps = self.live_steps();
        if policy == MissingItemPolicy::Placeholder {
            steps.push(Step::StaticFallback);
        }
        steps
    }
}

/// Tries each step in order, one at a time, until one answers or the
/// system of record reports an authoritative empty result.
pub async fn run<T, F, Fut>(kind: ContentKind, steps: &[Step], mut attempt: F) -> Resolution<T>
where
    F: FnMut(Step) -> Fut,
    Fut: Future<Output = Outcome<T>>,
{
    for &step in steps {
        match attempt(step).await {
            Outcome::Hit(value) => {
                debug!(kind = %kind, step = %step, "content resolved");
                return Resolution::Answered { step, value };
            }
            Outcome::AuthoritativeEmpty => {
                debug!(kind = %kind, step = %step, "no such record in the system of record");
                return Resolution::Empty { step };
            }
            Outcome::Miss => {
                debug!(kind = %kind, step = %step, "not found, trying next step");
            }
            Outcome::Failed(error) => {
                warn!(
                    kind = %kind,
                    step = %step,
                    error = %error,
                    "content step failed, falling through"
                );
            }
        }
    }
    Resolution::Exhausted
}
