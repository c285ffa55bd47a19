use statig::{blocking::IntoStateMachineExt as _, prelude::*};

use super::{
    config::MAX_RETRIES,
    types::{LinkEvent, LinkOutcome},
};

/// Actions requested by one `LinkEngine::handle` step. `connect` asks the
/// caller to re-issue a connect command on the radio; `outcome` carries the
/// terminal result exactly once per engine lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct LinkStep {
    pub(crate) connect: bool,
    pub(crate) outcome: Option<LinkOutcome>,
}

#[derive(Clone, Copy, Debug, Default)]
struct DispatchContext {
    connect: bool,
    outcome: Option<LinkOutcome>,
}

impl DispatchContext {
    fn request_connect(&mut self) {
        self.connect = true;
    }

    fn latch(&mut self, outcome: LinkOutcome) {
        if self.outcome.is_none() {
            self.outcome = Some(outcome);
        }
    }

    fn finish(self) -> LinkStep {
        LinkStep {
            connect: self.connect,
            outcome: self.outcome,
        }
    }
}

/// Connection-establishment state machine.
///
/// Single-writer: only the link task feeds events in. The retry counter and
/// the latched outcome live inside the machine and are only observable
/// through `handle` outputs and `retry_count`.
pub(crate) struct LinkEngine {
    machine: statig::blocking::StateMachine<LinkHsm>,
}

impl Default for LinkEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkEngine {
    pub(crate) fn new() -> Self {
        Self {
            machine: LinkHsm::new().state_machine(),
        }
    }

    pub(crate) fn handle(&mut self, event: LinkEvent) -> LinkStep {
        let mut context = DispatchContext::default();
        self.machine.handle_with_context(&event, &mut context);
        context.finish()
    }

    pub(crate) fn retry_count(&self) -> u32 {
        self.machine.retries
    }
}

struct LinkHsm {
    retries: u32,
}

impl LinkHsm {
    fn new() -> Self {
        Self { retries: 0 }
    }
}

#[state_machine(initial = "State::idle()")]
impl LinkHsm {
    #[state]
    fn idle(&mut self, context: &mut DispatchContext, event: &LinkEvent) -> Outcome<State> {
        match event {
            LinkEvent::AssociationStarted => {
                context.request_connect();
                Transition(State::associating())
            }
            // Notifications delivered before the radio reports startup are
            // tolerated without a transition.
            _ => Handled,
        }
    }

    #[state]
    fn associating(&mut self, context: &mut DispatchContext, event: &LinkEvent) -> Outcome<State> {
        match event {
            LinkEvent::Disassociated => {
                self.retries += 1;
                if self.retries < MAX_RETRIES {
                    // No backoff between attempts; re-issue immediately.
                    context.request_connect();
                    Handled
                } else {
                    context.latch(LinkOutcome::Failed);
                    Transition(State::failed())
                }
            }
            LinkEvent::AddressAcquired => {
                self.retries = 0;
                context.latch(LinkOutcome::Connected);
                Transition(State::connected())
            }
            LinkEvent::AssociationStarted => Handled,
        }
    }

    #[state]
    fn connected(&mut self, context: &mut DispatchContext, event: &LinkEvent) -> Outcome<State> {
        // Terminal: the latched outcome is never overwritten or re-emitted.
        let _ = (context, event);
        Handled
    }

    #[state]
    fn failed(&mut self, context: &mut DispatchContext, event: &LinkEvent) -> Outcome<State> {
        let _ = (context, event);
        Handled
    }
}
