//! The answer gate: the per-task ticket authority
//!
//! Issues, validates, matches, and single-use-consumes the expected
//! answer a task is suspended on. The expected answer lives in the task's
//! managed state, so a gate borrows the slot instead of owning it.
//!
//! Consumption happens synchronously, before any callback body runs; of
//! two concurrent deliveries of the same ticket exactly one passes the
//! gate. Tickets carry no expiry; an unanswered suspension waits
//! indefinitely.

use crate::program::HandlerRegistry;
use relay_types::{
    CallbackId, CallbackTicket, EngineError, EngineResult, ExpectedAnswer, InteractionId,
    SecretProvider, Ticket,
};
use serde_json::Value;

/// Ticket authority over one task's expected-answer slot.
pub struct AnswerGate<'a> {
    slot: &'a mut Option<ExpectedAnswer>,
    registry: &'a HandlerRegistry,
    secret: &'a dyn SecretProvider,
}

impl<'a> AnswerGate<'a> {
    pub fn new(
        slot: &'a mut Option<ExpectedAnswer>,
        registry: &'a HandlerRegistry,
        secret: &'a dyn SecretProvider,
    ) -> Self {
        Self {
            slot,
            registry,
            secret,
        }
    }

    /// Mint a ticket and store the expected answer.
    ///
    /// Fails if the callback or the requested interaction is not in the
    /// registry. Overwrites any previous expectation; the old ticket is
    /// invalid from here on.
    pub fn issue(
        &mut self,
        callback: CallbackId,
        interaction: Option<InteractionId>,
        continuation: Vec<Value>,
    ) -> EngineResult<CallbackTicket> {
        let expected = ExpectedAnswer {
            ticket: Ticket::mint(&callback, self.secret),
            callback,
            interaction,
            continuation,
        };
        Self::validate(&expected, self.registry, self.secret)?;
        let callback_ticket = expected.callback_ticket();
        *self.slot = Some(expected);
        Ok(callback_ticket)
    }

    /// Pure check of an expected answer: callback registered, ticket
    /// digest recomputes, interaction (if any) registered.
    ///
    /// Used at issue time and again when restoring persisted state, so a
    /// corrupted or tampered record is rejected on load.
    pub fn validate(
        expected: &ExpectedAnswer,
        registry: &HandlerRegistry,
        secret: &dyn SecretProvider,
    ) -> EngineResult<()> {
        if !registry.has_callback(&expected.callback) {
            return Err(EngineError::UnknownCallback(expected.callback.clone()));
        }
        if !expected.ticket.verify(&expected.callback, secret) {
            return Err(EngineError::InvalidExpectedAnswer(
                "ticket digest does not match".to_string(),
            ));
        }
        if let Some(interaction) = &expected.interaction {
            if !registry.has_interaction(interaction) {
                return Err(EngineError::UnknownInteraction(interaction.clone()));
            }
        }
        Ok(())
    }

    /// Equality check against the current expectation; no side effects.
    pub fn is_expected(&self, callback: &CallbackId, ticket: &Ticket) -> bool {
        match &*self.slot {
            Some(expected) => &expected.callback == callback && &expected.ticket == ticket,
            None => false,
        }
    }

    /// Clear and return the current expectation.
    pub fn consume(&mut self) -> Option<ExpectedAnswer> {
        self.slot.take()
    }
}
