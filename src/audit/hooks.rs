//! Optional notification callbacks, invoked synchronously

use crate::error::AuthError;
use crate::evolution::EvolutionEvent;
use chrono::{DateTime, Utc};
use std::fmt;

type IdentityHook = Box<dyn Fn(&str) + Send + Sync>;
type FailureHook = Box<dyn Fn(&str, &AuthError) + Send + Sync>;
type LockoutHook = Box<dyn Fn(&str, DateTime<Utc>) + Send + Sync>;
type EvolutionHook = Box<dyn Fn(&str, &EvolutionEvent) + Send + Sync>;
type FitnessHook = Box<dyn Fn(&str, f64) + Send + Sync>;

/// Callbacks the embedder may register. Absent hooks are no-ops.
#[derive(Default)]
pub struct Hooks {
    on_auth_success: Option<IdentityHook>,
    on_auth_failure: Option<FailureHook>,
    on_lockout: Option<LockoutHook>,
    on_evolution: Option<EvolutionHook>,
    on_fitness_warning: Option<FitnessHook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_auth_success(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_auth_success = Some(Box::new(f));
        self
    }

    pub fn on_auth_failure(mut self, f: impl Fn(&str, &AuthError) + Send + Sync + 'static) -> Self {
        self.on_auth_failure = Some(Box::new(f));
        self
    }

    pub fn on_lockout(mut self, f: impl Fn(&str, DateTime<Utc>) + Send + Sync + 'static) -> Self {
        self.on_lockout = Some(Box::new(f));
        self
    }

    pub fn on_evolution(mut self, f: impl Fn(&str, &EvolutionEvent) + Send + Sync + 'static) -> Self {
        self.on_evolution = Some(Box::new(f));
        self
    }

    pub fn on_fitness_warning(mut self, f: impl Fn(&str, f64) + Send + Sync + 'static) -> Self {
        self.on_fitness_warning = Some(Box::new(f));
        self
    }

    pub(crate) fn auth_success(&self, identity: &str) {
        if let Some(f) = &self.on_auth_success {
            f(identity);
        }
    }

    pub(crate) fn auth_failure(&self, identity: &str, err: &AuthError) {
        if let Some(f) = &self.on_auth_failure {
            f(identity, err);
        }
    }

    pub(crate) fn lockout(&self, identity: &str, until: DateTime<Utc>) {
        if let Some(f) = &self.on_lockout {
            f(identity, until);
        }
    }

    pub(crate) fn evolution(&self, identity: &str, event: &EvolutionEvent) {
        if let Some(f) = &self.on_evolution {
            f(identity, event);
        }
    }

    pub(crate) fn fitness_warning(&self, identity: &str, fitness: f64) {
        if let Some(f) = &self.on_fitness_warning {
            f(identity, fitness);
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_auth_success", &self.on_auth_success.is_some())
            .field("on_auth_failure", &self.on_auth_failure.is_some())
            .field("on_lockout", &self.on_lockout.is_some())
            .field("on_evolution", &self.on_evolution.is_some())
            .field("on_fitness_warning", &self.on_fitness_warning.is_some())
            .finish()
    }
}
