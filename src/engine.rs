//! Engine — one context object owning every piece of credential state
//!
//! Registry, lineages, attempt log, evolution log and statistics live here
//! together with the injected collaborators (entropy, digest, audit sink,
//! clock). All mutation goes through `&mut self`; wrap the engine in a
//! [`SharedEngine`] to use it from several threads.

use crate::audit::{AttemptLog, AttemptOutcome, AttemptRecord, AuditEvent, AuditSink, Hooks, LogSink};
use crate::auth::{self, MatchDetail};
use crate::clock::{self, Clock, SystemClock};
use crate::config::EngineConfig;
use crate::crypto::{self, CredentialHash, DerivationMode, DigestProvider, EntropySource, OsEntropy, Salt, Sha256Digest};
use crate::error::{AuthError, Result};
use crate::evolution::{
    self, AncestorPolicy, EvolutionEvent, Generation, Lineage, LineageState, Mutation, SelectionPressure,
};
use crate::registry::{self, CredentialKey, KeyOptions, Registry};
use crate::sequence::{self, Analysis, CodonTable, Sequence};
use crate::storage::EngineState;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Running counters, returned by [`Engine::shutdown`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub total_auths: u64,
    pub successful_auths: u64,
    pub failed_auths: u64,
    pub fuzzy_matches: u64,
    pub ancestor_matches: u64,
    pub evolutions: u64,
    pub registered: u64,
    pub revoked: u64,
}

/// Builder for injecting collaborators; anything not set gets the OS default
pub struct EngineBuilder {
    config: EngineConfig,
    entropy: Option<Box<dyn EntropySource>>,
    digest: Option<Box<dyn DigestProvider>>,
    sink: Option<Box<dyn AuditSink>>,
    clock: Option<Box<dyn Clock>>,
    hooks: Hooks,
}

impl EngineBuilder {
    pub fn entropy(mut self, entropy: impl EntropySource + 'static) -> Self {
        self.entropy = Some(Box::new(entropy));
        self
    }

    pub fn digest(mut self, digest: impl DigestProvider + 'static) -> Self {
        self.digest = Some(Box::new(digest));
        self
    }

    pub fn sink(mut self, sink: impl AuditSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn build(self) -> Engine {
        let digest = self.digest.unwrap_or_else(|| Box::new(Sha256Digest));
        info!(
            "Engine initialized: length {}-{}, min complexity {}, lockout {} after {} failures, digest {}",
            self.config.limits.min_len,
            self.config.limits.max_len,
            self.config.min_complexity,
            self.config.lockout_secs,
            self.config.max_failed_attempts,
            digest.name()
        );
        Engine {
            codons: CodonTable::standard(),
            registry: Registry::new(),
            lineages: HashMap::new(),
            attempts: AttemptLog::new(self.config.attempt_log_cap),
            evolution_log: VecDeque::new(),
            stats: EngineStats::default(),
            last_scheduler_run: None,
            entropy: self.entropy.unwrap_or_else(|| Box::new(OsEntropy)),
            digest,
            sink: self.sink.unwrap_or_else(|| Box::new(LogSink)),
            clock: self.clock.unwrap_or_else(|| Box::new(SystemClock)),
            hooks: self.hooks,
            config: self.config,
        }
    }
}

pub struct Engine {
    config: EngineConfig,
    codons: &'static CodonTable,
    registry: Registry,
    lineages: HashMap<String, Lineage>,
    attempts: AttemptLog,
    /// Oldest first, bounded by `evolution.event_log_cap`
    evolution_log: VecDeque<EvolutionEvent>,
    stats: EngineStats,
    last_scheduler_run: Option<DateTime<Utc>>,
    entropy: Box<dyn EntropySource>,
    digest: Box<dyn DigestProvider>,
    sink: Box<dyn AuditSink>,
    clock: Box<dyn Clock>,
    hooks: Hooks,
}

impl Engine {
    /// Engine with OS randomness, SHA-256, the `log` audit sink and the system clock
    pub fn init(config: EngineConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            entropy: None,
            digest: None,
            sink: None,
            clock: None,
            hooks: Hooks::default(),
        }
    }

    pub fn shutdown(self) -> EngineStats {
        info!(
            "Engine shutting down: {} identities, {} auths ({} ok, {} failed), {} evolutions",
            self.registry.len(),
            self.stats.total_auths,
            self.stats.successful_auths,
            self.stats.failed_auths,
            self.stats.evolutions
        );
        self.stats
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn emit(&mut self, event: AuditEvent) {
        self.sink.log_event(&event);
    }

    fn derive(&self, seq: &Sequence, salt: &Salt, mode: DerivationMode) -> CredentialHash {
        crypto::derive(seq, salt, mode, self.digest.as_ref(), self.codons)
    }

    fn lineage_mut(&mut self, identity: &str) -> Result<&mut Lineage> {
        self.lineages
            .get_mut(identity)
            .ok_or_else(|| AuthError::UserNotFound(identity.to_string()))
    }

    // ---------------------------------------------------------------
    // Registry
    // ---------------------------------------------------------------

    /// Key options taken from the engine configuration
    pub fn default_key_options(&self) -> KeyOptions {
        KeyOptions {
            mode: self.config.default_mode,
            tolerance: self.config.default_tolerance,
            expires_at: None,
        }
    }

    pub fn register(&mut self, identity: &str, raw: &str) -> Result<()> {
        let options = self.default_key_options();
        self.register_with(identity, raw, options)
    }

    /// Admit `raw`, salt and hash it, and start the identity's lineage
    ///
    /// A rejected registration is reported to the audit sink as well.
    pub fn register_with(&mut self, identity: &str, raw: &str, options: KeyOptions) -> Result<()> {
        let now = self.clock.now();
        let result = self.admit_new(identity, raw, options, now);
        if let Err(e) = &result {
            warn!("Registration of '{}' rejected: {}", identity, e);
            self.emit(AuditEvent::registration_failure(identity, e.label(), now));
        }
        result
    }

    fn admit_new(&mut self, identity: &str, raw: &str, options: KeyOptions, now: DateTime<Utc>) -> Result<()> {
        if self.registry.contains(identity) {
            return Err(AuthError::UserExists(identity.to_string()));
        }
        let (seq, analysis) = registry::admit(raw, &self.config)?;
        let salt = Salt::generate(self.entropy.as_mut())?;
        let hash = self.derive(&seq, &salt, options.mode);

        let key = CredentialKey {
            key_id: self.registry.allocate_id(),
            identity: identity.to_string(),
            salt,
            mode: options.mode,
            hash: hash.clone(),
            created_at: now,
            expires_at: options.expires_at,
            revoked: false,
            revoke_reason: None,
            failed_attempts: 0,
            lockout_until: None,
            last_used: None,
            auth_count: 0,
            tolerance: options.tolerance,
        };
        self.registry.insert(key)?;
        self.lineages
            .insert(identity.to_string(), Lineage::new(&seq, hash, &self.config.evolution, now));
        self.stats.registered += 1;

        info!(
            "Registered '{}': {} symbols, {} complexity, entropy {:.2}, mode {}",
            identity,
            seq.len(),
            analysis.complexity,
            analysis.entropy,
            options.mode
        );
        self.emit(AuditEvent::registration(identity, options.mode.name(), options.tolerance, now));
        Ok(())
    }

    /// Permanently revoke. Revoking twice is a no-op.
    pub fn revoke(&mut self, identity: &str, reason: &str) -> Result<()> {
        let now = self.clock.now();
        let key = self.registry.get_mut(identity)?;
        if key.revoked {
            return Ok(());
        }
        key.revoke(reason);
        self.stats.revoked += 1;
        warn!("Revoked '{}': {}", identity, reason);
        self.emit(AuditEvent::revocation(identity, reason, now));
        Ok(())
    }

    /// Replace the credential after proving knowledge of the current one
    ///
    /// The new sequence gets a fresh salt and becomes a new generation at
    /// full fitness whose parent is the old current generation.
    pub fn change_key(&mut self, identity: &str, old: &str, new: &str) -> Result<()> {
        self.authenticate(identity, old)?;
        let now = self.clock.now();
        match self.replace_key(identity, new, now) {
            Ok(generation) => {
                info!("Key changed for '{}', now generation {}", identity, generation);
                self.emit(AuditEvent::key_change(identity, generation, now));
                Ok(())
            }
            Err(e) => {
                warn!("Key change for '{}' rejected: {}", identity, e);
                self.emit(AuditEvent::key_change_rejected(identity, e.label(), now));
                Err(e)
            }
        }
    }

    fn replace_key(&mut self, identity: &str, new: &str, now: DateTime<Utc>) -> Result<u32> {
        let (seq, _) = registry::admit(new, &self.config)?;
        let salt = Salt::generate(self.entropy.as_mut())?;
        let mode = self.registry.get(identity)?.mode;
        let hash = self.derive(&seq, &salt, mode);

        let key = self.registry.get_mut(identity)?;
        key.salt = salt;
        key.hash = hash.clone();
        Ok(self.lineage_mut(identity)?.push_child(&seq, hash, Vec::new(), 1.0, now))
    }

    pub fn key(&self, identity: &str) -> Result<&CredentialKey> {
        self.registry.get(identity)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.registry.contains(identity)
    }

    pub fn identities(&self) -> Vec<String> {
        self.registry.identities()
    }

    // ---------------------------------------------------------------
    // Authentication
    // ---------------------------------------------------------------

    /// Exact match against the current generation
    pub fn authenticate(&mut self, identity: &str, raw: &str) -> Result<()> {
        self.authenticate_fuzzy(identity, raw, 0).0
    }

    /// Match against the current generation, tolerating up to
    /// `min(max_mutations, key.tolerance)` edits
    pub fn authenticate_fuzzy(&mut self, identity: &str, raw: &str, max_mutations: usize) -> (Result<()>, MatchDetail) {
        let now = self.clock.now();

        let (salt, mode, stored, tolerance) = match self.precheck(identity, now) {
            Ok(key) => (key.salt.clone(), key.mode, key.hash.clone(), key.tolerance.min(max_mutations)),
            Err(e) => return (Err(e), MatchDetail::default()),
        };

        let seq = match sequence::parse(raw, &self.config.limits) {
            Ok(seq) => seq,
            Err(e) => return (Err(self.fail(identity, e.into(), now)), MatchDetail::default()),
        };

        if self.derive(&seq, &salt, mode).matches(&stored) {
            let generation = self.current_generation_id(identity);
            self.succeed(identity, generation, 0, now);
            self.emit(AuditEvent::auth_success(identity, 0, now));
            return (Ok(()), MatchDetail::exact());
        }

        if tolerance > 0 {
            let current = match self.current_generation(identity) {
                Ok(g) => g.sequence.clone(),
                Err(e) => return (Err(e), MatchDetail::default()),
            };
            let detail = auth::compare(&current, seq.as_str(), tolerance);
            if detail.matched {
                let generation = self.current_generation_id(identity);
                self.succeed(identity, generation, detail.distance, now);
                self.stats.fuzzy_matches += 1;
                debug!("Fuzzy match for '{}' at distance {}", identity, detail.distance);
                self.emit(AuditEvent::auth_success(identity, detail.distance, now));
                return (Ok(()), detail);
            }
            return (Err(self.fail(identity, AuthError::NoMatch, now)), detail);
        }

        (Err(self.fail(identity, AuthError::NoMatch, now)), MatchDetail::default())
    }

    /// Match against the current generation or one of its ancestors
    ///
    /// Returns how many generations back the match was found.
    pub fn authenticate_ancestor(&mut self, identity: &str, raw: &str, max_back: usize) -> Result<usize> {
        self.authenticate_ancestor_detail(identity, raw, max_back).0
    }

    pub fn authenticate_ancestor_detail(
        &mut self,
        identity: &str,
        raw: &str,
        max_back: usize,
    ) -> (Result<usize>, MatchDetail) {
        let now = self.clock.now();
        if let Err(e) = self.precheck(identity, now) {
            return (Err(e), MatchDetail::default());
        }

        let policy = match self.lineages.get(identity) {
            Some(lineage) => lineage.ancestor_policy,
            None => return (Err(AuthError::UserNotFound(identity.to_string())), MatchDetail::default()),
        };
        if !policy.allowed {
            let err = AuthError::AncestorAuthDisabled;
            self.attempts
                .record(identity, AttemptOutcome::Failure(err.label().to_string()), now);
            self.emit(AuditEvent::auth_failure(identity, err.label(), now));
            return (Err(err), MatchDetail::default());
        }

        let seq = match sequence::parse(raw, &self.config.limits) {
            Ok(seq) => seq,
            Err(e) => return (Err(self.fail(identity, e.into(), now)), MatchDetail::default()),
        };

        let window = max_back.min(policy.max_depth);
        let found = self.lineages.get(identity).and_then(|lineage| {
            lineage
                .ancestry(window)
                .into_iter()
                .find(|(_, g)| g.sequence == seq.as_str())
                .map(|(back, g)| (back, g.id))
        });

        match found {
            Some((back, generation)) => {
                let penalty = policy.penalty(back);
                self.succeed(identity, Some(generation), 0, now);
                self.stats.ancestor_matches += 1;
                if back == 0 {
                    info!("Ancestor auth for '{}': matched current generation", identity);
                } else {
                    info!(
                        "Ancestor auth for '{}': matched {} generation(s) back (penalty {:.0}%)",
                        identity,
                        back,
                        penalty * 100.0
                    );
                }
                self.emit(AuditEvent::ancestor_auth(identity, back, penalty, now));
                (Ok(back), MatchDetail::ancestor(back, penalty))
            }
            None => (Err(self.fail(identity, AuthError::NoMatch, now)), MatchDetail::default()),
        }
    }

    /// Existence, revocation, expiry and lockout. Rejections here are
    /// audited and recorded as attempts but never touch the failure counter.
    fn precheck(&mut self, identity: &str, now: DateTime<Utc>) -> Result<&CredentialKey> {
        let check = self
            .registry
            .get(identity)
            .and_then(|key| key.check_usable(now));
        if let Err(e) = check {
            debug!("Attempt for '{}' rejected before matching: {}", identity, e);
            self.attempts
                .record(identity, AttemptOutcome::Failure(e.label().to_string()), now);
            self.emit(AuditEvent::auth_failure(identity, e.label(), now));
            return Err(e);
        }
        self.registry.get(identity)
    }

    fn current_generation_id(&self, identity: &str) -> Option<u32> {
        self.lineages.get(identity).map(|l| l.current().id)
    }

    fn succeed(&mut self, identity: &str, generation: Option<u32>, distance: usize, now: DateTime<Utc>) {
        if let Ok(key) = self.registry.get_mut(identity) {
            key.record_success(now);
        }
        if let (Some(lineage), Some(id)) = (self.lineages.get_mut(identity), generation) {
            if let Some(g) = lineage.generation_mut(id) {
                g.auth_successes += 1;
            }
        }
        self.stats.total_auths += 1;
        self.stats.successful_auths += 1;
        self.attempts.record(identity, AttemptOutcome::Success, now);
        self.hooks.auth_success(identity);
        if distance == 0 {
            info!("Authentication successful for '{}'", identity);
        } else {
            info!("Authentication successful for '{}' ({} edit(s))", identity, distance);
        }
    }

    /// Count a failed attempt, start a lockout at the threshold, and hand the error back
    fn fail(&mut self, identity: &str, err: AuthError, now: DateTime<Utc>) -> AuthError {
        let policy = self.config.lockout_policy();
        let lockout = match self.registry.get_mut(identity) {
            Ok(key) => key.record_failure(now, &policy).map(|until| (until, key.failed_attempts)),
            Err(_) => None,
        };
        if let Some(lineage) = self.lineages.get_mut(identity) {
            lineage.current_mut().auth_failures += 1;
        }
        self.stats.total_auths += 1;
        self.stats.failed_auths += 1;
        self.attempts
            .record(identity, AttemptOutcome::Failure(err.label().to_string()), now);

        if let Some((until, failed)) = lockout {
            warn!("'{}' locked out after {} failed attempts", identity, failed);
            self.hooks.lockout(identity, until);
            self.emit(AuditEvent::lockout(identity, failed, until, now));
        }
        self.hooks.auth_failure(identity, &err);
        self.emit(AuditEvent::auth_failure(identity, err.label(), now));
        err
    }

    pub fn recent_attempts(&self, identity: &str, limit: usize) -> Vec<AttemptRecord> {
        self.attempts.recent(identity, limit).into_iter().cloned().collect()
    }

    /// Failed attempts recorded within the last `window`
    pub fn recent_failures(&self, identity: &str, window: Duration) -> usize {
        let since = self
            .clock
            .now()
            .checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.attempts.failures_since(identity, since)
    }

    pub fn clear_attempts(&mut self, identity: &str) {
        self.attempts.clear(identity);
    }

    // ---------------------------------------------------------------
    // Evolution
    // ---------------------------------------------------------------

    /// Natural evolution: a Bernoulli draw per mutation slot, at least one
    pub fn evolve(&mut self, identity: &str) -> Result<EvolutionEvent> {
        let rate = self.lineage(identity)?.mutation_rate;
        let slots = self.config.evolution.max_mutations_per_generation;
        let count = evolution::draw_mutation_count(rate, slots, self.entropy.as_mut())?;
        self.evolve_with(identity, count, false)
    }

    /// Evolve now with `count` mutations (capped per generation)
    pub fn evolve_forced(&mut self, identity: &str, count: usize) -> Result<EvolutionEvent> {
        self.evolve_with(identity, count, true)
    }

    fn evolve_with(&mut self, identity: &str, count: usize, forced: bool) -> Result<EvolutionEvent> {
        let now = self.clock.now();
        let key = self.registry.get(identity)?;
        if key.revoked {
            return Err(AuthError::Revoked(key.revoke_reason.clone().unwrap_or_default()));
        }
        let (salt, mode) = (key.salt.clone(), key.mode);

        let ceiling = self.config.evolution.max_generations;
        let lineage = self.lineage(identity)?;
        if lineage.total_generations() >= ceiling {
            info!("'{}' at max generations ({})", identity, ceiling);
            return Err(AuthError::GenerationCeiling(ceiling));
        }
        let parent = Sequence::from_normalized(&lineage.current().sequence)?;
        let from_generation = lineage.current().id;
        let fitness_before = lineage.current().fitness;
        let allowed_back = lineage.ancestor_policy.allowed.then_some(lineage.ancestor_policy.max_depth);

        let count = count.clamp(1, self.config.evolution.max_mutations_per_generation.max(1));
        let (symbols, mutations) =
            evolution::breed(parent.symbols(), count, &self.config.limits, self.entropy.as_mut(), now)?;
        let child = Sequence::from_symbols(symbols);
        let hash = self.derive(&child, &salt, mode);
        let impact: f64 = mutations.iter().map(|m| m.fitness_impact).sum();
        let fitness_after = evolution::evolved_fitness(fitness_before, impact);

        let mut id_bytes = [0u8; 16];
        self.entropy.fill(&mut id_bytes)?;

        self.registry.get_mut(identity)?.hash = hash.clone();
        let to_generation = self
            .lineage_mut(identity)?
            .push_child(&child, hash, mutations.clone(), fitness_after, now);

        let notification = Some(match allowed_back {
            Some(depth) => format!(
                "Your credential evolved to generation {}. Earlier sequences remain accepted through ancestor authentication for up to {} generation(s).",
                to_generation, depth
            ),
            None => format!(
                "Your credential evolved to generation {}. The previous sequence is no longer accepted.",
                to_generation
            ),
        });
        let event = EvolutionEvent {
            id: uuid::Builder::from_random_bytes(id_bytes).into_uuid(),
            identity: identity.to_string(),
            from_generation,
            to_generation,
            mutations,
            fitness_before,
            fitness_after,
            forced,
            notification,
            timestamp: now,
        };

        self.evolution_log.push_back(event.clone());
        while self.evolution_log.len() > self.config.evolution.event_log_cap {
            self.evolution_log.pop_front();
        }
        self.stats.evolutions += 1;
        self.hooks.evolution(identity, &event);
        info!(
            "'{}' evolved: Gen {} -> Gen {} ({} mutations, fitness {:.2} -> {:.2})",
            identity,
            from_generation,
            to_generation,
            event.mutations.len(),
            fitness_before,
            fitness_after
        );
        self.emit(AuditEvent::evolution(
            identity,
            from_generation,
            to_generation,
            event.mutations.len(),
            forced,
            now,
        ));
        Ok(event)
    }

    pub fn check_due(&self, identity: &str) -> Result<bool> {
        Ok(self.lineage(identity)?.is_due(self.clock.now()))
    }

    pub fn lineage_state(&self, identity: &str) -> Result<LineageState> {
        Ok(self.lineage(identity)?.state(self.clock.now()))
    }

    pub fn schedule(&mut self, identity: &str, when: DateTime<Utc>) -> Result<()> {
        self.lineage_mut(identity)?.next_evolution = when;
        debug!("Next evolution for '{}' scheduled at {}", identity, when.to_rfc3339());
        Ok(())
    }

    /// Scheduler pass, rate-limited to one per `scheduler_check_secs`
    ///
    /// Evolves every due lineage whose pressure is not `None`, then refreshes
    /// their fitness. Returns the evolutions performed.
    pub fn tick(&mut self) -> Vec<EvolutionEvent> {
        let now = self.clock.now();
        if let Some(last) = self.last_scheduler_run {
            if now - last < clock::span(self.config.evolution.scheduler_check_secs) {
                return Vec::new();
            }
        }
        self.last_scheduler_run = Some(now);

        let mut pressured: Vec<String> = self
            .lineages
            .iter()
            .filter(|(id, l)| {
                l.pressure != SelectionPressure::None
                    && self.registry.get(id).map(|k| !k.revoked).unwrap_or(false)
            })
            .map(|(id, _)| id.clone())
            .collect();
        pressured.sort();

        let mut events = Vec::new();
        for identity in &pressured {
            let due = self.lineages.get(identity).is_some_and(|l| l.is_due(now));
            if !due {
                continue;
            }
            match self.evolve(identity) {
                Ok(event) => events.push(event),
                Err(e) => warn!("Scheduled evolution for '{}' skipped: {}", identity, e),
            }
        }
        for identity in &pressured {
            if let Err(e) = self.update_fitness(identity) {
                warn!("Fitness update for '{}' failed: {}", identity, e);
            }
        }
        if !events.is_empty() {
            info!("Scheduler evolved {} lineage(s)", events.len());
        }
        events
    }

    /// Pressure-adjusted fitness of the current generation, without storing it
    pub fn fitness(&self, identity: &str) -> Result<f64> {
        let lineage = self.lineage(identity)?;
        Ok(evolution::calculate_fitness(lineage, self.clock.now(), &self.config.evolution))
    }

    /// Store the pressure-adjusted fitness; warns below the threshold
    pub fn update_fitness(&mut self, identity: &str) -> Result<f64> {
        let fitness = self.fitness(identity)?;
        let lineage = self.lineage_mut(identity)?;
        lineage.current_mut().fitness = fitness;
        lineage.cumulative_fitness = fitness;
        if fitness < self.config.evolution.fitness_warning_threshold {
            warn!("Fitness of '{}' dropped to {:.2}", identity, fitness);
            self.hooks.fitness_warning(identity, fitness);
        }
        Ok(fitness)
    }

    pub fn is_fit(&self, identity: &str, threshold: f64) -> Result<bool> {
        Ok(self.fitness(identity)? >= threshold)
    }

    pub fn lineage(&self, identity: &str) -> Result<&Lineage> {
        self.lineages
            .get(identity)
            .ok_or_else(|| AuthError::UserNotFound(identity.to_string()))
    }

    pub fn current_generation(&self, identity: &str) -> Result<&Generation> {
        Ok(self.lineage(identity)?.current())
    }

    pub fn generation(&self, identity: &str, id: u32) -> Result<Option<&Generation>> {
        Ok(self.lineage(identity)?.generation(id))
    }

    pub fn generation_number(&self, identity: &str) -> Result<u32> {
        Ok(self.lineage(identity)?.current().id)
    }

    /// Newest first; `limit == 0` means no limit
    pub fn evolution_history(&self, identity: &str, limit: usize) -> Vec<&EvolutionEvent> {
        let events = self.evolution_log.iter().rev().filter(|e| e.identity == identity);
        if limit == 0 {
            events.collect()
        } else {
            events.take(limit).collect()
        }
    }

    pub fn mutation_history(&self, identity: &str) -> Result<Vec<&Mutation>> {
        Ok(self.lineage(identity)?.mutation_history())
    }

    /// Also reschedules the next evolution one interval from now
    pub fn set_interval(&mut self, identity: &str, secs: i64) -> Result<()> {
        let now = self.clock.now();
        let lineage = self.lineage_mut(identity)?;
        lineage.interval_secs = secs.clamp(1, clock::MAX_SPAN_SECS);
        lineage.next_evolution = clock::after(now, lineage.interval_secs);
        Ok(())
    }

    pub fn set_mutation_rate(&mut self, identity: &str, rate: f64) -> Result<()> {
        self.lineage_mut(identity)?.mutation_rate = rate.clamp(0.0, 1.0);
        Ok(())
    }

    pub fn set_pressure(&mut self, identity: &str, pressure: SelectionPressure) -> Result<()> {
        self.lineage_mut(identity)?.pressure = pressure;
        Ok(())
    }

    pub fn set_ancestor_policy(&mut self, identity: &str, policy: AncestorPolicy) -> Result<()> {
        self.lineage_mut(identity)?.ancestor_policy = policy;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Sequence helpers
    // ---------------------------------------------------------------

    pub fn analyze(&self, raw: &str) -> Result<Analysis> {
        let seq = sequence::parse(raw, &self.config.limits)?;
        Ok(sequence::analyze(&seq))
    }

    pub fn translate(&self, raw: &str) -> Result<String> {
        let seq = sequence::parse(raw, &self.config.limits)?;
        Ok(self.codons.translate(&seq))
    }

    /// Random sequence from the engine's entropy source
    pub fn random_sequence(&mut self, len: usize) -> Result<String> {
        Ok(sequence::random_sequence(len, &self.config.limits, self.entropy.as_mut())?)
    }

    // ---------------------------------------------------------------
    // State export
    // ---------------------------------------------------------------

    /// Checksummed JSON snapshot of keys, lineages, evolution log and stats
    pub fn export_state(&self) -> Result<String> {
        let state = EngineState {
            registry: self.registry.clone(),
            lineages: self.lineages.clone(),
            evolution_events: self.evolution_log.iter().cloned().collect(),
            stats: self.stats.clone(),
        };
        state.to_snapshot(self.clock.now())
    }

    /// Replace all credential state with a snapshot from [`export_state`](Self::export_state)
    pub fn import_state(&mut self, json: &str) -> Result<()> {
        let state = EngineState::from_snapshot(json)?;
        info!(
            "Imported state: {} identities, {} evolution events",
            state.registry.len(),
            state.evolution_events.len()
        );
        self.registry = state.registry;
        self.lineages = state.lineages;
        self.evolution_log = state.evolution_events.into();
        self.stats = state.stats;
        self.attempts = AttemptLog::new(self.config.attempt_log_cap);
        Ok(())
    }
}

/// Engine behind a coarse read/write lock
///
/// Mutating calls take the write lock, status queries the read lock, so
/// operations on one identity are fully serialized.
#[derive(Clone)]
pub struct SharedEngine {
    inner: Arc<RwLock<Engine>>,
}

impl SharedEngine {
    pub fn new(engine: Engine) -> Self {
        Self {
            inner: Arc::new(RwLock::new(engine)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Engine> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Engine> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn register(&self, identity: &str, raw: &str) -> Result<()> {
        self.write().register(identity, raw)
    }

    pub fn authenticate(&self, identity: &str, raw: &str) -> Result<()> {
        self.write().authenticate(identity, raw)
    }

    pub fn evolve(&self, identity: &str) -> Result<EvolutionEvent> {
        self.write().evolve(identity)
    }

    pub fn tick(&self) -> Vec<EvolutionEvent> {
        self.write().tick()
    }

    pub fn fitness(&self, identity: &str) -> Result<f64> {
        self.read().fitness(identity)
    }

    pub fn generation_number(&self, identity: &str) -> Result<u32> {
        self.read().generation_number(identity)
    }

    pub fn stats(&self) -> EngineStats {
        self.read().stats().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{EventKind, MemorySink};
    use crate::clock::ManualClock;
    use crate::crypto::testing::BrokenEntropy;
    use crate::crypto::SeededEntropy;
    use crate::error::EntropyError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const ALICE: &str = "ATGCGTACGTTAGCCATGAC";
    const BOB: &str = "GATTACACGTATGCCAGTCA";

    fn start() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn engine_with(config: EngineConfig, seed: u64) -> (Engine, MemorySink, ManualClock) {
        let sink = MemorySink::new();
        let clock = ManualClock::new(start());
        let engine = Engine::builder(config)
            .entropy(SeededEntropy::new(seed))
            .sink(sink.clone())
            .clock(clock.clone())
            .build();
        (engine, sink, clock)
    }

    fn engine() -> (Engine, MemorySink, ManualClock) {
        engine_with(EngineConfig::default(), 7)
    }

    fn flip_last(seq: &str) -> String {
        let mut out: Vec<char> = seq.chars().collect();
        let last = out.len() - 1;
        out[last] = if out[last] == 'C' { 'G' } else { 'C' };
        out.into_iter().collect()
    }

    #[test]
    fn test_register_and_authenticate() {
        let (mut engine, sink, _) = engine();
        engine.register("alice", ALICE).unwrap();
        assert!(engine.authenticate("alice", ALICE).is_ok());
        assert!(engine.authenticate("alice", &ALICE.to_lowercase()).is_ok());
        assert!(matches!(engine.authenticate("alice", &flip_last(ALICE)), Err(AuthError::NoMatch)));
        assert_eq!(
            sink.kinds(),
            vec![
                EventKind::Registration,
                EventKind::AuthSuccess,
                EventKind::AuthSuccess,
                EventKind::AuthFailure
            ]
        );
        let key = engine.key("alice").unwrap();
        assert_eq!(key.auth_count, 2);
        assert_eq!(key.failed_attempts, 1);
    }

    #[test]
    fn test_register_errors() {
        let (mut engine, sink, _) = engine();
        engine.register("alice", ALICE).unwrap();
        assert!(matches!(engine.register("alice", BOB), Err(AuthError::UserExists(_))));
        assert!(matches!(engine.register("bob", "ATGC"), Err(AuthError::InvalidSequence(_))));
        assert!(matches!(
            engine.register("carol", "AAAAAAAAAAAAAAAA"),
            Err(AuthError::LowComplexity(_))
        ));
        assert_eq!(sink.count(EventKind::Registration), 1);
        assert_eq!(sink.count(EventKind::RegistrationFailure), 3);
        let details: Vec<String> = sink
            .events()
            .into_iter()
            .filter(|e| e.kind == EventKind::RegistrationFailure)
            .map(|e| e.detail)
            .collect();
        assert_eq!(
            details,
            vec![
                "Registration rejected - User exists",
                "Registration rejected - Invalid sequence",
                "Registration rejected - Low complexity",
            ]
        );
        assert_eq!(engine.identities(), vec!["alice"]);
    }

    #[test]
    fn test_unknown_user() {
        let (mut engine, sink, _) = engine();
        assert!(matches!(engine.authenticate("nobody", ALICE), Err(AuthError::UserNotFound(_))));
        assert_eq!(engine.recent_attempts("nobody", 0).len(), 1);
        assert_eq!(engine.stats().total_auths, 0);
        assert_eq!(sink.count(EventKind::AuthFailure), 1);
        assert_eq!(sink.events()[0].detail, "Authentication failed - User not found");
    }

    #[test]
    fn test_rejected_attempts_are_audited() {
        let (mut engine, sink, _) = engine();
        engine.register("alice", ALICE).unwrap();
        engine.register("bob", BOB).unwrap();

        engine.revoke("alice", "lost device").unwrap();
        assert!(matches!(engine.authenticate("alice", ALICE), Err(AuthError::Revoked(_))));
        let last = sink.events().pop().unwrap();
        assert_eq!((last.kind, last.identity.as_str()), (EventKind::AuthFailure, "alice"));
        assert!(last.detail.contains("Key revoked"));

        engine
            .set_ancestor_policy(
                "bob",
                AncestorPolicy {
                    allowed: false,
                    max_depth: 5,
                    penalty_per_generation: 0.1,
                },
            )
            .unwrap();
        assert!(matches!(
            engine.authenticate_ancestor("bob", BOB, 2),
            Err(AuthError::AncestorAuthDisabled)
        ));
        let last = sink.events().pop().unwrap();
        assert_eq!(last.kind, EventKind::AuthFailure);
        assert!(last.detail.contains("Ancestor auth disabled"));

        assert_eq!(sink.count(EventKind::AuthFailure), 2);
        // Rejected before matching: counters untouched
        assert_eq!(engine.key("alice").unwrap().failed_attempts, 0);
        assert_eq!(engine.key("bob").unwrap().failed_attempts, 0);
    }

    #[test]
    fn test_locked_and_expired_attempts_are_audited() {
        let (mut engine, sink, clock) = engine();
        let options = KeyOptions {
            expires_at: Some(start() + Duration::seconds(60)),
            ..engine.default_key_options()
        };
        engine.register_with("alice", ALICE, options).unwrap();
        let wrong = flip_last(ALICE);
        for _ in 0..5 {
            let _ = engine.authenticate("alice", &wrong);
        }
        assert_eq!(sink.count(EventKind::AuthFailure), 5);
        assert!(matches!(engine.authenticate("alice", ALICE), Err(AuthError::LockedOut { .. })));
        assert_eq!(sink.count(EventKind::AuthFailure), 6);

        clock.advance(Duration::seconds(61));
        assert!(matches!(engine.authenticate("alice", ALICE), Err(AuthError::Expired)));
        assert_eq!(sink.count(EventKind::AuthFailure), 7);
        assert!(sink.events().pop().unwrap().detail.contains("Key expired"));
    }

    #[test]
    fn test_lockout_and_recovery() {
        let (mut engine, sink, clock) = engine();
        engine.register("alice", ALICE).unwrap();
        let wrong = flip_last(ALICE);
        for _ in 0..5 {
            assert!(matches!(engine.authenticate("alice", &wrong), Err(AuthError::NoMatch)));
        }
        assert_eq!(sink.count(EventKind::Lockout), 1);
        assert!(matches!(
            engine.authenticate("alice", ALICE),
            Err(AuthError::LockedOut { .. })
        ));
        // Lockout rejections leave the counter alone
        assert_eq!(engine.key("alice").unwrap().failed_attempts, 5);
        assert_eq!(engine.recent_failures("alice", Duration::seconds(60)), 6);

        clock.advance(Duration::seconds(301));
        assert!(engine.authenticate("alice", ALICE).is_ok());
        let key = engine.key("alice").unwrap();
        assert_eq!(key.failed_attempts, 0);
        assert!(key.lockout_until.is_none());
    }

    #[test]
    fn test_invalid_input_counts_as_failure() {
        let (mut engine, _, _) = engine();
        engine.register("alice", ALICE).unwrap();
        assert!(matches!(
            engine.authenticate("alice", "ATGXXXX"),
            Err(AuthError::InvalidSequence(_))
        ));
        assert_eq!(engine.key("alice").unwrap().failed_attempts, 1);
    }

    #[test]
    fn test_revoked_and_expired() {
        let (mut engine, sink, clock) = engine();
        engine.register("alice", ALICE).unwrap();
        engine.revoke("alice", "lost device").unwrap();
        engine.revoke("alice", "again").unwrap();
        assert_eq!(sink.count(EventKind::Revocation), 1);
        assert!(matches!(engine.authenticate("alice", ALICE), Err(AuthError::Revoked(_))));
        assert!(matches!(engine.evolve_forced("alice", 1), Err(AuthError::Revoked(_))));
        assert!(matches!(engine.revoke("nobody", ""), Err(AuthError::UserNotFound(_))));

        let options = KeyOptions {
            expires_at: Some(start() + Duration::seconds(60)),
            ..engine.default_key_options()
        };
        engine.register_with("bob", BOB, options).unwrap();
        assert!(engine.authenticate("bob", BOB).is_ok());
        clock.advance(Duration::seconds(61));
        assert!(matches!(engine.authenticate("bob", BOB), Err(AuthError::Expired)));
    }

    #[test]
    fn test_fuzzy_tolerance_is_capped_by_key() {
        let (mut engine, _, _) = engine();
        let options = KeyOptions {
            tolerance: 1,
            ..engine.default_key_options()
        };
        engine.register_with("alice", ALICE, options).unwrap();
        let one_off = flip_last(ALICE);

        let (result, detail) = engine.authenticate_fuzzy("alice", &one_off, 3);
        assert!(result.is_ok());
        assert_eq!(detail.distance, 1);
        assert!(!detail.exact);
        assert_eq!(engine.stats().fuzzy_matches, 1);

        let two_off = format!("{}TT", &ALICE[..ALICE.len() - 2]);
        let (result, detail) = engine.authenticate_fuzzy("alice", &two_off, 3);
        assert!(matches!(result, Err(AuthError::NoMatch)));
        assert_eq!(detail.distance, 2);

        // Exact wrapper never tolerates edits
        assert!(engine.authenticate("alice", &one_off).is_err());
    }

    #[test]
    fn test_protein_mode_accepts_synonymous_codons() {
        let (mut engine, _, _) = engine();
        let options = KeyOptions {
            mode: DerivationMode::TranslatedProtein,
            ..engine.default_key_options()
        };
        engine.register_with("alice", "ATGCTTGCAAAGTGGTCA", options).unwrap();
        assert!(engine.authenticate("alice", "ATGTTAGCAAAGTGGTCA").is_ok());
    }

    #[test]
    fn test_forced_evolution_and_ancestor_auth() {
        let (mut engine, sink, _) = engine();
        engine.register("alice", ALICE).unwrap();
        let event = engine.evolve_forced("alice", 3).unwrap();
        assert_eq!((event.from_generation, event.to_generation), (1, 2));
        assert!(event.forced);
        assert!(!event.mutations.is_empty() && event.mutations.len() <= 4);
        assert!(event.notification.is_some());
        assert_eq!(sink.count(EventKind::ForcedEvolution), 1);

        let current = engine.current_generation("alice").unwrap().sequence.clone();
        assert_ne!(current, ALICE);
        assert!(matches!(engine.authenticate("alice", ALICE), Err(AuthError::NoMatch)));
        assert!(engine.authenticate("alice", &current).is_ok());

        let (result, detail) = engine.authenticate_ancestor_detail("alice", ALICE, 5);
        assert_eq!(result.unwrap(), 1);
        assert!((detail.penalty - 0.1).abs() < 1e-9);
        assert_eq!(sink.count(EventKind::AncestorAuth), 1);
        assert_eq!(engine.authenticate_ancestor("alice", &current, 5).unwrap(), 0);
        assert_eq!(engine.stats().ancestor_matches, 2);
    }

    #[test]
    fn test_ancestor_window_and_policy() {
        let (mut engine, _, _) = engine();
        engine.register("alice", ALICE).unwrap();
        let now = engine.now();
        let later = [BOB.to_string(), flip_last(ALICE), flip_last(BOB)];
        for raw in &later {
            let seq = sequence::parse(raw, &engine.config().limits).unwrap();
            let hash = CredentialHash::from_digest(&[0; 32]);
            engine.lineage_mut("alice").unwrap().push_child(&seq, hash, Vec::new(), 1.0, now);
        }
        // Root is three generations back
        assert!(matches!(engine.authenticate_ancestor("alice", ALICE, 2), Err(AuthError::NoMatch)));
        assert_eq!(engine.authenticate_ancestor("alice", ALICE, 3).unwrap(), 3);
        assert_eq!(engine.authenticate_ancestor("alice", BOB, 3).unwrap(), 2);

        engine
            .set_ancestor_policy(
                "alice",
                AncestorPolicy {
                    allowed: true,
                    max_depth: 1,
                    penalty_per_generation: 0.1,
                },
            )
            .unwrap();
        assert!(matches!(engine.authenticate_ancestor("alice", ALICE, 10), Err(AuthError::NoMatch)));

        engine
            .set_ancestor_policy(
                "alice",
                AncestorPolicy {
                    allowed: false,
                    max_depth: 5,
                    penalty_per_generation: 0.1,
                },
            )
            .unwrap();
        assert!(matches!(
            engine.authenticate_ancestor("alice", ALICE, 3),
            Err(AuthError::AncestorAuthDisabled)
        ));
    }

    #[test]
    fn test_generation_invariants() {
        let (mut engine, _, _) = engine_with(EngineConfig::default(), 99);
        engine.register("alice", ALICE).unwrap();
        for _ in 0..30 {
            engine.evolve_forced("alice", 3).unwrap();
        }
        let lineage = engine.lineage("alice").unwrap();
        let mut last = 0;
        for g in lineage.generations() {
            assert!(g.id > last);
            last = g.id;
            assert!(g.parent_id < g.id);
            assert!((0.1..=1.0).contains(&g.fitness));
            assert!(g.length >= engine.config().limits.min_len);
            assert_eq!(g.active, g.id == lineage.current().id);
        }
        assert_eq!(lineage.depth(), 30);
        assert_eq!(lineage.get_ancestor(1000).id, 1);
        assert_eq!(engine.generation_number("alice").unwrap(), 31);
        assert_eq!(engine.evolution_history("alice", 5).len(), 5);
        assert_eq!(engine.evolution_history("alice", 0)[0].to_generation, 31);
        assert!(engine.mutation_history("alice").unwrap().len() >= 30);
    }

    #[test]
    fn test_generation_ceiling() {
        let mut config = EngineConfig::default();
        config.evolution.max_generations = 3;
        let (mut engine, sink, _) = engine_with(config, 5);
        engine.register("alice", ALICE).unwrap();
        engine.evolve("alice").unwrap();
        engine.evolve_forced("alice", 2).unwrap();
        assert!(matches!(engine.evolve("alice"), Err(AuthError::GenerationCeiling(3))));
        assert!(matches!(engine.evolve_forced("alice", 1), Err(AuthError::GenerationCeiling(3))));
        assert_eq!(engine.generation_number("alice").unwrap(), 3);
        assert_eq!(sink.count(EventKind::Evolution) + sink.count(EventKind::ForcedEvolution), 2);
        assert_eq!(engine.evolution_history("alice", 0).len(), 2);
    }

    #[test]
    fn test_scheduler_tick() {
        let (mut engine, sink, clock) = engine();
        engine.register("alice", ALICE).unwrap();
        engine.register("bob", BOB).unwrap();
        engine.set_pressure("bob", SelectionPressure::None).unwrap();

        assert!(engine.tick().is_empty());
        assert!(!engine.check_due("alice").unwrap());

        clock.advance(Duration::days(8));
        assert_eq!(engine.lineage_state("alice").unwrap(), LineageState::Due);
        let events = engine.tick();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].identity, "alice");
        assert!(!events[0].forced);
        assert_eq!(sink.count(EventKind::Evolution), 1);
        assert_eq!(engine.generation_number("bob").unwrap(), 1);

        // Immediately again: rate limited
        engine.schedule("alice", clock.now()).unwrap();
        assert!(engine.tick().is_empty());
        clock.advance(Duration::seconds(3600));
        assert_eq!(engine.tick().len(), 1);
        assert_eq!(engine.generation_number("alice").unwrap(), 3);
    }

    #[test]
    fn test_fitness_warning_hook() {
        let warnings = Arc::new(AtomicUsize::new(0));
        let seen = warnings.clone();
        let hooks = Hooks::new().on_fitness_warning(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let clock = ManualClock::new(start());
        let mut engine = Engine::builder(EngineConfig::default())
            .entropy(SeededEntropy::new(1))
            .sink(crate::audit::NullSink)
            .clock(clock.clone())
            .hooks(hooks)
            .build();
        engine.register("alice", ALICE).unwrap();
        engine.set_pressure("alice", SelectionPressure::Adaptive).unwrap();
        for _ in 0..4 {
            let _ = engine.authenticate("alice", &flip_last(ALICE));
        }
        assert!((engine.fitness("alice").unwrap() - 0.92).abs() < 1e-9);
        assert!(engine.is_fit("alice", 0.9).unwrap());
        assert_eq!(warnings.load(Ordering::SeqCst), 0);

        engine.lineage_mut("alice").unwrap().current_mut().fitness = 0.3;
        let fitness = engine.update_fitness("alice").unwrap();
        assert!(fitness < 0.3);
        assert_eq!(warnings.load(Ordering::SeqCst), 1);
        assert!(!engine.is_fit("alice", 0.5).unwrap());
    }

    #[test]
    fn test_hooks_fire() {
        let successes = Arc::new(AtomicUsize::new(0));
        let lockouts = Arc::new(AtomicUsize::new(0));
        let evolutions = Arc::new(AtomicUsize::new(0));
        let (s, l, e) = (successes.clone(), lockouts.clone(), evolutions.clone());
        let hooks = Hooks::new()
            .on_auth_success(move |_| {
                s.fetch_add(1, Ordering::SeqCst);
            })
            .on_lockout(move |_, _| {
                l.fetch_add(1, Ordering::SeqCst);
            })
            .on_evolution(move |_, _| {
                e.fetch_add(1, Ordering::SeqCst);
            });
        let mut engine = Engine::builder(EngineConfig::default())
            .entropy(SeededEntropy::new(2))
            .sink(crate::audit::NullSink)
            .clock(ManualClock::new(start()))
            .hooks(hooks)
            .build();
        engine.register("alice", ALICE).unwrap();
        engine.authenticate("alice", ALICE).unwrap();
        for _ in 0..5 {
            let _ = engine.authenticate("alice", &flip_last(ALICE));
        }
        engine.evolve_forced("alice", 1).unwrap();
        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(lockouts.load(Ordering::SeqCst), 1);
        assert_eq!(evolutions.load(Ordering::SeqCst), 1);
    }

    /// Seeded source that can be switched off mid-test
    struct FlakyEntropy {
        inner: SeededEntropy,
        broken: Arc<AtomicBool>,
    }

    impl EntropySource for FlakyEntropy {
        fn fill(&mut self, buf: &mut [u8]) -> std::result::Result<(), EntropyError> {
            if self.broken.load(Ordering::SeqCst) {
                BrokenEntropy.fill(buf)
            } else {
                self.inner.fill(buf)
            }
        }
    }

    #[test]
    fn test_entropy_failure_leaves_state_untouched() {
        let broken = Arc::new(AtomicBool::new(true));
        let sink = MemorySink::new();
        let mut engine = Engine::builder(EngineConfig::default())
            .entropy(FlakyEntropy {
                inner: SeededEntropy::new(3),
                broken: broken.clone(),
            })
            .sink(sink.clone())
            .clock(ManualClock::new(start()))
            .build();

        assert!(matches!(engine.register("alice", ALICE), Err(AuthError::Internal(_))));
        assert!(!engine.contains("alice"));
        assert!(engine.lineage("alice").is_err());
        assert_eq!(engine.stats().registered, 0);
        assert_eq!(sink.count(EventKind::RegistrationFailure), 1);

        broken.store(false, Ordering::SeqCst);
        engine.register("alice", ALICE).unwrap();
        broken.store(true, Ordering::SeqCst);

        assert!(matches!(engine.evolve_forced("alice", 2), Err(AuthError::Internal(_))));
        assert!(matches!(engine.evolve("alice"), Err(AuthError::Internal(_))));
        assert_eq!(engine.generation_number("alice").unwrap(), 1);
        assert!(engine.evolution_history("alice", 0).is_empty());
        assert_eq!(engine.stats().evolutions, 0);

        assert!(matches!(engine.change_key("alice", ALICE, BOB), Err(AuthError::Internal(_))));
        assert!(sink.events().pop().unwrap().detail.contains("Key change rejected"));
        assert_eq!(engine.generation_number("alice").unwrap(), 1);
        assert!(engine.authenticate("alice", ALICE).is_ok());
        assert!(engine.authenticate("alice", BOB).is_err());
    }

    #[test]
    fn test_oversized_intervals_saturate() {
        let mut config = EngineConfig::default();
        config.evolution.scheduler_check_secs = i64::MAX;
        config.lockout_secs = i64::MAX;
        let (mut engine, _, manual) = engine_with(config, 4);
        engine.register("alice", ALICE).unwrap();

        engine.set_interval("alice", i64::MAX).unwrap();
        let lineage = engine.lineage("alice").unwrap();
        assert_eq!(lineage.interval_secs, crate::clock::MAX_SPAN_SECS);
        assert_eq!(lineage.next_evolution, start() + Duration::seconds(crate::clock::MAX_SPAN_SECS));
        assert!(!engine.check_due("alice").unwrap());

        assert!(engine.tick().is_empty());
        manual.advance(Duration::days(365));
        assert!(engine.tick().is_empty());

        let wrong = flip_last(ALICE);
        for _ in 0..5 {
            let _ = engine.authenticate("alice", &wrong);
        }
        assert!(matches!(engine.authenticate("alice", ALICE), Err(AuthError::LockedOut { .. })));
        assert_eq!(engine.recent_failures("alice", Duration::MAX), 6);
    }

    #[test]
    fn test_change_key() {
        let (mut engine, sink, _) = engine();
        engine.register("alice", ALICE).unwrap();
        assert!(matches!(engine.change_key("alice", BOB, BOB), Err(AuthError::NoMatch)));
        engine.change_key("alice", ALICE, BOB).unwrap();
        assert!(engine.authenticate("alice", BOB).is_ok());
        assert!(engine.authenticate("alice", ALICE).is_err());
        assert_eq!(engine.current_generation("alice").unwrap().parent_id, 1);
        assert_eq!(engine.current_generation("alice").unwrap().fitness, 1.0);
        assert_eq!(sink.count(EventKind::KeyChange), 1);
    }

    #[test]
    fn test_export_import_round_trip() {
        let (mut engine, _, _) = engine();
        engine.register("alice", ALICE).unwrap();
        engine.evolve_forced("alice", 2).unwrap();
        let current = engine.current_generation("alice").unwrap().sequence.clone();
        let json = engine.export_state().unwrap();

        let (mut restored, _, _) = engine_with(EngineConfig::default(), 8);
        restored.import_state(&json).unwrap();
        assert!(restored.authenticate("alice", &current).is_ok());
        assert_eq!(restored.authenticate_ancestor("alice", ALICE, 1).unwrap(), 1);
        assert_eq!(restored.evolution_history("alice", 0).len(), 1);
        assert_eq!(restored.stats().registered, 1);
    }

    #[test]
    fn test_shared_engine() {
        let (engine, _, _) = engine();
        let shared = SharedEngine::new(engine);
        shared.register("alice", ALICE).unwrap();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                std::thread::spawn(move || shared.authenticate("alice", ALICE).is_ok())
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
        assert_eq!(shared.stats().successful_auths, 4);
        assert_eq!(shared.generation_number("alice").unwrap(), 1);
        assert_eq!(shared.fitness("alice").unwrap(), 1.0);
    }

    #[test]
    fn test_shutdown_returns_stats() {
        let (mut engine, _, _) = engine();
        engine.register("alice", ALICE).unwrap();
        engine.authenticate("alice", ALICE).unwrap();
        let stats = engine.shutdown();
        assert_eq!(stats.registered, 1);
        assert_eq!(stats.successful_auths, 1);
    }
}
