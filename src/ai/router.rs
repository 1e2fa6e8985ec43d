//! Model Router
//!
//! Chooses between a primary and a secondary backend per request:
//!
//! 1. Refresh health at most once per `health_check_interval`
//! 2. Prefer the secondary for large or batched requests, else the primary
//! 3. Skip an unhealthy preferred backend
//! 4. On failure mark the backend unhealthy and retry once on the other
//!
//! A backend marked unhealthy stays out of rotation until the next health
//! check.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::backend::{ModelInput, SharedBackend, create_backend};
use super::timeout::with_timeout;
use crate::config::Config;
use crate::constants::router;
use crate::types::{ErrorClassifier, LensError, Result};

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub health_check_interval: Duration,
    pub large_input_chars: usize,
    pub batch_threshold: usize,
    pub call_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            health_check_interval: Duration::from_secs(router::HEALTH_CHECK_INTERVAL_SECS),
            large_input_chars: router::LARGE_INPUT_CHARS,
            batch_threshold: router::BATCH_THRESHOLD,
            call_timeout: Duration::from_secs(router::CALL_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendSlot {
    Primary,
    Secondary,
}

impl BackendSlot {
    pub fn other(self) -> Self {
        match self {
            Self::Primary => Self::Secondary,
            Self::Secondary => Self::Primary,
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Primary => 0,
            Self::Secondary => 1,
        }
    }
}

impl std::fmt::Display for BackendSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Secondary => write!(f, "secondary"),
        }
    }
}

/// Health snapshot of one backend
#[derive(Debug, Clone, Serialize)]
pub struct BackendHealth {
    pub name: String,
    pub slot: BackendSlot,
    pub healthy: bool,
    pub last_checked: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct HealthState {
    healthy: [bool; 2],
    checked_at: Option<Instant>,
    checked_wall: Option<DateTime<Utc>>,
}

pub struct ModelRouter {
    backends: [SharedBackend; 2],
    config: RouterConfig,
    health: Mutex<HealthState>,
}

impl ModelRouter {
    pub fn new(primary: SharedBackend, secondary: SharedBackend, config: RouterConfig) -> Self {
        Self {
            backends: [primary, secondary],
            config,
            health: Mutex::new(HealthState::default()),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            create_backend(&config.primary)?,
            create_backend(&config.secondary)?,
            config.router_config(),
        ))
    }

    fn backend(&self, slot: BackendSlot) -> &SharedBackend {
        &self.backends[slot.index()]
    }

    fn lock_health(&self) -> std::sync::MutexGuard<'_, HealthState> {
        self.health.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Re-probe backends unless a check ran within the interval
    fn refresh_health(&self) {
        let mut state = self.lock_health();
        let due = state
            .checked_at
            .is_none_or(|at| at.elapsed() >= self.config.health_check_interval);
        if !due {
            return;
        }
        for slot in [BackendSlot::Primary, BackendSlot::Secondary] {
            state.healthy[slot.index()] = self.backend(slot).is_configured();
        }
        state.checked_at = Some(Instant::now());
        state.checked_wall = Some(Utc::now());
        debug!(
            primary = state.healthy[0],
            secondary = state.healthy[1],
            "Backend health refreshed"
        );
    }

    fn is_healthy(&self, slot: BackendSlot) -> bool {
        self.lock_health().healthy[slot.index()]
    }

    fn mark_unhealthy(&self, slot: BackendSlot, err: &LensError) {
        let name = self.backend(slot).name();
        let category = ErrorClassifier::category_of(err, name);
        warn!(
            backend = name,
            slot = %slot,
            category = %category,
            error = %err,
            "Backend call failed, marking unhealthy"
        );
        self.lock_health().healthy[slot.index()] = false;
    }

    /// Slot the request would prefer, ignoring health
    pub fn preferred_slot(&self, inputs: &[ModelInput]) -> BackendSlot {
        let total_chars: usize = inputs.iter().map(ModelInput::chars).sum();
        if total_chars >= self.config.large_input_chars
            || inputs.len() >= self.config.batch_threshold
        {
            BackendSlot::Secondary
        } else {
            BackendSlot::Primary
        }
    }

    async fn call_slot(
        &self,
        slot: BackendSlot,
        system_prompt: &str,
        inputs: &[ModelInput],
    ) -> Result<String> {
        let backend = self.backend(slot);
        let operation = format!("{} call", backend.name());
        with_timeout(
            self.config.call_timeout,
            backend.call(system_prompt, inputs),
            &operation,
        )
        .await
    }

    /// Route a request, failing over once
    #[instrument(skip_all, fields(inputs = inputs.len()))]
    pub async fn call(&self, system_prompt: &str, inputs: &[ModelInput]) -> Result<String> {
        self.refresh_health();

        let preferred = self.preferred_slot(inputs);
        let first = if self.is_healthy(preferred) {
            preferred
        } else if self.is_healthy(preferred.other()) {
            debug!(preferred = %preferred, "Preferred backend unhealthy");
            preferred.other()
        } else {
            return Err(LensError::NoBackendAvailable);
        };

        let err = match self.call_slot(first, system_prompt, inputs).await {
            Ok(text) => return Ok(text),
            Err(e) => e,
        };
        self.mark_unhealthy(first, &err);

        let second = first.other();
        if !self.is_healthy(second) {
            return Err(err);
        }

        info!(
            from = self.backend(first).name(),
            to = self.backend(second).name(),
            "Failing over"
        );
        self.call_slot(second, system_prompt, inputs)
            .await
            .inspect_err(|e| self.mark_unhealthy(second, e))
    }

    /// Health snapshot of both backends, probing them if a check is due
    pub fn health(&self) -> Vec<BackendHealth> {
        self.refresh_health();
        let state = self.lock_health();
        [BackendSlot::Primary, BackendSlot::Secondary]
            .into_iter()
            .map(|slot| BackendHealth {
                name: self.backend(slot).name().to_string(),
                slot,
                healthy: state.healthy[slot.index()],
                last_checked: state.checked_wall,
            })
            .collect()
    }
}
