//! The ambient cache-enable scope.
//!
//! `enable(true)` bounds where a registered function actually consults the
//! cache; outside any scope, caching defaults to off. Modeled on
//! `tokio::task_local!`, the idiomatic analogue of the contextvars-style
//! dynamic scoping the underlying mechanism needs: entering a nested scope
//! wraps the inner future so the previous value is restored automatically
//! when it returns, giving strict LIFO nesting for free.

use std::future::Future;

tokio::task_local! {
    static ENABLED: bool;
}

/// The three states a call can observe its enable-scope in. `NoScope` and
/// `ExplicitlyDisabled` both mean caching is off for the call, but they are
/// reported against different `disabled_counter` reasons: a call that was
/// never wrapped in `enable` at all versus one a caller deliberately
/// wrapped in `enable(false)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    Enabled,
    ExplicitlyDisabled,
    NoScope,
}

impl ScopeState {
    pub fn is_enabled(&self) -> bool {
        matches!(self, ScopeState::Enabled)
    }
}

/// The enable-scope observed by the calling task.
pub fn state() -> ScopeState {
    match ENABLED.try_with(|v| *v) {
        Ok(true) => ScopeState::Enabled,
        Ok(false) => ScopeState::ExplicitlyDisabled,
        Err(_) => ScopeState::NoScope,
    }
}

/// The enable-scope observed by the calling task, or `false` (disabled)
/// outside of any scope. Caching is disabled by default.
pub fn is_enabled() -> bool {
    state().is_enabled()
}

/// Runs `fut` with the enable-scope set to `active` for its duration.
/// Used by the facade's `enable` entry point.
pub async fn with_scope<F: Future>(active: bool, fut: F) -> F::Output {
    ENABLED.scope(active, fut).await
}

/// Runs `fut` with the enable-scope set to `state` for its duration,
/// faithfully reproducing `NoScope` rather than collapsing it into an
/// explicit `false`. Used by the sync-to-async bridge to carry a caller's
/// exact scope state across the thread boundary.
pub async fn with_state<F: Future>(state: ScopeState, fut: F) -> F::Output {
    match state {
        ScopeState::NoScope => fut.await,
        ScopeState::Enabled => ENABLED.scope(true, fut).await,
        ScopeState::ExplicitlyDisabled => ENABLED.scope(false, fut).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn outside_any_scope_is_disabled() {
        assert!(!is_enabled());
    }

    #[tokio::test]
    async fn outside_any_scope_state_is_no_scope() {
        assert_eq!(state(), ScopeState::NoScope);
    }

    #[tokio::test]
    async fn explicit_disable_is_distinguished_from_no_scope() {
        with_scope(false, async {
            assert_eq!(state(), ScopeState::ExplicitlyDisabled);
            assert!(!is_enabled());
        })
        .await;
        assert_eq!(state(), ScopeState::NoScope);
    }

    #[tokio::test]
    async fn with_state_reproduces_no_scope_rather_than_explicit_false() {
        with_state(ScopeState::NoScope, async {
            assert_eq!(state(), ScopeState::NoScope);
        })
        .await;
        with_state(ScopeState::ExplicitlyDisabled, async {
            assert_eq!(state(), ScopeState::ExplicitlyDisabled);
        })
        .await;
        with_state(ScopeState::Enabled, async {
            assert_eq!(state(), ScopeState::Enabled);
        })
        .await;
    }

    #[tokio::test]
    async fn enabled_scope_is_observed_inside() {
        with_scope(true, async {
            assert!(is_enabled());
        })
        .await;
        assert!(!is_enabled());
    }

    #[tokio::test]
    async fn nested_scopes_restore_the_outer_value_on_exit() {
        with_scope(true, async {
            assert!(is_enabled());
            with_scope(false, async {
                assert!(!is_enabled());
            })
            .await;
            assert!(is_enabled());
        })
        .await;
    }
}
