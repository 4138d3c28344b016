use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Holds the transient session-start marker so a reload can resume a running session.
pub trait SessionMarkerStore: Send + Sync {
    fn load(&self) -> Option<DateTime<Utc>>;
    fn store(&self, started_at: DateTime<Utc>);
    fn clear(&self);
}

#[derive(Debug, Default)]
pub struct InMemoryMarkerStore {
    marker: Mutex<Option<DateTime<Utc>>>,
}

impl SessionMarkerStore for InMemoryMarkerStore {
    fn load(&self) -> Option<DateTime<Utc>> {
        match self.marker.lock() {
            Ok(marker) => *marker,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn store(&self, started_at: DateTime<Utc>) {
        match self.marker.lock() {
            Ok(mut marker) => *marker = Some(started_at),
            Err(poisoned) => *poisoned.into_inner() = Some(started_at),
        }
    }

    fn clear(&self) {
        match self.marker.lock() {
            Ok(mut marker) => *marker = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    Landing,
    Shop,
    Chat,
    Checkout,
}

impl Surface {
    pub fn is_shopping(&self) -> bool {
        matches!(self, Self::Shop | Self::Chat)
    }
}

impl FromStr for Surface {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "landing" | "home" => Ok(Self::Landing),
            "shop" => Ok(Self::Shop),
            "chat" => Ok(Self::Chat),
            "checkout" => Ok(Self::Checkout),
            other => Err(DomainError::UnknownSurface(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Running { started_at: DateTime<Utc> },
    Stopped { elapsed_seconds: i64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionDuration(Duration);

impl SessionDuration {
    pub fn zero() -> Self {
        Self(Duration::zero())
    }

    pub fn from_seconds(seconds: i64) -> Self {
        Self(Duration::seconds(seconds.max(0)))
    }

    fn between(started_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let elapsed = now - started_at;
        if elapsed < Duration::zero() {
            Self::zero()
        } else {
            Self(elapsed)
        }
    }

    pub fn total_seconds(&self) -> i64 {
        self.0.num_seconds()
    }

    /// Checkout format, e.g. `3min 7s`.
    pub fn formatted(&self) -> String {
        let seconds = self.total_seconds();
        format!("{}min {}s", seconds / 60, seconds % 60)
    }

    /// Live ticker format, e.g. `3:07`.
    pub fn clock_display(&self) -> String {
        let seconds = self.total_seconds();
        format!("{}:{:02}", seconds / 60, seconds % 60)
    }
}

impl fmt::Display for SessionDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

/// Wall-clock timer from the first shopping-surface visit to checkout.
///
/// Idle -> Running on a shopping surface, Running -> Stopped on checkout. The
/// elapsed time is computed once at the stop from the stored start marker; the
/// marker is then cleared so the next shopping visit starts fresh.
pub struct SessionClock {
    clock: Arc<dyn Clock>,
    markers: Arc<dyn SessionMarkerStore>,
    state: SessionState,
}

impl SessionClock {
    /// A stored marker resumes a running session.
    pub fn new(clock: Arc<dyn Clock>, markers: Arc<dyn SessionMarkerStore>) -> Self {
        let state = match markers.load() {
            Some(started_at) => SessionState::Running { started_at },
            None => SessionState::Idle,
        };
        Self { clock, markers, state }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock), Arc::new(InMemoryMarkerStore::default()))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SessionState::Running { .. })
    }

    /// Applies a surface visit. Returns the final duration when the visit stops the clock.
    pub fn visit(&mut self, surface: Surface) -> Option<SessionDuration> {
        if surface.is_shopping() {
            self.start();
            return None;
        }

        if surface == Surface::Checkout {
            return Some(self.stop());
        }

        None
    }

    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let started_at = match self.markers.load() {
            Some(started_at) => started_at,
            None => {
                let now = self.clock.now();
                self.markers.store(now);
                now
            }
        };
        self.state = SessionState::Running { started_at };
    }

    /// Stopping an already stopped clock returns the recorded duration; stopping
    /// a clock that never started reports zero.
    pub fn stop(&mut self) -> SessionDuration {
        let duration = match self.state {
            SessionState::Stopped { elapsed_seconds } => {
                return SessionDuration::from_seconds(elapsed_seconds)
            }
            SessionState::Running { started_at } => {
                SessionDuration::between(started_at, self.clock.now())
            }
            SessionState::Idle => match self.markers.load() {
                Some(started_at) => SessionDuration::between(started_at, self.clock.now()),
                None => SessionDuration::zero(),
            },
        };

        self.markers.clear();
        self.state = SessionState::Stopped { elapsed_seconds: duration.total_seconds() };
        duration
    }

    pub fn reset(&mut self) {
        self.markers.clear();
        self.state = SessionState::Idle;
    }

    /// Elapsed time for display refresh; not used to compute the final record.
    pub fn live_elapsed(&self) -> SessionDuration {
        match self.state {
            SessionState::Idle => SessionDuration::zero(),
            SessionState::Running { started_at } => {
                SessionDuration::between(started_at, self.clock.now())
            }
            SessionState::Stopped { elapsed_seconds } => {
                SessionDuration::from_seconds(elapsed_seconds)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::test_support::ManualClock;
    use super::{
        InMemoryMarkerStore, SessionClock, SessionDuration, SessionMarkerStore, SessionState,
        Surface,
    };

    fn session() -> (SessionClock, Arc<ManualClock>, Arc<InMemoryMarkerStore>) {
        let clock = Arc::new(ManualClock::new());
        let markers = Arc::new(InMemoryMarkerStore::default());
        (SessionClock::new(clock.clone(), markers.clone()), clock, markers)
    }

    #[test]
    fn shopping_visit_starts_and_checkout_stops() {
        let (mut session, clock, markers) = session();
        assert_eq!(session.state(), SessionState::Idle);

        assert!(session.visit(Surface::Shop).is_none());
        assert!(session.is_running());
        assert!(markers.load().is_some());

        clock.advance(187);
        let duration = session.visit(Surface::Checkout).expect("checkout stops the clock");

        assert_eq!(duration.formatted(), "3min 7s");
        assert_eq!(session.state(), SessionState::Stopped { elapsed_seconds: 187 });
        assert!(markers.load().is_none(), "marker is cleared on stop");
    }

    #[test]
    fn revisiting_shopping_surfaces_keeps_the_original_start() {
        let (mut session, clock, _markers) = session();
        session.visit(Surface::Chat);
        clock.advance(30);
        session.visit(Surface::Shop);
        clock.advance(30);

        assert_eq!(session.stop().total_seconds(), 60);
    }

    #[test]
    fn landing_visit_does_not_start_the_clock() {
        let (mut session, _clock, _markers) = session();
        assert!(session.visit(Surface::Landing).is_none());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn checkout_without_start_reports_zero() {
        let (mut session, _clock, _markers) = session();
        assert_eq!(session.visit(Surface::Checkout).map(|d| d.formatted()), Some("0min 0s".into()));
    }

    #[test]
    fn stored_marker_resumes_running_session() {
        let clock = Arc::new(ManualClock::new());
        let markers = Arc::new(InMemoryMarkerStore::default());
        SessionClock::new(clock.clone(), markers.clone()).start();

        clock.advance(75);
        let mut resumed = SessionClock::new(clock.clone(), markers.clone());
        assert!(resumed.is_running());
        assert_eq!(resumed.live_elapsed().clock_display(), "1:15");
        assert_eq!(resumed.stop().formatted(), "1min 15s");
    }

    #[test]
    fn new_session_after_checkout_starts_fresh() {
        let (mut session, clock, _markers) = session();
        session.visit(Surface::Shop);
        clock.advance(100);
        session.visit(Surface::Checkout);

        clock.advance(500);
        session.visit(Surface::Shop);
        clock.advance(10);
        assert_eq!(session.stop().total_seconds(), 10);
    }

    #[test]
    fn second_checkout_visit_returns_recorded_duration() {
        let (mut session, clock, _markers) = session();
        session.visit(Surface::Shop);
        clock.advance(42);
        session.visit(Surface::Checkout);
        clock.advance(100);

        assert_eq!(session.visit(Surface::Checkout), Some(SessionDuration::from_seconds(42)));
    }

    #[test]
    fn reset_returns_to_idle() {
        let (mut session, _clock, markers) = session();
        session.visit(Surface::Shop);
        session.reset();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(markers.load().is_none());
    }

    #[test]
    fn surfaces_parse_from_route_names() {
        assert_eq!("Shop".parse::<Surface>().ok(), Some(Surface::Shop));
        assert_eq!("home".parse::<Surface>().ok(), Some(Surface::Landing));
        assert!("cart".parse::<Surface>().is_err());
    }
}
