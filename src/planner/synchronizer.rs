use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::date_range::{DateRange, RangeError};
use super::slots::{MealAssignment, MealSlot, MealSlotModel, WeeklyPlan};
use crate::api_connection::connection::{ApiClient, ApiConnectionError};
use crate::api_connection::endpoints::PlanRequest;
use chrono::NaiveDate;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("invalid date: '{0}'")]
    InvalidDate(String),
    #[error("the start date {start} is after the end date {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
    #[error("the period cannot exceed 31 days (got {days})")]
    RangeTooLong { days: i64 },
    #[error("not logged in")]
    NotAuthenticated,
    #[error("a plan is already being generated")]
    Busy,
    #[error(transparent)]
    Api(ApiConnectionError),
}

impl From<RangeError> for PlanError {
    fn from(err: RangeError) -> Self {
        match err {
            RangeError::InvalidDate(raw) => PlanError::InvalidDate(raw),
            RangeError::InvertedRange { start, end } => PlanError::InvertedRange { start, end },
            RangeError::RangeTooLong { days } => PlanError::RangeTooLong { days },
        }
    }
}

impl From<ApiConnectionError> for PlanError {
    fn from(err: ApiConnectionError) -> Self {
        match err {
            ApiConnectionError::NotAuthenticated => PlanError::NotAuthenticated,
            other => PlanError::Api(other),
        }
    }
}

impl PlanError {
    /// Rejected locally; nothing was sent.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PlanError::InvalidDate(_) | PlanError::InvertedRange { .. } | PlanError::RangeTooLong { .. }
        )
    }

    pub fn user_message(&self) -> String {
        match self {
            PlanError::Api(err) => err.user_message(),
            PlanError::NotAuthenticated => ApiConnectionError::NotAuthenticated.user_message(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct Committed {
    model: MealSlotModel,
    range: Option<DateRange>,
}

/// Validates a requested range, asks the server for a plan and commits it to
/// the slot model. One generation at a time.
#[derive(Debug)]
pub struct PlanSynchronizer {
    client: ApiClient,
    user_id: i64,
    in_flight: AtomicBool,
    committed: Mutex<Committed>,
}

impl PlanSynchronizer {
    pub fn new(client: ApiClient, user_id: i64) -> Self {
        Self {
            client,
            user_id,
            in_flight: AtomicBool::new(false),
            committed: Mutex::new(Committed::default()),
        }
    }

    /// Resolves the logged-in user through `current-user/` first.
    pub async fn for_current_user(client: ApiClient) -> Result<Self, PlanError> {
        if !client.is_authenticated() {
            return Err(PlanError::NotAuthenticated);
        }
        let user = client.current_user().await?;
        debug!(user_id = user.id, username = %user.username, "planner bound to user");
        Ok(Self::new(client, user.id))
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Generates a plan for `start..=end` (both `YYYY-MM-DD`).
    ///
    /// Validation and the session check happen before any request. On failure
    /// the previously committed plan is left untouched. A call made while
    /// another generation is pending returns [`PlanError::Busy`] without
    /// sending anything.
    pub async fn generate(&self, start: &str, end: &str) -> Result<DateRange, PlanError> {
        let range = DateRange::parse(start, end)?;
        self.generate_range(range).await
    }

    pub async fn generate_range(&self, range: DateRange) -> Result<DateRange, PlanError> {
        if !self.client.is_authenticated() {
            return Err(PlanError::NotAuthenticated);
        }
        let _guard = InFlight::acquire(&self.in_flight).ok_or(PlanError::Busy)?;

        let request = PlanRequest {
            user_id: self.user_id,
            start: range.start(),
            end: range.end(),
        };
        info!(%range, user_id = self.user_id, "requesting meal plan");

        let response = self.client.generate_plan(&request).await.map_err(|e| {
            warn!(%range, error = %e, "plan generation failed, keeping previous plan");
            PlanError::from(e)
        })?;

        let days = response.meals_by_day.len();
        self.commit(range, response.meals_by_day);
        info!(%range, days, "meal plan committed");
        Ok(range)
    }

    fn commit(&self, range: DateRange, plan: WeeklyPlan) {
        let mut committed = self.lock();
        committed.model.replace_all(plan);
        committed.range = Some(range);
    }

    /// Assignment for one slot of the committed plan, `None` when empty.
    pub fn get(&self, date: NaiveDate, slot: MealSlot) -> Option<MealAssignment> {
        self.lock().model.get(date, slot).cloned()
    }

    /// Range of the last committed plan.
    pub fn range(&self) -> Option<DateRange> {
        self.lock().range
    }

    pub fn plan(&self) -> WeeklyPlan {
        self.lock().model.plan().clone()
    }

    // A poisoned lock still holds a fully replaced plan: replace_all swaps the
    // whole value.
    fn lock(&self) -> MutexGuard<'_, Committed> {
        self.committed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds the busy flag; releases it on drop, including when the generating
/// future is dropped mid-request.
struct InFlight<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
