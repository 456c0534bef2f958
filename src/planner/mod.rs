pub mod date_range;
pub mod slots;
pub mod synchronizer;

pub use date_range::{DateRange, RangeError};
pub use slots::{DayMeals, MealAssignment, MealSlot, MealSlotKey, MealSlotModel, WeeklyPlan};
pub use synchronizer::{PlanError, PlanSynchronizer};
