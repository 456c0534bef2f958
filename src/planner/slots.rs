use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MealSlot {
    #[serde(rename = "petit_dejeuner")]
    Breakfast,
    #[serde(rename = "dejeuner")]
    Lunch,
    #[serde(rename = "diner")]
    Dinner,
}

impl MealSlot {
    pub const ALL: [MealSlot; 3] = [MealSlot::Breakfast, MealSlot::Lunch, MealSlot::Dinner];

    /// Key used inside a generated plan (`repas_par_jour`).
    pub fn plan_key(self) -> &'static str {
        match self {
            MealSlot::Breakfast => "petit_dejeuner",
            MealSlot::Lunch => "dejeuner",
            MealSlot::Dinner => "diner",
        }
    }

    /// Label stored in a meal record's `type_repas`.
    pub fn label(self) -> &'static str {
        match self {
            MealSlot::Breakfast => "Petit-déjeuner",
            MealSlot::Lunch => "Déjeuner",
            MealSlot::Dinner => "Dîner",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            MealSlot::Breakfast => "Breakfast",
            MealSlot::Lunch => "Lunch",
            MealSlot::Dinner => "Dinner",
        }
    }
}

impl fmt::Display for MealSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.display_name())
    }
}

impl FromStr for MealSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        MealSlot::ALL
            .into_iter()
            .find(|slot| {
                wanted.eq_ignore_ascii_case(slot.display_name())
                    || wanted.eq_ignore_ascii_case(slot.plan_key())
                    || wanted == slot.label()
            })
            .ok_or_else(|| format!("unknown meal slot '{}' (expected breakfast, lunch or dinner)", s))
    }
}

/// (de)serializes a slot through its `type_repas` label.
pub mod meal_type_label {
    use super::MealSlot;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(slot: &MealSlot, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(slot.label())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<MealSlot, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MealSlotKey {
    pub date: NaiveDate,
    pub slot: MealSlot,
}

impl MealSlotKey {
    pub fn new(date: NaiveDate, slot: MealSlot) -> Self {
        Self { date, slot }
    }
}

/// The recipe the server picked for one slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealAssignment {
    /// Recipe id; the planner sends it as `recette_id`.
    #[serde(default, alias = "recette_id")]
    pub id: Option<String>,
    #[serde(rename = "nom")]
    pub recipe_name: String,
    #[serde(rename = "image", default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(rename = "categorie", default)]
    pub category: Option<String>,
}

impl MealAssignment {
    pub fn named(recipe_name: impl Into<String>) -> Self {
        Self {
            id: None,
            recipe_name: recipe_name.into(),
            image_url: None,
            description: None,
            instructions: None,
            category: None,
        }
    }

    pub fn image(&self) -> Option<&str> {
        self.image_url.as_deref().filter(|url| !url.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayMeals {
    #[serde(rename = "petit_dejeuner", default)]
    pub breakfast: Option<MealAssignment>,
    #[serde(rename = "dejeuner", default)]
    pub lunch: Option<MealAssignment>,
    #[serde(rename = "diner", default)]
    pub dinner: Option<MealAssignment>,
}

impl DayMeals {
    pub fn get(&self, slot: MealSlot) -> Option<&MealAssignment> {
        match slot {
            MealSlot::Breakfast => self.breakfast.as_ref(),
            MealSlot::Lunch => self.lunch.as_ref(),
            MealSlot::Dinner => self.dinner.as_ref(),
        }
    }
}

/// Slot assignments keyed by ISO date, as returned in `repas_par_jour`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeeklyPlan {
    days: BTreeMap<NaiveDate, DayMeals>,
}

impl WeeklyPlan {
    pub fn day(&self, date: NaiveDate) -> Option<&DayMeals> {
        self.days.get(&date)
    }

    pub fn days(&self) -> impl Iterator<Item = (&NaiveDate, &DayMeals)> {
        self.days.iter()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

impl FromIterator<(NaiveDate, DayMeals)> for WeeklyPlan {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, DayMeals)>>(iter: I) -> Self {
        Self {
            days: iter.into_iter().collect(),
        }
    }
}

/// Holds exactly one plan. `replace_all` is the only way to change it, so a
/// reader never sees slots from two different generations.
#[derive(Debug, Clone, Default)]
pub struct MealSlotModel {
    plan: WeeklyPlan,
}

impl MealSlotModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty (`None`) for any date or slot the current plan does not cover.
    pub fn get(&self, date: NaiveDate, slot: MealSlot) -> Option<&MealAssignment> {
        self.plan.day(date).and_then(|day| day.get(slot))
    }

    pub fn get_key(&self, key: MealSlotKey) -> Option<&MealAssignment> {
        self.get(key.date, key.slot)
    }

    pub fn replace_all(&mut self, plan: WeeklyPlan) {
        self.plan = plan;
    }

    pub fn plan(&self) -> &WeeklyPlan {
        &self.plan
    }

    pub fn is_empty(&self) -> bool {
        self.plan.is_empty()
    }
}
