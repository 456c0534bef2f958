//! Raw user input for every editable entity, and the parse/validate step that
//! turns it into a wire payload. Nothing reaches the API client without going
//! through one of the `validate*` methods.

use chrono::{Local, NaiveDate};
use std::collections::BTreeMap;
use thiserror::Error;
use validator::Validate;

use crate::api_connection::endpoints::{
    split_allergies, AllergyName, Ingredient, IngredientPayload, InitialPreferences, MealPayload,
    Preferences, Recipe, RecipePayload, RegisterRequest, User, UserUpdate, RECIPE_CATEGORIES,
};
use crate::planner::date_range::parse_date;
use crate::planner::slots::MealSlot;

const REQUIRED: &str = "this field is required";

/// Per-field validation messages, keyed by form field name.
#[derive(Debug, Clone, Default, PartialEq, Error)]
#[error("{}", summarize(.fields))]
pub struct FormErrors {
    fields: BTreeMap<String, String>,
}

fn summarize(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(field, message)| format!("{}: {}", field, message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

impl From<validator::ValidationErrors> for FormErrors {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut form_errors = FormErrors::default();
        for (field, field_errors) in errors.field_errors() {
            if let Some(first) = field_errors.first() {
                let message = first
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("invalid value ({})", first.code));
                form_errors.add(&field, message);
            }
        }
        form_errors
    }
}

fn require(errors: &mut FormErrors, field: &str, value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(field, REQUIRED);
    }
    trimmed.to_string()
}

/// Blank counts as zero; anything else must be a non-negative number.
fn amount(errors: &mut FormErrors, field: &str, value: &str) -> f64 {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed.replace(',', ".").parse::<f64>() {
        Ok(n) if n.is_finite() && n >= 0.0 => n,
        Ok(_) => {
            errors.add(field, "must be zero or more");
            0.0
        }
        Err(_) => {
            errors.add(field, "must be a number");
            0.0
        }
    }
}

fn yes_no(errors: &mut FormErrors, field: &str, value: &str) -> bool {
    match value.trim().to_lowercase().as_str() {
        "oui" | "yes" | "y" | "true" | "1" => true,
        "non" | "no" | "n" | "false" | "0" | "" => false,
        _ => {
            errors.add(field, "answer yes or no");
            false
        }
    }
}

fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

// --- ingredients ---

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngredientForm {
    pub name: String,
    pub quantity: String,
    pub unit: String,
    pub calories: String,
    pub protein: String,
    pub carbohydrates: String,
    pub fat: String,
    pub recipe_id: String,
}

impl IngredientForm {
    /// Pre-fills the edit form. The record only carries the recipe's name, so
    /// the recipe id has to be chosen again.
    pub fn from_record(record: &Ingredient) -> Self {
        Self {
            name: record.name.clone(),
            quantity: format_amount(record.quantity),
            unit: record.unit.clone(),
            calories: format_amount(record.calories),
            protein: format_amount(record.protein),
            carbohydrates: format_amount(record.carbohydrates),
            fat: format_amount(record.fat),
            recipe_id: String::new(),
        }
    }

    /// Adding requires a name, a non-zero quantity and a unit.
    pub fn validate_new(&self) -> Result<IngredientPayload, FormErrors> {
        let mut errors = FormErrors::default();
        let name = require(&mut errors, "name", &self.name);
        let unit = require(&mut errors, "unit", &self.unit);
        let quantity = if self.quantity.trim().is_empty() {
            errors.add("quantity", REQUIRED);
            0.0
        } else {
            let quantity = amount(&mut errors, "quantity", &self.quantity);
            if quantity == 0.0 {
                errors.add("quantity", "must be greater than zero");
            }
            quantity
        };
        self.finish(errors, name, quantity, unit)
    }

    /// Editing is lenient: a blank unit becomes grams and blank numbers zero.
    pub fn validate_edit(&self) -> Result<IngredientPayload, FormErrors> {
        let mut errors = FormErrors::default();
        let name = require(&mut errors, "name", &self.name);
        let unit = match self.unit.trim() {
            "" => "g".to_string(),
            unit => unit.to_string(),
        };
        let quantity = amount(&mut errors, "quantity", &self.quantity);
        self.finish(errors, name, quantity, unit)
    }

    fn finish(
        &self,
        mut errors: FormErrors,
        name: String,
        quantity: f64,
        unit: String,
    ) -> Result<IngredientPayload, FormErrors> {
        let calories = amount(&mut errors, "calories", &self.calories);
        let protein = amount(&mut errors, "protein", &self.protein);
        let carbohydrates = amount(&mut errors, "carbohydrates", &self.carbohydrates);
        let fat = amount(&mut errors, "fat", &self.fat);
        let recipe_id = require(&mut errors, "recipe_id", &self.recipe_id);

        errors.into_result(|| IngredientPayload {
            name,
            quantity,
            unit,
            calories,
            protein,
            carbohydrates,
            fat,
            recipe_id,
        })
    }
}

// --- recipes ---

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeForm {
    pub name: String,
    pub description: String,
    pub instructions: String,
    pub vegetarian: bool,
    pub category: String,
    /// Passed through untouched (URL or data URI).
    pub image: Option<String>,
}

impl RecipeForm {
    pub fn from_record(record: &Recipe) -> Self {
        Self {
            name: record.name.clone(),
            description: record.description.clone(),
            instructions: record.instructions.clone(),
            vegetarian: record.vegetarian,
            category: record.category.clone(),
            image: record.image.clone(),
        }
    }

    pub fn validate(&self) -> Result<RecipePayload, FormErrors> {
        let mut errors = FormErrors::default();
        let name = require(&mut errors, "name", &self.name);
        let description = require(&mut errors, "description", &self.description);
        let instructions = require(&mut errors, "instructions", &self.instructions);

        let category = match RECIPE_CATEGORIES
            .iter()
            .find(|known| known.to_lowercase() == self.category.trim().to_lowercase())
        {
            Some(known) => known.to_string(),
            None => {
                errors.add(
                    "category",
                    format!("must be one of: {}", RECIPE_CATEGORIES.join(", ")),
                );
                String::new()
            }
        };

        let image = self.image.clone().filter(|i| !i.trim().is_empty());
        errors.into_result(|| RecipePayload {
            name,
            description,
            instructions,
            vegetarian: self.vegetarian,
            category,
            image,
        })
    }
}

// --- meals ---

#[derive(Debug, Clone, PartialEq)]
pub struct MealForm {
    pub recipe_id: String,
    pub date: String,
    pub slot: MealSlot,
}

impl Default for MealForm {
    /// Today's breakfast, no recipe chosen yet.
    fn default() -> Self {
        Self {
            recipe_id: String::new(),
            date: Local::now().date_naive().format("%Y-%m-%d").to_string(),
            slot: MealSlot::Breakfast,
        }
    }
}

impl MealForm {
    pub fn validate(&self) -> Result<MealPayload, FormErrors> {
        let mut errors = FormErrors::default();
        let recipe_id = self.recipe_id.trim().to_string();
        if recipe_id.is_empty() {
            errors.add("recipe_id", "select a recipe");
        }
        let date = match parse_date(&self.date) {
            Ok(date) => date,
            Err(e) => {
                errors.add("date", e.to_string());
                NaiveDate::MIN
            }
        };
        errors.into_result(|| MealPayload {
            recipe_id,
            date,
            slot: self.slot,
        })
    }
}

// --- preferences ---

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreferenceForm {
    pub vegetarian: String,
    /// Comma-separated.
    pub allergies: String,
    pub calorie_goal: String,
    pub protein_goal: String,
    pub carbohydrate_goal: String,
    pub fat_goal: String,
}

impl PreferenceForm {
    pub fn from_preferences(preferences: &Preferences) -> Self {
        Self {
            vegetarian: if preferences.vegetarian { "yes" } else { "no" }.to_string(),
            allergies: preferences.allergies.join(", "),
            calorie_goal: format_amount(preferences.calorie_goal),
            protein_goal: format_amount(preferences.protein_goal),
            carbohydrate_goal: format_amount(preferences.carbohydrate_goal),
            fat_goal: format_amount(preferences.fat_goal),
        }
    }

    pub fn validate(&self) -> Result<Preferences, FormErrors> {
        let mut errors = FormErrors::default();
        let vegetarian = yes_no(&mut errors, "vegetarian", &self.vegetarian);
        let calorie_goal = amount(&mut errors, "calorie_goal", &self.calorie_goal);
        let protein_goal = amount(&mut errors, "protein_goal", &self.protein_goal);
        let carbohydrate_goal = amount(&mut errors, "carbohydrate_goal", &self.carbohydrate_goal);
        let fat_goal = amount(&mut errors, "fat_goal", &self.fat_goal);

        errors.into_result(|| Preferences {
            vegetarian,
            allergies: split_allergies(&self.allergies),
            calorie_goal,
            protein_goal,
            carbohydrate_goal,
            fat_goal,
        })
    }
}

// --- accounts ---

#[derive(Debug, Clone, Default, PartialEq, Validate)]
pub struct RegisterForm {
    #[validate(length(min = 1, message = "this field is required"))]
    pub username: String,
    #[validate(email(message = "enter a valid e-mail address"))]
    pub email: String,
    #[validate(length(min = 1, message = "this field is required"))]
    pub password: String,
    pub vegetarian: bool,
    pub allergies: Vec<String>,
    pub calorie_goal: String,
    pub protein_goal: String,
    pub carbohydrate_goal: String,
    pub fat_goal: String,
}

impl RegisterForm {
    pub fn validate_request(&self) -> Result<RegisterRequest, FormErrors> {
        let mut errors = match Validate::validate(self) {
            Ok(()) => FormErrors::default(),
            Err(e) => FormErrors::from(e),
        };
        let defaults = Preferences::default();
        let mut goal = |field: &str, raw: &str, fallback: f64| {
            if raw.trim().is_empty() {
                fallback
            } else {
                amount(&mut errors, field, raw)
            }
        };
        let calorie_goal = goal("calorie_goal", &self.calorie_goal, defaults.calorie_goal);
        let protein_goal = goal("protein_goal", &self.protein_goal, defaults.protein_goal);
        let carbohydrate_goal = goal(
            "carbohydrate_goal",
            &self.carbohydrate_goal,
            defaults.carbohydrate_goal,
        );
        let fat_goal = goal("fat_goal", &self.fat_goal, defaults.fat_goal);

        errors.into_result(|| RegisterRequest {
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            preferences: InitialPreferences {
                vegetarian: self.vegetarian,
                calorie_goal,
                protein_goal,
                carbohydrate_goal,
                fat_goal,
                allergies: self
                    .allergies
                    .iter()
                    .map(|a| a.trim())
                    .filter(|a| !a.is_empty())
                    .map(|a| AllergyName { nom: a.to_string() })
                    .collect(),
            },
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Validate)]
pub struct ProfileForm {
    #[validate(length(min = 1, message = "this field is required"))]
    pub username: String,
    #[validate(email(message = "enter a valid e-mail address"))]
    pub email: String,
    /// Blank keeps the current password.
    #[validate(must_match(other = "password_confirmation", message = "the passwords do not match"))]
    pub password: String,
    pub password_confirmation: String,
}

impl ProfileForm {
    pub fn from_user(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            password: String::new(),
            password_confirmation: String::new(),
        }
    }

    pub fn validate_update(&self) -> Result<UserUpdate, FormErrors> {
        Validate::validate(self)?;
        Ok(UserUpdate {
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
            password: Some(self.password.clone()).filter(|p| !p.is_empty()),
        })
    }
}
