use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Debug;

use crate::planner::slots::{MealSlot, WeeklyPlan};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/";

pub const LOGIN_PATH: &str = "login/";
pub const REGISTER_PATH: &str = "register/";
pub const PREFERENCES_PATH: &str = "preferences/";
pub const CURRENT_USER_PATH: &str = "current-user/";
pub const USERS_PATH: &str = "utilisateurs/";
pub const RECIPES_PATH: &str = "recettes/";
pub const INGREDIENTS_PATH: &str = "ingredients/";
pub const MEALS_PATH: &str = "repas/";
pub const PLAN_PATH: &str = "plan_repas/";

pub const RECIPE_CATEGORIES: &[&str] = &["Entrée", "Plat Principal", "Dessert"];

/// A collection endpoint following the `<collection>/` + `<collection>/<id>/` layout.
pub trait Resource {
    const COLLECTION: &'static str;
    const NAME: &'static str;

    type Record: DeserializeOwned + Clone + Debug;
    /// Body returned by `GET <collection>/`.
    type Listing: DeserializeOwned + Debug;
    /// Body sent on create and update.
    type Payload: Serialize + Debug;

    fn records(listing: &Self::Listing) -> &[Self::Record];
    fn record_id(record: &Self::Record) -> &str;
    fn record_label(record: &Self::Record) -> &str;
}

/// Resources the server accepts `PUT <collection>/<id>/` for.
pub trait Editable: Resource {}

pub fn item_path(collection: &str, id: &str) -> String {
    format!("{}{}/", collection, id)
}

// --- authentication ---

#[derive(Debug, Serialize, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoginUser {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    pub user: LoginUser,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct AllergyName {
    pub nom: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct InitialPreferences {
    #[serde(rename = "est_vegetarien")]
    pub vegetarian: bool,
    #[serde(rename = "objectif_calories")]
    pub calorie_goal: f64,
    #[serde(rename = "objectif_proteines")]
    pub protein_goal: f64,
    #[serde(rename = "objectif_glucides")]
    pub carbohydrate_goal: f64,
    #[serde(rename = "objectif_lipides")]
    pub fat_goal: f64,
    pub allergies: Vec<AllergyName>,
}

#[derive(Debug, Serialize, Clone)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "preferences_alimentaires")]
    pub preferences: InitialPreferences,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegisterResponse {
    pub user: User,
    #[serde(default)]
    pub message: Option<String>,
}

// --- users ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct UserUpdate {
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

// --- preferences ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Preferences {
    #[serde(rename = "est_vegetarien", default)]
    pub vegetarian: bool,
    #[serde(default, deserialize_with = "allergy_list")]
    pub allergies: Vec<String>,
    #[serde(rename = "objectif_calories", default)]
    pub calorie_goal: f64,
    #[serde(rename = "objectif_proteines", default)]
    pub protein_goal: f64,
    #[serde(rename = "objectif_glucides", default)]
    pub carbohydrate_goal: f64,
    #[serde(rename = "objectif_lipides", default)]
    pub fat_goal: f64,
}

impl Default for Preferences {
    // Server-side defaults for a freshly created preference record.
    fn default() -> Self {
        Self {
            vegetarian: false,
            allergies: Vec::new(),
            calorie_goal: 2000.0,
            protein_goal: 50.0,
            carbohydrate_goal: 250.0,
            fat_goal: 70.0,
        }
    }
}

/// Splits a comma-separated allergy string, dropping blanks.
pub fn split_allergies(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect()
}

// The preferences endpoint has been seen answering with either a list or a
// comma-separated string.
fn allergy_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::List(list)) => list,
        Some(Raw::Text(text)) => split_allergies(&text),
        None => Vec::new(),
    })
}

// --- recipes ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Recipe {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "nom")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(rename = "vegetarien", default)]
    pub vegetarian: bool,
    #[serde(rename = "categorie", default)]
    pub category: String,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct RecipePayload {
    #[serde(rename = "nom")]
    pub name: String,
    pub description: String,
    pub instructions: String,
    #[serde(rename = "vegetarien")]
    pub vegetarian: bool,
    #[serde(rename = "categorie")]
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

pub struct Recipes;

impl Resource for Recipes {
    const COLLECTION: &'static str = RECIPES_PATH;
    const NAME: &'static str = "recipe";

    type Record = Recipe;
    type Listing = Vec<Recipe>;
    type Payload = RecipePayload;

    fn records(listing: &Self::Listing) -> &[Self::Record] {
        listing
    }

    fn record_id(record: &Self::Record) -> &str {
        &record.id
    }

    fn record_label(record: &Self::Record) -> &str {
        &record.name
    }
}

impl Editable for Recipes {}

// --- ingredients ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Ingredient {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "nom")]
    pub name: String,
    #[serde(rename = "quantite")]
    pub quantity: f64,
    #[serde(rename = "unite")]
    pub unit: String,
    #[serde(default)]
    pub calories: f64,
    #[serde(rename = "proteines", default)]
    pub protein: f64,
    #[serde(rename = "glucides", default)]
    pub carbohydrates: f64,
    #[serde(rename = "lipides", default)]
    pub fat: f64,
    /// Name of the recipe the ingredient belongs to.
    #[serde(rename = "recette", default)]
    pub recipe: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct NutritionTotals {
    #[serde(default)]
    pub calories: f64,
    #[serde(rename = "proteines", default)]
    pub protein: f64,
    #[serde(rename = "glucides", default)]
    pub carbohydrates: f64,
    #[serde(rename = "lipides", default)]
    pub fat: f64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IngredientListing {
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(rename = "valeurs_nutritionnelles_totales", default)]
    pub totals: NutritionTotals,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct IngredientPayload {
    #[serde(rename = "nom")]
    pub name: String,
    #[serde(rename = "quantite")]
    pub quantity: f64,
    #[serde(rename = "unite")]
    pub unit: String,
    pub calories: f64,
    #[serde(rename = "proteines")]
    pub protein: f64,
    #[serde(rename = "glucides")]
    pub carbohydrates: f64,
    #[serde(rename = "lipides")]
    pub fat: f64,
    #[serde(rename = "recette_id")]
    pub recipe_id: String,
}

pub struct Ingredients;

impl Resource for Ingredients {
    const COLLECTION: &'static str = INGREDIENTS_PATH;
    const NAME: &'static str = "ingredient";

    type Record = Ingredient;
    type Listing = IngredientListing;
    type Payload = IngredientPayload;

    fn records(listing: &Self::Listing) -> &[Self::Record] {
        &listing.ingredients
    }

    fn record_id(record: &Self::Record) -> &str {
        &record.id
    }

    fn record_label(record: &Self::Record) -> &str {
        &record.name
    }
}

impl Editable for Ingredients {}

// --- meals ---

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Meal {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "recette")]
    pub recipe: Recipe,
    pub date: NaiveDate,
    #[serde(rename = "type_repas", with = "crate::planner::slots::meal_type_label")]
    pub slot: MealSlot,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MealPayload {
    #[serde(rename = "recette_id")]
    pub recipe_id: String,
    pub date: NaiveDate,
    #[serde(rename = "type_repas", with = "crate::planner::slots::meal_type_label")]
    pub slot: MealSlot,
}

pub struct Meals;

impl Resource for Meals {
    const COLLECTION: &'static str = MEALS_PATH;
    const NAME: &'static str = "meal";

    type Record = Meal;
    type Listing = Vec<Meal>;
    type Payload = MealPayload;

    fn records(listing: &Self::Listing) -> &[Self::Record] {
        listing
    }

    fn record_id(record: &Self::Record) -> &str {
        &record.id
    }

    fn record_label(record: &Self::Record) -> &str {
        &record.recipe.name
    }
}

// --- plan generation ---

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PlanRequest {
    #[serde(rename = "utilisateur")]
    pub user_id: i64,
    #[serde(rename = "date_debut")]
    pub start: NaiveDate,
    #[serde(rename = "date_fin")]
    pub end: NaiveDate,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PlanResponse {
    #[serde(rename = "repas_par_jour", default)]
    pub meals_by_day: WeeklyPlan,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_preferences_accept_comma_separated_allergies() {
        let prefs: Preferences = serde_json::from_value(json!({
            "est_vegetarien": true,
            "allergies": "arachide,  gluten , ",
            "objectif_calories": 1800.0,
            "objectif_proteines": 60,
            "objectif_glucides": 200,
            "objectif_lipides": 50
        }))
        .unwrap();
        assert!(prefs.vegetarian);
        assert_eq!(prefs.allergies, vec!["arachide", "gluten"]);
        assert_eq!(prefs.protein_goal, 60.0);
    }

    #[test]
    fn test_preferences_accept_null_allergies() {
        let prefs: Preferences = serde_json::from_value(json!({
            "est_vegetarien": false,
            "allergies": null
        }))
        .unwrap();
        assert!(prefs.allergies.is_empty());
        assert_eq!(prefs.calorie_goal, 0.0);
    }

    #[test]
    fn test_ingredient_listing_reads_totals() {
        let listing: IngredientListing = serde_json::from_value(json!({
            "ingredients": [{
                "_id": "65a1", "nom": "Riz", "quantite": 200.0, "unite": "g",
                "calories": 260.0, "proteines": 5.4, "glucides": 56.0, "lipides": 0.6,
                "recette": "Risotto"
            }],
            "valeurs_nutritionnelles_totales": {
                "calories": 260.0, "proteines": 5.4, "glucides": 56.0, "lipides": 0.6
            }
        }))
        .unwrap();
        assert_eq!(Ingredients::records(&listing).len(), 1);
        assert_eq!(listing.ingredients[0].recipe.as_deref(), Some("Risotto"));
        assert_eq!(listing.totals.carbohydrates, 56.0);
    }

    #[test]
    fn test_meal_payload_uses_type_repas_label() {
        let payload = MealPayload {
            recipe_id: "65b2".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            slot: MealSlot::Breakfast,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            json!({"recette_id": "65b2", "date": "2024-03-04", "type_repas": "Petit-déjeuner"})
        );
    }

    #[test]
    fn test_plan_request_field_names() {
        let request = PlanRequest {
            user_id: 7,
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 7).unwrap(),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"utilisateur": 7, "date_debut": "2024-01-01", "date_fin": "2024-01-07"})
        );
    }

    #[test]
    fn test_user_update_omits_missing_password() {
        let update = UserUpdate {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: None,
        };
        let value = serde_json::to_value(&update).unwrap();
        assert!(value.get("password").is_none());
    }

    #[test]
    fn test_item_path() {
        assert_eq!(item_path(RECIPES_PATH, "abc"), "recettes/abc/");
    }
}
