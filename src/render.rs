//! Plain-text views for the terminal.

use std::fmt::Write;

use crate::api_connection::endpoints::{IngredientListing, Meal, NutritionTotals, Preferences, Recipe, User};
use crate::forms::FormErrors;
use crate::planner::{DateRange, MealSlot, WeeklyPlan};

pub const EMPTY_SLOT: &str = "No meal planned";

/// One block per day of `range`, one line per slot.
pub fn plan_grid(plan: &WeeklyPlan, range: &DateRange) -> String {
    let mut out = String::new();
    for date in range {
        let _ = writeln!(out, "{}", date.format("%A %Y-%m-%d"));
        let day = plan.day(date);
        for slot in MealSlot::ALL {
            let line = match day.and_then(|d| d.get(slot)) {
                Some(meal) => match meal.image() {
                    Some(url) => format!("{} [{}]", meal.recipe_name, url),
                    None => meal.recipe_name.clone(),
                },
                None => EMPTY_SLOT.to_string(),
            };
            let _ = writeln!(out, "  {:<10} {}", format!("{}:", slot), line);
        }
    }
    out
}

fn totals_line(totals: &NutritionTotals) -> String {
    format!(
        "{:.0} kcal, protein {:.1} g, carbohydrates {:.1} g, fat {:.1} g",
        totals.calories, totals.protein, totals.carbohydrates, totals.fat
    )
}

pub fn ingredients(listing: &IngredientListing) -> String {
    if listing.ingredients.is_empty() {
        return "No ingredients.\n".to_string();
    }
    let mut out = String::new();
    for ingredient in &listing.ingredients {
        let _ = write!(
            out,
            "{}  {} {} {}  ({:.0} kcal, P {:.1} / C {:.1} / F {:.1})",
            ingredient.id,
            ingredient.name,
            ingredient.quantity,
            ingredient.unit,
            ingredient.calories,
            ingredient.protein,
            ingredient.carbohydrates,
            ingredient.fat
        );
        if let Some(recipe) = ingredient.recipe.as_deref() {
            let _ = write!(out, "  in {}", recipe);
        }
        out.push('\n');
    }
    let _ = writeln!(out, "Total: {}", totals_line(&listing.totals));
    out
}

pub fn recipes(recipes: &[Recipe]) -> String {
    if recipes.is_empty() {
        return "No recipes.\n".to_string();
    }
    recipes
        .iter()
        .map(|r| {
            format!(
                "{}  {} ({}{})\n",
                r.id,
                r.name,
                r.category,
                if r.vegetarian { ", vegetarian" } else { "" }
            )
        })
        .collect()
}

pub fn recipe_detail(recipe: &Recipe) -> String {
    let mut out = format!("{}\n", recipe.name);
    let _ = writeln!(out, "Category: {}", recipe.category);
    let _ = writeln!(out, "Vegetarian: {}", if recipe.vegetarian { "yes" } else { "no" });
    if let Some(image) = recipe.image.as_deref().filter(|i| !i.is_empty()) {
        let _ = writeln!(out, "Image: {}", image);
    }
    let _ = writeln!(out, "\n{}\n\n{}", recipe.description, recipe.instructions);
    out
}

pub fn meals(meals: &[Meal]) -> String {
    if meals.is_empty() {
        return "No meals.\n".to_string();
    }
    let mut sorted: Vec<&Meal> = meals.iter().collect();
    sorted.sort_by_key(|m| (m.date, m.slot));
    sorted
        .into_iter()
        .map(|m| format!("{}  {} {:<9} {}\n", m.id, m.date, m.slot, m.recipe.name))
        .collect()
}

pub fn preferences(prefs: &Preferences) -> String {
    let allergies = if prefs.allergies.is_empty() {
        "none".to_string()
    } else {
        prefs.allergies.join(", ")
    };
    format!(
        "Vegetarian: {}\nAllergies: {}\nDaily goals: {} kcal, protein {} g, carbohydrates {} g, fat {} g\n",
        if prefs.vegetarian { "yes" } else { "no" },
        allergies,
        prefs.calorie_goal,
        prefs.protein_goal,
        prefs.carbohydrate_goal,
        prefs.fat_goal
    )
}

pub fn user(user: &User) -> String {
    format!("{} <{}> (id {})\n", user.username, user.email, user.id)
}

pub fn form_errors(errors: &FormErrors) -> String {
    errors
        .fields()
        .map(|(field, message)| format!("  {}: {}\n", field, message))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_grid_marks_empty_slots() {
        let plan: WeeklyPlan = serde_json::from_value(json!({
            "2024-01-01": { "petit_dejeuner": { "nom": "Pancakes" } }
        }))
        .unwrap();
        let range = DateRange::parse("2024-01-01", "2024-01-02").unwrap();
        let grid = plan_grid(&plan, &range);

        assert!(grid.starts_with("Monday 2024-01-01\n"));
        assert!(grid.contains("Breakfast: Pancakes"));
        assert!(grid.contains("Tuesday 2024-01-02"));
        assert_eq!(grid.matches(EMPTY_SLOT).count(), 5);
    }

    #[test]
    fn test_ingredients_show_totals() {
        let listing: IngredientListing = serde_json::from_value(json!({
            "ingredients": [{"_id": "1", "nom": "Riz", "quantite": 200, "unite": "g", "calories": 260}],
            "valeurs_nutritionnelles_totales": {"calories": 260, "proteines": 5.4, "glucides": 56, "lipides": 0.6}
        }))
        .unwrap();
        let text = ingredients(&listing);
        assert!(text.contains("Riz 200 g"));
        assert!(text.contains("Total: 260 kcal, protein 5.4 g"));
    }

    #[test]
    fn test_preferences_without_allergies() {
        let text = preferences(&Preferences::default());
        assert!(text.contains("Allergies: none"));
        assert!(text.contains("2000 kcal"));
    }
}
