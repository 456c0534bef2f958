use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::forms::{IngredientForm, MealForm, PreferenceForm, ProfileForm, RecipeForm};
use crate::planner::MealSlot;

#[derive(Parser, Debug)]
#[command(author, version, about = "Plan a week of meals against the meal planning API", long_about = None)]
pub struct Cli {
    /// Base URL of the API (overrides MEAL_PLANNER_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Session file location (overrides MEAL_PLANNER_SESSION_FILE)
    #[arg(long, global = true)]
    pub session_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and remember the session
    Login {
        #[arg(short, long)]
        username: String,
        /// Prompted for when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Create an account with initial dietary preferences
    Register(RegisterArgs),
    /// Show who the stored session belongs to
    Whoami,
    /// Generate a meal plan (defaults to next Monday through Sunday)
    Plan {
        /// First day, YYYY-MM-DD
        #[arg(long, requires = "end")]
        start: Option<String>,
        /// Last day, YYYY-MM-DD
        #[arg(long, requires = "start")]
        end: Option<String>,
    },
    #[command(subcommand)]
    Preferences(PreferencesAction),
    #[command(subcommand)]
    Ingredients(IngredientsAction),
    #[command(subcommand)]
    Recipes(RecipesAction),
    #[command(subcommand)]
    Meals(MealsAction),
    #[command(subcommand)]
    Profile(ProfileAction),
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    #[arg(short, long)]
    pub username: String,
    #[arg(short, long)]
    pub email: String,
    #[arg(short, long)]
    pub password: Option<String>,
    #[arg(long)]
    pub vegetarian: bool,
    /// Comma-separated
    #[arg(long, value_delimiter = ',')]
    pub allergies: Vec<String>,
    #[arg(long)]
    pub calories: Option<String>,
    #[arg(long)]
    pub protein: Option<String>,
    #[arg(long)]
    pub carbohydrates: Option<String>,
    #[arg(long)]
    pub fat: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum PreferencesAction {
    Show,
    /// Change the given fields, keep the rest
    Edit(PreferenceArgs),
}

#[derive(Args, Debug, Default)]
pub struct PreferenceArgs {
    /// yes or no
    #[arg(long)]
    pub vegetarian: Option<String>,
    /// Comma-separated; an empty string clears them
    #[arg(long)]
    pub allergies: Option<String>,
    #[arg(long)]
    pub calories: Option<String>,
    #[arg(long)]
    pub protein: Option<String>,
    #[arg(long)]
    pub carbohydrates: Option<String>,
    #[arg(long)]
    pub fat: Option<String>,
}

impl PreferenceArgs {
    pub fn apply(self, form: &mut PreferenceForm) {
        set(&mut form.vegetarian, self.vegetarian);
        set(&mut form.allergies, self.allergies);
        set(&mut form.calorie_goal, self.calories);
        set(&mut form.protein_goal, self.protein);
        set(&mut form.carbohydrate_goal, self.carbohydrates);
        set(&mut form.fat_goal, self.fat);
    }
}

#[derive(Subcommand, Debug)]
pub enum IngredientsAction {
    List,
    Add(IngredientArgs),
    Edit {
        id: String,
        #[command(flatten)]
        fields: IngredientArgs,
    },
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Args, Debug, Default)]
pub struct IngredientArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub quantity: Option<String>,
    #[arg(long)]
    pub unit: Option<String>,
    #[arg(long)]
    pub calories: Option<String>,
    #[arg(long)]
    pub protein: Option<String>,
    #[arg(long)]
    pub carbohydrates: Option<String>,
    #[arg(long)]
    pub fat: Option<String>,
    /// Id of the recipe the ingredient belongs to
    #[arg(long)]
    pub recipe: Option<String>,
}

impl IngredientArgs {
    pub fn apply(self, form: &mut IngredientForm) {
        set(&mut form.name, self.name);
        set(&mut form.quantity, self.quantity);
        set(&mut form.unit, self.unit);
        set(&mut form.calories, self.calories);
        set(&mut form.protein, self.protein);
        set(&mut form.carbohydrates, self.carbohydrates);
        set(&mut form.fat, self.fat);
        set(&mut form.recipe_id, self.recipe);
    }
}

#[derive(Subcommand, Debug)]
pub enum RecipesAction {
    List,
    Show {
        id: String,
    },
    Add(RecipeArgs),
    Edit {
        id: String,
        #[command(flatten)]
        fields: RecipeArgs,
    },
    Delete {
        id: String,
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Args, Debug, Default)]
pub struct RecipeArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub instructions: Option<String>,
    #[arg(long)]
    pub vegetarian: Option<bool>,
    /// Entrée, Plat Principal or Dessert
    #[arg(long)]
    pub category: Option<String>,
    /// Image URL or data URI
    #[arg(long)]
    pub image: Option<String>,
}

impl RecipeArgs {
    pub fn apply(self, form: &mut RecipeForm) {
        set(&mut form.name, self.name);
        set(&mut form.description, self.description);
        set(&mut form.instructions, self.instructions);
        set(&mut form.category, self.category);
        if let Some(vegetarian) = self.vegetarian {
            form.vegetarian = vegetarian;
        }
        if self.image.is_some() {
            form.image = self.image;
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum MealsAction {
    List,
    Add {
        /// Recipe id
        #[arg(long)]
        recipe: Option<String>,
        /// YYYY-MM-DD, today when omitted
        #[arg(long)]
        date: Option<String>,
        /// breakfast, lunch or dinner
        #[arg(long, default_value = "breakfast")]
        slot: MealSlot,
    },
    Delete {
        id: String,
        #[arg(short, long)]
        yes: bool,
    },
}

impl MealsAction {
    pub fn meal_form(recipe: Option<String>, date: Option<String>, slot: MealSlot) -> MealForm {
        let mut form = MealForm {
            slot,
            ..MealForm::default()
        };
        set(&mut form.recipe_id, recipe);
        set(&mut form.date, date);
        form
    }
}

#[derive(Subcommand, Debug)]
pub enum ProfileAction {
    Show,
    Update {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// Left unchanged when omitted
        #[arg(long)]
        password: Option<String>,
        /// Prompted for when a new password is given without it
        #[arg(long, requires = "password")]
        password_confirmation: Option<String>,
    },
}

impl ProfileAction {
    pub fn apply(
        form: &mut ProfileForm,
        username: Option<String>,
        email: Option<String>,
        password: Option<String>,
        password_confirmation: Option<String>,
    ) {
        set(&mut form.username, username);
        set(&mut form.email, email);
        set(&mut form.password, password);
        set(&mut form.password_confirmation, password_confirmation);
    }
}

fn set(field: &mut String, value: Option<String>) {
    if let Some(value) = value {
        *field = value;
    }
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_plan_requires_both_bounds() {
        assert!(Cli::try_parse_from(["meal_planner", "plan", "--start", "2024-01-01"]).is_err());
        let cli = Cli::try_parse_from([
            "meal_planner", "plan", "--start", "2024-01-01", "--end", "2024-01-07",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Plan { start: Some(_), end: Some(_) }));
    }

    #[test]
    fn test_meal_slot_flag() {
        let cli = Cli::try_parse_from(["meal_planner", "meals", "add", "--recipe", "r1", "--slot", "diner"])
            .unwrap();
        match cli.command {
            Command::Meals(MealsAction::Add { slot, .. }) => assert_eq!(slot, MealSlot::Dinner),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_profile_confirmation_needs_password() {
        assert!(Cli::try_parse_from([
            "meal_planner", "profile", "update", "--password-confirmation", "x",
        ])
        .is_err());

        let mut form = ProfileForm::default();
        ProfileAction::apply(&mut form, None, None, Some("a".to_string()), Some("b".to_string()));
        assert_eq!(form.password, "a");
        assert_eq!(form.password_confirmation, "b");
    }

    #[test]
    fn test_ingredient_args_only_touch_given_fields() {
        let mut form = IngredientForm {
            name: "Riz".to_string(),
            unit: "g".to_string(),
            ..Default::default()
        };
        IngredientArgs {
            quantity: Some("150".to_string()),
            ..Default::default()
        }
        .apply(&mut form);
        assert_eq!(form.name, "Riz");
        assert_eq!(form.quantity, "150");
    }
}
