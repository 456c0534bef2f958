use anyhow::{bail, Context, Result};
use chrono::Local;
use std::process::ExitCode;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

use meal_planner::api_connection::endpoints::{Ingredient, Meal, Recipe};
use meal_planner::api_connection::{ApiClient, ApiConnectionError, Ingredients, Meals, Recipes, Resource};
use meal_planner::cli::{
    parse_args, Cli, Command, IngredientsAction, MealsAction, PreferencesAction, ProfileAction,
    RecipesAction, RegisterArgs,
};
use meal_planner::config::Settings;
use meal_planner::flows::{FlowError, ListFlow, PreferenceFlow, ProfileFlow};
use meal_planner::forms::{FormErrors, IngredientForm, ProfileForm, RecipeForm, RegisterForm};
use meal_planner::logging::init_logging;
use meal_planner::planner::{DateRange, PlanError, PlanSynchronizer};
use meal_planner::render;
use meal_planner::session::SessionStore;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();

    let cli = parse_args();
    let settings = Settings::from_env()?.with_overrides(cli.api_url.clone(), cli.session_file.clone());
    init_logging(&settings.log_level)?;

    match run(cli, &settings).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            report(&e);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(cli: Cli, settings: &Settings) -> Result<()> {
    let store = SessionStore::new(&settings.session_file);

    match cli.command {
        Command::Login { username, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt("Password: ").await?,
            };
            let mut client = ApiClient::with_timeout(&settings.api_url, settings.timeout, None)?;
            let session = client.login(&username, &password).await?.clone();
            store.save(&session).await?;
            println!("Logged in as {}.", session.username);
        }
        Command::Logout => match store.logout().await? {
            Some(session) => println!("Logged out {}.", session.username),
            None => println!("Nobody is logged in."),
        },
        Command::Register(args) => register(args, settings).await?,
        Command::Whoami => match store.load().await? {
            Some(session) => println!("{}", session.username),
            None => println!("Nobody is logged in."),
        },
        Command::Plan { start, end } => {
            let client = authenticated(settings, &store).await?;
            let synchronizer = PlanSynchronizer::for_current_user(client).await?;
            let range = match (start, end) {
                (Some(start), Some(end)) => synchronizer.generate(&start, &end).await?,
                _ => {
                    let week = DateRange::default_week(Local::now().date_naive());
                    synchronizer.generate_range(week).await?
                }
            };
            println!("Meal plan for {}\n", range);
            print!("{}", render::plan_grid(&synchronizer.plan(), &range));
        }
        Command::Preferences(action) => {
            let mut flow = PreferenceFlow::new(authenticated(settings, &store).await?);
            flow.load().await?;
            if let PreferencesAction::Edit(fields) = action {
                fields.apply(flow.begin_edit()?);
                flow.save().await?;
                println!("Preferences saved.");
            }
            if let Some(saved) = flow.saved() {
                print!("{}", render::preferences(saved));
            }
        }
        Command::Ingredients(action) => ingredients(action, authenticated(settings, &store).await?).await?,
        Command::Recipes(action) => recipes(action, authenticated(settings, &store).await?).await?,
        Command::Meals(action) => meals(action, authenticated(settings, &store).await?).await?,
        Command::Profile(action) => {
            let mut flow = ProfileFlow::new(authenticated(settings, &store).await?);
            let user = flow.load().await?.clone();
            if let ProfileAction::Update {
                username,
                email,
                password,
                password_confirmation,
            } = action
            {
                let password_confirmation = match (&password, password_confirmation) {
                    (Some(_), None) => Some(prompt("Confirm new password: ").await?),
                    (_, confirmation) => confirmation,
                };
                let mut form = ProfileForm::from_user(&user);
                ProfileAction::apply(&mut form, username, email, password, password_confirmation);
                flow.update(&form).await?;
                println!("Profile updated.");
            }
            if let Some(user) = flow.user() {
                print!("{}", render::user(user));
            }
        }
    }
    Ok(())
}

async fn register(args: RegisterArgs, settings: &Settings) -> Result<()> {
    let password = match args.password {
        Some(p) => p,
        None => prompt("Password: ").await?,
    };
    let form = RegisterForm {
        username: args.username,
        email: args.email,
        password,
        vegetarian: args.vegetarian,
        allergies: args.allergies,
        calorie_goal: args.calories.unwrap_or_default(),
        protein_goal: args.protein.unwrap_or_default(),
        carbohydrate_goal: args.carbohydrates.unwrap_or_default(),
        fat_goal: args.fat.unwrap_or_default(),
    };
    let request = form.validate_request()?;
    let client = ApiClient::with_timeout(&settings.api_url, settings.timeout, None)?;
    let response = client.register(&request).await?;
    match response.message {
        Some(message) => println!("{}", message),
        None => println!("Account '{}' created. You can now log in.", response.user.username),
    }
    Ok(())
}

async fn ingredients(action: IngredientsAction, client: ApiClient) -> Result<()> {
    let mut flow = ListFlow::<Ingredients>::new(client);
    let listing = match action {
        IngredientsAction::List => flow.load().await?,
        IngredientsAction::Add(fields) => {
            let mut form = IngredientForm::default();
            fields.apply(&mut form);
            flow.create(&form.validate_new()?).await?
        }
        IngredientsAction::Edit { id, fields } => {
            let record: Ingredient = find_record(&mut flow, &id).await?;
            let mut form = IngredientForm::from_record(&record);
            fields.apply(&mut form);
            flow.update(&id, &form.validate_edit()?).await?
        }
        IngredientsAction::Delete { id, yes } => delete_record(&mut flow, &id, yes).await?,
    };
    print!("{}", render::ingredients(listing));
    Ok(())
}

async fn recipes(action: RecipesAction, client: ApiClient) -> Result<()> {
    if let RecipesAction::Show { id } = &action {
        let recipe = client.fetch::<Recipes>(id).await?;
        print!("{}", render::recipe_detail(&recipe));
        return Ok(());
    }

    let mut flow = ListFlow::<Recipes>::new(client);
    let listing = match action {
        RecipesAction::Show { .. } | RecipesAction::List => flow.load().await?,
        RecipesAction::Add(fields) => {
            let mut form = RecipeForm::default();
            fields.apply(&mut form);
            flow.create(&form.validate()?).await?
        }
        RecipesAction::Edit { id, fields } => {
            let record: Recipe = find_record(&mut flow, &id).await?;
            let mut form = RecipeForm::from_record(&record);
            fields.apply(&mut form);
            flow.update(&id, &form.validate()?).await?
        }
        RecipesAction::Delete { id, yes } => delete_record(&mut flow, &id, yes).await?,
    };
    print!("{}", render::recipes(listing));
    Ok(())
}

async fn meals(action: MealsAction, client: ApiClient) -> Result<()> {
    let mut flow = ListFlow::<Meals>::new(client);
    let listing: &Vec<Meal> = match action {
        MealsAction::List => flow.load().await?,
        MealsAction::Add { recipe, date, slot } => {
            let form = MealsAction::meal_form(recipe, date, slot);
            flow.create(&form.validate()?).await?
        }
        MealsAction::Delete { id, yes } => delete_record(&mut flow, &id, yes).await?,
    };
    print!("{}", render::meals(listing));
    Ok(())
}

async fn find_record<R: Resource>(flow: &mut ListFlow<R>, id: &str) -> Result<R::Record> {
    flow.load().await?;
    let record = flow.find(id).cloned().ok_or_else(|| FlowError::NotFound {
        kind: R::NAME,
        id: id.to_string(),
    })?;
    Ok(record)
}

async fn delete_record<'a, R: Resource>(
    flow: &'a mut ListFlow<R>,
    id: &str,
    yes: bool,
) -> Result<&'a R::Listing> {
    let record = find_record(flow, id).await?;
    let confirmed = yes
        || confirm(&format!("Delete {} '{}'? [y/N] ", R::NAME, R::record_label(&record))).await?;

    let listing = flow.delete(id, |_| confirmed).await?;
    println!("Deleted {} '{}'.", R::NAME, R::record_label(&record));
    Ok(listing)
}

async fn client_for(settings: &Settings, store: &SessionStore) -> Result<ApiClient> {
    let session = store.load().await?;
    ApiClient::with_timeout(&settings.api_url, settings.timeout, session)
        .with_context(|| format!("Failed to set up a client for '{}'", settings.api_url))
}

async fn authenticated(settings: &Settings, store: &SessionStore) -> Result<ApiClient> {
    let client = client_for(settings, store).await?;
    if !client.is_authenticated() {
        return Err(ApiConnectionError::NotAuthenticated.into());
    }
    Ok(client)
}

async fn prompt(question: &str) -> Result<String> {
    let mut stdout = io::stdout();
    stdout.write_all(question.as_bytes()).await?;
    stdout.flush().await?;

    let mut line = String::new();
    let read = BufReader::new(io::stdin()).read_line(&mut line).await?;
    if read == 0 {
        bail!("no input");
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn confirm(question: &str) -> Result<bool> {
    let answer = prompt(question).await?;
    Ok(matches!(
        answer.trim().to_lowercase().as_str(),
        "y" | "yes" | "o" | "oui"
    ))
}

fn report(err: &anyhow::Error) {
    if let Some(FlowError::Cancelled) = err.downcast_ref::<FlowError>() {
        eprintln!("Nothing deleted.");
        return;
    }

    let fields = err.downcast_ref::<FormErrors>().or_else(|| match err.downcast_ref::<FlowError>() {
        Some(FlowError::Invalid(fields)) => Some(fields),
        _ => None,
    });
    if let Some(fields) = fields {
        eprint!("Please fix the following:\n{}", render::form_errors(fields));
        return;
    }

    let message = if let Some(e) = err.downcast_ref::<FlowError>() {
        e.user_message()
    } else if let Some(e) = err.downcast_ref::<PlanError>() {
        e.user_message()
    } else if let Some(e) = err.downcast_ref::<ApiConnectionError>() {
        e.user_message()
    } else {
        format!("{:#}", err)
    };
    tracing::debug!(error = ?err, "command failed");
    eprintln!("{}", message);
}
