use chrono::NaiveDate;
use httpmock::prelude::*;
use serde_json::json;
use std::time::Duration;

use meal_planner::api_connection::ApiClient;
use meal_planner::planner::{MealSlot, PlanError, PlanSynchronizer};
use meal_planner::session::Session;

fn session() -> Session {
    Session {
        access_token: "acc-token".to_string(),
        refresh_token: "ref-token".to_string(),
        username: "alice".to_string(),
    }
}

fn client(server: &MockServer, session: Option<Session>) -> ApiClient {
    ApiClient::new(&format!("{}/api/", server.base_url()), session).unwrap()
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[tokio::test]
async fn test_generate_week_commits_server_plan() {
    let server = MockServer::start();
    let plan_mock = server.mock(|when, then| {
        when.method(Method::POST)
            .path("/api/plan_repas/")
            .header("authorization", "Bearer acc-token")
            .json_body(json!({
                "utilisateur": 7,
                "date_debut": "2024-01-01",
                "date_fin": "2024-01-07"
            }));
        then.status(200).json_body(json!({
            "repas_par_jour": {
                "2024-01-01": {
                    "petit_dejeuner": {
                        "id": "r1", "nom": "Porridge", "description": "Oats",
                        "instructions": "Simmer", "categorie": "Plat Principal", "image": null
                    }
                }
            }
        }));
    });

    let sync = PlanSynchronizer::new(client(&server, Some(session())), 7);
    let range = sync.generate("2024-01-01", "2024-01-07").await.unwrap();

    plan_mock.assert_calls(1);
    assert_eq!(range.day_count(), 7);
    assert_eq!(sync.range(), Some(range));

    let breakfast = sync.get(date("2024-01-01"), MealSlot::Breakfast).unwrap();
    assert_eq!(breakfast.recipe_name, "Porridge");
    assert_eq!(breakfast.id.as_deref(), Some("r1"));
    assert!(sync.get(date("2024-01-02"), MealSlot::Breakfast).is_none());
    assert!(sync.get(date("2024-01-01"), MealSlot::Lunch).is_none());
    assert!(!sync.is_busy());
}

#[tokio::test]
async fn test_rejected_ranges_send_nothing() {
    let server = MockServer::start();
    let plan_mock = server.mock(|when, then| {
        when.method(Method::POST).path("/api/plan_repas/");
        then.status(200).json_body(json!({ "repas_par_jour": {} }));
    });

    let sync = PlanSynchronizer::new(client(&server, Some(session())), 7);
    assert!(matches!(
        sync.generate("2024-01-07", "2024-01-01").await,
        Err(PlanError::InvertedRange { .. })
    ));
    assert!(matches!(
        sync.generate("2024-01-01", "2024-02-02").await,
        Err(PlanError::RangeTooLong { days: 32 })
    ));
    assert!(matches!(
        sync.generate("2024-02-30", "2024-03-02").await,
        Err(PlanError::InvalidDate(_))
    ));

    let logged_out = PlanSynchronizer::new(client(&server, None), 7);
    let err = logged_out.generate("2024-01-01", "2024-01-07").await.unwrap_err();
    assert!(matches!(err, PlanError::NotAuthenticated));
    assert!(err.user_message().contains("login"));

    plan_mock.assert_calls(0);
}

#[tokio::test]
async fn test_thirty_one_day_range_is_accepted() {
    let server = MockServer::start();
    let plan_mock = server.mock(|when, then| {
        when.method(Method::POST)
            .path("/api/plan_repas/")
            .json_body(json!({
                "utilisateur": 7,
                "date_debut": "2024-01-01",
                "date_fin": "2024-02-01"
            }));
        then.status(200).json_body(json!({ "repas_par_jour": {} }));
    });

    let sync = PlanSynchronizer::new(client(&server, Some(session())), 7);
    let range = sync.generate("2024-01-01", "2024-02-01").await.unwrap();
    assert_eq!(range.day_count(), 32);
    plan_mock.assert_calls(1);
}

#[tokio::test]
async fn test_failed_generation_keeps_previous_plan() {
    let server = MockServer::start();
    let january = server.mock(|when, then| {
        when.method(Method::POST)
            .path("/api/plan_repas/")
            .json_body(json!({
                "utilisateur": 7,
                "date_debut": "2024-01-01",
                "date_fin": "2024-01-07"
            }));
        then.status(200).json_body(json!({
            "repas_par_jour": { "2024-01-01": { "diner": { "nom": "Soupe" } } }
        }));
    });
    let february = server.mock(|when, then| {
        when.method(Method::POST)
            .path("/api/plan_repas/")
            .json_body(json!({
                "utilisateur": 7,
                "date_debut": "2024-02-01",
                "date_fin": "2024-02-07"
            }));
        then.status(500).json_body(json!({ "error": "Pas assez de recettes" }));
    });

    let sync = PlanSynchronizer::new(client(&server, Some(session())), 7);
    let january_range = sync.generate("2024-01-01", "2024-01-07").await.unwrap();

    let err = sync.generate("2024-02-01", "2024-02-07").await.unwrap_err();
    assert!(matches!(err, PlanError::Api(_)));
    assert_eq!(err.user_message(), "Pas assez de recettes");

    january.assert_calls(1);
    february.assert_calls(1);
    assert_eq!(sync.range(), Some(january_range));
    assert_eq!(
        sync.get(date("2024-01-01"), MealSlot::Dinner).map(|m| m.recipe_name),
        Some("Soupe".to_string())
    );
    assert!(!sync.is_busy());
}

#[tokio::test]
async fn test_second_generation_while_pending_is_busy() {
    let server = MockServer::start();
    let plan_mock = server.mock(|when, then| {
        when.method(Method::POST).path("/api/plan_repas/");
        then.status(200)
            .delay(Duration::from_millis(400))
            .json_body(json!({
                "repas_par_jour": { "2024-01-03": { "dejeuner": { "nom": "Salade" } } }
            }));
    });

    let sync = PlanSynchronizer::new(client(&server, Some(session())), 7);
    let first = sync.generate("2024-01-01", "2024-01-07");
    tokio::pin!(first);

    // One poll takes the in-flight flag and parks on the delayed response.
    tokio::select! {
        biased;
        _ = &mut first => panic!("generation finished before the server answered"),
        _ = std::future::ready(()) => {}
    }
    assert!(sync.is_busy());

    let second = sync.generate("2024-01-01", "2024-01-07").await;
    assert!(matches!(second, Err(PlanError::Busy)));

    first.await.unwrap();
    plan_mock.assert_calls(1);
    assert_eq!(sync.plan().len(), 1);

    // The flag is released once the first request completes.
    assert!(!sync.is_busy());
    sync.generate("2024-01-01", "2024-01-07").await.unwrap();
    plan_mock.assert_calls(2);
}

#[tokio::test]
async fn test_abandoned_generation_releases_busy_flag() {
    let server = MockServer::start();
    let slow = server.mock(|when, then| {
        when.method(Method::POST)
            .path("/api/plan_repas/")
            .json_body(json!({
                "utilisateur": 7,
                "date_debut": "2024-01-01",
                "date_fin": "2024-01-07"
            }));
        then.status(200)
            .delay(Duration::from_secs(5))
            .json_body(json!({
                "repas_par_jour": { "2024-01-01": { "diner": { "nom": "Trop tard" } } }
            }));
    });
    let fast = server.mock(|when, then| {
        when.method(Method::POST)
            .path("/api/plan_repas/")
            .json_body(json!({
                "utilisateur": 7,
                "date_debut": "2024-02-05",
                "date_fin": "2024-02-11"
            }));
        then.status(200).json_body(json!({
            "repas_par_jour": { "2024-02-05": { "dejeuner": { "nom": "Salade" } } }
        }));
    });

    let sync = PlanSynchronizer::new(client(&server, Some(session())), 7);
    let abandoned = tokio::time::timeout(
        Duration::from_millis(200),
        sync.generate("2024-01-01", "2024-01-07"),
    )
    .await;
    assert!(abandoned.is_err());
    assert!(!sync.is_busy());
    assert!(sync.range().is_none());
    assert!(sync.plan().is_empty());

    let range = sync.generate("2024-02-05", "2024-02-11").await.unwrap();
    assert_eq!(sync.range(), Some(range));
    assert_eq!(
        sync.get(date("2024-02-05"), MealSlot::Lunch).map(|m| m.recipe_name),
        Some("Salade".to_string())
    );
    assert!(slow.calls() <= 1);
    fast.assert_calls(1);
}

#[tokio::test]
async fn test_plan_slots_keep_recette_id() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(Method::POST).path("/api/plan_repas/");
        then.status(200).json_body(json!({
            "repas_par_jour": {
                "2024-01-01": { "petit_dejeuner": { "recette_id": "65f0abc", "nom": "Pancakes" } }
            }
        }));
    });

    let sync = PlanSynchronizer::new(client(&server, Some(session())), 7);
    sync.generate("2024-01-01", "2024-01-07").await.unwrap();

    let breakfast = sync.get(date("2024-01-01"), MealSlot::Breakfast).unwrap();
    assert_eq!(breakfast.recipe_name, "Pancakes");
    assert_eq!(breakfast.id.as_deref(), Some("65f0abc"));
}

#[tokio::test]
async fn test_for_current_user_binds_server_user_id() {
    let server = MockServer::start();
    let user_mock = server.mock(|when, then| {
        when.method(Method::GET)
            .path("/api/current-user/")
            .header("authorization", "Bearer acc-token");
        then.status(200)
            .json_body(json!({ "id": 42, "username": "alice", "email": "alice@example.com" }));
    });
    let plan_mock = server.mock(|when, then| {
        when.method(Method::POST)
            .path("/api/plan_repas/")
            .json_body(json!({
                "utilisateur": 42,
                "date_debut": "2024-03-04",
                "date_fin": "2024-03-10"
            }));
        then.status(200).json_body(json!({ "repas_par_jour": {} }));
    });

    let sync = PlanSynchronizer::for_current_user(client(&server, Some(session())))
        .await
        .unwrap();
    assert_eq!(sync.user_id(), 42);

    sync.generate("2024-03-04", "2024-03-10").await.unwrap();
    user_mock.assert_calls(1);
    plan_mock.assert_calls(1);
    assert!(sync.plan().is_empty());
}

#[tokio::test]
async fn test_expired_token_is_reported_as_login_problem() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(Method::POST).path("/api/plan_repas/");
        then.status(401)
            .json_body(json!({ "detail": "Given token not valid for any token type" }));
    });

    let sync = PlanSynchronizer::new(client(&server, Some(session())), 7);
    let err = sync.generate("2024-01-01", "2024-01-07").await.unwrap_err();
    match &err {
        PlanError::Api(api) => assert!(api.is_unauthorized()),
        other => panic!("unexpected error {:?}", other),
    }
    assert!(err.user_message().contains("login"));
    assert!(sync.range().is_none());
}
