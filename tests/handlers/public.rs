use axum::http::StatusCode;
use tower::ServiceExt;

use crate::common::*;

#[tokio::test]
async fn test_health() {
    let (state, _) = test_state();
    let response = app(state).oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_list_events_paginated() {
    let (state, _) = test_state();
    {
        let conn = state.db.get().unwrap();
        let user = create_test_user(&conn, "org", "Grace", "Hopper");
        for i in 0..7 {
            create_test_event(&conn, &user.id, &format!("Event number {}", i), None);
        }
    }

    let response = app(state.clone()).oneshot(get("/events")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["total"], 7);
    assert_eq!(json["limit"], 6);
    assert_eq!(json["page"], 1);
    assert_eq!(json["total_pages"], 2);
    assert_eq!(json["data"].as_array().unwrap().len(), 6);
    assert_eq!(json["data"][0]["title"], "Event number 6");
    assert_eq!(json["data"][0]["organizer"]["first_name"], "Grace");

    let response = app(state).oneshot(get("/events?page=2")).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_events_filters() {
    let (state, _) = test_state();
    {
        let conn = state.db.get().unwrap();
        let user = create_test_user(&conn, "org", "Grace", "Hopper");
        let music = create_test_category(&conn, "Music");
        create_test_event(&conn, &user.id, "Jazz Night", Some(&music.id));
        create_test_event(&conn, &user.id, "Rust Meetup", None);
    }

    let response = app(state.clone())
        .oneshot(get("/events?query=jazz"))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["total"], 1);
    assert_eq!(json["data"][0]["title"], "Jazz Night");

    let response = app(state.clone())
        .oneshot(get("/events?category=Music"))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["total"], 1);
    assert_eq!(json["data"][0]["category"]["name"], "Music");

    let response = app(state)
        .oneshot(get("/events?category=Unknown"))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["total"], 0);
    assert_eq!(json["total_pages"], 0);
}

#[tokio::test]
async fn test_list_events_bad_page_param() {
    let (state, _) = test_state();
    let response = app(state).oneshot(get("/events?page=abc")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_list_events_huge_page_is_empty() {
    let (state, _) = test_state();
    {
        let conn = state.db.get().unwrap();
        let user = create_test_user(&conn, "org", "Grace", "Hopper");
        create_test_event(&conn, &user.id, "Rust Meetup", None);
    }

    let response = app(state)
        .oneshot(get("/events?page=9223372036854775807"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["total"], 1);
    assert_eq!(json["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_get_event() {
    let (state, _) = test_state();
    let event_id = {
        let conn = state.db.get().unwrap();
        let user = create_test_user(&conn, "org", "Grace", "Hopper");
        create_test_event(&conn, &user.id, "Compilers Night", None).id
    };

    let response = app(state.clone())
        .oneshot(get(&format!("/events/{}", event_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["id"], event_id);
    assert!(json["category"].is_null());

    let response = app(state).oneshot(get("/events/missing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_related_events() {
    let (state, _) = test_state();
    let (main_id, loose_id) = {
        let conn = state.db.get().unwrap();
        let user = create_test_user(&conn, "org", "Grace", "Hopper");
        let tech = create_test_category(&conn, "Tech");
        let main = create_test_event(&conn, &user.id, "Rust Meetup", Some(&tech.id));
        for name in ["Go Meetup", "Zig Meetup", "C Meetup", "Nim Meetup"] {
            create_test_event(&conn, &user.id, name, Some(&tech.id));
        }
        let loose = create_test_event(&conn, &user.id, "Uncategorized", None);
        (main.id, loose.id)
    };

    let response = app(state.clone())
        .oneshot(get(&format!("/events/{}/related", main_id)))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["total"], 4);
    assert_eq!(json["limit"], 3);
    assert_eq!(json["data"].as_array().unwrap().len(), 3);

    let response = app(state)
        .oneshot(get(&format!("/events/{}/related", loose_id)))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["total"], 0);
}

#[tokio::test]
async fn test_user_events() {
    let (state, _) = test_state();
    let user_id = {
        let conn = state.db.get().unwrap();
        let user = create_test_user(&conn, "org", "Grace", "Hopper");
        create_test_event(&conn, &user.id, "Compilers Night", None);
        user.id
    };

    let response = app(state.clone())
        .oneshot(get(&format!("/users/{}/events", user_id)))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["total"], 1);

    let response = app(state).oneshot(get("/users/missing/events")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_categories() {
    let (state, _) = test_state();
    {
        let conn = state.db.get().unwrap();
        create_test_category(&conn, "Tech");
        create_test_category(&conn, "Music");
    }

    let response = app(state).oneshot(get("/categories")).await.unwrap();
    let json = body_json(response).await;
    let names: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Music", "Tech"]);
}
