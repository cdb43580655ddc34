use crate::common::*;

use evently::db::queries::EventFilter;
use evently::error::AppError;

#[test]
fn test_create_event_requires_organizer() {
    let conn = setup_test_db();
    let err = queries::create_event(&conn, "missing", &event_input("Orphan Event")).unwrap_err();
    match err {
        AppError::NotFound(msg) => assert_eq!(msg, "Organizer not found"),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[test]
fn test_create_event_requires_existing_category() {
    let conn = setup_test_db();
    let user = create_test_user(&conn, "org", "Grace", "Hopper");
    let mut input = event_input("Bad Category");
    input.category_id = Some("nope".into());
    let err = queries::create_event(&conn, &user.id, &input).unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[test]
fn test_create_event_validates_input() {
    let conn = setup_test_db();
    let user = create_test_user(&conn, "org", "Grace", "Hopper");
    let mut input = event_input("Bad Price");
    input.price = "free".into();
    assert!(matches!(
        queries::create_event(&conn, &user.id, &input),
        Err(AppError::BadRequest(_))
    ));
}

#[test]
fn test_free_event_stores_empty_price() {
    let conn = setup_test_db();
    let user = create_test_user(&conn, "org", "Grace", "Hopper");
    let mut input = event_input("Free Meetup");
    input.is_free = true;
    input.price = "10.00".into();
    let event = queries::create_event(&conn, &user.id, &input).unwrap();
    assert!(event.is_free);
    assert_eq!(event.price, "");
}

#[test]
fn test_get_event_populates_relations() {
    let conn = setup_test_db();
    let user = create_test_user(&conn, "org", "Grace", "Hopper");
    let category = create_test_category(&conn, "Tech");
    let event = create_test_event(&conn, &user.id, "Compilers Night", Some(&category.id));

    let details = queries::get_event_by_id(&conn, &event.id).unwrap().unwrap();
    assert_eq!(details.event.title, "Compilers Night");

    let organizer = details.organizer.unwrap();
    assert_eq!(organizer.id, user.id);
    assert_eq!(organizer.first_name.as_deref(), Some("Grace"));

    let cat = details.category.unwrap();
    assert_eq!(cat.name, "Tech");

    assert!(queries::get_event_by_id(&conn, "missing").unwrap().is_none());
}

#[test]
fn test_list_events_newest_first_with_total() {
    let conn = setup_test_db();
    let user = create_test_user(&conn, "org", "Grace", "Hopper");
    for i in 0..8 {
        create_test_event(&conn, &user.id, &format!("Event number {}", i), None);
    }

    let (page1, total) = queries::list_events(&conn, &EventFilter::default(), 6, 0).unwrap();
    assert_eq!(total, 8);
    assert_eq!(page1.len(), 6);
    assert_eq!(page1[0].event.title, "Event number 7");

    let (page2, _) = queries::list_events(&conn, &EventFilter::default(), 6, 6).unwrap();
    assert_eq!(page2.len(), 2);
    assert_eq!(page2[1].event.title, "Event number 0");
}

#[test]
fn test_list_events_title_search() {
    let conn = setup_test_db();
    let user = create_test_user(&conn, "org", "Grace", "Hopper");
    create_test_event(&conn, &user.id, "Rust Meetup", None);
    create_test_event(&conn, &user.id, "Jazz Night", None);
    create_test_event(&conn, &user.id, "100% Rust", None);

    let filter = EventFilter {
        query: Some("rust".into()),
        category: None,
    };
    let (events, total) = queries::list_events(&conn, &filter, 6, 0).unwrap();
    assert_eq!(total, 2);
    assert!(events.iter().all(|e| e.event.title.contains("Rust")));

    // Wildcards are literal
    let filter = EventFilter {
        query: Some("100%".into()),
        category: None,
    };
    let (events, _) = queries::list_events(&conn, &filter, 6, 0).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event.title, "100% Rust");
}

#[test]
fn test_list_events_category_filter() {
    let conn = setup_test_db();
    let user = create_test_user(&conn, "org", "Grace", "Hopper");
    let music = create_test_category(&conn, "Music");
    let tech = create_test_category(&conn, "Tech");
    create_test_event(&conn, &user.id, "Jazz Night", Some(&music.id));
    create_test_event(&conn, &user.id, "Rust Meetup", Some(&tech.id));
    create_test_event(&conn, &user.id, "Go Meetup", Some(&tech.id));

    let filter = EventFilter {
        query: None,
        category: Some("tech".into()),
    };
    let (events, total) = queries::list_events(&conn, &filter, 6, 0).unwrap();
    assert_eq!(total, 2);
    assert!(events.iter().all(|e| e.category.as_ref().unwrap().name == "Tech"));

    // Combined with a title search
    let filter = EventFilter {
        query: Some("rust".into()),
        category: Some("Tech".into()),
    };
    let (_, total) = queries::list_events(&conn, &filter, 6, 0).unwrap();
    assert_eq!(total, 1);
}

#[test]
fn test_list_events_unknown_category_is_empty() {
    let conn = setup_test_db();
    let user = create_test_user(&conn, "org", "Grace", "Hopper");
    create_test_event(&conn, &user.id, "Jazz Night", None);

    let filter = EventFilter {
        query: None,
        category: Some("Nonexistent".into()),
    };
    let (events, total) = queries::list_events(&conn, &filter, 6, 0).unwrap();
    assert!(events.is_empty());
    assert_eq!(total, 0);
}

#[test]
fn test_update_event_by_organizer() {
    let conn = setup_test_db();
    let user = create_test_user(&conn, "org", "Grace", "Hopper");
    let category = create_test_category(&conn, "Tech");
    let event = create_test_event(&conn, &user.id, "Compilers Night", Some(&category.id));

    let updated = queries::update_event(
        &conn,
        &user.id,
        &event.id,
        &UpdateEvent {
            title: Some("Compilers Evening".into()),
            category_id: Some(None),
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(updated.event.title, "Compilers Evening");
    assert_eq!(updated.event.location, event.location);
    assert!(updated.event.category_id.is_none());
    assert!(updated.category.is_none());
}

#[test]
fn test_update_event_rejects_invalid_merge() {
    let conn = setup_test_db();
    let user = create_test_user(&conn, "org", "Grace", "Hopper");
    let event = create_test_event(&conn, &user.id, "Compilers Night", None);

    // End moved before the stored start
    let err = queries::update_event(
        &conn,
        &user.id,
        &event.id,
        &UpdateEvent {
            end_date_time: Some(event.start_date_time - 1),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[test]
fn test_update_event_authorization() {
    let conn = setup_test_db();
    let owner = create_test_user(&conn, "org", "Grace", "Hopper");
    let intruder = create_test_user(&conn, "intruder", "Eve", "Hacker");
    let event = create_test_event(&conn, &owner.id, "Compilers Night", None);

    let update = UpdateEvent {
        title: Some("Hijacked".into()),
        ..Default::default()
    };

    let err = queries::update_event(&conn, &intruder.id, &event.id, &update).unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = queries::update_event(&conn, &owner.id, "missing", &update).unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let stored = queries::get_event(&conn, &event.id).unwrap().unwrap();
    assert_eq!(stored.title, "Compilers Night");
}

#[test]
fn test_delete_event() {
    let conn = setup_test_db();
    let owner = create_test_user(&conn, "org", "Grace", "Hopper");
    let intruder = create_test_user(&conn, "intruder", "Eve", "Hacker");
    let event = create_test_event(&conn, &owner.id, "Compilers Night", None);

    assert!(matches!(
        queries::delete_event(&conn, &intruder.id, &event.id),
        Err(AppError::Forbidden(_))
    ));

    let deleted = queries::delete_event(&conn, &owner.id, &event.id).unwrap();
    assert_eq!(deleted.id, event.id);
    assert!(queries::get_event(&conn, &event.id).unwrap().is_none());

    assert!(matches!(
        queries::delete_event(&conn, &owner.id, &event.id),
        Err(AppError::NotFound(_))
    ));
}

#[test]
fn test_delete_event_with_orders_refused() {
    let conn = setup_test_db();
    let owner = create_test_user(&conn, "org", "Grace", "Hopper");
    let buyer = create_test_user(&conn, "buyer", "Alan", "Turing");
    let event = create_test_event(&conn, &owner.id, "Compilers Night", None);
    create_test_order(&conn, "cs_1", &event.id, Some(&buyer.id));

    let err = queries::delete_event(&conn, &owner.id, &event.id).unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert!(queries::get_event(&conn, &event.id).unwrap().is_some());
}

#[test]
fn test_list_events_by_organizer() {
    let conn = setup_test_db();
    let grace = create_test_user(&conn, "grace", "Grace", "Hopper");
    let alan = create_test_user(&conn, "alan", "Alan", "Turing");
    create_test_event(&conn, &grace.id, "Compilers Night", None);
    create_test_event(&conn, &grace.id, "COBOL Workshop", None);
    create_test_event(&conn, &alan.id, "Turing Talk", None);

    let (events, total) = queries::list_events_by_organizer(&conn, &grace.id, 6, 0).unwrap();
    assert_eq!(total, 2);
    assert_eq!(events[0].event.title, "COBOL Workshop");

    let (events, total) = queries::list_events_by_organizer(&conn, &grace.id, 1, 1).unwrap();
    assert_eq!(total, 2);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event.title, "Compilers Night");
}

#[test]
fn test_list_related_events_excludes_self() {
    let conn = setup_test_db();
    let user = create_test_user(&conn, "org", "Grace", "Hopper");
    let tech = create_test_category(&conn, "Tech");
    let music = create_test_category(&conn, "Music");
    let main = create_test_event(&conn, &user.id, "Rust Meetup", Some(&tech.id));
    create_test_event(&conn, &user.id, "Go Meetup", Some(&tech.id));
    create_test_event(&conn, &user.id, "Zig Meetup", Some(&tech.id));
    create_test_event(&conn, &user.id, "Jazz Night", Some(&music.id));

    let (events, total) = queries::list_related_events(&conn, &tech.id, &main.id, 3, 0).unwrap();
    assert_eq!(total, 2);
    assert!(events.iter().all(|e| e.event.id != main.id));
    assert!(events.iter().all(|e| e.event.category_id.as_deref() == Some(tech.id.as_str())));
}

#[test]
fn test_list_events_title_search_folds_unicode() {
    let conn = setup_test_db();
    let user = create_test_user(&conn, "org", "Grace", "Hopper");
    let event = create_test_event(&conn, &user.id, "ÉTÉ Festival", None);
    create_test_event(&conn, &user.id, "Winter Market", None);

    let search = |query: &str| {
        let filter = EventFilter {
            query: Some(query.into()),
            category: None,
        };
        queries::list_events(&conn, &filter, 6, 0).unwrap()
    };

    let (events, total) = search("été");
    assert_eq!(total, 1);
    assert_eq!(events[0].event.id, event.id);

    // The search key follows title updates
    queries::update_event(
        &conn,
        &user.id,
        &event.id,
        &UpdateEvent {
            title: Some("Øresund Sommer".into()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(search("été").1, 0);
    assert_eq!(search("øresund").1, 1);
}
