use anyhow::Result;

use smm_order_bot::dialogue::{ConversationState, SelectedService, Stage};

fn service() -> SelectedService {
    SelectedService {
        id: 101,
        name: "Instagram Followers [HQ]".to_string(),
        rate_per_thousand: 0.9,
    }
}

/// Test that dialogue states serialize with a stage tag
#[tokio::test]
async fn test_dialogue_state_serialization() -> Result<()> {
    let state = ConversationState::ConfirmOrder {
        platform: "instagram".to_string(),
        category: "followers".to_string(),
        service: service(),
        amount: 500,
        link: "https://instagram.com/someone".to_string(),
    };

    let json = serde_json::to_value(&state)?;
    assert_eq!(json["stage"], "ConfirmOrder");
    assert_eq!(json["service"]["id"], 101);
    assert_eq!(json["amount"], 500);

    let back: ConversationState = serde_json::from_value(json)?;
    assert_eq!(back, state);

    let idle = serde_json::to_string(&ConversationState::Idle)?;
    assert_eq!(idle, r#"{"stage":"Idle"}"#);

    Ok(())
}

/// Accessors only expose fields captured by the current stage
#[tokio::test]
async fn test_fields_follow_stage() -> Result<()> {
    let enter_link = ConversationState::EnterLink {
        platform: "tiktok".to_string(),
        category: "likes".to_string(),
        service: service(),
        amount: 1000,
    };
    assert_eq!(enter_link.stage(), Stage::EnterLink);
    assert_eq!(enter_link.platform(), Some("tiktok"));
    assert_eq!(enter_link.category(), Some("likes"));
    assert_eq!(enter_link.amount(), Some(1000));
    assert_eq!(enter_link.link(), None);
    assert!(enter_link.has_order_details());
    assert!(!enter_link.is_admin_flow());

    let category = ConversationState::SelectCategory {
        platform: "tiktok".to_string(),
    };
    assert_eq!(category.category(), None);
    assert!(category.selected_service().is_none());
    assert!(!category.has_order_details());

    let admin = ConversationState::AdminAwaitingAmount {
        username: "alice".to_string(),
    };
    assert!(admin.is_admin_flow());
    assert_eq!(admin.platform(), None);

    Ok(())
}

#[tokio::test]
async fn test_candidates_only_in_select_service() -> Result<()> {
    let state = ConversationState::SelectService {
        platform: "instagram".to_string(),
        category: "followers".to_string(),
        candidates: vec![service()],
    };
    assert_eq!(state.candidates().len(), 1);
    assert!(ConversationState::SelectPlatform.candidates().is_empty());
    Ok(())
}
