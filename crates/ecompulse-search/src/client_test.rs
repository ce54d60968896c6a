use super::*;

fn client(base_url: &str) -> CustomSearchClient {
    CustomSearchClient::with_base_url("secret-key", "engine-1", 5, 0, 0, base_url)
        .expect("client construction should not fail")
}

#[test]
fn search_url_carries_image_query_params() {
    let url = client("https://www.googleapis.com")
        .search_url("Dog Leash & Collar")
        .unwrap();
    assert_eq!(url.path(), "/customsearch/v1");

    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    assert_eq!(
        pairs,
        vec![
            ("key".to_string(), "secret-key".to_string()),
            ("cx".to_string(), "engine-1".to_string()),
            ("q".to_string(), "Dog Leash & Collar".to_string()),
            ("searchType".to_string(), "image".to_string()),
            ("num".to_string(), "1".to_string()),
        ]
    );
}

#[test]
fn search_url_keeps_base_path() {
    let url = client("http://127.0.0.1:9999/mock/").search_url("x").unwrap();
    assert_eq!(url.path(), "/mock/customsearch/v1");
}

#[test]
fn invalid_base_url_is_rejected() {
    let result = CustomSearchClient::with_base_url("k", "cx", 5, 0, 0, "::not a url::");
    assert!(matches!(result, Err(SearchError::InvalidBaseUrl { .. })));
}

#[test]
fn first_item_becomes_the_match() {
    let response: SearchResponse = serde_json::from_value(serde_json::json!({
        "items": [
            {
                "link": "https://img.example/a.jpg",
                "title": "Leash A",
                "image": { "contextLink": "https://shop.example/a" }
            },
            { "link": "https://img.example/b.jpg" }
        ]
    }))
    .unwrap();
    let hit = response.first_match().unwrap();
    assert_eq!(hit.image_url, "https://img.example/a.jpg");
    assert_eq!(hit.search_title.as_deref(), Some("Leash A"));
    assert_eq!(hit.search_link.as_deref(), Some("https://shop.example/a"));
}

#[test]
fn missing_context_link_falls_back_to_image_link() {
    let response: SearchResponse = serde_json::from_value(serde_json::json!({
        "items": [ { "link": "https://img.example/a.jpg", "title": "Leash" } ]
    }))
    .unwrap();
    let hit = response.first_match().unwrap();
    assert_eq!(hit.search_link.as_deref(), Some("https://img.example/a.jpg"));
}

#[test]
fn no_items_or_no_link_is_no_match() {
    let empty: SearchResponse =
        serde_json::from_value(serde_json::json!({ "searchInformation": {} })).unwrap();
    assert!(empty.first_match().is_none());

    let linkless: SearchResponse =
        serde_json::from_value(serde_json::json!({ "items": [ { "title": "x" } ] })).unwrap();
    assert!(linkless.first_match().is_none());
}
