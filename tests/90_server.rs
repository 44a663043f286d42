mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use rester::app::AppError;
use rester::manifest::{Manifest, ManifestError, ResourceSpec};

const MANIFEST: &str = r#"
users:
  email: string
resources:
  - name: todos
    owned: true
    schema:
      title: { type: string, required: true }
      done: { type: boolean, default: false }
  - name: posts
    schema:
      title: { type: string, required: true }
"#;

async fn start() -> Result<String> {
    let app = rester::app::router(
        common::store(),
        Manifest::from_yaml(MANIFEST)?,
        common::identity_config(),
        None,
    )
    .await?;
    common::serve(app).await
}

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let base_url = start().await?;

    let res = reqwest::get(format!("{}/health", base_url)).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "memory");
    Ok(())
}

#[tokio::test]
async fn register_login_and_manage_owned_todos() -> Result<()> {
    let base_url = start().await?;
    let client = reqwest::Client::new();
    let credentials = json!({"username": "ann", "password": "pw", "email": "ann@example.com"});

    let res = client.post(format!("{}/auth/register", base_url)).json(&credentials).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let user = res.json::<Value>().await?;
    assert_eq!(user["email"], "ann@example.com");

    let res = client.post(format!("{}/auth/login", base_url)).json(&credentials).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let token = res.json::<Value>().await?["token"].as_str().unwrap().to_string();

    let res = client.get(format!("{}/todos", base_url)).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(format!("{}/todos", base_url))
        .bearer_auth(&token)
        .json(&json!({"title": "milk"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let todo = res.json::<Value>().await?;
    assert_eq!(todo["username"], "ann");
    assert_eq!(todo["done"], false);

    let res = client
        .put(format!("{}/todos/{}", base_url, todo["id"].as_str().unwrap()))
        .bearer_auth(&token)
        .json(&json!({"done": true}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["done"], true);

    let res = client.get(format!("{}/todos", base_url)).bearer_auth(&token).send().await?;
    let listed = res.json::<Value>().await?;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn open_resources_need_no_token() -> Result<()> {
    let base_url = start().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/posts", base_url))
        .json(&json!({"title": "hello"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let post = res.json::<Value>().await?;

    let res = client
        .get(format!("{}/posts/{}", base_url, post["id"].as_str().unwrap()))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?, post);

    let res = client.get(format!("{}/posts/nope", base_url)).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(res.json::<Value>().await?["error"].is_string());
    Ok(())
}

fn manifest_with(name: &str) -> Manifest {
    Manifest {
        resources: vec![ResourceSpec {
            name: name.to_string(),
            owned: false,
            schema: Default::default(),
            options: None,
        }],
        ..Default::default()
    }
}

#[tokio::test]
async fn users_collection_cannot_be_mounted_as_a_resource() -> Result<()> {
    let store = common::store();
    let result = rester::app::router(store, manifest_with("users"), common::identity_config(), None).await;
    assert!(matches!(
        result,
        Err(AppError::Manifest(ManifestError::ReservedName(name))) if name == "users"
    ));
    Ok(())
}

#[tokio::test]
async fn server_mounts_are_refused_without_building_routes() -> Result<()> {
    for name in ["health", "auth"] {
        let result = rester::app::router(common::store(), manifest_with(name), common::identity_config(), None).await;
        assert!(matches!(
            result,
            Err(AppError::Manifest(ManifestError::ReservedName(n))) if n == name
        ));
    }
    Ok(())
}
