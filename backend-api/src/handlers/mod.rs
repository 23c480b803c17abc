pub mod health;

pub async fn index() -> &'static str {
    "backend api"
}
