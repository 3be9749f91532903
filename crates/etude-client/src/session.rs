//! Sign-in flows that write the token the client later reads.

use tracing::info;

use etude_types::api::{AuthResponse, RegisterData};

use crate::client::ApiClient;
use crate::credentials::TokenStore;
use crate::error::ClientResult;

/// Log in and remember the token. Nothing is saved if the login fails.
pub async fn sign_in(
    client: &ApiClient,
    store: &dyn TokenStore,
    email: &str,
    password: &str,
) -> ClientResult<AuthResponse> {
    let auth = client.login(email, password).await?;
    store.save(&auth.token)?;
    info!("Signed in as {}", auth.user.email);
    Ok(auth)
}

/// Register and remember the token. Nothing is saved if registration fails.
pub async fn sign_up(client: &ApiClient, store: &dyn TokenStore, data: &RegisterData) -> ClientResult<AuthResponse> {
    let auth = client.register(data).await?;
    store.save(&auth.token)?;
    info!("Registered as {}", auth.user.email);
    Ok(auth)
}

pub fn sign_out(store: &dyn TokenStore) -> ClientResult<()> {
    store.clear()?;
    Ok(())
}
