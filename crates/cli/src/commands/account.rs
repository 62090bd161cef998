//! Login, registration and session commands.

use kreg_storefront::SyncError;
use kreg_storefront::sync::{AuthOutcome, Phase};
use secrecy::SecretString;

use super::Storefront;

/// Log in and report the account cart.
///
/// # Errors
///
/// Returns an error for invalid input or rejected credentials.
#[allow(clippy::print_stdout)]
pub async fn login(sync: &Storefront, email: &str, password: &SecretString) -> Result<(), SyncError> {
    sync.restore();
    sync.login(email, password).await?;
    let snapshot = sync.snapshot();
    let name = snapshot
        .user
        .as_ref()
        .map_or(email, |user| user.display_name());
    println!("Logged in as {name}");
    println!("{} items in cart", snapshot.cart.item_count());
    Ok(())
}

/// Create an account.
///
/// # Errors
///
/// Returns an error for invalid input or if the server refuses the account.
#[allow(clippy::print_stdout)]
pub async fn register(
    sync: &Storefront,
    name: &str,
    email: &str,
    password: &SecretString,
) -> Result<(), SyncError> {
    sync.restore();
    match sync.register(name, email, password).await? {
        AuthOutcome::LoggedIn => println!("Account created, logged in as {name}"),
        AuthOutcome::LoginRequired => println!("Registration successful! Please login"),
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
pub fn logout(sync: &Storefront) {
    sync.restore();
    sync.logout();
    println!("Logged out");
}

/// Show the stored session without contacting the server.
#[allow(clippy::print_stdout)]
pub fn whoami(sync: &Storefront) {
    let snapshot = sync.restore();
    match (snapshot.phase, snapshot.user) {
        (Phase::Authenticated, Some(user)) => {
            println!("{} <{}>", user.display_name(), user.email);
        }
        (Phase::Authenticated, None) => println!("Logged in"),
        (phase, _) => println!("Not logged in ({})", phase.as_str()),
    }
}
