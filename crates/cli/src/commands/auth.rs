//! Account commands.

use shopfront_client::Credentials;
use shopfront_client::types::{RegisterRequest, UpdateProfileRequest, User};

use super::{CliError, Context, clear_sentry_user, read_password, set_sentry_user};

/// Fields for `shopfront register`.
pub struct NewAccount {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// `shopfront login`
#[allow(clippy::print_stdout)]
pub async fn login(ctx: &Context, email: &str, password: Option<String>) -> Result<(), CliError> {
    let credentials = Credentials::new(email, read_password(password)?)?;
    let user = ctx.session.establish(&ctx.api, &credentials).await?;
    set_sentry_user(&user);
    println!("Signed in as {}", user.display_name());
    Ok(())
}

/// `shopfront logout`
#[allow(clippy::print_stdout)]
pub async fn logout(ctx: &Context) {
    if !ctx.session.is_authenticated() {
        println!("Not signed in");
        return;
    }
    ctx.session.logout(&ctx.api).await;
    clear_sentry_user();
    println!("Signed out");
}

/// `shopfront register`
#[allow(clippy::print_stdout)]
pub async fn register(
    ctx: &Context,
    account: NewAccount,
    password: Option<String>,
) -> Result<(), CliError> {
    let request = RegisterRequest {
        email: account.email,
        password: read_password(password)?,
        first_name: account.first_name,
        last_name: account.last_name,
        phone: account.phone,
        address: account.address,
    };
    let user = ctx.session.register(&ctx.api, &request).await?;
    println!(
        "Registered {} ({}). Run `shopfront login` to sign in.",
        user.display_name(),
        user.email
    );
    Ok(())
}

/// `shopfront whoami`
pub async fn whoami(ctx: &Context, refresh: bool) -> Result<(), CliError> {
    let user = if refresh {
        ctx.session.refresh_profile(&ctx.api).await?
    } else {
        ctx.require_user()?
    };
    print_user(&user);
    Ok(())
}

/// `shopfront profile`
pub async fn update_profile(ctx: &Context, update: &UpdateProfileRequest) -> Result<(), CliError> {
    if update.first_name.is_none()
        && update.last_name.is_none()
        && update.phone.is_none()
        && update.address.is_none()
    {
        return Err(CliError::Usage(
            "Nothing to update. Pass at least one of --first-name, --last-name, --phone, --address"
                .to_string(),
        ));
    }
    let user = ctx.session.update_profile(&ctx.api, update).await?;
    print_user(&user);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_user(user: &User) {
    println!("{} <{}>", user.display_name(), user.email);
    println!("  id:      {}", user.id);
    println!("  role:    {}", user.role);
    if let Some(phone) = shopfront_client::types::non_empty(user.phone.as_deref()) {
        println!("  phone:   {phone}");
    }
    if let Some(address) = shopfront_client::types::non_empty(user.address.as_deref()) {
        println!("  address: {address}");
    }
}
