//! Sign-in commands.

use pantry_core::Phone;
use pantry_sync::Storefront;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use super::CliError;
use crate::output::Output;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Whoami {
    phone: Phone,
    role: pantry_core::Role,
}

pub async fn login(
    shop: &Storefront,
    output: &Output,
    phone: Phone,
    id_token: SecretString,
) -> Result<(), CliError> {
    let result = shop
        .login(phone, id_token.expose_secret().to_string())
        .await;
    output.emit(result, |profile| {
        let name = if profile.name.is_empty() {
            profile.phone.to_string()
        } else {
            profile.name.clone()
        };
        format!(
            "Signed in as {name} ({}). {} item(s) in cart, {} saved address(es).",
            profile.role,
            profile.cart.item_count(),
            profile.addresses.addresses().len()
        )
    })
}

pub fn logout(shop: &Storefront, output: &Output) -> Result<(), CliError> {
    shop.logout();
    output.done("Signed out")
}

pub fn whoami(shop: &Storefront, output: &Output) -> Result<(), CliError> {
    let result = shop.session().phone().map(|phone| Whoami {
        phone,
        role: shop.role().unwrap_or_default(),
    });
    output.emit(result, |me| format!("{} ({})", me.phone, me.role))
}
